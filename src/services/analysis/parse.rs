//! Turning raw model output into an [`AnalysisResult`].

use serde_json::{Map, Value};
use thiserror::Error;

use crate::llm::ProviderError;
use crate::models::{
    clamp_unit, AnalysisResult, Classification, Importance, KeyClause, MAX_RISK_SCORE,
};
use crate::utils::truncate_chars;

/// Top-level keys a primary response must carry.
pub const REQUIRED_FIELDS: &[&str] = &["summary", "key_clauses", "document_type", "confidence"];

/// Why one attempt at getting an analysis failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AttemptError {
    #[error("Invalid JSON response: {0}")]
    Parse(String),

    #[error("Empty response from AI")]
    EmptyResponse,

    #[error("Missing required fields: {0}")]
    MissingFields(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl AttemptError {
    /// The model answered, but not with parseable JSON.
    pub fn is_parse(&self) -> bool {
        matches!(self, AttemptError::Parse(_))
    }
}

/// Strip markdown fences and surrounding prose, leaving the outermost `{...}` span.
pub fn clean_json_response(raw: &str) -> Result<&str, AttemptError> {
    if raw.trim().is_empty() {
        return Err(AttemptError::EmptyResponse);
    }

    let mut text = raw;
    if let Some(inner) = fenced_block(text, "```json").or_else(|| fenced_block(text, "```")) {
        text = inner;
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            text = &text[start..=end];
        }
    }
    Ok(text.trim())
}

fn fenced_block<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let len = text[start..].find("```")?;
    Some(text[start..start + len].trim())
}

/// Clean and parse a response into a JSON object.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, AttemptError> {
    let cleaned = clean_json_response(raw)?;
    match serde_json::from_str::<Value>(cleaned) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AttemptError::Parse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(AttemptError::Parse(e.to_string())),
    }
}

pub fn check_required(map: &Map<String, Value>) -> Result<(), AttemptError> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|key| !map.contains_key(*key))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AttemptError::MissingFields(missing.join(", ")))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// How much a given path of the ladder is trusted.
#[derive(Debug, Clone, Copy)]
pub struct TrustProfile {
    pub content_limit: usize,
    pub clause_confidence: f64,
    pub default_confidence: f64,
    pub max_confidence: f64,
    pub summary_prefix: &'static str,
}

/// A number, or a string holding one.
fn coerce_f64(value: Option<&Value>) -> Option<f64> {
    let number = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

fn coerce_page(value: Option<&Value>) -> Option<u32> {
    coerce_f64(value)
        .filter(|p| *p >= 1.0 && *p <= u32::MAX as f64)
        .map(|p| p as u32)
}

fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Risk assigned when the model gives no usable score.
const DEFAULT_RISK_SCORE: f64 = 0.0;
const DEFAULT_CLAUSE_TYPE: &str = "Unknown";

fn normalize_clause(item: &Map<String, Value>, profile: &TrustProfile) -> KeyClause {
    let content = string_field(item, "content").unwrap_or_default();
    KeyClause {
        clause_type: string_field(item, "type").unwrap_or(DEFAULT_CLAUSE_TYPE).to_string(),
        content: truncate_chars(content, profile.content_limit).to_string(),
        importance: string_field(item, "importance")
            .and_then(Importance::from_str)
            .unwrap_or_default(),
        classification: string_field(item, "classification")
            .and_then(Classification::from_str)
            .unwrap_or_default(),
        risk_score: clamp_unit(
            coerce_f64(item.get("risk_score")).unwrap_or(DEFAULT_RISK_SCORE),
            MAX_RISK_SCORE,
        ),
        page: coerce_page(item.get("page")),
        confidence: profile.clause_confidence,
    }
}

/// Build an [`AnalysisResult`] from a parsed response, applying the profile's limits.
pub fn normalize(
    map: &Map<String, Value>,
    profile: &TrustProfile,
    fallback_document_type: &str,
) -> AnalysisResult {
    let key_clauses = map
        .get("key_clauses")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| normalize_clause(item, profile))
                .collect()
        })
        .unwrap_or_default();

    let summary = match map.get("summary") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    AnalysisResult {
        summary: format!("{}{}", profile.summary_prefix, summary),
        key_clauses,
        document_type: string_field(map, "document_type")
            .unwrap_or(fallback_document_type)
            .to_string(),
        confidence: clamp_unit(
            coerce_f64(map.get("confidence")).unwrap_or(profile.default_confidence),
            profile.max_confidence,
        ),
    }
}
