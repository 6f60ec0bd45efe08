//! Structured legal analysis produced by the orchestrator.

use serde::{Deserialize, Serialize};

/// Highest overall confidence any analysis may report.
pub const MAX_CONFIDENCE: f64 = 0.98;

/// Upper bound of a clause risk score.
pub const MAX_RISK_SCORE: f64 = 10.0;

/// Summary prefix marking a reduced-scope analysis.
pub const PARTIAL_PREFIX: &str = "[Partial Analysis] ";

/// How much attention a clause deserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    Medium,
    #[default]
    Low,
}

impl Importance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// Legal category a clause falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Classification {
    Contractual,
    Compliance,
    Financial,
    Termination,
    Confidentiality,
    #[default]
    Miscellaneous,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contractual => "Contractual",
            Self::Compliance => "Compliance",
            Self::Financial => "Financial",
            Self::Termination => "Termination",
            Self::Confidentiality => "Confidentiality",
            Self::Miscellaneous => "Miscellaneous",
        }
    }

    /// Case-insensitive lookup.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "contractual" => Some(Self::Contractual),
            "compliance" => Some(Self::Compliance),
            "financial" => Some(Self::Financial),
            "termination" => Some(Self::Termination),
            "confidentiality" => Some(Self::Confidentiality),
            "miscellaneous" => Some(Self::Miscellaneous),
            _ => None,
        }
    }
}

/// One clause the analysis called out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyClause {
    #[serde(rename = "type")]
    pub clause_type: String,
    pub content: String,
    pub importance: Importance,
    pub classification: Classification,
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Trust in the path that produced this clause, not the model's self-report.
    pub confidence: f64,
}

/// Full analysis of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub key_clauses: Vec<KeyClause>,
    pub document_type: String,
    pub confidence: f64,
}

impl AnalysisResult {
    /// Whether this result came from a degraded path.
    pub fn is_partial(&self) -> bool {
        self.summary.starts_with(PARTIAL_PREFIX)
    }
}

/// Clamp a value into `[0, max]`, mapping NaN to 0.
pub fn clamp_unit(value: f64, max: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, max)
    }
}
