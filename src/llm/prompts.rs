//! Prompt templates for legal document analysis.

/// Appended when only part of the document is sent.
pub const PARTIAL_ANALYSIS_NOTE: &str =
    "NOTE: This is a partial document analysis due to size limits.";

const ANALYSIS_TEMPLATE: &str = r#"You are a legal analyst reviewing a legal document.
Read the document text below and respond with a single JSON object of this shape:

{
  "summary": "Plain-language summary of the document's purpose, the obligations it creates and the risks it carries, written for a non-lawyer.",
  "key_clauses": [
    {
      "type": "Clause type, e.g. Payment Terms, Termination, Confidentiality",
      "content": "Text of the clause (first 200 characters if it is long)",
      "importance": "high | medium | low",
      "classification": "Contractual | Compliance | Financial | Termination | Confidentiality | Miscellaneous",
      "risk_score": "Number from 1 to 10, 10 being the highest risk",
      "page": "Page number if it can be determined, otherwise null"
    }
  ],
  "document_type": "Kind of document (contract, agreement, policy, ...)",
  "confidence": "Number between 0.5 and 0.98"
}

IMPORTANT:
- ONLY return valid JSON
- No explanations, prose or markdown fences
- If the text is truncated, focus on the most important clauses
- Every key shown above must be present"#;

/// Build the analysis prompt for a block of document text.
pub fn analysis_prompt(text: &str, partial: bool) -> String {
    let mut prompt = String::with_capacity(ANALYSIS_TEMPLATE.len() + text.len() + 128);
    prompt.push_str(ANALYSIS_TEMPLATE);
    if partial {
        prompt.push_str("\n\n");
        prompt.push_str(PARTIAL_ANALYSIS_NOTE);
    }
    prompt.push_str("\n\nDocument text:\n");
    prompt.push_str(text);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_shape() {
        let prompt = analysis_prompt("THE PARTIES AGREE", false);
        assert!(prompt.contains("\"key_clauses\""));
        assert!(prompt.ends_with("Document text:\nTHE PARTIES AGREE"));
        assert!(!prompt.contains(PARTIAL_ANALYSIS_NOTE));

        let partial = analysis_prompt("x", true);
        assert!(partial.contains(PARTIAL_ANALYSIS_NOTE));
    }
}
