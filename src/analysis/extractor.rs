//! Splits a model reply into a prose summary and a structured record.
//!
//! [`extract`] is best-effort: it never fails and always returns a usable
//! summary. [`extract_strict`] requires the whole reply to be the JSON
//! object and reports anything else as an [`ExtractError`].

use crate::models::StructuredAnalysis;
use thiserror::Error;

/// Summary placed in the skeleton for a single-task analysis.
pub const FALLBACK_SUMMARY: &str = "Análisis completado";

/// Summary placed in the skeleton for a consolidated analysis.
pub const FALLBACK_SUMMARY_MULTI: &str = "Análisis múltiple completado";

/// Characters of the reply kept when there is no usable prose prefix.
const SUMMARY_PREVIEW_CHARS: usize = 200;

/// The two halves of a model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub summary_short: String,
    pub structured: StructuredAnalysis,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Model reply contains no JSON object")]
    NoObject,

    #[error("Model reply is not a valid analysis object: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Extracts the summary and the structured object from `full_text`.
///
/// The object is the span from the first `{` to the last `}`. When it is
/// missing or does not decode, `structured` is the fallback skeleton built
/// from `fallback_summary`.
pub fn extract(full_text: &str, fallback_summary: &str) -> Extraction {
    let first = full_text.find('{');
    let last = full_text.rfind('}');

    let structured = match (first, last) {
        (Some(start), Some(end)) if start < end => decode_object(&full_text[start..=end])
            .unwrap_or_else(|e| {
                tracing::debug!("Structured block did not decode: {}", e);
                StructuredAnalysis::fallback(fallback_summary)
            }),
        _ => StructuredAnalysis::fallback(fallback_summary),
    };

    let prefix = first.map(|idx| full_text[..idx].trim()).unwrap_or_default();
    let summary_short = if prefix.is_empty() {
        preview(full_text)
    } else {
        prefix.to_string()
    };

    Extraction {
        summary_short,
        structured,
    }
}

/// Decodes a reply that must consist of the JSON object alone.
///
/// A surrounding Markdown code fence is tolerated.
pub fn extract_strict(full_text: &str, fallback_summary: &str) -> Result<Extraction, ExtractError> {
    let body = strip_code_fence(full_text.trim());

    if !body.starts_with('{') {
        return Err(ExtractError::NoObject);
    }

    let structured = decode_object(body)?;
    let summary_short = structured
        .summary
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(fallback_summary)
        .to_string();

    Ok(Extraction {
        summary_short,
        structured,
    })
}

/// Parses the JSON first, then reads the analysis fields out of it. Fields
/// of the wrong shape are emptied instead of rejecting the whole object.
fn decode_object(text: &str) -> Result<StructuredAnalysis, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    serde_json::from_value(value)
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(SUMMARY_PREVIEW_CHARS).collect();
    format!("{}...", head.trim())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (e.g. `json`) on the opening fence line.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Level;
    use serde_json::json;

    #[test]
    fn test_prose_then_object() {
        let text = "Sistema limpio.\n\n{\"summary\":\"ok\",\"findings\":[],\"recommendations\":[]}";
        let extraction = extract(text, FALLBACK_SUMMARY);

        assert_eq!(extraction.summary_short, "Sistema limpio.");
        assert_eq!(extraction.structured.summary.as_deref(), Some("ok"));
        assert!(extraction.structured.findings.is_empty());
        assert!(extraction.structured.recommendations.is_empty());
    }

    #[test]
    fn test_no_braces_uses_fallback() {
        let extraction = extract("no braces here", FALLBACK_SUMMARY);

        assert_eq!(
            extraction.structured,
            StructuredAnalysis::fallback(FALLBACK_SUMMARY)
        );
        assert_eq!(extraction.summary_short, "no braces here...");
    }

    #[test]
    fn test_object_matches_decoded_value() {
        let object = json!({
            "summary": "Actividad sospechosa",
            "findings": [{
                "id": "F1",
                "title": "Inicio de sesión fallido repetido",
                "description": "42 eventos 4625",
                "confidence": "HIGH",
                "risk_level": "medium",
                "evidence": "EventID 4625"
            }],
            "recommendations": ["Revisar cuentas"],
            "statistics": {"total_items_analyzed": 100, "suspicious_items": 42, "clean_items": 58}
        });
        let text = format!("Resumen breve.\n{}\nFin.", object);

        let extraction = extract(&text, FALLBACK_SUMMARY);
        let expected: StructuredAnalysis = serde_json::from_value(object).unwrap();

        assert_eq!(extraction.structured, expected);
        assert_eq!(extraction.summary_short, "Resumen breve.");
        assert_eq!(extraction.structured.findings[0].confidence, Level::High);
    }

    #[test]
    fn test_object_at_start_uses_preview() {
        let text = format!("{{\"summary\":\"{}\"}}", "z".repeat(300));
        let extraction = extract(&text, FALLBACK_SUMMARY);

        let expected_head: String = text.chars().take(200).collect();
        assert_eq!(extraction.summary_short, format!("{}...", expected_head));
        assert_eq!(extraction.structured.summary, Some("z".repeat(300)));
    }

    #[test]
    fn test_whitespace_prefix_uses_preview() {
        let extraction = extract("   \n{\"summary\":\"ok\"}", FALLBACK_SUMMARY);
        assert_eq!(extraction.summary_short, "{\"summary\":\"ok\"}...");
    }

    #[test]
    fn test_malformed_object_falls_back() {
        let extraction = extract("Resumen.\n{\"summary\": \"ok\", findings: }", FALLBACK_SUMMARY_MULTI);

        assert_eq!(
            extraction.structured,
            StructuredAnalysis::fallback(FALLBACK_SUMMARY_MULTI)
        );
        assert_eq!(extraction.summary_short, "Resumen.");
    }

    #[test]
    fn test_closing_brace_before_opening() {
        let extraction = extract("fin } y luego {", FALLBACK_SUMMARY);

        assert_eq!(
            extraction.structured,
            StructuredAnalysis::fallback(FALLBACK_SUMMARY)
        );
        assert_eq!(extraction.summary_short, "fin } y luego");
    }

    #[test]
    fn test_empty_reply_still_has_summary() {
        let extraction = extract("", FALLBACK_SUMMARY);
        assert_eq!(extraction.summary_short, "...");
        assert!(!extraction.summary_short.is_empty());
    }

    #[test]
    fn test_strict_accepts_fenced_object() {
        let text = "```json\n{\"summary\": \"Todo correcto\", \"findings\": []}\n```";
        let extraction = extract_strict(text, FALLBACK_SUMMARY).unwrap();

        assert_eq!(extraction.summary_short, "Todo correcto");
        assert!(extraction.structured.findings.is_empty());
    }

    #[test]
    fn test_strict_rejects_prose() {
        let err = extract_strict("Sistema limpio. {\"summary\":\"ok\"}", FALLBACK_SUMMARY).unwrap_err();
        assert!(matches!(err, ExtractError::NoObject));

        let err = extract_strict("{\"findings\": [", FALLBACK_SUMMARY).unwrap_err();
        assert!(matches!(err, ExtractError::Invalid(_)));
    }

    #[test]
    fn test_side_field_of_wrong_shape_keeps_findings() {
        let finding = json!({"id": "F1", "title": "Mimikatz", "risk_level": "high"});
        let replies = [
            json!({
                "summary": "Riesgo alto",
                "findings": [finding.clone()],
                "recommendations": ["Aislar el equipo"],
                "statistics": "no disponible"
            }),
            json!({
                "summary": "Riesgo alto",
                "findings": [finding, "nota suelta"],
                "recommendations": ["Aislar el equipo"]
            }),
        ];

        for object in replies {
            let extraction = extract(&format!("Resumen.\n{}", object), FALLBACK_SUMMARY);
            let structured = extraction.structured;

            assert_eq!(extraction.summary_short, "Resumen.");
            assert_eq!(structured.summary.as_deref(), Some("Riesgo alto"));
            assert_eq!(structured.findings.len(), 1);
            assert_eq!(structured.findings[0].title.as_deref(), Some("Mimikatz"));
            assert_eq!(structured.findings[0].risk_level, Level::High);
            assert_eq!(structured.recommendations, vec!["Aislar el equipo"]);
            assert!(structured.statistics.is_empty());
        }
    }

    #[test]
    fn test_strict_tolerates_side_field_of_wrong_shape() {
        let text = "{\"summary\": \"ok\", \"findings\": [{\"id\": \"F1\"}], \"statistics\": 5}";
        let extraction = extract_strict(text, FALLBACK_SUMMARY).unwrap();

        assert_eq!(extraction.structured.findings.len(), 1);
        assert!(extraction.structured.statistics.is_empty());
    }
}
