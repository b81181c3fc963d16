//! Human-readable Markdown rendering of scan results.
//!
//! The JSON form of [`ProcessingOutcome`] is the machine contract; this
//! module produces the text the CLI prints when `--json` is not given.
//! Blank values (`null`, `""`, `"null"`, empty maps) are left out.

use crate::output::{ExtractionResult, InfoValue, ProcessingOutcome, ValidationResult};
use std::collections::BTreeMap;

/// Shown when an extraction carries no non-blank value at all.
pub const NO_DATA: &str = "No data extracted";

/// `plan_type` → `Plan Type`.
pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the extracted fields, then any non-blank `additional_info`.
pub fn format_extraction(data: &ExtractionResult) -> String {
    let mut out: Vec<String> = data
        .named_fields()
        .iter()
        .filter_map(|(label, value)| value.map(|v| format!("**{label}:** {v}")))
        .collect();

    let additional: Vec<_> = data
        .additional_info
        .iter()
        .filter(|(_, v)| !v.is_blank())
        .collect();
    if !additional.is_empty() {
        out.push("\n**Additional Information:**".to_string());
        for (key, value) in additional {
            push_info(&mut out, key, value, 1);
        }
    }

    if out.is_empty() {
        NO_DATA.to_string()
    } else {
        out.join("\n")
    }
}

fn push_info(out: &mut Vec<String>, key: &str, value: &InfoValue, depth: usize) {
    let indent = "  ".repeat(depth);
    // Top-level keys are title-cased; nested keys are shown as the model wrote them.
    let label = if depth == 1 {
        title_case(key)
    } else {
        key.to_string()
    };
    match value {
        InfoValue::Null => {}
        InfoValue::Text(s) => out.push(format!("{indent}- {label}: {s}")),
        InfoValue::Map(map) => {
            out.push(format!("{indent}- {label}:"));
            push_map(out, map, depth + 1);
        }
    }
}

fn push_map(out: &mut Vec<String>, map: &BTreeMap<String, InfoValue>, depth: usize) {
    for (k, v) in map.iter().filter(|(_, v)| !v.is_blank()) {
        push_info(out, k, v, depth);
    }
}

fn format_validation(v: &ValidationResult) -> String {
    let verdict = if v.is_insurance_card {
        "✅ Valid Insurance Card"
    } else {
        "❌ Not an Insurance Card"
    };
    let reason = if v.reason.trim().is_empty() {
        "N/A"
    } else {
        v.reason.as_str()
    };
    format!(
        "**{verdict}**\nConfidence: {}\nReason: {reason}",
        v.confidence.as_str().to_uppercase()
    )
}

/// Render a whole outcome: validation verdict (if it ran), then extraction.
pub fn format_outcome(outcome: &ProcessingOutcome) -> String {
    let mut sections = Vec::new();

    if let Some(v) = &outcome.validation {
        sections.push(format!("## Validation\n\n{}", format_validation(v)));
    }

    match &outcome.extraction {
        Some(ex) => match &ex.error {
            Some(err) => sections.push(format!("## Extracted Information\n\n❌ {err}")),
            None => sections.push(format!(
                "## Extracted Information\n\n{}",
                format_extraction(ex)
            )),
        },
        None => {
            if let Some(err) = &outcome.error {
                sections.push(format!("❌ {err}"));
            }
        }
    }

    let mut text = sections.join("\n\n");
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Confidence, OutcomeStatus};

    fn sample() -> ExtractionResult {
        ExtractionResult {
            insurance_company: Some("Acme Health".into()),
            member_name: Some("Jane Doe".into()),
            member_id: Some("X123".into()),
            additional_info: BTreeMap::from([
                ("plan_type".to_string(), InfoValue::from("PPO")),
                ("other_details".to_string(), InfoValue::Map(BTreeMap::new())),
                (
                    "pharmacy_info".to_string(),
                    InfoValue::Map(BTreeMap::from([
                        ("RxBIN".to_string(), InfoValue::from("610014")),
                        ("RxPCN".to_string(), InfoValue::from("null")),
                    ])),
                ),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn title_case_keys() {
        assert_eq!(title_case("plan_type"), "Plan Type");
        assert_eq!(title_case("RX_BIN"), "Rx Bin");
        assert_eq!(title_case("copay"), "Copay");
    }

    #[test]
    fn extraction_lists_present_fields_only() {
        let text = format_extraction(&sample());
        assert!(text.contains("**Insurance Company:** Acme Health"));
        assert!(text.contains("**Member ID:** X123"));
        assert!(!text.contains("Group Number"));
        assert!(text.contains("  - Plan Type: PPO"));
        assert!(text.contains("  - Pharmacy Info:"));
        assert!(text.contains("    - RxBIN: 610014"));
        assert!(!text.contains("RxPCN"));
        assert!(!text.contains("Other Details"));
    }

    #[test]
    fn empty_extraction() {
        assert_eq!(format_extraction(&ExtractionResult::default()), NO_DATA);
    }

    #[test]
    fn rejected_outcome() {
        let outcome = ProcessingOutcome::gated(
            ValidationResult {
                is_insurance_card: false,
                confidence: Confidence::High,
                reason: String::new(),
            },
            OutcomeStatus::Rejected,
        );
        let text = format_outcome(&outcome);
        assert!(text.contains("Not an Insurance Card"));
        assert!(text.contains("Confidence: HIGH"));
        assert!(text.contains("Reason: N/A"));
        assert!(text.contains("❌ Not an insurance card"));
        assert!(!text.contains("Extracted Information"));
    }

    #[test]
    fn failed_extraction_outcome() {
        let outcome =
            ProcessingOutcome::extracted(None, ExtractionResult::failed("Failed to extract data: x"));
        let text = format_outcome(&outcome);
        assert!(!text.contains("## Validation"));
        assert!(text.contains("❌ Failed to extract data: x"));
    }
}
