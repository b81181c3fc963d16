//! Output types: the records produced by one card-processing request.
//!
//! Field names are part of the public contract; downstream consumers read
//! the serialised JSON (`insurance_company`, `member_id`, …) directly.
//!
//! Deserialisation is lenient because the source is a language model: a
//! member ID sent as a number, `"High"` instead of `"high"`, or the string
//! `"null"` where JSON `null` was asked for are all accepted.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Error string set on an outcome when the gate stops the workflow.
pub const NOT_AN_INSURANCE_CARD: &str = "Not an insurance card";

// ── Validation ───────────────────────────────────────────────────────────

/// How sure the model is about its validation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
    #[default]
    Unknown,
}

impl Confidence {
    /// Case-insensitive parse; anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            "low" => Confidence::Low,
            _ => Confidence::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Confidence::parse(&s),
            _ => Confidence::Unknown,
        })
    }
}

/// Verdict of the validation stage, built from the first image only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_insurance_card: bool,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, deserialize_with = "lenient_text")]
    pub reason: String,
}

impl ValidationResult {
    /// Negative verdict standing in for a validation stage that failed.
    pub fn failed(cause: impl std::fmt::Display) -> Self {
        Self {
            is_insurance_card: false,
            confidence: Confidence::Low,
            reason: format!("Error during validation: {cause}"),
        }
    }
}

// ── Extraction ───────────────────────────────────────────────────────────

/// A value inside `additional_info`.
///
/// The model decides the shape below the top-level keys, so values are a
/// small open union rather than fixed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InfoValue {
    Null,
    Text(String),
    Map(BTreeMap<String, InfoValue>),
}

impl InfoValue {
    /// True for values a reader would consider "not filled in":
    /// `null`, `""`, `"null"`, or a map whose entries are all blank.
    pub fn is_blank(&self) -> bool {
        match self {
            InfoValue::Null => true,
            InfoValue::Text(s) => {
                let s = s.trim();
                s.is_empty() || s.eq_ignore_ascii_case("null")
            }
            InfoValue::Map(m) => m.values().all(InfoValue::is_blank),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, InfoValue>> {
        match self {
            InfoValue::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<Value> for InfoValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => InfoValue::Null,
            Value::String(s) => InfoValue::Text(s),
            Value::Bool(b) => InfoValue::Text(b.to_string()),
            Value::Number(n) => InfoValue::Text(n.to_string()),
            Value::Array(items) => InfoValue::Text(
                items
                    .into_iter()
                    .filter(|i| !i.is_null())
                    .map(|i| match i {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            Value::Object(map) => InfoValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, InfoValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for InfoValue {
    fn from(s: &str) -> Self {
        InfoValue::Text(s.to_string())
    }
}

impl<'de> Deserialize<'de> for InfoValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(InfoValue::from)
    }
}

/// Fields extracted from the card images.
///
/// `error` is set exactly when extraction failed; in that case every named
/// field is `None` and `additional_info` is empty (see [`Self::failed`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "lenient_field")]
    pub insurance_company: Option<String>,
    #[serde(default, deserialize_with = "lenient_field")]
    pub member_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_field")]
    pub member_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_field")]
    pub group_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_field")]
    pub effective_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_info")]
    pub additional_info: BTreeMap<String, InfoValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    /// An error-carrying result: all named fields empty.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// The five named fields with their display labels, in card order.
    pub fn named_fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("Insurance Company", self.insurance_company.as_deref()),
            ("Member Name", self.member_name.as_deref()),
            ("Member ID", self.member_id.as_deref()),
            ("Group Number", self.group_number.as_deref()),
            ("Effective Date", self.effective_date.as_deref()),
        ]
    }
}

// ── Outcome ──────────────────────────────────────────────────────────────

/// Which terminal state the workflow reached.
///
/// `Rejected` and `ValidationInconclusive` both stop before extraction, but
/// only the first is an actual verdict from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Validation ran and the model said the image is not an insurance card.
    Rejected,
    /// Validation could not be completed (gateway or parse failure).
    ValidationInconclusive,
    /// Extraction ran but failed.
    ExtractionFailed,
    /// Extraction produced a record.
    Extracted,
}

/// The composed result of one processing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    /// `None` iff validation was skipped.
    pub validation: Option<ValidationResult>,
    /// `None` iff the gate stopped the workflow.
    pub extraction: Option<ExtractionResult>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: OutcomeStatus,
}

impl ProcessingOutcome {
    /// Outcome for a request stopped at the gate.
    pub fn gated(validation: ValidationResult, status: OutcomeStatus) -> Self {
        Self {
            validation: Some(validation),
            extraction: None,
            success: false,
            error: Some(NOT_AN_INSURANCE_CARD.to_string()),
            status,
        }
    }

    /// Outcome for a request that reached extraction.
    pub fn extracted(validation: Option<ValidationResult>, extraction: ExtractionResult) -> Self {
        let success = extraction.error.is_none();
        Self {
            validation,
            extraction: Some(extraction),
            success,
            error: None,
            status: if success {
                OutcomeStatus::Extracted
            } else {
                OutcomeStatus::ExtractionFailed
            },
        }
    }
}

// ── Lenient field deserialisers ──────────────────────────────────────────

fn scalar_to_text(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

fn lenient_field<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Value::deserialize(d).map(scalar_to_text)
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    })
}

fn lenient_info<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<BTreeMap<String, InfoValue>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => BTreeMap::new(),
        Value::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, InfoValue::from(v)))
            .collect(),
        other => BTreeMap::from([("other_details".to_string(), InfoValue::from(other))]),
    })
}
