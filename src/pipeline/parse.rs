//! Response parsing: pull one JSON object out of a model's free-text reply.
//!
//! Models told to "respond ONLY with JSON" still wrap the object in
//! ```` ```json ```` fences, prefix it with "Here you go:", or trail it with an
//! explanation. Four strategies are tried in order and the first that yields
//! valid JSON wins:
//!
//! 1. the whole text,
//! 2. the first ```` ```json ```` fenced block,
//! 3. the first fenced block of any kind,
//! 4. the span from the first `{` to the last `}`.
//!
//! Only the first fence and the outermost brace span are considered; there is
//! no search for a "best" fragment. Nested braces are left to `serde_json`.
//! No schema checks happen here; see [`parse_response`] for typed parsing.

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

// An unclosed fence runs to the end of the text (truncated replies).
static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json(.*?)(?:```|\z)").unwrap());

static RE_ANY_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)```(.*?)(?:```|\z)").unwrap());

/// Parse the JSON payload of a model reply.
///
/// # Errors
/// [`ParseError`] carrying the original text when no strategy succeeds.
pub fn parse_json_response(text: &str) -> Result<Value, ParseError> {
    if let Ok(v) = serde_json::from_str(text) {
        return Ok(v);
    }

    let fenced = if text.contains("```json") {
        fenced_block(&RE_JSON_FENCE, text)
    } else {
        fenced_block(&RE_ANY_FENCE, text)
    };
    if let Some(block) = fenced {
        match serde_json::from_str(block) {
            Ok(v) => return Ok(v),
            Err(e) => debug!("Fenced block is not JSON ({e}); trying brace span"),
        }
    }

    if let Some(span) = brace_span(text) {
        if let Ok(v) = serde_json::from_str(span) {
            return Ok(v);
        }
    }

    Err(ParseError::new(text))
}

/// Parse a model reply into a typed record.
///
/// Missing keys are the record's concern (its serde defaults); a payload of
/// the wrong shape (e.g. a JSON array) is a [`ParseError`] with `detail` set.
pub fn parse_response<T: DeserializeOwned>(text: &str) -> Result<T, ParseError> {
    let value = parse_json_response(text)?;
    serde_json::from_value(value)
        .map_err(|e| ParseError::new(text).with_detail(e.to_string()))
}

fn fenced_block<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Inclusive span from the first `{` to the last `}`, if ordered.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
