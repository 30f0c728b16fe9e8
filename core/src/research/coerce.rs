//! Coercion of raw agent output into a [`ResearchResponse`]
//!
//! Agent output arrives in several shapes depending on the provider: a plain
//! string, a list of content blocks, or a single block object. The final text is
//! pulled out of whichever shape is present, a JSON object is located in it
//! (fenced or bare), and that object is deserialized strictly.

use super::response::ResearchResponse;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// Why a raw response could not be turned into a [`ResearchResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("unsupported output shape: {found}")]
    UnsupportedShape { found: String },

    #[error("no JSON object found in output")]
    NoJson,

    #[error("invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("output does not match the response schema: {message}")]
    SchemaMismatch { message: String },
}

/// A failed coercion, carrying the raw response it was attempted on
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct CoercionFailure {
    pub reason: FailureReason,
    pub raw: Value,
}

/// Coerce a raw agent result into the response schema
///
/// `raw` is either the full run record (with an `output` key) or the output
/// value itself.
pub fn coerce_response(raw: &Value) -> Result<ResearchResponse, CoercionFailure> {
    let fail = |reason| CoercionFailure {
        reason,
        raw: raw.clone(),
    };

    let output = match raw {
        Value::Object(map) => map.get("output").unwrap_or(raw),
        _ => raw,
    };

    let text = extract_text(output).map_err(fail)?;
    parse_response(&text).map_err(fail)
}

/// Pull the final answer text out of an output value
fn extract_text(output: &Value) -> Result<String, FailureReason> {
    match output {
        Value::String(text) => Ok(text.clone()),
        Value::Array(blocks) => {
            let texts: Vec<&str> = blocks.iter().filter_map(block_text).collect();
            if texts.is_empty() {
                Err(FailureReason::UnsupportedShape {
                    found: "list without text blocks".to_string(),
                })
            } else {
                Ok(texts.concat())
            }
        }
        Value::Object(_) => block_text(output)
            .map(str::to_string)
            .ok_or_else(|| FailureReason::UnsupportedShape {
                found: "object without a text field".to_string(),
            }),
        other => Err(FailureReason::UnsupportedShape {
            found: shape_name(other).to_string(),
        }),
    }
}

fn block_text(block: &Value) -> Option<&str> {
    match block {
        Value::String(text) => Some(text),
        Value::Object(map) => map.get("text").and_then(Value::as_str),
        _ => None,
    }
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Locate and strictly deserialize the JSON object in `text`
pub fn parse_response(text: &str) -> Result<ResearchResponse, FailureReason> {
    let candidate = match fenced_block(text) {
        Some(block) => block,
        None => extract_json_object(text).ok_or_else(|| {
            if text.contains('{') {
                FailureReason::InvalidJson {
                    message: "unterminated JSON object".to_string(),
                }
            } else {
                FailureReason::NoJson
            }
        })?,
    };

    let value: Value =
        serde_json::from_str(&candidate).map_err(|e| FailureReason::InvalidJson {
            message: e.to_string(),
        })?;

    serde_json::from_value(value).map_err(|e| FailureReason::SchemaMismatch {
        message: e.to_string(),
    })
}

/// Contents of the first ```` ``` ```` or ```` ```json ```` fenced block
fn fenced_block(text: &str) -> Option<String> {
    let fence = Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").ok()?;
    fence
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .filter(|body| !body.is_empty())
}

/// The first balanced `{ ... }` span, ignoring braces inside strings
fn extract_json_object(input: &str) -> Option<String> {
    let start = input.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in input[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(input[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }

    None
}
