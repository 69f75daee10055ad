//! Extraction of a JSON value from free-form model output.
//!
//! Models wrap JSON in prose, markdown fences or trailing commentary. The
//! extractor scans for the first balanced `{...}` or `[...]` that parses,
//! honoring string literals and escapes so brackets inside strings do not
//! count.

use serde_json::Value;
use thiserror::Error;

/// Candidate start positions tried before giving up.
const MAX_CANDIDATES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("AI response is empty")]
    Empty,

    #[error("AI response contains no JSON object or array")]
    NoJson,

    #[error("AI response JSON is truncated")]
    Truncated,

    #[error("AI response JSON is invalid: {0}")]
    Invalid(String),
}

/// Parse the first balanced JSON object or array found in `text`.
pub fn extract_json(text: &str) -> Result<Value, ExtractError> {
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    let mut first_error = None;
    // Starts inside a balanced candidate that failed to parse are skipped, so
    // a broken object never yields one of its nested values.
    let mut resume_at = 0;
    let starts = text
        .char_indices()
        .filter(|(_, c)| matches!(c, '{' | '['))
        .map(|(i, _)| i)
        .take(MAX_CANDIDATES);

    for start in starts {
        if start < resume_at {
            continue;
        }
        match balanced_slice(&text[start..]) {
            Ok(slice) => match serde_json::from_str::<Value>(slice) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    first_error.get_or_insert(ExtractError::Invalid(e.to_string()));
                    resume_at = start + slice.len();
                }
            },
            // A truncated document runs to the end of the text, so every later
            // start is nested inside it.
            Err(ExtractError::Truncated) if opens_json_value(&text[start..]) => {
                first_error.get_or_insert(ExtractError::Truncated);
                break;
            }
            // Unclosed bracket in prose
            Err(ExtractError::Truncated) => {}
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    Err(first_error.unwrap_or(ExtractError::NoJson))
}

/// Whether the bracket at the start of `text` is followed by JSON rather than prose.
fn opens_json_value(text: &str) -> bool {
    let mut chars = text.chars();
    let opener = chars.next();
    let rest = chars.as_str().trim_start();
    match opener {
        Some('{') => rest.starts_with('"') || rest.starts_with('}'),
        Some('[') => {
            rest.starts_with(|c: char| matches!(c, '{' | '[' | ']' | '"' | '-') || c.is_ascii_digit())
                || ["true", "false", "null"].iter().any(|lit| rest.starts_with(lit))
        }
        _ => false,
    }
}

/// The balanced value starting at the first byte of `text`.
fn balanced_slice(text: &str) -> Result<&str, ExtractError> {
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => closers.push('}'),
            '[' => closers.push(']'),
            '}' | ']' => {
                if closers.pop() != Some(c) {
                    return Err(ExtractError::Invalid(format!("unexpected '{}' at byte {}", c, i)));
                }
                if closers.is_empty() {
                    return Ok(&text[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    Err(ExtractError::Truncated)
}
