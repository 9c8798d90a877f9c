//! Lenient JSON decoding for model output
//!
//! Models often wrap the object in prose or leave trailing commas. Decoding
//! walks an ordered ladder and stops at the first step that succeeds:
//! strict decode, outermost `{...}` extraction, then trailing-comma removal.

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{error, warn};

/// Which rung of the ladder produced the value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    Direct,
    Outermost,
    Sanitized,
}

/// Every rung failed
#[derive(Debug, Clone, Error)]
#[error("{direct} | OUTERMOST_ERROR: {outermost} | SANITIZE_ERROR: {sanitized}")]
pub struct ParseFailure {
    /// Model text as received
    pub raw: String,
    pub direct: String,
    pub outermost: String,
    pub sanitized: String,
}

/// Decode `raw` into `T`, coercing almost-JSON where possible
pub fn decode_ladder<T: DeserializeOwned>(raw: &str) -> Result<(T, DecodeStep), ParseFailure> {
    let direct = match serde_json::from_str::<T>(raw) {
        Ok(value) => return Ok((value, DecodeStep::Direct)),
        Err(e) => e.to_string(),
    };
    warn!("Direct decode failed: {}. Trying outermost-object extraction", direct);

    let outer = extract_outermost_object(raw);
    let outermost = match serde_json::from_str::<T>(outer) {
        Ok(value) => return Ok((value, DecodeStep::Outermost)),
        Err(e) => e.to_string(),
    };
    warn!(
        "Outermost-object decode failed: {}. Trying trailing-comma removal",
        outermost
    );

    let sanitized_text = remove_trailing_commas(outer);
    let sanitized = match serde_json::from_str::<T>(&sanitized_text) {
        Ok(value) => return Ok((value, DecodeStep::Sanitized)),
        Err(e) => e.to_string(),
    };

    error!(raw = %raw, "Response could not be decoded: {} | {}", direct, sanitized);
    Err(ParseFailure {
        raw: raw.to_string(),
        direct,
        outermost,
        sanitized,
    })
}

/// Slice from the first `{` to its matching `}`.
///
/// Braces inside string literals are ignored. Without a `{` the input is
/// returned unchanged; when the object never closes, everything from the
/// first `{` onward is returned.
pub fn extract_outermost_object(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return text;
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return &text[start..=start + offset];
                }
            }
            _ => {}
        }
    }

    &text[start..]
}

/// Drop commas that directly precede `}` or `]` (whitespace allowed between)
pub fn remove_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &ch) in chars.iter().enumerate() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        }
        out.push(ch);
    }

    out
}
