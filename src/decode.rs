//! Decoding of JSON-encoded query parameter values.
//!
//! Every raw value is parsed on its own with strict JSON grammar. Output
//! keeps input order and length, the first bad value fails the whole batch.

use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_MAX_BYTES: usize = 64 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Limits applied to every raw value before it is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Longest accepted raw value in bytes.
    pub max_bytes: usize,

    /// Deepest accepted array/object nesting, `{"x": [1]}` has depth 2.
    pub max_depth: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("value at position {index} is not valid JSON: {source}")]
    MalformedInput {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("value at position {index} is {len} bytes long, limit is {limit}")]
    TooLarge {
        index: usize,
        len: usize,
        limit: usize,
    },

    #[error("value at position {index} nests deeper than {limit} levels")]
    TooDeep { index: usize, limit: usize },
}

impl DecodeError {
    /// Position of the raw value that failed.
    pub fn index(&self) -> usize {
        match *self {
            DecodeError::MalformedInput { index, .. }
            | DecodeError::TooLarge { index, .. }
            | DecodeError::TooDeep { index, .. } => index,
        }
    }
}

/// Decodes every raw value into a JSON document.
///
/// ```
/// use serde_json::json;
/// use tour::decode::{decode_documents, DecodeLimits};
///
/// let raw = ["{\"status\": \"true\"}", "[1, 2]"];
/// let documents = decode_documents(&raw, &DecodeLimits::default()).unwrap();
///
/// assert_eq!(documents, vec![json!({"status": "true"}), json!([1, 2])]);
/// ```
pub fn decode_documents<S>(raw: &[S], limits: &DecodeLimits) -> Result<Vec<Value>, DecodeError>
where
    S: AsRef<str>,
{
    raw.iter()
        .enumerate()
        .map(|(index, value)| decode_document(index, value.as_ref(), limits))
        .collect()
}

fn decode_document(index: usize, raw: &str, limits: &DecodeLimits) -> Result<Value, DecodeError> {
    if raw.len() > limits.max_bytes {
        return Err(DecodeError::TooLarge {
            index,
            len: raw.len(),
            limit: limits.max_bytes,
        });
    }

    if exceeds_depth(raw, limits.max_depth) {
        return Err(DecodeError::TooDeep {
            index,
            limit: limits.max_depth,
        });
    }

    serde_json::from_str(raw).map_err(|source| DecodeError::MalformedInput { index, source })
}

/// Scans brackets outside of string literals, stops as soon as nesting
/// goes over `limit`.
fn exceeds_depth(raw: &str, limit: usize) -> bool {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for byte in raw.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                if depth > limit {
                    return true;
                }
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    false
}
