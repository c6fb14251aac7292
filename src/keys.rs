//! Key Derivation
//!
//! Deterministic, field-order-insensitive keys for cache and batch lookups.

use serde::Serialize;
use serde_json::Value;

use crate::error::KeyError;

pub const PROMPT_PREFIX: &str = "prompt:";
pub const ANALYSIS_PREFIX: &str = "analysis:";
pub const STATUS_PREFIX: &str = "status:";

// == Serialize Key ==
/// Encodes `value` as canonical JSON: object fields sorted by name at every
/// depth, no whitespace.
///
/// Two payloads that are structurally equal produce the same key regardless
/// of the order their fields were declared or populated in.
pub fn serialize_key<T>(value: &T) -> Result<String, KeyError>
where
    T: Serialize + ?Sized,
{
    let value = serde_json::to_value(value)?;
    Ok(canonical_key(&value))
}

/// Infallible form of [`serialize_key`] for payloads already held as JSON.
pub fn canonical_key(value: &Value) -> String {
    let mut key = String::new();
    write_canonical(value, &mut key);
    key
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_unstable_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (name, field)) in fields.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[derive(Serialize)]
struct PromptKey<'a, T: ?Sized> {
    prompt: &'a str,
    preferences: &'a T,
}

// == Namespaced Builders ==
/// Key for a prompt-optimization lookup.
pub fn prompt_key<T>(prompt: &str, preferences: &T) -> Result<String, KeyError>
where
    T: Serialize + ?Sized,
{
    let body = serialize_key(&PromptKey {
        prompt,
        preferences,
    })?;
    Ok(format!("{PROMPT_PREFIX}{body}"))
}

/// Key for an arbitrary analysis payload.
pub fn analysis_key<T>(payload: &T) -> Result<String, KeyError>
where
    T: Serialize + ?Sized,
{
    Ok(format!("{ANALYSIS_PREFIX}{}", serialize_key(payload)?))
}

/// Key for a provider status lookup.
pub fn status_key(provider: &str) -> String {
    format!("{STATUS_PREFIX}{}", Value::String(provider.to_string()))
}
