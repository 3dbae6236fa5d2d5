//! Boundary parsing shared by the request DTOs.
//!
//! The study client is loose about types (task numbers arrive as numbers or
//! strings), so DTOs keep raw JSON values and convert them here.

use serde::de::DeserializeOwned;
use serde_json::Value;
use study_core::ParticipantKey;

use crate::error::ApiError;
use crate::error::ApiResult;

pub const INVALID_KEY: &str = "Invalid PreSurvey ID format";

/// Parse a participant key, rejecting absent or malformed ids.
pub fn participant_key(raw: Option<&str>) -> ApiResult<ParticipantKey> {
    raw.and_then(|raw| raw.parse().ok())
        .ok_or_else(|| ApiError::bad_request(INVALID_KEY))
}

/// Integer from a JSON number or a numeric string.
pub fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Treat JSON `null` the same as an absent field.
pub fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Trimmed, non-empty text. Pushes `"<field> is required"` otherwise.
pub fn required_text(field: &str, raw: Option<&str>, errors: &mut Vec<String>) -> Option<String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => Some(text.to_string()),
        None => {
            errors.push(format!("{field} is required"));
            None
        }
    }
}

/// Optional text, trimmed; blank becomes `None`.
pub fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Required text converted through the type's serde contract.
pub fn required_choice<T: DeserializeOwned>(
    field: &str,
    raw: Option<&str>,
    errors: &mut Vec<String>,
) -> Option<T> {
    let text = required_text(field, raw, errors)?;
    match serde_json::from_value(Value::String(text.clone())) {
        Ok(value) => Some(value),
        Err(_) => {
            errors.push(format!("'{text}' is not a valid value for {field}"));
            None
        }
    }
}
