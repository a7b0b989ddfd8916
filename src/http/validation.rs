//! Body field checks shared by the tool routes. All failures are 400s and
//! happen before any upstream call.

use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde_json::Value;

use crate::error::ToolError;

/// A JSON request body whose rejections answer as `ToolError::BadRequest`
/// rather than axum's plain-text responses.
#[derive(Debug)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ToolError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(request, state).await?;
        Ok(JsonBody(value))
    }
}

/// A non-empty string field, optionally capped at `max_chars` characters.
pub fn required_text<'a>(body: &'a Value, field: &str, max_chars: Option<usize>) -> Result<&'a str, ToolError> {
    let value = match body.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(ToolError::bad_request(format!("{field} is required"))),
    };
    if let Some(max) = max_chars {
        check_length(field, value, max)?;
    }
    Ok(value)
}

/// A string field that may be absent or null, but not another type.
pub fn optional_text<'a>(body: &'a Value, field: &str) -> Result<Option<&'a str>, ToolError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(ToolError::bad_request(format!("{field} must be a string"))),
    }
}

/// Rejects values longer than `max` characters; exactly `max` is accepted.
pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), ToolError> {
    if value.chars().count() > max {
        return Err(ToolError::bad_request(format!(
            "{field} exceeds maximum length of {max} characters"
        )));
    }
    Ok(())
}

/// An optional field deserialized into `T`, with a readable error otherwise.
pub fn optional_field<T: serde::de::DeserializeOwned>(
    body: &Value,
    field: &str,
    expected: &str,
) -> Result<Option<T>, ToolError> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| ToolError::bad_request(format!("{field} must be {expected}"))),
    }
}
