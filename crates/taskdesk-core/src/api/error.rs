use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Normalized error payload handed to callers: `{status, message, errors}`.
///
/// `status` is 0 when no response was received.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

impl ErrorBody {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    /// Look up a field-level error, accepting both the `{field: "msg"}` shape
    /// and the `[{field|path|param, msg|message}]` shape.
    pub fn field_error(&self, field: &str) -> Option<&str> {
        match self.errors.as_ref()? {
            Value::Object(map) => match map.get(field)? {
                Value::String(msg) => Some(msg.as_str()),
                Value::Array(items) => items.first().and_then(Value::as_str),
                _ => None,
            },
            Value::Array(items) => items.iter().find_map(|item| {
                let name = item
                    .get("field")
                    .or_else(|| item.get("path"))
                    .or_else(|| item.get("param"))
                    .and_then(Value::as_str)?;
                if name != field {
                    return None;
                }
                item.get("msg")
                    .or_else(|| item.get("message"))
                    .and_then(Value::as_str)
            }),
            _ => None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication required: {}", .0.message)]
    Authentication(ErrorBody),

    #[error("Access denied: {}", .0.message)]
    Forbidden(ErrorBody),

    #[error("Resource not found: {}", .0.message)]
    NotFound(ErrorBody),

    #[error("Validation failed: {}", .0.message)]
    Validation(ErrorBody),

    #[error("Server error: {}", .0.message)]
    Server(ErrorBody),

    #[error("Request failed (status {}): {}", .0.status, .0.message)]
    Request(ErrorBody),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Deserialize)]
struct ServerErrorPayload {
    message: Option<String>,
    error: Option<String>,
    errors: Option<Value>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build the normalized payload from a non-success response body.
    fn parse_body(status: reqwest::StatusCode, body: &str) -> ErrorBody {
        let code = status.as_u16();
        let fallback = || {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            } else {
                Self::truncate_body(trimmed)
            }
        };

        match serde_json::from_str::<ServerErrorPayload>(body) {
            Ok(payload) => ErrorBody {
                status: code,
                message: payload
                    .message
                    .or(payload.error)
                    .unwrap_or_else(fallback),
                errors: payload.errors.filter(|e| !e.is_null()),
            },
            Err(_) => ErrorBody::new(code, fallback()),
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let parsed = Self::parse_body(status, body);
        match status.as_u16() {
            401 => ApiError::Authentication(parsed),
            403 => ApiError::Forbidden(parsed),
            404 => ApiError::NotFound(parsed),
            422 => ApiError::Validation(parsed),
            500..=599 => ApiError::Server(parsed),
            _ => ApiError::Request(parsed),
        }
    }

    /// Classify a transport failure. Every reqwest send error means no usable
    /// response arrived.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Connection(format!("request timed out: {}", err))
        } else if err.is_connect() {
            ApiError::Connection(format!("could not connect: {}", err))
        } else {
            ApiError::Connection(err.to_string())
        }
    }

    pub fn missing_refresh_token() -> Self {
        ApiError::Authentication(ErrorBody::new(401, "No refresh token available"))
    }

    /// The normalized body, when the server produced one.
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            ApiError::Authentication(b)
            | ApiError::Forbidden(b)
            | ApiError::NotFound(b)
            | ApiError::Validation(b)
            | ApiError::Server(b)
            | ApiError::Request(b) => Some(b),
            _ => None,
        }
    }

    /// HTTP status, 0 when no response was received.
    pub fn status(&self) -> u16 {
        self.body().map(|b| b.status).unwrap_or(0)
    }

    pub fn message(&self) -> String {
        match self.body() {
            Some(b) => b.message.clone(),
            None => self.to_string(),
        }
    }

    pub fn field_error(&self, field: &str) -> Option<&str> {
        self.body().and_then(|b| b.field_error(field))
    }

    /// Normalized `{status, message, errors}` view for any variant.
    pub fn to_body(&self) -> ErrorBody {
        match self.body() {
            Some(b) => b.clone(),
            None => ErrorBody::new(0, self.to_string()),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, ApiError::Connection(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Authentication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn test_from_status_classification() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, ""),
            ApiError::Authentication(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::FORBIDDEN, ""),
            ApiError::Forbidden(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, ""),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, ""),
            ApiError::Validation(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, ""),
            ApiError::Server(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, ""),
            ApiError::Request(_)
        ));
    }

    #[test]
    fn test_validation_body_is_attached() {
        let body = r#"{"message":"Validation failed","errors":{"email":"invalid"}}"#;
        let err = ApiError::from_status(StatusCode::UNPROCESSABLE_ENTITY, body);
        assert_eq!(err.status(), 422);
        assert_eq!(err.message(), "Validation failed");
        assert_eq!(err.field_error("email"), Some("invalid"));
        assert_eq!(err.field_error("password"), None);
    }

    #[test]
    fn test_field_error_array_shape() {
        let body = ErrorBody {
            status: 422,
            message: "bad".into(),
            errors: Some(json!([
                {"path": "nombre", "msg": "required"},
                {"field": "email", "message": "taken"}
            ])),
        };
        assert_eq!(body.field_error("nombre"), Some("required"));
        assert_eq!(body.field_error("email"), Some("taken"));
    }

    #[test]
    fn test_non_json_body_uses_text_or_reason() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert_eq!(err.message(), "boom");

        let err = ApiError::from_status(StatusCode::NOT_FOUND, "");
        assert_eq!(err.message(), "Not Found");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, &body);
        assert!(err.message().contains("truncated"));
    }

    #[test]
    fn test_connection_has_no_status() {
        let err = ApiError::Connection("refused".into());
        assert_eq!(err.status(), 0);
        assert!(err.body().is_none());
        assert_eq!(err.to_body().status, 0);
    }
}
