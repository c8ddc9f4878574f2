//! Data models for the project/task administration API.
//!
//! - `User`, `Role`: accounts and their permissions
//! - `Project`, `Task`, `TaskStatus`: the work being tracked
//! - `FileAttachment`: uploaded files linked to projects or tasks
//! - `ActivityEntry`: audit log records
//! - `ApiEnvelope`: the `{success, data, message}` wrapper every endpoint uses

pub mod activity;
pub mod file;
pub mod project;
pub mod user;

pub use activity::ActivityEntry;
pub use file::FileAttachment;
pub use project::{NewProject, NewTask, Project, Task, TaskStatus};
pub use user::{NewUser, Role, User};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ApiError, ErrorBody};

/// Standard response wrapper: `{success, data, message}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T: DeserializeOwned> ApiEnvelope<T> {
    /// Unwrap `data`, honoring the `success` flag. A 2xx answer that reports
    /// `success: false` becomes `ApiError::Request` with status 200 and the
    /// server's message. A missing `data` is read as `null`.
    pub fn into_result(self) -> Result<T, ApiError> {
        if !self.success {
            let message = self
                .message
                .unwrap_or_else(|| "Request was not successful".to_string());
            return Err(ApiError::Request(ErrorBody::new(200, message)));
        }
        match self.data {
            Some(data) => Ok(data),
            None => serde_json::from_value(Value::Null)
                .map_err(|_| ApiError::InvalidResponse("Response has no data".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_defaults_success() {
        let env: ApiEnvelope<Vec<i64>> = serde_json::from_str(r#"{"data": [1, 2]}"#).unwrap();
        assert!(env.success);
        assert_eq!(env.into_result().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_envelope_failure_flag_is_an_error() {
        let env: ApiEnvelope<Vec<i64>> =
            serde_json::from_str(r#"{"success": false, "message": "Cuenta desactivada"}"#).unwrap();
        let err = env.into_result().unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
        assert_eq!(err.status(), 200);
        assert_eq!(err.message(), "Cuenta desactivada");
    }

    #[test]
    fn test_envelope_missing_data() {
        let env: ApiEnvelope<Value> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert_eq!(env.into_result().unwrap(), Value::Null);

        let env: ApiEnvelope<Vec<i64>> = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(matches!(env.into_result(), Err(ApiError::InvalidResponse(_))));
    }
}
