//! REST API client module for the project/task administration backend.
//!
//! This module provides the `ApiClient` for communicating with the backend
//! under its `/api` base path: projects, tasks, users and roles, file
//! attachments and the activity log.
//!
//! Requests carry a bearer access token. Expired tokens are refreshed
//! through `/auth/refresh-token` once per request, with a single shared
//! refresh across concurrent requests.

pub mod client;
pub mod error;
mod resources;

pub use client::{
    ApiClient, FilePart, ProgressCallback, RequestOptions, UploadForm, DEFAULT_TIMEOUT_SECS,
    REFRESH_PATH,
};
pub use error::{ApiError, ErrorBody};
