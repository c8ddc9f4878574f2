//! Taskdesk core: an authenticated client for the project/task
//! administration API.
//!
//! - [`api::ApiClient`]: bearer-authenticated requests with single-flight
//!   token refresh, plus typed resource helpers
//! - [`auth::SessionManager`]: login, logout, verification and proactive
//!   expiry handling
//! - [`config::Config`]: persisted client settings

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ErrorBody, RequestOptions};
pub use auth::{Session, SessionManager, SessionStatus, SessionStore};
pub use config::{Config, StoreBackend};
