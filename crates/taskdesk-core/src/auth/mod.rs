//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: typed access to the stored token pair and cached profile,
//!   over any `SessionStore` (memory, file or OS keychain)
//! - `SessionManager`: login, logout, token verification and the periodic
//!   expiry monitor
//! - `token`: decoding of the access token's embedded expiry

pub mod credentials;
pub mod lifecycle;
pub mod session;
pub mod token;

pub use credentials::KeyringStore;
pub use lifecycle::{LoginOutcome, SessionManager, SessionStatus, TokenCheck};
pub use session::{
    Credential, FileStore, MemoryStore, Session, SessionStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
    USER_KEY,
};
pub use token::ExpiryState;
