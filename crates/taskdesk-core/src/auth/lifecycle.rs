use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{ApiEnvelope, User};

use super::session::{Credential, Session};
use super::token::ExpiryState;

/// How often the monitor inspects the access token (5 minutes)
pub const TOKEN_CHECK_INTERVAL_SECS: u64 = 5 * 60;

/// Refresh proactively when the token expires within this window (5 minutes)
pub const TOKEN_REFRESH_HORIZON_SECS: i64 = 5 * 60;

/// Observable session state for consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Anonymous,
    Authenticated,
    SignedOut,
    /// The session ended on its own; send the user back to the login screen.
    LoginRequired,
}

/// Result of one proactive expiry check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenCheck {
    NotAuthenticated,
    /// The token carries no readable expiry.
    Unknown,
    Valid,
    Refreshed,
    RefreshFailed,
    Expired,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub access_token: String,
}

#[derive(Deserialize)]
struct LoginData {
    user: User,
    #[serde(alias = "accessToken")]
    token: String,
    #[serde(rename = "refreshToken", default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VerifyData {
    Wrapped { user: User },
    Bare(User),
}

impl VerifyData {
    fn into_user(self) -> User {
        match self {
            VerifyData::Wrapped { user } | VerifyData::Bare(user) => user,
        }
    }
}

/// Establishes, validates and tears down the session used by an [`ApiClient`].
pub struct SessionManager {
    client: ApiClient,
    status: watch::Sender<SessionStatus>,
    monitor: Mutex<Option<JoinHandle<()>>>,
    check_interval: Duration,
    refresh_horizon: chrono::Duration,
}

impl SessionManager {
    pub fn new(client: ApiClient) -> Self {
        Self::with_intervals(
            client,
            Duration::from_secs(TOKEN_CHECK_INTERVAL_SECS),
            chrono::Duration::seconds(TOKEN_REFRESH_HORIZON_SECS),
        )
    }

    pub fn with_intervals(
        client: ApiClient,
        check_interval: Duration,
        refresh_horizon: chrono::Duration,
    ) -> Self {
        let initial = if client.session().is_complete() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        };
        let (status, _) = watch::channel(initial);

        Self {
            client,
            status,
            monitor: Mutex::new(None),
            check_interval,
            refresh_horizon,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    fn session(&self) -> &Session {
        self.client.session()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// An access token and the cached profile are present. Purely local.
    /// A session without a refresh token still counts; its first 401 is final.
    pub fn is_authenticated(&self) -> bool {
        self.session().is_complete()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session().user()
    }

    // ===== Login / registration =====

    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        info!(email = email, "Logging in");
        let envelope: ApiEnvelope<LoginData> = self
            .client
            .post(
                "/auth/login",
                &json!({ "email": email, "contraseña": password }),
                RequestOptions::new().skip_auth_refresh(),
            )
            .await?;
        let data = envelope.into_result()?;
        if data.refresh_token.is_none() {
            debug!("Login response carried no refresh token");
        }

        // Never let a refresh token from an earlier session survive
        self.session().clear()?;
        self.session()
            .save_credential(&Credential::new(data.token.clone(), data.refresh_token))?;
        self.session().save_user(&data.user)?;
        self.status.send_replace(SessionStatus::Authenticated);

        info!(user_id = data.user.id, "Logged in");
        Ok(LoginOutcome {
            user: data.user,
            access_token: data.token,
        })
    }

    /// Create an account. Does not sign in.
    pub async fn register(&self, nombre: &str, email: &str, password: &str) -> Result<Value, ApiError> {
        let envelope: ApiEnvelope<Value> = self
            .client
            .post(
                "/auth/register",
                &json!({ "nombre": nombre, "email": email, "contraseña": password }),
                RequestOptions::new().skip_auth_refresh(),
            )
            .await?;
        let data = envelope.into_result()?;
        info!(email = email, "Registered account");
        Ok(data)
    }

    // ===== Logout / verification =====

    /// Invalidate the refresh token server-side if possible, then always
    /// clear the local session. Never fails.
    pub async fn logout(&self) {
        self.sign_out(SessionStatus::SignedOut, true).await;
    }

    async fn sign_out(&self, status: SessionStatus, abort_monitor: bool) {
        if abort_monitor {
            self.stop_token_monitor();
        }

        if let Some(refresh_token) = self.session().refresh_token() {
            let result: Result<Value, ApiError> = self
                .client
                .post(
                    "/auth/logout",
                    &json!({ "refreshToken": refresh_token }),
                    RequestOptions::new().skip_auth_refresh(),
                )
                .await;
            match result {
                Ok(_) => debug!("Server session invalidated"),
                Err(e) => warn!(error = %e, "Server-side logout failed, clearing local session anyway"),
            }
        }

        if let Err(e) = self.session().clear() {
            error!(error = %e, "Failed to clear local session");
        }
        self.status.send_replace(status);
        info!("Logged out");
    }

    /// Re-validate the access token. Any server-reported failure tears the
    /// local session down before the error is returned.
    pub async fn verify_token(&self) -> Result<User, ApiError> {
        let result: Result<ApiEnvelope<VerifyData>, ApiError> = self
            .client
            .get("/auth/verify", RequestOptions::new().skip_auth_refresh())
            .await;

        match result.and_then(ApiEnvelope::into_result) {
            Ok(data) => {
                let user = data.into_user();
                self.session().save_user(&user)?;
                if self.is_authenticated() {
                    self.status.send_if_modified(|status| {
                        let changed = *status != SessionStatus::Authenticated;
                        *status = SessionStatus::Authenticated;
                        changed
                    });
                }
                Ok(user)
            }
            Err(e) if e.is_connection() => {
                warn!(error = %e, "Could not reach server to verify token");
                Err(e)
            }
            Err(e) => {
                warn!(error = %e, "Token verification failed, clearing session");
                self.stop_token_monitor();
                if let Err(clear_err) = self.session().clear() {
                    error!(error = %clear_err, "Failed to clear local session");
                }
                self.status.send_replace(SessionStatus::LoginRequired);
                Err(e)
            }
        }
    }

    // ===== Password management =====

    pub async fn change_password(&self, current: &str, new_password: &str) -> Result<(), ApiError> {
        let _: Value = self
            .client
            .patch(
                "/auth/change-password",
                &json!({ "contraseñaActual": current, "nuevaContraseña": new_password }),
                RequestOptions::default(),
            )
            .await?;
        info!("Password changed");
        Ok(())
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        let _: Value = self
            .client
            .post(
                "/auth/forgot-password",
                &json!({ "email": email }),
                RequestOptions::new().skip_auth_refresh(),
            )
            .await?;
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), ApiError> {
        let _: Value = self
            .client
            .post(
                "/auth/reset-password",
                &json!({ "token": token, "contraseña": new_password }),
                RequestOptions::new().skip_auth_refresh(),
            )
            .await?;
        Ok(())
    }

    // ===== Proactive expiry handling =====

    /// Inspect the access token's embedded expiry: refresh when it is close,
    /// sign out when it has passed. Signing out also stops the monitor.
    pub async fn check_token_expiry(&self) -> TokenCheck {
        self.check_expiry(false).await
    }

    async fn check_expiry(&self, from_monitor: bool) -> TokenCheck {
        if !self.is_authenticated() {
            return TokenCheck::NotAuthenticated;
        }
        let Some(token) = self.session().access_token() else {
            return TokenCheck::NotAuthenticated;
        };

        match ExpiryState::of_token(&token, Utc::now(), self.refresh_horizon) {
            None => {
                debug!("Access token has no readable expiry");
                TokenCheck::Unknown
            }
            Some(ExpiryState::Valid) => TokenCheck::Valid,
            Some(ExpiryState::ExpiringSoon) => match self.client.refresh_session().await {
                Ok(_) => {
                    debug!("Proactively refreshed access token");
                    TokenCheck::Refreshed
                }
                Err(e) => {
                    warn!(error = %e, "Proactive token refresh failed");
                    TokenCheck::RefreshFailed
                }
            },
            Some(ExpiryState::Expired) => {
                warn!("Access token expired, signing out");
                // The monitor task must not abort itself; it exits on `Expired`
                self.sign_out(SessionStatus::LoginRequired, !from_monitor).await;
                TokenCheck::Expired
            }
        }
    }

    /// Start the periodic expiry check. No-op if already running.
    pub fn start_token_monitor(self: &Arc<Self>) {
        let mut slot = self.monitor.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                debug!("Token monitor already running");
                return;
            }
        }

        let manager = Arc::downgrade(self);
        let period = self.check_interval;
        let first_check = Instant::now() + period;
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_check, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if manager.check_expiry(true).await == TokenCheck::Expired {
                    break;
                }
            }
            debug!("Token monitor stopped");
        }));
        debug!(interval_secs = period.as_secs(), "Token monitor started");
    }

    pub fn stop_token_monitor(&self) {
        let handle = self
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Token monitor aborted");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.stop_token_monitor();
    }
}
