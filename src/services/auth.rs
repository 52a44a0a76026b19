// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication session: credential exchange, token storage and device
//! binding.
//!
//! Handles:
//! - Login with the device fingerprint, including first-login and
//!   new-device outcomes
//! - First-login password change and regular password updates
//! - Profile refresh, where 401/403 means the account signed in elsewhere
//! - Restoring a persisted session at start-up and logging out
//!
//! `AuthSession` is the only writer of auth state. Every other component
//! asks for [`AuthSession::bearer_token`] right before each call.

use crate::error::{ClientError, Notice, Result};
use crate::models::{Student, User};
use crate::services::api::{ApiClient, ApiError};
use crate::services::device::DeviceIdentity;
use crate::services::store::{TokenStore, FIRST_LOGIN_TOKEN_KEY, TOKEN_KEY};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use validator::Validate;

/// Server-issued placeholder password that must be replaced on first login.
const DEFAULT_PASSWORD: &str = "1234";

/// Auth lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    SignedOut,
    Authenticating,
    /// Only the single-purpose first-login token is held.
    PasswordChangeRequired { first_login_token: String },
    /// `user` is `None` while a restored or freshly exchanged token has not
    /// been validated by a profile fetch yet.
    Authenticated { token: String, user: Option<User> },
}

impl AuthState {
    /// State name for logs (never includes tokens).
    pub fn name(&self) -> &'static str {
        match self {
            AuthState::SignedOut => "signed_out",
            AuthState::Authenticating => "authenticating",
            AuthState::PasswordChangeRequired { .. } => "password_change_required",
            AuthState::Authenticated { .. } => "authenticated",
        }
    }
}

/// Successful outcomes of [`AuthSession::login`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    SignedIn(User),
    /// Signed in from a device the server had not seen; it has emailed a
    /// security notice.
    NewDevice(User),
    /// The server issued a first-login token only.
    PasswordChangeRequired,
}

impl LoginOutcome {
    pub fn notice(&self) -> Notice {
        match self {
            LoginOutcome::SignedIn(_) => {
                Notice::new("Welcome back!", Some("Login successful".to_string()))
            }
            LoginOutcome::NewDevice(_) => Notice::new(
                "New Device Detected",
                Some(
                    "You have logged in from a new device. A security email has been sent to your registered email address."
                        .to_string(),
                ),
            ),
            LoginOutcome::PasswordChangeRequired => Notice::new(
                "Password Change Required",
                Some("Please create a new password".to_string()),
            ),
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    matric_no: &'a str,
    password: &'a str,
    device_id: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    student: Student,
    #[serde(default)]
    new_device: bool,
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    new_password: &'a str,
}

#[derive(Serialize)]
struct UpdatePasswordRequest<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    student: Student,
}

#[derive(Validate)]
struct PasswordRule {
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    password: String,
}

/// Check a new password and its confirmation as entered in a form.
pub fn validate_new_password(new_password: &str, confirmation: &str) -> Result<()> {
    if new_password.is_empty() || confirmation.is_empty() {
        return Err(ClientError::Validation("Please fill in all fields".to_string()));
    }
    check_length(new_password)?;
    if new_password != confirmation {
        return Err(ClientError::Validation("Passwords do not match".to_string()));
    }
    Ok(())
}

/// Rules for replacing the server-issued first-login password.
pub fn validate_first_password(new_password: &str) -> Result<()> {
    check_length(new_password)?;
    if new_password == DEFAULT_PASSWORD {
        return Err(ClientError::Validation(
            "Please choose a password different from the default".to_string(),
        ));
    }
    Ok(())
}

/// Rules for changing the password of a signed-in student.
pub fn validate_password_update(old_password: &str, new_password: &str) -> Result<()> {
    if old_password.is_empty() {
        return Err(ClientError::Validation(
            "Please enter your current password".to_string(),
        ));
    }
    check_length(new_password)?;
    if old_password == new_password {
        return Err(ClientError::Validation(
            "New password must be different from current password".to_string(),
        ));
    }
    Ok(())
}

fn check_length(password: &str) -> Result<()> {
    PasswordRule {
        password: password.to_string(),
    }
    .validate()
    .map_err(|errors| {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| errors.to_string());
        ClientError::Validation(message)
    })
}

/// Owns the auth state and its persisted tokens. Clones share state.
#[derive(Clone)]
pub struct AuthSession {
    api: ApiClient,
    store: Arc<dyn TokenStore>,
    device: DeviceIdentity,
    state: Arc<RwLock<AuthState>>,
    /// Bumped (under the state write lock) whenever credentials are
    /// cleared. A login that started under an older value must not write
    /// its result.
    epoch: Arc<AtomicU64>,
    /// State displaced by a login in flight, restored if the login fails.
    before_login: Arc<Mutex<Option<AuthState>>>,
    initialized: Arc<AtomicBool>,
}

impl AuthSession {
    pub fn new(api: ApiClient, store: Arc<dyn TokenStore>, device: DeviceIdentity) -> Self {
        Self {
            api,
            store,
            device,
            state: Arc::new(RwLock::new(AuthState::SignedOut)),
            epoch: Arc::new(AtomicU64::new(0)),
            before_login: Arc::new(Mutex::new(None)),
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, AuthState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, next: AuthState) {
        let mut state = self.write_state();
        tracing::debug!(from = state.name(), to = next.name(), "Auth state transition");
        *state = next;
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AuthState {
        self.read_state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.read_state(), AuthState::Authenticated { .. })
    }

    pub fn user(&self) -> Option<User> {
        match &*self.read_state() {
            AuthState::Authenticated { user, .. } => user.clone(),
            _ => None,
        }
    }

    /// Device fingerprint sent with login and ballots.
    pub fn device_identity(&self) -> String {
        self.device.identity()
    }

    /// The session token, read fresh for each call.
    pub fn bearer_token(&self) -> Result<String> {
        match &*self.read_state() {
            AuthState::Authenticated { token, .. } => Ok(token.clone()),
            AuthState::PasswordChangeRequired { .. } => Err(ClientError::FirstLoginRequired),
            AuthState::SignedOut | AuthState::Authenticating => Err(ClientError::Unauthenticated),
        }
    }

    // ─── Start-up ────────────────────────────────────────────────────────────

    /// Restore a persisted session. Runs once per process.
    ///
    /// A restored token is trusted provisionally and validated with a
    /// profile fetch; [`ClientError::DeviceInvalidated`] propagates so the
    /// caller can explain why the session ended.
    pub async fn initialize(&self) -> Result<Option<User>> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(ClientError::InvalidState("auth session already initialized"));
        }

        if let Some(token) = self.store.get(TOKEN_KEY).await? {
            tracing::info!("Restoring persisted session");
            self.set_state(AuthState::Authenticated { token, user: None });
            let user = self.fetch_profile().await?;
            return Ok(Some(user));
        }

        if let Some(first_login_token) = self.store.get(FIRST_LOGIN_TOKEN_KEY).await? {
            tracing::info!("Restoring pending first-login password change");
            self.set_state(AuthState::PasswordChangeRequired { first_login_token });
        }

        Ok(None)
    }

    // ─── Login ───────────────────────────────────────────────────────────────

    /// Exchange credentials (plus device fingerprint) for a session.
    pub async fn login(&self, matric_no: &str, password: &str) -> Result<LoginOutcome> {
        let matric_no = matric_no.trim();
        if matric_no.is_empty() || password.is_empty() {
            return Err(ClientError::Validation(
                "Please enter both matric number and password".to_string(),
            ));
        }

        let epoch = {
            let mut state = self.write_state();
            if *state == AuthState::Authenticating {
                return Err(ClientError::InvalidState("sign-in already in progress"));
            }
            let previous = std::mem::replace(&mut *state, AuthState::Authenticating);
            *self.displaced() = Some(previous);
            self.epoch.load(Ordering::SeqCst)
        };

        let result = self.login_inner(matric_no, password, epoch).await;
        if result.is_err() {
            let previous = self.displaced().take().unwrap_or(AuthState::SignedOut);
            if !self.settle_login(epoch, previous) {
                tracing::debug!("Signed out during failed login, keeping signed-out state");
            }
        }
        result
    }

    fn displaced(&self) -> std::sync::MutexGuard<'_, Option<AuthState>> {
        self.before_login.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply the end state of a login, unless credentials were cleared
    /// since the login started.
    fn settle_login(&self, epoch: u64, next: AuthState) -> bool {
        let mut state = self.write_state();
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        tracing::debug!(from = state.name(), to = next.name(), "Auth state transition");
        *state = next;
        self.displaced().take();
        true
    }

    /// Undo the persistence of a login that was overtaken by a logout.
    async fn discard_login(&self, key: &str, token: &str) -> Result<LoginOutcome> {
        if self.store.get(key).await?.as_deref() == Some(token) {
            self.store.remove(key).await?;
        }
        tracing::info!("Signed out while signing in, discarding login result");
        Err(ClientError::InvalidState("sign-in cancelled by logout"))
    }

    async fn login_inner(
        &self,
        matric_no: &str,
        password: &str,
        epoch: u64,
    ) -> Result<LoginOutcome> {
        let device_id = self.device.identity();
        let request = LoginRequest {
            matric_no,
            password,
            device_id: &device_id,
        };

        let response: std::result::Result<LoginResponse, ApiError> = self
            .api
            .send_json(Method::POST, "/auth/login", None, &request)
            .await;

        match response {
            Ok(login) => {
                self.store.set(TOKEN_KEY, &login.token).await?;
                self.store.remove(FIRST_LOGIN_TOKEN_KEY).await?;

                let user = User::from(login.student);
                let settled = self.settle_login(
                    epoch,
                    AuthState::Authenticated {
                        token: login.token.clone(),
                        user: Some(user.clone()),
                    },
                );
                if !settled {
                    return self.discard_login(TOKEN_KEY, &login.token).await;
                }

                tracing::info!(matric_no, new_device = login.new_device, "Signed in");
                if login.new_device {
                    Ok(LoginOutcome::NewDevice(user))
                } else {
                    Ok(LoginOutcome::SignedIn(user))
                }
            }
            Err(ApiError::Status { status: 403, body })
                if body.code.as_deref() == Some("FIRST_LOGIN") =>
            {
                let first_login_token = body.token.ok_or_else(|| ClientError::Server {
                    status: 403,
                    message: "First login token missing from response".to_string(),
                })?;

                self.store.remove(TOKEN_KEY).await?;
                self.store
                    .set(FIRST_LOGIN_TOKEN_KEY, &first_login_token)
                    .await?;
                let settled = self.settle_login(
                    epoch,
                    AuthState::PasswordChangeRequired {
                        first_login_token: first_login_token.clone(),
                    },
                );
                if !settled {
                    return self
                        .discard_login(FIRST_LOGIN_TOKEN_KEY, &first_login_token)
                        .await;
                }

                tracing::info!(matric_no, "First login, password change required");
                Ok(LoginOutcome::PasswordChangeRequired)
            }
            Err(e) => {
                tracing::warn!(matric_no, status = ?e.status(), code = ?e.code(), "Login rejected");
                Err(e.into_client_error("Login failed"))
            }
        }
    }

    // ─── Passwords ───────────────────────────────────────────────────────────

    /// Replace the first-login password and obtain a full session token.
    ///
    /// Only valid in `PasswordChangeRequired`; the first-login token is
    /// destroyed as soon as the exchange succeeds.
    ///
    /// Once the exchange succeeds the session is `Authenticated` whatever
    /// happens next. A failed profile fetch is then logged and reported as
    /// `Ok(None)`; call [`fetch_profile`](Self::fetch_profile) to retry.
    /// Only `DeviceInvalidated` is still returned as an error.
    pub async fn change_password(&self, new_password: &str) -> Result<Option<User>> {
        let first_login_token = match &*self.read_state() {
            AuthState::PasswordChangeRequired { first_login_token } => first_login_token.clone(),
            _ => {
                return Err(ClientError::InvalidState(
                    "change_password requires a first-login token",
                ))
            }
        };

        validate_first_password(new_password)?;

        let response: TokenResponse = self
            .api
            .send_json(
                Method::PATCH,
                "/auth/change-password",
                Some(&first_login_token),
                &ChangePasswordRequest { new_password },
            )
            .await
            .map_err(|e| e.into_client_error("Password change failed"))?;

        let token = response.token.ok_or_else(|| {
            ClientError::Internal(anyhow::anyhow!("Password change response has no token"))
        })?;

        self.store.set(TOKEN_KEY, &token).await?;
        self.store.remove(FIRST_LOGIN_TOKEN_KEY).await?;
        self.set_state(AuthState::Authenticated { token, user: None });
        tracing::info!("First-login password changed");

        match self.fetch_profile().await {
            Ok(user) => Ok(Some(user)),
            Err(ClientError::DeviceInvalidated) => Err(ClientError::DeviceInvalidated),
            Err(e) => {
                tracing::warn!(error = %e, "Profile fetch after password change failed");
                Ok(None)
            }
        }
    }

    /// Change the password of the signed-in student.
    ///
    /// The token is replaced only when the server issues a new one.
    pub async fn update_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let token = self.bearer_token()?;
        validate_password_update(old_password, new_password)?;

        let response: TokenResponse = self
            .api
            .send_json(
                Method::PATCH,
                "/auth/update-password",
                Some(&token),
                &UpdatePasswordRequest {
                    old_password,
                    new_password,
                },
            )
            .await
            .map_err(|e| e.into_client_error("Failed to update password"))?;

        if let Some(new_token) = response.token {
            self.store.set(TOKEN_KEY, &new_token).await?;
            let mut state = self.write_state();
            if let AuthState::Authenticated { token: current, .. } = &mut *state {
                if *current == token {
                    *current = new_token;
                }
            }
            tracing::info!("Password updated, session token replaced");
        } else {
            tracing::info!("Password updated");
        }

        Ok(())
    }

    // ─── Profile ─────────────────────────────────────────────────────────────

    /// Refresh the user profile.
    ///
    /// 401/403 means the token was invalidated by a sign-in on another
    /// device: all credentials are wiped before `DeviceInvalidated` is
    /// returned. Other failures leave the session untouched.
    pub async fn fetch_profile(&self) -> Result<User> {
        let token = self.bearer_token()?;

        match self
            .api
            .get_json::<ProfileResponse>("/auth/me", &token)
            .await
        {
            Ok(profile) => {
                let user = User::from(profile.student);
                let mut state = self.write_state();
                match &mut *state {
                    AuthState::Authenticated {
                        token: current,
                        user: slot,
                    } if *current == token => {
                        *slot = Some(user.clone());
                    }
                    _ => {
                        tracing::debug!("Session changed during profile fetch, discarding result");
                    }
                }
                Ok(user)
            }
            Err(e) if matches!(e.status(), Some(401) | Some(403)) => {
                tracing::warn!(status = ?e.status(), "Session token rejected, device invalidated");
                if self.bearer_token().ok().as_deref() == Some(token.as_str()) {
                    self.clear_credentials().await;
                }
                Err(ClientError::DeviceInvalidated)
            }
            Err(e) => Err(e.into_client_error("Failed to fetch profile")),
        }
    }

    // ─── Logout ──────────────────────────────────────────────────────────────

    /// Sign out. The server is notified best-effort; local credentials are
    /// always cleared.
    ///
    /// A login still in flight is overridden: its result is discarded and
    /// the session it displaced is the one notified.
    pub async fn logout(&self) {
        let current = self.state();
        let held = match current {
            AuthState::Authenticating => self.displaced().clone(),
            other => Some(other),
        };
        let token = match held {
            Some(AuthState::Authenticated { token, .. }) => Some(token),
            _ => None,
        };

        if let Some(token) = token {
            if let Err(e) = self.api.post_empty("/auth/logout", &token).await {
                tracing::warn!(error = %e, "Logout notification failed, clearing locally");
            }
        }

        self.clear_credentials().await;
        tracing::info!("Signed out");
    }

    /// Drop to `SignedOut` and remove every persisted token.
    async fn clear_credentials(&self) {
        {
            let mut state = self.write_state();
            self.epoch.fetch_add(1, Ordering::SeqCst);
            self.displaced().take();
            tracing::debug!(from = state.name(), to = "signed_out", "Auth state transition");
            *state = AuthState::SignedOut;
        }

        for key in [TOKEN_KEY, FIRST_LOGIN_TOKEN_KEY] {
            if let Err(e) = self.store.remove(key).await {
                tracing::error!(error = %e, key, "Failed to remove persisted token");
            }
        }
    }
}
