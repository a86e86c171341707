//! In-memory stand-ins for the remote services the client talks to.
//!
//! - [`MockVerificationBackend`] plays back scripted session, status and
//!   code responses, each after an optional delay, and counts calls.
//! - [`RecordingNavigator`] remembers every navigation and when it happened.
//! - [`MockIdentityProvider`] keeps a tiny user pool in memory.
//!
//! Delays use `tokio::time::sleep`, so tests running with paused time decide
//! exactly when each response lands.

use async_trait::async_trait;
use client::auth::{
    AuthError, AuthTokens, Credentials, IdentityProvider, NewAccount,
    SignUpResult,
};
use client::verification::{Destination, Navigator, VerificationBackend};
use payloads::responses::{SessionUser, UserStatus, VerificationCode};
use payloads::{ClientError, SubjectId};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{Instant, sleep};

use crate::id_token;

/// One scripted reply: wait `delay`, then answer.
#[derive(Debug, Clone)]
pub struct Scripted<T> {
    pub delay: Duration,
    /// Errors become a 500 carrying this message.
    pub result: Result<T, String>,
}

impl<T> Scripted<T> {
    pub fn ok(value: T) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(value),
        }
    }

    pub fn err(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(message.to_string()),
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn play(self) -> Result<T, ClientError> {
        sleep(self.delay).await;
        self.result.map_err(|message| {
            ClientError::APIError(StatusCode::INTERNAL_SERVER_ERROR, message)
        })
    }
}

#[derive(Default)]
struct BackendState {
    session: Mutex<Option<Scripted<SessionUser>>>,
    statuses: Mutex<VecDeque<Scripted<UserStatus>>>,
    codes: Mutex<VecDeque<Scripted<VerificationCode>>>,
    session_calls: AtomicUsize,
    status_calls: AtomicUsize,
    code_calls: AtomicUsize,
}

/// Statuses default to "pending" once the script runs out; codes default to
/// an error.
#[derive(Clone, Default)]
pub struct MockVerificationBackend {
    state: Arc<BackendState>,
}

impl MockVerificationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, sub: &str) -> Self {
        *self.state.session.lock().unwrap() = Some(Scripted::ok(SessionUser {
            sub: SubjectId(sub.to_string()),
            email: Some(format!("{sub}@example.com")),
        }));
        self
    }

    pub fn with_session_error(self, message: &str) -> Self {
        *self.state.session.lock().unwrap() = Some(Scripted::err(message));
        self
    }

    pub fn push_status(&self, reply: Scripted<&str>) -> &Self {
        let reply = Scripted {
            delay: reply.delay,
            result: reply.result.map(|status| UserStatus {
                status: status.to_string(),
            }),
        };
        self.state.statuses.lock().unwrap().push_back(reply);
        self
    }

    /// Queue a code that expires at `expires_at` (epoch seconds).
    pub fn push_code(
        &self,
        code: &str,
        expires_at: i64,
        delay: Duration,
    ) -> &Self {
        let reply = Scripted::ok(VerificationCode {
            verification_code: code.to_string(),
            verification_expires: expires_at,
        })
        .after(delay);
        self.state.codes.lock().unwrap().push_back(reply);
        self
    }

    pub fn push_code_error(&self, message: &str, delay: Duration) -> &Self {
        let reply = Scripted::err(message).after(delay);
        self.state.codes.lock().unwrap().push_back(reply);
        self
    }

    pub fn session_calls(&self) -> usize {
        self.state.session_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.state.status_calls.load(Ordering::SeqCst)
    }

    pub fn code_calls(&self) -> usize {
        self.state.code_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationBackend for MockVerificationBackend {
    async fn session_user(&self) -> Result<SessionUser, ClientError> {
        self.state.session_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .state
            .session
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Scripted::err("no session"));
        reply.play().await
    }

    async fn user_status(
        &self,
        _subject_id: &SubjectId,
    ) -> Result<UserStatus, ClientError> {
        self.state.status_calls.fetch_add(1, Ordering::SeqCst);
        let reply =
            self.state.statuses.lock().unwrap().pop_front().unwrap_or_else(
                || {
                    Scripted::ok(UserStatus {
                        status: "pending".into(),
                    })
                },
            );
        reply.play().await
    }

    async fn verification_code(
        &self,
        _subject_id: &SubjectId,
    ) -> Result<VerificationCode, ClientError> {
        self.state.code_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .state
            .codes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Scripted::err("no code scripted"));
        reply.play().await
    }
}

/// Records navigations with the (possibly paused) runtime time they
/// happened at.
#[derive(Clone, Default)]
pub struct RecordingNavigator {
    visits: Arc<Mutex<Vec<(Destination, Instant)>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<(Destination, Instant)> {
        self.visits.lock().unwrap().clone()
    }

    pub fn destinations(&self) -> Vec<Destination> {
        self.visits().into_iter().map(|(d, _)| d).collect()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination) {
        self.visits
            .lock()
            .unwrap()
            .push((destination, Instant::now()));
    }
}

pub const MOCK_CONFIRMATION_CODE: &str = "123456";
pub const MOCK_RESET_CODE: &str = "654321";

#[derive(Debug, Clone)]
struct MockUser {
    password: String,
    confirmed: bool,
    reset_requested: bool,
}

/// A user pool held in memory. Every new account gets
/// [`MOCK_CONFIRMATION_CODE`]; every reset gets [`MOCK_RESET_CODE`].
#[derive(Clone, Default)]
pub struct MockIdentityProvider {
    users: Arc<Mutex<HashMap<String, MockUser>>>,
    calls: Arc<AtomicUsize>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account directly, skipping sign-up.
    pub fn with_user(
        self,
        email: &str,
        password: &str,
        confirmed: bool,
    ) -> Self {
        self.users.lock().unwrap().insert(
            email.to_string(),
            MockUser {
                password: password.to_string(),
                confirmed,
                reset_requested: false,
            },
        );
        self
    }

    /// Number of provider calls made, to check validation short-circuits.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn is_confirmed(&self, email: &str) -> bool {
        self.users
            .lock()
            .unwrap()
            .get(email)
            .is_some_and(|user| user.confirmed)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthTokens, AuthError> {
        self.record_call();
        let users = self.users.lock().unwrap();
        let user = users
            .get(&credentials.email)
            .filter(|user| {
                user.password == credentials.password.expose_secret()
            })
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.confirmed {
            return Err(AuthError::UserNotConfirmed);
        }
        let sub = format!("sub-{}", credentials.email);
        Ok(AuthTokens {
            access_token: SecretString::from(format!("access-{sub}")),
            id_token: SecretString::from(id_token(
                &sub,
                Some(&credentials.email),
            )),
            refresh_token: SecretString::from(format!("refresh-{sub}")),
        })
    }

    async fn sign_up(
        &self,
        account: &NewAccount,
    ) -> Result<SignUpResult, AuthError> {
        self.record_call();
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&account.email) {
            return Err(AuthError::UsernameExists);
        }
        users.insert(
            account.email.clone(),
            MockUser {
                password: account.password.expose_secret().to_string(),
                confirmed: false,
                reset_requested: false,
            },
        );
        Ok(SignUpResult {
            user_confirmed: false,
            user_sub: Some(format!("sub-{}", account.email)),
            code_destination: Some(account.email.clone()),
        })
    }

    async fn confirm_sign_up(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), AuthError> {
        self.record_call();
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(email).ok_or(AuthError::InvalidCredentials)?;
        if code != MOCK_CONFIRMATION_CODE {
            return Err(AuthError::CodeMismatch);
        }
        user.confirmed = true;
        Ok(())
    }

    async fn resend_confirmation_code(
        &self,
        email: &str,
    ) -> Result<(), AuthError> {
        self.record_call();
        match self.users.lock().unwrap().get(email) {
            Some(_) => Ok(()),
            None => Err(AuthError::InvalidCredentials),
        }
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.record_call();
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(email).ok_or(AuthError::InvalidCredentials)?;
        user.reset_requested = true;
        Ok(())
    }

    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        self.record_call();
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(email).ok_or(AuthError::InvalidCredentials)?;
        if !user.reset_requested {
            return Err(AuthError::ExpiredCode);
        }
        if code != MOCK_RESET_CODE {
            return Err(AuthError::CodeMismatch);
        }
        user.password = new_password.expose_secret().to_string();
        user.reset_requested = false;
        Ok(())
    }
}
