//! The "verify your avatar" screen: wait for the session, show a rotating
//! in-world code, and poll until the game reports the player as verified.

use async_trait::async_trait;
use payloads::responses::{SessionUser, UserStatus, VerificationCode};
use payloads::{APIClient, ClientError, GameClient, SubjectId};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval, sleep};

use crate::liveness::Liveness;
use crate::time::TimeSource;

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your session has expired. Please sign in again.";
pub const STATUS_ERROR_MESSAGE: &str = "Failed to check verification status";
pub const CODE_ERROR_MESSAGE: &str = "Failed to get verification code";

/// The remote calls the poller depends on.
#[async_trait]
pub trait VerificationBackend: Send + Sync + 'static {
    async fn session_user(&self) -> Result<SessionUser, ClientError>;

    async fn user_status(
        &self,
        subject_id: &SubjectId,
    ) -> Result<UserStatus, ClientError>;

    async fn verification_code(
        &self,
        subject_id: &SubjectId,
    ) -> Result<VerificationCode, ClientError>;
}

/// Session lookups go to the gateway, everything else to the game API.
#[derive(Clone)]
pub struct HttpVerificationBackend {
    pub gateway: APIClient,
    pub game: GameClient,
}

#[async_trait]
impl VerificationBackend for HttpVerificationBackend {
    async fn session_user(&self) -> Result<SessionUser, ClientError> {
        self.gateway.session_self().await
    }

    async fn user_status(
        &self,
        subject_id: &SubjectId,
    ) -> Result<UserStatus, ClientError> {
        self.game.user_status(subject_id).await
    }

    async fn verification_code(
        &self,
        subject_id: &SubjectId,
    ) -> Result<VerificationCode, ClientError> {
        self.game.verification_code(subject_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Dashboard,
    Login,
}

impl Destination {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Login => "/login",
        }
    }
}

/// Whatever moves the user to another page.
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, destination: Destination);
}

#[derive(Debug, Clone, Copy)]
pub struct VerificationTimings {
    pub status_interval: Duration,
    pub redirect_delay: Duration,
    /// Seconds shown on the cosmetic countdown after verification.
    pub countdown_seconds: u32,
    /// Period of the code expiry ticker and the countdown.
    pub tick: Duration,
}

impl Default for VerificationTimings {
    fn default() -> Self {
        Self {
            status_interval: Duration::from_secs(12),
            redirect_delay: Duration::from_millis(2500),
            countdown_seconds: 4,
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    AwaitingSession,
    PollingStatus,
    Verified,
    SessionExpired,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::SessionExpired)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodePhase {
    #[default]
    NoCode,
    Active,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationWindow {
    pub code: String,
    /// Epoch seconds.
    pub expires_at: i64,
}

impl VerificationWindow {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }

    pub fn seconds_remaining(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

impl From<VerificationCode> for VerificationWindow {
    fn from(code: VerificationCode) -> Self {
        Self {
            code: code.verification_code,
            expires_at: code.verification_expires,
        }
    }
}

/// Everything the verification screen renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerificationView {
    pub phase: Phase,
    pub subject_id: Option<SubjectId>,
    pub email: Option<String>,
    pub window: Option<VerificationWindow>,
    pub code_phase: CodePhase,
    pub seconds_remaining: i64,
    pub code_refreshing: bool,
    /// Seconds left on the post-verification countdown.
    pub redirect_countdown: Option<u32>,
    pub session_error: Option<String>,
    pub status_error: Option<String>,
    pub code_error: Option<String>,
}

struct Inner {
    backend: Arc<dyn VerificationBackend>,
    navigator: Arc<dyn Navigator>,
    time_source: TimeSource,
    timings: VerificationTimings,
    view: watch::Sender<VerificationView>,
    liveness: Liveness,
    started: AtomicBool,
    navigated: AtomicBool,
    /// Shared by manual and automatic code refreshes.
    code_in_flight: AtomicBool,
    /// Expiry value an automatic refresh was last issued for.
    auto_refreshed_for: AtomicI64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

pub struct VerificationPoller {
    inner: Arc<Inner>,
}

impl VerificationPoller {
    pub fn new(
        backend: Arc<dyn VerificationBackend>,
        navigator: Arc<dyn Navigator>,
        time_source: TimeSource,
        timings: VerificationTimings,
    ) -> Self {
        let (view, _) = watch::channel(VerificationView::default());
        Self {
            inner: Arc::new(Inner {
                backend,
                navigator,
                time_source,
                timings,
                view,
                liveness: Liveness::new(),
                started: AtomicBool::new(false),
                navigated: AtomicBool::new(false),
                code_in_flight: AtomicBool::new(false),
                auto_refreshed_for: AtomicI64::new(i64::MIN),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<VerificationView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> VerificationView {
        self.inner.view.borrow().clone()
    }

    /// Look up the session and start the timers. Only the first call does
    /// anything; a stopped poller stays stopped.
    pub fn start(&self) {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = self.inner.clone();
        self.inner.spawn(async move { inner.resolve_session().await });
        let inner = self.inner.clone();
        self.inner.spawn(async move { inner.run_code_ticker().await });
    }

    /// Request a new code now. Returns false when nothing was issued: no
    /// subject yet, a refresh already pending, or the flow is over.
    pub fn refresh_code(&self) -> bool {
        self.inner.request_code("manual")
    }

    /// Abort every timer and drop any result still in flight.
    pub fn stop(&self) {
        self.inner.stop();
    }
}

impl Drop for VerificationPoller {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl Inner {
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks =
            self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.liveness.is_alive() {
            return;
        }
        tasks.retain(|task| !task.is_finished());
        tasks.push(tokio::spawn(task));
    }

    fn stop(&self) {
        // killed under the view lock so no update is mid-write
        self.view.send_if_modified(|_| {
            self.liveness.kill();
            false
        });
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for task in tasks {
            task.abort();
        }
    }

    /// Apply `change` unless the poller has been stopped.
    fn update(&self, change: impl FnOnce(&mut VerificationView)) -> bool {
        self.view.send_if_modified(|view| {
            if !self.liveness.is_alive() {
                return false;
            }
            change(view);
            true
        })
    }

    fn navigate_once(&self, destination: Destination) {
        if !self.liveness.is_alive()
            || self.navigated.swap(true, Ordering::AcqRel)
        {
            return;
        }
        tracing::info!(path = destination.path(), "navigating");
        self.navigator.navigate(destination);
    }

    async fn resolve_session(self: Arc<Self>) {
        match self.backend.session_user().await {
            Ok(user) => {
                let subject_id = user.sub.clone();
                let updated = self.update(|view| {
                    view.phase = Phase::PollingStatus;
                    view.subject_id = Some(user.sub);
                    view.email = user.email;
                    view.session_error = None;
                });
                if !updated {
                    return;
                }
                tracing::debug!(%subject_id, "session resolved");
                self.request_code("initial");
                let inner = self.clone();
                self.spawn(async move {
                    inner.run_status_poll(subject_id).await
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "session lookup failed");
                self.update(|view| {
                    view.phase = Phase::SessionExpired;
                    view.session_error = Some(SESSION_EXPIRED_MESSAGE.into());
                });
                self.navigate_once(Destination::Login);
            }
        }
    }

    async fn run_status_poll(self: Arc<Self>, subject_id: SubjectId) {
        let mut ticker = interval(self.timings.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.liveness.is_alive() {
                return;
            }
            match self.backend.user_status(&subject_id).await {
                Ok(status) if status.is_verified() => {
                    self.mark_verified();
                    return;
                }
                Ok(status) => {
                    tracing::debug!(status = status.status, "not verified yet");
                    self.update(|view| view.status_error = None);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "status poll failed");
                    self.update(|view| {
                        view.status_error =
                            Some(error_message(&e, STATUS_ERROR_MESSAGE));
                    });
                }
            }
        }
    }

    fn mark_verified(self: &Arc<Self>) {
        let countdown = self.timings.countdown_seconds;
        let updated = self.update(|view| {
            view.phase = Phase::Verified;
            view.status_error = None;
            view.redirect_countdown = Some(countdown);
        });
        if !updated {
            return;
        }
        tracing::info!("verified");

        let inner = self.clone();
        self.spawn(async move {
            for remaining in (0..countdown).rev() {
                sleep(inner.timings.tick).await;
                inner.update(|view| view.redirect_countdown = Some(remaining));
            }
        });
        let inner = self.clone();
        self.spawn(async move {
            sleep(inner.timings.redirect_delay).await;
            inner.navigate_once(Destination::Dashboard);
        });
    }

    /// Keeps `seconds_remaining` current and refreshes an expired code once.
    async fn run_code_ticker(self: Arc<Self>) {
        let mut ticker = interval(self.timings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = self.time_source.epoch_seconds();
            let (phase, expired_window) = {
                let view = self.view.borrow();
                let expired = view
                    .window
                    .as_ref()
                    .filter(|window| window.is_expired(now))
                    .map(|window| window.expires_at);
                (view.phase, expired)
            };
            if phase.is_terminal() || !self.liveness.is_alive() {
                return;
            }

            self.update(|view| {
                if let Some(window) = &view.window {
                    view.seconds_remaining = window.seconds_remaining(now);
                    view.code_phase = if window.is_expired(now) {
                        CodePhase::Expired
                    } else {
                        CodePhase::Active
                    };
                }
            });

            let Some(expires_at) = expired_window else {
                continue;
            };
            if self.code_in_flight.load(Ordering::Acquire)
                || self.auto_refreshed_for.load(Ordering::Acquire) == expires_at
            {
                continue;
            }
            if self.request_code("expired") {
                self.auto_refreshed_for.store(expires_at, Ordering::Release);
            }
        }
    }

    fn request_code(self: &Arc<Self>, reason: &'static str) -> bool {
        let subject_id = {
            let view = self.view.borrow();
            if view.phase != Phase::PollingStatus {
                return false;
            }
            match &view.subject_id {
                Some(subject_id) => subject_id.clone(),
                None => return false,
            }
        };
        if !self.liveness.is_alive()
            || self.code_in_flight.swap(true, Ordering::AcqRel)
        {
            return false;
        }
        tracing::debug!(reason, "requesting verification code");
        self.update(|view| view.code_refreshing = true);

        let inner = self.clone();
        self.spawn(async move {
            let result = inner.backend.verification_code(&subject_id).await;
            let now = inner.time_source.epoch_seconds();
            inner.update(|view| {
                view.code_refreshing = false;
                match result {
                    Ok(code) => {
                        let window = VerificationWindow::from(code);
                        view.seconds_remaining = window.seconds_remaining(now);
                        view.code_phase = if window.is_expired(now) {
                            CodePhase::Expired
                        } else {
                            CodePhase::Active
                        };
                        view.window = Some(window);
                        view.code_error = None;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "code request failed");
                        view.code_error =
                            Some(error_message(&e, CODE_ERROR_MESSAGE));
                    }
                }
            });
            inner.code_in_flight.store(false, Ordering::Release);
        });
        true
    }
}

fn error_message(error: &ClientError, fallback: &str) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
