//! A fetch controller that keeps one piece of remote data fresh.
//!
//! [`PollingFetch`] is the framework-independent version of a "use fetch"
//! hook: a view activates it with a key, reads [`FetchState`] snapshots from
//! a watch channel, and deactivates it when it goes away. While active, a
//! background timer refreshes the data without flipping `is_loading`.

use futures::future::BoxFuture;
use jiff::Timestamp;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::liveness::Liveness;
use crate::time::TimeSource;

/// Snapshot of a fetch controller.
///
/// `is_loading` and `is_refreshing` are never both set: the first marks a
/// foreground request (first load, manual refetch), the second a silent
/// timer-driven update.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub error: Option<String>,
    pub last_updated: Option<Timestamp>,
}

impl<T> Default for FetchState<T> {
    fn default() -> Self {
        Self {
            data: None,
            is_loading: false,
            is_refreshing: false,
            error: None,
            last_updated: None,
        }
    }
}

impl<T> FetchState<T> {
    pub fn is_in_flight(&self) -> bool {
        self.is_loading || self.is_refreshing
    }

    /// True while the first load runs and nothing has been shown yet.
    pub fn is_initial_loading(&self) -> bool {
        self.is_loading && self.data.is_none() && self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Foreground,
    Background,
}

/// What a fetch function receives for each request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub key: String,
    /// Long-running fetches (several pages) check this between requests.
    pub liveness: Liveness,
}

type FetchFn<T> =
    dyn Fn(FetchRequest) -> BoxFuture<'static, Result<T, String>> + Send + Sync;

pub const DEFAULT_FETCH_ERROR: &str = "Failed to load data";

struct Shared<T> {
    state: watch::Sender<FetchState<T>>,
    fetch_fn: Box<FetchFn<T>>,
    fallback_error: String,
    time_source: TimeSource,
    /// Token of the most recently issued request. Completions carrying an
    /// older token are discarded.
    latest_request: AtomicU64,
}

struct Activation {
    key: String,
    liveness: Liveness,
    ticker: Option<JoinHandle<()>>,
}

pub struct PollingFetch<T> {
    shared: Arc<Shared<T>>,
    interval: Option<Duration>,
    activation: Option<Activation>,
}

/// Options for a [`PollingFetch`], gathered before any task can share them.
pub struct PollingFetchBuilder<T> {
    fetch_fn: Box<FetchFn<T>>,
    interval: Option<Duration>,
    fallback_error: String,
    time_source: Option<TimeSource>,
}

impl<T: Send + Sync + 'static> PollingFetchBuilder<T> {
    /// Refresh in the background on this period while active.
    pub fn every(mut self, period: Duration) -> Self {
        self.interval = Some(period);
        self
    }

    /// Message shown when a fetch fails without a message of its own.
    pub fn fallback_error(mut self, message: impl Into<String>) -> Self {
        self.fallback_error = message.into();
        self
    }

    pub fn time_source(mut self, time_source: TimeSource) -> Self {
        self.time_source = Some(time_source);
        self
    }

    pub fn build(self) -> PollingFetch<T> {
        let (state, _) = watch::channel(FetchState::default());
        PollingFetch {
            shared: Arc::new(Shared {
                state,
                fetch_fn: self.fetch_fn,
                fallback_error: self.fallback_error,
                time_source: self.time_source.unwrap_or_default(),
                latest_request: AtomicU64::new(0),
            }),
            interval: self.interval,
            activation: None,
        }
    }
}

impl<T: Send + Sync + 'static> PollingFetch<T> {
    pub fn builder<F, Fut>(fetch_fn: F) -> PollingFetchBuilder<T>
    where
        F: Fn(FetchRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        PollingFetchBuilder {
            fetch_fn: Box::new(move |request| Box::pin(fetch_fn(request))),
            interval: None,
            fallback_error: DEFAULT_FETCH_ERROR.to_string(),
            time_source: None,
        }
    }

    /// A controller without background refresh.
    pub fn new<F, Fut>(fetch_fn: F) -> Self
    where
        F: Fn(FetchRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        Self::builder(fetch_fn).build()
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state.subscribe()
    }

    pub fn state(&self) -> FetchState<T>
    where
        T: Clone,
    {
        self.shared.state.borrow().clone()
    }

    pub fn key(&self) -> Option<&str> {
        self.activation.as_ref().map(|a| a.key.as_str())
    }

    pub fn is_active(&self) -> bool {
        self.activation.is_some()
    }

    /// Start (or restart) fetching for `key`.
    ///
    /// An absent or empty key clears the data: there is nothing to fetch.
    pub fn activate(&mut self, key: Option<&str>) {
        self.deactivate();

        let Some(key) = key.filter(|key| !key.is_empty()) else {
            self.shared.state.send_modify(|state| {
                *state = FetchState::default();
            });
            return;
        };

        let liveness = Liveness::new();
        self.shared.start_fetch(
            key.to_string(),
            liveness.clone(),
            FetchKind::Foreground,
        );

        let ticker = self.interval.map(|period| {
            let shared = self.shared.clone();
            let key = key.to_string();
            let liveness = liveness.clone();
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if !liveness.is_alive() {
                        break;
                    }
                    shared.start_fetch(
                        key.clone(),
                        liveness.clone(),
                        FetchKind::Background,
                    );
                }
            })
        });

        self.activation = Some(Activation {
            key: key.to_string(),
            liveness,
            ticker,
        });
    }

    /// Foreground fetch for the active key. Leaves the background timer on
    /// its existing schedule. Returns false when inactive.
    pub fn refetch(&self) -> bool {
        match &self.activation {
            Some(activation) => {
                self.shared.start_fetch(
                    activation.key.clone(),
                    activation.liveness.clone(),
                    FetchKind::Foreground,
                );
                true
            }
            None => false,
        }
    }
}

impl<T> PollingFetch<T> {
    /// Stop the timer and drop every result that arrives from now on. The
    /// last published state is left as is.
    pub fn deactivate(&mut self) {
        if let Some(activation) = self.activation.take() {
            // killed under the state lock so no completion is mid-write
            self.shared.state.send_if_modified(|_| {
                activation.liveness.kill();
                false
            });
            if let Some(ticker) = activation.ticker {
                ticker.abort();
            }
            tracing::debug!(key = activation.key, "fetch deactivated");
        }
    }
}

impl<T> Drop for PollingFetch<T> {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl<T: Send + Sync + 'static> Shared<T> {
    fn start_fetch(
        self: &Arc<Self>,
        key: String,
        liveness: Liveness,
        kind: FetchKind,
    ) {
        let token = self.latest_request.fetch_add(1, Ordering::AcqRel) + 1;
        let marked = self.state.send_if_modified(|state| {
            if !liveness.is_alive() {
                return false;
            }
            state.is_loading = kind == FetchKind::Foreground;
            state.is_refreshing = kind == FetchKind::Background;
            true
        });
        if !marked {
            return;
        }

        let shared = self.clone();
        tokio::spawn(async move {
            let request = FetchRequest {
                key,
                liveness: liveness.clone(),
            };
            let result = (shared.fetch_fn)(request).await;
            shared.complete(token, &liveness, kind, result);
        });
    }

    fn complete(
        &self,
        token: u64,
        liveness: &Liveness,
        kind: FetchKind,
        result: Result<T, String>,
    ) {
        let now = self.time_source.now();
        let applied = self.state.send_if_modified(|state| {
            if !liveness.is_alive()
                || self.latest_request.load(Ordering::Acquire) != token
            {
                return false;
            }
            state.is_loading = false;
            state.is_refreshing = false;
            match result {
                Ok(data) => {
                    state.data = Some(data);
                    state.error = None;
                    state.last_updated = Some(now);
                }
                Err(message) => {
                    tracing::warn!(?kind, %message, "fetch failed");
                    state.error = Some(if message.trim().is_empty() {
                        self.fallback_error.clone()
                    } else {
                        message
                    });
                }
            }
            true
        });
        if !applied {
            tracing::debug!(token, "dropped stale fetch result");
        }
    }
}
