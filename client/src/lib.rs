//! Client-side state for the player portal: polling fetch controllers, the
//! avatar verification poller, and the sign-in flows.
//!
//! Nothing here depends on a UI framework. Controllers publish snapshots on
//! `tokio::sync::watch` channels and views render whatever they receive.

pub mod auth;
pub mod config;
pub mod creatures;
pub mod flows;
pub mod liveness;
pub mod logs;
pub mod paged;
pub mod poll;
pub mod time;
pub mod verification;

pub use liveness::Liveness;
pub use poll::{FetchState, PollingFetch};
pub use time::TimeSource;
