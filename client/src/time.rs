use jiff::Timestamp;
use tokio::time::Instant;

/// Wall-clock time derived from the runtime's monotonic clock.
///
/// The source is anchored to a timestamp when created and advances with
/// `tokio::time::Instant`, so a runtime with paused time (tests) moves the
/// wall clock along with its timers.
#[derive(Debug, Clone)]
pub struct TimeSource {
    anchor: Timestamp,
    started: Instant,
}

impl Default for TimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource {
    pub fn new() -> Self {
        Self::starting_at(Timestamp::now())
    }

    pub fn starting_at(anchor: Timestamp) -> Self {
        Self {
            anchor,
            started: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.anchor
            .checked_add(self.started.elapsed())
            .unwrap_or(Timestamp::MAX)
    }

    pub fn epoch_seconds(&self) -> i64 {
        self.now().as_second()
    }
}
