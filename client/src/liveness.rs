use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Tracks whether the consumer that started some async work is still
/// around to receive its result.
///
/// Clones share the flag. Once killed a liveness never comes back; a new
/// activation gets a new `Liveness`.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn kill(&self) {
        self.0.store(false, Ordering::Release);
    }
}
