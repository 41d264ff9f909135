use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Source of wall-clock time, in milliseconds since the Unix epoch.
pub trait TimeProvider: Send + Sync {
    fn time_millis(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn time_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct StubTimeProvider {
    millis: AtomicU64,
}

impl StubTimeProvider {
    pub fn with_time_millis(millis: u64) -> Self {
        Self { millis: AtomicU64::new(millis) }
    }

    pub fn advance_millis(&self, delta: u64) {
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_time_millis(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl TimeProvider for StubTimeProvider {
    fn time_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

impl<T: TimeProvider + ?Sized> TimeProvider for Arc<T> {
    fn time_millis(&self) -> u64 {
        (**self).time_millis()
    }
}
