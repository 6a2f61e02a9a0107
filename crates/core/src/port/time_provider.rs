// Clock

/// Every timestamp in the queue (created_at, scheduled_at, processed_at, the
/// retention cutoff) is epoch milliseconds read from this port.
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall clock, UTC
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Manually driven clock
    pub struct MockTimeProvider {
        now: AtomicI64,
    }

    impl MockTimeProvider {
        pub fn new(now_millis: i64) -> Self {
            Self {
                now: AtomicI64::new(now_millis),
            }
        }

        pub fn advance(&self, delta_ms: i64) {
            self.now.fetch_add(delta_ms, Ordering::SeqCst);
        }
    }

    impl TimeProvider for MockTimeProvider {
        fn now_millis(&self) -> i64 {
            self.now.load(Ordering::SeqCst)
        }
    }
}
