// Identifier source

/// Mints job ids and spool message ids. Swapped for a counter in tests so
/// assertions can name ids up front.
pub trait IdProvider: Send + Sync {
    fn next_id(&self) -> String;
}

pub struct UuidV4Ids;

impl IdProvider for UuidV4Ids {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Yields `job-1`, `job-2`, ...
    #[derive(Default)]
    pub struct SequentialIdProvider {
        counter: AtomicU64,
    }

    impl IdProvider for SequentialIdProvider {
        fn next_id(&self) -> String {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("job-{}", n)
        }
    }
}
