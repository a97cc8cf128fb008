//! Injectable time source.

use chrono::{DateTime, Utc};

/// Time source abstraction so domain logic never calls `Utc::now()`
/// directly and tests run on frozen time.
pub trait Clock: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
