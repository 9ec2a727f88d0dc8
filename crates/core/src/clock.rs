//! Time source abstraction so token freshness decisions can be tested
//! against a controlled clock.

use chrono::{DateTime, Utc};

/// Supplies the current time to components that make freshness decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
