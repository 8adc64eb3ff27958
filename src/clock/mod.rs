pub mod mock;
mod system;

#[cfg(test)]
pub use self::mock::MockClock;

pub use self::system::SystemClock;

use std::time::{Duration, Instant};

/// Source of time for RTT sampling and transfer timing
pub trait Clock: Send + Sync {
    /// Returns the current instant
    fn now(&self) -> Instant;

    /// Time elapsed since `earlier`, saturating at zero
    fn since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}
