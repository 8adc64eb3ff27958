#[cfg(test)]
use crate::clock::Clock;
#[cfg(test)]
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

#[cfg(test)]
#[derive(Debug, Clone)]
/// A test clock that only moves when told to. Clones share the same time.
pub struct MockClock {
    now: Arc<Mutex<Instant>>,
}

#[cfg(test)]
impl MockClock {
    pub fn new(start: Instant) -> Self {
        MockClock {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by `d`.
    pub fn advance(&self, d: Duration) {
        let mut t = self.now.lock().unwrap();
        *t += d;
    }
}

#[cfg(test)]
impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }
}
