//! Bounded retry budget for send-and-wait loops.

/// Default number of transmission rounds before giving up.
pub const MAX_RETRIES: u32 = 10;

/// Outcome of asking for one more attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Go ahead; `attempt` counts from 1.
    Proceed { attempt: u32 },
    /// The budget is spent and the transfer must abort.
    Exhausted { limit: u32 },
}

/// Counts attempts since the last reset and refuses once `limit` is reached.
#[derive(Debug, Clone)]
pub struct RetryController {
    limit: u32,
    used: u32,
}

impl RetryController {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Claim one attempt.
    pub fn attempt(&mut self) -> Attempt {
        if self.used >= self.limit {
            return Attempt::Exhausted { limit: self.limit };
        }
        self.used += 1;
        Attempt::Proceed { attempt: self.used }
    }

    /// Forget previous attempts; called whenever the peer shows progress.
    pub fn reset(&mut self) {
        self.used = 0;
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}

impl Default for RetryController {
    fn default() -> Self {
        Self::new(MAX_RETRIES)
    }
}
