//! Deterministic-probability fault hooks.
//!
//! A [`FaultInjector`] answers "should this packet (or ack) be skipped?"
//! It fires exactly once: the k-th consultation (0-based) fires with
//! probability `1 / (11 - k)`, so it has certainly fired by the 11th call,
//! and from then on it always answers `false`.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// Odds of the first consultation are one in `START_ODDS + 1`.
const START_ODDS: u32 = 10;

/// Which hook a session runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TestCase {
    /// Receiver drops one outgoing ack.
    #[value(name = "skip_ack")]
    SkipAck,
    /// Sender drops one outgoing data packet.
    #[value(name = "skip_seq")]
    SkipSeq,
}

pub struct FaultInjector {
    rng: Box<dyn RngCore + Send>,
    tries: u32,
    fired: bool,
}

impl FaultInjector {
    /// Use `rng` as the random source.
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            rng: Box::new(rng),
            tries: 0,
            fired: false,
        }
    }

    /// Seeded from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible schedule for tests.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn should_skip(&mut self) -> bool {
        if self.fired {
            return false;
        }
        let odds = START_ODDS.saturating_sub(self.tries);
        if self.rng.gen_range(0..=odds) == 0 {
            self.fired = true;
            true
        } else {
            self.tries += 1;
            false
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector")
            .field("tries", &self.tries)
            .field("fired", &self.fired)
            .finish()
    }
}
