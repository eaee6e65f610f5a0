//! Randomised deposit amounts and inter-account delays.

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;

use alloy::primitives::U256;

/// Deposit amount bounds in the token's smallest unit: `base + [min, max]`.
/// Offsets may be negative as long as `base + min` stays at or above zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepositAmount {
    pub base: u128,
    pub jitter_min: i128,
    pub jitter_max: i128,
}

impl DepositAmount {
    pub fn fixed(base: u128) -> Self {
        Self {
            base,
            jitter_min: 0,
            jitter_max: 0,
        }
    }

    /// Inclusive bounds of the produced amount, or None if they overflow
    /// or drop below zero.
    pub fn bounds(&self) -> Option<(u128, u128)> {
        let base = i128::try_from(self.base).ok()?;
        let low = u128::try_from(base.checked_add(self.jitter_min)?).ok()?;
        let high = u128::try_from(base.checked_add(self.jitter_max)?).ok()?;
        Some((low, high))
    }
}

/// Inclusive window the pause between two accounts is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayWindow {
    pub min: Duration,
    pub max: Duration,
}

/// Shared random source. Seeded runs are reproducible.
pub struct Jitter {
    rng: Mutex<StdRng>,
}

impl Jitter {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Draws uniformly over the integer range `[base + min, base + max]`.
    ///
    /// Bounds are validated with the configuration; if they overflow anyway
    /// the base amount is used.
    pub fn deposit_amount(&self, amount: &DepositAmount) -> U256 {
        match amount.bounds() {
            Some((low, high)) if low < high => U256::from(self.rng.lock().random_range(low..=high)),
            Some((low, _)) => U256::from(low),
            None => U256::from(amount.base),
        }
    }

    /// Draws a pause uniformly from the window, at millisecond resolution.
    pub fn account_delay(&self, window: &DelayWindow) -> Duration {
        let low = window.min.as_millis() as u64;
        let high = window.max.as_millis() as u64;
        if low >= high {
            return window.min;
        }
        Duration::from_millis(self.rng.lock().random_range(low..=high))
    }
}
