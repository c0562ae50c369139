//! Simulated environment for deterministic testing.
//!
//! Time comes from the Tokio clock, which turmoil drives virtually inside a
//! simulation. The tick counter starts at a seed-derived offset, standing in
//! for however long the device had been up before the scenario began; two
//! runs with the same seed see the same ticks and therefore the same client
//! tokens.

use std::time::Duration;

use lockshadow_core::env::Environment;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Upper bound on the simulated uptime before a scenario starts.
const MAX_BOOT_TICKS: u64 = 3_600_000;

/// Environment for simulation and model tests.
#[derive(Debug, Clone)]
pub struct SimEnv {
    epoch: tokio::time::Instant,
    boot_ticks: u64,
}

impl SimEnv {
    /// Environment whose tick counter starts at zero.
    pub fn new() -> Self {
        Self { epoch: tokio::time::Instant::now(), boot_ticks: 0 }
    }

    /// Environment with a seed-derived starting tick.
    pub fn with_seed(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self { epoch: tokio::time::Instant::now(), boot_ticks: rng.gen_range(0..MAX_BOOT_TICKS) }
    }

    /// Tick value at creation.
    pub fn boot_ticks(&self) -> u64 {
        self.boot_ticks
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn tick_count(&self) -> u64 {
        let elapsed = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.boot_ticks.saturating_add(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_boot_ticks() {
        assert_eq!(SimEnv::with_seed(7).boot_ticks(), SimEnv::with_seed(7).boot_ticks());
        assert!(SimEnv::with_seed(7).boot_ticks() < MAX_BOOT_TICKS);
    }

    #[test]
    fn ticks_start_at_boot_offset() {
        let env = SimEnv::with_seed(42);
        let ticks = env.tick_count();
        assert!(ticks >= env.boot_ticks());
        assert!(ticks < env.boot_ticks() + 1000);
    }
}
