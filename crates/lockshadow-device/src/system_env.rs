//! Production Environment implementation using the Tokio clock.
//!
//! This module provides `SystemEnv`, the production implementation of the
//! `Environment` trait.

use std::time::Duration;

use lockshadow_core::env::Environment;

/// Production environment backed by the Tokio clock.
///
/// This implementation:
/// - Measures ticks with `tokio::time::Instant`, so a paused or simulated
///   runtime clock is honored
/// - Uses `tokio::time::sleep()` for async sleeping
/// - Counts ticks in milliseconds since the environment was created
#[derive(Clone)]
pub struct SystemEnv {
    boot: tokio::time::Instant,
}

impl SystemEnv {
    /// Create a new system environment. Its tick counter starts at zero.
    #[must_use]
    pub fn new() -> Self {
        Self { boot: tokio::time::Instant::now() }
    }
}

impl Default for SystemEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SystemEnv {
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn tick_count(&self) -> u64 {
        u64::try_from(self.boot.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_env_ticks_are_monotonic() {
        let env = SystemEnv::new();

        let first = env.tick_count();
        std::thread::sleep(Duration::from_millis(5));
        let second = env.tick_count();

        assert!(second >= first + 5, "Ticks should follow elapsed milliseconds");
    }

    #[tokio::test]
    async fn system_env_sleep_works() {
        let env = SystemEnv::new();

        let start = tokio::time::Instant::now();
        env.sleep(Duration::from_millis(50)).await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(50), "Sleep should wait at least 50ms");
    }

    #[tokio::test(start_paused = true)]
    async fn system_env_follows_paused_clock() {
        let env = SystemEnv::new();

        env.sleep(Duration::from_secs(5)).await;

        let ticks = env.tick_count();
        assert!((5000..5010).contains(&ticks), "ticks should follow the paused clock: {ticks}");
    }
}
