//! Environment abstraction for deterministic testing.
//!
//! The `Environment` trait decouples device logic from system resources
//! (time and the tick counter). This enables:
//!
//! - Deterministic Simulation: a virtual clock makes the 5 s dwell and
//!   acknowledgment windows elapse instantly and reproducibly.
//!
//! - Production Runtime: the Tokio implementation uses real time without any
//!   code changes to the engine or the tasks.
//!
//! # Invariants
//!
//! - Monotonicity: `env.tick_count()` never goes backwards
//! - Isolation: Implementations must not share global state

use std::time::Duration;

/// Abstract environment providing time and async sleeping.
///
/// Implementations MUST guarantee that `tick_count()` never decreases and
/// that it advances with the time `sleep` waits out.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Sleeps for the specified duration.
    ///
    /// Only task code awaits this; the engine and the connectivity manager
    /// never sleep.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Milliseconds since the device booted.
    ///
    /// Client tokens are derived from this counter.
    fn tick_count(&self) -> u64;
}
