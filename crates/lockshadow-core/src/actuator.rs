//! Lock actuator boundary.
//!
//! The physical lock is two output lines: the lock solenoid and a status
//! indicator. Both are driven through [`LockActuator`], implemented by the
//! board support code.

use std::time::Duration;

use crate::error::ActuatorError;

/// Default time the lock is held open per handshake.
pub const DEFAULT_ACTUATOR_DWELL: Duration = Duration::from_millis(5000);

/// Actuator timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorConfig {
    /// How long the lock line stays asserted.
    pub dwell: Duration,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self { dwell: DEFAULT_ACTUATOR_DWELL }
    }
}

/// Output lines of the lock hardware (external collaborator).
pub trait LockActuator: Send {
    /// Drive the lock line: `true` opens.
    fn set_lock(&mut self, open: bool) -> Result<(), ActuatorError>;

    /// Drive the status indicator.
    fn set_indicator(&mut self, on: bool) -> Result<(), ActuatorError>;
}
