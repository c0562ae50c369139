//! Report cycle plan.
//!
//! Every pass of the report cycle announces the lock as open, waits out the
//! open window, then announces it closed and clears the desired state on the
//! cloud side so the delta that opened it is not replayed.
//!
//! This module only describes the pass; the device task drives it and owns
//! the waiting.

use std::time::Duration;

use lockshadow_proto::{ClientToken, LockState, ShadowUpdate};

/// Default bound on waiting for a publish acknowledgment.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default time the lock is reported open before reporting it closed.
pub const DEFAULT_OPEN_DWELL: Duration = Duration::from_millis(5000);

/// Timing of one report pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportConfig {
    /// How long to wait for each acknowledgment before moving on.
    pub ack_timeout: Duration,
    /// Gap between the open and the close report.
    ///
    /// Stands in for a lock-closed sensor the hardware does not have.
    pub open_dwell: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { ack_timeout: DEFAULT_ACK_TIMEOUT, open_dwell: DEFAULT_OPEN_DWELL }
    }
}

/// One publish within a report pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPhase {
    /// Report the lock open (reported section only).
    Opened,
    /// Report the lock closed and overwrite desired to match.
    Closed,
}

impl ReportPhase {
    /// Phases of a pass, in order.
    pub const SEQUENCE: [Self; 2] = [Self::Opened, Self::Closed];

    /// Lock state the device adopts before publishing this phase.
    pub fn lock_state(self) -> LockState {
        match self {
            Self::Opened => LockState::Open,
            Self::Closed => LockState::Closed,
        }
    }

    /// Document published for this phase.
    pub fn document(self, client_token: ClientToken) -> ShadowUpdate {
        match self {
            Self::Opened => ShadowUpdate::reported(self.lock_state(), client_token),
            Self::Closed => ShadowUpdate::desired_and_reported(self.lock_state(), client_token),
        }
    }

    /// Wait after this phase's acknowledgment before the next phase.
    pub fn dwell_after(self, config: &ReportConfig) -> Option<Duration> {
        match self {
            Self::Opened => Some(config.open_dwell),
            Self::Closed => None,
        }
    }
}
