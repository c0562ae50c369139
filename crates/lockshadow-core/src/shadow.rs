//! Shadow synchronization engine.
//!
//! Owns the device's view of the shadow: the lock state, the last accepted
//! delta version, and the pending-change flag the report cycle consumes.
//!
//! ## Version gate
//!
//! A delta is applied only if its `version` is strictly greater than the last
//! accepted one. Arrival order on the transport is irrelevant; replays and
//! reordered deltas are discarded, which is what keeps a duplicated cloud
//! message from opening the lock twice.
//!
//! ## Design
//!
//! - Sans-IO: `on_delta` is synchronous and returns actions. It runs on the
//!   transport's receive path and must never wait on anything.
//! - Single owner: the device wraps the engine in a mutex held only for the
//!   duration of one call, so readers always see a consistent snapshot.

use lockshadow_proto::{DeltaDocument, LockState, ShadowVersion};

use crate::error::ShadowError;

/// Actions the caller must carry out after a delta was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowAction {
    /// The lock state changed.
    StateChanged {
        /// State before the delta.
        from: LockState,
        /// State after the delta.
        to: LockState,
        /// Version of the delta that caused it.
        version: ShadowVersion,
    },

    /// Wake the actuator to physically open the lock.
    TriggerActuator,
}

/// Consistent copy of the engine's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowSnapshot {
    /// Current lock state.
    pub lock_state: LockState,
    /// Last accepted delta version.
    pub version: ShadowVersion,
    /// Whether an accepted delta changed the state since the flag was last taken.
    pub pending_change: bool,
}

/// Version-gated reconciliation of cloud deltas.
#[derive(Debug, Default)]
pub struct ShadowEngine {
    lock_state: LockState,
    version: ShadowVersion,
    pending_change: bool,
    delta_failed: bool,
}

impl ShadowEngine {
    /// Fresh engine: closed, version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.lock_state
    }

    /// Last accepted delta version.
    pub fn version(&self) -> ShadowVersion {
        self.version
    }

    /// Copy of the full state.
    pub fn snapshot(&self) -> ShadowSnapshot {
        ShadowSnapshot {
            lock_state: self.lock_state,
            version: self.version,
            pending_change: self.pending_change,
        }
    }

    /// Overwrite the lock state ahead of a report.
    ///
    /// Used by the report cycle, which announces open and then closed. Does
    /// not touch the version or the pending flag.
    pub fn set_lock_state(&mut self, lock_state: LockState) {
        if self.lock_state != lock_state {
            tracing::debug!(from = %self.lock_state, to = %lock_state, "lock state set for report");
        }
        self.lock_state = lock_state;
    }

    /// Read and clear the pending-change flag.
    pub fn take_pending_change(&mut self) -> bool {
        std::mem::take(&mut self.pending_change)
    }

    /// Read and clear the flag recording a delta whose state could not be read.
    pub fn take_delta_failure(&mut self) -> bool {
        std::mem::take(&mut self.delta_failed)
    }

    /// Process the payload of an `update/delta` message.
    ///
    /// Stale versions return `Ok` with no actions. Document errors leave the
    /// state untouched, except that a delta whose version was accepted but
    /// whose `state.lockState` is unusable still advances the version.
    pub fn on_delta(&mut self, payload: &[u8]) -> Result<Vec<ShadowAction>, ShadowError> {
        tracing::debug!(len = payload.len(), "delta received");

        let document = DeltaDocument::parse(payload).inspect_err(|e| {
            tracing::error!(error = %e, "delta is not a valid document");
        })?;

        let version = document.version().inspect_err(|e| {
            tracing::error!(error = %e, "delta carries no usable version");
        })?;

        if version <= self.version {
            tracing::warn!(
                %version,
                current = %self.version,
                "discarding delta not newer than current version"
            );
            return Ok(Vec::new());
        }

        // The version is committed before the state is read. A delta missing
        // its state therefore still raises the acceptance threshold. This
        // looks unintended but is the established device behavior; later
        // deltas at or below this version will be dropped.
        self.version = version;

        let new_state = match document.lock_state() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(%version, error = %e, "delta carries no usable lock state");
                self.delta_failed = true;
                return Err(e.into());
            },
        };

        if new_state == self.lock_state {
            tracing::debug!(%version, state = %new_state, "delta matches current state");
            return Ok(Vec::new());
        }

        let from = self.lock_state;
        self.lock_state = new_state;
        self.pending_change = true;
        tracing::info!(%version, %from, to = %new_state, "lock state changed by delta");

        let mut actions = vec![ShadowAction::StateChanged { from, to: new_state, version }];
        if new_state.is_open() {
            actions.push(ShadowAction::TriggerActuator);
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use lockshadow_proto::ProtoError;

    use super::*;

    fn delta(version: u64, lock_state: u64) -> Vec<u8> {
        format!(r#"{{"version":{version},"state":{{"lockState":{lock_state}}}}}"#).into_bytes()
    }

    #[test]
    fn new_engine_is_closed_at_version_zero() {
        let engine = ShadowEngine::new();
        assert_eq!(
            engine.snapshot(),
            ShadowSnapshot {
                lock_state: LockState::Closed,
                version: ShadowVersion::INITIAL,
                pending_change: false,
            }
        );
    }

    #[test]
    fn newer_open_delta_triggers_actuator() {
        let mut engine = ShadowEngine::new();
        let actions = engine.on_delta(&delta(1, 1)).expect("accepted");

        assert_eq!(
            actions,
            vec![
                ShadowAction::StateChanged {
                    from: LockState::Closed,
                    to: LockState::Open,
                    version: ShadowVersion(1),
                },
                ShadowAction::TriggerActuator,
            ]
        );
        assert_eq!(engine.lock_state(), LockState::Open);
        assert_eq!(engine.version(), ShadowVersion(1));
        assert!(engine.take_pending_change());
        assert!(!engine.take_pending_change());
    }

    #[test]
    fn close_delta_changes_state_without_actuator() {
        let mut engine = ShadowEngine::new();
        engine.on_delta(&delta(1, 1)).expect("accepted");
        engine.take_pending_change();

        let actions = engine.on_delta(&delta(2, 0)).expect("accepted");
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ShadowAction::StateChanged { to: LockState::Closed, .. }));
        assert!(engine.take_pending_change());
    }

    #[test]
    fn stale_version_is_discarded() {
        let mut engine = ShadowEngine::new();
        engine.on_delta(&delta(5, 1)).expect("accepted");

        assert_eq!(engine.on_delta(&delta(5, 0)), Ok(vec![]));
        assert_eq!(engine.on_delta(&delta(3, 0)), Ok(vec![]));
        assert_eq!(engine.lock_state(), LockState::Open);
        assert_eq!(engine.version(), ShadowVersion(5));
    }

    #[test]
    fn version_zero_is_never_accepted() {
        let mut engine = ShadowEngine::new();
        assert_eq!(engine.on_delta(&delta(0, 1)), Ok(vec![]));
        assert_eq!(engine.lock_state(), LockState::Closed);
    }

    #[test]
    fn duplicate_delta_applies_once() {
        let mut engine = ShadowEngine::new();
        let payload = delta(9, 1);

        let first = engine.on_delta(&payload).expect("accepted");
        let second = engine.on_delta(&payload).expect("discarded");

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[test]
    fn same_state_bumps_version_only() {
        let mut engine = ShadowEngine::new();
        let actions = engine.on_delta(&delta(4, 0)).expect("accepted");

        assert!(actions.is_empty());
        assert_eq!(engine.version(), ShadowVersion(4));
        assert!(!engine.take_pending_change());
    }

    #[test]
    fn malformed_payload_mutates_nothing() {
        let mut engine = ShadowEngine::new();
        let result = engine.on_delta(b"not json");

        assert!(matches!(result, Err(ShadowError::Document(ProtoError::Malformed { .. }))));
        assert_eq!(engine.snapshot(), ShadowSnapshot::default());
        assert!(!engine.take_delta_failure());
    }

    #[test]
    fn missing_version_mutates_nothing() {
        let mut engine = ShadowEngine::new();
        let result = engine.on_delta(br#"{"state":{"lockState":1}}"#);

        assert_eq!(
            result,
            Err(ShadowError::Document(ProtoError::MissingField { field: "version" }))
        );
        assert_eq!(engine.snapshot(), ShadowSnapshot::default());
    }

    #[test]
    fn missing_state_keeps_version_bump() {
        let mut engine = ShadowEngine::new();
        let result = engine.on_delta(br#"{"version":3,"state":{}}"#);

        assert!(result.is_err());
        assert_eq!(engine.version(), ShadowVersion(3));
        assert_eq!(engine.lock_state(), LockState::Closed);
        assert!(engine.take_delta_failure());
        assert!(!engine.take_delta_failure());

        // The threshold now sits at 3.
        assert_eq!(engine.on_delta(&delta(3, 1)), Ok(vec![]));
        assert_eq!(engine.lock_state(), LockState::Closed);
    }

    #[test]
    fn set_lock_state_leaves_version_and_flag() {
        let mut engine = ShadowEngine::new();
        engine.set_lock_state(LockState::Open);

        assert_eq!(engine.lock_state(), LockState::Open);
        assert_eq!(engine.version(), ShadowVersion::INITIAL);
        assert!(!engine.take_pending_change());
    }

    #[test]
    fn report_close_lets_next_open_delta_trigger_again() {
        let mut engine = ShadowEngine::new();
        engine.on_delta(&delta(1, 1)).expect("accepted");
        engine.set_lock_state(LockState::Closed);

        let actions = engine.on_delta(&delta(2, 1)).expect("accepted");
        assert!(actions.contains(&ShadowAction::TriggerActuator));
    }
}
