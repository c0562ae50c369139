//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! shadow engine behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelShadow    RealShadow      Compare
//!      (reference)   (ShadowEngine)   Results
//! ```

use arbitrary::{Arbitrary, Unstructured};
use lockshadow_core::{ShadowAction, ShadowEngine};
use lockshadow_harness::{DeltaShape, ModelShadow, ObservableState, Operation, OperationResult};
use lockshadow_proto::LockState;
use proptest::prelude::*;

/// Real system wrapper that mirrors ModelShadow's interface.
#[derive(Default)]
struct RealShadow {
    engine: ShadowEngine,
    wakes: u32,
}

impl RealShadow {
    fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Delta { .. } => {
                let payload = op.payload().expect("delta operation has a payload");
                self.apply_delta(&payload)
            },
            Operation::ReportPass => {
                self.engine.set_lock_state(LockState::Open);
                self.engine.set_lock_state(LockState::Closed);
                OperationResult::Reported { requested: self.engine.take_pending_change() }
            },
        }
    }

    fn apply_delta(&mut self, payload: &[u8]) -> OperationResult {
        let before = self.engine.version();
        match self.engine.on_delta(payload) {
            Err(_) => OperationResult::Rejected,
            Ok(actions) if actions.is_empty() => {
                if self.engine.version() > before {
                    OperationResult::Applied { changed: false, wake: false }
                } else {
                    OperationResult::Stale
                }
            },
            Ok(actions) => {
                let wake = actions.contains(&ShadowAction::TriggerActuator);
                if wake {
                    self.wakes += 1;
                }
                OperationResult::Applied { changed: true, wake }
            },
        }
    }

    fn observable_state(&self) -> ObservableState {
        let snapshot = self.engine.snapshot();
        ObservableState {
            open: snapshot.lock_state.is_open(),
            version: snapshot.version.get(),
            pending: snapshot.pending_change,
        }
    }
}

fn shape_strategy() -> impl Strategy<Value = DeltaShape> {
    prop_oneof![
        8 => Just(DeltaShape::Complete),
        1 => Just(DeltaShape::MissingVersion),
        1 => Just(DeltaShape::MissingState),
        1 => Just(DeltaShape::Garbage),
    ]
}

/// Strategy for generating operations.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        // Small versions so replays and reordering are frequent
        6 => (0u8..16, prop_oneof![4 => 0u8..2, 1 => 2u8..=255], shape_strategy())
            .prop_map(|(version, lock_state, shape)| Operation::Delta { version, lock_state, shape }),
        1 => Just(Operation::ReportPass),
    ]
}

proptest! {
    /// Verify that operation results match between model and real engine.
    #[test]
    fn prop_model_matches_real(ops in prop::collection::vec(operation_strategy(), 0..60)) {
        let mut model = ModelShadow::new();
        let mut real = RealShadow::default();

        for (i, op) in ops.iter().enumerate() {
            let model_result = model.apply(op);
            let real_result = real.apply(op);

            prop_assert_eq!(
                model_result,
                real_result,
                "Divergence at operation {}: {:?}",
                i, op
            );
            prop_assert_eq!(model.observable_state(), real.observable_state());
        }
        prop_assert_eq!(model.wakes(), real.wakes);
    }

    /// The accepted version never goes backwards.
    #[test]
    fn prop_version_monotonic(ops in prop::collection::vec(operation_strategy(), 0..60)) {
        let mut real = RealShadow::default();
        let mut last = 0;

        for op in &ops {
            real.apply(op);
            let version = real.observable_state().version;
            prop_assert!(version >= last, "version went from {} to {}", last, version);
            last = version;
        }
    }

    /// Redelivering a delta changes nothing and never wakes the actuator again.
    #[test]
    fn prop_duplicate_delta_suppressed(
        prefix in prop::collection::vec(operation_strategy(), 0..20),
        version in 0u8..16,
        lock_state in 0u8..2,
    ) {
        let mut real = RealShadow::default();
        for op in &prefix {
            real.apply(op);
        }

        let delta = Operation::Delta { version, lock_state, shape: DeltaShape::Complete };
        real.apply(&delta);
        let state = real.observable_state();
        let wakes = real.wakes;

        prop_assert_eq!(real.apply(&delta), OperationResult::Stale);
        prop_assert_eq!(real.observable_state(), state);
        prop_assert_eq!(real.wakes, wakes);
    }

    /// A newer delta matching the current state only moves the version.
    #[test]
    fn prop_matching_state_is_noop(
        prefix in prop::collection::vec(operation_strategy(), 0..20),
    ) {
        let mut real = RealShadow::default();
        for op in &prefix {
            real.apply(op);
        }
        let before = real.observable_state();
        prop_assume!(before.version < u64::from(u8::MAX));

        let version = u8::try_from(before.version + 1).expect("small version");
        let lock_state = u8::from(before.open);
        let result = real.apply(&Operation::Delta {
            version,
            lock_state,
            shape: DeltaShape::Complete,
        });

        prop_assert_eq!(result, OperationResult::Applied { changed: false, wake: false });
        let after = real.observable_state();
        prop_assert_eq!(after.version, u64::from(version));
        prop_assert_eq!(after.open, before.open);
        prop_assert_eq!(after.pending, before.pending);
    }

    /// Unstructured input decoded through `Arbitrary` agrees with the model too.
    #[test]
    fn prop_arbitrary_sequences_match(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let mut input = Unstructured::new(&bytes);
        let ops = Vec::<Operation>::arbitrary(&mut input).unwrap_or_default();

        let mut model = ModelShadow::new();
        let mut real = RealShadow::default();
        for op in &ops {
            prop_assert_eq!(model.apply(op), real.apply(op));
        }
        prop_assert_eq!(model.observable_state(), real.observable_state());
    }
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    /// Closed at version 0, then the cloud asks to open.
    #[test]
    fn open_delta_from_initial_state() {
        let mut real = RealShadow::default();
        let op = Operation::Delta { version: 1, lock_state: 1, shape: DeltaShape::Complete };

        assert_eq!(real.apply(&op), OperationResult::Applied { changed: true, wake: true });
        assert_eq!(real.observable_state(), ObservableState {
            open: true,
            version: 1,
            pending: true
        });

        assert_eq!(real.apply(&Operation::ReportPass), OperationResult::Reported {
            requested: true
        });
        assert!(!real.observable_state().open);
        assert!(!real.observable_state().pending);
    }

    /// A missing state still raises the version threshold.
    #[test]
    fn missing_state_keeps_version_bump() {
        let mut model = ModelShadow::new();
        let mut real = RealShadow::default();
        let ops = [
            Operation::Delta { version: 5, lock_state: 0, shape: DeltaShape::MissingState },
            Operation::Delta { version: 4, lock_state: 1, shape: DeltaShape::Complete },
        ];

        for op in &ops {
            assert_eq!(model.apply(op), real.apply(op));
        }
        assert_eq!(real.observable_state().version, 5);
        assert!(!real.observable_state().open);
    }
}
