//! Model shadow view.

use super::operation::{DeltaShape, Operation, OperationResult};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ObservableState {
    /// Lock open.
    pub open: bool,
    /// Last accepted version.
    pub version: u64,
    /// Pending-change flag.
    pub pending: bool,
}

/// Reference implementation of the shadow view.
#[derive(Debug, Clone, Default)]
pub struct ModelShadow {
    state: ObservableState,
    wakes: u32,
}

impl ModelShadow {
    /// Closed lock at version zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current observable state.
    pub fn observable_state(&self) -> ObservableState {
        self.state
    }

    /// Number of actuator wakes so far.
    pub fn wakes(&self) -> u32 {
        self.wakes
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Delta { version, lock_state, shape } => {
                self.apply_delta(u64::from(version), lock_state, shape)
            },
            Operation::ReportPass => {
                // Open then closed; only the final state is observable.
                self.state.open = false;
                let requested = std::mem::take(&mut self.state.pending);
                OperationResult::Reported { requested }
            },
        }
    }

    fn apply_delta(&mut self, version: u64, lock_state: u8, shape: DeltaShape) -> OperationResult {
        if matches!(shape, DeltaShape::Garbage | DeltaShape::MissingVersion) {
            return OperationResult::Rejected;
        }
        if version <= self.state.version {
            return OperationResult::Stale;
        }

        // The version sticks even if the state turns out to be unusable.
        self.state.version = version;

        let open = match (shape, lock_state) {
            (DeltaShape::Complete, 0) => false,
            (DeltaShape::Complete, 1) => true,
            _ => return OperationResult::Rejected,
        };

        if open == self.state.open {
            return OperationResult::Applied { changed: false, wake: false };
        }

        self.state.open = open;
        self.state.pending = true;
        if open {
            self.wakes += 1;
        }
        OperationResult::Applied { changed: true, wake: open }
    }
}
