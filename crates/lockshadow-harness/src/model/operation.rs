//! Operations for model-based testing.
//!
//! Operations represent everything that can happen to the shadow view. They
//! are generated randomly and applied to both the model and the real engine.

use arbitrary::Arbitrary;

/// How a generated delta document is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum DeltaShape {
    /// Version and lock state present.
    Complete,
    /// No `version` field.
    MissingVersion,
    /// Version present, no `state.lockState`.
    MissingState,
    /// Not JSON at all.
    Garbage,
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// A delta arrives on the delta topic.
    Delta {
        /// Document version (small so collisions and replays are common).
        version: u8,
        /// Raw `lockState` value; anything above 1 is invalid.
        lock_state: u8,
        /// Document shape.
        shape: DeltaShape,
    },

    /// A report pass runs: the lock is reported open, then closed, and the
    /// pending-change flag is consumed.
    ReportPass,
}

impl Operation {
    /// Encoded delta document, or `None` for non-delta operations.
    pub fn payload(&self) -> Option<Vec<u8>> {
        let Self::Delta { version, lock_state, shape } = self else {
            return None;
        };
        let text = match shape {
            DeltaShape::Complete => {
                format!(r#"{{"version":{version},"state":{{"lockState":{lock_state}}}}}"#)
            },
            DeltaShape::MissingVersion => format!(r#"{{"state":{{"lockState":{lock_state}}}}}"#),
            DeltaShape::MissingState => format!(r#"{{"version":{version},"state":{{}}}}"#),
            DeltaShape::Garbage => format!("lockState={lock_state}"),
        };
        Some(text.into_bytes())
    }
}

/// Result of applying an operation.
///
/// Used to compare model and real system behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationResult {
    /// Delta accepted; `changed` when the lock state moved, `wake` when the
    /// actuator must run.
    Applied {
        /// Lock state changed.
        changed: bool,
        /// Actuator woken.
        wake: bool,
    },
    /// Delta not newer than the current version.
    Stale,
    /// Delta could not be used.
    Rejected,
    /// A report pass ran; carries whether a delta had requested it.
    Reported {
        /// Pending-change flag at the end of the pass.
        requested: bool,
    },
}
