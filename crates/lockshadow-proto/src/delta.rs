//! Inbound delta documents.
//!
//! A delta from the cloud looks like
//!
//! ```text
//! {"version":12,"timestamp":1600000000,"state":{"lockState":1},"metadata":{...}}
//! ```
//!
//! Only `version` and `state.lockState` are consulted. The document is parsed
//! once and the fields are extracted on demand, because the engine must look
//! at `version` before it decides whether the state is worth reading at all.

use serde_json::Value;

use crate::{
    error::ProtoError,
    state::{LockState, ShadowVersion},
};

/// Dotted path of the version field.
pub const VERSION_FIELD: &str = "version";

/// Dotted path of the lock state field.
pub const LOCK_STATE_FIELD: &str = "state.lockState";

/// A validated, not yet interpreted delta document.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaDocument {
    root: Value,
}

impl DeltaDocument {
    /// Validate that the payload is well-formed JSON.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtoError> {
        let root = serde_json::from_slice(payload).map_err(|e| ProtoError::malformed(&e))?;
        Ok(Self { root })
    }

    /// Extract the top-level `version`.
    pub fn version(&self) -> Result<ShadowVersion, ProtoError> {
        self.unsigned(VERSION_FIELD).map(ShadowVersion)
    }

    /// Extract `state.lockState`.
    pub fn lock_state(&self) -> Result<LockState, ProtoError> {
        LockState::try_from(self.unsigned(LOCK_STATE_FIELD)?)
    }

    fn unsigned(&self, field: &'static str) -> Result<u64, ProtoError> {
        let value = lookup(&self.root, field).ok_or(ProtoError::MissingField { field })?;
        value.as_u64().ok_or_else(|| ProtoError::InvalidField {
            field,
            reason: format!("expected unsigned integer, found {value}"),
        })
    }
}

/// Walk a dotted key path through nested objects.
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(root, |node, key| node.as_object()?.get(key))
}
