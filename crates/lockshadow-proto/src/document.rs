//! Outbound shadow update documents.
//!
//! Two shapes are ever published:
//!
//! ```text
//! {"state":{"reported":{"lockState":1}},"clientToken":"000123"}
//! {"state":{"desired":{"lockState":0},"reported":{"lockState":0}},"clientToken":"004711"}
//! ```
//!
//! Field order is fixed by declaration order and `serde_json` emits compact
//! output, so the bytes are identical to the hand-formatted templates the
//! cloud side expects.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{error::ProtoError, state::LockState, token::ClientToken};

/// Lock fields inside a `desired` or `reported` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockFields {
    /// Lock position.
    pub lock_state: LockState,
}

/// The `state` object of an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateState {
    /// Desired section, omitted when `None`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub desired: Option<LockFields>,
    /// Reported section, omitted when `None`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reported: Option<LockFields>,
}

/// A shadow update document published to the `update` topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowUpdate {
    /// Desired/reported sections.
    pub state: UpdateState,
    /// Correlation token.
    #[serde(rename = "clientToken")]
    pub client_token: ClientToken,
}

impl ShadowUpdate {
    /// Report the device's current state only.
    pub fn reported(lock_state: LockState, client_token: ClientToken) -> Self {
        Self {
            state: UpdateState { desired: None, reported: Some(LockFields { lock_state }) },
            client_token,
        }
    }

    /// Overwrite the desired state and report the same value, which clears
    /// the outstanding delta on the cloud side.
    pub fn desired_and_reported(lock_state: LockState, client_token: ClientToken) -> Self {
        let fields = Some(LockFields { lock_state });
        Self { state: UpdateState { desired: fields, reported: fields }, client_token }
    }

    /// Reported lock state, if the document carries one.
    pub fn reported_state(&self) -> Option<LockState> {
        self.state.reported.map(|f| f.lock_state)
    }

    /// Desired lock state, if the document carries one.
    pub fn desired_state(&self) -> Option<LockState> {
        self.state.desired.map(|f| f.lock_state)
    }

    /// Serialize to the compact wire form.
    pub fn to_json(&self) -> Result<String, ProtoError> {
        serde_json::to_string(self).map_err(|e| ProtoError::Encode(e.to_string()))
    }

    /// Serialize into a payload buffer.
    pub fn to_payload(&self) -> Result<Bytes, ProtoError> {
        self.to_json().map(Bytes::from)
    }

    /// Parse a previously serialized update.
    pub fn from_json(payload: &[u8]) -> Result<Self, ProtoError> {
        serde_json::from_slice(payload).map_err(|e| ProtoError::malformed(&e))
    }
}
