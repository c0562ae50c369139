//! Lock state and shadow version.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::error::ProtoError;

/// Physical lock position as carried in the shadow.
///
/// Encoded as a bare integer: `0` closed, `1` open.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum LockState {
    /// Lock line de-asserted.
    #[default]
    Closed = 0,
    /// Lock line asserted.
    Open = 1,
}

impl LockState {
    /// Wire integer for this state.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for [`LockState::Open`].
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl TryFrom<u64> for LockState {
    type Error = ProtoError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Closed),
            1 => Ok(Self::Open),
            other => Err(ProtoError::InvalidLockState(other)),
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// Version number the cloud stamps on each delta.
///
/// Starts at zero on every boot; never persisted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ShadowVersion(pub u64);

impl ShadowVersion {
    /// Version before any delta has been accepted.
    pub const INITIAL: Self = Self(0);

    /// Raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ShadowVersion {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for ShadowVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_state_defaults_to_closed() {
        assert_eq!(LockState::default(), LockState::Closed);
    }

    #[test]
    fn lock_state_from_wire_integer() {
        assert_eq!(LockState::try_from(0), Ok(LockState::Closed));
        assert_eq!(LockState::try_from(1), Ok(LockState::Open));
        assert_eq!(LockState::try_from(2), Err(ProtoError::InvalidLockState(2)));
    }

    #[test]
    fn lock_state_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&LockState::Open).ok().as_deref(), Some("1"));
        assert_eq!(serde_json::to_string(&LockState::Closed).ok().as_deref(), Some("0"));
    }

    #[test]
    fn versions_are_ordered() {
        assert!(ShadowVersion(2) > ShadowVersion(1));
        assert_eq!(ShadowVersion::default(), ShadowVersion::INITIAL);
    }
}
