//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding shadow documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Payload is not well-formed JSON.
    #[error("malformed document: {reason}")]
    Malformed {
        /// Parser diagnostic.
        reason: String,
    },

    /// A required field is absent.
    #[error("missing field: {field}")]
    MissingField {
        /// Dotted path of the field.
        field: &'static str,
    },

    /// A field is present but has the wrong type or range.
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Dotted path of the field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// Lock state integer outside `{0, 1}`.
    #[error("invalid lock state: {0}")]
    InvalidLockState(u64),

    /// Client token is not exactly six decimal digits.
    #[error("invalid client token: {0:?}")]
    InvalidClientToken(String),

    /// Serialization failed.
    #[error("encode error: {0}")]
    Encode(String),
}

impl ProtoError {
    pub(crate) fn malformed(err: &serde_json::Error) -> Self {
        Self::Malformed { reason: err.to_string() }
    }
}
