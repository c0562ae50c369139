//! Core error types.

use lockshadow_proto::ProtoError;
use thiserror::Error;

/// Errors from delta reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShadowError {
    /// The delta document could not be interpreted.
    #[error("delta rejected: {0}")]
    Document(#[from] ProtoError),
}

/// Errors from the lock peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActuatorError {
    /// Driving an output line failed.
    #[error("output {line} failed: {reason}")]
    Io {
        /// Which output line.
        line: &'static str,
        /// Driver diagnostic.
        reason: String,
    },
}

/// Errors from the pub/sub transport session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Session could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Subscription was refused or failed.
    #[error("subscribe to {topic} failed: {reason}")]
    Subscribe {
        /// Topic filter.
        topic: String,
        /// Diagnostic.
        reason: String,
    },

    /// Publish could not be sent.
    #[error("publish to {topic} failed: {reason}")]
    Publish {
        /// Destination topic.
        topic: String,
        /// Diagnostic.
        reason: String,
    },

    /// Receive loop failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Operation needs an established session.
    #[error("no session established")]
    NotConnected,
}

impl TransportError {
    /// Returns true if the session is gone and must be re-established.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Receive(_) | Self::NotConnected => true,
            Self::Subscribe { .. } | Self::Publish { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_errors_name_the_field() {
        let err = ShadowError::from(ProtoError::MissingField { field: "version" });
        assert_eq!(err.to_string(), "delta rejected: missing field: version");
    }

    #[test]
    fn publish_failure_keeps_session() {
        let err = TransportError::Publish { topic: "t".to_string(), reason: "busy".to_string() };
        assert!(!err.is_fatal());
    }

    #[test]
    fn receive_failure_ends_session() {
        assert!(TransportError::Receive("reset".to_string()).is_fatal());
        assert!(TransportError::NotConnected.is_fatal());
    }
}
