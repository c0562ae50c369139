//! Lockshadow core logic.
//!
//! Sans-IO state machines for a lock that mirrors a cloud shadow:
//!
//! - [`ShadowEngine`]: version-gated reconciliation of inbound deltas
//! - [`ConnectivityManager`]: selection and failover of the active link
//! - [`ReportPhase`]: the open/closed report pass and its documents
//!
//! Nothing here performs I/O or sleeps. Collaborators (network stack,
//! transport, lock hardware) are reached through the [`NetworkBackend`],
//! [`Transport`] and [`LockActuator`] traits, and time comes from the
//! [`Environment`](env::Environment), so every component can be driven
//! deterministically in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod actuator;
pub mod connectivity;
pub mod env;
pub mod error;
pub mod event;
pub mod report;
pub mod shadow;
pub mod transport;

pub use actuator::{ActuatorConfig, LockActuator};
pub use connectivity::{
    ConnectionParams, ConnectivityManager, Credentials, LinkEvent, LinkState, NetworkBackend,
    NetworkChange, NetworkInterface, NetworkMask, NetworkState, NetworkType, SubscriptionId,
};
pub use error::{ActuatorError, ShadowError, TransportError};
pub use event::DeviceEvent;
pub use report::{ReportConfig, ReportPhase};
pub use shadow::{ShadowAction, ShadowEngine, ShadowSnapshot};
pub use transport::{Inbound, PacketId, Transport};
