//! Lockshadow wire protocol.
//!
//! Types exchanged with the cloud-held shadow of a single lock:
//!
//! - [`LockState`]: the one state field, `0` (closed) or `1` (open) on the wire
//! - [`ShadowVersion`]: monotonic version stamped on every delta by the cloud
//! - [`ClientToken`]: six-digit correlation id attached to outbound updates
//! - [`ShadowUpdate`]: the reported-only and desired+reported documents
//! - [`DeltaDocument`]: lazily inspected inbound delta
//! - [`ShadowTopic`]: topic naming and classification for one thing
//!
//! The document format is deliberately minimal. Serialization goes through
//! `serde_json` with fixed field order so the emitted bytes are stable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delta;
pub mod document;
pub mod error;
pub mod state;
pub mod token;
pub mod topic;

pub use delta::DeltaDocument;
pub use document::{LockFields, ShadowUpdate, UpdateState};
pub use error::ProtoError;
pub use state::{LockState, ShadowVersion};
pub use token::ClientToken;
pub use topic::{ShadowMessageType, ShadowTopic};
