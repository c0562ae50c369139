//! Pub/sub transport boundary.
//!
//! The transport is an external collaborator: an MQTT-style session with
//! connect, subscribe, publish and a receive loop. The device owns exactly
//! one transport and calls it from a single task, so the trait takes
//! `&mut self` and needs no internal locking.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::{connectivity::NetworkInterface, error::TransportError};

/// Identifier the transport assigns to an outbound publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketId(pub u16);

/// Something the receive loop picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// An application message on a subscribed topic.
    Message {
        /// Topic it was published on.
        topic: String,
        /// Raw payload.
        payload: Bytes,
    },
    /// The broker acknowledged a publish.
    PubAck {
        /// Packet that was acknowledged.
        packet_id: PacketId,
    },
}

/// A secured pub/sub session.
#[async_trait]
pub trait Transport: Send {
    /// Establish the session over the given interface.
    async fn establish(&mut self, interface: &NetworkInterface) -> Result<(), TransportError>;

    /// Subscribe to a topic filter.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Publish a payload. Returns the id its acknowledgment will carry.
    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<PacketId, TransportError>;

    /// Run the receive loop for at most `timeout` and return what arrived.
    ///
    /// Must be cancel-safe: the session task races it against its channels
    /// and drops the future when something else wakes first.
    async fn receive(&mut self, timeout: Duration) -> Result<Vec<Inbound>, TransportError>;

    /// Drop the session.
    async fn disconnect(&mut self);
}
