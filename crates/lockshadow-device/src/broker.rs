//! In-process shadow broker and transport.
//!
//! [`MemoryBroker`] plays the cloud side: it records every publish, routes
//! messages to subscribed sessions by exact topic, and acknowledges
//! publishes unless told not to. [`MemoryTransport`] is the device's session
//! against it.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use lockshadow_core::{Inbound, NetworkInterface, PacketId, Transport, TransportError};
use lockshadow_proto::ShadowUpdate;
use tokio::sync::mpsc;

/// A publish the broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Interface the publishing session was established over.
    pub interface: String,
    /// Topic.
    pub topic: String,
    /// Payload as sent.
    pub payload: Bytes,
}

struct SessionSlot {
    id: u64,
    interface: String,
    subscriptions: Vec<String>,
    inbox: mpsc::UnboundedSender<Inbound>,
}

struct BrokerState {
    reachable: bool,
    acking: bool,
    sessions: Vec<SessionSlot>,
    published: Vec<PublishedMessage>,
    next_session: u64,
    next_packet: u16,
}

impl Default for BrokerState {
    fn default() -> Self {
        Self {
            reachable: true,
            acking: true,
            sessions: Vec::new(),
            published: Vec::new(),
            next_session: 0,
            next_packet: 0,
        }
    }
}

impl BrokerState {
    fn slot_mut(&mut self, session: u64) -> Result<&mut SessionSlot, TransportError> {
        self.sessions.iter_mut().find(|s| s.id == session).ok_or(TransportError::NotConnected)
    }

    fn deliver(&self, topic: &str, payload: &Bytes) -> usize {
        let message = Inbound::Message { topic: topic.to_string(), payload: payload.clone() };
        self.sessions
            .iter()
            .filter(|s| s.subscriptions.iter().any(|t| t == topic))
            .filter(|s| s.inbox.send(message.clone()).is_ok())
            .count()
    }

    fn packet_id(&mut self) -> PacketId {
        // Zero is not a valid packet identifier.
        self.next_packet = self.next_packet.checked_add(1).unwrap_or(1);
        PacketId(self.next_packet)
    }
}

/// Cloud side of the in-process shadow service.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    /// A reachable broker that acknowledges every publish.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A device-side transport bound to this broker.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport { broker: self.clone(), session: None }
    }

    /// Whether new sessions and publishes succeed.
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Whether publishes are acknowledged.
    pub fn set_acking(&self, acking: bool) {
        self.lock().acking = acking;
    }

    /// Publish from the cloud side. Returns how many sessions received it.
    pub fn publish(&self, topic: &str, payload: impl Into<Bytes>) -> usize {
        let payload = payload.into();
        let delivered = self.lock().deliver(topic, &payload);
        tracing::debug!(topic, delivered, "broker published");
        delivered
    }

    /// Close every session, as a broker restart would.
    pub fn drop_sessions(&self) {
        self.lock().sessions.clear();
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    /// Whether some session subscribed to `topic`.
    pub fn has_subscriber(&self, topic: &str) -> bool {
        self.lock().sessions.iter().any(|s| s.subscriptions.iter().any(|t| t == topic))
    }

    /// Every publish accepted so far, oldest first.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Accepted publishes on `topic` that parse as shadow updates.
    pub fn updates_on(&self, topic: &str) -> Vec<ShadowUpdate> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .filter_map(|m| ShadowUpdate::from_json(&m.payload).ok())
            .collect()
    }
}

/// Device session against a [`MemoryBroker`].
pub struct MemoryTransport {
    broker: MemoryBroker,
    session: Option<(u64, mpsc::UnboundedReceiver<Inbound>)>,
}

impl MemoryTransport {
    fn session_id(&self) -> Result<u64, TransportError> {
        self.session.as_ref().map(|(id, _)| *id).ok_or(TransportError::NotConnected)
    }

    fn open(&mut self, interface: &NetworkInterface) -> Result<(), TransportError> {
        self.close();

        let mut state = self.broker.lock();
        if !state.reachable {
            return Err(TransportError::Connect(format!(
                "{}:{} unreachable over {}",
                interface.connection.endpoint, interface.connection.port, interface.name
            )));
        }

        let id = state.next_session;
        state.next_session += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        state.sessions.push(SessionSlot {
            id,
            interface: interface.name.clone(),
            subscriptions: Vec::new(),
            inbox: tx,
        });
        drop(state);

        self.session = Some((id, rx));
        Ok(())
    }

    fn add_subscription(&mut self, topic: &str) -> Result<(), TransportError> {
        let id = self.session_id()?;
        let mut state = self.broker.lock();
        let slot = state.slot_mut(id)?;
        if !slot.subscriptions.iter().any(|t| t == topic) {
            slot.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn send(&mut self, topic: &str, payload: Bytes) -> Result<PacketId, TransportError> {
        let id = self.session_id()?;
        let mut state = self.broker.lock();
        if !state.reachable {
            return Err(TransportError::Publish {
                topic: topic.to_string(),
                reason: "broker unreachable".to_string(),
            });
        }

        let interface = state.slot_mut(id)?.interface.clone();
        let packet_id = state.packet_id();
        state.published.push(PublishedMessage {
            interface,
            topic: topic.to_string(),
            payload: payload.clone(),
        });
        state.deliver(topic, &payload);

        if state.acking {
            let slot = state.slot_mut(id)?;
            let _ = slot.inbox.send(Inbound::PubAck { packet_id });
        }
        Ok(packet_id)
    }

    fn close(&mut self) {
        if let Some((id, _)) = self.session.take() {
            self.broker.lock().sessions.retain(|s| s.id != id);
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn establish(&mut self, interface: &NetworkInterface) -> Result<(), TransportError> {
        self.open(interface)
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        self.add_subscription(topic).map_err(|e| TransportError::Subscribe {
            topic: topic.to_string(),
            reason: e.to_string(),
        })
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<PacketId, TransportError> {
        self.send(topic, payload)
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Vec<Inbound>, TransportError> {
        let Some((_, inbox)) = self.session.as_mut() else {
            return Err(TransportError::NotConnected);
        };

        match tokio::time::timeout(timeout, inbox.recv()).await {
            Err(_) => Ok(Vec::new()),
            Ok(None) => Err(TransportError::Receive("session closed by broker".to_string())),
            Ok(Some(first)) => {
                let mut received = vec![first];
                while let Ok(next) = inbox.try_recv() {
                    received.push(next);
                }
                Ok(received)
            },
        }
    }

    async fn disconnect(&mut self) {
        self.close();
    }
}
