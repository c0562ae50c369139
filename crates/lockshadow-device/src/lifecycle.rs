//! Network lifecycle and shadow session task.
//!
//! The session task is the only owner of the connectivity manager and the
//! transport. It waits for a link, establishes the session on it, then
//! multiplexes three sources until the link goes away:
//!
//! ```text
//!   backend ── NetworkChange ──┐
//!   report cycle ── Publish ───┼──► session task ──► transport
//!   transport ── Inbound ──────┘         │
//!                                        ├──► engine (deltas, synchronous)
//!                                        └──► report cycle (acks)
//! ```
//!
//! Link changes are polled first so a dropped link is never used for one more
//! publish.

use std::collections::HashMap;

use lockshadow_core::{
    ConnectivityManager, DeviceEvent, Inbound, LinkEvent, NetworkBackend, NetworkChange,
    NetworkInterface, NetworkMask, SubscriptionId, Transport, TransportError,
    env::Environment,
};
use tokio::sync::mpsc;

use crate::{
    context::{DeviceContext, PublishRequest, SessionPorts},
    error::DeviceError,
};

/// Connectivity manager plus the plumbing that feeds it.
pub struct NetworkLifecycle<B: NetworkBackend> {
    manager: ConnectivityManager<B>,
    changes: mpsc::UnboundedReceiver<NetworkChange>,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<LinkEvent>>,
}

impl<B: NetworkBackend> NetworkLifecycle<B> {
    /// Enable the configured networks on `backend`; state changes arrive on
    /// `changes`.
    pub fn new(
        backend: B,
        networks: NetworkMask,
        changes: mpsc::UnboundedReceiver<NetworkChange>,
    ) -> Self {
        Self {
            manager: ConnectivityManager::new(backend, networks),
            changes,
            subscribers: HashMap::new(),
        }
    }

    /// The connectivity manager.
    pub fn manager(&self) -> &ConnectivityManager<B> {
        &self.manager
    }

    /// Receive link events for the given network types.
    pub fn subscribe(&mut self, networks: NetworkMask) -> mpsc::UnboundedReceiver<LinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.manager.subscribe(networks);
        self.subscribers.insert(id, tx);
        rx
    }

    /// Feed one backend change through the manager and notify subscribers.
    pub fn on_change(&mut self, change: NetworkChange) -> Vec<LinkEvent> {
        let events = self.manager.handle_state_change(change.network, change.state);
        for event in &events {
            for id in self.manager.subscribers_for(event) {
                let delivered =
                    self.subscribers.get(&id).is_some_and(|tx| tx.send(event.clone()).is_ok());
                if !delivered {
                    tracing::debug!(?id, "dropping link subscriber");
                    self.subscribers.remove(&id);
                    self.manager.unsubscribe(id);
                }
            }
        }
        events
    }

    /// Wait, without bound, until a link is selected.
    ///
    /// Changes already queued are applied before the manager is asked for an
    /// existing link, so a stale selection is never returned. Returns `None`
    /// once the backend has gone away.
    pub async fn wait_for_link(&mut self) -> Option<NetworkInterface> {
        while let Ok(change) = self.changes.try_recv() {
            if let Some(interface) = connected_interface(&self.on_change(change)) {
                return Some(interface);
            }
        }

        if let Some(interface) = self.manager.select_initial() {
            return Some(interface);
        }

        tracing::info!("waiting for a network connection");
        loop {
            let change = self.changes.recv().await?;
            if let Some(interface) = connected_interface(&self.on_change(change)) {
                return Some(interface);
            }
        }
    }
}

fn connected_interface(events: &[LinkEvent]) -> Option<NetworkInterface> {
    events.iter().find_map(|event| match event {
        LinkEvent::Connected { interface } => Some(interface.clone()),
        LinkEvent::Disconnected { .. } => None,
    })
}

/// Why a session ended.
enum SessionEnd {
    /// The active link dropped; failover may already have picked the next one.
    LinkLost(Option<NetworkInterface>),
    /// The transport reported a session-ending error.
    Broken,
    /// The backend's change channel closed.
    BackendGone,
}

enum Wake {
    Link(Option<NetworkChange>),
    Publish(Option<PublishRequest>),
    Inbound(Result<Vec<Inbound>, TransportError>),
}

/// Run the network lifecycle and shadow session forever.
///
/// Returns only if the network backend goes away.
pub async fn run_network_lifecycle<E, B, T>(
    context: DeviceContext<E>,
    mut lifecycle: NetworkLifecycle<B>,
    mut transport: T,
    mut ports: SessionPorts,
) where
    E: Environment,
    B: NetworkBackend,
    T: Transport,
{
    let mut next = None;
    let mut announced = false;

    loop {
        // A failover link was already announced by the session that lost
        // the previous one.
        let interface = match next.take() {
            Some(interface) => interface,
            None => match lifecycle.wait_for_link().await {
                Some(interface) => {
                    route(&context, &ports, DeviceEvent::Connected { interface: interface.clone() });
                    interface
                },
                None => {
                    tracing::error!("network backend went away, session task stopping");
                    return;
                },
            },
        };

        if let Err(e) = establish(&context, &mut transport, &interface).await {
            tracing::error!(interface = %interface.name, error = %e, "session setup failed");
            transport.disconnect().await;
            context.env().sleep(context.config().session_retry).await;
            continue;
        }

        if !announced && context.config().report_on_startup {
            announced = true;
            context.report_trigger().notify_one();
        }

        let end = run_session(&context, &mut lifecycle, &mut transport, &mut ports).await;
        transport.disconnect().await;

        match end {
            SessionEnd::LinkLost(failover) => {
                tracing::debug!(interface = %interface.name, "session closed with its link");
                next = failover;
            },
            SessionEnd::Broken => {
                context.env().sleep(context.config().session_retry).await;
            },
            SessionEnd::BackendGone => {
                tracing::error!("network backend went away, session task stopping");
                return;
            },
        }
    }
}

async fn establish<E: Environment, T: Transport>(
    context: &DeviceContext<E>,
    transport: &mut T,
    interface: &NetworkInterface,
) -> Result<(), DeviceError> {
    transport.establish(interface).await?;
    let delta = context.topics().update_delta();
    transport.subscribe(&delta).await?;
    tracing::info!(
        interface = %interface.name,
        endpoint = %interface.connection.endpoint,
        topic = %delta,
        "shadow session established"
    );
    Ok(())
}

async fn run_session<E, B, T>(
    context: &DeviceContext<E>,
    lifecycle: &mut NetworkLifecycle<B>,
    transport: &mut T,
    ports: &mut SessionPorts,
) -> SessionEnd
where
    E: Environment,
    B: NetworkBackend,
    T: Transport,
{
    let receive_timeout = context.config().receive_timeout;
    let mut publishers_open = true;

    loop {
        let wake = tokio::select! {
            biased;
            change = lifecycle.changes.recv() => Wake::Link(change),
            request = ports.publish_rx.recv(), if publishers_open => Wake::Publish(request),
            inbound = transport.receive(receive_timeout) => Wake::Inbound(inbound),
        };

        match wake {
            Wake::Link(None) => return SessionEnd::BackendGone,
            Wake::Link(Some(change)) => {
                let events = lifecycle.on_change(change);
                let lost = events.iter().any(|e| matches!(e, LinkEvent::Disconnected { .. }));
                let failover = connected_interface(&events);
                for event in events {
                    route(context, ports, DeviceEvent::from(event));
                }
                if lost {
                    return SessionEnd::LinkLost(failover);
                }
            },
            Wake::Publish(None) => {
                tracing::debug!("report cycle gone, no more publishes");
                publishers_open = false;
            },
            Wake::Publish(Some(request)) => publish(transport, request).await,
            Wake::Inbound(Ok(inbound)) => {
                for item in inbound {
                    dispatch(context, ports, item);
                }
            },
            Wake::Inbound(Err(e)) if e.is_fatal() => {
                tracing::warn!(error = %e, "session lost");
                return SessionEnd::Broken;
            },
            Wake::Inbound(Err(e)) => {
                tracing::warn!(error = %e, "receive failed");
            },
        }
    }
}

async fn publish<T: Transport>(transport: &mut T, request: PublishRequest) {
    if request.issued.is_closed() {
        tracing::debug!(topic = %request.topic, "publish abandoned by requester");
        return;
    }

    let result = transport.publish(&request.topic, request.payload).await;
    match &result {
        Ok(packet_id) => tracing::debug!(topic = %request.topic, ?packet_id, "published"),
        Err(e) => tracing::warn!(error = %e, "publish failed"),
    }
    // The requester may have timed out meanwhile.
    let _ = request.issued.send(result);
}

fn dispatch<E: Environment>(context: &DeviceContext<E>, ports: &SessionPorts, inbound: Inbound) {
    let event = match inbound {
        Inbound::Message { topic, payload } => context.on_shadow_message(&topic, payload),
        Inbound::PubAck { packet_id } => Some(DeviceEvent::PublishAcked { packet_id }),
    };
    if let Some(event) = event {
        route(context, ports, event);
    }
}

fn route<E: Environment>(context: &DeviceContext<E>, ports: &SessionPorts, event: DeviceEvent) {
    match event {
        DeviceEvent::Connected { interface } => {
            tracing::info!(network = %interface.network, interface = %interface.name, "link up");
        },
        DeviceEvent::Disconnected { interface } => {
            tracing::info!(network = %interface.network, interface = %interface.name, "link down");
        },
        DeviceEvent::DeltaReceived { payload } => {
            context.on_delta_message(&payload);
        },
        ack @ DeviceEvent::PublishAcked { .. } => {
            if ports.ack_tx.send(ack).is_err() {
                tracing::debug!("report cycle gone, acknowledgment dropped");
            }
        },
    }
}
