//! State shared by the device tasks.
//!
//! There are no globals. Everything a task needs from the others is carried
//! by [`DeviceContext`], which is cheap to clone, plus the channel ends
//! handed out once by [`DeviceContext::new`].
//!
//! - The engine sits behind a `std::sync::Mutex`. The lock is held only for
//!   one synchronous engine call and never across an `.await`.
//! - Wake-ups (actuator, report) use `Notify`, whose single stored permit
//!   collapses repeated signals into one.
//! - Publishes go to the session task, the only owner of the transport, as
//!   [`PublishRequest`]s; acknowledgments come back as
//!   [`DeviceEvent::PublishAcked`].

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use lockshadow_core::{
    DeviceEvent, PacketId, ShadowAction, ShadowEngine, ShadowSnapshot, TransportError,
    env::Environment,
};
use lockshadow_proto::{ShadowMessageType, ShadowTopic};
use tokio::sync::{Notify, mpsc, oneshot};

use crate::config::DeviceConfig;

/// Capacity of the publish request queue.
const PUBLISH_QUEUE: usize = 4;

/// Request for the session task to publish on the report cycle's behalf.
#[derive(Debug)]
pub struct PublishRequest {
    /// Destination topic.
    pub topic: String,
    /// Encoded document.
    pub payload: Bytes,
    /// Receives the packet id once the publish went out, or why it did not.
    pub issued: oneshot::Sender<Result<PacketId, TransportError>>,
}

/// Channel ends owned by the session task.
#[derive(Debug)]
pub struct SessionPorts {
    pub(crate) publish_rx: mpsc::Receiver<PublishRequest>,
    pub(crate) ack_tx: mpsc::UnboundedSender<DeviceEvent>,
}

/// Channel ends owned by the report cycle.
#[derive(Debug)]
pub struct ReportPorts {
    pub(crate) publish_tx: mpsc::Sender<PublishRequest>,
    pub(crate) ack_rx: mpsc::UnboundedReceiver<DeviceEvent>,
}

/// Handles every device task holds a clone of.
#[derive(Clone)]
pub struct DeviceContext<E: Environment> {
    env: E,
    config: Arc<DeviceConfig>,
    topics: ShadowTopic,
    engine: Arc<Mutex<ShadowEngine>>,
    actuator_wake: Arc<Notify>,
    report_trigger: Arc<Notify>,
}

impl<E: Environment> DeviceContext<E> {
    /// Create the context and the channel ends for the session and report
    /// tasks.
    pub fn new(env: E, config: DeviceConfig) -> (Self, SessionPorts, ReportPorts) {
        let (publish_tx, publish_rx) = mpsc::channel(PUBLISH_QUEUE);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        let context = Self {
            env,
            topics: ShadowTopic::new(config.thing_name.clone()),
            config: Arc::new(config),
            engine: Arc::new(Mutex::new(ShadowEngine::new())),
            actuator_wake: Arc::new(Notify::new()),
            report_trigger: Arc::new(Notify::new()),
        };

        (context, SessionPorts { publish_rx, ack_tx }, ReportPorts { publish_tx, ack_rx })
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The configuration.
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Topics of this thing.
    pub fn topics(&self) -> &ShadowTopic {
        &self.topics
    }

    /// Run a synchronous operation on the engine.
    ///
    /// Every engine call leaves consistent state, so a lock poisoned by a
    /// panicking holder is recovered rather than propagated.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut ShadowEngine) -> R) -> R {
        let mut engine = self.engine.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut engine)
    }

    /// Consistent copy of the engine state.
    pub fn snapshot(&self) -> ShadowSnapshot {
        self.with_engine(|engine| engine.snapshot())
    }

    /// Wake-up for the actuator task.
    pub fn actuator_wake(&self) -> &Arc<Notify> {
        &self.actuator_wake
    }

    /// Wake-up for the report cycle. The actuator signals it on completion.
    pub fn report_trigger(&self) -> &Arc<Notify> {
        &self.report_trigger
    }

    /// Handle a message that arrived on one of this thing's topics.
    ///
    /// Only deltas reach the engine. The engine call is synchronous and the
    /// actuator wake never blocks, so this is safe on the receive path.
    pub fn on_shadow_message(&self, topic: &str, payload: Bytes) -> Option<DeviceEvent> {
        match self.topics.match_own(topic) {
            Some(ShadowMessageType::UpdateDelta) => Some(DeviceEvent::DeltaReceived { payload }),
            Some(kind) => {
                tracing::debug!(topic, ?kind, "ignoring shadow message");
                None
            },
            None if ShadowTopic::parse(topic).is_some() => {
                tracing::debug!(topic, "ignoring shadow message for another thing");
                None
            },
            None => {
                tracing::error!(topic, "message on a topic that is not a shadow topic");
                None
            },
        }
    }

    /// Feed a delta payload to the engine and carry out its actions.
    pub fn on_delta_message(&self, payload: &[u8]) -> Vec<ShadowAction> {
        let actions = match self.with_engine(|engine| engine.on_delta(payload)) {
            Ok(actions) => actions,
            Err(e) => {
                tracing::warn!(error = %e, "delta discarded");
                return Vec::new();
            },
        };

        for action in &actions {
            match action {
                ShadowAction::StateChanged { from, to, version } => {
                    tracing::info!(%from, %to, %version, "shadow state changed");
                },
                ShadowAction::TriggerActuator => self.actuator_wake.notify_one(),
            }
        }
        actions
    }
}
