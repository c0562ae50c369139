//! Simulated shadow broker.
//!
//! Runs as a turmoil host. Accepts sessions over simulated TCP, acknowledges
//! every publish, and forwards it to the other sessions subscribed to the
//! exact topic. The state is shared with the test through [`SimBroker`]
//! handles so scenarios can inspect what the device reported.

use std::{
    error::Error,
    net::{IpAddr, Ipv4Addr},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use lockshadow_proto::ShadowUpdate;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};
use turmoil::net::{TcpListener, TcpStream};

use crate::wire::Frame;

/// Port the simulated broker listens on.
pub const BROKER_PORT: u16 = 8883;

/// Publish the broker accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    /// Session that published.
    pub session: u64,
    /// Topic.
    pub topic: String,
    /// Document text.
    pub payload: String,
}

#[derive(Default)]
struct BrokerState {
    next_session: u64,
    sessions: Vec<(u64, mpsc::UnboundedSender<Frame>)>,
    subscriptions: Vec<(u64, String)>,
    published: Vec<BrokerRecord>,
}

/// Handle to the simulated broker's shared state.
#[derive(Clone, Default)]
pub struct SimBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl SimBroker {
    /// Empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept sessions forever. Run this as a turmoil host.
    pub async fn serve(&self) -> Result<(), Box<dyn Error>> {
        let listener =
            TcpListener::bind((IpAddr::from(Ipv4Addr::UNSPECIFIED), BROKER_PORT)).await?;
        loop {
            let (stream, peer) = listener.accept().await?;
            let broker = self.clone();
            tokio::spawn(async move {
                let session = broker.open_session();
                tracing::debug!(session, %peer, "broker session opened");
                broker.run_session(session, stream).await;
                broker.close_session(session);
                tracing::debug!(session, "broker session closed");
            });
        }
    }

    /// Every publish accepted so far, oldest first.
    pub fn published(&self) -> Vec<BrokerRecord> {
        self.lock().published.clone()
    }

    /// Accepted publishes on `topic` that parse as shadow updates.
    pub fn updates_on(&self, topic: &str) -> Vec<ShadowUpdate> {
        self.lock()
            .published
            .iter()
            .filter(|r| r.topic == topic)
            .filter_map(|r| ShadowUpdate::from_json(r.payload.as_bytes()).ok())
            .collect()
    }

    /// Whether some session subscribed to `topic`.
    pub fn has_subscriber(&self, topic: &str) -> bool {
        self.lock().subscriptions.iter().any(|(_, t)| t == topic)
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn open_session(&self) -> u64 {
        let mut state = self.lock();
        let id = state.next_session;
        state.next_session += 1;
        id
    }

    fn close_session(&self, session: u64) {
        let mut state = self.lock();
        state.sessions.retain(|(id, _)| *id != session);
        state.subscriptions.retain(|(id, _)| *id != session);
    }

    async fn run_session(&self, session: u64, stream: TcpStream) {
        let (reader, mut writer) = tokio::io::split(stream);
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Frame>();
        self.lock().sessions.push((session, outbound_tx.clone()));

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let Ok(line) = frame.to_line() else {
                    continue;
                };
                if writer.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(reader).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::debug!(session, error = %e, "broker read failed");
                    break;
                },
            };
            match Frame::from_line(&line) {
                Ok(frame) => self.on_frame(session, &outbound_tx, frame),
                Err(e) => tracing::warn!(session, error = %e, "broker got a bad frame"),
            }
        }

        writer_task.abort();
    }

    fn on_frame(&self, session: u64, outbound: &mpsc::UnboundedSender<Frame>, frame: Frame) {
        match frame {
            Frame::Subscribe { topic } => {
                self.lock().subscriptions.push((session, topic));
            },
            Frame::Publish { packet_id, topic, payload } => {
                let mut state = self.lock();
                for (target, _) in state.subscriptions.iter().filter(|(_, t)| *t == topic) {
                    if let Some((_, tx)) = state.sessions.iter().find(|(id, _)| id == target) {
                        let _ = tx.send(Frame::Message {
                            topic: topic.clone(),
                            payload: payload.clone(),
                        });
                    }
                }
                state.published.push(BrokerRecord { session, topic, payload });
                drop(state);

                let _ = outbound.send(Frame::PubAck { packet_id });
            },
            Frame::PubAck { .. } | Frame::Message { .. } => {
                tracing::warn!(session, "broker got a broker-side frame");
            },
        }
    }
}
