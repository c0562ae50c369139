//! Transport over simulated TCP.
//!
//! Connects to the [`SimBroker`](crate::SimBroker) named by the interface's
//! connection parameters. A reader task turns incoming lines into
//! [`Inbound`] items on a channel, which keeps `receive` cancel-safe.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use lockshadow_core::{Inbound, NetworkInterface, PacketId, Transport, TransportError};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, WriteHalf},
    sync::mpsc,
    task::JoinHandle,
};
use turmoil::net::TcpStream;

use crate::wire::Frame;

struct Session {
    writer: WriteHalf<TcpStream>,
    inbound: mpsc::UnboundedReceiver<Result<Inbound, String>>,
    reader: JoinHandle<()>,
    next_packet: u16,
    failure: Option<String>,
}

impl Session {
    async fn send(&mut self, frame: &Frame) -> Result<(), String> {
        let line = frame.to_line().map_err(|e| e.to_string())?;
        self.writer.write_all(line.as_bytes()).await.map_err(|e| e.to_string())
    }
}

/// Client side of the simulated broker protocol.
#[derive(Default)]
pub struct SimTransport {
    session: Option<Session>,
}

impl SimTransport {
    /// Transport with no session.
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&mut self) -> Result<&mut Session, TransportError> {
        self.session.as_mut().ok_or(TransportError::NotConnected)
    }

    fn close(&mut self) {
        if let Some(session) = self.session.take() {
            session.reader.abort();
        }
    }
}

async fn read_frames(
    reader: tokio::io::ReadHalf<TcpStream>,
    inbound: mpsc::UnboundedSender<Result<Inbound, String>>,
) {
    let mut lines = BufReader::new(reader).lines();
    loop {
        let item = match lines.next_line().await {
            Ok(Some(line)) => match Frame::from_line(&line) {
                Ok(Frame::Message { topic, payload }) => {
                    Ok(Inbound::Message { topic, payload: Bytes::from(payload) })
                },
                Ok(Frame::PubAck { packet_id }) => {
                    Ok(Inbound::PubAck { packet_id: PacketId(packet_id) })
                },
                Ok(other) => {
                    tracing::warn!(?other, "unexpected frame from broker");
                    continue;
                },
                Err(e) => {
                    tracing::warn!(error = %e, "undecodable frame from broker");
                    continue;
                },
            },
            Ok(None) => Err("connection closed by broker".to_string()),
            Err(e) => Err(e.to_string()),
        };

        let done = item.is_err();
        if inbound.send(item).is_err() || done {
            return;
        }
    }
}

#[async_trait]
impl Transport for SimTransport {
    async fn establish(&mut self, interface: &NetworkInterface) -> Result<(), TransportError> {
        self.close();

        let endpoint = interface.connection.endpoint.as_str();
        let stream = TcpStream::connect((endpoint, interface.connection.port))
            .await
            .map_err(|e| TransportError::Connect(format!("{endpoint}: {e}")))?;

        let (reader, writer) = tokio::io::split(stream);
        let (tx, rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_frames(reader, tx));

        self.session =
            Some(Session { writer, inbound: rx, reader, next_packet: 0, failure: None });
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let frame = Frame::Subscribe { topic: topic.to_string() };
        self.session()?
            .send(&frame)
            .await
            .map_err(|reason| TransportError::Subscribe { topic: topic.to_string(), reason })
    }

    async fn publish(&mut self, topic: &str, payload: Bytes) -> Result<PacketId, TransportError> {
        let payload = String::from_utf8(payload.to_vec()).map_err(|e| {
            TransportError::Publish { topic: topic.to_string(), reason: e.to_string() }
        })?;

        let session = self.session()?;
        session.next_packet = session.next_packet.checked_add(1).unwrap_or(1);
        let packet_id = session.next_packet;

        let frame = Frame::Publish { packet_id, topic: topic.to_string(), payload };
        session
            .send(&frame)
            .await
            .map_err(|reason| TransportError::Publish { topic: topic.to_string(), reason })?;
        Ok(PacketId(packet_id))
    }

    async fn receive(&mut self, timeout: Duration) -> Result<Vec<Inbound>, TransportError> {
        let session = self.session()?;
        if let Some(reason) = session.failure.take() {
            return Err(TransportError::Receive(reason));
        }

        let first = match tokio::time::timeout(timeout, session.inbound.recv()).await {
            Err(_) => return Ok(Vec::new()),
            Ok(None) => return Err(TransportError::Receive("reader stopped".to_string())),
            Ok(Some(Err(reason))) => return Err(TransportError::Receive(reason)),
            Ok(Some(Ok(first))) => first,
        };

        let mut received = vec![first];
        while let Ok(next) = session.inbound.try_recv() {
            match next {
                Ok(item) => received.push(item),
                Err(reason) => {
                    // Report what already arrived; the failure surfaces next call.
                    session.failure = Some(reason);
                    break;
                },
            }
        }
        Ok(received)
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.as_mut() {
            let _ = session.writer.shutdown().await;
        }
        self.close();
    }
}
