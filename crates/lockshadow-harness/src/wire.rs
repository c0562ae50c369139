//! Line protocol between the simulated broker and its sessions.
//!
//! One JSON object per line. Shadow documents are JSON text, so payloads
//! travel as strings.

use serde::{Deserialize, Serialize};

/// One protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Frame {
    /// Session subscribes to an exact topic.
    Subscribe {
        /// Topic.
        topic: String,
    },
    /// Session publishes.
    #[serde(rename_all = "camelCase")]
    Publish {
        /// Identifier echoed in the acknowledgment.
        packet_id: u16,
        /// Topic.
        topic: String,
        /// Document text.
        payload: String,
    },
    /// Broker acknowledges a publish.
    #[serde(rename_all = "camelCase")]
    PubAck {
        /// Acknowledged packet.
        packet_id: u16,
    },
    /// Broker delivers a message on a subscribed topic.
    Message {
        /// Topic.
        topic: String,
        /// Document text.
        payload: String,
    },
}

impl Frame {
    /// Encode as one line, newline included.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decode one line, trailing newline optional.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_frame_layout() {
        let frame = Frame::Publish {
            packet_id: 3,
            topic: "t".to_string(),
            payload: r#"{"a":1}"#.to_string(),
        };
        let line = frame.to_line().expect("encode");
        assert_eq!(line, "{\"op\":\"publish\",\"packetId\":3,\"topic\":\"t\",\"payload\":\"{\\\"a\\\":1}\"}\n");
        assert_eq!(Frame::from_line(&line).expect("decode"), frame);
    }

    #[test]
    fn unknown_op_is_rejected() {
        assert!(Frame::from_line(r#"{"op":"connect"}"#).is_err());
    }
}
