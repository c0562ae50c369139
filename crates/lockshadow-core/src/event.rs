//! Device events.
//!
//! The closed set of things that can happen to the device from outside.
//! Backend callbacks and transport deliveries are converted into these and
//! routed over channels to the task that owns the affected state.

use bytes::Bytes;

use crate::{
    connectivity::{LinkEvent, NetworkInterface},
    transport::PacketId,
};

/// External event routed to a device task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A link was selected.
    Connected {
        /// Selected interface.
        interface: NetworkInterface,
    },
    /// The selected link dropped.
    Disconnected {
        /// Interface that went away.
        interface: NetworkInterface,
    },
    /// A delta document arrived for this thing.
    DeltaReceived {
        /// Raw delta payload.
        payload: Bytes,
    },
    /// The broker acknowledged a publish.
    PublishAcked {
        /// Acknowledged packet.
        packet_id: PacketId,
    },
}

impl From<LinkEvent> for DeviceEvent {
    fn from(event: LinkEvent) -> Self {
        match event {
            LinkEvent::Connected { interface } => Self::Connected { interface },
            LinkEvent::Disconnected { interface } => Self::Disconnected { interface },
        }
    }
}
