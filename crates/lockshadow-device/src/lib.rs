//! Lockshadow device runtime.
//!
//! This crate runs the core state machines on Tokio:
//! - one session task owning the connectivity manager and the transport
//! - one report cycle task publishing open/closed reports
//! - one actuator task driving the lock lines
//!
//! plus in-process collaborators (broker, network stack, lock hardware) for
//! running the device without a cloud account or a board.
//!
//! ## Architecture
//!
//! ```text
//! lockshadow-device
//!   ├─ SystemEnv           (production Environment impl)
//!   ├─ DeviceContext       (shared engine, wake-ups, topics)
//!   ├─ run_network_lifecycle (link selection + shadow session)
//!   ├─ run_publish_cycle   (open/closed reports with ack wait)
//!   ├─ run_actuator        (lock handshake)
//!   ├─ MemoryBroker        (in-process shadow service)
//!   ├─ SimulatedNetworks   (in-process network stack)
//!   └─ SimulatedLock       (in-process lock lines)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod actuator;
mod broker;
mod config;
mod context;
mod error;
mod gpio;
mod lifecycle;
mod network;
mod publisher;
mod system_env;

pub use actuator::{handshake, run_actuator};
pub use broker::{MemoryBroker, MemoryTransport, PublishedMessage};
pub use config::{DEFAULT_RECEIVE_TIMEOUT, DEFAULT_SESSION_RETRY, DeviceConfig};
pub use context::{DeviceContext, PublishRequest, ReportPorts, SessionPorts};
pub use error::DeviceError;
pub use gpio::{LockLines, SimulatedLock};
pub use lifecycle::{NetworkLifecycle, run_network_lifecycle};
use lockshadow_core::{LockActuator, NetworkBackend, NetworkChange, Transport, env::Environment};
pub use network::{NetworkControl, SimulatedNetworks};
pub use publisher::{PublishOutcome, report_pass, run_publish_cycle};
pub use system_env::SystemEnv;
use tokio::{sync::mpsc, task::JoinHandle};

/// Join handles of the device tasks.
#[derive(Debug)]
pub struct DeviceTasks {
    /// Session task.
    pub lifecycle: JoinHandle<()>,
    /// Report cycle task.
    pub publisher: JoinHandle<()>,
    /// Actuator task.
    pub actuator: JoinHandle<()>,
}

impl DeviceTasks {
    /// Stop every task.
    pub fn abort(&self) {
        self.lifecycle.abort();
        self.publisher.abort();
        self.actuator.abort();
    }
}

/// Validate the configuration and spawn the device tasks on the current
/// runtime.
///
/// `changes` carries the backend's state-change notifications.
///
/// # Errors
///
/// Returns `DeviceError::Config` if the configuration is invalid. Nothing is
/// spawned in that case.
pub fn spawn_device<E, B, T, A>(
    env: E,
    config: DeviceConfig,
    backend: B,
    changes: mpsc::UnboundedReceiver<NetworkChange>,
    transport: T,
    actuator: A,
) -> Result<(DeviceContext<E>, DeviceTasks), DeviceError>
where
    E: Environment,
    B: NetworkBackend + 'static,
    T: Transport + 'static,
    A: LockActuator + 'static,
{
    config.validate()?;

    let networks = config.networks;
    let (context, session_ports, report_ports) = DeviceContext::new(env, config);
    let lifecycle = NetworkLifecycle::new(backend, networks, changes);

    tracing::info!(thing = %context.topics().thing_name(), ?networks, "device starting");

    let tasks = DeviceTasks {
        lifecycle: tokio::spawn(run_network_lifecycle(
            context.clone(),
            lifecycle,
            transport,
            session_ports,
        )),
        publisher: tokio::spawn(run_publish_cycle(context.clone(), report_ports)),
        actuator: tokio::spawn(run_actuator(context.clone(), actuator)),
    };

    Ok((context, tasks))
}
