//! Lockshadow device binary.
//!
//! Runs the device against the in-process broker and network stack, which
//! is enough to watch a full delta, handshake and report cycle in the logs.
//!
//! # Usage
//!
//! ```bash
//! # Report once at startup, then idle
//! lockshadow-device --thing-name front-door
//!
//! # Open the lock through a delta two seconds after the link comes up
//! lockshadow-device --thing-name front-door --inject-delta '{"version":1,"state":{"lockState":1}}'
//! ```

use std::time::Duration;

use clap::Parser;
use lockshadow_core::{
    ActuatorConfig, ConnectionParams, Credentials, NetworkInterface, NetworkMask, NetworkType,
    ReportConfig,
};
use lockshadow_device::{
    DeviceConfig, DeviceError, MemoryBroker, SimulatedLock, SimulatedNetworks, SystemEnv,
    spawn_device,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Lockshadow device
#[derive(Parser, Debug)]
#[command(name = "lockshadow-device")]
#[command(about = "Lock that mirrors a cloud device shadow")]
#[command(version)]
struct Args {
    /// Thing name the shadow topics are derived from
    #[arg(short, long, default_value = "lockshadow-device")]
    thing_name: String,

    /// Broker endpoint
    #[arg(short, long, default_value = "localhost")]
    endpoint: String,

    /// Broker port
    #[arg(short, long, default_value = "8883")]
    port: u16,

    /// Path to client certificate (PEM format)
    #[arg(long)]
    cert: Option<String>,

    /// Path to client private key (PEM format)
    #[arg(long)]
    key: Option<String>,

    /// Path to root CA bundle (PEM format)
    #[arg(long)]
    root_ca: Option<String>,

    /// Network types to use, in any order (wifi, ble, ethernet, cellular)
    #[arg(long, value_delimiter = ',', default_value = "wifi")]
    networks: Vec<String>,

    /// Acknowledgment timeout per report, in milliseconds
    #[arg(long, default_value = "5000")]
    ack_timeout_ms: u64,

    /// Open window for the lock and the open report, in milliseconds
    #[arg(long, default_value = "5000")]
    dwell_ms: u64,

    /// Do not report the lock state when the session first comes up
    #[arg(long)]
    no_startup_report: bool,

    /// Delta document to deliver once the session is up
    #[arg(long)]
    inject_delta: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn device_config(&self) -> Result<DeviceConfig, DeviceError> {
        let mut networks = NetworkMask::empty();
        let mut interfaces = Vec::new();
        for name in &self.networks {
            let network = NetworkType::from_name(name)
                .ok_or_else(|| DeviceError::Config(format!("unknown network type {name:?}")))?;
            networks |= network.mask();
            interfaces.push(NetworkInterface {
                network,
                name: format!("{network}0"),
                connection: ConnectionParams { endpoint: self.endpoint.clone(), port: self.port },
                credentials: Credentials {
                    client_cert: self.cert.clone(),
                    private_key: self.key.clone(),
                    root_ca: self.root_ca.clone(),
                },
            });
        }

        let dwell = Duration::from_millis(self.dwell_ms);
        Ok(DeviceConfig {
            thing_name: self.thing_name.clone(),
            networks,
            interfaces,
            report: ReportConfig {
                ack_timeout: Duration::from_millis(self.ack_timeout_ms),
                open_dwell: dwell,
            },
            actuator: ActuatorConfig { dwell },
            report_on_startup: !self.no_startup_report,
            ..DeviceConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), DeviceError> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = args.device_config()?;
    if args.cert.is_none() || args.key.is_none() {
        tracing::warn!("No client certificate provided - the session is unauthenticated");
    }

    let broker = MemoryBroker::new();
    let (backend, control, changes) = SimulatedNetworks::new(config.interfaces.clone());
    let lock = SimulatedLock::new();
    let delta_topic = lockshadow_proto::ShadowTopic::new(config.thing_name.clone()).update_delta();
    let first_network = NetworkType::first_in(config.networks);

    let (context, tasks) =
        spawn_device(SystemEnv::new(), config, backend, changes, broker.transport(), lock)?;

    if let Some(network) = first_network {
        control.bring_up(network);
    }

    if let Some(delta) = args.inject_delta {
        while !broker.has_subscriber(&delta_topic) {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        let delivered = broker.publish(&delta_topic, delta.into_bytes());
        tracing::info!(delivered, "delta injected");
    }

    tokio::signal::ctrl_c().await?;

    let snapshot = context.snapshot();
    tracing::info!(
        lock_state = %snapshot.lock_state,
        version = %snapshot.version,
        reports = broker.published().len(),
        "shutting down"
    );
    tasks.abort();

    Ok(())
}
