//! End-to-end scenarios under turmoil.
//!
//! A scenario runs three hosts on one simulated network:
//!
//! ```text
//!   device ──tcp──► broker ◄──tcp── cloud
//!   (lockshadow     (SimBroker)     (scripted deltas,
//!    device tasks)                   link faults)
//! ```
//!
//! The cloud host waits for the device to subscribe, plays the script at the
//! given offsets, then lets the simulation run out. Everything observable is
//! collected into a [`ScenarioOutcome`].

use std::{
    error::Error,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use lockshadow_core::{
    ConnectionParams, Credentials, NetworkInterface, NetworkMask, NetworkType, ShadowSnapshot,
    Transport,
};
use lockshadow_device::{
    DeviceConfig, DeviceContext, LockLines, NetworkControl, SimulatedLock, SimulatedNetworks,
    spawn_device,
};
use lockshadow_proto::{ShadowTopic, ShadowUpdate};

use crate::{
    sim_broker::{BROKER_PORT, BrokerRecord, SimBroker},
    sim_env::SimEnv,
    sim_transport::SimTransport,
};

/// Host name of the simulated broker.
pub const BROKER_HOST: &str = "broker";

/// Thing name used by scenarios.
pub const SCENARIO_THING: &str = "front-door";

/// Upper bound on waiting for the device's first subscription.
const SUBSCRIBE_DEADLINE: Duration = Duration::from_secs(60);

/// Scripted step.
#[derive(Debug, Clone)]
pub enum ScenarioEvent {
    /// The cloud publishes a delta document.
    Delta(String),
    /// A device network becomes unreachable.
    DropNetwork(NetworkType),
    /// A device network becomes reachable again.
    RestoreNetwork(NetworkType),
}

/// What a scenario produced.
#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    /// Shadow updates the device published, oldest first.
    pub reports: Vec<ShadowUpdate>,
    /// Every publish the broker accepted.
    pub records: Vec<BrokerRecord>,
    /// Final lock line levels and counters.
    pub lines: LockLines,
    /// Final engine state.
    pub snapshot: ShadowSnapshot,
}

type Slot<T> = Arc<Mutex<Option<T>>>;

fn take_slot<T: Clone>(slot: &Slot<T>) -> Option<T> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

fn fill_slot<T>(slot: &Slot<T>, value: T) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
}

fn broker_interface(network: NetworkType) -> NetworkInterface {
    NetworkInterface {
        network,
        name: format!("{network}0"),
        connection: ConnectionParams { endpoint: BROKER_HOST.to_string(), port: BROKER_PORT },
        credentials: Credentials::default(),
    }
}

/// Builder for one simulated run.
#[derive(Debug, Clone)]
pub struct Scenario {
    seed: u64,
    networks: Vec<NetworkType>,
    script: Vec<(Duration, ScenarioEvent)>,
    run_for: Duration,
    latency: Option<Duration>,
    report_on_startup: bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// Wi-Fi only, empty script, 30 s of virtual time after subscription.
    pub fn new() -> Self {
        Self {
            seed: 0,
            networks: vec![NetworkType::Wifi],
            script: Vec::new(),
            run_for: Duration::from_secs(30),
            latency: None,
            report_on_startup: false,
        }
    }

    /// Seed for turmoil and the device's tick offset.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Device networks, all reachable at start, in priority order.
    pub fn with_networks(mut self, networks: &[NetworkType]) -> Self {
        self.networks = networks.to_vec();
        self
    }

    /// Fixed one-way latency on every link.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Report once when the session first comes up.
    pub fn with_startup_report(mut self) -> Self {
        self.report_on_startup = true;
        self
    }

    /// Run this long after the device subscribed.
    pub fn run_for(mut self, duration: Duration) -> Self {
        self.run_for = duration;
        self
    }

    /// Script an event at `at` after the device subscribed.
    pub fn at(mut self, at: Duration, event: ScenarioEvent) -> Self {
        self.script.push((at, event));
        self
    }

    /// Script a delta with the given version and lock state.
    pub fn delta(self, at: Duration, version: u64, lock_state: u64) -> Self {
        let payload = format!(r#"{{"version":{version},"state":{{"lockState":{lock_state}}}}}"#);
        self.at(at, ScenarioEvent::Delta(payload))
    }

    /// Run the simulation to completion.
    ///
    /// # Errors
    ///
    /// Returns the simulation error if a host failed or the device never
    /// subscribed.
    pub fn run(self) -> Result<ScenarioOutcome, Box<dyn Error>> {
        let mut builder = turmoil::Builder::new();
        builder
            .simulation_duration(SUBSCRIBE_DEADLINE + self.run_for + Duration::from_secs(30))
            .rng_seed(self.seed);
        if let Some(latency) = self.latency {
            builder.min_message_latency(latency).max_message_latency(latency);
        }
        let mut sim = builder.build();

        let broker = SimBroker::new();
        let lock = SimulatedLock::new();
        let control: Slot<NetworkControl> = Arc::new(Mutex::new(None));
        let context: Slot<DeviceContext<SimEnv>> = Arc::new(Mutex::new(None));
        let topics = ShadowTopic::new(SCENARIO_THING);

        sim.host(BROKER_HOST, {
            let broker = broker.clone();
            move || {
                let broker = broker.clone();
                async move { broker.serve().await }
            }
        });

        sim.host("device", {
            let (lock, control, context) = (lock.clone(), control.clone(), context.clone());
            let (networks, seed, report_on_startup) =
                (self.networks.clone(), self.seed, self.report_on_startup);
            move || {
                let (lock, control, context) = (lock.clone(), control.clone(), context.clone());
                let networks = networks.clone();
                async move {
                    let interfaces: Vec<_> = networks.iter().copied().map(broker_interface).collect();
                    let config = DeviceConfig {
                        thing_name: SCENARIO_THING.to_string(),
                        networks: networks.iter().fold(NetworkMask::empty(), |m, n| m | n.mask()),
                        interfaces: interfaces.clone(),
                        report_on_startup,
                        ..DeviceConfig::default()
                    };

                    let (backend, network_control, changes) = SimulatedNetworks::new(interfaces);
                    let (device, _tasks) = spawn_device(
                        SimEnv::with_seed(seed),
                        config,
                        backend,
                        changes,
                        SimTransport::new(),
                        lock,
                    )?;
                    for network in &networks {
                        network_control.bring_up(*network);
                    }
                    fill_slot(&control, network_control);
                    fill_slot(&context, device);

                    std::future::pending::<()>().await;
                    Ok(())
                }
            }
        });

        sim.client("cloud", {
            let broker = broker.clone();
            let control = control.clone();
            let delta_topic = topics.update_delta();
            let mut script = self.script.clone();
            script.sort_by_key(|(at, _)| *at);
            let run_for = self.run_for;
            async move {
                let waited = tokio::time::Instant::now();
                while !broker.has_subscriber(&delta_topic) {
                    if waited.elapsed() > SUBSCRIBE_DEADLINE {
                        return Err("device never subscribed to its delta topic".into());
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }

                let start = tokio::time::Instant::now();
                let mut cloud = SimTransport::new();
                cloud.establish(&broker_interface(NetworkType::Ethernet)).await?;

                for (at, event) in script {
                    tokio::time::sleep_until(start + at).await;
                    tracing::info!(?event, "scenario event");
                    match event {
                        ScenarioEvent::Delta(payload) => {
                            cloud.publish(&delta_topic, Bytes::from(payload)).await?;
                        },
                        ScenarioEvent::DropNetwork(network) => {
                            if let Some(control) = take_slot(&control) {
                                control.take_down(network);
                            }
                        },
                        ScenarioEvent::RestoreNetwork(network) => {
                            if let Some(control) = take_slot(&control) {
                                control.bring_up(network);
                            }
                        },
                    }
                }

                tokio::time::sleep_until(start + run_for).await;
                cloud.disconnect().await;
                Ok(())
            }
        });

        sim.run()?;

        let snapshot = take_slot(&context).map(|c| c.snapshot()).unwrap_or_default();
        Ok(ScenarioOutcome {
            reports: broker.updates_on(&topics.update()),
            records: broker.published(),
            lines: lock.lines(),
            snapshot,
        })
    }
}
