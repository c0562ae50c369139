//! Deterministic simulation harness for lockshadow testing.
//!
//! Turmoil-based implementations of the Environment and Transport traits,
//! plus a simulated shadow broker, for deterministic and reproducible runs
//! of the whole device under virtual time.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the shadow
//! view. Operations are applied to both the model and the real engine, and
//! their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod scenario;
pub mod sim_broker;
pub mod sim_env;
pub mod sim_transport;
pub mod wire;

pub use model::{DeltaShape, ModelShadow, ObservableState, Operation, OperationResult};
pub use scenario::{SCENARIO_THING, Scenario, ScenarioEvent, ScenarioOutcome};
pub use sim_broker::{BROKER_PORT, BrokerRecord, SimBroker};
pub use sim_env::SimEnv;
pub use sim_transport::SimTransport;
