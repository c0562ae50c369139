//! Reference model for model-based testing.
//!
//! The model is a plain restatement of how the device's shadow view should
//! react to deltas and reports, with no parsing and no logging. It serves as
//! the oracle the real engine is checked against.
//!
//! # Design Principles
//!
//! - Simplicity: The model should be obviously correct
//! - Behavior not mechanism: operations carry decoded intent, the real
//!   engine gets the encoded document
//! - Deterministic: Same inputs produce same outputs

pub mod operation;
mod shadow;

pub use operation::{DeltaShape, Operation, OperationResult};
pub use shadow::{ModelShadow, ObservableState};
