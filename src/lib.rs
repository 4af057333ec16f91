//! Loss-minimizing design search for a boost half-bridge inverter.
//!
//! A [`BoostHalfBridgeInverter`] couples a component [`Design`] with a
//! [`ConverterModel`] of losses and restrictions and an external
//! [`CircuitEvaluator`]. [`BoostHalfBridgeInverter::optimize`] searches switching
//! frequency, primary inductance and leakage inductance for the lowest loss at
//! which efficiency and loss are mutually consistent.

pub mod config;
pub mod converter;
pub mod core;
pub mod error;
pub mod optimization;
pub mod simulation;

pub use config::{BarrierSettings, FixedPointSettings, OptimizerConfig, SwarmSettings};
pub use converter::BoostHalfBridgeInverter;
pub use converter::cache::RunState;
pub use converter::efficiency::{FixedPointOutcome, FixedPointStatus};
pub use converter::model::{ConverterModel, LossGroup};
pub use crate::core::*;
pub use error::{ConverterError, Result};
pub use optimization::Algorithm;
pub use simulation::CircuitEvaluator;
