//! Optimizer configuration.
//!
//! All fields have defaults, so a JSON document only needs the values it
//! overrides.

use crate::core::{CandidateVector, VariableBounds, VariableScaling};
use crate::error::{ConverterError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedPointSettings {
    /// Efficiency assumed before the first simulation.
    pub initial_efficiency: f64,
    /// Absolute change in loss (W) between iterations that counts as settled.
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for FixedPointSettings {
    fn default() -> Self {
        Self {
            initial_efficiency: 0.8,
            tolerance: 0.01,
            max_iterations: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BarrierSettings {
    /// Barrier scale `r` of the first subproblem.
    pub initial_scale: f64,
    /// Factor applied to `r` between subproblems.
    pub reduction: f64,
    pub max_outer_iterations: u32,
    /// Initial simplex edge, as a fraction of each scaled variable range.
    pub simplex_step: f64,
}

impl Default for BarrierSettings {
    fn default() -> Self {
        Self {
            initial_scale: 1.0,
            reduction: 0.1,
            max_outer_iterations: 8,
            simplex_step: 0.05,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSettings {
    pub population_size: usize,
    pub inertia: f64,
    pub cognitive: f64,
    pub social: f64,
    /// Weight on squared constraint violation added to the loss.
    pub penalty_weight: f64,
    /// Fixed RNG seed; `None` draws from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for SwarmSettings {
    fn default() -> Self {
        Self {
            population_size: 20,
            inertia: 0.7,
            cognitive: 1.5,
            social: 1.5,
            penalty_weight: 1e6,
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub initial_point: CandidateVector,
    pub bounds: VariableBounds,
    pub scaling: VariableScaling,
    pub fixed_point: FixedPointSettings,
    /// Efficiency used when the constraint path has to simulate on its own.
    pub constraint_efficiency: f64,
    /// Relative objective change below which a solver counts as converged.
    pub ftol: f64,
    pub feasibility_tolerance: f64,
    /// Relative distance under which two candidates share a cached simulation.
    /// Zero means exact bit equality.
    pub cache_tolerance: f64,
    pub barrier: BarrierSettings,
    pub swarm: SwarmSettings,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            initial_point: CandidateVector::new(40e3, 0.0002562, 1e-6),
            bounds: VariableBounds::default(),
            scaling: VariableScaling::default(),
            fixed_point: FixedPointSettings::default(),
            constraint_efficiency: 0.8,
            ftol: 1e-6,
            feasibility_tolerance: 1e-9,
            cache_tolerance: 0.0,
            barrier: BarrierSettings::default(),
            swarm: SwarmSettings::default(),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ConverterError {
    ConverterError::InvalidConfig(msg.into())
}

fn is_efficiency(value: f64) -> bool {
    value > 0.0 && value < 1.0
}

impl OptimizerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let names = ["frequency", "primary_inductance", "leakage_inductance"];
        for ((name, (min, max)), k) in names
            .iter()
            .zip(self.bounds.to_array())
            .zip(self.scaling.factors())
        {
            if !(min.is_finite() && max.is_finite() && min < max) {
                return Err(invalid(format!("bounds for {name} must satisfy min < max")));
            }
            if !(k.is_finite() && k > 0.0) {
                return Err(invalid(format!("scaling for {name} must be positive")));
            }
        }
        if !self.bounds.contains(&self.initial_point) {
            return Err(invalid("initial point lies outside the bounds"));
        }
        if !is_efficiency(self.fixed_point.initial_efficiency) {
            return Err(invalid("initial efficiency must lie in (0, 1)"));
        }
        if !is_efficiency(self.constraint_efficiency) {
            return Err(invalid("constraint efficiency must lie in (0, 1)"));
        }
        if self.fixed_point.max_iterations == 0 || !(self.fixed_point.tolerance > 0.0) {
            return Err(invalid(
                "fixed point needs a positive tolerance and at least one iteration",
            ));
        }
        if !(self.ftol > 0.0) || self.feasibility_tolerance < 0.0 || self.cache_tolerance < 0.0 {
            return Err(invalid("tolerances must be non-negative and ftol positive"));
        }
        let b = &self.barrier;
        if !(b.initial_scale > 0.0) || !(b.reduction > 0.0 && b.reduction < 1.0) {
            return Err(invalid("barrier scale must be positive and reduction in (0, 1)"));
        }
        if b.max_outer_iterations == 0 || !(b.simplex_step > 0.0 && b.simplex_step < 1.0) {
            return Err(invalid(
                "barrier needs at least one outer iteration and a simplex step in (0, 1)",
            ));
        }
        if self.swarm.population_size < 2 {
            return Err(invalid("swarm needs at least two particles"));
        }
        Ok(())
    }
}
