use super::solvers::traits::OptimizationCallback;
use crate::core::VariableScaling;
use crate::error::Result;
use log::{debug, info};

/// Iteration result for tracking optimization progress
#[derive(Debug, Clone)]
pub struct IterationResult {
    pub params: Vec<f64>,
    pub cost: f64,
}

/// Records every solver iteration and reports it through the `log` facade.
pub struct ProgressCallback {
    max_iterations: u32,
    iteration_count: u32,
    history: Vec<IterationResult>,
    scaling: VariableScaling,
}

impl ProgressCallback {
    pub fn new(max_iterations: u32, scaling: VariableScaling) -> Self {
        Self {
            max_iterations,
            iteration_count: 0,
            history: Vec::new(),
            scaling,
        }
    }

    /// Get iteration history
    pub fn history(&self) -> &[IterationResult] {
        &self.history
    }

    pub fn log_summary(&self, success: bool, stop_reason: &str) {
        info!(
            "optimization {}: {} after {} iterations",
            if success { "succeeded" } else { "failed" },
            stop_reason,
            self.history.len()
        );
        if let Some(last) = self.history.last() {
            let x = self.scaling.unscale(&last.params);
            info!(
                "final loss {:.6} W at f = {:.1} Hz, Li = {:.4e} H, Lk = {:.4e} H",
                last.cost, x.frequency, x.primary_inductance, x.leakage_inductance
            );
        }
    }
}

impl OptimizationCallback for ProgressCallback {
    fn on_iteration(&mut self, iteration: u32, params: &[f64], cost: f64) -> Result<()> {
        self.iteration_count = iteration;
        self.history.push(IterationResult {
            params: params.to_vec(),
            cost,
        });
        debug!("iter {:4}: cost = {:.6e}", iteration, cost);
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.iteration_count >= self.max_iterations
    }
}
