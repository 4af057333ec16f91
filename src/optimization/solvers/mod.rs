mod barrier;
mod particle;
pub mod traits;

pub use barrier::BarrierOptimizer;
pub use particle::ParticleOptimizer;
pub use traits::{OptimizationCallback, Problem, Solver, SolverResult};

use crate::config::OptimizerConfig;
use crate::error::{ConverterError, Result};
use std::fmt;
use std::str::FromStr;

/// Algorithm names accepted by the optimization driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    /// Log-barrier continuation over Nelder-Mead. Also accepted as `alag` and `slsqp`.
    Barrier,
    ParticleSwarm,
    /// Barrier from a feasible start, swarm otherwise.
    Auto,
}

impl FromStr for Algorithm {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "barrier" | "alag" | "slsqp" => Ok(Self::Barrier),
            "pso" | "particle-swarm" => Ok(Self::ParticleSwarm),
            "auto" => Ok(Self::Auto),
            _ => Err(ConverterError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Barrier => "barrier",
            Self::ParticleSwarm => "pso",
            Self::Auto => "auto",
        })
    }
}

/// Build the solver for `algorithm`, resolving `Auto` against the problem's
/// start point. Returns the solver and a human-readable reason.
pub fn select_solver(
    algorithm: Algorithm,
    problem: &dyn Problem,
    config: &OptimizerConfig,
    max_iterations: u32,
) -> Result<(Box<dyn Solver>, String)> {
    let barrier = || {
        BarrierOptimizer::new(max_iterations, config.ftol).with_settings(config.barrier)
    };
    let swarm = |population: usize| {
        ParticleOptimizer::new(max_iterations, config.ftol)
            .with_settings(config.swarm)
            .with_population_size(population)
    };

    let selected: (Box<dyn Solver>, String) = match algorithm {
        Algorithm::Barrier => (Box::new(barrier()), "barrier (requested)".into()),
        Algorithm::ParticleSwarm => (
            Box::new(swarm(config.swarm.population_size)),
            format!("PSO (requested, pop={})", config.swarm.population_size),
        ),
        Algorithm::Auto => {
            let constraints = problem.constraints(problem.initial_params())?;
            let strictly_feasible = constraints.iter().all(|&g| g > 0.0);
            if strictly_feasible {
                (
                    Box::new(barrier()),
                    format!(
                        "Auto: start strictly inside {} restrictions → barrier",
                        constraints.len()
                    ),
                )
            } else {
                // Scale population with dimension, as for small circuit problems.
                let n = problem.num_params();
                let pop_size = (10 + n * 3).max(config.swarm.population_size).min(30);
                (
                    Box::new(swarm(pop_size)),
                    format!("Auto: infeasible start ({n} params) → PSO (pop={pop_size})"),
                )
            }
        }
    };
    Ok(selected)
}
