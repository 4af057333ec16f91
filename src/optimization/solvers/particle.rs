use super::traits::{
    OptimizationCallback, Problem, Solver, SolverResult, clamp_params, exterior_penalty,
};
use crate::config::SwarmSettings;
use crate::error::Result;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generations without a relative improvement above `ftol` before the swarm
/// counts as settled.
const MAX_STAGNATION: u32 = 5;

/// Particle swarm over the box bounds. Restrictions enter through an exterior
/// penalty, so the swarm can start from, and move through, infeasible points.
pub struct ParticleOptimizer {
    max_iter: u32,
    ftol: f64,
    settings: SwarmSettings,
}

impl ParticleOptimizer {
    pub fn new(max_iter: u32, ftol: f64) -> Self {
        Self {
            max_iter,
            ftol,
            settings: SwarmSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SwarmSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Configure swarm size (default: 20)
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.settings.population_size = size;
        self
    }

    fn rng(&self) -> StdRng {
        match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// First particle is the start point, the rest uniform within bounds.
    fn initialize_particles(
        &self,
        rng: &mut StdRng,
        bounds: &[(f64, f64)],
        initial_params: &[f64],
    ) -> Vec<Vec<f64>> {
        let mut particles = Vec::with_capacity(self.settings.population_size);
        let mut first = initial_params.to_vec();
        clamp_params(&mut first, bounds);
        particles.push(first);

        for _ in 1..self.settings.population_size {
            particles.push(
                bounds
                    .iter()
                    .map(|&(min, max)| rng.gen_range(min..=max))
                    .collect(),
            );
        }
        particles
    }

    /// Small random velocities, a tenth of each range at most.
    fn initialize_velocities(&self, rng: &mut StdRng, bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        (0..self.settings.population_size)
            .map(|_| {
                bounds
                    .iter()
                    .map(|&(min, max)| {
                        let range = max - min;
                        rng.gen_range(-range * 0.1..=range * 0.1)
                    })
                    .collect()
            })
            .collect()
    }
}

impl Solver for ParticleOptimizer {
    fn name(&self) -> &str {
        "PSO"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult> {
        let n = problem.num_params();
        let bounds = problem.bounds();
        let population = self.settings.population_size;
        let mut rng = self.rng();

        let mut particles = self.initialize_particles(&mut rng, bounds, problem.initial_params());
        let mut velocities = self.initialize_velocities(&mut rng, bounds);
        let mut personal_best_positions = particles.clone();
        let mut personal_best_costs = vec![f64::INFINITY; population];

        let mut global_best_idx = 0;
        let mut global_best_cost = f64::INFINITY;

        let mut cost_evals = 0;
        let mut stagnation_counter = 0;
        let mut iterations = 0;
        let mut converged = false;
        let mut message = String::from("Max iterations reached");

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let prev_global_best = global_best_cost;

            // Evaluate all particles
            for p in 0..population {
                let cost = exterior_penalty(problem, &particles[p], self.settings.penalty_weight)?;
                cost_evals += 1;

                // Update personal best
                if cost < personal_best_costs[p] {
                    personal_best_costs[p] = cost;
                    personal_best_positions[p].copy_from_slice(&particles[p]);
                }
                // Update global best
                if cost < global_best_cost {
                    global_best_cost = cost;
                    global_best_idx = p;
                }
            }

            // Report progress using the global best
            callback.on_iteration(iterations, &personal_best_positions[global_best_idx], global_best_cost)?;
            trace!("swarm generation {}: best = {:.6e}", iterations, global_best_cost);

            // Check for early termination
            if callback.should_stop() {
                message = "Stopped by callback".into();
                break;
            }

            // Check for stagnation
            let improvement = (prev_global_best - global_best_cost).abs();
            if improvement <= self.ftol * global_best_cost.abs().max(1.0) {
                stagnation_counter += 1;
                if stagnation_counter >= MAX_STAGNATION {
                    converged = true;
                    message = "Converged".into();
                    break;
                }
            } else {
                stagnation_counter = 0;
            }

            // Update velocities and positions for all particles
            for p in 0..population {
                for i in 0..n {
                    let r1: f64 = rng.gen_range(0.0..1.0);
                    let r2: f64 = rng.gen_range(0.0..1.0);

                    velocities[p][i] = self.settings.inertia * velocities[p][i]
                        + self.settings.cognitive * r1 * (personal_best_positions[p][i] - particles[p][i])
                        + self.settings.social
                            * r2
                            * (personal_best_positions[global_best_idx][i] - particles[p][i]);

                    // Clamp velocity to fraction of search space
                    let (min, max) = bounds[i];
                    let v_max = (max - min) * 0.2;
                    velocities[p][i] = velocities[p][i].clamp(-v_max, v_max);
                    particles[p][i] += velocities[p][i];
                }
                // Clamp to bounds
                clamp_params(&mut particles[p], bounds);
            }
        }

        let params = personal_best_positions[global_best_idx].clone();
        let feasible = problem.is_feasible(&params)?;
        let cost = problem.cost(&params)?;
        if converged && !feasible {
            message = "Converged to an infeasible point".into();
        }
        debug!(
            "swarm finished after {} generations ({} evaluations): {}",
            iterations, cost_evals, message
        );

        Ok(SolverResult {
            success: converged && feasible,
            feasible,
            cost,
            iterations,
            message,
            params,
            cost_evals: cost_evals + 1,
        })
    }
}
