//! Log-barrier continuation.
//!
//! Each outer step minimizes `Problem::penalized(x, r)` with Nelder-Mead from the
//! previous solution, then shrinks `r`. The barrier is only finite strictly
//! inside the feasible region, so a start on or outside a restriction first
//! goes through a feasibility phase that maximizes the smallest residual. If
//! that phase cannot reach a strictly feasible point the run reports an
//! infeasible result.

use super::traits::{OptimizationCallback, Problem, Solver, SolverResult, clamp_params};
use crate::config::BarrierSettings;
use crate::error::{ConverterError, Result};
use argmin::core::{CostFunction, Executor, State, TerminationReason, TerminationStatus};
use argmin::solver::neldermead::NelderMead;
use log::debug;
use std::cell::{Cell, RefCell};

/// Stand-in for a non-finite barrier value so the simplex can still be ordered.
const INFEASIBLE_COST: f64 = 1e30;

/// Weight on squared (range-normalised) distance outside the box bounds.
const BOUND_PENALTY: f64 = 1e6;

pub struct BarrierOptimizer {
    max_iter: u32,
    ftol: f64,
    settings: BarrierSettings,
}

impl BarrierOptimizer {
    pub fn new(max_iter: u32, ftol: f64) -> Self {
        Self {
            max_iter,
            ftol,
            settings: BarrierSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: BarrierSettings) -> Self {
        self.settings = settings;
        self
    }

    /// `x` plus one vertex per coordinate, stepped toward the interior.
    fn initial_simplex(&self, x: &[f64], bounds: &[(f64, f64)]) -> Vec<Vec<f64>> {
        let mut simplex = vec![x.to_vec()];
        for (i, &(min, max)) in bounds.iter().enumerate() {
            let step = (max - min) * self.settings.simplex_step;
            let mut vertex = x.to_vec();
            vertex[i] = if x[i] + step <= max { x[i] + step } else { x[i] - step };
            simplex.push(vertex);
        }
        simplex
    }

    /// Run Nelder-Mead on one stage from `params`. Returns the best point found,
    /// clamped to the bounds, and how the inner solve ended.
    fn run_simplex(
        &self,
        problem: &dyn Problem,
        stage: Stage,
        params: &[f64],
        evaluations: &Cell<usize>,
        failure: &RefCell<Option<ConverterError>>,
    ) -> Result<(Vec<f64>, TerminationStatus)> {
        let bounds = problem.bounds();
        let subproblem = BarrierSubproblem {
            problem,
            stage,
            evaluations,
            failure,
        };

        // Simplex spread, relative to the stage value at its start.
        let start = subproblem.objective(params)?;
        let start = if start.is_finite() { start } else { INFEASIBLE_COST };
        let sd_tolerance = self.ftol * start.abs().max(1.0);

        let simplex = NelderMead::new(self.initial_simplex(params, bounds))
            .with_sd_tolerance(sd_tolerance)
            .map_err(|e| ConverterError::Solver(e.to_string()))?;

        let result = Executor::new(subproblem, simplex)
            .configure(|state| state.max_iters(u64::from(self.max_iter)))
            .run();
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                // A simulation failure inside the cost function wins over argmin's wrapper.
                return Err(failure
                    .borrow_mut()
                    .take()
                    .unwrap_or_else(|| ConverterError::Solver(e.to_string())));
            }
        };

        let state = result.state();
        let mut best = state
            .get_best_param()
            .cloned()
            .unwrap_or_else(|| params.to_vec());
        clamp_params(&mut best, bounds);
        Ok((best, state.get_termination_status().clone()))
    }
}

/// How far the worst inequality residual falls short of zero. Negative once
/// every residual is strictly positive.
fn shortfall(residuals: &[f64]) -> f64 {
    -residuals.iter().copied().fold(f64::INFINITY, f64::min)
}

#[derive(Clone, Copy)]
enum Stage {
    /// Drive the smallest residual above zero.
    Feasibility,
    /// Barrier subproblem at scale `r`.
    Barrier(f64),
}

/// One stage as seen by argmin.
struct BarrierSubproblem<'a> {
    problem: &'a dyn Problem,
    stage: Stage,
    evaluations: &'a Cell<usize>,
    failure: &'a RefCell<Option<ConverterError>>,
}

impl BarrierSubproblem<'_> {
    fn objective(&self, params: &[f64]) -> Result<f64> {
        match self.stage {
            Stage::Feasibility => Ok(shortfall(&self.problem.constraints(params)?)),
            Stage::Barrier(scale) => self.problem.penalized(params, scale),
        }
    }
}

impl CostFunction for BarrierSubproblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.evaluations.set(self.evaluations.get() + 1);
        let bounds = self.problem.bounds();
        let mut clamped = params.clone();
        clamp_params(&mut clamped, bounds);

        // Range-normalised distance outside the box
        let excess: f64 = params
            .iter()
            .zip(&clamped)
            .zip(bounds)
            .map(|((p, c), (min, max))| ((p - c) / (max - min)).powi(2))
            .sum();

        match self.objective(&clamped) {
            Ok(value) => {
                let value = if value.is_finite() { value } else { INFEASIBLE_COST };
                Ok(value + BOUND_PENALTY * excess)
            }
            Err(e) => {
                let msg = e.to_string();
                self.failure.borrow_mut().get_or_insert(e);
                Err(argmin::core::Error::msg(msg))
            }
        }
    }
}

impl Solver for BarrierOptimizer {
    fn name(&self) -> &str {
        "LogBarrier"
    }

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult> {
        let bounds = problem.bounds();
        let mut params = problem.initial_params().to_vec();
        clamp_params(&mut params, bounds);

        let evaluations = Cell::new(0);
        let failure = RefCell::new(None);

        // Feasibility phase: the barrier is infinite on and outside a restriction
        let residuals = problem.constraints(&params)?;
        if !residuals.is_empty() && shortfall(&residuals) >= 0.0 {
            let (found, status) =
                self.run_simplex(problem, Stage::Feasibility, &params, &evaluations, &failure)?;
            params = found;
            let remaining = shortfall(&problem.constraints(&params)?);
            debug!(
                "feasibility phase: shortfall {:.3e} -> {:.3e} ({})",
                shortfall(&residuals),
                remaining,
                status
            );

            if remaining >= 0.0 {
                let feasible = problem.is_feasible(&params)?;
                let cost = problem.cost(&params)?;
                return Ok(SolverResult {
                    success: false,
                    feasible,
                    cost,
                    iterations: 0,
                    message: "No strictly feasible point found".into(),
                    params,
                    cost_evals: evaluations.get() + 1,
                });
            }
        }

        let mut scale = self.settings.initial_scale;
        let mut prev_cost = f64::INFINITY;
        let mut cost = f64::INFINITY;
        let mut converged = false;
        let mut iterations = 0;
        let mut message = String::from("Max outer iterations reached");

        for outer in 0..self.settings.max_outer_iterations {
            iterations = outer + 1;

            // Solve the barrier subproblem from the previous optimum
            let (found, status) =
                self.run_simplex(problem, Stage::Barrier(scale), &params, &evaluations, &failure)?;
            params = found;
            let inner_converged = matches!(
                status,
                TerminationStatus::Terminated(TerminationReason::SolverConverged)
            );

            // Report the plain objective, not the barrier value
            cost = problem.cost(&params)?;
            evaluations.set(evaluations.get() + 1);
            callback.on_iteration(iterations, &params, cost)?;
            debug!(
                "barrier step {}: r = {:.3e}, cost = {:.6}, inner = {}",
                iterations, scale, cost, status
            );

            // Check convergence
            let settled = (prev_cost - cost).abs() <= self.ftol * cost.abs().max(1.0);
            if inner_converged && settled {
                converged = true;
                message = "Converged".into();
                break;
            }

            // Check for early termination
            if callback.should_stop() {
                message = "Stopped by callback".into();
                break;
            }

            // Tighten the barrier
            prev_cost = cost;
            scale *= self.settings.reduction;
        }

        let feasible = problem.is_feasible(&params)?;
        if converged && !feasible {
            message = "Converged to an infeasible point".into();
        }

        Ok(SolverResult {
            success: converged && feasible,
            feasible,
            cost,
            iterations,
            message,
            params,
            cost_evals: evaluations.get(),
        })
    }
}
