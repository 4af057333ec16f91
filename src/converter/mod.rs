//! The boost half-bridge inverter and its optimization driver.

pub mod cache;
pub mod efficiency;
pub mod model;
pub mod penalty;

use crate::config::OptimizerConfig;
use crate::core::{
    CandidateVector, Design, OptimizationReport, ParameterValue, Residual, parameters,
};
use crate::error::{ConverterError, Result};
use crate::optimization::{Algorithm, ConverterProblem, ProgressCallback, select_solver};
use crate::simulation::CircuitEvaluator;
use cache::RunState;
use efficiency::{FixedPointOutcome, solve_efficiency};
use log::{debug, info, warn};
use model::{ConverterModel, LossGroup};
use rayon::prelude::*;
use std::sync::Arc;

/// A converter design together with its loss/restriction models and the
/// circuit evaluator that feeds them.
pub struct BoostHalfBridgeInverter {
    design: Design,
    model: ConverterModel,
    evaluator: Box<dyn CircuitEvaluator>,
    config: OptimizerConfig,
    feasible: bool,
    last_report: Option<OptimizationReport>,
}

impl BoostHalfBridgeInverter {
    pub fn new(
        design: Design,
        model: ConverterModel,
        evaluator: impl CircuitEvaluator + 'static,
    ) -> Result<Self> {
        let po = design.output_power();
        if !(po.is_finite() && po > 0.0) {
            return Err(ConverterError::InvalidConfig(format!(
                "output power must be positive, got {po}"
            )));
        }
        Ok(Self {
            design,
            model,
            evaluator: Box::new(evaluator),
            config: OptimizerConfig::default(),
            feasible: false,
            last_report: None,
        })
    }

    pub fn with_config(mut self, config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn design(&self) -> &Design {
        &self.design
    }

    pub fn model(&self) -> &ConverterModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ConverterModel {
        &mut self.model
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn get_parameter(&self, name: &str) -> Result<ParameterValue> {
        parameters::get_parameter(&self.design, name)
    }

    pub fn set_parameter(&mut self, name: &str, value: ParameterValue) -> Result<()> {
        parameters::set_parameter(&mut self.design, name, value)
    }

    pub fn set_loss_active(&mut self, name: &str, active: bool) -> Result<()> {
        self.model.set_loss_active(name, active)
    }

    pub fn set_restriction_active(&mut self, name: &str, active: bool) -> Result<()> {
        self.model.set_restriction_active(name, active)
    }

    pub fn set_group_active(&mut self, group: LossGroup, active: bool) -> usize {
        self.model.set_group_active(group, active)
    }

    /// A fresh evaluation cache for one optimization run.
    pub fn new_run(&self) -> RunState {
        RunState::with_tolerance(self.config.cache_tolerance)
    }

    /// Fixed-point solve at `x` without touching any run cache.
    pub fn evaluate_loss(&self, x: &CandidateVector) -> Result<FixedPointOutcome> {
        solve_efficiency(
            &self.design,
            &self.model,
            self.evaluator.as_ref(),
            x,
            &self.config.fixed_point,
        )
    }

    /// Fixed-point solve at `x`, served from `run` when the objective already
    /// solved this candidate.
    pub fn compensated_outcome(&self, x: &CandidateVector, run: &RunState) -> Result<FixedPointOutcome> {
        if let Some(outcome) = run.compensated(x) {
            return Ok(outcome);
        }
        let outcome = self.evaluate_loss(x)?;
        run.record_simulations(outcome.iterations as usize);
        run.store_compensated(x, &outcome);
        Ok(outcome)
    }

    /// Objective: total loss once efficiency and loss agree.
    pub fn compensated_total_loss(&self, x: &CandidateVector, run: &RunState) -> Result<f64> {
        Ok(self.compensated_outcome(x, run)?.loss)
    }

    /// Residuals of the active restrictions at `x`. Reuses the simulation the
    /// objective produced for the same candidate; otherwise simulates once at
    /// the configured constraint efficiency.
    pub fn restriction_residuals(&self, x: &CandidateVector, run: &RunState) -> Result<Vec<Residual>> {
        let (quantities, efficiency) = match run.simulation(x) {
            Some(hit) => hit,
            None => {
                let efficiency = self.config.constraint_efficiency;
                let quantities = Arc::new(
                    self.evaluator
                        .simulate(&self.design, &x.at_efficiency(efficiency))?,
                );
                run.record_simulations(1);
                run.store_simulation(x, Arc::clone(&quantities), efficiency);
                (quantities, efficiency)
            }
        };
        Ok(self
            .model
            .evaluate_restrictions(&self.design, &x.at_efficiency(efficiency), &quantities))
    }

    /// Loss with every restriction folded in at scale `r`. Infinite when an
    /// inequality restriction is not strictly satisfied.
    pub fn slackness(&self, x: &CandidateVector, r: f64, run: &RunState) -> Result<f64> {
        let loss = self.compensated_total_loss(x, run)?;
        let residuals = self.restriction_residuals(x, run)?;
        Ok(penalty::slackness(loss, &residuals, r))
    }

    /// Compensated loss at each frequency for fixed inductances. Candidates are
    /// solved in parallel and independently of any run cache.
    pub fn compensated_loss_sweep(
        &self,
        frequencies: &[f64],
        primary_inductance: f64,
        leakage_inductance: f64,
    ) -> Result<Vec<f64>> {
        frequencies
            .par_iter()
            .map(|&f| {
                let x = CandidateVector::new(f, primary_inductance, leakage_inductance);
                self.evaluate_loss(&x).map(|outcome| outcome.loss)
            })
            .collect()
    }

    /// Minimize the compensated total loss over (frequency, Li, Lk).
    ///
    /// Solver failure is not an error: the best point found is returned and
    /// [`solution_is_feasible`](Self::solution_is_feasible) reports `false`.
    pub fn optimize(&mut self, iteration_budget: u32, algorithm: &str) -> Result<CandidateVector> {
        let algorithm: Algorithm = algorithm.parse()?;
        self.feasible = false;

        let run = self.new_run();
        let (result, solver_name) = {
            let problem = ConverterProblem::new(self, &run);
            let (mut solver, reason) =
                select_solver(algorithm, &problem, &self.config, iteration_budget)?;
            info!(
                "optimizing {} losses / {} restrictions with {}: {}",
                self.model.losses().iter().filter(|l| l.active).count(),
                self.model.restrictions().iter().filter(|r| r.active).count(),
                solver.name(),
                reason
            );

            let mut callback = ProgressCallback::new(iteration_budget, self.config.scaling);
            let result = solver.solve(&problem, &mut callback)?;
            callback.log_summary(result.success, &result.message);
            (result, solver.name().to_string())
        };

        if !result.success {
            warn!(
                "{} did not reach a feasible optimum: {}",
                solver_name, result.message
            );
        }

        let point = self
            .config
            .bounds
            .clamp(&self.config.scaling.unscale(&result.params));
        let outcome = self.compensated_outcome(&point, &run)?;
        debug!(
            "run used {} simulations, {} cache hits, {} uncompensated evaluations",
            run.simulations(),
            run.cache_hits(),
            run.uncompensated_evaluations()
        );

        self.feasible = result.success;
        self.last_report = Some(OptimizationReport {
            solver: solver_name,
            success: result.success,
            point,
            loss: outcome.loss,
            efficiency: outcome.efficiency,
            fully_compensated: outcome.is_converged(),
            iterations: result.iterations,
            cost_evals: result.cost_evals,
            simulations: run.simulations(),
            cache_hits: run.cache_hits(),
            message: result.message,
        });
        info!(
            "optimum f = {:.1} Hz, Li = {:.4e} H, Lk = {:.4e} H, loss = {:.4} W, eff = {:.4}",
            point.frequency,
            point.primary_inductance,
            point.leakage_inductance,
            outcome.loss,
            outcome.efficiency
        );
        Ok(point)
    }

    /// Whether the last `optimize` call converged to a feasible point.
    pub fn solution_is_feasible(&self) -> bool {
        self.feasible
    }

    pub fn last_report(&self) -> Option<&OptimizationReport> {
        self.last_report.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RestrictionKind;
    use crate::core::components::fixtures;
    use crate::simulation::testing::CountingEvaluator;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Shares its counter with the test after the evaluator is boxed.
    struct SharedCounter(Arc<CountingEvaluator>);

    impl CircuitEvaluator for SharedCounter {
        fn simulate(
            &self,
            design: &Design,
            point: &crate::core::OperatingPoint,
        ) -> Result<crate::core::SimulatedQuantities> {
            self.0.simulate(design, point)
        }
    }

    fn model() -> ConverterModel {
        ConverterModel::new()
            .with_loss("fixed", LossGroup::Switch, |_, _, _| 15.0)
            .with_loss("copper", LossGroup::EntranceInductor, |_, _, q| {
                0.02 * q.value("input_current").powi(2)
            })
            .with_restriction("ripple", RestrictionKind::Inequality, |_, p, _| {
                p.frequency / 1e4 - 1.0
            })
    }

    fn converter() -> (BoostHalfBridgeInverter, Arc<CountingEvaluator>) {
        let counter = Arc::new(CountingEvaluator::default());
        let conv = BoostHalfBridgeInverter::new(
            fixtures::design(1000.0),
            model(),
            SharedCounter(Arc::clone(&counter)),
        )
        .unwrap();
        (conv, counter)
    }

    fn x() -> CandidateVector {
        CandidateVector::new(40e3, 2.5e-4, 1e-6)
    }

    #[test]
    fn restrictions_reuse_the_objective_simulation() {
        let (conv, counter) = converter();
        let run = conv.new_run();

        conv.compensated_total_loss(&x(), &run).unwrap();
        let after_objective = counter.calls();
        assert_eq!(run.simulations(), after_objective);

        let residuals = conv.restriction_residuals(&x(), &run).unwrap();
        assert_eq!(counter.calls(), after_objective);
        assert_eq!(residuals.len(), 1);
        assert_relative_eq!(residuals[0].value, 3.0);
    }

    #[test]
    fn restrictions_first_simulate_at_default_efficiency() {
        let (conv, counter) = converter();
        let run = conv.new_run();

        conv.restriction_residuals(&x(), &run).unwrap();
        assert_eq!(counter.calls(), 1);
        assert_eq!(counter.efficiencies(), vec![0.8]);

        // The constraint-path entry never stands in for a compensated loss.
        let calls = counter.calls();
        conv.compensated_total_loss(&x(), &run).unwrap();
        assert!(counter.calls() > calls);
    }

    #[test]
    fn objective_at_new_point_forces_new_simulation() {
        let (conv, counter) = converter();
        let run = conv.new_run();
        conv.compensated_total_loss(&x(), &run).unwrap();
        let calls = counter.calls();

        let moved = CandidateVector::new(41e3, 2.5e-4, 1e-6);
        conv.compensated_total_loss(&moved, &run).unwrap();
        assert!(counter.calls() > calls);

        // Repeating the objective at the same point is served from the cache.
        let calls = counter.calls();
        conv.compensated_total_loss(&moved, &run).unwrap();
        assert_eq!(counter.calls(), calls);
    }

    #[test]
    fn slackness_adds_log_barrier() {
        let (conv, _) = converter();
        let run = conv.new_run();
        let loss = conv.compensated_total_loss(&x(), &run).unwrap();
        let s = conv.slackness(&x(), 0.5, &run).unwrap();
        assert_relative_eq!(s, loss - 0.5 * 3.0_f64.ln(), max_relative = 1e-12);

        let infeasible = CandidateVector::new(5e3, 2.5e-4, 1e-6);
        assert_eq!(conv.slackness(&infeasible, 0.5, &run).unwrap(), f64::INFINITY);
    }

    #[test]
    fn inactive_losses_are_not_evaluated() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&evaluated);
        let model = ConverterModel::new()
            .with_loss("flat", LossGroup::Capacitor, |_, _, _| 10.0)
            .with_loss("probe", LossGroup::Diode, move |_, _, _| {
                seen.fetch_add(1, Ordering::SeqCst);
                1e6
            });
        let mut conv =
            BoostHalfBridgeInverter::new(fixtures::design(1000.0), model, CountingEvaluator::default())
                .unwrap();
        conv.set_loss_active("probe", false).unwrap();

        let outcome = conv.evaluate_loss(&x()).unwrap();
        assert_eq!(outcome.loss, 10.0);
        assert_eq!(evaluated.load(Ordering::SeqCst), 0);
        assert!(matches!(
            conv.set_loss_active("missing", true),
            Err(ConverterError::UnknownLoss(_))
        ));
    }

    #[test]
    fn sweep_matches_individual_solves() {
        let (conv, _) = converter();
        let frequencies = [20e3, 40e3, 80e3];
        let sweep = conv.compensated_loss_sweep(&frequencies, 2.5e-4, 1e-6).unwrap();
        assert_eq!(sweep.len(), 3);
        for (&f, &loss) in frequencies.iter().zip(&sweep) {
            let single = conv
                .evaluate_loss(&CandidateVector::new(f, 2.5e-4, 1e-6))
                .unwrap();
            assert_eq!(loss, single.loss);
        }
    }

    #[test]
    fn rejects_non_positive_output_power() {
        let result =
            BoostHalfBridgeInverter::new(fixtures::design(0.0), model(), CountingEvaluator::default());
        assert!(matches!(result, Err(ConverterError::InvalidConfig(_))));
    }

    #[test]
    fn unknown_algorithm_is_an_error() {
        let (mut conv, counter) = converter();
        assert!(matches!(
            conv.optimize(10, "gradient-descent"),
            Err(ConverterError::UnknownAlgorithm(_))
        ));
        assert_eq!(counter.calls(), 0);
        assert!(!conv.solution_is_feasible());
    }
}
