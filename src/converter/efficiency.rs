//! Efficiency/loss fixed point.
//!
//! Component losses depend on the input current, which depends on efficiency,
//! which depends on the losses. Starting from an assumed efficiency, simulate,
//! sum the losses, rebalance `eff = Po / (Po + loss)` and repeat until two
//! successive loss estimates agree within the absolute tolerance.

use super::model::ConverterModel;
use crate::config::FixedPointSettings;
use crate::core::{CandidateVector, Design, SimulatedQuantities};
use crate::error::{ConverterError, Result};
use crate::simulation::CircuitEvaluator;
use log::{debug, trace, warn};
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixedPointStatus {
    Converged,
    /// The iteration cap was hit; the outcome holds the last estimate.
    IterationLimit,
}

#[derive(Clone, Debug)]
pub struct FixedPointOutcome {
    /// Compensated total loss (W).
    pub loss: f64,
    /// Efficiency rebalanced from `loss`.
    pub efficiency: f64,
    pub iterations: u32,
    pub status: FixedPointStatus,
    /// Quantities from the last simulation of the loop.
    pub quantities: Arc<SimulatedQuantities>,
}

impl FixedPointOutcome {
    pub fn is_converged(&self) -> bool {
        self.status == FixedPointStatus::Converged
    }
}

/// `loss = Po * (1 - eff) / eff`
pub fn loss_from_efficiency(output_power: f64, efficiency: f64) -> f64 {
    output_power * (1.0 - efficiency) / efficiency
}

/// `eff = Po / (Po + loss)`
pub fn efficiency_from_loss(output_power: f64, loss: f64) -> f64 {
    output_power / (output_power + loss)
}

pub fn solve_efficiency(
    design: &Design,
    model: &ConverterModel,
    evaluator: &dyn CircuitEvaluator,
    x: &CandidateVector,
    settings: &FixedPointSettings,
) -> Result<FixedPointOutcome> {
    if settings.max_iterations == 0 {
        return Err(ConverterError::InvalidConfig(
            "fixed point needs at least one iteration".into(),
        ));
    }

    let po = design.output_power();
    let mut efficiency = settings.initial_efficiency;
    let mut loss = loss_from_efficiency(po, efficiency);
    let mut last_quantities = None;

    for iteration in 1..=settings.max_iterations {
        let point = x.at_efficiency(efficiency);
        let quantities = evaluator.simulate(design, &point)?;

        let loss_last = loss;
        loss = model.total_loss(design, &point, &quantities);
        efficiency = efficiency_from_loss(po, loss);
        last_quantities = Some(quantities);

        let error = (loss_last - loss).abs();
        trace!(
            "fixed point iter {}: loss = {:.6}, eff = {:.6}, error = {:.3e}",
            iteration, loss, efficiency, error
        );

        if error <= settings.tolerance {
            debug!(
                "fixed point settled after {} simulations: loss = {:.4} W, eff = {:.5}",
                iteration, loss, efficiency
            );
            return Ok(FixedPointOutcome {
                loss,
                efficiency,
                iterations: iteration,
                status: FixedPointStatus::Converged,
                quantities: Arc::new(last_quantities.unwrap_or_default()),
            });
        }
    }

    warn!(
        "efficiency fixed point did not settle within {} iterations at f = {:.1} Hz, Li = {:.3e} H, Lk = {:.3e} H",
        settings.max_iterations, x.frequency, x.primary_inductance, x.leakage_inductance
    );

    Ok(FixedPointOutcome {
        loss,
        efficiency,
        iterations: settings.max_iterations,
        status: FixedPointStatus::IterationLimit,
        quantities: Arc::new(last_quantities.unwrap_or_default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::model::LossGroup;
    use crate::core::components::fixtures;
    use crate::simulation::testing::CountingEvaluator;
    use approx::assert_relative_eq;

    fn x() -> CandidateVector {
        CandidateVector::new(40e3, 2.5e-4, 1e-6)
    }

    /// Conduction loss proportional to input current squared plus a fixed term.
    fn current_dependent_model() -> ConverterModel {
        ConverterModel::new()
            .with_loss("fixed", LossGroup::Switch, |_, _, _| 15.0)
            .with_loss("copper", LossGroup::EntranceInductor, |_, _, q| {
                0.02 * q.value("input_current").powi(2)
            })
    }

    #[test]
    fn converges_to_power_balance() {
        let design = fixtures::design(1000.0);
        let evaluator = CountingEvaluator::default();
        let settings = FixedPointSettings::default();
        let outcome = solve_efficiency(
            &design,
            &current_dependent_model(),
            &evaluator,
            &x(),
            &settings,
        )
        .unwrap();

        assert!(outcome.is_converged());
        assert!(outcome.loss > 15.0);
        assert_relative_eq!(
            outcome.efficiency,
            1000.0 / (1000.0 + outcome.loss),
            max_relative = 1e-12
        );
        assert_eq!(evaluator.calls() as u32, outcome.iterations);
        assert_eq!(evaluator.efficiencies()[0], 0.8);
    }

    #[test]
    fn successive_losses_agree_within_tolerance_at_exit() {
        let design = fixtures::design(1000.0);
        let evaluator = CountingEvaluator::default();
        let settings = FixedPointSettings::default();
        let outcome = solve_efficiency(
            &design,
            &current_dependent_model(),
            &evaluator,
            &x(),
            &settings,
        )
        .unwrap();

        // One more step from the rebalanced efficiency barely moves the loss.
        let point = x().at_efficiency(outcome.efficiency);
        let q = evaluator.simulate(&design, &point).unwrap();
        let replay = current_dependent_model().total_loss(&design, &point, &q);
        assert!((replay - outcome.loss).abs() <= settings.tolerance);
    }

    #[test]
    fn constant_loss_settles_after_two_simulations() {
        let design = fixtures::design(1000.0);
        let model = ConverterModel::new().with_loss("flat", LossGroup::Capacitor, |_, _, _| 50.0);
        let evaluator = CountingEvaluator::default();
        let outcome =
            solve_efficiency(&design, &model, &evaluator, &x(), &FixedPointSettings::default())
                .unwrap();
        assert_eq!(outcome.loss, 50.0);
        assert_eq!(outcome.iterations, 2);
        assert_relative_eq!(outcome.efficiency, 1000.0 / 1050.0);
    }

    #[test]
    fn loss_equal_to_initial_guess_settles_immediately() {
        // Po = 1000 at eff = 0.8 implies 250 W.
        let design = fixtures::design(1000.0);
        let model = ConverterModel::new().with_loss("flat", LossGroup::Diode, |_, _, _| 250.0);
        let evaluator = CountingEvaluator::default();
        let outcome =
            solve_efficiency(&design, &model, &evaluator, &x(), &FixedPointSettings::default())
                .unwrap();
        assert_eq!(outcome.iterations, 1);
        assert!(outcome.is_converged());
    }

    #[test]
    fn non_contracting_balance_stops_at_cap() {
        // Flips between two estimates forever: 500 W drops eff below 0.75,
        // 100 W lifts it back above.
        let design = fixtures::design(1000.0);
        let model = ConverterModel::new().with_loss("oscillating", LossGroup::Switch, |_, p, _| {
            if p.efficiency > 0.75 { 500.0 } else { 100.0 }
        });
        let evaluator = CountingEvaluator::default();
        let settings = FixedPointSettings {
            max_iterations: 25,
            ..FixedPointSettings::default()
        };
        let outcome = solve_efficiency(&design, &model, &evaluator, &x(), &settings).unwrap();
        assert_eq!(outcome.status, FixedPointStatus::IterationLimit);
        assert_eq!(outcome.iterations, 25);
        assert_eq!(evaluator.calls(), 25);
        assert!(outcome.loss.is_finite());
    }

    #[test]
    fn zero_iteration_cap_is_rejected() {
        let design = fixtures::design(1000.0);
        let settings = FixedPointSettings {
            max_iterations: 0,
            ..FixedPointSettings::default()
        };
        let result = solve_efficiency(
            &design,
            &ConverterModel::new(),
            &CountingEvaluator::default(),
            &x(),
            &settings,
        );
        assert!(matches!(result, Err(ConverterError::InvalidConfig(_))));
    }

    #[test]
    fn balance_helpers_are_inverse() {
        let loss = loss_from_efficiency(1000.0, 0.8);
        assert_relative_eq!(loss, 250.0, max_relative = 1e-12);
        assert_relative_eq!(efficiency_from_loss(1000.0, loss), 0.8, max_relative = 1e-12);
    }
}
