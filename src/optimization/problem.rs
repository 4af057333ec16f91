use crate::converter::BoostHalfBridgeInverter;
use crate::converter::cache::RunState;
use crate::core::{CandidateVector, Residual, RestrictionKind, VariableScaling};
use crate::error::Result;
use crate::optimization::solvers::traits::Problem;

/// The converter's loss minimization as seen by a solver: three scaled
/// coordinates, box bounds in the same space, and the inequality restrictions.
///
/// Every evaluation goes through one [`RunState`], so the restriction call that
/// follows an objective call at the same point reuses its simulation.
pub struct ConverterProblem<'a> {
    converter: &'a BoostHalfBridgeInverter,
    run: &'a RunState,
    scaling: VariableScaling,
    initial: Vec<f64>,
    bounds: Vec<(f64, f64)>,
    feasibility_tolerance: f64,
}

impl<'a> ConverterProblem<'a> {
    pub fn new(converter: &'a BoostHalfBridgeInverter, run: &'a RunState) -> Self {
        let config = converter.config();
        let scaling = config.scaling;
        Self {
            converter,
            run,
            scaling,
            initial: scaling.scale(&config.initial_point),
            bounds: config.bounds.scaled(&scaling),
            feasibility_tolerance: config.feasibility_tolerance,
        }
    }

    /// Physical candidate for a solver-space point.
    pub fn candidate(&self, params: &[f64]) -> CandidateVector {
        self.scaling.unscale(params)
    }

    fn residuals(&self, params: &[f64]) -> Result<Vec<Residual>> {
        self.converter
            .restriction_residuals(&self.candidate(params), self.run)
    }
}

impl Problem for ConverterProblem<'_> {
    fn cost(&self, params: &[f64]) -> Result<f64> {
        self.converter
            .compensated_total_loss(&self.candidate(params), self.run)
    }

    fn constraints(&self, params: &[f64]) -> Result<Vec<f64>> {
        Ok(self
            .residuals(params)?
            .into_iter()
            .filter(|r| r.kind == RestrictionKind::Inequality)
            .map(|r| r.value)
            .collect())
    }

    fn penalized(&self, params: &[f64], scale: f64) -> Result<f64> {
        self.converter
            .slackness(&self.candidate(params), scale, self.run)
    }

    fn is_feasible(&self, params: &[f64]) -> Result<bool> {
        Ok(self
            .residuals(params)?
            .iter()
            .all(|r| r.is_satisfied(self.feasibility_tolerance)))
    }

    fn violation(&self, params: &[f64]) -> Result<f64> {
        Ok(self
            .residuals(params)?
            .iter()
            .map(|r| match r.kind {
                RestrictionKind::Inequality => r.value.min(0.0).powi(2),
                RestrictionKind::Equality => r.value.powi(2),
            })
            .sum())
    }

    fn num_params(&self) -> usize {
        self.initial.len()
    }

    fn initial_params(&self) -> &[f64] {
        &self.initial
    }

    fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::model::{ConverterModel, LossGroup};
    use crate::core::components::fixtures;
    use crate::simulation::testing::CountingEvaluator;
    use approx::assert_relative_eq;

    fn converter(model: ConverterModel) -> BoostHalfBridgeInverter {
        BoostHalfBridgeInverter::new(fixtures::design(1000.0), model, CountingEvaluator::default())
            .unwrap()
    }

    #[test]
    fn works_in_scaled_space() {
        let conv = converter(ConverterModel::new());
        let run = RunState::new();
        let problem = ConverterProblem::new(&conv, &run);

        assert_eq!(problem.num_params(), 3);
        assert_relative_eq!(problem.initial_params()[0], 40e3);
        assert_relative_eq!(problem.initial_params()[1], 25620.0, max_relative = 1e-12);
        assert_relative_eq!(problem.initial_params()[2], 1e4, max_relative = 1e-12);
        assert_relative_eq!(problem.bounds()[1].0, 1e4, max_relative = 1e-12);
        assert_relative_eq!(problem.bounds()[2].1, 1e5, max_relative = 1e-12);

        let x = problem.candidate(&[50e3, 5e4, 2e3]);
        assert_relative_eq!(x.primary_inductance, 5e-4, max_relative = 1e-12);
        assert_relative_eq!(x.leakage_inductance, 2e-7, max_relative = 1e-12);
    }

    #[test]
    fn only_inequalities_reach_the_solver() {
        let model = ConverterModel::new()
            .with_loss("flat", LossGroup::Switch, |_, _, _| 20.0)
            .with_restriction("ripple", RestrictionKind::Inequality, |_, _, _| 0.5)
            .with_restriction("balance", RestrictionKind::Equality, |_, _, _| 0.25);
        let conv = converter(model);
        let run = RunState::new();
        let problem = ConverterProblem::new(&conv, &run);
        let params = problem.initial_params().to_vec();

        assert_eq!(problem.constraints(&params).unwrap(), vec![0.5]);
        assert!(!problem.is_feasible(&params).unwrap());
        assert_relative_eq!(problem.violation(&params).unwrap(), 0.0625);
    }
}
