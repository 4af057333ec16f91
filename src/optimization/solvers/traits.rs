use crate::converter::penalty::barrier_term;
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct SolverResult {
    /// Converged and feasible.
    pub success: bool,
    pub feasible: bool,
    pub cost: f64,
    pub iterations: u32,
    pub message: String,
    pub params: Vec<f64>,
    pub cost_evals: usize,
}

/// Callback interface for optimization progress
pub trait OptimizationCallback {
    /// Called at each iteration with current parameters and cost
    fn on_iteration(&mut self, iteration: u32, params: &[f64], cost: f64) -> Result<()>;

    /// Check if optimization should stop early
    fn should_stop(&self) -> bool {
        false
    }
}

/// A bounded, inequality-constrained minimization problem in solver space.
pub trait Problem {
    /// Objective at `params`.
    fn cost(&self, params: &[f64]) -> Result<f64>;

    /// Inequality residuals, feasible when every entry is `>= 0`.
    fn constraints(&self, params: &[f64]) -> Result<Vec<f64>>;

    /// Objective with the constraints folded in by a log barrier of scale `scale`.
    fn penalized(&self, params: &[f64], scale: f64) -> Result<f64> {
        let cost = self.cost(params)?;
        Ok(self
            .constraints(params)?
            .into_iter()
            .fold(cost, |acc, g| acc + barrier_term(g, scale)))
    }

    fn is_feasible(&self, params: &[f64]) -> Result<bool> {
        Ok(self.constraints(params)?.iter().all(|&g| g >= 0.0))
    }

    /// Sum of squared restriction violations, zero when feasible.
    fn violation(&self, params: &[f64]) -> Result<f64> {
        Ok(self
            .constraints(params)?
            .iter()
            .map(|&g| g.min(0.0).powi(2))
            .sum())
    }

    /// Number of parameters
    fn num_params(&self) -> usize;

    /// Initial parameter values
    fn initial_params(&self) -> &[f64];

    /// Parameter bounds (min, max) for each parameter
    fn bounds(&self) -> &[(f64, f64)];
}

/// Solver interface - takes problem and callback
pub trait Solver {
    fn name(&self) -> &str;

    fn solve(
        &mut self,
        problem: &dyn Problem,
        callback: &mut dyn OptimizationCallback,
    ) -> Result<SolverResult>;
}

pub(crate) fn clamp_params(params: &mut [f64], bounds: &[(f64, f64)]) {
    for (p, &(min, max)) in params.iter_mut().zip(bounds) {
        *p = p.clamp(min, max);
    }
}

/// Exterior penalty: cost plus `weight` times the squared violation.
pub(crate) fn exterior_penalty(problem: &dyn Problem, params: &[f64], weight: f64) -> Result<f64> {
    let cost = problem.cost(params)?;
    Ok(cost + weight * problem.violation(params)?)
}


#[cfg(test)]
mod tests {
    use super::testing::Bowl;
    use super::*;

    #[test]
    fn default_penalized_adds_barrier() {
        let bowl = Bowl::new(vec![0.0], vec![2.0], vec![(-5.0, 5.0)]).with_floor(0, 1.0);
        // cost 4, residual 1 -> ln(1) = 0
        assert_eq!(bowl.penalized(&[2.0], 0.5).unwrap(), 4.0);
        assert_eq!(bowl.penalized(&[0.5], 0.5).unwrap(), f64::INFINITY);
    }

    #[test]
    fn default_feasibility_checks_sign() {
        let bowl = Bowl::new(vec![0.0], vec![2.0], vec![(-5.0, 5.0)]).with_floor(0, 1.0);
        assert!(bowl.is_feasible(&[1.0]).unwrap());
        assert!(!bowl.is_feasible(&[0.99]).unwrap());
    }

    #[test]
    fn exterior_penalty_only_charges_violations() {
        let bowl = Bowl::new(vec![0.0], vec![2.0], vec![(-5.0, 5.0)]).with_floor(0, 1.0);
        assert_eq!(exterior_penalty(&bowl, &[2.0], 100.0).unwrap(), 4.0);
        assert_eq!(exterior_penalty(&bowl, &[0.0], 100.0).unwrap(), 100.0);
    }

    #[test]
    fn clamp_respects_bounds() {
        let mut params = vec![-3.0, 0.5, 9.0];
        clamp_params(&mut params, &[(0.0, 1.0), (0.0, 1.0), (0.0, 1.0)]);
        assert_eq!(params, vec![0.0, 0.5, 1.0]);
    }
}
