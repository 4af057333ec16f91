//! Slackness transform: folds restrictions into the loss so that an
//! unconstrained minimizer can be driven by a decreasing scale `r`.
//!
//! ```text
//! S(x, r) = loss(x) + Σ_eq h(x)² / r − r · Σ_ineq ln g(x)
//! ```

use crate::core::{Residual, RestrictionKind};

/// Log-barrier contribution of one inequality residual. Grows without bound as
/// the residual approaches zero and is infinite once it is no longer positive.
pub fn barrier_term(residual: f64, scale: f64) -> f64 {
    if residual > 0.0 {
        -scale * residual.ln()
    } else {
        f64::INFINITY
    }
}

/// Quadratic penalty contribution of one equality residual.
pub fn penalty_term(residual: f64, scale: f64) -> f64 {
    residual * residual / scale
}

/// Infinite whenever an inequality residual is non-positive; callers treat that
/// as "move away", never as an error.
pub fn slackness(loss: f64, residuals: &[Residual], scale: f64) -> f64 {
    residuals.iter().fold(loss, |acc, r| {
        acc + match r.kind {
            RestrictionKind::Equality => penalty_term(r.value, scale),
            RestrictionKind::Inequality => barrier_term(r.value, scale),
        }
    })
}
