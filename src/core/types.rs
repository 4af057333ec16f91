use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===== SEARCH VARIABLES =====

/// The triple under search: switching frequency (Hz), entrance inductance Li (H)
/// and auxiliary/leakage inductance Lk (H), always in physical units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateVector {
    pub frequency: f64,
    pub primary_inductance: f64,
    pub leakage_inductance: f64,
}

impl CandidateVector {
    pub fn new(frequency: f64, primary_inductance: f64, leakage_inductance: f64) -> Self {
        Self {
            frequency,
            primary_inductance,
            leakage_inductance,
        }
    }

    pub fn to_array(&self) -> [f64; 3] {
        [
            self.frequency,
            self.primary_inductance,
            self.leakage_inductance,
        ]
    }

    /// Pair this candidate with an assumed converter efficiency.
    pub fn at_efficiency(&self, efficiency: f64) -> OperatingPoint {
        OperatingPoint {
            frequency: self.frequency,
            primary_inductance: self.primary_inductance,
            leakage_inductance: self.leakage_inductance,
            efficiency,
        }
    }
}

impl From<[f64; 3]> for CandidateVector {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

/// A candidate plus the efficiency the circuit is evaluated at. This is the
/// `[frequency, Li, Lk, efficiency]` vector every loss and restriction receives.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub frequency: f64,
    pub primary_inductance: f64,
    pub leakage_inductance: f64,
    pub efficiency: f64,
}

impl OperatingPoint {
    pub fn candidate(&self) -> CandidateVector {
        CandidateVector::new(
            self.frequency,
            self.primary_inductance,
            self.leakage_inductance,
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [
            self.frequency,
            self.primary_inductance,
            self.leakage_inductance,
            self.efficiency,
        ]
    }
}

/// Constant factors applied to each variable before it reaches the solver so that
/// all three coordinates have comparable step sizes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableScaling {
    pub frequency: f64,
    pub primary_inductance: f64,
    pub leakage_inductance: f64,
}

impl Default for VariableScaling {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            primary_inductance: 1e8,
            leakage_inductance: 1e10,
        }
    }
}

impl VariableScaling {
    pub fn factors(&self) -> [f64; 3] {
        [
            self.frequency,
            self.primary_inductance,
            self.leakage_inductance,
        ]
    }

    pub fn scale(&self, x: &CandidateVector) -> Vec<f64> {
        x.to_array()
            .iter()
            .zip(self.factors())
            .map(|(v, k)| v * k)
            .collect()
    }

    /// Inverse of [`scale`](Self::scale). Expects exactly three coordinates.
    pub fn unscale(&self, scaled: &[f64]) -> CandidateVector {
        let [kf, ki, kk] = self.factors();
        CandidateVector::new(scaled[0] / kf, scaled[1] / ki, scaled[2] / kk)
    }
}

/// Box bounds per variable, in physical units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableBounds {
    pub frequency: (f64, f64),
    pub primary_inductance: (f64, f64),
    pub leakage_inductance: (f64, f64),
}

impl Default for VariableBounds {
    fn default() -> Self {
        Self {
            frequency: (10e3, 100e3),
            primary_inductance: (1e-4, 1e-2),
            leakage_inductance: (1e-7, 1e-5),
        }
    }
}

impl VariableBounds {
    pub fn to_array(&self) -> [(f64, f64); 3] {
        [
            self.frequency,
            self.primary_inductance,
            self.leakage_inductance,
        ]
    }

    pub fn contains(&self, x: &CandidateVector) -> bool {
        self.to_array()
            .iter()
            .zip(x.to_array())
            .all(|(&(min, max), v)| v >= min && v <= max)
    }

    pub fn clamp(&self, x: &CandidateVector) -> CandidateVector {
        let b = self.to_array();
        let v = x.to_array();
        CandidateVector::new(
            v[0].clamp(b[0].0, b[0].1),
            v[1].clamp(b[1].0, b[1].1),
            v[2].clamp(b[2].0, b[2].1),
        )
    }

    /// Bounds in solver space.
    pub fn scaled(&self, scaling: &VariableScaling) -> Vec<(f64, f64)> {
        self.to_array()
            .iter()
            .zip(scaling.factors())
            .map(|(&(min, max), k)| (min * k, max * k))
            .collect()
    }
}

// ===== DESIGN REQUIREMENTS =====

/// Fixed circuit requirements of one converter design. `output_power` drives the
/// efficiency power balance; everything else is kept by name for the circuit
/// evaluator and loss models.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CircuitFeatures {
    pub output_power: f64,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl CircuitFeatures {
    pub fn new(output_power: f64) -> Self {
        Self {
            output_power,
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

// ===== SIMULATION OUTPUT =====

/// Named electrical quantities derived by one circuit simulation. Read-only once
/// produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulatedQuantities {
    values: BTreeMap<String, f64>,
}

impl SimulatedQuantities {
    pub const EFFICIENCY: &'static str = "efficiency";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Missing quantities read as zero.
    pub fn value(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    pub fn efficiency(&self) -> Option<f64> {
        self.get(Self::EFFICIENCY)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for SimulatedQuantities {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

// ===== RESTRICTIONS =====

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestrictionKind {
    Equality,
    Inequality,
}

/// One evaluated restriction. Inequalities are feasible when `value >= 0`,
/// equalities when `value == 0`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Residual {
    pub name: String,
    pub kind: RestrictionKind,
    pub value: f64,
}

impl Residual {
    pub fn is_satisfied(&self, tolerance: f64) -> bool {
        match self.kind {
            RestrictionKind::Inequality => self.value >= -tolerance,
            RestrictionKind::Equality => self.value.abs() <= tolerance,
        }
    }
}

// ===== RESULTS =====

/// Outcome of the most recent `optimize` call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub solver: String,
    pub success: bool,
    pub point: CandidateVector,
    pub loss: f64,
    pub efficiency: f64,
    /// False when the efficiency fixed point at `point` hit its iteration cap.
    pub fully_compensated: bool,
    pub iterations: u32,
    pub cost_evals: usize,
    pub simulations: usize,
    pub cache_hits: usize,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scaling_round_trips_default_start() {
        let scaling = VariableScaling::default();
        let x = CandidateVector::new(40e3, 0.0002562, 1e-6);
        let scaled = scaling.scale(&x);
        assert_relative_eq!(scaled[1], 25620.0, max_relative = 1e-12);
        assert_relative_eq!(scaled[2], 1e4, max_relative = 1e-12);

        let back = scaling.unscale(&scaled);
        assert_relative_eq!(back.primary_inductance, x.primary_inductance, max_relative = 1e-12);
        assert_relative_eq!(back.leakage_inductance, x.leakage_inductance, max_relative = 1e-12);
    }

    #[test]
    fn default_bounds_scale_to_solver_space() {
        let scaled = VariableBounds::default().scaled(&VariableScaling::default());
        assert_relative_eq!(scaled[1].0, 1e4, max_relative = 1e-12);
        assert_relative_eq!(scaled[1].1, 1e6, max_relative = 1e-12);
        assert_relative_eq!(scaled[2].0, 1e3, max_relative = 1e-12);
        assert_relative_eq!(scaled[2].1, 1e5, max_relative = 1e-12);
    }

    #[test]
    fn clamp_pulls_candidate_into_bounds() {
        let bounds = VariableBounds::default();
        let x = bounds.clamp(&CandidateVector::new(1e6, 1e-9, 5e-6));
        assert!(bounds.contains(&x));
        assert_eq!(x.frequency, 100e3);
        assert_eq!(x.primary_inductance, 1e-4);
        assert_eq!(x.leakage_inductance, 5e-6);
    }

    #[test]
    fn residual_satisfaction_depends_on_kind() {
        let ineq = Residual {
            name: "ripple".into(),
            kind: RestrictionKind::Inequality,
            value: -1e-3,
        };
        let eq = Residual {
            name: "balance".into(),
            kind: RestrictionKind::Equality,
            value: -1e-3,
        };
        assert!(!ineq.is_satisfied(1e-9));
        assert!(!eq.is_satisfied(1e-9));
        assert!(eq.is_satisfied(1e-2));
        assert!(Residual { value: 0.5, ..ineq }.is_satisfied(0.0));
    }
}
