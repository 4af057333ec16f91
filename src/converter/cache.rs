//! Per-run evaluation cache.
//!
//! The solver asks for the objective and the constraints of the same candidate in
//! separate calls. Both need a circuit simulation, and the objective's fixed point
//! already produces one at the converged efficiency. The cache keeps the most
//! recent evaluation keyed by its candidate so the constraint path reuses it
//! instead of simulating again. A candidate that was never seen by the objective
//! misses, and the caller simulates on its own.
//!
//! A `RunState` belongs to exactly one optimization run. It uses `Cell` and
//! `RefCell` and is therefore `!Sync`; concurrent runs need their own instance.

use super::efficiency::FixedPointOutcome;
use crate::core::{CandidateVector, SimulatedQuantities};
use std::cell::{Cell, RefCell};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct CacheEntry {
    key: CandidateVector,
    quantities: Arc<SimulatedQuantities>,
    efficiency: f64,
    /// Present when the entry came from a full fixed-point solve.
    outcome: Option<FixedPointOutcome>,
}

#[derive(Debug, Default)]
pub struct RunState {
    tolerance: f64,
    entry: RefCell<Option<CacheEntry>>,
    simulations: Cell<usize>,
    cache_hits: Cell<usize>,
    uncompensated: Cell<usize>,
}

impl RunState {
    /// Candidates must match bit for bit to share an entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Candidates within `tolerance` relative distance per coordinate share an entry.
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Self::default()
        }
    }

    fn matches(&self, cached: &CandidateVector, x: &CandidateVector) -> bool {
        let (a, b) = (cached.to_array(), x.to_array());
        if self.tolerance == 0.0 {
            return a.iter().zip(b).all(|(p, q)| p.to_bits() == q.to_bits());
        }
        a.iter()
            .zip(b)
            .all(|(p, q)| (p - q).abs() <= self.tolerance * p.abs().max(q.abs()))
    }

    fn lookup<T>(&self, x: &CandidateVector, read: impl FnOnce(&CacheEntry) -> Option<T>) -> Option<T> {
        let entry = self.entry.borrow();
        let found = entry
            .as_ref()
            .filter(|e| self.matches(&e.key, x))
            .and_then(read);
        if found.is_some() {
            self.cache_hits.set(self.cache_hits.get() + 1);
        }
        found
    }

    /// Fixed-point result for `x`, if the objective already solved it.
    pub fn compensated(&self, x: &CandidateVector) -> Option<FixedPointOutcome> {
        self.lookup(x, |e| e.outcome.clone())
    }

    /// Most recent simulation of `x` and the efficiency it belongs to, whichever
    /// path produced it.
    pub fn simulation(&self, x: &CandidateVector) -> Option<(Arc<SimulatedQuantities>, f64)> {
        self.lookup(x, |e| Some((Arc::clone(&e.quantities), e.efficiency)))
    }

    pub fn store_compensated(&self, x: &CandidateVector, outcome: &FixedPointOutcome) {
        if !outcome.is_converged() {
            self.uncompensated.set(self.uncompensated.get() + 1);
        }
        *self.entry.borrow_mut() = Some(CacheEntry {
            key: *x,
            quantities: Arc::clone(&outcome.quantities),
            efficiency: outcome.efficiency,
            outcome: Some(outcome.clone()),
        });
    }

    /// Record a constraint-path simulation. It never satisfies an objective lookup.
    pub fn store_simulation(&self, x: &CandidateVector, quantities: Arc<SimulatedQuantities>, efficiency: f64) {
        *self.entry.borrow_mut() = Some(CacheEntry {
            key: *x,
            quantities,
            efficiency,
            outcome: None,
        });
    }

    pub fn record_simulations(&self, count: usize) {
        self.simulations.set(self.simulations.get() + count);
    }

    /// Circuit simulations performed on behalf of this run.
    pub fn simulations(&self) -> usize {
        self.simulations.get()
    }

    pub fn cache_hits(&self) -> usize {
        self.cache_hits.get()
    }

    /// Fixed-point solves that stopped at their iteration cap.
    pub fn uncompensated_evaluations(&self) -> usize {
        self.uncompensated.get()
    }

    pub fn reset(&self) {
        self.entry.borrow_mut().take();
        self.simulations.set(0);
        self.cache_hits.set(0);
        self.uncompensated.set(0);
    }
}
