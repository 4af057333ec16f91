pub mod callback;
pub mod problem;
pub mod solvers;

pub use callback::{IterationResult, ProgressCallback};
pub use problem::ConverterProblem;
pub use solvers::{Algorithm, BarrierOptimizer, ParticleOptimizer, select_solver};
pub use solvers::{OptimizationCallback, Problem, Solver, SolverResult};
