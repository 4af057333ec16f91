//! Error types for the converter optimizer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConverterError {
    #[error("{0} is not a defined parameter")]
    UnknownParameter(String),

    #[error("parameter '{name}' expects a {expected} value, got {found}")]
    ParameterType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unknown optimization algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("no loss named '{0}' in the converter model")]
    UnknownLoss(String),

    #[error("no restriction named '{0}' in the converter model")]
    UnknownRestriction(String),

    #[error("circuit simulation failed: {0}")]
    Simulation(String),

    #[error("solver error: {0}")]
    Solver(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConverterError>;
