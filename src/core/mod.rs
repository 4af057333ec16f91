pub mod components;
pub mod parameters;
pub mod types;

pub use components::*;
pub use parameters::{ParameterValue, get_parameter, parameter_names, set_parameter};
pub use types::*;
