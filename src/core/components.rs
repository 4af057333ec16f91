//! Plain data records for the selectable parts of a boost half-bridge inverter.
//!
//! These carry catalog values only; the loss and restriction models decide what
//! to do with them.

use super::types::CircuitFeatures;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub name: String,
    /// Bare conductor diameter (m).
    pub conductor_diameter: f64,
    /// Diameter including insulation (m).
    pub insulated_diameter: f64,
    /// Resistivity at operating temperature (Ω·m).
    pub resistivity: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Core {
    pub name: String,
    /// Effective magnetic cross-section (m²).
    pub effective_area: f64,
    /// Effective magnetic path length (m).
    pub path_length: f64,
    pub volume: f64,
    pub window_area: f64,
    /// Flux density at saturation (T).
    pub saturation_flux_density: f64,
    /// Steinmetz coefficients `k`, `alpha`, `beta`.
    pub steinmetz: (f64, f64, f64),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Winding {
    pub turns: u32,
    pub parallel_wires: u32,
    pub cable: Cable,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transformer {
    pub primary: Winding,
    pub secondary: Winding,
    pub core: Core,
}

/// Entrance (Li) and auxiliary (Lk) inductors share this shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inductor {
    pub winding: Winding,
    pub core: Core,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub name: String,
    pub on_resistance: f64,
    pub rise_time: f64,
    pub fall_time: f64,
    pub output_capacitance: f64,
    pub body_diode_forward_voltage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diode {
    pub name: String,
    pub forward_voltage: f64,
    pub on_resistance: f64,
    pub reverse_recovery_charge: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Capacitor {
    pub name: String,
    pub capacitance: f64,
    pub equivalent_series_resistance: f64,
    pub rated_voltage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dissipator {
    pub name: String,
    /// Sink-to-ambient thermal resistance (K/W).
    pub thermal_resistance: f64,
}

/// The full component graph of one converter instance plus its requirements.
/// Every loss, restriction and circuit evaluation reads from this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Design {
    pub features: CircuitFeatures,
    pub transformer: Transformer,
    pub entrance_inductor: Inductor,
    pub auxiliary_inductor: Inductor,
    /// S1, S2.
    pub switches: [Switch; 2],
    /// D3, D4.
    pub diodes: [Diode; 2],
    /// C1 through C4.
    pub capacitors: [Capacitor; 4],
    #[serde(default)]
    pub dissipators: Option<Vec<Dissipator>>,
}

impl Design {
    pub fn output_power(&self) -> f64 {
        self.features.output_power
    }

    pub fn from_json_str(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
