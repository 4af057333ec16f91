//! The circuit evaluation seam.
//!
//! The physics of the inverter lives outside this crate. Anything that can turn a
//! design and an operating point into [`SimulatedQuantities`] can drive the
//! optimizer, including plain closures.

use crate::core::{Design, OperatingPoint, SimulatedQuantities};
use crate::error::Result;

pub trait CircuitEvaluator: Send + Sync {
    /// Simulate the converter at `point`. The result should carry an
    /// `"efficiency"` entry echoing or refining `point.efficiency`.
    fn simulate(&self, design: &Design, point: &OperatingPoint) -> Result<SimulatedQuantities>;
}

impl<F> CircuitEvaluator for F
where
    F: Fn(&Design, &OperatingPoint) -> Result<SimulatedQuantities> + Send + Sync,
{
    fn simulate(&self, design: &Design, point: &OperatingPoint) -> Result<SimulatedQuantities> {
        self(design, point)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Evaluator that counts calls and remembers the efficiencies it was asked for.
    /// Derives an input current from the power balance so losses can depend on
    /// efficiency.
    #[derive(Default)]
    pub struct CountingEvaluator {
        calls: AtomicUsize,
        efficiencies: Mutex<Vec<f64>>,
    }

    impl CountingEvaluator {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn efficiencies(&self) -> Vec<f64> {
            self.efficiencies.lock().unwrap().clone()
        }
    }

    impl CircuitEvaluator for CountingEvaluator {
        fn simulate(&self, design: &Design, point: &OperatingPoint) -> Result<SimulatedQuantities> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.efficiencies.lock().unwrap().push(point.efficiency);
            let vin = design.features.get("input_voltage").unwrap_or(48.0);
            let input_current = design.output_power() / (point.efficiency * vin);
            Ok(SimulatedQuantities::new()
                .with(SimulatedQuantities::EFFICIENCY, point.efficiency)
                .with("input_current", input_current)
                .with("frequency", point.frequency))
        }
    }
}
