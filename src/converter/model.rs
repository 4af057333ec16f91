//! Loss and restriction catalogs, and the two aggregators over them.

use crate::core::{Design, OperatingPoint, Residual, RestrictionKind, SimulatedQuantities};
use crate::error::{ConverterError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A dissipation model: `(design, [f, Li, Lk, eff], simulated) -> watts`.
pub type LossFn = Arc<dyn Fn(&Design, &OperatingPoint, &SimulatedQuantities) -> f64 + Send + Sync>;

/// A feasibility model. Inequalities are feasible when the result is `>= 0`.
pub type RestrictionFn =
    Arc<dyn Fn(&Design, &OperatingPoint, &SimulatedQuantities) -> f64 + Send + Sync>;

/// Which part of the converter a loss belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossGroup {
    Transformer,
    EntranceInductor,
    AuxiliaryInductor,
    Capacitor,
    Diode,
    Switch,
}

#[derive(Clone)]
pub struct LossEntry {
    pub name: String,
    pub group: LossGroup,
    pub active: bool,
    function: LossFn,
}

impl LossEntry {
    pub fn evaluate(
        &self,
        design: &Design,
        point: &OperatingPoint,
        quantities: &SimulatedQuantities,
    ) -> f64 {
        (self.function)(design, point, quantities)
    }
}

impl fmt::Debug for LossEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LossEntry")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct RestrictionEntry {
    pub name: String,
    pub kind: RestrictionKind,
    pub active: bool,
    function: RestrictionFn,
}

impl RestrictionEntry {
    pub fn evaluate(
        &self,
        design: &Design,
        point: &OperatingPoint,
        quantities: &SimulatedQuantities,
    ) -> Residual {
        Residual {
            name: self.name.clone(),
            kind: self.kind,
            value: (self.function)(design, point, quantities),
        }
    }
}

impl fmt::Debug for RestrictionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestrictionEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// The configured set of loss and restriction models for one converter. Entries
/// start active; toggling happens between runs.
#[derive(Clone, Debug, Default)]
pub struct ConverterModel {
    losses: Vec<LossEntry>,
    restrictions: Vec<RestrictionEntry>,
}

impl ConverterModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loss<F>(mut self, name: impl Into<String>, group: LossGroup, function: F) -> Self
    where
        F: Fn(&Design, &OperatingPoint, &SimulatedQuantities) -> f64 + Send + Sync + 'static,
    {
        self.losses.push(LossEntry {
            name: name.into(),
            group,
            active: true,
            function: Arc::new(function),
        });
        self
    }

    pub fn with_restriction<F>(
        mut self,
        name: impl Into<String>,
        kind: RestrictionKind,
        function: F,
    ) -> Self
    where
        F: Fn(&Design, &OperatingPoint, &SimulatedQuantities) -> f64 + Send + Sync + 'static,
    {
        self.restrictions.push(RestrictionEntry {
            name: name.into(),
            kind,
            active: true,
            function: Arc::new(function),
        });
        self
    }

    pub fn losses(&self) -> &[LossEntry] {
        &self.losses
    }

    pub fn restrictions(&self) -> &[RestrictionEntry] {
        &self.restrictions
    }

    pub fn set_loss_active(&mut self, name: &str, active: bool) -> Result<()> {
        let entry = self
            .losses
            .iter_mut()
            .find(|l| l.name == name)
            .ok_or_else(|| ConverterError::UnknownLoss(name.to_string()))?;
        entry.active = active;
        Ok(())
    }

    pub fn set_restriction_active(&mut self, name: &str, active: bool) -> Result<()> {
        let entry = self
            .restrictions
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| ConverterError::UnknownRestriction(name.to_string()))?;
        entry.active = active;
        Ok(())
    }

    /// Toggle every loss in `group`. Returns how many entries were touched.
    pub fn set_group_active(&mut self, group: LossGroup, active: bool) -> usize {
        let mut touched = 0;
        for entry in self.losses.iter_mut().filter(|l| l.group == group) {
            entry.active = active;
            touched += 1;
        }
        touched
    }

    /// Sum of every active loss, in insertion order. Inactive entries are not
    /// evaluated at all.
    pub fn total_loss(
        &self,
        design: &Design,
        point: &OperatingPoint,
        quantities: &SimulatedQuantities,
    ) -> f64 {
        self.losses
            .iter()
            .filter(|l| l.active)
            .map(|l| l.evaluate(design, point, quantities))
            .sum()
    }

    /// Residual of every active restriction, in insertion order.
    pub fn evaluate_restrictions(
        &self,
        design: &Design,
        point: &OperatingPoint,
        quantities: &SimulatedQuantities,
    ) -> Vec<Residual> {
        self.restrictions
            .iter()
            .filter(|r| r.active)
            .map(|r| r.evaluate(design, point, quantities))
            .collect()
    }

    pub fn has_active_restrictions(&self) -> bool {
        self.restrictions.iter().any(|r| r.active)
    }
}
