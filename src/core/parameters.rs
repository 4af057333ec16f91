//! Named access to the component graph.
//!
//! Each key maps to a getter/setter pair over [`Design`]. Keys are matched
//! case-insensitively, so `C1` and `c1` address the same capacitor.

use super::components::{Cable, Capacitor, Core, Design, Diode, Switch};
use crate::error::{ConverterError, Result};
use indexmap::IndexMap;
use std::sync::OnceLock;

/// A value that can be read from or written to a named design slot.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    Cable(Cable),
    Core(Core),
    /// Turn counts and parallel-wire counts.
    Count(u32),
    Capacitor(Capacitor),
    Diode(Diode),
    Switch(Switch),
}

impl ParameterValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cable(_) => "cable",
            Self::Core(_) => "core",
            Self::Count(_) => "count",
            Self::Capacitor(_) => "capacitor",
            Self::Diode(_) => "diode",
            Self::Switch(_) => "switch",
        }
    }
}

type Getter = fn(&Design) -> ParameterValue;
type Setter = fn(&mut Design, ParameterValue) -> std::result::Result<(), ParameterValue>;

#[derive(Clone, Copy)]
struct Accessor {
    kind: &'static str,
    get: Getter,
    set: Setter,
}

macro_rules! accessor {
    ($variant:ident, $kind:literal, |$d:ident| $field:expr) => {
        Accessor {
            kind: $kind,
            get: |$d: &Design| ParameterValue::$variant($field.clone()),
            set: |$d: &mut Design, value: ParameterValue| match value {
                ParameterValue::$variant(v) => {
                    $field = v;
                    Ok(())
                }
                other => Err(other),
            },
        }
    };
}

fn table() -> &'static IndexMap<&'static str, Accessor> {
    static TABLE: OnceLock<IndexMap<&'static str, Accessor>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = IndexMap::new();
        t.insert("primary_cable", accessor!(Cable, "cable", |d| d.transformer.primary.cable));
        t.insert("secondary_cable", accessor!(Cable, "cable", |d| d.transformer.secondary.cable));
        t.insert("transformer_core", accessor!(Core, "core", |d| d.transformer.core));
        t.insert("primary_winding", accessor!(Count, "count", |d| d.transformer.primary.turns));
        t.insert("secondary_winding", accessor!(Count, "count", |d| d.transformer.secondary.turns));
        t.insert(
            "primary_parallel_wires",
            accessor!(Count, "count", |d| d.transformer.primary.parallel_wires),
        );
        t.insert(
            "secondary_parallel_wires",
            accessor!(Count, "count", |d| d.transformer.secondary.parallel_wires),
        );
        t.insert(
            "entrance_inductor_cable",
            accessor!(Cable, "cable", |d| d.entrance_inductor.winding.cable),
        );
        t.insert(
            "entrance_inductor_winding",
            accessor!(Count, "count", |d| d.entrance_inductor.winding.turns),
        );
        t.insert(
            "entrance_inductor_parallel_wires",
            accessor!(Count, "count", |d| d.entrance_inductor.winding.parallel_wires),
        );
        t.insert("entrance_inductor_core", accessor!(Core, "core", |d| d.entrance_inductor.core));
        t.insert(
            "auxiliary_inductor_cable",
            accessor!(Cable, "cable", |d| d.auxiliary_inductor.winding.cable),
        );
        t.insert(
            "auxiliary_inductor_winding",
            accessor!(Count, "count", |d| d.auxiliary_inductor.winding.turns),
        );
        t.insert(
            "auxiliary_inductor_parallel_wires",
            accessor!(Count, "count", |d| d.auxiliary_inductor.winding.parallel_wires),
        );
        t.insert("auxiliary_inductor_core", accessor!(Core, "core", |d| d.auxiliary_inductor.core));
        t.insert("c1", accessor!(Capacitor, "capacitor", |d| d.capacitors[0]));
        t.insert("c2", accessor!(Capacitor, "capacitor", |d| d.capacitors[1]));
        t.insert("c3", accessor!(Capacitor, "capacitor", |d| d.capacitors[2]));
        t.insert("c4", accessor!(Capacitor, "capacitor", |d| d.capacitors[3]));
        t.insert("d3", accessor!(Diode, "diode", |d| d.diodes[0]));
        t.insert("d4", accessor!(Diode, "diode", |d| d.diodes[1]));
        t.insert("s1", accessor!(Switch, "switch", |d| d.switches[0]));
        t.insert("s2", accessor!(Switch, "switch", |d| d.switches[1]));
        t
    })
}

fn lookup(name: &str) -> Result<&'static Accessor> {
    table()
        .get(name.to_ascii_lowercase().as_str())
        .ok_or_else(|| ConverterError::UnknownParameter(name.to_string()))
}

/// Every recognised key, in table order.
pub fn parameter_names() -> impl Iterator<Item = &'static str> {
    table().keys().copied()
}

pub fn get_parameter(design: &Design, name: &str) -> Result<ParameterValue> {
    Ok((lookup(name)?.get)(design))
}

pub fn set_parameter(design: &mut Design, name: &str, value: ParameterValue) -> Result<()> {
    let accessor = lookup(name)?;
    (accessor.set)(design, value).map_err(|rejected| ConverterError::ParameterType {
        name: name.to_string(),
        expected: accessor.kind,
        found: rejected.kind(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::components::fixtures;

    /// A value of the right kind for `name` that differs from the fixture design.
    fn replacement_for(name: &str, design: &Design) -> ParameterValue {
        match get_parameter(design, name).unwrap() {
            ParameterValue::Cable(mut c) => {
                c.name = format!("{name}-new");
                ParameterValue::Cable(c)
            }
            ParameterValue::Core(mut c) => {
                c.name = format!("{name}-new");
                ParameterValue::Core(c)
            }
            ParameterValue::Count(n) => ParameterValue::Count(n + 7),
            ParameterValue::Capacitor(mut c) => {
                c.name = format!("{name}-new");
                ParameterValue::Capacitor(c)
            }
            ParameterValue::Diode(mut d) => {
                d.name = format!("{name}-new");
                ParameterValue::Diode(d)
            }
            ParameterValue::Switch(mut s) => {
                s.name = format!("{name}-new");
                ParameterValue::Switch(s)
            }
        }
    }

    #[test]
    fn every_key_round_trips() {
        let mut design = fixtures::design(1000.0);
        for name in parameter_names() {
            let value = replacement_for(name, &design);
            set_parameter(&mut design, name, value.clone()).unwrap();
            assert_eq!(get_parameter(&design, name).unwrap(), value, "key {name}");
        }
    }

    #[test]
    fn switches_are_distinct_slots() {
        let mut design = fixtures::design(1000.0);
        let mut s2 = design.switches[1].clone();
        s2.name = "second".into();
        set_parameter(&mut design, "S2", ParameterValue::Switch(s2)).unwrap();

        assert_eq!(design.switches[1].name, "second");
        assert_ne!(design.switches[0].name, "second");
        match get_parameter(&design, "s1").unwrap() {
            ParameterValue::Switch(s) => assert_eq!(s.name, "IRFP4668"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn keys_are_case_insensitive() {
        let design = fixtures::design(1000.0);
        assert_eq!(
            get_parameter(&design, "C3").unwrap(),
            get_parameter(&design, "c3").unwrap()
        );
        assert_eq!(
            get_parameter(&design, "D4").unwrap(),
            ParameterValue::Diode(design.diodes[1].clone())
        );
    }

    #[test]
    fn unknown_key_is_rejected() {
        let mut design = fixtures::design(1000.0);
        assert!(matches!(
            get_parameter(&design, "tertiary_winding"),
            Err(ConverterError::UnknownParameter(name)) if name == "tertiary_winding"
        ));
        assert!(matches!(
            set_parameter(&mut design, "s3", ParameterValue::Count(1)),
            Err(ConverterError::UnknownParameter(_))
        ));
    }

    #[test]
    fn wrong_value_kind_leaves_design_untouched() {
        let mut design = fixtures::design(1000.0);
        let before = design.clone();
        let err = set_parameter(
            &mut design,
            "transformer_core",
            ParameterValue::Cable(fixtures::cable("x")),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConverterError::ParameterType { expected: "core", found: "cable", .. }
        ));
        assert_eq!(design, before);
    }

    #[test]
    fn table_covers_every_slot() {
        assert_eq!(parameter_names().count(), 23);
    }
}
