//! Per-burn-class contaminant concentrations in ash and the loads they imply.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AshError, Result};
use crate::sbs::BurnClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    PO4,
    Al,
    Si,
    Ca,
    Pb,
    Na,
    Mg,
    P,
    Mn,
    Fe,
    Ni,
    Cu,
    Zn,
    As,
    Cd,
    Hg,
}

impl Species {
    pub const ALL: [Species; 16] = [
        Species::PO4,
        Species::Al,
        Species::Si,
        Species::Ca,
        Species::Pb,
        Species::Na,
        Species::Mg,
        Species::P,
        Species::Mn,
        Species::Fe,
        Species::Ni,
        Species::Cu,
        Species::Zn,
        Species::As,
        Species::Cd,
        Species::Hg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PO4 => "PO4",
            Self::Al => "Al",
            Self::Si => "Si",
            Self::Ca => "Ca",
            Self::Pb => "Pb",
            Self::Na => "Na",
            Self::Mg => "Mg",
            Self::P => "P",
            Self::Mn => "Mn",
            Self::Fe => "Fe",
            Self::Ni => "Ni",
            Self::Cu => "Cu",
            Self::Zn => "Zn",
            Self::As => "As",
            Self::Cd => "Cd",
            Self::Hg => "Hg",
        }
    }

    /// Concentration unit.
    pub fn units(self) -> &'static str {
        match self {
            Self::As | Self::Cd | Self::Hg => "ug/kg",
            _ => "mg/kg",
        }
    }

    /// Kilograms of species per tonne of ash per unit concentration.
    fn kg_per_tonne(self) -> f64 {
        match self {
            Self::As | Self::Cd | Self::Hg => 1e-6,
            _ => 1e-3,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Species {
    type Err = AshError;

    fn from_str(s: &str) -> Result<Self> {
        Species::ALL
            .into_iter()
            .find(|sp| sp.as_str() == s)
            .ok_or_else(|| AshError::InvalidArgument(format!("unknown contaminant species `{s}`")))
    }
}

/// Concentrations of all 16 species for one burn class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContaminantConcentrations([f64; 16]);

impl ContaminantConcentrations {
    pub fn new(values: [f64; 16]) -> Self {
        Self(values)
    }

    pub fn get(&self, species: Species) -> f64 {
        self.0[species.index()]
    }

    pub fn set(&mut self, species: Species, value: f64) {
        self.0[species.index()] = value;
    }

    /// Species loads in kg carried by `tonnes` of ash.
    pub fn load_kg(&self, tonnes: f64) -> BTreeMap<Species, f64> {
        Species::ALL
            .into_iter()
            .map(|sp| (sp, tonnes * self.get(sp) * sp.kg_per_tonne()))
            .collect()
    }
}

impl Serialize for ContaminantConcentrations {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let map: BTreeMap<&str, f64> = Species::ALL.into_iter().map(|sp| (sp.as_str(), self.get(sp))).collect();
        map.serialize(serializer)
    }
}

/// High, moderate and low severity concentration tables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContaminantTables {
    pub high: ContaminantConcentrations,
    pub moderate: ContaminantConcentrations,
    pub low: ContaminantConcentrations,
}

/// Manifest key prefixes, in `(prefix, class)` order.
const PREFIXES: [(&str, BurnClass); 3] = [
    ("high_", BurnClass::High),
    ("mod_", BurnClass::Moderate),
    ("low_", BurnClass::Low),
];

impl Default for ContaminantTables {
    fn default() -> Self {
        Self {
            high: ContaminantConcentrations([
                1500.0, 8000.0, 2500.0, 60000.0, 25.0, 3000.0, 9000.0, 2500.0, 1500.0, 7000.0, 20.0, 40.0, 150.0,
                3000.0, 500.0, 30.0,
            ]),
            moderate: ContaminantConcentrations([
                900.0, 10000.0, 2000.0, 35000.0, 20.0, 1800.0, 5500.0, 1600.0, 900.0, 9000.0, 18.0, 35.0, 110.0,
                2500.0, 400.0, 60.0,
            ]),
            low: ContaminantConcentrations([
                600.0, 11000.0, 1800.0, 20000.0, 18.0, 1200.0, 3500.0, 1000.0, 600.0, 10000.0, 16.0, 30.0, 90.0,
                2000.0, 300.0, 90.0,
            ]),
        }
    }
}

impl ContaminantTables {
    /// Table for a burn class; unburned and nodata carry none.
    pub fn for_class(&self, class: BurnClass) -> Option<&ContaminantConcentrations> {
        match class {
            BurnClass::High => Some(&self.high),
            BurnClass::Moderate => Some(&self.moderate),
            BurnClass::Low => Some(&self.low),
            BurnClass::Unburned | BurnClass::NoData => None,
        }
    }

    fn for_class_mut(&mut self, class: BurnClass) -> Option<&mut ContaminantConcentrations> {
        match class {
            BurnClass::High => Some(&mut self.high),
            BurnClass::Moderate => Some(&mut self.moderate),
            BurnClass::Low => Some(&mut self.low),
            BurnClass::Unburned | BurnClass::NoData => None,
        }
    }

    /// Remove `high_<SPECIES>`, `mod_<SPECIES>` and `low_<SPECIES>` keys from
    /// a manifest object, starting from the defaults for absent keys.
    pub fn take_flat_keys(map: &mut serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut tables = Self::default();
        for (prefix, class) in PREFIXES {
            for species in Species::ALL {
                let key = format!("{prefix}{species}");
                let Some(value) = map.remove(&key) else { continue };
                let v = value
                    .as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| AshError::config(&key, &value, "must be a non-negative number"))?;
                if let Some(table) = tables.for_class_mut(class) {
                    table.set(species, v);
                }
            }
        }
        Ok(tables)
    }

    pub fn insert_flat_keys(&self, map: &mut serde_json::Map<String, serde_json::Value>) {
        for (prefix, class) in PREFIXES {
            let Some(table) = self.for_class(class) else { continue };
            for species in Species::ALL {
                map.insert(format!("{prefix}{species}"), serde_json::json!(table.get(species)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sixteen_species_in_declared_order() {
        assert_eq!(Species::ALL.len(), 16);
        for (i, sp) in Species::ALL.iter().enumerate() {
            assert_eq!(sp.index(), i);
            assert_eq!(sp.as_str().parse::<Species>().unwrap(), *sp);
        }
        assert_eq!(Species::Hg.units(), "ug/kg");
        assert_eq!(Species::Ca.units(), "mg/kg");
    }

    #[test]
    fn loads_convert_units() {
        let mut c = ContaminantConcentrations::new([0.0; 16]);
        c.set(Species::Ca, 1000.0);
        c.set(Species::Hg, 1000.0);
        let loads = c.load_kg(2.0);
        assert_relative_eq!(loads[&Species::Ca], 2.0);
        assert_relative_eq!(loads[&Species::Hg], 0.002);
    }

    #[test]
    fn flat_keys_parsed_and_removed() {
        let mut map = serde_json::json!({"high_Pb": 12.5, "low_Hg": 7, "fire_date": "8/4"})
            .as_object()
            .cloned()
            .unwrap();
        let tables = ContaminantTables::take_flat_keys(&mut map).unwrap();
        assert_eq!(tables.high.get(Species::Pb), 12.5);
        assert_eq!(tables.low.get(Species::Hg), 7.0);
        assert_eq!(tables.moderate, ContaminantTables::default().moderate);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn non_numeric_concentration_rejected() {
        let mut map = serde_json::json!({"mod_Zn": "lots"}).as_object().cloned().unwrap();
        match ContaminantTables::take_flat_keys(&mut map).unwrap_err() {
            AshError::InvalidConfig { key, .. } => assert_eq!(key, "mod_Zn"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn flat_keys_roundtrip() {
        let mut map = serde_json::Map::new();
        ContaminantTables::default().insert_flat_keys(&mut map);
        assert_eq!(map.len(), 48);
        let back = ContaminantTables::take_flat_keys(&mut map).unwrap();
        assert_eq!(back, ContaminantTables::default());
    }
}
