//! Run manifest: every configuration key of a run, validated up front and
//! persisted as JSON next to the outputs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ash::frame::FireDate;
use crate::ash::params::{AshParameterSet, AshType, ModelVariant, WindTransportMode};
use crate::error::{AshError, Result};
use crate::hillslope::{AshLoading, AshTypePolicy, ResolvedHillslope};
use crate::io::write_json_atomic;
use crate::sbs::parse_nodata_vals;
use crate::watershed::{AggregationConfig, ContaminantTables, Reservoir};

pub const MANIFEST_FILE: &str = "ash.manifest.json";

/// Guards every manifest write in the process.
static MANIFEST_LOCK: Mutex<()> = Mutex::new(());

pub const DEFAULT_RECURRENCE: [f64; 7] = [2.0, 5.0, 10.0, 20.0, 25.0, 50.0, 100.0];

fn default_depth() -> f64 {
    5.0
}
fn default_white_bulk_density() -> f64 {
    0.31
}
fn default_black_bulk_density() -> f64 {
    0.22
}
fn default_true() -> bool {
    true
}
fn default_capacity() -> f64 {
    1_000_000.0
}
fn default_storage_fraction() -> f64 {
    0.6
}
fn default_reservoir_bulk_density() -> f64 {
    0.62
}
fn default_recurrence() -> Vec<f64> {
    DEFAULT_RECURRENCE.to_vec()
}
fn default_ash_load_scale() -> f64 {
    0.1
}

/// External inputs of a run. Relative paths are resolved against the
/// manifest's directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    pub sbs_map: PathBuf,
    pub subcatchments: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ash_load_map: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ash_type_map: Option<PathBuf>,
    /// JSON catalog of `topaz_id, wepp_id, area_ha, slope`.
    pub hillslopes: PathBuf,
    /// CLIGEN `.cli` or CSV.
    pub climate: PathBuf,
    /// Holds `H{wepp_id}.wat.dat` or `H{wepp_id}.wat.csv`.
    pub hydrology_dir: PathBuf,
    #[serde(default)]
    pub sbs_nodata_vals: Vec<i32>,
    #[serde(default)]
    pub sbs_ignore_color_table: bool,
}

impl InputPaths {
    pub fn resolve_against(&mut self, base: &Path) {
        let fix = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        fix(&mut self.sbs_map);
        fix(&mut self.subcatchments);
        fix(&mut self.hillslopes);
        fix(&mut self.climate);
        fix(&mut self.hydrology_dir);
        if let Some(p) = self.ash_load_map.as_mut() {
            fix(p);
        }
        if let Some(p) = self.ash_type_map.as_mut() {
            fix(p);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HillslopeFailure {
    pub topaz_id: String,
    pub error: String,
}

/// Outcome of the last run, written back into the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub finished_at: String,
    pub sbs_classifier: String,
    pub burn_class_counts: BTreeMap<String, usize>,
    pub hillslopes_total: usize,
    pub hillslopes_simulated: usize,
    pub hillslopes_failed: Vec<HillslopeFailure>,
    pub hillslopes_cancelled: Vec<String>,
    /// Fire runs that ran out of climate with ash left.
    pub undepleted_runs: usize,
    pub missing_from_aggregation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    pub fire_date: FireDate,
    #[serde(default = "default_depth")]
    pub ini_white_ash_depth_mm: f64,
    #[serde(default = "default_depth")]
    pub ini_black_ash_depth_mm: f64,
    #[serde(default = "default_white_bulk_density")]
    pub field_white_ash_bulkdensity: f64,
    #[serde(default = "default_black_bulk_density")]
    pub field_black_ash_bulkdensity: f64,
    /// Simulator `ini_bulk_den` for white ash.
    #[serde(default = "default_white_bulk_density")]
    pub white_ash_bulkdensity: f64,
    #[serde(default = "default_black_bulk_density")]
    pub black_ash_bulkdensity: f64,
    #[serde(default = "default_true")]
    pub run_wind_transport: bool,
    #[serde(default = "default_capacity")]
    pub reservoir_capacity_m3: f64,
    #[serde(default = "default_storage_fraction")]
    pub reservoir_storage_fraction: f64,
    #[serde(default = "default_reservoir_bulk_density")]
    pub reservoir_bulk_density: f64,
    #[serde(default)]
    pub model: ModelVariant,
    pub ash_type_policy: AshTypePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_transport_mode: Option<WindTransportMode>,
    #[serde(default = "default_recurrence")]
    pub recurrence: Vec<f64>,
    #[serde(default = "default_ash_load_scale")]
    pub ash_load_scale: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_workers: Option<usize>,
    pub inputs: InputPaths,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hillslopes: Vec<ResolvedHillslope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    /// Written as flat `high_*`, `mod_*`, `low_*` keys.
    #[serde(skip)]
    pub contaminants: ContaminantTables,
}

impl RunManifest {
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(AshError::config("manifest", "", "must be a JSON object"));
        };
        if let Some(nodata) = map.get("inputs").and_then(|i| i.get("sbs_nodata_vals")) {
            parse_nodata_vals(nodata)?;
        }
        let contaminants = ContaminantTables::take_flat_keys(&mut map)?;
        let mut manifest: RunManifest =
            serde_json::from_value(Value::Object(map)).map_err(|e| AshError::config("manifest", "", e.to_string()))?;
        manifest.contaminants = contaminants;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| AshError::config("manifest", "", e.to_string()))?;
        Self::from_value(value)
    }

    /// Read and validate a manifest; relative input paths are taken from
    /// the manifest's directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AshError::MissingInput(path.to_path_buf()));
        }
        let mut manifest = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            manifest.inputs.resolve_against(base);
        }
        Ok(manifest)
    }

    pub fn to_value(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            self.contaminants.insert_flat_keys(map);
        }
        Ok(value)
    }

    /// Atomic write, serialized with every other manifest write in the process.
    pub fn save(&self, path: &Path) -> Result<()> {
        let value = self.to_value()?;
        let _guard = MANIFEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        write_json_atomic(path, &value)
    }

    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("ini_white_ash_depth_mm", self.ini_white_ash_depth_mm),
            ("ini_black_ash_depth_mm", self.ini_black_ash_depth_mm),
            ("reservoir_capacity_m3", self.reservoir_capacity_m3),
        ];
        for (key, v) in non_negative {
            if !v.is_finite() || v < 0.0 {
                return Err(AshError::config(key, v, "must be a non-negative number"));
            }
        }
        let positive = [
            ("field_white_ash_bulkdensity", self.field_white_ash_bulkdensity),
            ("field_black_ash_bulkdensity", self.field_black_ash_bulkdensity),
            ("white_ash_bulkdensity", self.white_ash_bulkdensity),
            ("black_ash_bulkdensity", self.black_ash_bulkdensity),
            ("reservoir_bulk_density", self.reservoir_bulk_density),
            ("ash_load_scale", self.ash_load_scale),
        ];
        for (key, v) in positive {
            if !v.is_finite() || v <= 0.0 {
                return Err(AshError::config(key, v, "must be a positive number"));
            }
        }
        if !(0.0..=1.0).contains(&self.reservoir_storage_fraction) {
            return Err(AshError::config(
                "reservoir_storage_fraction",
                self.reservoir_storage_fraction,
                "must lie in [0, 1]",
            ));
        }
        if let Some(bad) = self.recurrence.iter().find(|r| !r.is_finite() || **r <= 0.0) {
            return Err(AshError::config("recurrence", bad, "intervals must be positive"));
        }
        for ash_type in [AshType::White, AshType::Black] {
            self.params_for(ash_type).validate().map_err(|e| match e {
                AshError::InvalidConfig { key, value, reason } => AshError::InvalidConfig {
                    key: format!("{}_ash.{key}", ash_type.as_str()),
                    value,
                    reason,
                },
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn wind_mode(&self) -> WindTransportMode {
        self.wind_transport_mode.unwrap_or_else(|| self.model.default_wind_mode())
    }

    /// Calibrated parameters for the configured model with the manifest's
    /// initial bulk density and wind switch applied.
    pub fn params_for(&self, ash_type: AshType) -> AshParameterSet {
        let mut params = AshParameterSet::for_model(ash_type, self.model);
        params.ini_bulk_den = match ash_type {
            AshType::White => self.white_ash_bulkdensity,
            AshType::Black => self.black_ash_bulkdensity,
        };
        params.run_wind_transport = self.run_wind_transport;
        params
    }

    pub fn loading(&self) -> AshLoading {
        AshLoading {
            white_depth_mm: self.ini_white_ash_depth_mm,
            black_depth_mm: self.ini_black_ash_depth_mm,
            field_white_bulk_density: self.field_white_ash_bulkdensity,
            field_black_bulk_density: self.field_black_ash_bulkdensity,
        }
    }

    pub fn reservoir(&self) -> Reservoir {
        Reservoir {
            capacity_m3: self.reservoir_capacity_m3,
            storage_fraction: self.reservoir_storage_fraction,
            bulk_density: self.reservoir_bulk_density,
        }
    }

    pub fn aggregation_config(&self) -> AggregationConfig {
        AggregationConfig {
            recurrence: self.recurrence.clone(),
            reservoir: self.reservoir(),
            contaminants: self.contaminants,
        }
    }
}
