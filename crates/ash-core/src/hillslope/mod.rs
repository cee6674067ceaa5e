//! Hillslope records, ash assignment, and the per-hillslope job a worker runs.

pub mod post;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ash::frame::{ClimateDay, FireDate, ModelFrame};
use crate::ash::params::{AshParameterSet, AshType, ModelVariant, WindTransportMode};
use crate::ash::simulate::{AshSimulation, AshTransportModel, Termination};
use crate::context::{HydrologySource, OutputSink, OutputSinkExt};
use crate::error::{AshError, Result};
use crate::sbs::BurnClass;

pub use post::{AnnualRow, EventRow, HillslopeStats, Measure, ReturnPeriodRow};

/// Catalog entry for one hillslope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Hillslope {
    pub topaz_id: String,
    pub wepp_id: u32,
    pub area_ha: f64,
    /// Mean slope as a fraction.
    pub slope: f64,
}

pub fn read_catalog(path: &Path) -> Result<Vec<Hillslope>> {
    if !path.exists() {
        return Err(AshError::MissingInput(path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path)?;
    let catalog: Vec<Hillslope> = serde_json::from_str(&text)?;
    for h in &catalog {
        if !h.area_ha.is_finite() || h.area_ha < 0.0 {
            return Err(AshError::InvalidArgument(format!(
                "hillslope {} has invalid area {}",
                h.topaz_id, h.area_ha
            )));
        }
    }
    Ok(catalog)
}

/// Burn class → ash type mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AshTypePolicy {
    /// Moderate → black, high → white; unburned and low carry no ash.
    ModerateBlackHighWhite,
    /// Low and moderate → black, high → white.
    LowModerateBlackHighWhite,
}

impl AshTypePolicy {
    pub fn ash_type(self, class: BurnClass) -> Option<AshType> {
        match (self, class) {
            (_, BurnClass::High) => Some(AshType::White),
            (_, BurnClass::Moderate) => Some(AshType::Black),
            (Self::LowModerateBlackHighWhite, BurnClass::Low) => Some(AshType::Black),
            _ => None,
        }
    }
}

/// Depths and field bulk densities used to turn an ash type into a load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AshLoading {
    pub white_depth_mm: f64,
    pub black_depth_mm: f64,
    pub field_white_bulk_density: f64,
    pub field_black_bulk_density: f64,
}

impl AshLoading {
    pub fn depth_mm(&self, ash_type: AshType) -> f64 {
        match ash_type {
            AshType::White => self.white_depth_mm,
            AshType::Black => self.black_depth_mm,
        }
    }

    pub fn field_bulk_density(&self, ash_type: AshType) -> f64 {
        match ash_type {
            AshType::White => self.field_white_bulk_density,
            AshType::Black => self.field_black_bulk_density,
        }
    }
}

/// A hillslope with its burn class and ash assignment resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolvedHillslope {
    pub topaz_id: String,
    pub wepp_id: u32,
    pub area_ha: f64,
    pub slope: f64,
    pub burn_class: BurnClass,
    pub ash_type: Option<AshType>,
    /// Initial ash depth (mm).
    pub ini_ash_depth: f64,
    /// Initial ash load (t/ha).
    pub ini_ash_load: f64,
    /// Field bulk density used for the depth/load conversion (g/cm³).
    pub ash_bulk_density: f64,
}

impl ResolvedHillslope {
    /// Assign ash type and initial load.
    ///
    /// `ash_type_override` comes from the ash-type raster and only applies to
    /// hillslopes the policy gives ash. `mean_load` is the ash-load raster
    /// mean already scaled to t/ha; NaN means no pixels.
    pub fn resolve(
        hillslope: &Hillslope,
        burn_class: BurnClass,
        policy: AshTypePolicy,
        ash_type_override: Option<AshType>,
        mean_load: Option<f64>,
        loading: &AshLoading,
    ) -> Self {
        let ash_type = policy.ash_type(burn_class).map(|t| ash_type_override.unwrap_or(t));
        let (ini_ash_depth, ini_ash_load, ash_bulk_density) = match ash_type {
            None => (0.0, 0.0, 0.0),
            Some(t) => {
                let bd = loading.field_bulk_density(t);
                match mean_load.filter(|l| l.is_finite() && *l > 0.0) {
                    Some(load) => (load / (10.0 * bd), load, bd),
                    None => {
                        let depth = loading.depth_mm(t);
                        (depth, depth * 10.0 * bd, bd)
                    }
                }
            }
        };
        Self {
            topaz_id: hillslope.topaz_id.clone(),
            wepp_id: hillslope.wepp_id,
            area_ha: hillslope.area_ha,
            slope: hillslope.slope,
            burn_class,
            ash_type,
            ini_ash_depth,
            ini_ash_load,
            ash_bulk_density,
        }
    }

    pub fn is_simulated(&self) -> bool {
        self.ash_type.is_some()
    }
}

/// Per-hillslope output file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    pub prefix: String,
}

impl OutputNames {
    pub fn new(wepp_id: u32) -> Self {
        Self {
            prefix: format!("H{wepp_id}"),
        }
    }

    pub fn series(&self) -> String {
        format!("{}_ash.parquet", self.prefix)
    }

    pub fn events_csv(&self, measure: Measure) -> String {
        format!("{}_ash_stats_per_event_{}.csv", self.prefix, measure.as_str())
    }

    pub fn annuals_csv(&self, measure: Measure) -> String {
        format!("{}_ash_stats_per_year_cum_{}_transport.csv", self.prefix, measure.as_str())
    }

    pub fn return_periods_json(&self) -> String {
        format!("{}_ash_return_periods.json", self.prefix)
    }

    pub fn annuals_json(&self) -> String {
        format!("{}_ash_annuals.json", self.prefix)
    }

    pub fn plot_png(&self) -> String {
        format!("{}_ash.png", self.prefix)
    }

    pub fn scatter_png(&self) -> String {
        format!("{}_ash_scatter.png", self.prefix)
    }
}

/// Immutable argument bundle for one worker.
#[derive(Debug, Clone)]
pub struct HillslopeJob {
    pub hillslope: ResolvedHillslope,
    pub params: AshParameterSet,
    pub model: ModelVariant,
    pub wind_mode: WindTransportMode,
    pub fire_date: FireDate,
    pub recurrence: Vec<f64>,
    /// Calendar year of hydrology simulation year 1.
    pub first_year: i32,
    pub climate: Arc<Vec<ClimateDay>>,
}

/// What a worker reports back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HillslopeResult {
    pub topaz_id: String,
    pub wepp_id: u32,
    pub series_path: PathBuf,
    pub fire_years: usize,
    pub depleted_runs: usize,
    /// Fire runs that hit the end of the record with ash left.
    pub undepleted_runs: usize,
    /// Mean annual ash delivery (t/ha).
    pub mean_annual_delivery: f64,
}

#[derive(Serialize)]
struct ReturnPeriodsFile<'a> {
    topaz_id: &'a str,
    wepp_id: u32,
    fire_years: usize,
    record_days: usize,
    events: &'a std::collections::BTreeMap<Measure, Vec<ReturnPeriodRow<EventRow>>>,
    annuals: &'a std::collections::BTreeMap<Measure, Vec<ReturnPeriodRow<AnnualRow>>>,
}

/// Simulate one hillslope and write its outputs.
pub fn run_hillslope(job: &HillslopeJob, hydrology: &dyn HydrologySource, out: &dyn OutputSink) -> Result<HillslopeResult> {
    let h = &job.hillslope;
    let ash_type = h
        .ash_type
        .ok_or_else(|| AshError::InvalidArgument(format!("hillslope {} carries no ash", h.topaz_id)))?;
    debug!(topaz_id = %h.topaz_id, ash_type = ash_type.as_str(), load = h.ini_ash_load, "simulating hillslope");

    let days = hydrology.hydrology(h.wepp_id, job.first_year)?;
    let frame = ModelFrame::join(&days, &job.climate)?;
    let model = AshTransportModel::new(job.params.clone(), h.ini_ash_load, job.model, job.wind_mode)?;
    let sim = model.run(&frame, job.fire_date)?;

    let result = write_hillslope_outputs(h, &sim, &job.recurrence, out)?;
    info!(
        topaz_id = %h.topaz_id,
        fire_years = result.fire_years,
        mean_annual_delivery = result.mean_annual_delivery,
        "hillslope finished"
    );
    Ok(result)
}

/// Series, ranked CSVs and JSON summaries for one simulated hillslope.
pub fn write_hillslope_outputs(
    h: &ResolvedHillslope,
    sim: &AshSimulation,
    recurrence: &[f64],
    out: &dyn OutputSink,
) -> Result<HillslopeResult> {
    let names = OutputNames::new(h.wepp_id);
    let days: Vec<_> = sim.days().cloned().collect();
    let stats = HillslopeStats::compute(&days, sim.record_days, recurrence);

    let series_path = out.write_series(&names.series(), &days)?;
    for measure in Measure::ALL {
        if let Some(rows) = stats.events.get(&measure) {
            out.write_csv(&names.events_csv(measure), rows)?;
        }
        if let Some(rows) = stats.annuals.get(&measure) {
            out.write_csv(&names.annuals_csv(measure), rows)?;
        }
    }
    out.write_json(
        &names.return_periods_json(),
        &ReturnPeriodsFile {
            topaz_id: &h.topaz_id,
            wepp_id: h.wepp_id,
            fire_years: stats.fire_years,
            record_days: stats.record_days,
            events: &stats.event_return_periods,
            annuals: &stats.annual_return_periods,
        },
    )?;
    out.write_json(&names.annuals_json(), &stats.annuals)?;

    Ok(HillslopeResult {
        topaz_id: h.topaz_id.clone(),
        wepp_id: h.wepp_id,
        series_path,
        fire_years: sim.fire_years(),
        depleted_runs: sim.depleted_runs(),
        undepleted_runs: sim
            .runs
            .iter()
            .filter(|r| r.termination == Termination::ClimateExhausted)
            .count(),
        mean_annual_delivery: stats.mean_annual_delivery(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ash::frame::{julian_day, HydrologyDay};
    use crate::context::RunDirectory;
    use approx::assert_relative_eq;

    fn hillslope() -> Hillslope {
        Hillslope {
            topaz_id: "22".to_string(),
            wepp_id: 1,
            area_ha: 4.0,
            slope: 0.2,
        }
    }

    fn loading() -> AshLoading {
        AshLoading {
            white_depth_mm: 5.0,
            black_depth_mm: 5.0,
            field_white_bulk_density: 0.31,
            field_black_bulk_density: 0.22,
        }
    }

    #[test]
    fn policies_map_burn_classes() {
        let a = AshTypePolicy::ModerateBlackHighWhite;
        let b = AshTypePolicy::LowModerateBlackHighWhite;
        assert_eq!(a.ash_type(BurnClass::Low), None);
        assert_eq!(b.ash_type(BurnClass::Low), Some(AshType::Black));
        assert_eq!(a.ash_type(BurnClass::Moderate), Some(AshType::Black));
        assert_eq!(a.ash_type(BurnClass::High), Some(AshType::White));
        assert_eq!(b.ash_type(BurnClass::Unburned), None);
        assert_eq!(b.ash_type(BurnClass::NoData), None);
    }

    #[test]
    fn load_from_depth_or_raster() {
        let h = hillslope();
        let from_depth = ResolvedHillslope::resolve(&h, BurnClass::High, AshTypePolicy::ModerateBlackHighWhite, None, None, &loading());
        assert_eq!(from_depth.ash_type, Some(AshType::White));
        assert_relative_eq!(from_depth.ini_ash_load, 5.0 * 10.0 * 0.31);

        let from_map = ResolvedHillslope::resolve(&h, BurnClass::Moderate, AshTypePolicy::ModerateBlackHighWhite, None, Some(11.0), &loading());
        assert_relative_eq!(from_map.ini_ash_load, 11.0);
        assert_relative_eq!(from_map.ini_ash_depth, 11.0 / 2.2);

        let nan_map = ResolvedHillslope::resolve(&h, BurnClass::Moderate, AshTypePolicy::ModerateBlackHighWhite, None, Some(f64::NAN), &loading());
        assert_relative_eq!(nan_map.ini_ash_load, 5.0 * 10.0 * 0.22);
    }

    #[test]
    fn override_only_applies_to_ashy_hillslopes() {
        let h = hillslope();
        let p = AshTypePolicy::ModerateBlackHighWhite;
        let high_black = ResolvedHillslope::resolve(&h, BurnClass::High, p, Some(AshType::Black), None, &loading());
        assert_eq!(high_black.ash_type, Some(AshType::Black));
        let low = ResolvedHillslope::resolve(&h, BurnClass::Low, p, Some(AshType::White), None, &loading());
        assert_eq!(low.ash_type, None);
        assert!(!low.is_simulated());
        assert_eq!(low.ini_ash_load, 0.0);
    }

    #[test]
    fn output_names_follow_wepp_id() {
        let n = OutputNames::new(7);
        assert_eq!(n.series(), "H7_ash.parquet");
        assert_eq!(n.events_csv(Measure::Wind), "H7_ash_stats_per_event_wind.csv");
        assert_eq!(n.annuals_csv(Measure::Water), "H7_ash_stats_per_year_cum_water_transport.csv");
        assert_eq!(n.return_periods_json(), "H7_ash_return_periods.json");
        assert_eq!(n.annuals_json(), "H7_ash_annuals.json");
    }

    struct Synthetic;

    impl HydrologySource for Synthetic {
        fn hydrology(&self, _wepp_id: u32, _first_year: i32) -> Result<Vec<HydrologyDay>> {
            let mut days = Vec::new();
            for year in 2001..2004 {
                for julian in 1..=365u32 {
                    let (month, day) = crate::ash::frame::from_julian(year, julian).unwrap();
                    let storm = julian % 17 == 0;
                    days.push(HydrologyDay {
                        year,
                        month,
                        day,
                        julian: julian_day(year, month, day).unwrap(),
                        precip_mm: if storm { 40.0 } else { 0.0 },
                        rainmelt_mm: if storm { 40.0 } else { 0.0 },
                        runoff_mm: if storm { 12.0 } else { 0.0 },
                        soil_water_mm: 100.0,
                        snow_water_mm: 0.0,
                        peak_ro: None,
                        eff_duration: None,
                    });
                }
            }
            Ok(days)
        }
    }

    #[test]
    fn run_hillslope_writes_every_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunDirectory::new(dir.path()).unwrap();
        let h = ResolvedHillslope::resolve(&hillslope(), BurnClass::High, AshTypePolicy::ModerateBlackHighWhite, None, None, &loading());
        let climate: Vec<ClimateDay> = Synthetic
            .hydrology(1, 2001)
            .unwrap()
            .iter()
            .map(|d| ClimateDay { year: d.year, month: d.month, day: d.day, peak_wind: (d.julian % 11) as f64 })
            .collect();
        let job = HillslopeJob {
            hillslope: h,
            params: AshParameterSet::white(),
            model: ModelVariant::Anu,
            wind_mode: WindTransportMode::PeakRecord,
            fire_date: "8/1".parse().unwrap(),
            recurrence: vec![2.0, 5.0],
            first_year: 2001,
            climate: Arc::new(climate),
        };
        let result = run_hillslope(&job, &Synthetic, &out).unwrap();
        assert_eq!(result.fire_years, 3);
        assert!(result.series_path.ends_with("H1_ash.parquet"));
        let names = OutputNames::new(1);
        for m in Measure::ALL {
            assert!(dir.path().join(names.events_csv(m)).exists());
            assert!(dir.path().join(names.annuals_csv(m)).exists());
        }
        let rp: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join(names.return_periods_json())).unwrap()).unwrap();
        assert_eq!(rp["fire_years"], 3);
        assert_eq!(rp["annuals"]["ash"].as_array().unwrap().len(), 1, "only the 2-year target fits 3 fire years");
    }
}
