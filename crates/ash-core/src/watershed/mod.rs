//! Watershed aggregation.
//!
//! Hillslope series are scaled by area (t/ha × ha = t) and summed per event
//! date and per fire year, for the whole watershed and per burn class. Annual
//! totals get Weibull ranks, recurrence lookups, contaminant loads and the
//! reservoir overlay.

pub mod contaminants;
pub mod reservoir;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ash::simulate::AshDay;
use crate::context::{OutputSink, OutputSinkExt};
use crate::error::Result;
use crate::hillslope::post::return_periods;
use crate::hillslope::{OutputNames, ResolvedHillslope, ReturnPeriodRow};
use crate::io::read_ash_parquet;
use crate::sbs::BurnClass;
use crate::stats::{rank_descending, weibull_interval};

pub use contaminants::{ContaminantConcentrations, ContaminantTables, Species};
pub use reservoir::{Reservoir, ReservoirOverlay};

pub const ANNUALS_CSV: &str = "pw0_ash_stats_per_year_cum_ash_delivery_by_water.csv";
pub const DAILY_CSV: &str = "pw0_ash_daily_delivery.csv";
pub const RETURN_PERIODS_JSON: &str = "pw0_ash_return_periods.json";
pub const BURNCLASS_SUMMARY_JSON: &str = "pw0_burnclass_summary.json";
pub const SUMMARY_JSON: &str = "pw0_ash_summary.json";

pub fn burn_class_annuals_csv(four_class: i32) -> String {
    format!("pw0_burn_class={four_class}_ash_stats_per_year_cum_ash_delivery_by_water.csv")
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    pub recurrence: Vec<f64>,
    pub reservoir: Reservoir,
    pub contaminants: ContaminantTables,
}

/// Watershed transport on one day of one fire run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatershedDay {
    pub fire_year: i32,
    pub year: i32,
    #[serde(rename = "mo")]
    pub month: u32,
    #[serde(rename = "da")]
    pub day: u32,
    #[serde(rename = "water_transport (tonne)")]
    pub water: f64,
    #[serde(rename = "wind_transport (tonne)")]
    pub wind: f64,
    #[serde(rename = "ash_transport (tonne)")]
    pub ash: f64,
}

/// Ranked watershed total for one fire year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatershedAnnualRow {
    pub rank: usize,
    pub fire_year: i32,
    #[serde(rename = "cum_water_transport (tonne)")]
    pub water: f64,
    #[serde(rename = "cum_wind_transport (tonne)")]
    pub wind: f64,
    #[serde(rename = "cum_ash_transport (tonne)")]
    pub ash: f64,
    #[serde(rename = "return_interval (yr)")]
    pub return_interval: f64,
    pub probability: f64,
    #[serde(rename = "reservoir_sediment (m^3)")]
    pub reservoir_sediment_m3: f64,
    #[serde(rename = "reservoir_remaining (m^3)")]
    pub reservoir_remaining_m3: f64,
    pub reservoir_fraction_consumed: f64,
    pub reservoir_full: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatershedReturnRow {
    #[serde(flatten)]
    pub annual: WatershedAnnualRow,
    pub reservoir: ReservoirOverlay,
    /// Species load (kg) delivered by water in that fire year.
    pub contaminants_kg: BTreeMap<Species, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnClassArea {
    /// 4-class code, 0–3.
    pub burn_class: i32,
    pub label: String,
    pub hillslopes: usize,
    pub area_ha: f64,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatershedSummary {
    pub fire_years: usize,
    pub hillslopes_aggregated: usize,
    pub missing_hillslopes: Vec<String>,
    #[serde(skip)]
    pub daily: Vec<WatershedDay>,
    #[serde(skip)]
    pub annuals: Vec<WatershedAnnualRow>,
    #[serde(skip)]
    pub by_burn_class: BTreeMap<i32, Vec<WatershedAnnualRow>>,
    #[serde(skip)]
    pub return_periods: Vec<ReturnPeriodRow<WatershedReturnRow>>,
    #[serde(skip)]
    pub burnclass_summary: Vec<BurnClassArea>,
}

/// Per-fire-year `(water, wind, ash)` tonnes.
type AnnualTotals = BTreeMap<i32, [f64; 3]>;

fn add(totals: &mut AnnualTotals, fire_year: i32, v: [f64; 3]) {
    let e = totals.entry(fire_year).or_insert([0.0; 3]);
    for (a, b) in e.iter_mut().zip(v) {
        *a += b;
    }
}

/// End-of-run cumulative `(water, wind, ash)` per fire year of one series.
fn run_totals(days: &[AshDay]) -> BTreeMap<i32, [f64; 3]> {
    let mut out = BTreeMap::new();
    for d in days {
        out.insert(d.fire_year, [d.cum_water_transport, d.cum_wind_transport, d.cum_ash_transport]);
    }
    out
}

fn rank_annuals(totals: &AnnualTotals, reservoir: &Reservoir) -> Vec<WatershedAnnualRow> {
    let n = totals.len();
    rank_descending(totals.iter().collect(), |(_, v)| v[0], |k| weibull_interval(n, k))
        .into_iter()
        .map(|r| {
            let (&fire_year, v) = r.item;
            let overlay = reservoir.overlay(v[0]);
            WatershedAnnualRow {
                rank: r.rank,
                fire_year,
                water: v[0],
                wind: v[1],
                ash: v[2],
                return_interval: r.return_interval,
                probability: r.probability,
                reservoir_sediment_m3: overlay.sediment_m3,
                reservoir_remaining_m3: overlay.remaining_m3,
                reservoir_fraction_consumed: overlay.fraction_consumed,
                reservoir_full: overlay.reservoir_full,
            }
        })
        .collect()
}

/// Area by dominant burn class over every hillslope; nodata counts as unburned.
pub fn burnclass_summary(hillslopes: &[ResolvedHillslope]) -> Vec<BurnClassArea> {
    let classes = [BurnClass::Unburned, BurnClass::Low, BurnClass::Moderate, BurnClass::High];
    let total: f64 = hillslopes.iter().map(|h| h.area_ha).sum();
    classes
        .iter()
        .map(|&class| {
            let members: Vec<&ResolvedHillslope> = hillslopes
                .iter()
                .filter(|h| {
                    let c = if h.burn_class == BurnClass::NoData { BurnClass::Unburned } else { h.burn_class };
                    c == class
                })
                .collect();
            let area_ha: f64 = members.iter().map(|h| h.area_ha).sum();
            BurnClassArea {
                burn_class: class.four_class(),
                label: class.label().to_string(),
                hillslopes: members.len(),
                area_ha,
                fraction: if total > 0.0 { area_ha / total } else { 0.0 },
            }
        })
        .collect()
}

/// Aggregate hillslope series keyed by `topaz_id`. Simulated hillslopes
/// without a series are reported as missing.
pub fn aggregate(
    hillslopes: &[ResolvedHillslope],
    series: &BTreeMap<String, Vec<AshDay>>,
    config: &AggregationConfig,
) -> WatershedSummary {
    let mut daily: BTreeMap<(i32, i32, u32, u32), [f64; 2]> = BTreeMap::new();
    let mut all = AnnualTotals::new();
    let mut by_class: BTreeMap<i32, AnnualTotals> = BTreeMap::new();
    let mut missing = Vec::new();
    let mut aggregated = 0;

    for h in hillslopes.iter().filter(|h| h.is_simulated()) {
        let Some(days) = series.get(&h.topaz_id) else {
            missing.push(h.topaz_id.clone());
            continue;
        };
        aggregated += 1;
        for d in days {
            let e = daily.entry((d.fire_year, d.year, d.month, d.day)).or_insert([0.0; 2]);
            e[0] += d.water_transport * h.area_ha;
            e[1] += d.wind_transport * h.area_ha;
        }
        let class_totals = by_class.entry(h.burn_class.four_class()).or_default();
        for (fire_year, v) in run_totals(days) {
            let scaled = v.map(|x| x * h.area_ha);
            add(&mut all, fire_year, scaled);
            add(class_totals, fire_year, scaled);
        }
    }

    let annuals = rank_annuals(&all, &config.reservoir);
    let by_burn_class: BTreeMap<i32, Vec<WatershedAnnualRow>> = by_class
        .iter()
        .map(|(&c, totals)| (c, rank_annuals(totals, &config.reservoir)))
        .collect();

    let contaminant_load = |fire_year: i32| -> BTreeMap<Species, f64> {
        let mut loads: BTreeMap<Species, f64> = Species::ALL.into_iter().map(|s| (s, 0.0)).collect();
        for (&c, totals) in &by_class {
            let class = BurnClass::from_four_class(c).unwrap_or(BurnClass::NoData);
            let (Some(table), Some(v)) = (config.contaminants.for_class(class), totals.get(&fire_year)) else {
                continue;
            };
            for (species, kg) in table.load_kg(v[0]) {
                *loads.entry(species).or_insert(0.0) += kg;
            }
        }
        loads
    };

    let fire_years = all.len();
    let return_periods = return_periods(&annuals, |r| r.return_interval, &config.recurrence, fire_years)
        .into_iter()
        .map(|rp| ReturnPeriodRow {
            recurrence: rp.recurrence,
            rank: rp.rank,
            row: rp.row.map(|annual| WatershedReturnRow {
                reservoir: config.reservoir.overlay(annual.water),
                contaminants_kg: contaminant_load(annual.fire_year),
                annual,
            }),
        })
        .collect();

    let daily = daily
        .into_iter()
        .map(|((fire_year, year, month, day), [water, wind])| WatershedDay {
            fire_year,
            year,
            month,
            day,
            water,
            wind,
            ash: water + wind,
        })
        .collect();

    if !missing.is_empty() {
        warn!(missing = missing.len(), "hillslopes missing from aggregation");
    }
    info!(aggregated, fire_years, "watershed aggregation finished");

    WatershedSummary {
        fire_years,
        hillslopes_aggregated: aggregated,
        missing_hillslopes: missing,
        daily,
        annuals,
        by_burn_class,
        return_periods,
        burnclass_summary: burnclass_summary(hillslopes),
    }
}

/// Read `H{wepp_id}_ash.parquet` for every simulated hillslope in `run_dir`.
/// Unreadable series are skipped; aggregation reports them as missing.
pub fn load_series(run_dir: &Path, hillslopes: &[ResolvedHillslope]) -> BTreeMap<String, Vec<AshDay>> {
    hillslopes
        .par_iter()
        .filter(|h| h.is_simulated())
        .filter_map(|h| {
            let path = run_dir.join(OutputNames::new(h.wepp_id).series());
            match read_ash_parquet(&path) {
                Ok(days) => Some((h.topaz_id.clone(), days)),
                Err(e) => {
                    warn!(topaz_id = %h.topaz_id, error = %e, "hillslope series unavailable");
                    None
                }
            }
        })
        .collect()
}

/// Write every watershed output; returns the paths written.
pub fn write_outputs(out: &dyn OutputSink, summary: &WatershedSummary) -> Result<Vec<PathBuf>> {
    let mut written = vec![
        out.write_csv(ANNUALS_CSV, &summary.annuals)?,
        out.write_csv(DAILY_CSV, &summary.daily)?,
    ];
    for (&class, rows) in &summary.by_burn_class {
        written.push(out.write_csv(&burn_class_annuals_csv(class), rows)?);
    }
    written.push(out.write_json(RETURN_PERIODS_JSON, &summary.return_periods)?);
    written.push(out.write_json(BURNCLASS_SUMMARY_JSON, &summary.burnclass_summary)?);
    written.push(out.write_json(SUMMARY_JSON, summary)?);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ash::params::AshType;
    use crate::context::RunDirectory;
    use approx::assert_relative_eq;

    fn hs(topaz: &str, wepp_id: u32, area: f64, class: BurnClass, ash: Option<AshType>) -> ResolvedHillslope {
        ResolvedHillslope {
            topaz_id: topaz.to_string(),
            wepp_id,
            area_ha: area,
            slope: 0.1,
            burn_class: class,
            ash_type: ash,
            ini_ash_depth: 5.0,
            ini_ash_load: 10.0,
            ash_bulk_density: 0.31,
        }
    }

    fn day(fire_year: i32, offset: u32, water: f64, cum_water: f64) -> AshDay {
        AshDay {
            fire_year,
            year: fire_year,
            month: 8,
            day: 1 + offset,
            days_from_fire: offset,
            water_transport: water,
            ash_transport: water,
            cum_water_transport: cum_water,
            cum_ash_transport: cum_water,
            ..AshDay::default()
        }
    }

    fn config() -> AggregationConfig {
        AggregationConfig {
            recurrence: vec![2.0],
            reservoir: Reservoir {
                capacity_m3: 100.0,
                storage_fraction: 0.5,
                bulk_density: 1.0,
            },
            contaminants: ContaminantTables::default(),
        }
    }

    fn inputs() -> (Vec<ResolvedHillslope>, BTreeMap<String, Vec<AshDay>>) {
        let hillslopes = vec![
            hs("11", 1, 2.0, BurnClass::High, Some(AshType::White)),
            hs("12", 2, 3.0, BurnClass::Moderate, Some(AshType::Black)),
            hs("13", 3, 5.0, BurnClass::Unburned, None),
            hs("14", 4, 1.0, BurnClass::NoData, None),
            hs("15", 5, 1.0, BurnClass::High, Some(AshType::White)),
        ];
        let mut series = BTreeMap::new();
        series.insert(
            "11".to_string(),
            vec![day(2001, 0, 0.0, 0.0), day(2001, 1, 4.0, 4.0), day(2002, 0, 0.0, 0.0), day(2002, 1, 1.0, 1.0)],
        );
        series.insert(
            "12".to_string(),
            vec![day(2001, 0, 0.0, 0.0), day(2001, 1, 2.0, 2.0), day(2002, 0, 0.0, 0.0), day(2002, 1, 10.0, 10.0)],
        );
        (hillslopes, series)
    }

    #[test]
    fn totals_scale_by_area() {
        let (hillslopes, series) = inputs();
        let summary = aggregate(&hillslopes, &series, &config());
        assert_eq!(summary.fire_years, 2);
        assert_eq!(summary.hillslopes_aggregated, 2);
        assert_eq!(summary.missing_hillslopes, vec!["15".to_string()]);

        // 2001: 4·2 + 2·3 = 14; 2002: 1·2 + 10·3 = 32
        assert_eq!(summary.annuals[0].fire_year, 2002);
        assert_relative_eq!(summary.annuals[0].water, 32.0);
        assert_relative_eq!(summary.annuals[1].water, 14.0);
        assert_relative_eq!(summary.annuals[0].return_interval, 3.0);

        let day2 = summary.daily.iter().find(|d| d.fire_year == 2001 && d.day == 2).unwrap();
        assert_relative_eq!(day2.water, 14.0);
    }

    #[test]
    fn per_class_files_and_reservoir() {
        let (hillslopes, series) = inputs();
        let summary = aggregate(&hillslopes, &series, &config());
        assert_eq!(summary.by_burn_class.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
        assert_relative_eq!(summary.by_burn_class[&3][0].water, 8.0);
        // 32 t at 1 t/m³ against 50 m³ available
        assert_relative_eq!(summary.annuals[0].reservoir_remaining_m3, 18.0);
        assert!(!summary.annuals[0].reservoir_full);
    }

    #[test]
    fn return_rows_carry_contaminants() {
        let (hillslopes, series) = inputs();
        let cfg = config();
        let summary = aggregate(&hillslopes, &series, &cfg);
        let rp = &summary.return_periods[0];
        assert_eq!(rp.rank, Some(1));
        let row = rp.row.as_ref().unwrap();
        assert_eq!(row.annual.fire_year, 2002);
        // 2 t from high severity, 30 t from moderate
        let expect = 2.0 * cfg.contaminants.high.get(Species::Ca) / 1000.0
            + 30.0 * cfg.contaminants.moderate.get(Species::Ca) / 1000.0;
        assert_relative_eq!(row.contaminants_kg[&Species::Ca], expect);
    }

    #[test]
    fn burnclass_summary_folds_nodata_into_unburned() {
        let (hillslopes, _) = inputs();
        let summary = burnclass_summary(&hillslopes);
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[0].hillslopes, 2);
        assert_relative_eq!(summary[0].area_ha, 6.0);
        assert_relative_eq!(summary[3].area_ha, 3.0);
        assert_relative_eq!(summary.iter().map(|c| c.fraction).sum::<f64>(), 1.0);
    }

    #[test]
    fn outputs_written_and_series_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunDirectory::new(dir.path()).unwrap();
        let (hillslopes, series) = inputs();
        for h in &hillslopes {
            if let Some(days) = series.get(&h.topaz_id) {
                out.write_series(&OutputNames::new(h.wepp_id).series(), days).unwrap();
            }
        }
        let loaded = load_series(dir.path(), &hillslopes);
        assert_eq!(loaded, series);

        let summary = aggregate(&hillslopes, &loaded, &config());
        let written = write_outputs(&out, &summary).unwrap();
        assert!(written.iter().all(|p| p.exists()));
        assert!(dir.path().join(ANNUALS_CSV).exists());
        assert!(dir.path().join(burn_class_annuals_csv(3)).exists());
        let text = std::fs::read_to_string(dir.path().join(ANNUALS_CSV)).unwrap();
        assert!(text.starts_with("rank,fire_year,cum_water_transport (tonne)"));
    }
}
