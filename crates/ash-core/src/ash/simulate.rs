//! Daily hillslope ash transport.
//!
//! One fire run starts on the fire day and steps forward one day at a time:
//!   1. Compact the ash layer from cumulative infiltration.
//!   2. Water transport when runoff overtops the ash layer's pore space.
//!   3. Otherwise, on a dry day, wind transport on a threshold-crossing wind.
//!   4. Decompose what is left with infiltration.
//! until the transportable layer is gone, the record ends, or the model
//! horizon is reached. Every fire year in the record gets its own run.

use serde::Serialize;
use tracing::{debug, warn};

use super::frame::{FireDate, ModelFrame};
use super::params::{AshParameterSet, ModelVariant, WaterClosure, WindTransportMode};
use super::wind;
use crate::error::{AshError, Result};

/// Relative tolerance of the daily mass balance check.
pub const MASS_BALANCE_TOL: f64 = 1e-6;
/// Slack allowed on porosity and bulk density bounds.
const BOUND_EPS: f64 = 1e-12;

/// `(ash_depth_mm, transportable_tonspha)` for a remaining load.
///
/// Depth is `remaining / (10 · bulk_density)`; the bottom `roughness_limit`
/// mm is held in surface roughness.
pub fn calc_transportable_ash(remaining_tonspha: f64, bulk_density: f64, roughness_limit: f64) -> (f64, f64) {
    let remaining_mm = remaining_tonspha / (10.0 * bulk_density);
    let transportable_mm = (remaining_mm - roughness_limit).max(0.0);
    (remaining_mm, transportable_mm * (10.0 * bulk_density))
}

/// One simulated day.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AshDay {
    /// Calendar year of the fire this day belongs to.
    pub fire_year: i32,
    /// Days since the fire; 0 on the fire day.
    pub days_from_fire: u32,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub julian: u32,
    pub precip_mm: f64,
    pub rainmelt_mm: f64,
    pub runoff_mm: f64,
    pub soil_water_mm: f64,
    pub snow_water_mm: f64,
    pub infil_mm: f64,
    pub cum_infil_mm: f64,
    pub peak_wind: f64,
    /// Highest wind seen since the fire, today included.
    pub max_wind: f64,
    pub bulk_density: f64,
    pub porosity: f64,
    pub ash_depth_mm: f64,
    pub remaining_ash: f64,
    pub transportable_ash: f64,
    pub ash_runoff_mm: f64,
    pub cum_ash_runoff_mm: f64,
    pub transport_rate: f64,
    pub water_transport: f64,
    pub wind_transport: f64,
    pub ash_transport: f64,
    pub ash_decomp: f64,
    pub cum_water_transport: f64,
    pub cum_wind_transport: f64,
    pub cum_ash_transport: f64,
    pub cum_ash_decomp: f64,
    pub peak_ro: Option<f64>,
    pub eff_duration: Option<f64>,
}

/// Why a fire run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The transportable layer reached zero.
    Depleted,
    /// The record ended with transportable ash left.
    ClimateExhausted,
    /// The legacy model's horizon was reached.
    HorizonReached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FireRun {
    pub fire_year: i32,
    pub start_index: usize,
    pub termination: Termination,
    pub days: Vec<AshDay>,
}

impl FireRun {
    pub fn last(&self) -> Option<&AshDay> {
        self.days.last()
    }

    /// Cumulative ash moved by water and wind over the run.
    pub fn total_transport(&self) -> f64 {
        self.last().map_or(0.0, |d| d.cum_ash_transport)
    }
}

/// All fire runs of one hillslope.
#[derive(Debug, Clone, PartialEq)]
pub struct AshSimulation {
    pub runs: Vec<FireRun>,
    /// Days in the model record, used by the Weibull estimator.
    pub record_days: usize,
}

impl AshSimulation {
    /// Every simulated day, runs concatenated in fire-year order.
    pub fn days(&self) -> impl Iterator<Item = &AshDay> {
        self.runs.iter().flat_map(|r| r.days.iter())
    }

    pub fn fire_years(&self) -> usize {
        self.runs.len()
    }

    pub fn depleted_runs(&self) -> usize {
        self.runs.iter().filter(|r| r.termination == Termination::Depleted).count()
    }
}

pub struct AshTransportModel {
    params: AshParameterSet,
    ini_ash_load: f64,
    model: ModelVariant,
    wind_mode: WindTransportMode,
}

impl AshTransportModel {
    pub fn new(params: AshParameterSet, ini_ash_load: f64, model: ModelVariant, wind_mode: WindTransportMode) -> Result<Self> {
        params.validate()?;
        if !ini_ash_load.is_finite() || ini_ash_load <= 0.0 {
            return Err(AshError::config("ini_ash_load", ini_ash_load, "must be positive for a burned hillslope"));
        }
        Ok(Self {
            params,
            ini_ash_load,
            model,
            wind_mode,
        })
    }

    pub fn params(&self) -> &AshParameterSet {
        &self.params
    }

    pub fn ini_ash_load(&self) -> f64 {
        self.ini_ash_load
    }

    /// Run one fire for every year in which the fire date occurs.
    pub fn run(&self, frame: &ModelFrame, fire: FireDate) -> Result<AshSimulation> {
        let starts = frame.fire_starts(fire);
        if starts.is_empty() {
            return Err(AshError::InvalidArgument(format!("fire date {fire} does not occur in the model record")));
        }
        let runs = starts
            .into_iter()
            .map(|(year, start)| self.run_until_exhausted(frame, year, start))
            .collect::<Result<Vec<_>>>()?;
        Ok(AshSimulation {
            runs,
            record_days: frame.len(),
        })
    }

    /// Single fire starting at `frame.days[start_index]`.
    pub fn run_until_exhausted(&self, frame: &ModelFrame, fire_year: i32, start_index: usize) -> Result<FireRun> {
        let record = frame.days.get(start_index..).unwrap_or(&[]);
        let Some(fire_day) = record.first() else {
            return Err(AshError::InvalidArgument(format!(
                "fire start index {start_index} outside record of {} days",
                frame.len()
            )));
        };
        let p = &self.params;
        let n_days = match self.model.horizon_days() {
            Some(h) => record.len().min(h + 1),
            None => record.len(),
        };

        let ini_bd = p.ini_bulk_den;
        let ini_porosity = p.porosity(ini_bd);
        check_porosity(0, ini_porosity)?;
        let (depth0, transportable0) = calc_transportable_ash(self.ini_ash_load, ini_bd, p.roughness_limit);
        let infil0 = fire_day.infil_mm();

        let mut days = Vec::with_capacity(n_days.min(4096));
        days.push(AshDay {
            fire_year,
            days_from_fire: 0,
            year: fire_day.year,
            month: fire_day.month,
            day: fire_day.day,
            julian: fire_day.julian,
            precip_mm: fire_day.precip_mm,
            rainmelt_mm: fire_day.rainmelt_mm,
            runoff_mm: fire_day.runoff_mm,
            soil_water_mm: fire_day.soil_water_mm,
            snow_water_mm: fire_day.snow_water_mm,
            infil_mm: infil0,
            cum_infil_mm: infil0,
            peak_wind: fire_day.peak_wind,
            max_wind: fire_day.peak_wind,
            bulk_density: ini_bd,
            porosity: ini_porosity,
            ash_depth_mm: depth0,
            remaining_ash: self.ini_ash_load,
            transportable_ash: transportable0,
            ash_runoff_mm: 0.0,
            cum_ash_runoff_mm: 0.0,
            transport_rate: 0.0,
            water_transport: 0.0,
            wind_transport: 0.0,
            ash_transport: 0.0,
            ash_decomp: 0.0,
            cum_water_transport: 0.0,
            cum_wind_transport: 0.0,
            cum_ash_transport: 0.0,
            cum_ash_decomp: 0.0,
            peak_ro: fire_day.peak_ro,
            eff_duration: fire_day.eff_duration,
        });

        let mut i = 1;
        while i < n_days {
            let prev = &days[i - 1];
            if prev.transportable_ash <= 0.0 {
                break;
            }
            let today = &record[i];

            // ── Compaction ──────────────────────────────────────────────────
            let infil = today.infil_mm();
            let cum_infil = prev.cum_infil_mm + infil;
            let bulk_density = p.bulk_density(cum_infil);
            let porosity = p.porosity(bulk_density);
            check_porosity(i, porosity)?;
            if bulk_density < ini_bd - BOUND_EPS || bulk_density > p.fin_bulk_den + BOUND_EPS {
                return Err(AshError::Invariant {
                    day: i,
                    detail: format!("bulk density {bulk_density} outside [{ini_bd}, {}]", p.fin_bulk_den),
                });
            }

            // ── Water / wind transport ──────────────────────────────────────
            let runoff = today.runoff_mm;
            let capacity = prev.ash_depth_mm * porosity;
            let mut ash_runoff = 0.0;
            let mut transport_rate = 0.0;
            let mut water = 0.0;
            let mut wind_moved = 0.0;
            let max_before = prev.max_wind;
            let max_wind = max_before.max(today.peak_wind);

            if runoff > capacity {
                ash_runoff = runoff - capacity;
                transport_rate = match p.water_closure {
                    WaterClosure::BulkDensityInterpolated => p.interpolated_rate(bulk_density),
                    WaterClosure::ExponentialRunoffDecay { k } => p.ini_erod * (k * prev.cum_ash_runoff_mm).exp(),
                    WaterClosure::Linear => p.ini_erod,
                };
                water = (ash_runoff * transport_rate).clamp(0.0, prev.remaining_ash);
            } else if runoff == 0.0 && p.run_wind_transport {
                wind_moved = match self.wind_mode {
                    WindTransportMode::PeakRecord if today.peak_wind > max_before => {
                        prev.remaining_ash * wind::lookup(today.peak_wind, p.ash_type)
                    }
                    WindTransportMode::PeakRecord => 0.0,
                    WindTransportMode::CumulativeProportion => {
                        self.ini_ash_load * wind::lookup(max_wind, p.ash_type) - prev.cum_wind_transport
                    }
                }
                .clamp(0.0, prev.remaining_ash);
            }

            if water * wind_moved != 0.0 {
                return Err(AshError::Invariant {
                    day: i,
                    detail: format!("water ({water}) and wind ({wind_moved}) transport on the same day"),
                });
            }

            // ── Decomposition and state update ──────────────────────────────
            let pre_decomp = (prev.remaining_ash - (water + wind_moved)).max(0.0);
            let decomp = (pre_decomp * (1.0 - (-p.decomp_fac * infil).exp())).clamp(0.0, pre_decomp);
            let remaining = (prev.remaining_ash - decomp - water - wind_moved).max(0.0);
            let (ash_depth, transportable) = calc_transportable_ash(remaining, bulk_density, p.roughness_limit);

            let cum_water = prev.cum_water_transport + water;
            let cum_wind = prev.cum_wind_transport + wind_moved;
            let cum_decomp = prev.cum_ash_decomp + decomp;
            let drift = (self.ini_ash_load - remaining) - (cum_water + cum_wind + cum_decomp);
            if drift.abs() > MASS_BALANCE_TOL * self.ini_ash_load {
                return Err(AshError::Invariant {
                    day: i,
                    detail: format!("mass balance drift {drift:e} t/ha"),
                });
            }

            days.push(AshDay {
                fire_year,
                days_from_fire: i as u32,
                year: today.year,
                month: today.month,
                day: today.day,
                julian: today.julian,
                precip_mm: today.precip_mm,
                rainmelt_mm: today.rainmelt_mm,
                runoff_mm: runoff,
                soil_water_mm: today.soil_water_mm,
                snow_water_mm: today.snow_water_mm,
                infil_mm: infil,
                cum_infil_mm: cum_infil,
                peak_wind: today.peak_wind,
                max_wind,
                bulk_density,
                porosity,
                ash_depth_mm: ash_depth,
                remaining_ash: remaining,
                transportable_ash: transportable,
                ash_runoff_mm: ash_runoff,
                cum_ash_runoff_mm: prev.cum_ash_runoff_mm + ash_runoff,
                transport_rate,
                water_transport: water,
                wind_transport: wind_moved,
                ash_transport: water + wind_moved,
                ash_decomp: decomp,
                cum_water_transport: cum_water,
                cum_wind_transport: cum_wind,
                cum_ash_transport: cum_water + cum_wind,
                cum_ash_decomp: cum_decomp,
                peak_ro: today.peak_ro,
                eff_duration: today.eff_duration,
            });
            i += 1;
        }

        let depleted = days.last().is_some_and(|d| d.transportable_ash <= 0.0);
        let termination = if depleted {
            Termination::Depleted
        } else if n_days < record.len() {
            Termination::HorizonReached
        } else {
            Termination::ClimateExhausted
        };
        match termination {
            Termination::ClimateExhausted => warn!(
                fire_year,
                days = days.len(),
                remaining = days.last().map_or(0.0, |d| d.transportable_ash),
                "climate record exhausted before ash depleted"
            ),
            _ => debug!(fire_year, days = days.len(), ?termination, "fire run finished"),
        }

        Ok(FireRun {
            fire_year,
            start_index,
            termination,
            days,
        })
    }
}

fn check_porosity(day: usize, porosity: f64) -> Result<()> {
    if !(-BOUND_EPS..=1.0 + BOUND_EPS).contains(&porosity) {
        return Err(AshError::Invariant {
            day,
            detail: format!("porosity {porosity} outside [0, 1]"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ash::frame::{julian_day, ModelDay};
    use crate::ash::params::AshType;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn day(year: i32, month: u32, d: u32, rm: f64, q: f64, wind: f64) -> ModelDay {
        ModelDay {
            year,
            month,
            day: d,
            julian: julian_day(year, month, d).unwrap(),
            precip_mm: rm,
            rainmelt_mm: rm,
            runoff_mm: q,
            soil_water_mm: 0.0,
            snow_water_mm: 0.0,
            peak_wind: wind,
            peak_ro: None,
            eff_duration: None,
        }
    }

    fn model(ash_type: AshType, load: f64) -> AshTransportModel {
        AshTransportModel::new(
            AshParameterSet::for_type(ash_type),
            load,
            ModelVariant::Anu,
            WindTransportMode::PeakRecord,
        )
        .unwrap()
    }

    /// Deterministic multi-year record with storms, dry windy spells and snowmelt.
    fn synthetic_record(years: i32) -> ModelFrame {
        let mut days = Vec::new();
        let mut state: u64 = 0x2545_F491_4F6C_DD1D;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 10_000) as f64 / 10_000.0
        };
        for year in 2001..2001 + years {
            for julian in 1..=365u32 {
                let date = chrono::NaiveDate::from_yo_opt(year, julian).unwrap();
                let r = next();
                let (rm, q) = if r < 0.70 {
                    (0.0, 0.0)
                } else if r < 0.92 {
                    (r * 20.0, 0.0)
                } else {
                    let rm = r * 60.0;
                    (rm, rm * next() * 0.6)
                };
                let wind = next() * 22.0;
                days.push(day(year, chrono::Datelike::month(&date), chrono::Datelike::day(&date), rm, q, wind));
            }
        }
        ModelFrame { days }
    }

    #[test]
    fn transportable_ash_subtracts_roughness_layer() {
        let (depth, t) = calc_transportable_ash(10.0, 0.31, 1.0);
        assert_relative_eq!(depth, 10.0 / 3.1);
        assert_relative_eq!(t, 6.9, epsilon = 1e-12);
        let (_, all) = calc_transportable_ash(10.0, 0.31, 0.0);
        assert_relative_eq!(all, 10.0);
        let (_, none) = calc_transportable_ash(1.0, 0.31, 1.0);
        assert_eq!(none, 0.0);
    }

    #[test]
    fn minimal_fire_day() {
        let frame = ModelFrame { days: vec![day(2001, 8, 1, 0.0, 0.0, 0.0)] };
        let run = model(AshType::White, 10.0).run_until_exhausted(&frame, 2001, 0).unwrap();
        assert_eq!(run.days.len(), 1);
        let d0 = &run.days[0];
        assert_eq!(d0.remaining_ash, 10.0);
        assert_eq!(d0.water_transport, 0.0);
        assert_eq!(d0.wind_transport, 0.0);
        assert_eq!(d0.ash_decomp, 0.0);
        assert_relative_eq!(d0.transportable_ash, 6.9, epsilon = 1e-12);
        assert_eq!(run.termination, Termination::ClimateExhausted);
    }

    #[test]
    fn runoff_below_pore_capacity_only_decomposes() {
        let frame = ModelFrame {
            days: vec![day(2001, 8, 1, 0.0, 0.0, 0.0), day(2001, 8, 2, 12.0, 2.0, 0.0)],
        };
        let run = model(AshType::White, 10.0).run_until_exhausted(&frame, 2001, 0).unwrap();
        let d1 = &run.days[1];
        assert_relative_eq!(run.days[0].ash_depth_mm, 3.2258, epsilon = 1e-4);
        assert_relative_eq!(d1.porosity, 0.7291, epsilon = 1e-4);
        assert_eq!(d1.ash_runoff_mm, 0.0);
        assert_eq!(d1.water_transport, 0.0);
        assert_eq!(d1.wind_transport, 0.0);
        assert_relative_eq!(d1.ash_decomp, 10.0 * (1.0 - (-1.8e-4 * 10.0f64).exp()), epsilon = 1e-12);
        assert_relative_eq!(d1.remaining_ash + d1.ash_decomp, 10.0, epsilon = 1e-12);
    }

    #[test]
    fn overtopping_runoff_moves_ash() {
        let frame = ModelFrame {
            days: vec![day(2001, 8, 1, 0.0, 0.0, 0.0), day(2001, 8, 2, 30.0, 20.0, 0.0)],
        };
        let run = model(AshType::White, 10.0).run_until_exhausted(&frame, 2001, 0).unwrap();
        let d1 = &run.days[1];
        let bd = 0.62 - 0.31 * (-0.05f64).exp();
        let porosity = 1.0 - bd / 1.2;
        assert_relative_eq!(d1.bulk_density, bd, epsilon = 1e-12);
        assert_relative_eq!(d1.ash_runoff_mm, 20.0 - (10.0 / 3.1) * porosity, epsilon = 1e-9);
        assert_eq!(d1.water_transport, 10.0, "transport is capped by the remaining load");
        assert_eq!(d1.remaining_ash, 0.0);
        assert_eq!(run.termination, Termination::Depleted);
    }

    #[test]
    fn new_wind_record_on_dry_day_moves_ash() {
        let frame = ModelFrame {
            days: vec![
                day(2001, 8, 1, 0.0, 0.0, 5.0),
                day(2001, 8, 2, 0.0, 0.0, 4.0),
                day(2001, 8, 3, 0.0, 0.0, 10.0),
                day(2001, 8, 4, 0.0, 0.0, 10.0),
            ],
        };
        let run = model(AshType::White, 50.0).run_until_exhausted(&frame, 2001, 0).unwrap();
        assert_eq!(run.days[1].wind_transport, 0.0, "below fire-day wind");
        assert_relative_eq!(run.days[2].wind_transport, 50.0 * 0.24);
        assert_eq!(run.days[3].wind_transport, 0.0, "equal to record is not a new record");
    }

    #[test]
    fn wind_disabled_moves_nothing() {
        let mut params = AshParameterSet::white();
        params.run_wind_transport = false;
        let m = AshTransportModel::new(params, 50.0, ModelVariant::Anu, WindTransportMode::PeakRecord).unwrap();
        let frame = ModelFrame {
            days: vec![day(2001, 8, 1, 0.0, 0.0, 0.0), day(2001, 8, 2, 0.0, 0.0, 25.0)],
        };
        let run = m.run_until_exhausted(&frame, 2001, 0).unwrap();
        assert_eq!(run.days[1].wind_transport, 0.0);
    }

    #[test]
    fn zero_load_and_reversed_compaction_refused() {
        let err = AshTransportModel::new(AshParameterSet::white(), 0.0, ModelVariant::Anu, WindTransportMode::PeakRecord);
        assert!(matches!(err, Err(AshError::InvalidConfig { .. })));
        let mut p = AshParameterSet::black();
        p.fin_bulk_den = 0.1;
        let err = AshTransportModel::new(p, 10.0, ModelVariant::Anu, WindTransportMode::PeakRecord);
        assert!(matches!(err, Err(AshError::InvalidConfig { .. })));
    }

    #[test]
    fn runs_once_per_fire_year() {
        let frame = synthetic_record(3);
        let sim = model(AshType::Black, 20.0).run(&frame, "6/15".parse().unwrap()).unwrap();
        assert_eq!(sim.fire_years(), 3);
        assert_eq!(sim.record_days, 365 * 3);
        assert_eq!(sim.runs[2].fire_year, 2003);
        for run in &sim.runs {
            assert_eq!((run.days[0].month, run.days[0].day), (6, 15));
            assert_eq!(run.days[0].cum_ash_transport, 0.0);
        }
        assert!(model(AshType::Black, 20.0).run(&frame, "2/29".parse().unwrap()).is_err());
    }

    fn check_invariants(sim: &AshSimulation, params: &AshParameterSet, load: f64) {
        for run in &sim.runs {
            let mut prev_bd = params.ini_bulk_den;
            let mut prev_cum_infil = f64::NEG_INFINITY;
            for (i, d) in run.days.iter().enumerate() {
                assert_abs_diff_eq!(
                    load - d.remaining_ash,
                    d.cum_water_transport + d.cum_wind_transport + d.cum_ash_decomp,
                    epsilon = 1e-6 * load
                );
                assert!(d.transportable_ash <= d.remaining_ash + 1e-12);
                let (_, expect) = calc_transportable_ash(d.remaining_ash, d.bulk_density, params.roughness_limit);
                assert_abs_diff_eq!(d.transportable_ash, expect, epsilon = 1e-12);
                assert_eq!(d.water_transport * d.wind_transport, 0.0, "day {i}");
                assert!((0.0..=1.0).contains(&d.porosity));
                assert!(d.bulk_density >= params.ini_bulk_den - 1e-12 && d.bulk_density <= params.fin_bulk_den + 1e-12);
                assert!(d.cum_infil_mm >= prev_cum_infil);
                assert!(d.bulk_density >= prev_bd - 1e-12);
                assert!(d.remaining_ash >= 0.0);
                assert!(d.ash_runoff_mm >= 0.0);
                prev_bd = d.bulk_density;
                prev_cum_infil = d.cum_infil_mm;
            }
        }
    }

    #[test]
    fn invariants_hold_over_multi_year_record() {
        let frame = synthetic_record(6);
        let fire: FireDate = "7/20".parse().unwrap();
        for model_variant in [ModelVariant::Anu, ModelVariant::Neris] {
            for ash_type in [AshType::Black, AshType::White] {
                let params = AshParameterSet::for_model(ash_type, model_variant);
                let m = AshTransportModel::new(params.clone(), 35.0, model_variant, model_variant.default_wind_mode()).unwrap();
                let sim = m.run(&frame, fire).unwrap();
                assert_eq!(sim.fire_years(), 6);
                check_invariants(&sim, &params, 35.0);
                if model_variant == ModelVariant::Neris {
                    assert!(sim.runs.iter().all(|r| r.days.len() <= 366));
                }
            }
        }
    }

    #[test]
    fn cumulative_proportion_wind_tracks_table() {
        let m = AshTransportModel::new(
            AshParameterSet::for_model(AshType::White, ModelVariant::Neris),
            100.0,
            ModelVariant::Neris,
            WindTransportMode::CumulativeProportion,
        )
        .unwrap();
        let frame = ModelFrame {
            days: vec![
                day(2001, 8, 1, 0.0, 0.0, 0.0),
                day(2001, 8, 2, 0.0, 0.0, 6.0),
                day(2001, 8, 3, 0.0, 0.0, 10.0),
                day(2001, 8, 4, 0.0, 0.0, 3.0),
            ],
        };
        let run = m.run_until_exhausted(&frame, 2001, 0).unwrap();
        assert_relative_eq!(run.days[1].cum_wind_transport, 100.0 * 0.08);
        assert_relative_eq!(run.days[2].cum_wind_transport, 100.0 * 0.24);
        assert_eq!(run.days[3].wind_transport, 0.0);
    }

    #[test]
    fn legacy_horizon_caps_run() {
        let mut days = Vec::new();
        for julian in 1..=365u32 {
            let date = chrono::NaiveDate::from_yo_opt(2001, julian).unwrap();
            days.push(day(2001, chrono::Datelike::month(&date), chrono::Datelike::day(&date), 0.0, 0.0, 0.0));
        }
        for julian in 1..=365u32 {
            let date = chrono::NaiveDate::from_yo_opt(2002, julian).unwrap();
            days.push(day(2002, chrono::Datelike::month(&date), chrono::Datelike::day(&date), 0.0, 0.0, 0.0));
        }
        let frame = ModelFrame { days };
        let m = AshTransportModel::new(
            AshParameterSet::for_model(AshType::Black, ModelVariant::Neris),
            30.0,
            ModelVariant::Neris,
            WindTransportMode::CumulativeProportion,
        )
        .unwrap();
        let run = m.run_until_exhausted(&frame, 2001, 0).unwrap();
        assert_eq!(run.days.len(), 366);
        assert_eq!(run.termination, Termination::HorizonReached);
    }
}
