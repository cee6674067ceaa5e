//! Ranked event and annual frames, and recurrence-interval lookups.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ash::simulate::AshDay;
use crate::stats::{allocate_recurrence, event_interval_years, rank_descending, weibull_interval};

/// Which transport series a frame is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measure {
    Water,
    Wind,
    Ash,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Water, Measure::Wind, Measure::Ash];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Water => "water",
            Self::Wind => "wind",
            Self::Ash => "ash",
        }
    }

    pub fn daily(self, d: &AshDay) -> f64 {
        match self {
            Self::Water => d.water_transport,
            Self::Wind => d.wind_transport,
            Self::Ash => d.ash_transport,
        }
    }

    pub fn cumulative(self, d: &AshDay) -> f64 {
        match self {
            Self::Water => d.cum_water_transport,
            Self::Wind => d.cum_wind_transport,
            Self::Ash => d.cum_ash_transport,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub rank: usize,
    pub fire_year: i32,
    pub year: i32,
    #[serde(rename = "mo")]
    pub month: u32,
    #[serde(rename = "da")]
    pub day: u32,
    pub days_from_fire: u32,
    #[serde(rename = "transport (tonne/ha)")]
    pub transport: f64,
    #[serde(rename = "cum_transport (tonne/ha)")]
    pub cum_transport: f64,
    #[serde(rename = "return_interval (yr)")]
    pub return_interval: f64,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualRow {
    pub rank: usize,
    pub fire_year: i32,
    #[serde(rename = "cum_transport (tonne/ha)")]
    pub cum_transport: f64,
    #[serde(rename = "return_interval (yr)")]
    pub return_interval: f64,
    pub probability: f64,
    pub days_simulated: usize,
}

/// Row allocated to one recurrence interval; `row` is `None` when no
/// distinct row meets the interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnPeriodRow<T> {
    #[serde(rename = "recurrence (yr)")]
    pub recurrence: f64,
    pub rank: Option<usize>,
    pub row: Option<T>,
}

/// Days with nonzero transport, ranked descending.
pub fn event_frame<'a, I>(days: I, record_days: usize, measure: Measure) -> Vec<EventRow>
where
    I: IntoIterator<Item = &'a AshDay>,
{
    let events: Vec<&AshDay> = days.into_iter().filter(|d| measure.daily(d) > 0.0).collect();
    rank_descending(events, |d| measure.daily(d), |k| event_interval_years(record_days, k))
        .into_iter()
        .map(|r| EventRow {
            rank: r.rank,
            fire_year: r.item.fire_year,
            year: r.item.year,
            month: r.item.month,
            day: r.item.day,
            days_from_fire: r.item.days_from_fire,
            transport: measure.daily(r.item),
            cum_transport: measure.cumulative(r.item),
            return_interval: r.return_interval,
            probability: r.probability,
        })
        .collect()
}

/// One row per fire year holding the cumulative total at the end of that
/// fire's run, ranked descending.
pub fn annual_frame<'a, I>(days: I, measure: Measure) -> Vec<AnnualRow>
where
    I: IntoIterator<Item = &'a AshDay>,
{
    let mut per_year: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for d in days {
        let entry = per_year.entry(d.fire_year).or_insert((0.0, 0));
        entry.0 = measure.cumulative(d);
        entry.1 += 1;
    }
    let n = per_year.len();
    rank_descending(per_year.into_iter().collect(), |(_, (total, _))| *total, |k| weibull_interval(n, k))
        .into_iter()
        .map(|r| {
            let (fire_year, (cum_transport, days_simulated)) = r.item;
            AnnualRow {
                rank: r.rank,
                fire_year,
                cum_transport,
                return_interval: r.return_interval,
                probability: r.probability,
                days_simulated,
            }
        })
        .collect()
}

/// Allocate rows to each target that does not exceed `fire_years`.
pub fn return_periods<T, F>(rows: &[T], interval: F, targets: &[f64], fire_years: usize) -> Vec<ReturnPeriodRow<T>>
where
    T: Clone,
    F: Fn(&T) -> f64,
{
    let targets: Vec<f64> = targets
        .iter()
        .copied()
        .filter(|&t| t <= fire_years as f64)
        .collect();
    let intervals: Vec<f64> = rows.iter().map(&interval).collect();
    allocate_recurrence(&intervals, &targets)
        .into_iter()
        .map(|(recurrence, rank)| ReturnPeriodRow {
            recurrence,
            rank,
            row: rank.and_then(|k| rows.get(k - 1).cloned()),
        })
        .collect()
}

/// Post-processed statistics for one hillslope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HillslopeStats {
    pub fire_years: usize,
    pub record_days: usize,
    pub events: BTreeMap<Measure, Vec<EventRow>>,
    pub annuals: BTreeMap<Measure, Vec<AnnualRow>>,
    pub event_return_periods: BTreeMap<Measure, Vec<ReturnPeriodRow<EventRow>>>,
    pub annual_return_periods: BTreeMap<Measure, Vec<ReturnPeriodRow<AnnualRow>>>,
}

impl HillslopeStats {
    pub fn compute(days: &[AshDay], record_days: usize, recurrence: &[f64]) -> Self {
        let fire_years = {
            let mut years: Vec<i32> = days.iter().map(|d| d.fire_year).collect();
            years.dedup();
            years.len()
        };
        let mut stats = Self {
            fire_years,
            record_days,
            events: BTreeMap::new(),
            annuals: BTreeMap::new(),
            event_return_periods: BTreeMap::new(),
            annual_return_periods: BTreeMap::new(),
        };
        for measure in Measure::ALL {
            let events = event_frame(days, record_days, measure);
            let annuals = annual_frame(days, measure);
            stats
                .event_return_periods
                .insert(measure, return_periods(&events, |r| r.return_interval, recurrence, fire_years));
            stats
                .annual_return_periods
                .insert(measure, return_periods(&annuals, |r| r.return_interval, recurrence, fire_years));
            stats.events.insert(measure, events);
            stats.annuals.insert(measure, annuals);
        }
        stats
    }

    /// Mean over fire years of the annual total ash delivery (t/ha).
    pub fn mean_annual_delivery(&self) -> f64 {
        match self.annuals.get(&Measure::Ash) {
            Some(rows) if !rows.is_empty() => rows.iter().map(|r| r.cum_transport).sum::<f64>() / rows.len() as f64,
            _ => 0.0,
        }
    }
}
