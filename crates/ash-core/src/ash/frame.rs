//! Daily model input: hydrology joined with climate on calendar date.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AshError, Result};

/// Calendar day on which a fire occurs every year, written `"M/D"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FireDate {
    pub month: u32,
    pub day: u32,
}

impl FireDate {
    pub fn new(month: u32, day: u32) -> Result<Self> {
        // 2000 is a leap year, so 2/29 is accepted.
        if NaiveDate::from_ymd_opt(2000, month, day).is_none() {
            return Err(AshError::config("fire_date", format!("{month}/{day}"), "not a valid month/day"));
        }
        Ok(Self { month, day })
    }

    pub fn matches(&self, month: u32, day: u32) -> bool {
        self.month == month && self.day == day
    }
}

impl FromStr for FireDate {
    type Err = AshError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AshError::config("fire_date", s, "expected \"M/D\"");
        let (m, d) = s.trim().split_once('/').ok_or_else(invalid)?;
        let month = m.trim().parse::<u32>().map_err(|_| invalid())?;
        let day = d.trim().parse::<u32>().map_err(|_| invalid())?;
        Self::new(month, day)
    }
}

impl TryFrom<String> for FireDate {
    type Error = AshError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<FireDate> for String {
    fn from(d: FireDate) -> String {
        d.to_string()
    }
}

impl fmt::Display for FireDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.month, self.day)
    }
}

/// One day of hillslope water balance (single OFE or already reduced).
#[derive(Debug, Clone, PartialEq)]
pub struct HydrologyDay {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub julian: u32,
    /// P (mm)
    pub precip_mm: f64,
    /// RM, rain plus snowmelt (mm)
    pub rainmelt_mm: f64,
    /// Q (mm)
    pub runoff_mm: f64,
    /// Total-Soil Water (mm)
    pub soil_water_mm: f64,
    /// Snow-Water (mm)
    pub snow_water_mm: f64,
    /// Element peak runoff (m³/s), when element output is available.
    pub peak_ro: Option<f64>,
    /// Element effective duration (hr).
    pub eff_duration: Option<f64>,
}

impl HydrologyDay {
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateDay {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// w-vl, peak daily wind speed (m/s)
    pub peak_wind: f64,
}

/// Joined daily record the simulator consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDay {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub julian: u32,
    pub precip_mm: f64,
    pub rainmelt_mm: f64,
    pub runoff_mm: f64,
    pub soil_water_mm: f64,
    pub snow_water_mm: f64,
    pub peak_wind: f64,
    pub peak_ro: Option<f64>,
    pub eff_duration: Option<f64>,
}

impl ModelDay {
    /// Infiltration, `RM − Q`, floored at zero.
    pub fn infil_mm(&self) -> f64 {
        (self.rainmelt_mm - self.runoff_mm).max(0.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelFrame {
    pub days: Vec<ModelDay>,
}

impl ModelFrame {
    /// Inner join on `(year, month, day)` in hydrology order. Fails when the
    /// two records share no dates.
    pub fn join(hydrology: &[HydrologyDay], climate: &[ClimateDay]) -> Result<Self> {
        let wind: HashMap<(i32, u32, u32), f64> = climate
            .iter()
            .map(|c| ((c.year, c.month, c.day), c.peak_wind))
            .collect();

        let days: Vec<ModelDay> = hydrology
            .iter()
            .filter_map(|h| {
                wind.get(&(h.year, h.month, h.day)).map(|&peak_wind| ModelDay {
                    year: h.year,
                    month: h.month,
                    day: h.day,
                    julian: h.julian,
                    precip_mm: h.precip_mm,
                    rainmelt_mm: h.rainmelt_mm,
                    runoff_mm: h.runoff_mm,
                    soil_water_mm: h.soil_water_mm,
                    snow_water_mm: h.snow_water_mm,
                    peak_wind,
                    peak_ro: h.peak_ro,
                    eff_duration: h.eff_duration,
                })
            })
            .collect();

        if days.is_empty() {
            return Err(AshError::InvalidArgument(format!(
                "hydrology ({} days) and climate ({} days) share no common dates",
                hydrology.len(),
                climate.len()
            )));
        }
        Ok(Self { days })
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// `(year, index)` of every occurrence of the fire date.
    pub fn fire_starts(&self, fire: FireDate) -> Vec<(i32, usize)> {
        self.days
            .iter()
            .enumerate()
            .filter(|(_, d)| fire.matches(d.month, d.day))
            .map(|(i, d)| (d.year, i))
            .collect()
    }

    pub fn first_year(&self) -> Option<i32> {
        self.days.first().map(|d| d.year)
    }
}

/// Julian day of year, `None` for an invalid date.
pub fn julian_day(year: i32, month: u32, day: u32) -> Option<u32> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.ordinal())
}

/// Calendar date of a Julian day.
pub fn from_julian(year: i32, julian: u32) -> Option<(u32, u32)> {
    NaiveDate::from_yo_opt(year, julian).map(|d| (d.month(), d.day()))
}
