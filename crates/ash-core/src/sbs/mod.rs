//! Soil burn severity classification.
//!
//! A raw SBS raster is either a palette raster, an already classed raster, or
//! a continuous BARC index. [`SoilBurnSeverityMap`] picks the classifier,
//! produces the per-pixel offset-form codes (130–133, 255) and reports class
//! statistics.

pub mod classify;
pub mod palette;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AshError, Result};
use crate::raster::{read_raster, write_raster_u8, Raster};
use classify::{classify, infer_breaks, BreakSelection, FOUR_CLASS_BREAKS};
use palette::{canonical_color_table, classify_palette_value, has_known_colors, ColorMatch};

/// Offset added to 4-class values to form burn-class codes.
pub const BURN_CLASS_OFFSET: i32 = 130;
/// Code for unknown / nodata pixels, identical in offset and 4-class form.
pub const NODATA_CODE: i32 = 255;
/// A raster with more unique values than this cannot be an SBS map.
pub const MAX_UNIQUE_VALUES: usize = 256;

/// Canonical soil burn severity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BurnClass {
    Unburned,
    Low,
    Moderate,
    High,
    NoData,
}

impl BurnClass {
    pub const BURNED: [BurnClass; 3] = [BurnClass::Low, BurnClass::Moderate, BurnClass::High];

    /// Offset-form code: 130–133, 255 for nodata.
    pub fn code(self) -> i32 {
        match self {
            Self::NoData => NODATA_CODE,
            other => BURN_CLASS_OFFSET + other.four_class(),
        }
    }

    /// 4-class form: 0–3, 255 for nodata.
    pub fn four_class(self) -> i32 {
        match self {
            Self::Unburned => 0,
            Self::Low => 1,
            Self::Moderate => 2,
            Self::High => 3,
            Self::NoData => NODATA_CODE,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        if code == NODATA_CODE {
            return Some(Self::NoData);
        }
        Self::from_four_class(code - BURN_CLASS_OFFSET).filter(|c| *c != Self::NoData)
    }

    pub fn from_four_class(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Unburned),
            1 => Some(Self::Low),
            2 => Some(Self::Moderate),
            3 => Some(Self::High),
            NODATA_CODE => Some(Self::NoData),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unburned => "No Burn",
            Self::Low => "Low Severity Burn",
            Self::Moderate => "Moderate Severity Burn",
            Self::High => "High Severity Burn",
            Self::NoData => "No Data",
        }
    }

    pub fn is_burned(self) -> bool {
        matches!(self, Self::Low | Self::Moderate | Self::High)
    }
}

/// Offset-form code → 4-class code, 255 preserved.
pub fn code_to_four_class(code: i32) -> i32 {
    if code == NODATA_CODE {
        NODATA_CODE
    } else {
        classify(code - BURN_CLASS_OFFSET, &FOUR_CLASS_BREAKS, &[], 0)
    }
}

/// Validate a JSON nodata list. Anything other than a list of integers
/// (a string in particular) is an invalid argument; `null` means none.
pub fn parse_nodata_vals(value: &serde_json::Value) -> Result<Vec<i32>> {
    match value {
        serde_json::Value::Null => Ok(Vec::new()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_i64()
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| AshError::InvalidArgument(format!("nodata value {v} is not an integer")))
            })
            .collect(),
        other => Err(AshError::InvalidArgument(format!(
            "nodata_vals must be a list of integers, got {other}"
        ))),
    }
}

/// Options for opening an SBS raster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbsOptions {
    pub ignore_color_table: bool,
    pub nodata_vals: Vec<i32>,
}

/// The classifier selected for a raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SbsClassifier {
    /// Pixel value → offset-form code, built from the palette.
    Palette(BTreeMap<i32, i32>),
    Breakpoints(BreakSelection),
}

/// One row of [`SoilBurnSeverityMap::class_map`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassMapEntry {
    pub pixel_value: i32,
    pub label: &'static str,
    pub count: usize,
}

pub struct SoilBurnSeverityMap {
    raw: Raster<i32>,
    classifier: SbsClassifier,
    nodata_vals: Vec<i32>,
    pixel_counts: BTreeMap<i32, usize>,
    data: Raster<i32>,
}

impl SoilBurnSeverityMap {
    pub fn open(path: &Path, options: &SbsOptions) -> Result<Self> {
        let raw = read_raster(path)?;
        debug!(path = %path.display(), width = raw.width, height = raw.height, "read SBS raster");
        Self::from_raster(raw, options)
    }

    pub fn from_raster(raw: Raster<i32>, options: &SbsOptions) -> Result<Self> {
        let mut nodata_vals = options.nodata_vals.clone();
        if let Some(nd) = raw.nodata {
            if nd.fract() == 0.0 && nd >= f64::from(i32::MIN) && nd <= f64::from(i32::MAX) {
                let nd = nd as i32;
                if !nodata_vals.contains(&nd) {
                    nodata_vals.push(nd);
                }
            }
        }

        let mut pixel_counts: BTreeMap<i32, usize> = BTreeMap::new();
        for &v in &raw.data {
            *pixel_counts.entry(v).or_insert(0) += 1;
        }

        let classifier = match (&raw.color_table, options.ignore_color_table) {
            (Some(table), false) => {
                let lut = pixel_counts
                    .keys()
                    .map(|&v| {
                        let code = match classify_palette_value(v, table, &nodata_vals) {
                            ColorMatch::Classified(class) => class.code(),
                            ColorMatch::NoData => BURN_CLASS_OFFSET,
                            ColorMatch::UnknownColor => NODATA_CODE,
                        };
                        (v, code)
                    })
                    .collect();
                info!("SBS classified from color table");
                SbsClassifier::Palette(lut)
            }
            _ => {
                let unique: Vec<i32> = pixel_counts
                    .keys()
                    .copied()
                    .filter(|v| !nodata_vals.contains(v))
                    .collect();
                let selection = infer_breaks(&unique);
                info!(breaks = ?selection.breaks(), barc = selection == BreakSelection::Barc, "SBS classified by breakpoints");
                SbsClassifier::Breakpoints(selection)
            }
        };

        let data = {
            let mut data = raw.map(|v| v);
            for v in &mut data.data {
                *v = classify_with(&classifier, *v, &nodata_vals);
            }
            data.nodata = Some(f64::from(NODATA_CODE));
            data
        };

        Ok(Self {
            raw,
            classifier,
            nodata_vals,
            pixel_counts,
            data,
        })
    }

    pub fn classifier(&self) -> &SbsClassifier {
        &self.classifier
    }

    /// Breakpoints in use, `None` for palette classification.
    pub fn breaks(&self) -> Option<[i32; 4]> {
        match &self.classifier {
            SbsClassifier::Breakpoints(sel) => Some(sel.breaks()),
            SbsClassifier::Palette(_) => None,
        }
    }

    pub fn is_barc(&self) -> bool {
        self.classifier == SbsClassifier::Breakpoints(BreakSelection::Barc)
    }

    pub fn nodata_vals(&self) -> &[i32] {
        &self.nodata_vals
    }

    /// Classified grid, offset-form codes.
    pub fn data(&self) -> &Raster<i32> {
        &self.data
    }

    pub fn raw(&self) -> &Raster<i32> {
        &self.raw
    }

    pub fn classify_value(&self, value: i32) -> i32 {
        classify_with(&self.classifier, value, &self.nodata_vals)
    }

    /// `str(pixel_value) → str(class_code)` for every value present.
    pub fn class_pixel_map(&self) -> BTreeMap<String, String> {
        self.pixel_counts
            .keys()
            .map(|&v| (v.to_string(), self.classify_value(v).to_string()))
            .collect()
    }

    pub fn class_map(&self) -> Vec<ClassMapEntry> {
        self.pixel_counts
            .iter()
            .map(|(&v, &count)| ClassMapEntry {
                pixel_value: v,
                label: BurnClass::from_code(self.classify_value(v)).unwrap_or(BurnClass::NoData).label(),
                count,
            })
            .collect()
    }

    /// Pixel count per class label; every burn class label is present.
    pub fn burn_class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts: BTreeMap<String, usize> = [BurnClass::Unburned, BurnClass::Low, BurnClass::Moderate, BurnClass::High]
            .iter()
            .map(|c| (c.label().to_string(), 0))
            .collect();
        for entry in self.class_map() {
            *counts.entry(entry.label.to_string()).or_insert(0) += entry.count;
        }
        counts
    }

    /// The classified grid in 4-class form (0–3, 255).
    pub fn four_class_raster(&self) -> Raster<u8> {
        let mut out = self.data.map(|code| code_to_four_class(code) as u8);
        out.nodata = None;
        out.color_table = Some(canonical_color_table());
        out
    }

    /// Write the 4-class map with the canonical SBS palette attached.
    pub fn export_4class_map(&self, path: &Path) -> Result<()> {
        write_raster_u8(path, &self.four_class_raster())?;
        info!(path = %path.display(), "exported 4-class SBS map");
        Ok(())
    }
}

fn classify_with(classifier: &SbsClassifier, value: i32, nodata_vals: &[i32]) -> i32 {
    match classifier {
        SbsClassifier::Palette(lut) => match lut.get(&value) {
            Some(&code) => code,
            None if nodata_vals.contains(&value) => BURN_CLASS_OFFSET,
            None => NODATA_CODE,
        },
        SbsClassifier::Breakpoints(sel) => classify(value, &sel.breaks(), nodata_vals, BURN_CLASS_OFFSET),
    }
}

/// Outcome of [`sbs_map_sanity_check`]: status 0 is usable, 1 is not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanityCheck {
    pub status: u8,
    pub message: String,
}

impl SanityCheck {
    fn ok(message: impl Into<String>) -> Self {
        Self { status: 0, message: message.into() }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self { status: 1, message: message.into() }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Decide whether a raster is usable as an SBS map. Never fails; problems
/// are reported through the status.
pub fn sbs_map_sanity_check(path: &Path) -> SanityCheck {
    if !path.exists() {
        return SanityCheck::fail(format!("File {} does not exist", path.display()));
    }
    let raw = match read_raster(path) {
        Ok(r) => r,
        Err(e) => return SanityCheck::fail(format!("Unable to read map: {e}")),
    };
    let unique = raw.unique_values();
    if unique.len() > MAX_UNIQUE_VALUES {
        return SanityCheck::fail(format!(
            "Map has {} unique values; more than {MAX_UNIQUE_VALUES} classes",
            unique.len()
        ));
    }

    if let Some(table) = &raw.color_table {
        return if has_known_colors(table) {
            SanityCheck::ok("Map has valid color table")
        } else {
            SanityCheck::fail("Map contains a color table with no recognized burn class colors")
        };
    }

    let breaks = infer_breaks(&unique).breaks();
    let ordered = breaks.windows(2).all(|w| w[0] <= w[1]);
    let valid = unique
        .iter()
        .map(|&v| classify(v, &breaks, &[], BURN_CLASS_OFFSET))
        .all(|code| (BURN_CLASS_OFFSET..=BURN_CLASS_OFFSET + 3).contains(&code));
    if ordered && valid {
        SanityCheck::ok(format!("Map has valid classes, breaks {breaks:?}"))
    } else {
        SanityCheck::fail("Unable to infer burn class breaks")
    }
}
