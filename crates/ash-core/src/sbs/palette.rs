//! Palette (color table) classification.
//!
//! Each palette entry's colour is looked up in a dictionary of the colours SBS
//! products are published with. Alpha is ignored because TIFF palettes carry
//! none.

use super::BurnClass;
use crate::raster::ColorTable;

/// Result of classifying one palette pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMatch {
    Classified(BurnClass),
    /// Value has no palette entry, or its colour is not an SBS colour.
    UnknownColor,
    /// Value is a declared nodata value.
    NoData,
}

/// Known SBS colours (RGB) and the burn class each denotes.
pub const SBS_COLORS: &[([u8; 3], BurnClass)] = &[
    ([0, 100, 0], BurnClass::Unburned),
    ([0, 115, 74], BurnClass::Unburned),
    ([0, 158, 115], BurnClass::Unburned),
    ([0, 175, 166], BurnClass::Unburned),
    ([127, 255, 212], BurnClass::Low),
    ([102, 205, 170], BurnClass::Low),
    ([77, 230, 0], BurnClass::Low),
    ([115, 255, 223], BurnClass::Low),
    ([255, 255, 0], BurnClass::Moderate),
    ([255, 232, 32], BurnClass::Moderate),
    ([255, 211, 127], BurnClass::Moderate),
    ([255, 0, 0], BurnClass::High),
    ([230, 0, 0], BurnClass::High),
    ([168, 0, 0], BurnClass::High),
];

/// Colour written for pixel value 255 in exported 4-class maps.
pub const NODATA_COLOR: [u8; 4] = [255, 255, 255, 255];

pub fn match_color(rgba: [u8; 4]) -> Option<BurnClass> {
    SBS_COLORS
        .iter()
        .find(|(rgb, _)| rgb[..] == rgba[..3])
        .map(|&(_, class)| class)
}

pub fn classify_palette_value(value: i32, table: &ColorTable, nodata_vals: &[i32]) -> ColorMatch {
    if nodata_vals.contains(&value) {
        return ColorMatch::NoData;
    }
    match table.get(i64::from(value)).and_then(match_color) {
        Some(class) => ColorMatch::Classified(class),
        None => ColorMatch::UnknownColor,
    }
}

/// True when at least one palette entry is a recognised burn-class colour.
pub fn has_known_colors(table: &ColorTable) -> bool {
    table.entries.iter().any(|&c| match_color(c).is_some())
}

/// Palette attached to 4-class exports: 0–3 are the canonical class colours,
/// 255 is the nodata entry, everything else black.
pub fn canonical_color_table() -> ColorTable {
    let mut entries = vec![[0u8, 0, 0, 255]; 256];
    entries[0] = [0, 100, 0, 255];
    entries[1] = [127, 255, 212, 255];
    entries[2] = [255, 255, 0, 255];
    entries[3] = [255, 0, 0, 255];
    entries[255] = NODATA_COLOR;
    ColorTable { entries }
}
