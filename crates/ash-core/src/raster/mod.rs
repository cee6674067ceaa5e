//! Single-band georeferenced rasters.
//!
//! Grids are row-major with row 0 at the top (north) edge, the order GeoTIFF
//! stores them in. World coordinates use f64; pixel values are generic.

pub mod io;
pub mod overlay;
pub mod reproject;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AshError, Result};

pub use io::{read_raster, read_raster_f64, write_raster_i32, write_raster_u8};
pub use overlay::{mean_over_subcatchments, mode_over_subcatchments, UNKNOWN_MODE};
pub use reproject::reproject_nearest;

/// North-up affine transform (no rotation terms), GDAL ordering.
///
/// `x = origin_x + col · pixel_width`, `y = origin_y + row · pixel_height`;
/// `pixel_height` is negative for north-up rasters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub pixel_width: f64,
    pub origin_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Unit pixels anchored at the origin; used for rasters without georeferencing.
    pub fn identity() -> Self {
        Self {
            origin_x: 0.0,
            pixel_width: 1.0,
            origin_y: 0.0,
            pixel_height: -1.0,
        }
    }

    /// World coordinate of the centre of pixel (`row`, `col`).
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.origin_x + (col as f64 + 0.5) * self.pixel_width,
            self.origin_y + (row as f64 + 0.5) * self.pixel_height,
        )
    }

    /// Fractional (row, col) of a world coordinate.
    pub fn world_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (y - self.origin_y) / self.pixel_height,
            (x - self.origin_x) / self.pixel_width,
        )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// Coordinate reference system, reduced to the EPSG code stored in the
/// GeoKey directory. `None` means the file carried no usable CRS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub epsg: Option<u32>,
    /// True for geographic (lat/lon) systems, false for projected ones.
    pub geographic: bool,
}

impl Projection {
    pub fn epsg(code: u32) -> Self {
        Self { epsg: Some(code), geographic: code == 4326 || code == 4269 }
    }

    /// Two projections can share a grid when either is unknown or both match.
    pub fn is_compatible(&self, other: &Projection) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg {
            Some(code) => write!(f, "EPSG:{code}"),
            None => write!(f, "unknown CRS"),
        }
    }
}

/// Palette attached to a raster; index = pixel value, entry = RGBA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTable {
    pub entries: Vec<[u8; 4]>,
}

impl ColorTable {
    pub fn get(&self, value: i64) -> Option<[u8; 4]> {
        usize::try_from(value).ok().and_then(|i| self.entries.get(i).copied())
    }

    /// Build from a TIFF ColorMap tag: all reds, then all greens, then all
    /// blues, each 16-bit. TIFF palettes carry no alpha, so entries are opaque.
    pub fn from_tiff_colormap(colormap: &[u16]) -> Self {
        let n = colormap.len() / 3;
        let entries = (0..n)
            .map(|i| {
                [
                    (colormap[i] >> 8) as u8,
                    (colormap[n + i] >> 8) as u8,
                    (colormap[2 * n + i] >> 8) as u8,
                    255,
                ]
            })
            .collect();
        Self { entries }
    }

    /// Inverse of [`ColorTable::from_tiff_colormap`], padded to 256 entries
    /// as required for 8-bit palette images. 8-bit channels are widened by
    /// ×257 so the round trip is exact.
    pub fn to_tiff_colormap(&self) -> Vec<u16> {
        let mut out = vec![0u16; 3 * 256];
        for (i, rgba) in self.entries.iter().take(256).enumerate() {
            out[i] = u16::from(rgba[0]) * 257;
            out[256 + i] = u16::from(rgba[1]) * 257;
            out[512 + i] = u16::from(rgba[2]) * 257;
        }
        out
    }
}

/// A georeferenced single-band grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster<T> {
    pub data: Vec<T>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub projection: Projection,
    /// Value of the GDAL_NODATA tag, if any.
    pub nodata: Option<f64>,
    pub color_table: Option<ColorTable>,
}

impl<T: Copy> Raster<T> {
    /// Create a raster filled with `fill`, with unit georeferencing.
    pub fn new(width: usize, height: usize, fill: T) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            transform: GeoTransform::identity(),
            projection: Projection::default(),
            nodata: None,
            color_table: None,
        }
    }

    pub fn from_vec(data: Vec<T>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height {
            return Err(AshError::InvalidArgument(format!(
                "raster data has {} values, expected {width}×{height}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            transform: GeoTransform::identity(),
            projection: Projection::default(),
            nodata: None,
            color_table: None,
        })
    }

    pub fn with_georef(mut self, transform: GeoTransform, projection: Projection) -> Self {
        self.transform = transform;
        self.projection = projection;
        self
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.width + col] = val;
    }

    /// Apply `f` per pixel, keeping georeferencing. The palette is dropped
    /// because it describes the old values.
    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> Raster<U> {
        Raster {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
            transform: self.transform,
            projection: self.projection,
            nodata: self.nodata,
            color_table: None,
        }
    }

    /// Same dimensions and transform (within a millionth of a pixel).
    pub fn same_grid<U>(&self, other: &Raster<U>) -> bool {
        let close = |a: f64, b: f64, scale: f64| (a - b).abs() <= 1e-6 * scale.abs().max(1e-12);
        self.width == other.width
            && self.height == other.height
            && close(self.transform.origin_x, other.transform.origin_x, self.transform.pixel_width)
            && close(self.transform.origin_y, other.transform.origin_y, self.transform.pixel_height)
            && close(self.transform.pixel_width, other.transform.pixel_width, self.transform.pixel_width)
            && close(self.transform.pixel_height, other.transform.pixel_height, self.transform.pixel_height)
    }
}

impl Raster<i32> {
    /// Sorted distinct pixel values.
    pub fn unique_values(&self) -> Vec<i32> {
        let mut vals = self.data.clone();
        vals.sort_unstable();
        vals.dedup();
        vals
    }
}
