//! Read-only handles to everything a run touches outside the core.
//!
//! Stages receive a [`RunContext`] instead of reaching for files directly, so
//! tests can point a run at any directory layout.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::ash::frame::{ClimateDay, HydrologyDay};
use crate::ash::simulate::AshDay;
use crate::error::{AshError, Result};
use crate::io::{read_climate, read_hydrology_csv, read_wat_dat, write_atomic, write_ash_parquet_to, write_csv_to, write_json_to};
use crate::raster::{read_raster, read_raster_f64, Raster};

pub trait RasterSource: Send + Sync {
    fn read_i32(&self, path: &Path) -> Result<Raster<i32>>;
    fn read_f64(&self, path: &Path) -> Result<Raster<f64>>;
}

pub trait HydrologySource: Send + Sync {
    /// Daily water balance of hillslope `wepp_id`; `first_year` is the
    /// calendar year of simulation year 1.
    fn hydrology(&self, wepp_id: u32, first_year: i32) -> Result<Vec<HydrologyDay>>;
}

pub trait ClimateSource: Send + Sync {
    fn climate(&self) -> Result<Vec<ClimateDay>>;
}

pub trait OutputSink: Send + Sync {
    fn run_dir(&self) -> &Path;

    /// Write `name` inside the run directory; the file appears complete or
    /// not at all.
    fn write_file(&self, name: &str, write: &mut dyn FnMut(&mut File) -> Result<()>) -> Result<PathBuf>;
}

/// Typed writers on top of [`OutputSink::write_file`].
pub trait OutputSinkExt {
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf>;
    fn write_csv<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf>;
    fn write_series(&self, name: &str, days: &[AshDay]) -> Result<PathBuf>;
}

impl<S: OutputSink + ?Sized> OutputSinkExt for S {
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        self.write_file(name, &mut |file| write_json_to(file, value))
    }

    fn write_csv<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<PathBuf> {
        self.write_file(name, &mut |file| write_csv_to(file, rows))
    }

    fn write_series(&self, name: &str, days: &[AshDay]) -> Result<PathBuf> {
        self.write_file(name, &mut |file| write_ash_parquet_to(file, days))
    }
}

// ── Filesystem implementations ──────────────────────────────────────────────

/// GeoTIFF rasters on local disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoTiffRasters;

impl RasterSource for GeoTiffRasters {
    fn read_i32(&self, path: &Path) -> Result<Raster<i32>> {
        read_raster(path)
    }

    fn read_f64(&self, path: &Path) -> Result<Raster<f64>> {
        read_raster_f64(path)
    }
}

/// Directory of `H{wepp_id}.wat.dat` or `H{wepp_id}.wat.csv` files.
#[derive(Debug, Clone)]
pub struct HydrologyDir {
    pub dir: PathBuf,
}

impl HydrologyDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn wat_dat_path(&self, wepp_id: u32) -> PathBuf {
        self.dir.join(format!("H{wepp_id}.wat.dat"))
    }

    pub fn wat_csv_path(&self, wepp_id: u32) -> PathBuf {
        self.dir.join(format!("H{wepp_id}.wat.csv"))
    }
}

impl HydrologySource for HydrologyDir {
    fn hydrology(&self, wepp_id: u32, first_year: i32) -> Result<Vec<HydrologyDay>> {
        let dat = self.wat_dat_path(wepp_id);
        if dat.exists() {
            return read_wat_dat(&dat, first_year);
        }
        let csv = self.wat_csv_path(wepp_id);
        if csv.exists() {
            return read_hydrology_csv(&csv);
        }
        Err(AshError::MissingInput(dat))
    }
}

#[derive(Debug, Clone)]
pub struct ClimateFile {
    pub path: PathBuf,
}

impl ClimateSource for ClimateFile {
    fn climate(&self) -> Result<Vec<ClimateDay>> {
        read_climate(&self.path)
    }
}

/// Run output directory; every write is temp-file-then-rename.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    pub dir: PathBuf,
}

impl RunDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }
}

impl OutputSink for RunDirectory {
    fn run_dir(&self) -> &Path {
        &self.dir
    }

    fn write_file(&self, name: &str, write: &mut dyn FnMut(&mut File) -> Result<()>) -> Result<PathBuf> {
        let path = self.dir.join(name);
        write_atomic(&path, |file| write(file))?;
        Ok(path)
    }
}

/// Collaborators for one run.
#[derive(Clone)]
pub struct RunContext {
    pub rasters: Arc<dyn RasterSource>,
    pub hydrology: Arc<dyn HydrologySource>,
    pub climate: Arc<dyn ClimateSource>,
    pub output: Arc<dyn OutputSink>,
}

impl RunContext {
    /// Local GeoTIFFs, hydrology directory, climate file and run directory.
    pub fn filesystem(hydrology_dir: &Path, climate: &Path, run_dir: &Path) -> Result<Self> {
        Ok(Self {
            rasters: Arc::new(GeoTiffRasters),
            hydrology: Arc::new(HydrologyDir::new(hydrology_dir)),
            climate: Arc::new(ClimateFile {
                path: climate.to_path_buf(),
            }),
            output: Arc::new(RunDirectory::new(run_dir)?),
        })
    }

    pub fn run_dir(&self) -> &Path {
        self.output.run_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hydrology_dir_prefers_wat_dat_then_csv() {
        let dir = tempfile::tempdir().unwrap();
        let src = HydrologyDir::new(dir.path());
        assert!(matches!(src.hydrology(3, 2001), Err(AshError::MissingInput(_))));

        std::fs::write(
            src.wat_csv_path(3),
            "year,month,day_of_month,P,RM,Q,Total-Soil Water,Snow-Water\n2001,8,1,0,0,0,100,0\n",
        )
        .unwrap();
        let days = src.hydrology(3, 2001).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].julian, 213);
    }

    #[test]
    fn run_directory_writes_typed_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let out: Arc<dyn OutputSink> = Arc::new(RunDirectory::new(dir.path().join("run")).unwrap());
        let path = out.write_json("x.json", &serde_json::json!([1, 2])).unwrap();
        assert!(path.ends_with("run/x.json"));
        let rows = [(1, 2.0)];
        let csv = out.write_csv("x.csv", &rows).unwrap();
        assert!(csv.exists());
        let series = out.write_series("H1_ash.parquet", &[AshDay::default()]).unwrap();
        assert_eq!(crate::io::read_ash_parquet(&series).unwrap().len(), 1);
    }
}
