//! Post-fire ash generation and transport core.
//!
//! Classifies soil burn severity rasters, assigns each hillslope a dominant
//! burn class and ash type, runs the daily ash transport simulator for every
//! candidate fire year, and aggregates hillslope results into watershed
//! recurrence statistics.
//!
//! Pipeline (see [`orchestrator::run`]):
//!   1. SBS classification and per-subcatchment dominance
//!   2. Hillslope ash assignment (type, initial depth and load)
//!   3. Per-hillslope simulation in a worker pool
//!   4. Per-hillslope ranking and return periods
//!   5. Watershed aggregation, contaminants, reservoir overlay

pub mod ash;
pub mod context;
pub mod error;
pub mod hillslope;
pub mod io;
pub mod manifest;
pub mod orchestrator;
pub mod raster;
pub mod sbs;
pub mod stats;
pub mod status;
pub mod watershed;

pub use error::{AshError, ErrorKind, Result};
