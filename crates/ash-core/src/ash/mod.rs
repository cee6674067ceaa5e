//! Hillslope ash model: parameter sets, wind thresholds, input frame and the
//! daily transport simulator.

pub mod frame;
pub mod params;
pub mod simulate;
pub mod wind;

pub use frame::{ClimateDay, FireDate, HydrologyDay, ModelDay, ModelFrame};
pub use params::{AshParameterSet, AshType, ModelVariant, WaterClosure, WindTransportMode};
pub use simulate::{calc_transportable_ash, AshDay, AshSimulation, AshTransportModel, FireRun, Termination};
