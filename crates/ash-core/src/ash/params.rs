use serde::{Deserialize, Serialize};

use crate::error::{AshError, Result};

/// Calibrated ash variant. The black/white distinction is carried entirely by
/// the parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AshType {
    Black,
    White,
}

impl AshType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::White => "white",
        }
    }

    /// Ash-type raster encoding: 0 = black, 1 = white.
    pub fn from_raster_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Black),
            1 => Some(Self::White),
            _ => None,
        }
    }
}

/// Which simulator drives a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Multi-year iterative simulator; each fire runs until the ash is exhausted.
    #[default]
    Anu,
    /// Legacy single-year closure, capped at [`NERIS_HORIZON_DAYS`] per fire.
    Neris,
}

/// Days simulated per fire by the legacy model.
pub const NERIS_HORIZON_DAYS: usize = 365;

impl ModelVariant {
    pub fn horizon_days(self) -> Option<usize> {
        match self {
            Self::Anu => None,
            Self::Neris => Some(NERIS_HORIZON_DAYS),
        }
    }

    pub fn default_wind_mode(self) -> WindTransportMode {
        match self {
            Self::Anu => WindTransportMode::PeakRecord,
            Self::Neris => WindTransportMode::CumulativeProportion,
        }
    }
}

/// How a threshold-crossing wind is turned into transported ash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindTransportMode {
    /// Each new peak-wind record transports `remaining · lookup(peak)`.
    PeakRecord,
    /// The lookup is a cumulative fraction of the initial load; each day
    /// transports whatever that fraction has not yet moved.
    CumulativeProportion,
}

/// Closure for the per-mm-of-runoff transport rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WaterClosure {
    /// Rate interpolated between `ini_erod` and `fin_erod` by bulk density.
    BulkDensityInterpolated,
    /// `ini_erod · exp(k · cum_ash_runoff)`.
    ExponentialRunoffDecay { k: f64 },
    /// Constant `ini_erod`.
    Linear,
}

/// Decay coefficient (per mm of cumulative ash runoff) of the legacy white ash closure.
pub const NERIS_WHITE_RUNOFF_DECAY: f64 = -0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AshParameterSet {
    pub ash_type: AshType,
    /// Initial bulk density (g/cm³).
    pub ini_bulk_den: f64,
    /// Fully compacted bulk density (g/cm³).
    pub fin_bulk_den: f64,
    /// Compaction rate per mm of cumulative infiltration.
    pub bulk_den_fac: f64,
    /// Particle density (g/cm³).
    pub par_den: f64,
    /// Decomposition rate per mm of infiltration.
    pub decomp_fac: f64,
    /// Transport rate of fresh ash (t/ha per mm of ash runoff).
    pub ini_erod: f64,
    pub fin_erod: f64,
    /// Depth (mm) of ash held in surface roughness and never transported.
    pub roughness_limit: f64,
    /// Organic matter fraction; carried for reporting only.
    pub org_mat: f64,
    pub run_wind_transport: bool,
    pub water_closure: WaterClosure,
}

impl AshParameterSet {
    pub fn white() -> Self {
        Self {
            ash_type: AshType::White,
            ini_bulk_den: 0.31,
            fin_bulk_den: 0.62,
            bulk_den_fac: 0.005,
            par_den: 1.2,
            decomp_fac: 1.8e-4,
            ini_erod: 10.0,
            fin_erod: 0.1,
            roughness_limit: 1.0,
            org_mat: 0.1,
            run_wind_transport: true,
            water_closure: WaterClosure::BulkDensityInterpolated,
        }
    }

    pub fn black() -> Self {
        Self {
            ash_type: AshType::Black,
            ini_bulk_den: 0.22,
            ini_erod: 1.0,
            org_mat: 0.3,
            ..Self::white()
        }
    }

    pub fn for_type(ash_type: AshType) -> Self {
        match ash_type {
            AshType::Black => Self::black(),
            AshType::White => Self::white(),
        }
    }

    /// Calibrated set for `ash_type` with the water closure `model` uses.
    pub fn for_model(ash_type: AshType, model: ModelVariant) -> Self {
        let mut params = Self::for_type(ash_type);
        params.water_closure = match (model, ash_type) {
            (ModelVariant::Anu, _) => WaterClosure::BulkDensityInterpolated,
            (ModelVariant::Neris, AshType::White) => WaterClosure::ExponentialRunoffDecay {
                k: NERIS_WHITE_RUNOFF_DECAY,
            },
            (ModelVariant::Neris, AshType::Black) => WaterClosure::Linear,
        };
        params
    }

    /// Porosity for a bulk density.
    pub fn porosity(&self, bulk_density: f64) -> f64 {
        1.0 - bulk_density / self.par_den
    }

    /// Bulk density after `cum_infil_mm` of cumulative infiltration.
    pub fn bulk_density(&self, cum_infil_mm: f64) -> f64 {
        self.fin_bulk_den + (self.ini_bulk_den - self.fin_bulk_den) * (-self.bulk_den_fac * cum_infil_mm).exp()
    }

    /// Interpolated transport rate for the bulk-density closure.
    pub fn interpolated_rate(&self, bulk_density: f64) -> f64 {
        let span = self.ini_bulk_den - self.fin_bulk_den;
        let w = if span == 0.0 {
            1.0
        } else {
            ((bulk_density - self.fin_bulk_den) / span).clamp(0.0, 1.0)
        };
        (self.ini_erod - self.fin_erod) * w + self.fin_erod
    }

    /// Reject parameter sets the simulator cannot run with.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, f64); 9] = [
            ("ini_bulk_den", self.ini_bulk_den),
            ("fin_bulk_den", self.fin_bulk_den),
            ("bulk_den_fac", self.bulk_den_fac),
            ("par_den", self.par_den),
            ("decomp_fac", self.decomp_fac),
            ("ini_erod", self.ini_erod),
            ("fin_erod", self.fin_erod),
            ("roughness_limit", self.roughness_limit),
            ("org_mat", self.org_mat),
        ];
        for (key, value) in checks {
            if !value.is_finite() {
                return Err(AshError::config(key, value, "must be a finite number"));
            }
            if value < 0.0 {
                return Err(AshError::config(key, value, "must be non-negative"));
            }
        }
        if self.ini_bulk_den <= 0.0 {
            return Err(AshError::config("ini_bulk_den", self.ini_bulk_den, "must be positive"));
        }
        if self.fin_bulk_den < self.ini_bulk_den {
            return Err(AshError::config(
                "fin_bulk_den",
                self.fin_bulk_den,
                format!("must be >= ini_bulk_den ({})", self.ini_bulk_den),
            ));
        }
        if self.par_den < self.fin_bulk_den {
            return Err(AshError::config(
                "par_den",
                self.par_den,
                format!("must be >= fin_bulk_den ({}) to keep porosity in [0, 1]", self.fin_bulk_den),
            ));
        }
        if self.fin_erod > self.ini_erod {
            return Err(AshError::config(
                "fin_erod",
                self.fin_erod,
                format!("must be <= ini_erod ({})", self.ini_erod),
            ));
        }
        if let WaterClosure::ExponentialRunoffDecay { k } = self.water_closure {
            if !k.is_finite() {
                return Err(AshError::config("water_closure.k", k, "must be a finite number"));
            }
        }
        Ok(())
    }
}
