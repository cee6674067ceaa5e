use serde::{Deserialize, Serialize};

/// Downstream reservoir receiving ash delivered by water.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reservoir {
    pub capacity_m3: f64,
    /// Share of capacity available for sediment, in [0, 1].
    pub storage_fraction: f64,
    /// Deposited ash bulk density (g/cm³ = t/m³).
    pub bulk_density: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReservoirOverlay {
    #[serde(rename = "sediment (m^3)")]
    pub sediment_m3: f64,
    #[serde(rename = "available_storage (m^3)")]
    pub available_m3: f64,
    #[serde(rename = "remaining_storage (m^3)")]
    pub remaining_m3: f64,
    pub fraction_consumed: f64,
    pub reservoir_full: bool,
}

impl Reservoir {
    pub fn available_m3(&self) -> f64 {
        self.capacity_m3 * self.storage_fraction
    }

    pub fn overlay(&self, delivered_tonnes: f64) -> ReservoirOverlay {
        let sediment_m3 = delivered_tonnes / self.bulk_density;
        let available_m3 = self.available_m3();
        let remaining_m3 = (available_m3 - sediment_m3).max(0.0);
        let fraction_consumed = if available_m3 > 0.0 {
            (sediment_m3 / available_m3).min(1.0)
        } else {
            1.0
        };
        ReservoirOverlay {
            sediment_m3,
            available_m3,
            remaining_m3,
            fraction_consumed,
            reservoir_full: remaining_m3 <= 0.0,
        }
    }
}
