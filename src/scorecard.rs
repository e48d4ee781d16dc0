//! Sustainability scorecard: composite index over carbon, water,
//! efficiency, and utilization. Computed on demand from the latest
//! request's metrics; never persisted.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{TelemetryError, TelemetryResult};
use crate::units::round_to;

// Normalization baselines. Intensities at or above the baseline count as
// worst (1.0); PUE scales linearly between the target and the baseline.
pub const CARBON_INTENSITY_BASELINE: f64 = 3.0; // kg CO2e per workload-hour
pub const WATER_INTENSITY_BASELINE: f64 = 40.0; // L per workload-hour
pub const ENERGY_EFFICIENCY_BASELINE: f64 = 1.8; // PUE, worst
pub const ENERGY_EFFICIENCY_TARGET: f64 = 1.2; // PUE, best
pub const UTILIZATION_TARGET: f64 = 80.0; // %

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorecardWeights {
    pub carbon: f64,
    pub water: f64,
    pub efficiency: f64,
    pub hardware: f64,
}

impl Default for ScorecardWeights {
    fn default() -> Self {
        ScorecardWeights {
            carbon: 0.35,
            water: 0.25,
            efficiency: 0.25,
            hardware: 0.15,
        }
    }
}

impl ScorecardWeights {
    pub fn validate(&self) -> TelemetryResult<()> {
        for (name, w) in [
            ("carbon", self.carbon),
            ("water", self.water),
            ("efficiency", self.efficiency),
            ("hardware", self.hardware),
        ] {
            if w < 0.0 || !w.is_finite() {
                return Err(TelemetryError::config(format!(
                    "scorecard weight {name} must be non-negative, got {w}"
                )));
            }
        }
        if self.carbon + self.water + self.efficiency + self.hardware <= 0.0 {
            return Err(TelemetryError::config("scorecard weights must sum to a positive value"));
        }
        Ok(())
    }

    fn normalized(&self) -> (f64, f64, f64, f64) {
        let total = self.carbon + self.water + self.efficiency + self.hardware;
        (
            self.carbon / total,
            self.water / total,
            self.efficiency / total,
            self.hardware / total,
        )
    }
}

/// Normalized carbon intensity, 0 = best, 1 = at/above baseline.
pub fn normalize_carbon_intensity(carbon_per_workload_hour: Option<f64>) -> f64 {
    match carbon_per_workload_hour {
        Some(v) if v > 0.0 => round_to((v / CARBON_INTENSITY_BASELINE).min(1.0), 4),
        _ => 0.0,
    }
}

/// Normalized water intensity, 0 = best, 1 = at/above baseline.
pub fn normalize_water_intensity(water_per_workload_hour: Option<f64>) -> f64 {
    match water_per_workload_hour {
        Some(v) if v > 0.0 => round_to((v / WATER_INTENSITY_BASELINE).min(1.0), 4),
        _ => 0.0,
    }
}

/// Normalized PUE between target (0) and baseline (1). Missing data is
/// treated as worst.
pub fn normalize_energy_efficiency(efficiency_ratio: Option<f64>) -> f64 {
    match efficiency_ratio {
        Some(v) if v > 0.0 => {
            if v <= ENERGY_EFFICIENCY_TARGET {
                0.0
            } else if v >= ENERGY_EFFICIENCY_BASELINE {
                1.0
            } else {
                round_to(
                    (v - ENERGY_EFFICIENCY_TARGET) / (ENERGY_EFFICIENCY_BASELINE - ENERGY_EFFICIENCY_TARGET),
                    4,
                )
            }
        }
        _ => 1.0,
    }
}

/// Utilization factor: 1 at/above the target, linear below it.
pub fn normalize_utilization(utilization_pct: Option<f64>) -> f64 {
    match utilization_pct {
        Some(v) if v > 0.0 => round_to((v / UTILIZATION_TARGET).min(1.0), 4),
        _ => 0.0,
    }
}

/// Score = w_c*(1-C) + w_w*(1-W) + w_e*(1-E) + w_h*U, in [0, 1], with a
/// 0-100 variant and the components/weights/assumptions echoed for
/// transparency.
pub fn sustainability_score(
    weights: &ScorecardWeights,
    carbon_per_workload_hour: Option<f64>,
    water_per_workload_hour: Option<f64>,
    energy_efficiency_ratio: Option<f64>,
    utilization_pct: Option<f64>,
) -> Value {
    let (wc, ww, we, wh) = weights.normalized();

    let c_norm = normalize_carbon_intensity(carbon_per_workload_hour);
    let w_norm = normalize_water_intensity(water_per_workload_hour);
    let e_norm = normalize_energy_efficiency(energy_efficiency_ratio);
    let u_norm = normalize_utilization(utilization_pct);

    let score = wc * (1.0 - c_norm) + ww * (1.0 - w_norm) + we * (1.0 - e_norm) + wh * u_norm;
    let score = round_to(score.clamp(0.0, 1.0), 4);

    json!({
        "sustainability_score": score,
        "sustainability_score_100": round_to(score * 100.0, 2),
        "components": {
            "carbon_normalized": c_norm,
            "water_normalized": w_norm,
            "efficiency_normalized": e_norm,
            "utilization_normalized": u_norm,
        },
        "weights": {"carbon": wc, "water": ww, "efficiency": we, "hardware": wh},
        "assumptions": {
            "carbon_baseline_kg_per_workload_hour": CARBON_INTENSITY_BASELINE,
            "water_baseline_l_per_workload_hour": WATER_INTENSITY_BASELINE,
            "efficiency_target": ENERGY_EFFICIENCY_TARGET,
            "efficiency_baseline": ENERGY_EFFICIENCY_BASELINE,
            "utilization_target_pct": UTILIZATION_TARGET,
        },
    })
}
