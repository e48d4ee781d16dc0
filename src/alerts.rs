//! Stateless threshold alerting.
//!
//! Thresholds are an explicit, startup-validated structure injected into
//! the evaluator; call sites never consult the environment. Every
//! evaluation is independent: there is no hysteresis or debouncing, so
//! repeated breaches repeat alerts. Carbon breaches are CRITICAL, all
//! other breaches WARNING.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{TelemetryError, TelemetryResult};
use crate::models::{AlertDetail, Severity};

/// Ceilings unless noted; reclaimed % and chiller COP are floors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub grid_carbon_intensity_max_kg_per_kwh: f64,
    pub carbon_per_workload_hour_max: f64,
    pub wue_max_l_per_kwh: f64,
    pub water_per_workload_hour_max: f64,
    pub reclaimed_water_min_pct: f64,
    pub pue_max: f64,
    pub cooling_energy_pct_max: f64,
    pub chiller_cop_min: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            grid_carbon_intensity_max_kg_per_kwh: 0.6,
            carbon_per_workload_hour_max: 5.0,
            wue_max_l_per_kwh: 2.0,
            water_per_workload_hour_max: 50.0,
            reclaimed_water_min_pct: 20.0,
            pue_max: 2.0,
            cooling_energy_pct_max: 50.0,
            chiller_cop_min: 2.0,
        }
    }
}

impl AlertThresholds {
    /// All thresholds must be positive; checked once at startup.
    pub fn validate(&self) -> TelemetryResult<()> {
        let entries = [
            ("grid_carbon_intensity_max_kg_per_kwh", self.grid_carbon_intensity_max_kg_per_kwh),
            ("carbon_per_workload_hour_max", self.carbon_per_workload_hour_max),
            ("wue_max_l_per_kwh", self.wue_max_l_per_kwh),
            ("water_per_workload_hour_max", self.water_per_workload_hour_max),
            ("reclaimed_water_min_pct", self.reclaimed_water_min_pct),
            ("pue_max", self.pue_max),
            ("cooling_energy_pct_max", self.cooling_energy_pct_max),
            ("chiller_cop_min", self.chiller_cop_min),
        ];
        for (name, value) in entries {
            if value <= 0.0 || !value.is_finite() {
                return Err(TelemetryError::config(format!(
                    "alert threshold {name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}

fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn breach_above(metric: &str, value: f64, threshold: f64, severity: Severity) -> Option<AlertDetail> {
    (value > threshold).then(|| AlertDetail {
        metric: metric.to_string(),
        value: Value::from(value),
        threshold: Some(threshold),
        threshold_min: None,
        severity,
        timestamp: now_ts(),
    })
}

fn breach_below(metric: &str, value: f64, floor: f64, severity: Severity) -> Option<AlertDetail> {
    (value < floor).then(|| AlertDetail {
        metric: metric.to_string(),
        value: Value::from(value),
        threshold: None,
        threshold_min: Some(floor),
        severity,
        timestamp: now_ts(),
    })
}

/// Grid intensity and carbon-per-workload-hour spikes.
pub fn evaluate_carbon_intensity(
    thresholds: &AlertThresholds,
    grid_kg_per_kwh: Option<f64>,
    carbon_per_workload_hour: Option<f64>,
) -> Vec<AlertDetail> {
    let mut alerts = Vec::new();
    if let Some(v) = grid_kg_per_kwh {
        alerts.extend(breach_above(
            "grid_carbon_intensity",
            v,
            thresholds.grid_carbon_intensity_max_kg_per_kwh,
            Severity::Critical,
        ));
    }
    if let Some(v) = carbon_per_workload_hour {
        alerts.extend(breach_above(
            "carbon_per_workload_hour",
            v,
            thresholds.carbon_per_workload_hour_max,
            Severity::Critical,
        ));
    }
    alerts
}

/// Water inefficiency: WUE, per-workload intensity, reclaimed-% floor.
pub fn evaluate_water(
    thresholds: &AlertThresholds,
    wue_l_per_kwh: Option<f64>,
    water_per_workload_hour: Option<f64>,
    reclaimed_pct: Option<f64>,
) -> Vec<AlertDetail> {
    let mut alerts = Vec::new();
    if let Some(v) = wue_l_per_kwh {
        alerts.extend(breach_above("wue", v, thresholds.wue_max_l_per_kwh, Severity::Warning));
    }
    if let Some(v) = water_per_workload_hour {
        alerts.extend(breach_above(
            "water_per_workload_hour",
            v,
            thresholds.water_per_workload_hour_max,
            Severity::Warning,
        ));
    }
    if let Some(v) = reclaimed_pct {
        if v >= 0.0 {
            alerts.extend(breach_below(
                "reclaimed_water_pct",
                v,
                thresholds.reclaimed_water_min_pct,
                Severity::Warning,
            ));
        }
    }
    alerts
}

/// Cooling anomalies: PUE, cooling-energy %, chiller COP floor.
pub fn evaluate_cooling(
    thresholds: &AlertThresholds,
    pue: Option<f64>,
    cooling_energy_pct: Option<f64>,
    chiller_cop: Option<f64>,
) -> Vec<AlertDetail> {
    let mut alerts = Vec::new();
    if let Some(v) = pue {
        alerts.extend(breach_above("pue", v, thresholds.pue_max, Severity::Warning));
    }
    if let Some(v) = cooling_energy_pct {
        alerts.extend(breach_above(
            "cooling_energy_pct",
            v,
            thresholds.cooling_energy_pct_max,
            Severity::Warning,
        ));
    }
    if let Some(v) = chiller_cop {
        if v > 0.0 {
            alerts.extend(breach_below("chiller_cop", v, thresholds.chiller_cop_min, Severity::Warning));
        }
    }
    alerts
}

/// Sensor drift is a boolean signal straight from the edge.
pub fn evaluate_sensor_drift(drift_flag: bool) -> Vec<AlertDetail> {
    if !drift_flag {
        return Vec::new();
    }
    vec![AlertDetail {
        metric: "sensor_drift".to_string(),
        value: Value::from(true),
        threshold: None,
        threshold_min: None,
        severity: Severity::Warning,
        timestamp: now_ts(),
    }]
}
