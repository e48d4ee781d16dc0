//! Ingest payload schema and boundary validation.
//!
//! Payloads are deserialized into typed blocks exactly once, validated,
//! and normalized to canonical units here; everything downstream works
//! with these structures and plain numbers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{TelemetryError, TelemetryResult};
use crate::units;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnergyBlock {
    pub facility_kwh: Option<f64>,
    pub it_kwh: Option<f64>,
    pub cooling_kwh: Option<f64>,
    pub chiller_energy_kwh: Option<f64>,
    pub generator_fuel_liters: Option<f64>,
    pub generator_fuel_type: Option<String>,
    #[serde(default)]
    pub energy_unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarbonBlock {
    pub scope1_kg_co2e: Option<f64>,
    pub scope2_location_kg_co2e: Option<f64>,
    pub scope2_market_kg_co2e: Option<f64>,
    pub grid_carbon_intensity_kg_per_kwh: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaterBlock {
    pub withdrawal_liters: Option<f64>,
    pub returned_liters: Option<f64>,
    pub consumed_liters: Option<f64>,
    pub reclaimed_liters: Option<f64>,
    pub evaporation_liters: Option<f64>,
    pub blowdown_liters: Option<f64>,
    #[serde(default)]
    pub water_unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeBlock {
    pub gpu_hours: Option<f64>,
    pub gpu_count: Option<f64>,
    pub run_duration_seconds: Option<f64>,
    pub run_type: Option<String>,
    pub training_runs: Option<i64>,
    pub inference_requests: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HardwareBlock {
    pub utilization_pct: Option<f64>,
    pub idle_rate_pct: Option<f64>,
    pub asset_state: Option<String>,
    pub embodied_kg_co2e: Option<f64>,
    pub expected_lifetime_hours: Option<f64>,
    pub unit_count: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataQualityBlock {
    pub completeness_pct: Option<f64>,
    pub latency_seconds: Option<f64>,
    pub outlier_flag: Option<bool>,
    pub drift_flag: Option<bool>,
    pub confidence_score: Option<f64>,
}

/// Root schema for POST /ingest. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetryIngestPayload {
    #[serde(default)]
    pub timestamp: String,
    pub asset_id: Option<String>,
    pub region: Option<String>,
    pub industry_vertical: Option<String>,
    pub workload_id: Option<String>,
    pub workload_value: Option<f64>,
    pub workload_unit: Option<String>,
    pub external_event_id: Option<String>,
    pub source_id: Option<String>,
    pub energy: Option<EnergyBlock>,
    pub carbon: Option<CarbonBlock>,
    pub water: Option<WaterBlock>,
    pub compute: Option<ComputeBlock>,
    pub hardware: Option<HardwareBlock>,
    pub data_quality: Option<DataQualityBlock>,
    pub emission_factor_version: Option<String>,
    pub metadata: Option<Value>,
}

fn require_non_negative(field: &str, value: Option<f64>) -> TelemetryResult<()> {
    if let Some(v) = value {
        if v < 0.0 || !v.is_finite() {
            return Err(TelemetryError::validation(
                field,
                format!("must be a non-negative finite number, got {v}"),
            ));
        }
    }
    Ok(())
}

fn require_non_negative_int(field: &str, value: Option<i64>) -> TelemetryResult<()> {
    if let Some(v) = value {
        if v < 0 {
            return Err(TelemetryError::validation(field, format!("must be >= 0, got {v}")));
        }
    }
    Ok(())
}

fn require_pct(field: &str, value: Option<f64>) -> TelemetryResult<()> {
    require_non_negative(field, value)?;
    if let Some(v) = value {
        if v > 100.0 {
            return Err(TelemetryError::validation(field, format!("must be in [0, 100], got {v}")));
        }
    }
    Ok(())
}

fn require_fraction(field: &str, value: Option<f64>) -> TelemetryResult<()> {
    require_non_negative(field, value)?;
    if let Some(v) = value {
        if v > 1.0 {
            return Err(TelemetryError::validation(field, format!("must be in [0, 1], got {v}")));
        }
    }
    Ok(())
}

fn normalize_energy_field(field: &str, value: Option<f64>, unit: &str) -> TelemetryResult<Option<f64>> {
    require_non_negative(field, value)?;
    value.map(|v| units::normalize_energy(v, unit)).transpose()
}

fn normalize_water_field(field: &str, value: Option<f64>, unit: &str) -> TelemetryResult<Option<f64>> {
    require_non_negative(field, value)?;
    value.map(|v| units::normalize_water(v, unit)).transpose()
}

impl TelemetryIngestPayload {
    /// Checks ranges and converts all measurements to canonical units.
    /// Called exactly once, at the validation boundary.
    fn validate_and_normalize(mut self) -> TelemetryResult<Self> {
        if self.timestamp.trim().is_empty() {
            return Err(TelemetryError::validation("timestamp", "required"));
        }
        if self.energy.is_none()
            && self.carbon.is_none()
            && self.water.is_none()
            && self.compute.is_none()
            && self.hardware.is_none()
            && self.data_quality.is_none()
        {
            return Err(TelemetryError::validation(
                "payload",
                "at least one of energy, carbon, water, compute, hardware, or data_quality must be present",
            ));
        }
        require_non_negative("workload_value", self.workload_value)?;

        if let Some(energy) = self.energy.take() {
            let unit = energy.energy_unit.clone().unwrap_or_default();
            self.energy = Some(EnergyBlock {
                facility_kwh: normalize_energy_field("energy.facility_kwh", energy.facility_kwh, &unit)?,
                it_kwh: normalize_energy_field("energy.it_kwh", energy.it_kwh, &unit)?,
                cooling_kwh: normalize_energy_field("energy.cooling_kwh", energy.cooling_kwh, &unit)?,
                chiller_energy_kwh: normalize_energy_field(
                    "energy.chiller_energy_kwh",
                    energy.chiller_energy_kwh,
                    &unit,
                )?,
                generator_fuel_liters: {
                    require_non_negative("energy.generator_fuel_liters", energy.generator_fuel_liters)?;
                    energy.generator_fuel_liters
                },
                generator_fuel_type: energy.generator_fuel_type,
                energy_unit: Some(units::ENERGY_CANONICAL.to_string()),
            });
        }

        if let Some(carbon) = &self.carbon {
            require_non_negative("carbon.scope1_kg_co2e", carbon.scope1_kg_co2e)?;
            require_non_negative("carbon.scope2_location_kg_co2e", carbon.scope2_location_kg_co2e)?;
            require_non_negative("carbon.scope2_market_kg_co2e", carbon.scope2_market_kg_co2e)?;
            require_non_negative(
                "carbon.grid_carbon_intensity_kg_per_kwh",
                carbon.grid_carbon_intensity_kg_per_kwh,
            )?;
        }

        if let Some(water) = self.water.take() {
            let unit = water.water_unit.clone().unwrap_or_default();
            self.water = Some(WaterBlock {
                withdrawal_liters: normalize_water_field("water.withdrawal_liters", water.withdrawal_liters, &unit)?,
                returned_liters: normalize_water_field("water.returned_liters", water.returned_liters, &unit)?,
                consumed_liters: normalize_water_field("water.consumed_liters", water.consumed_liters, &unit)?,
                reclaimed_liters: normalize_water_field("water.reclaimed_liters", water.reclaimed_liters, &unit)?,
                evaporation_liters: normalize_water_field("water.evaporation_liters", water.evaporation_liters, &unit)?,
                blowdown_liters: normalize_water_field("water.blowdown_liters", water.blowdown_liters, &unit)?,
                water_unit: Some(units::WATER_CANONICAL.to_string()),
            });
        }

        if let Some(compute) = &self.compute {
            require_non_negative("compute.gpu_hours", compute.gpu_hours)?;
            require_non_negative("compute.gpu_count", compute.gpu_count)?;
            require_non_negative("compute.run_duration_seconds", compute.run_duration_seconds)?;
            require_non_negative_int("compute.training_runs", compute.training_runs)?;
            require_non_negative_int("compute.inference_requests", compute.inference_requests)?;
        }

        if let Some(hardware) = &self.hardware {
            require_pct("hardware.utilization_pct", hardware.utilization_pct)?;
            require_pct("hardware.idle_rate_pct", hardware.idle_rate_pct)?;
            require_non_negative("hardware.embodied_kg_co2e", hardware.embodied_kg_co2e)?;
            require_non_negative("hardware.expected_lifetime_hours", hardware.expected_lifetime_hours)?;
            require_non_negative("hardware.unit_count", hardware.unit_count)?;
        }

        if let Some(dq) = &self.data_quality {
            require_pct("data_quality.completeness_pct", dq.completeness_pct)?;
            require_non_negative("data_quality.latency_seconds", dq.latency_seconds)?;
            require_fraction("data_quality.confidence_score", dq.confidence_score)?;
        }

        Ok(self)
    }
}

/// Validate a raw JSON body against the ingest schema. Nothing is stored
/// when this fails.
pub fn validate_ingest_payload(data: &Value) -> TelemetryResult<TelemetryIngestPayload> {
    let payload: TelemetryIngestPayload = serde_json::from_value(data.clone())
        .map_err(|e| TelemetryError::validation("payload", e.to_string()))?;
    payload.validate_and_normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_at_least_one_block_required() {
        let err = validate_ingest_payload(&json!({"timestamp": "2024-06-15T12:00:00Z"})).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_timestamp_required() {
        let err =
            validate_ingest_payload(&json!({"energy": {"it_kwh": 100.0}})).unwrap_err();
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn test_energy_only_payload_is_valid() {
        let p = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "energy": {"facility_kwh": 100.0, "it_kwh": 80.0},
        }))
        .unwrap();
        assert!(p.water.is_none());
        assert!(p.compute.is_none());
        assert_eq!(p.energy.unwrap().it_kwh, Some(80.0));
    }

    #[test]
    fn test_negative_values_rejected() {
        let err = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "energy": {"it_kwh": -5.0},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("it_kwh"));
    }

    #[test]
    fn test_percentage_range_enforced() {
        let err = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "hardware": {"utilization_pct": 130.0},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("utilization_pct"));
    }

    #[test]
    fn test_confidence_range_enforced() {
        let err = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "data_quality": {"confidence_score": 1.5},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("confidence_score"));
    }

    #[test]
    fn test_energy_units_normalized_at_boundary() {
        let p = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "energy": {"it_kwh": 1.5, "energy_unit": "MWh"},
        }))
        .unwrap();
        let energy = p.energy.unwrap();
        assert_eq!(energy.it_kwh, Some(1500.0));
        assert_eq!(energy.energy_unit.as_deref(), Some("kWh"));
    }

    #[test]
    fn test_water_units_normalized_at_boundary() {
        let p = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "water": {"withdrawal_liters": 8.0, "water_unit": "m3"},
        }))
        .unwrap();
        assert_eq!(p.water.unwrap().withdrawal_liters, Some(8000.0));
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let err = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "water": {"withdrawal_liters": 8.0, "water_unit": "hogsheads"},
        }))
        .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let p = validate_ingest_payload(&json!({
            "timestamp": "2024-06-15T12:00:00Z",
            "energy": {"it_kwh": 10.0},
            "some_future_field": {"x": 1},
        }))
        .unwrap();
        assert!(p.energy.is_some());
    }
}
