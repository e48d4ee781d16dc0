//! Unit normalization for ESG telemetry.
//!
//! Everything downstream of validation works in canonical units:
//! energy in kWh, water in liters, time in seconds (workload-hours for
//! reporting). Unknown units are rejected at the validation boundary.

use crate::errors::{TelemetryError, TelemetryResult};

pub const ENERGY_CANONICAL: &str = "kWh";
pub const WATER_CANONICAL: &str = "liters";
pub const CARBON_CANONICAL: &str = "kg_co2e";

const ENERGY_TO_KWH: &[(&str, f64)] = &[
    ("kWh", 1.0),
    ("MWh", 1000.0),
    ("Wh", 0.001),
    ("GWh", 1_000_000.0),
];

const WATER_TO_LITERS: &[(&str, f64)] = &[
    ("liters", 1.0),
    ("L", 1.0),
    ("m3", 1000.0),
    ("cubic_meters", 1000.0),
    ("gallons", 3.78541),
    ("gal", 3.78541),
];

const TIME_TO_SECONDS: &[(&str, f64)] = &[
    ("seconds", 1.0),
    ("s", 1.0),
    ("minutes", 60.0),
    ("min", 60.0),
    ("hours", 3600.0),
    ("h", 3600.0),
];

fn lookup(table: &[(&str, f64)], unit: &str) -> Option<f64> {
    table
        .iter()
        .find(|(name, _)| *name == unit)
        .map(|(_, factor)| *factor)
}

/// Convert energy to kWh.
pub fn normalize_energy(value: f64, unit: &str) -> TelemetryResult<f64> {
    let u = if unit.trim().is_empty() { "kWh" } else { unit.trim() };
    lookup(ENERGY_TO_KWH, u)
        .map(|f| value * f)
        .ok_or_else(|| TelemetryError::validation("energy_unit", format!("Unknown energy unit: {u}")))
}

/// Convert water volume to liters.
pub fn normalize_water(value: f64, unit: &str) -> TelemetryResult<f64> {
    let u = if unit.trim().is_empty() { "liters" } else { unit.trim() };
    lookup(WATER_TO_LITERS, u)
        .map(|f| value * f)
        .ok_or_else(|| TelemetryError::validation("water_unit", format!("Unknown water unit: {u}")))
}

/// Convert elapsed time to seconds.
pub fn normalize_time_to_seconds(value: f64, unit: &str) -> TelemetryResult<f64> {
    let u = if unit.trim().is_empty() { "seconds" } else { unit.trim() };
    lookup(TIME_TO_SECONDS, u)
        .map(|f| value * f)
        .ok_or_else(|| TelemetryError::validation("time_unit", format!("Unknown time unit: {u}")))
}

/// Elapsed seconds across `unit_count` units of hardware -> workload-hours.
/// One unit busy for one hour is one workload-hour.
pub fn seconds_to_workload_hours(seconds: f64, unit_count: f64) -> f64 {
    if unit_count <= 0.0 {
        return 0.0;
    }
    seconds / 3600.0 * unit_count
}

/// Round once at computation time to `dp` decimal places. Derived values
/// are never re-rounded on read.
pub fn round_to(value: f64, dp: u32) -> f64 {
    let p = 10f64.powi(dp as i32);
    (value * p).round() / p
}
