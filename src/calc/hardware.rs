//! Hardware metrics: utilization/idle clamping and embodied carbon
//! amortization over lifetime workload-hours.

use crate::calc::carbon::embodied_carbon_per_asset;
use crate::units::round_to;

/// Clamp utilization to [0, 100].
pub fn utilization_pct(value: Option<f64>) -> f64 {
    round_to(value.unwrap_or(0.0).clamp(0.0, 100.0), 2)
}

/// Clamp idle rate to [0, 100].
pub fn idle_rate_pct(value: Option<f64>) -> f64 {
    round_to(value.unwrap_or(0.0).clamp(0.0, 100.0), 2)
}

/// Amortized embodied carbon per workload-hour:
/// embodied kg CO2e / (lifetime-hours * unit-count).
pub fn embodied_carbon_per_workload_hour(
    embodied_kg_co2e: f64,
    expected_lifetime_hours: f64,
    unit_count: f64,
) -> f64 {
    if expected_lifetime_hours <= 0.0 || unit_count <= 0.0 {
        return 0.0;
    }
    embodied_carbon_per_asset(embodied_kg_co2e, expected_lifetime_hours * unit_count)
}
