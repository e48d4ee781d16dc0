//! Water calculations: withdrawal, consumed vs returned, reclaimed %,
//! WUE, per-workload and per-production intensities, cooling tower
//! split, regional stress weighting. Inputs arrive in canonical liters.

use crate::units::round_to;

/// Regional water stress multipliers (higher = more stressed; applied to
/// water intensity for weighted reporting).
const WATER_STRESS_WEIGHTS: &[(&str, f64)] = &[
    ("default", 1.0),
    ("low", 0.8),
    ("medium", 1.0),
    ("high", 1.3),
    ("critical", 1.5),
];

/// Total withdrawal in liters.
pub fn total_withdrawal(withdrawal_liters: Option<f64>) -> f64 {
    round_to(withdrawal_liters.unwrap_or(0.0), 4)
}

/// (consumed, returned) in liters. When no explicit consumed value is
/// supplied, consumed = withdrawal - returned, floored at 0.
pub fn consumed_vs_returned(
    withdrawal_liters: Option<f64>,
    returned_liters: Option<f64>,
    consumed_liters: Option<f64>,
) -> (f64, f64) {
    let w = withdrawal_liters.unwrap_or(0.0);
    let r = returned_liters.unwrap_or(0.0);
    let c = match consumed_liters {
        Some(c) => c,
        None => (w - r).max(0.0),
    };
    (round_to(c, 4), round_to(r, 4))
}

/// Reclaimed water as a percentage of withdrawal. 0 when withdrawal <= 0.
pub fn reclaimed_pct(reclaimed_liters: Option<f64>, withdrawal_liters: Option<f64>) -> f64 {
    let w = withdrawal_liters.unwrap_or(0.0);
    if w <= 0.0 {
        return 0.0;
    }
    round_to(100.0 * reclaimed_liters.unwrap_or(0.0) / w, 2)
}

/// Water Usage Effectiveness: cooling water (L) per IT energy (kWh).
/// 0 when IT energy <= 0.
pub fn wue(total_cooling_water_liters: f64, it_energy_kwh: f64) -> f64 {
    if it_energy_kwh <= 0.0 {
        return 0.0;
    }
    round_to(total_cooling_water_liters / it_energy_kwh, 6)
}

/// Liters per workload-hour. 0 when the denominator is not positive.
pub fn water_per_workload_hour(total_water_liters: f64, workload_hours: f64) -> f64 {
    if workload_hours <= 0.0 {
        return 0.0;
    }
    round_to(total_water_liters / workload_hours, 6)
}

/// Liters per production unit (training run, batch).
pub fn water_per_production_unit(total_water_liters: f64, units: i64) -> f64 {
    if units <= 0 {
        return 0.0;
    }
    round_to(total_water_liters / units as f64, 6)
}

/// Cooling tower split: (evaporation, blowdown) in liters.
pub fn cooling_tower_split(evaporation_liters: Option<f64>, blowdown_liters: Option<f64>) -> (f64, f64) {
    (
        round_to(evaporation_liters.unwrap_or(0.0), 4),
        round_to(blowdown_liters.unwrap_or(0.0), 4),
    )
}

/// Multiplier for regional water stress.
pub fn regional_stress_weight(region: Option<&str>) -> f64 {
    let key = region.map(str::trim).filter(|r| !r.is_empty()).unwrap_or("default");
    let key = key.to_ascii_lowercase();
    WATER_STRESS_WEIGHTS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, w)| *w)
        .unwrap_or(1.0)
}
