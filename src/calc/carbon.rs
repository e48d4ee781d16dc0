//! Carbon calculations: scope 1/2, intensity per workload-hour and per
//! production unit, embodied carbon amortization. All factor lookups go
//! through the injected versioned catalogue so results are reproducible
//! against historical factors.

use crate::emission_factors::{FactorCatalog, FactorScope};
use crate::units::round_to;

/// Scope 1 emissions from generator fuel. Diesel factors are per liter;
/// natural gas factors are per m3, so liters are converted (/1000)
/// before the factor applies. Returns (kg_co2e, version_used).
pub fn scope1_from_generator_fuel(
    factors: &FactorCatalog,
    fuel_liters: f64,
    fuel_type: &str,
    emission_factor_version: &str,
    timestamp_utc: Option<&str>,
) -> (f64, String) {
    let is_natural_gas = fuel_type.eq_ignore_ascii_case("natural_gas");
    let scope = if is_natural_gas {
        FactorScope::Scope1NaturalGas
    } else {
        FactorScope::Scope1Diesel
    };
    let (mut factor, version) = factors.resolve(emission_factor_version, None, scope, timestamp_utc);
    if is_natural_gas {
        factor /= 1000.0;
    }
    (round_to(fuel_liters * factor, 6), version)
}

/// Scope 2 from IT energy, location- or market-based.
/// Returns (kg_co2e, version_used).
pub fn scope2_from_it_energy(
    factors: &FactorCatalog,
    it_kwh: f64,
    region: Option<&str>,
    emission_factor_version: &str,
    market_based: bool,
    timestamp_utc: Option<&str>,
) -> (f64, String) {
    let scope = if market_based {
        FactorScope::Scope2Market
    } else {
        FactorScope::Scope2Location
    };
    let (factor, version) = factors.resolve(emission_factor_version, region, scope, timestamp_utc);
    (round_to(it_kwh * factor, 6), version)
}

/// Scope 1 + scope 2 (location-based) from the energy inputs of one
/// payload. Scope 2 falls back to facility energy when IT energy is
/// absent. Returns (scope1_kg, scope2_kg, total_kg, version_used).
pub fn total_carbon(
    factors: &FactorCatalog,
    facility_kwh: Option<f64>,
    it_kwh: Option<f64>,
    generator_fuel_liters: Option<f64>,
    generator_fuel_type: Option<&str>,
    region: Option<&str>,
    emission_factor_version: &str,
    timestamp_utc: Option<&str>,
) -> (f64, f64, f64, String) {
    let mut version = if emission_factor_version.is_empty() {
        crate::emission_factors::DEFAULT_VERSION.to_string()
    } else {
        emission_factor_version.to_string()
    };

    let mut scope1 = 0.0;
    if let Some(liters) = generator_fuel_liters {
        if liters > 0.0 {
            let (s1, v) = scope1_from_generator_fuel(
                factors,
                liters,
                generator_fuel_type.unwrap_or("diesel"),
                &version,
                timestamp_utc,
            );
            scope1 = s1;
            version = v;
        }
    }

    let mut scope2 = 0.0;
    let it = it_kwh.or(facility_kwh);
    if let Some(kwh) = it {
        if kwh > 0.0 {
            let (s2, v) =
                scope2_from_it_energy(factors, kwh, region, &version, false, timestamp_utc);
            scope2 = s2;
            version = v;
        }
    }

    (scope1, scope2, round_to(scope1 + scope2, 6), version)
}

/// kg CO2e per workload-hour. 0 when the denominator is not positive.
pub fn carbon_per_workload_hour(total_kg_co2e: f64, workload_hours: f64) -> f64 {
    if workload_hours <= 0.0 {
        return 0.0;
    }
    round_to(total_kg_co2e / workload_hours, 6)
}

/// kg CO2e per production unit (training run, inference request, batch).
pub fn carbon_per_production_unit(total_kg_co2e: f64, units: i64) -> f64 {
    if units <= 0 {
        return 0.0;
    }
    round_to(total_kg_co2e / units as f64, 6)
}

/// Amortized embodied carbon for an asset over its lifetime workload.
pub fn embodied_carbon_per_asset(embodied_kg_co2e: f64, expected_lifetime_workload_hours: f64) -> f64 {
    if expected_lifetime_workload_hours <= 0.0 {
        return 0.0;
    }
    round_to(embodied_kg_co2e / expected_lifetime_workload_hours, 6)
}
