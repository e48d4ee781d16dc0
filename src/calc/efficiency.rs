//! Efficiency metrics: PUE, DCiE, cooling energy %, chiller COP, energy
//! per workload-hour and per production batch.

use crate::units::round_to;

/// PUE = facility energy / IT energy. 0 when IT energy <= 0.
pub fn pue(total_facility_kwh: f64, it_kwh: f64) -> f64 {
    if it_kwh <= 0.0 {
        return 0.0;
    }
    round_to(total_facility_kwh / it_kwh, 4)
}

/// DCiE = IT energy / facility energy (the inverse of PUE, as a ratio).
pub fn dcie(total_facility_kwh: f64, it_kwh: f64) -> f64 {
    if total_facility_kwh <= 0.0 {
        return 0.0;
    }
    round_to(it_kwh / total_facility_kwh, 4)
}

/// Cooling energy as a percentage of facility energy.
pub fn cooling_energy_pct(total_facility_kwh: f64, cooling_kwh: f64) -> f64 {
    if total_facility_kwh <= 0.0 {
        return 0.0;
    }
    round_to(100.0 * cooling_kwh / total_facility_kwh, 2)
}

/// Chiller COP = cooling effect (kWh) / chiller energy input (kWh).
pub fn chiller_cop(cooling_kwh: f64, chiller_energy_kwh: f64) -> f64 {
    if chiller_energy_kwh <= 0.0 {
        return 0.0;
    }
    round_to(cooling_kwh / chiller_energy_kwh, 4)
}

/// kWh per workload-hour.
pub fn energy_per_workload_hour(total_it_kwh: f64, workload_hours: f64) -> f64 {
    if workload_hours <= 0.0 {
        return 0.0;
    }
    round_to(total_it_kwh / workload_hours, 6)
}

/// kWh per production batch (training run).
pub fn energy_per_production_batch(total_it_kwh: f64, batches: i64) -> f64 {
    if batches <= 0 {
        return 0.0;
    }
    round_to(total_it_kwh / batches as f64, 6)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pue_dcie_benchmark() {
        // facility 1200, IT 1000 -> PUE 1.2, DCiE ~0.8333
        assert_eq!(pue(1200.0, 1000.0), 1.2);
        assert_eq!(dcie(1200.0, 1000.0), 0.8333);
    }

    #[test]
    fn test_zero_denominator_guards() {
        assert_eq!(pue(100.0, 0.0), 0.0);
        assert_eq!(dcie(0.0, 100.0), 0.0);
        assert_eq!(cooling_energy_pct(0.0, 50.0), 0.0);
        assert_eq!(chiller_cop(50.0, 0.0), 0.0);
        assert_eq!(energy_per_workload_hour(100.0, 0.0), 0.0);
        assert_eq!(energy_per_production_batch(100.0, 0), 0.0);
    }

    #[test]
    fn test_extreme_load_high_pue() {
        assert_eq!(pue(10000.0, 1000.0), 10.0);
    }

    #[test]
    fn test_cooling_pct_and_cop() {
        assert_eq!(cooling_energy_pct(1000.0, 400.0), 40.0);
        assert_eq!(chiller_cop(400.0, 100.0), 4.0);
    }

    #[test]
    fn test_per_workload_values() {
        assert_eq!(energy_per_workload_hour(1000.0, 200.0), 5.0);
        assert_eq!(energy_per_production_batch(1000.0, 4), 250.0);
    }
}
