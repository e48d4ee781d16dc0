//! Data quality meta-telemetry: completeness, latency, outlier and drift
//! heuristics, composite confidence score. Outlier/drift detection is
//! deliberately simple threshold/z-score arithmetic.

use chrono::DateTime;

use crate::units::round_to;

/// Completeness = actual / expected * 100, clamped to [0, 100].
/// An expectation of zero samples counts as fully complete.
pub fn completeness_pct(expected_samples: i64, actual_samples: i64) -> f64 {
    if expected_samples <= 0 {
        return 100.0;
    }
    round_to(
        (100.0 * actual_samples as f64 / expected_samples as f64).clamp(0.0, 100.0),
        2,
    )
}

/// Seconds between observation and ingestion, floored at 0. Unparsable
/// timestamps yield 0 rather than an error.
pub fn latency_seconds(ingestion_time_utc: &str, observation_time_utc: &str) -> f64 {
    let ing = DateTime::parse_from_rfc3339(ingestion_time_utc);
    let obs = DateTime::parse_from_rfc3339(observation_time_utc);
    match (ing, obs) {
        (Ok(ing), Ok(obs)) => {
            let delta = (ing - obs).num_milliseconds() as f64 / 1000.0;
            round_to(delta.max(0.0), 2)
        }
        _ => 0.0,
    }
}

/// Composite confidence score in [0, 1]:
/// 0.4 * completeness + 0.3 * latency decay + 0.15 * no-outlier + 0.15 * no-drift,
/// where latency decay = max(0, 1 - latency / 600) (ten minutes -> 0).
pub fn confidence_score(
    completeness_pct: Option<f64>,
    latency_seconds: Option<f64>,
    outlier_flag: Option<bool>,
    drift_flag: Option<bool>,
) -> f64 {
    let c = completeness_pct.unwrap_or(100.0) / 100.0;
    let lat_score = (1.0 - latency_seconds.unwrap_or(0.0) / 600.0).max(0.0);
    let out = if outlier_flag == Some(true) { 0.0 } else { 1.0 };
    let drift = if drift_flag == Some(true) { 0.0 } else { 1.0 };
    let score = c * 0.4 + lat_score * 0.3 + out * 0.15 + drift * 0.15;
    round_to(score.clamp(0.0, 1.0), 4)
}

/// Z-score outlier check: true when |z| exceeds the threshold and the
/// spread is meaningful.
pub fn outlier_flag(value: f64, mean: f64, std: f64, z_threshold: f64) -> bool {
    if std <= 0.0 {
        return false;
    }
    ((value - mean) / std).abs() > z_threshold
}

/// Drift check: true when the recent mean has shifted from the baseline
/// by more than `tolerance_pct`.
pub fn drift_flag(recent_mean: f64, baseline_mean: f64, tolerance_pct: f64) -> bool {
    if baseline_mean == 0.0 {
        return false;
    }
    let change_pct = 100.0 * (recent_mean - baseline_mean).abs() / baseline_mean.abs();
    change_pct > tolerance_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_inputs_full_confidence() {
        assert_eq!(confidence_score(Some(100.0), Some(0.0), Some(false), Some(false)), 1.0);
        assert_eq!(confidence_score(None, None, None, None), 1.0);
    }

    #[test]
    fn test_latency_decay() {
        // 300 s -> decay 0.5 -> 0.4 + 0.15 + 0.15 + 0.3*0.5
        assert_eq!(confidence_score(Some(100.0), Some(300.0), None, None), 0.85);
        // >= 600 s -> decay saturates at 0
        assert_eq!(confidence_score(Some(100.0), Some(1200.0), None, None), 0.7);
    }

    #[test]
    fn test_flags_reduce_confidence() {
        assert_eq!(confidence_score(Some(100.0), Some(0.0), Some(true), Some(false)), 0.85);
        assert_eq!(confidence_score(Some(100.0), Some(0.0), Some(true), Some(true)), 0.7);
    }

    #[test]
    fn test_completeness_pct() {
        assert_eq!(completeness_pct(200, 150), 75.0);
        assert_eq!(completeness_pct(0, 10), 100.0);
        assert_eq!(completeness_pct(100, 250), 100.0);
    }

    #[test]
    fn test_latency_between_iso_pair() {
        let lat = latency_seconds("2024-06-15T12:05:00Z", "2024-06-15T12:00:00Z");
        assert_eq!(lat, 300.0);
        // ingestion before observation floors at 0
        assert_eq!(latency_seconds("2024-06-15T11:00:00Z", "2024-06-15T12:00:00Z"), 0.0);
        assert_eq!(latency_seconds("garbage", "2024-06-15T12:00:00Z"), 0.0);
    }

    #[test]
    fn test_outlier_flag() {
        assert!(outlier_flag(100.0, 10.0, 5.0, 3.0));
        assert!(!outlier_flag(12.0, 10.0, 5.0, 3.0));
        assert!(!outlier_flag(100.0, 10.0, 0.0, 3.0));
    }

    #[test]
    fn test_drift_flag() {
        assert!(drift_flag(120.0, 100.0, 15.0));
        assert!(!drift_flag(110.0, 100.0, 15.0));
        assert!(!drift_flag(50.0, 0.0, 15.0));
    }
}
