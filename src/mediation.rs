//! Mediation practice findings derived from alerts and data-quality
//! confidence. Surfaced per request as one `mediation` metric record;
//! the mapping is fixed per build.

use serde_json::Value;

use crate::models::{AlertDetail, MediationFinding, MediationStatus, Severity};

const LOW_CONFIDENCE_FLOOR: f64 = 0.6;

fn practice_for_metric(metric: &str) -> Option<&'static str> {
    match metric {
        "carbon_per_workload_hour" | "grid_carbon_intensity" => Some("emissions_mitigation"),
        "wue" | "water_per_workload_hour" | "reclaimed_water_pct" => Some("water_stewardship"),
        "pue" | "cooling_energy_pct" | "chiller_cop" => Some("energy_efficiency"),
        "sensor_drift" => Some("data_quality_controls"),
        _ => None,
    }
}

/// Map triggered alerts to practice findings. A CRITICAL carbon alert is
/// a FAIL under emissions_mitigation; every other mapped alert is WARN
/// under its practice.
pub fn findings_from_alerts(alerts: &[AlertDetail]) -> Vec<MediationFinding> {
    let mut findings = Vec::new();
    for alert in alerts {
        let Some(practice) = practice_for_metric(&alert.metric) else {
            continue;
        };
        let status = if practice == "emissions_mitigation" && alert.severity == Severity::Critical {
            MediationStatus::Fail
        } else {
            MediationStatus::Warn
        };
        findings.push(MediationFinding {
            practice: practice.to_string(),
            status,
            metric: alert.metric.clone(),
            value: alert.value.clone(),
            timestamp: alert.timestamp.clone(),
        });
    }
    findings
}

/// Low composite confidence is itself a data-quality finding.
pub fn low_confidence_finding(confidence: f64, timestamp_utc: &str) -> Option<MediationFinding> {
    (confidence < LOW_CONFIDENCE_FLOOR).then(|| MediationFinding {
        practice: "data_quality_controls".to_string(),
        status: MediationStatus::Warn,
        metric: "confidence_score".to_string(),
        value: Value::from(confidence),
        timestamp: timestamp_utc.to_string(),
    })
}

/// Overall health: FAIL dominates WARN dominates OK.
pub fn overall_status(findings: &[MediationFinding]) -> MediationStatus {
    if findings.iter().any(|f| f.status == MediationStatus::Fail) {
        MediationStatus::Fail
    } else if findings.iter().any(|f| f.status == MediationStatus::Warn) {
        MediationStatus::Warn
    } else {
        MediationStatus::Ok
    }
}
