//! Core entities: raw telemetry records, derived metrics, alerts, and
//! mediation findings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::lineage::LineageRef;

/// Immutable raw submission. The (source_id, external_event_id) pair is
/// the idempotency key; duplicates are rejected, never overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTelemetryRecord {
    #[serde(default)]
    pub id: u64,
    pub payload_hash: String,
    pub source_id: String,
    pub external_event_id: String,
    pub ingestion_request_id: String,
    pub observation_time_utc: String,
    pub ingestion_time_utc: String,
    pub raw_json: Value,
}

/// Metric families, one storage partition per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricFamily {
    Carbon,
    Water,
    Efficiency,
    Hardware,
    DataQuality,
    Mediation,
}

impl MetricFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricFamily::Carbon => "carbon",
            MetricFamily::Water => "water",
            MetricFamily::Efficiency => "efficiency",
            MetricFamily::Hardware => "hardware",
            MetricFamily::DataQuality => "data_quality",
            MetricFamily::Mediation => "mediation",
        }
    }

    pub const ALL: [MetricFamily; 6] = [
        MetricFamily::Carbon,
        MetricFamily::Water,
        MetricFamily::Efficiency,
        MetricFamily::Hardware,
        MetricFamily::DataQuality,
        MetricFamily::Mediation,
    ];
}

/// One derived value. Append-only: corrections land as new records under
/// a new raw id, never as in-place updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(default)]
    pub id: u64,
    pub family: MetricFamily,
    pub metric_type: String,
    /// Absent only for mediation rows, which carry their payload in
    /// `details`.
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub asset_id: Option<String>,
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_factor_version: Option<String>,
    pub timestamp_utc: String,
    pub raw_payload_id: u64,
    pub lineage: LineageRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// Ephemeral threshold breach. Audited, returned to the caller, never
/// idempotency-checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertDetail {
    pub metric: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_min: Option<f64>,
    pub severity: Severity,
    pub timestamp: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediationStatus {
    Ok,
    Warn,
    Fail,
}

impl MediationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediationStatus::Ok => "OK",
            MediationStatus::Warn => "WARN",
            MediationStatus::Fail => "FAIL",
        }
    }
}

/// Governance/operations practice check derived from alerts and
/// data-quality confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediationFinding {
    pub practice: String,
    pub status: MediationStatus,
    pub metric: String,
    pub value: Value,
    pub timestamp: String,
}

/// Per-request metric summary returned by the ingest endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSummary {
    pub carbon_kg_co2e: f64,
    pub carbon_per_workload_hour: Option<f64>,
    pub carbon_intensity: Option<f64>,
    pub carbon_intensity_unit: Option<String>,
    pub pue: Option<f64>,
    pub wue: Option<f64>,
    pub utilization_pct: Option<f64>,
    pub mediation_health: MediationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_wire_format() {
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"WARNING\"");
    }

    #[test]
    fn test_mediation_status_wire_format() {
        assert_eq!(serde_json::to_string(&MediationStatus::Fail).unwrap(), "\"FAIL\"");
        assert_eq!(serde_json::to_string(&MediationStatus::Ok).unwrap(), "\"OK\"");
    }

    #[test]
    fn test_family_partition_names() {
        assert_eq!(MetricFamily::DataQuality.as_str(), "data_quality");
        assert_eq!(MetricFamily::ALL.len(), 6);
    }
}
