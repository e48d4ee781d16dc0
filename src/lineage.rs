//! Data lineage: metric -> source traceability.
//!
//! One `LineageRef` is built per derivation batch and embedded (not
//! referenced) into every metric derived from it, so each stored row is
//! self-contained for audit replay. The emission factor version is
//! required at construction and therefore never empty.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRef {
    pub raw_payload_id: String,
    pub source_id: String,
    pub ingestion_request_id: Option<String>,
    pub emission_factor_version: String,
    #[serde(default)]
    pub derived_from: Vec<String>,
    #[serde(default)]
    pub calculation_step: String,
}

pub fn build_lineage(
    raw_payload_id: u64,
    source_id: &str,
    ingestion_request_id: Option<&str>,
    emission_factor_version: &str,
    calculation_step: &str,
) -> LineageRef {
    LineageRef {
        raw_payload_id: raw_payload_id.to_string(),
        source_id: source_id.to_string(),
        ingestion_request_id: ingestion_request_id.map(str::to_string),
        emission_factor_version: emission_factor_version.to_string(),
        derived_from: Vec::new(),
        calculation_step: calculation_step.to_string(),
    }
}

impl LineageRef {
    /// True when the ref carries a usable factor version. Stored metrics
    /// must never fail this.
    pub fn has_factor_version(&self) -> bool {
        !self.emission_factor_version.is_empty()
    }
}
