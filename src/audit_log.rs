//! Append-only audit ledger.
//!
//! One JSONL line per event, five kinds: ingest.accepted,
//! ingest.rejected, ingest.duplicate_rejected, calculation.performed,
//! alert.triggered. Lines are hash-chained (SHA-256 over the previous
//! hash plus the serialized event) so tampering is detectable, and a
//! mutex serializes writers. Audit writes are best-effort: failures are
//! logged and never propagate into the primary response.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::{TelemetryError, TelemetryResult};
use crate::models::AlertDetail;

/// A structured, hash-linked audit line.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuditLine {
    id: String,
    timestamp_utc: String,
    action: String,
    details: Value,
    hash: String,
    prev_hash: Option<String>,
}

pub struct AuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

fn chain_hash(prev_hash: Option<&str>, body: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(prev) = prev_hash {
        hasher.update(prev.as_bytes());
    }
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn read_last_hash(path: &Path) -> Option<String> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);
    let last_line = reader.lines().map_while(Result::ok).last()?;
    serde_json::from_str::<AuditLine>(&last_line).ok().map(|l| l.hash)
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AuditLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, action: &str, details: Value) -> TelemetryResult<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| TelemetryError::audit("audit lock poisoned"))?;

        if let Some(parent) = self.path.parent() {
            create_dir_all(parent)?;
        }

        let mut line = AuditLine {
            id: Uuid::new_v4().to_string(),
            timestamp_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            action: action.to_string(),
            details,
            hash: String::new(),
            prev_hash: read_last_hash(&self.path),
        };
        let body = format!("{}|{}|{}", line.id, line.action, line.details);
        line.hash = chain_hash(line.prev_hash.as_deref(), &body);

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&line)?)?;
        Ok(())
    }

    /// Append one event, swallowing failures. The primary response must
    /// never depend on the ledger being writable.
    fn write_best_effort(&self, action: &str, details: Value) {
        if let Err(e) = self.append(action, details) {
            tracing::warn!(action, error = %e, "audit write failed");
        }
    }

    pub fn ingest_accepted(
        &self,
        request_id: Option<&str>,
        source_id: &str,
        payload_hash: &str,
        emission_factor_version: &str,
    ) {
        self.write_best_effort(
            "ingest.accepted",
            json!({
                "request_id": request_id,
                "source_id": source_id,
                "payload_hash": payload_hash,
                "schema_version": "TelemetryIngestPayload",
                "emission_factor_version": emission_factor_version,
            }),
        );
    }

    pub fn ingest_rejected(&self, request_id: Option<&str>, reason: &str, payload_preview: &str) {
        let preview: String = payload_preview.chars().take(500).collect();
        self.write_best_effort(
            "ingest.rejected",
            json!({
                "request_id": request_id,
                "reason": reason,
                "payload_preview": preview,
            }),
        );
    }

    pub fn duplicate_rejected(
        &self,
        request_id: Option<&str>,
        source_id: &str,
        external_event_id: &str,
    ) {
        self.write_best_effort(
            "ingest.duplicate_rejected",
            json!({
                "request_id": request_id,
                "source_id": source_id,
                "external_event_id": external_event_id,
            }),
        );
    }

    pub fn calculation_performed(
        &self,
        metric_families: &str,
        request_id: Option<&str>,
        raw_ids: &[String],
        emission_factor_version: &str,
    ) {
        self.write_best_effort(
            "calculation.performed",
            json!({
                "metric_type": metric_families,
                "request_id": request_id,
                "lineage_ids": raw_ids,
                "emission_factor_version": emission_factor_version,
            }),
        );
    }

    pub fn alert_triggered(&self, request_id: Option<&str>, alert: &AlertDetail) {
        self.write_best_effort(
            "alert.triggered",
            json!({
                "alert_type": alert.metric,
                "severity": alert.severity,
                "request_id": request_id,
                "details": alert,
            }),
        );
    }

    /// Walk the ledger and recompute the chain. Returns the number of
    /// verified lines; fails on the first broken link.
    pub fn verify_chain(&self) -> TelemetryResult<usize> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Ok(0),
        };
        let reader = BufReader::new(file);
        let mut prev: Option<String> = None;
        let mut count = 0usize;
        for raw in reader.lines() {
            let raw = raw?;
            let line: AuditLine = serde_json::from_str(&raw)?;
            if line.prev_hash != prev {
                return Err(TelemetryError::audit(format!("chain break at line {}", count + 1)));
            }
            let body = format!("{}|{}|{}", line.id, line.action, line.details);
            if chain_hash(line.prev_hash.as_deref(), &body) != line.hash {
                return Err(TelemetryError::audit(format!("hash mismatch at line {}", count + 1)));
            }
            prev = Some(line.hash);
            count += 1;
        }
        Ok(count)
    }

    /// Count of entries for a given action kind.
    pub fn count_action(&self, action: &str) -> usize {
        let Ok(file) = File::open(&self.path) else {
            return 0;
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|l| serde_json::from_str::<AuditLine>(&l).ok())
            .filter(|l| l.action == action)
            .count()
    }
}
