//! Sled-backed implementation of `TelemetryStore`.
//!
//! Three trees: `telemetry_raw` (id -> record), `raw_keys` (idempotency
//! key -> id), and `metrics` (family-prefixed ordered key -> record).
//! The raw insert runs as one transaction over the first two trees so
//! concurrent duplicate submissions race safely and exactly one wins.
//! A derivation batch is one `sled::Batch` on the metrics tree, which
//! commits atomically.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;

use crate::errors::{TelemetryError, TelemetryResult};
use crate::models::{MetricFamily, MetricRecord, RawTelemetryRecord};
use crate::storage::{RawInsert, StoreCounts, TelemetryStore};

const RAW_TREE: &str = "telemetry_raw";
const RAW_KEYS_TREE: &str = "raw_keys";
const METRICS_TREE: &str = "metrics";

pub struct SledTelemetryStore {
    db: sled::Db,
    raw: sled::Tree,
    raw_keys: sled::Tree,
    metrics: sled::Tree,
}

/// The uniqueness key. When both parts are empty the content hash
/// substitutes for the event id so distinct anonymous payloads are not
/// collapsed into one.
fn idempotency_key(source_id: &str, external_event_id: &str) -> String {
    format!("{source_id}\u{0}{external_event_id}")
}

fn metric_key(family: MetricFamily, id: u64) -> Vec<u8> {
    format!("{}/{:020}", family.as_str(), id).into_bytes()
}

impl SledTelemetryStore {
    pub fn open(path: &Path) -> TelemetryResult<Self> {
        let db = sled::open(path)?;
        let raw = db.open_tree(RAW_TREE)?;
        let raw_keys = db.open_tree(RAW_KEYS_TREE)?;
        let metrics = db.open_tree(METRICS_TREE)?;
        Ok(SledTelemetryStore {
            db,
            raw,
            raw_keys,
            metrics,
        })
    }

    fn decode_raw(bytes: &[u8]) -> TelemetryResult<RawTelemetryRecord> {
        serde_json::from_slice(bytes).map_err(|e| TelemetryError::serialization("raw_record", e))
    }

    fn decode_metric(bytes: &[u8]) -> TelemetryResult<MetricRecord> {
        serde_json::from_slice(bytes).map_err(|e| TelemetryError::serialization("metric_record", e))
    }
}

impl TelemetryStore for SledTelemetryStore {
    fn insert_raw(&self, mut record: RawTelemetryRecord) -> TelemetryResult<RawInsert> {
        if record.source_id.is_empty() && record.external_event_id.is_empty() {
            record.external_event_id = record.payload_hash.clone();
        }
        let key = idempotency_key(&record.source_id, &record.external_event_id);

        let id = self.db.generate_id()?;
        record.id = id;
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| TelemetryError::serialization("raw_record", e))?;

        let result = (&self.raw_keys, &self.raw).transaction(|(keys, raw)| {
            if keys.get(key.as_bytes())?.is_some() {
                return Err(ConflictableTransactionError::Abort(()));
            }
            raw.insert(id.to_be_bytes().to_vec(), bytes.clone())?;
            keys.insert(key.as_bytes().to_vec(), id.to_be_bytes().to_vec())?;
            Ok(())
        });

        match result {
            Ok(()) => {
                self.raw.flush()?;
                tracing::debug!(raw_id = id, "raw telemetry stored");
                Ok(RawInsert::Inserted(id))
            }
            Err(TransactionError::Abort(())) => Ok(RawInsert::Duplicate),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }

    fn apply_metric_batch(&self, records: Vec<MetricRecord>) -> TelemetryResult<()> {
        let mut batch = sled::Batch::default();
        let count = records.len();
        for mut record in records {
            record.id = self.db.generate_id()?;
            let bytes = serde_json::to_vec(&record)
                .map_err(|e| TelemetryError::serialization("metric_record", e))?;
            batch.insert(metric_key(record.family, record.id), bytes);
        }
        self.metrics.apply_batch(batch)?;
        self.metrics.flush()?;
        tracing::debug!(count, "metric batch committed");
        Ok(())
    }

    fn get_raw(&self, id: u64) -> TelemetryResult<Option<RawTelemetryRecord>> {
        match self.raw.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(Self::decode_raw(&bytes)?)),
            None => Ok(None),
        }
    }

    fn raw_in_window(&self, from: &str, to: &str) -> TelemetryResult<Vec<RawTelemetryRecord>> {
        let mut out = Vec::new();
        for item in self.raw.iter() {
            let (_, bytes) = item?;
            let record = Self::decode_raw(&bytes)?;
            if record.observation_time_utc.as_str() >= from && record.observation_time_utc.as_str() <= to {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn latest_metrics(&self, family: MetricFamily, limit: usize) -> TelemetryResult<Vec<MetricRecord>> {
        let prefix = format!("{}/", family.as_str());
        let mut out = Vec::new();
        for item in self.metrics.scan_prefix(prefix.as_bytes()).rev().take(limit) {
            let (_, bytes) = item?;
            out.push(Self::decode_metric(&bytes)?);
        }
        Ok(out)
    }

    fn reset(&self, clear_tables: bool) -> TelemetryResult<StoreCounts> {
        if clear_tables {
            self.raw.clear()?;
            self.raw_keys.clear()?;
            self.metrics.clear()?;
            tracing::info!("telemetry tables cleared");
        }
        self.db.flush()?;
        self.counts()
    }

    fn counts(&self) -> TelemetryResult<StoreCounts> {
        Ok(StoreCounts {
            raw: self.raw.len(),
            metrics: self.metrics.len(),
        })
    }
}
