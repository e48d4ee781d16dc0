//! Storage seam for raw telemetry and derived metrics.
//!
//! All timestamps are stored as UTC ISO-8601 strings with a trailing
//! `Z`. Idempotency is a storage-layer concern: duplicate submission is
//! an expected outcome modeled by `RawInsert`, not an error path.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::errors::TelemetryResult;
use crate::models::{MetricFamily, MetricRecord, RawTelemetryRecord};

/// Outcome of an idempotent raw insert. Concurrent duplicates race to
/// insert; exactly one observes `Inserted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawInsert {
    Inserted(u64),
    Duplicate,
}

/// Row counts used by reset/report plumbing and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub raw: usize,
    pub metrics: usize,
}

pub trait TelemetryStore: Send + Sync {
    /// Insert a raw record if its idempotency key is unused. The
    /// original record is never touched on duplicate.
    fn insert_raw(&self, record: RawTelemetryRecord) -> TelemetryResult<RawInsert>;

    /// Persist one derivation batch atomically: either every record
    /// commits or none do.
    fn apply_metric_batch(&self, records: Vec<MetricRecord>) -> TelemetryResult<()>;

    fn get_raw(&self, id: u64) -> TelemetryResult<Option<RawTelemetryRecord>>;

    /// Raw records whose observation time falls in [from, to], oldest
    /// first. Bounds are normalized UTC ISO strings.
    fn raw_in_window(&self, from: &str, to: &str) -> TelemetryResult<Vec<RawTelemetryRecord>>;

    /// Most recent `limit` records of a family, newest first.
    fn latest_metrics(&self, family: MetricFamily, limit: usize) -> TelemetryResult<Vec<MetricRecord>>;

    /// Reset state. `clear_tables = false` only drops cached/in-memory
    /// state; `true` additionally deletes all raw and metric rows.
    fn reset(&self, clear_tables: bool) -> TelemetryResult<StoreCounts>;

    fn counts(&self) -> TelemetryResult<StoreCounts>;
}

pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Normalize a caller timestamp to a UTC ISO string with trailing `Z`.
/// Accepts ISO-8601 with any offset, bare date-times (assumed UTC), and
/// Unix epoch seconds or milliseconds. Unparsable input falls back to
/// the current UTC time; lenient by contract, not an error.
pub fn normalize_timestamp(ts: &str) -> String {
    let trimmed = ts.trim();
    if trimmed.is_empty() {
        return utc_now_iso();
    }

    // Epoch seconds or milliseconds.
    let digits_only = trimmed.chars().all(|c| c.is_ascii_digit() || c == '.');
    if digits_only && trimmed.len() <= 15 {
        if let Ok(mut num) = trimmed.parse::<f64>() {
            if num > 1e12 {
                num /= 1000.0;
            }
            let secs = num.trunc() as i64;
            let nanos = (num.fract() * 1e9).round() as u32;
            if let Some(dt) = DateTime::from_timestamp(secs, nanos) {
                return dt.to_rfc3339_opts(SecondsFormat::Secs, true);
            }
        }
        return utc_now_iso();
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    // Bare date-time without offset: assume UTC.
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Utc
            .from_utc_datetime(&naive)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Utc
            .from_utc_datetime(&naive)
            .to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    utc_now_iso()
}
