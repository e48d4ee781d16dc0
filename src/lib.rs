//! Library root for the `esgrid` telemetry crate.
//!
//! Ingestion-to-metrics pipeline for ESG telemetry: schema validation,
//! idempotent raw storage, versioned-factor-driven calculation, lineage
//! construction, atomic batch persistence, threshold alerting, and an
//! append-only audit ledger.

// Core error handling
pub mod errors;

// Canonical fingerprinting & units
pub mod canonicalize;
pub mod units;

// Data model & lineage
pub mod lineage;
pub mod models;

// Ingest schema
pub mod schema;

// Versioned emission factors
pub mod emission_factors;

// Calculation engine
pub mod calc;

// Alerting & mediation
pub mod alerts;
pub mod mediation;

// Audit ledger
pub mod audit_log;

// Storage
pub mod storage;
pub mod storage_sled;

// Pipeline
pub mod orchestrator;
pub mod replay;
pub mod scorecard;

// Configuration & runtime wiring
pub mod app_state;
pub mod config;

// Web server interface
pub mod web;

// Re-export the types most callers need.
pub use app_state::AppState;
pub use audit_log::AuditLog;
pub use config::{load_config, TelemetryConfig};
pub use emission_factors::{FactorCatalog, FactorScope};
pub use errors::{TelemetryError, TelemetryResult};
pub use lineage::LineageRef;
pub use models::{AlertDetail, MetricFamily, MetricRecord, RawTelemetryRecord, Severity};
pub use orchestrator::{IngestionOrchestrator, IngestOutcome};
pub use storage::{RawInsert, TelemetryStore};
pub use storage_sled::SledTelemetryStore;
