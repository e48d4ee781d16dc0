//! Shared application state wired once at startup.

use std::sync::Arc;

use crate::audit_log::AuditLog;
use crate::config::TelemetryConfig;
use crate::emission_factors::FactorCatalog;
use crate::orchestrator::IngestionOrchestrator;
use crate::storage::TelemetryStore;

pub struct AppState {
    pub store: Arc<dyn TelemetryStore>,
    pub factors: Arc<FactorCatalog>,
    pub audit: Arc<AuditLog>,
    pub orchestrator: IngestionOrchestrator,
    pub config: TelemetryConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        factors: Arc<FactorCatalog>,
        audit: Arc<AuditLog>,
        config: TelemetryConfig,
    ) -> Self {
        let orchestrator = IngestionOrchestrator::new(
            store.clone(),
            factors.clone(),
            config.alerts.clone(),
            config.scorecard.clone(),
            audit.clone(),
        );
        AppState {
            store,
            factors,
            audit,
            orchestrator,
            config,
        }
    }
}
