// esgrid - ESG telemetry ingestion and metrics service.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use esgrid::app_state::AppState;
use esgrid::audit_log::AuditLog;
use esgrid::config::load_config;
use esgrid::emission_factors::FactorCatalog;
use esgrid::storage::TelemetryStore;
use esgrid::storage_sled::SledTelemetryStore;
use esgrid::web::build_router;

#[derive(Parser, Debug)]
#[command(name = "esgrid", about = "ESG telemetry ingestion and metrics service")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Override the configured bind address (host:port).
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;
    let bind = cli.bind.clone().unwrap_or_else(|| config.bind.clone());

    let factors = Arc::new(
        FactorCatalog::load_dir(&config.factors_path()).context("failed to load emission factors")?,
    );
    tracing::info!(versions = ?factors.version_ids(), "emission factor catalogue loaded");

    let store: Arc<dyn TelemetryStore> = Arc::new(
        SledTelemetryStore::open(&config.db_path()).context("failed to open telemetry store")?,
    );
    let audit = Arc::new(AuditLog::new(config.audit_log.clone()));

    let state = Arc::new(AppState::new(store, factors, audit, config));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(%bind, "esgrid listening");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
