//! Runtime configuration.
//!
//! Layered the usual way: compiled defaults, then `esgrid.toml`, then
//! `ESGRID_*` environment variables (double underscore for nesting, e.g.
//! `ESGRID_ALERTS__PUE_MAX=1.8`). Extracted once at startup and
//! validated; nothing re-reads the environment afterwards.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::alerts::AlertThresholds;
use crate::scorecard::ScorecardWeights;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Root for the sled database and factor files.
    pub data_dir: PathBuf,
    /// Append-only audit ledger path.
    pub audit_log: PathBuf,
    /// Optional directory of emission factor version files (`*.json`).
    pub factors_dir: Option<PathBuf>,
    pub bind: String,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub scorecard: ScorecardWeights,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            data_dir: PathBuf::from("data"),
            audit_log: PathBuf::from("logs/telemetry_audit.log"),
            factors_dir: None,
            bind: "127.0.0.1:8083".to_string(),
            alerts: AlertThresholds::default(),
            scorecard: ScorecardWeights::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("telemetry.db")
    }

    pub fn factors_path(&self) -> PathBuf {
        self.factors_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("emission_factors"))
    }
}

pub fn load_config(path: Option<&str>) -> Result<TelemetryConfig, figment::Error> {
    let figment = Figment::from(Serialized::defaults(TelemetryConfig::default()))
        .merge(Toml::file(path.unwrap_or("esgrid.toml")))
        .merge(Env::prefixed("ESGRID_").split("__"));

    let config: TelemetryConfig = figment.extract()?;

    config
        .alerts
        .validate()
        .map_err(|e| figment::Error::from(e.to_string()))?;
    config
        .scorecard
        .validate()
        .map_err(|e| figment::Error::from(e.to_string()))?;
    if config.bind.trim().is_empty() {
        return Err(figment::Error::from("bind address must be set".to_string()));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TelemetryConfig::default();
        assert!(config.alerts.validate().is_ok());
        assert!(config.scorecard.validate().is_ok());
        assert_eq!(config.alerts.carbon_per_workload_hour_max, 5.0);
        assert_eq!(config.db_path(), PathBuf::from("data/telemetry.db"));
    }

    #[test]
    fn test_factors_path_fallback() {
        let config = TelemetryConfig::default();
        assert_eq!(config.factors_path(), PathBuf::from("data/emission_factors"));
        let explicit = TelemetryConfig {
            factors_dir: Some(PathBuf::from("/etc/factors")),
            ..TelemetryConfig::default()
        };
        assert_eq!(explicit.factors_path(), PathBuf::from("/etc/factors"));
    }
}
