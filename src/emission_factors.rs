//! Versioned emission factor catalogue.
//!
//! Loaded once at startup and shared read-only; a published version is
//! never mutated, new methodology ships as a new version file. Identical
//! (version, region, scope) always resolves to the identical factor for
//! the process lifetime.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::TelemetryResult;

pub const DEFAULT_VERSION: &str = "v1";
pub const DEFAULT_LOCATION_BASED_KG_CO2E_PER_KWH: f64 = 0.5;
pub const DEFAULT_MARKET_BASED_KG_CO2E_PER_KWH: f64 = 0.45;
pub const DEFAULT_DIESEL_KG_CO2E_PER_LITER: f64 = 2.68;
pub const DEFAULT_NATURAL_GAS_KG_CO2E_PER_M3: f64 = 2.0;

/// Region-scoped overrides within a version. Only grid-dependent factors
/// vary by region; scope 1 fuel factors are global per version.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionFactors {
    pub location_based_kg_co2e_per_kwh: Option<f64>,
    pub market_based_kg_co2e_per_kwh: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionFactorVersion {
    pub version_id: String,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    #[serde(default = "default_location")]
    pub location_based_kg_co2e_per_kwh: f64,
    #[serde(default = "default_market")]
    pub market_based_kg_co2e_per_kwh: f64,
    #[serde(default = "default_diesel")]
    pub diesel_kg_co2e_per_liter: f64,
    #[serde(default = "default_natural_gas")]
    pub natural_gas_kg_co2e_per_m3: f64,
    #[serde(default)]
    pub regions: BTreeMap<String, RegionFactors>,
}

fn default_location() -> f64 {
    DEFAULT_LOCATION_BASED_KG_CO2E_PER_KWH
}
fn default_market() -> f64 {
    DEFAULT_MARKET_BASED_KG_CO2E_PER_KWH
}
fn default_diesel() -> f64 {
    DEFAULT_DIESEL_KG_CO2E_PER_LITER
}
fn default_natural_gas() -> f64 {
    DEFAULT_NATURAL_GAS_KG_CO2E_PER_M3
}

impl EmissionFactorVersion {
    pub fn builtin_default() -> Self {
        EmissionFactorVersion {
            version_id: DEFAULT_VERSION.to_string(),
            valid_from: Some("2020-01-01T00:00:00Z".to_string()),
            valid_to: Some("2030-12-31T23:59:59Z".to_string()),
            location_based_kg_co2e_per_kwh: DEFAULT_LOCATION_BASED_KG_CO2E_PER_KWH,
            market_based_kg_co2e_per_kwh: DEFAULT_MARKET_BASED_KG_CO2E_PER_KWH,
            diesel_kg_co2e_per_liter: DEFAULT_DIESEL_KG_CO2E_PER_LITER,
            natural_gas_kg_co2e_per_m3: DEFAULT_NATURAL_GAS_KG_CO2E_PER_M3,
            regions: BTreeMap::new(),
        }
    }
}

/// Factor lookup scopes. Grid-dependent scopes consult per-region
/// overrides; scope 1 fuel factors never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorScope {
    Scope1Diesel,
    Scope1NaturalGas,
    Scope2Location,
    Scope2Market,
    GridIntensity,
}

/// Read-only catalogue of factor versions. Construct once, share via
/// `Arc`, inject into every calculation call.
#[derive(Debug, Clone)]
pub struct FactorCatalog {
    versions: BTreeMap<String, EmissionFactorVersion>,
}

impl FactorCatalog {
    /// Catalogue containing only the built-in default version.
    pub fn builtin() -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(DEFAULT_VERSION.to_string(), EmissionFactorVersion::builtin_default());
        FactorCatalog { versions }
    }

    pub fn from_versions(list: Vec<EmissionFactorVersion>) -> Self {
        let mut versions = BTreeMap::new();
        for v in list {
            versions.insert(v.version_id.clone(), v);
        }
        if !versions.contains_key(DEFAULT_VERSION) {
            versions.insert(DEFAULT_VERSION.to_string(), EmissionFactorVersion::builtin_default());
        }
        FactorCatalog { versions }
    }

    /// Load every `*.json` version file from a directory. Unreadable
    /// files are skipped with a warning; the default version is always
    /// present afterwards.
    pub fn load_dir(dir: &Path) -> TelemetryResult<Self> {
        let mut list = Vec::new();
        if dir.is_dir() {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().map(|e| e == "json").unwrap_or(false) {
                    match fs::read_to_string(&path)
                        .map_err(|e| e.to_string())
                        .and_then(|s| serde_json::from_str::<EmissionFactorVersion>(&s).map_err(|e| e.to_string()))
                    {
                        Ok(v) => list.push(v),
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping unreadable factor file");
                        }
                    }
                }
            }
        }
        Ok(Self::from_versions(list))
    }

    fn version(&self, version_id: &str) -> &EmissionFactorVersion {
        let vid = if version_id.is_empty() { DEFAULT_VERSION } else { version_id };
        self.versions
            .get(vid)
            .or_else(|| self.versions.get(DEFAULT_VERSION))
            .expect("default factor version is always present")
    }

    /// Resolve a factor. Unknown versions fall back to the default
    /// version; the version actually used is returned alongside the
    /// factor. The observation timestamp is accepted for interface
    /// stability but validity windows are not enforced against it.
    pub fn resolve(
        &self,
        version_id: &str,
        region: Option<&str>,
        scope: FactorScope,
        _timestamp_utc: Option<&str>,
    ) -> (f64, String) {
        let v = self.version(version_id);
        let region_key = region.map(str::trim).filter(|r| !r.is_empty()).unwrap_or("default");
        let factor = match scope {
            FactorScope::Scope2Location | FactorScope::GridIntensity => v
                .regions
                .get(region_key)
                .and_then(|r| r.location_based_kg_co2e_per_kwh)
                .unwrap_or(v.location_based_kg_co2e_per_kwh),
            FactorScope::Scope2Market => v
                .regions
                .get(region_key)
                .and_then(|r| r.market_based_kg_co2e_per_kwh)
                .unwrap_or(v.market_based_kg_co2e_per_kwh),
            FactorScope::Scope1Diesel => v.diesel_kg_co2e_per_liter,
            FactorScope::Scope1NaturalGas => v.natural_gas_kg_co2e_per_m3,
        };
        (factor, v.version_id.clone())
    }

    /// Full metadata for a version (valid_from, valid_to, factors).
    pub fn version_metadata(&self, version_id: &str) -> &EmissionFactorVersion {
        self.version(version_id)
    }

    pub fn version_ids(&self) -> Vec<String> {
        self.versions.keys().cloned().collect()
    }
}
