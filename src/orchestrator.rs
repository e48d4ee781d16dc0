//! Ingestion orchestrator: composes validation, timestamp
//! normalization, fingerprinting, idempotent raw storage, the
//! calculation fan-out, atomic metric persistence, alerting, and audit
//! into one pipeline per request.
//!
//! Requests run independently with no cross-request locking; the only
//! shared state is the read-only factor catalogue and the startup
//! configuration. A derivation batch either commits in full or not at
//! all.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::alerts::{self, AlertThresholds};
use crate::audit_log::AuditLog;
use crate::calc::{carbon, data_quality, efficiency, hardware, water};
use crate::canonicalize::payload_hash;
use crate::emission_factors::FactorCatalog;
use crate::lineage::{build_lineage, LineageRef};
use crate::mediation;
use crate::models::{
    AlertDetail, MetricFamily, MetricRecord, MetricSummary, RawTelemetryRecord, Severity,
};
use crate::schema::{validate_ingest_payload, TelemetryIngestPayload};
use crate::scorecard::{sustainability_score, ScorecardWeights};
use crate::storage::{normalize_timestamp, utc_now_iso, RawInsert, TelemetryStore};
use crate::units::{round_to, seconds_to_workload_hours};

const CALC_FAMILIES: &str = "carbon,water,efficiency,hardware,dq";

/// Result of an accepted ingest.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub raw_id: u64,
    pub observation_time_utc: String,
    pub summary: MetricSummary,
    pub alerts: Vec<AlertDetail>,
    pub severity: Option<Severity>,
}

/// One derivation pass over a validated payload.
#[derive(Debug, Clone)]
pub struct DerivedBatch {
    pub records: Vec<MetricRecord>,
    pub alerts: Vec<AlertDetail>,
    pub summary: MetricSummary,
    pub version_used: String,
}

pub struct IngestionOrchestrator {
    store: Arc<dyn TelemetryStore>,
    factors: Arc<FactorCatalog>,
    thresholds: AlertThresholds,
    weights: ScorecardWeights,
    audit: Arc<AuditLog>,
}

struct RecordCtx<'a> {
    asset_id: Option<&'a str>,
    region: Option<&'a str>,
    timestamp_utc: &'a str,
    raw_id: u64,
    lineage: &'a LineageRef,
    version_used: &'a str,
}

impl RecordCtx<'_> {
    fn record(&self, family: MetricFamily, metric_type: &str, value: f64, unit: &str) -> MetricRecord {
        MetricRecord {
            id: 0,
            family,
            metric_type: metric_type.to_string(),
            value: Some(value),
            unit: Some(unit.to_string()),
            asset_id: self.asset_id.map(str::to_string),
            region: self.region.map(str::to_string),
            scope: None,
            emission_factor_version: None,
            timestamp_utc: self.timestamp_utc.to_string(),
            raw_payload_id: self.raw_id,
            lineage: self.lineage.clone(),
            details: None,
        }
    }

    fn carbon(&self, metric_type: &str, value: f64, unit: &str, scope: Option<&str>) -> MetricRecord {
        let mut rec = self.record(MetricFamily::Carbon, metric_type, value, unit);
        rec.scope = scope.map(str::to_string);
        rec.emission_factor_version = Some(self.version_used.to_string());
        rec
    }
}

/// Overall severity: CRITICAL dominates WARNING; None when quiet.
pub fn overall_severity(alerts: &[AlertDetail]) -> Option<Severity> {
    if alerts.is_empty() {
        None
    } else if alerts.iter().any(|a| a.severity == Severity::Critical) {
        Some(Severity::Critical)
    } else {
        Some(Severity::Warning)
    }
}

impl IngestionOrchestrator {
    pub fn new(
        store: Arc<dyn TelemetryStore>,
        factors: Arc<FactorCatalog>,
        thresholds: AlertThresholds,
        weights: ScorecardWeights,
        audit: Arc<AuditLog>,
    ) -> Self {
        IngestionOrchestrator {
            store,
            factors,
            thresholds,
            weights,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Full pipeline for one submission. Validation and duplicate
    /// rejections short-circuit before any calculation runs.
    pub fn ingest(
        &self,
        data: &Value,
        request_id: Option<&str>,
        header_source_id: Option<&str>,
    ) -> Result<IngestOutcome, crate::errors::TelemetryError> {
        let payload = match validate_ingest_payload(data) {
            Ok(p) => p,
            Err(e) => {
                let preview = data.to_string();
                self.audit.ingest_rejected(request_id, &e.to_string(), &preview);
                return Err(e);
            }
        };

        let observation_utc = normalize_timestamp(&payload.timestamp);
        let fingerprint = payload_hash(data);
        let source_id = header_source_id
            .map(str::to_string)
            .or_else(|| payload.source_id.clone())
            .unwrap_or_default();
        let external_event_id = payload.external_event_id.clone().unwrap_or_default();

        let record = RawTelemetryRecord {
            id: 0,
            payload_hash: fingerprint.clone(),
            source_id: source_id.clone(),
            external_event_id: external_event_id.clone(),
            ingestion_request_id: request_id.unwrap_or_default().to_string(),
            observation_time_utc: observation_utc.clone(),
            ingestion_time_utc: utc_now_iso(),
            raw_json: data.clone(),
        };

        let raw_id = match self.store.insert_raw(record)? {
            RawInsert::Inserted(id) => id,
            RawInsert::Duplicate => {
                self.audit
                    .duplicate_rejected(request_id, &source_id, &external_event_id);
                return Err(crate::errors::TelemetryError::duplicate(
                    source_id,
                    external_event_id,
                ));
            }
        };

        let requested_version = payload.emission_factor_version.as_deref().unwrap_or("v1");
        self.audit
            .ingest_accepted(request_id, &source_id, &fingerprint, requested_version);

        let batch = derive_metrics(
            &self.factors,
            &self.thresholds,
            &payload,
            raw_id,
            request_id,
            &source_id,
            &observation_utc,
            None,
            "ingest",
        );

        // Atomic: either every derived metric for this raw record
        // commits, or the whole batch is discarded.
        self.store.apply_metric_batch(batch.records)?;

        self.audit.calculation_performed(
            CALC_FAMILIES,
            request_id,
            &[raw_id.to_string()],
            &batch.version_used,
        );
        for alert in &batch.alerts {
            self.audit.alert_triggered(request_id, alert);
        }

        let severity = overall_severity(&batch.alerts);
        Ok(IngestOutcome {
            raw_id,
            observation_time_utc: observation_utc,
            summary: batch.summary,
            alerts: batch.alerts,
            severity,
        })
    }

    /// On-demand scorecard over a request's summary; never persisted.
    pub fn scorecard(&self, summary: &MetricSummary) -> Value {
        sustainability_score(
            &self.weights,
            summary.carbon_per_workload_hour,
            None,
            summary.pue,
            summary.utilization_pct,
        )
    }
}

/// Pure derivation fan-out: no storage, no audit. Shared between live
/// ingestion and replay; replay passes a version override and its own
/// calculation step.
#[allow(clippy::too_many_arguments)]
pub fn derive_metrics(
    factors: &FactorCatalog,
    thresholds: &AlertThresholds,
    payload: &TelemetryIngestPayload,
    raw_id: u64,
    request_id: Option<&str>,
    source_id: &str,
    observation_utc: &str,
    version_override: Option<&str>,
    calculation_step: &str,
) -> DerivedBatch {
    let requested_version = version_override
        .or(payload.emission_factor_version.as_deref())
        .unwrap_or("v1");
    // Resolve the version once; the lineage carries what was actually
    // used, which is the basis for exact replay.
    let version_used = factors.version_metadata(requested_version).version_id.clone();

    let lineage = build_lineage(raw_id, source_id, request_id, &version_used, calculation_step);
    let ctx = RecordCtx {
        asset_id: payload.asset_id.as_deref(),
        region: payload.region.as_deref(),
        timestamp_utc: observation_utc,
        raw_id,
        lineage: &lineage,
        version_used: &version_used,
    };

    let mut records: Vec<MetricRecord> = Vec::new();
    let mut alert_list: Vec<AlertDetail> = Vec::new();
    let region = payload.region.as_deref();

    // Energy / carbon
    let energy = payload.energy.as_ref();
    let facility_kwh = energy.and_then(|e| e.facility_kwh);
    let it_kwh = energy.and_then(|e| e.it_kwh);
    let cooling_kwh = energy.and_then(|e| e.cooling_kwh);
    let chiller_energy_kwh = energy.and_then(|e| e.chiller_energy_kwh);
    let gen_liters = energy.and_then(|e| e.generator_fuel_liters);
    let gen_type = energy.and_then(|e| e.generator_fuel_type.as_deref());

    let (scope1, scope2, total_kg, version_used) = carbon::total_carbon(
        factors,
        facility_kwh,
        it_kwh,
        gen_liters,
        gen_type,
        region,
        &version_used,
        Some(observation_utc),
    );
    let ctx = RecordCtx {
        version_used: &version_used,
        ..ctx
    };

    if total_kg > 0.0 {
        records.push(ctx.carbon("total_kg_co2e", total_kg, "kg_co2e", Some("total")));
    }
    if scope1 > 0.0 {
        records.push(ctx.carbon("scope1_kg_co2e", scope1, "kg_co2e", Some("scope1")));
    }
    if scope2 > 0.0 {
        records.push(ctx.carbon("scope2_kg_co2e", scope2, "kg_co2e", Some("scope2_location")));
    }

    // Workload resolution
    let compute = payload.compute.as_ref();
    let workload_hours = compute.and_then(|c| {
        c.gpu_hours.or_else(|| {
            c.run_duration_seconds
                .map(|secs| seconds_to_workload_hours(secs, c.gpu_count.unwrap_or(1.0)))
        })
    });
    let training_runs = compute.and_then(|c| c.training_runs).unwrap_or(0);
    let inference_requests = compute.and_then(|c| c.inference_requests).unwrap_or(0);

    let (workload_value, workload_unit) = match (payload.workload_value, payload.workload_unit.as_deref()) {
        (Some(v), Some(u)) => (Some(v), Some(u.to_string())),
        _ => (workload_hours, workload_hours.map(|_| "workload_hour".to_string())),
    };

    let mut intensity_ratio = None;
    let mut intensity_unit = None;
    if let (Some(wv), Some(wu)) = (workload_value, workload_unit.as_deref()) {
        if wv > 0.0 && total_kg > 0.0 {
            let ratio = round_to(total_kg / wv, 6);
            let unit_name = format!("kg_co2e_per_{wu}");
            records.push(ctx.carbon("carbon_intensity", ratio, &unit_name, None));
            intensity_ratio = Some(ratio);
            intensity_unit = Some(unit_name);
        }
    }

    let mut carbon_per_wh = None;
    if let Some(wh) = workload_hours {
        if wh > 0.0 && total_kg > 0.0 {
            let cpwh = carbon::carbon_per_workload_hour(total_kg, wh);
            carbon_per_wh = Some(cpwh);
            records.push(ctx.carbon("carbon_per_workload_hour", cpwh, "kg_co2e_per_workload_hour", None));
            alert_list.extend(alerts::evaluate_carbon_intensity(thresholds, None, Some(cpwh)));
        }
    }
    if training_runs > 0 && total_kg > 0.0 {
        let cptr = carbon::carbon_per_production_unit(total_kg, training_runs);
        records.push(ctx.carbon("carbon_per_training_run", cptr, "kg_co2e_per_run", None));
    }
    if inference_requests > 0 && total_kg > 0.0 {
        let cpir = carbon::carbon_per_production_unit(total_kg, inference_requests);
        records.push(ctx.carbon("carbon_per_inference_request", cpir, "kg_co2e_per_request", None));
    }

    // Grid intensity reported by the edge
    if let Some(grid) = payload.carbon.as_ref().and_then(|c| c.grid_carbon_intensity_kg_per_kwh) {
        records.push(ctx.carbon("grid_carbon_intensity", grid, "kg_co2e_per_kwh", Some("grid")));
        alert_list.extend(alerts::evaluate_carbon_intensity(thresholds, Some(grid), None));
    }

    // Water
    if let Some(w) = payload.water.as_ref() {
        let tw = water::total_withdrawal(w.withdrawal_liters);
        if tw > 0.0 {
            records.push(ctx.record(MetricFamily::Water, "total_withdrawal_liters", tw, "liters"));
        }
        let (consumed, _returned) =
            water::consumed_vs_returned(w.withdrawal_liters, w.returned_liters, w.consumed_liters);
        let rec_pct = water::reclaimed_pct(w.reclaimed_liters, w.withdrawal_liters);

        if w.withdrawal_liters.unwrap_or(0.0) > 0.0 && it_kwh.unwrap_or(0.0) > 0.0 {
            let mut total_cooling =
                w.evaporation_liters.unwrap_or(0.0) + w.blowdown_liters.unwrap_or(0.0) + consumed;
            if total_cooling <= 0.0 {
                total_cooling = tw;
            }
            let wue_val = water::wue(total_cooling, it_kwh.unwrap_or(0.0));
            records.push(ctx.record(MetricFamily::Water, "wue", wue_val, "L_per_kWh"));
            alert_list.extend(alerts::evaluate_water(thresholds, Some(wue_val), None, None));
        }
        if workload_hours.unwrap_or(0.0) > 0.0 && tw > 0.0 {
            let wpwh = water::water_per_workload_hour(tw, workload_hours.unwrap_or(0.0));
            records.push(ctx.record(MetricFamily::Water, "water_per_workload_hour", wpwh, "liters_per_workload_hour"));
            alert_list.extend(alerts::evaluate_water(thresholds, None, Some(wpwh), None));
        }
        if training_runs > 0 && tw > 0.0 {
            let wptr = water::water_per_production_unit(tw, training_runs);
            records.push(ctx.record(MetricFamily::Water, "water_per_training_run", wptr, "liters_per_run"));
        }
        records.push(ctx.record(MetricFamily::Water, "reclaimed_water_pct", rec_pct, "pct"));
        if tw > 0.0 {
            alert_list.extend(alerts::evaluate_water(thresholds, None, None, Some(rec_pct)));
        }
    }

    // Efficiency
    if let (Some(fac), Some(it)) = (facility_kwh, it_kwh) {
        if it > 0.0 {
            let pue_val = efficiency::pue(fac, it);
            let dcie_val = efficiency::dcie(fac, it);
            records.push(ctx.record(MetricFamily::Efficiency, "pue", pue_val, "ratio"));
            records.push(ctx.record(MetricFamily::Efficiency, "dcie", dcie_val, "ratio"));
            alert_list.extend(alerts::evaluate_cooling(thresholds, Some(pue_val), None, None));
            if let Some(cool) = cooling_kwh {
                let cool_pct = efficiency::cooling_energy_pct(fac, cool);
                records.push(ctx.record(MetricFamily::Efficiency, "cooling_energy_pct", cool_pct, "pct"));
                alert_list.extend(alerts::evaluate_cooling(thresholds, None, Some(cool_pct), None));
            }
            if let (Some(cool), Some(chiller)) = (cooling_kwh, chiller_energy_kwh) {
                if chiller > 0.0 {
                    let cop = efficiency::chiller_cop(cool, chiller);
                    records.push(ctx.record(MetricFamily::Efficiency, "chiller_cop", cop, "ratio"));
                    alert_list.extend(alerts::evaluate_cooling(thresholds, None, None, Some(cop)));
                }
            }
            if workload_hours.unwrap_or(0.0) > 0.0 {
                let epu = efficiency::energy_per_workload_hour(it, workload_hours.unwrap_or(0.0));
                records.push(ctx.record(MetricFamily::Efficiency, "energy_per_workload_hour", epu, "kWh_per_workload_hour"));
            }
            if training_runs > 0 {
                let eptr = efficiency::energy_per_production_batch(it, training_runs);
                records.push(ctx.record(MetricFamily::Efficiency, "energy_per_training_run", eptr, "kWh_per_run"));
            }
        }
    }

    // Hardware
    if let Some(hw) = payload.hardware.as_ref() {
        let util = hardware::utilization_pct(hw.utilization_pct);
        let idle = hardware::idle_rate_pct(hw.idle_rate_pct);
        records.push(ctx.record(MetricFamily::Hardware, "utilization_pct", util, "pct"));
        records.push(ctx.record(MetricFamily::Hardware, "idle_rate_pct", idle, "pct"));
        if let (Some(embodied), Some(lifetime)) = (hw.embodied_kg_co2e, hw.expected_lifetime_hours) {
            let units = hw
                .unit_count
                .or(compute.and_then(|c| c.gpu_count))
                .unwrap_or(1.0);
            let amortized = hardware::embodied_carbon_per_workload_hour(embodied, lifetime, units);
            if amortized > 0.0 {
                records.push(ctx.record(
                    MetricFamily::Hardware,
                    "embodied_carbon_per_workload_hour",
                    amortized,
                    "kg_co2e_per_workload_hour",
                ));
            }
        }
    }

    // Data quality
    let mut confidence = None;
    if let Some(dq) = payload.data_quality.as_ref() {
        let conf = data_quality::confidence_score(
            dq.completeness_pct,
            dq.latency_seconds,
            dq.outlier_flag,
            dq.drift_flag,
        );
        confidence = Some(conf);
        records.push(ctx.record(MetricFamily::DataQuality, "confidence_score", conf, "0-1"));
        if dq.drift_flag == Some(true) {
            alert_list.extend(alerts::evaluate_sensor_drift(true));
        }
    }

    // Mediation findings over this request's alerts and confidence
    let mut findings = mediation::findings_from_alerts(&alert_list);
    if let Some(conf) = confidence {
        findings.extend(mediation::low_confidence_finding(conf, observation_utc));
    }
    let overall = mediation::overall_status(&findings);
    let mut mediation_record = ctx.record(MetricFamily::Mediation, "mediation_overall_health", 0.0, "");
    mediation_record.value = None;
    mediation_record.unit = None;
    mediation_record.details = Some(json!({
        "status": overall,
        "findings": findings,
    }));
    records.push(mediation_record);

    let summary = MetricSummary {
        carbon_kg_co2e: total_kg,
        carbon_per_workload_hour: carbon_per_wh,
        carbon_intensity: intensity_ratio,
        carbon_intensity_unit: intensity_unit,
        pue: match it_kwh {
            Some(it) if it > 0.0 => Some(efficiency::pue(facility_kwh.unwrap_or(0.0), it)),
            _ => None,
        },
        wue: match it_kwh {
            Some(it) if it > 0.0 => Some(water::wue(
                payload.water.as_ref().and_then(|w| w.withdrawal_liters).unwrap_or(0.0),
                it,
            )),
            _ => None,
        },
        utilization_pct: payload.hardware.as_ref().and_then(|h| h.utilization_pct),
        mediation_health: overall,
    };
    DerivedBatch {
        records,
        alerts: alert_list,
        summary,
        version_used,
    }
}
