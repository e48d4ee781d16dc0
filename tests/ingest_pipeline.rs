//! End-to-end pipeline tests over the full router: ingestion, status
//! mapping, idempotency, alerting, report, and reset behavior.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use esgrid::app_state::AppState;
use esgrid::audit_log::AuditLog;
use esgrid::config::TelemetryConfig;
use esgrid::emission_factors::{EmissionFactorVersion, FactorCatalog};
use esgrid::storage::TelemetryStore;
use esgrid::storage_sled::SledTelemetryStore;
use esgrid::web::build_router;

fn factors() -> Arc<FactorCatalog> {
    let v1: EmissionFactorVersion = serde_json::from_str(
        r#"{"version_id":"v1","valid_from":"2020-01-01T00:00:00Z","valid_to":"2030-12-31T23:59:59Z",
            "location_based_kg_co2e_per_kwh":0.5,"market_based_kg_co2e_per_kwh":0.45,
            "diesel_kg_co2e_per_liter":2.68,"natural_gas_kg_co2e_per_m3":2.0,
            "regions":{"us-west":{"location_based_kg_co2e_per_kwh":0.35}}}"#,
    )
    .unwrap();
    Arc::new(FactorCatalog::from_versions(vec![v1]))
}

fn test_router(dir: &TempDir) -> (Router, Arc<AppState>) {
    let config = TelemetryConfig {
        data_dir: dir.path().join("data"),
        audit_log: dir.path().join("logs").join("telemetry_audit.log"),
        ..TelemetryConfig::default()
    };
    let store: Arc<dyn TelemetryStore> =
        Arc::new(SledTelemetryStore::open(&config.db_path()).unwrap());
    let audit = Arc::new(AuditLog::new(config.audit_log.clone()));
    let state = Arc::new(AppState::new(store, factors(), audit, config));
    (build_router(state.clone()), state)
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let mut has_content_type = false;
    for (name, value) in headers {
        if name.eq_ignore_ascii_case("content-type") {
            has_content_type = true;
        }
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(v) => {
            if !has_content_type {
                builder = builder.header("content-type", "application/json");
            }
            builder.body(Body::from(v.to_string())).unwrap()
        }
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let resp_headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, resp_headers, value)
}

fn full_payload(event_id: &str) -> Value {
    json!({
        "timestamp": "2024-06-15T12:00:00Z",
        "asset_id": "DC1",
        "region": "us-west",
        "source_id": "gw1",
        "external_event_id": event_id,
        "energy": {"facility_kwh": 1200.0, "it_kwh": 1000.0},
        "water": {"withdrawal_liters": 8000.0, "reclaimed_liters": 2400.0},
        "compute": {"gpu_hours": 200.0, "training_runs": 4},
        "hardware": {"utilization_pct": 75.0},
    })
}

#[tokio::test]
async fn test_ingest_accepted_with_benchmark_summary() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    let (status, _, body) = send(&router, "POST", "/ingest", Some(full_payload("int-001")), &[]).await;
    assert!(status == StatusCode::OK || status == StatusCode::CREATED);
    assert_eq!(body["status"], "accepted");
    assert!(body["raw_id"].is_u64());
    assert_eq!(body["observation_time_utc"], "2024-06-15T12:00:00Z");
    // us-west 0.35 kg/kWh * 1000 kWh = 350 kg CO2e
    let carbon = body["summary"]["carbon_kg_co2e"].as_f64().unwrap();
    assert!((carbon - 350.0).abs() / 350.0 < 0.005);
    assert_eq!(body["summary"]["pue"].as_f64(), Some(1.2));
    assert_eq!(body["summary"]["wue"].as_f64(), Some(8.0));
    assert_eq!(body["summary"]["carbon_per_workload_hour"].as_f64(), Some(1.75));
}

#[tokio::test]
async fn test_duplicate_returns_409_and_no_new_rows() {
    let dir = TempDir::new().unwrap();
    let (router, state) = test_router(&dir);

    let (s1, _, _) = send(&router, "POST", "/ingest", Some(full_payload("dup-001")), &[]).await;
    assert!(s1 == StatusCode::OK || s1 == StatusCode::CREATED);
    let raw_before = state.store.counts().unwrap().raw;

    let (s2, _, body) = send(&router, "POST", "/ingest", Some(full_payload("dup-001")), &[]).await;
    assert_eq!(s2, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE");
    assert_eq!(state.store.counts().unwrap().raw, raw_before);
}

#[tokio::test]
async fn test_distinct_event_ids_create_distinct_raw_ids() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    let (s1, _, b1) = send(&router, "POST", "/ingest", Some(full_payload("evt-a")), &[]).await;
    let (s2, _, b2) = send(&router, "POST", "/ingest", Some(full_payload("evt-b")), &[]).await;
    assert!(s1 == StatusCode::OK || s1 == StatusCode::CREATED);
    assert!(s2 == StatusCode::OK || s2 == StatusCode::CREATED);
    assert_ne!(b1["raw_id"], b2["raw_id"]);
}

#[tokio::test]
async fn test_validation_error_returns_400() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    let (status, _, body) = send(
        &router,
        "POST",
        "/ingest",
        Some(json!({"timestamp": "2024-06-15T12:00:00Z"})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_wrong_content_type_returns_415() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    let (status, _, body) = send(
        &router,
        "POST",
        "/ingest",
        Some(full_payload("ct-001")),
        &[("content-type", "text/plain")],
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn test_request_id_echoed() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    let (_, headers, _) = send(
        &router,
        "POST",
        "/ingest",
        Some(full_payload("rid-001")),
        &[("x-request-id", "req-abc-123")],
    )
    .await;
    assert_eq!(headers.get("x-request-id").unwrap(), "req-abc-123");

    // echoed on errors too
    let (status, headers, _) = send(
        &router,
        "POST",
        "/ingest",
        Some(json!({"timestamp": "t"})),
        &[("x-request-id", "req-err-456")],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get("x-request-id").unwrap(), "req-err-456");
}

#[tokio::test]
async fn test_critical_alert_returns_201_with_severity() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    // 2400 kWh * 0.5 kg/kWh (no region) = 1200 kg over 200 h -> 6.0 > 5.0
    let payload = json!({
        "timestamp": "2024-06-15T12:00:00Z",
        "source_id": "gw1",
        "external_event_id": "crit-001",
        "energy": {"it_kwh": 2400.0},
        "compute": {"gpu_hours": 200.0},
    });
    let (status, _, body) = send(&router, "POST", "/ingest", Some(payload), &[]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["severity"], "CRITICAL");
    let alerts = body["alerts"].as_array().unwrap();
    let critical: Vec<_> = alerts.iter().filter(|a| a["severity"] == "CRITICAL").collect();
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0]["metric"], "carbon_per_workload_hour");
    assert_eq!(critical[0]["threshold"].as_f64(), Some(5.0));
}

#[tokio::test]
async fn test_scorecard_on_demand() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    let (_, _, body) = send(
        &router,
        "POST",
        "/ingest?scorecard=1",
        Some(full_payload("score-001")),
        &[],
    )
    .await;
    assert!(body["scorecard"]["sustainability_score"].as_f64().is_some());
    assert!(body["scorecard"]["components"].is_object());

    let (_, _, plain) = send(&router, "POST", "/ingest", Some(full_payload("score-002")), &[]).await;
    assert!(plain.get("scorecard").is_none());
}

#[tokio::test]
async fn test_metrics_report_embeds_lineage() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);

    send(&router, "POST", "/ingest", Some(full_payload("rep-001")), &[]).await;
    let (status, _, body) = send(&router, "GET", "/metrics/report", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    for family in ["carbon", "water", "efficiency", "hardware", "data_quality", "mediation"] {
        assert!(body[family].is_array(), "missing family {family}");
    }
    let carbon = body["carbon"].as_array().unwrap();
    assert!(!carbon.is_empty());
    for row in carbon {
        let version = row["lineage"]["emission_factor_version"].as_str().unwrap();
        assert!(!version.is_empty());
    }
    let mediation = body["mediation"].as_array().unwrap();
    assert!(!mediation.is_empty());
    assert!(mediation[0]["details"]["status"].is_string());
}

#[tokio::test]
async fn test_reset_clears_tables_when_asked() {
    let dir = TempDir::new().unwrap();
    let (router, state) = test_router(&dir);

    send(&router, "POST", "/ingest", Some(full_payload("reset-001")), &[]).await;
    assert!(state.store.counts().unwrap().raw > 0);

    let (status, _, body) = send(
        &router,
        "POST",
        "/reset",
        Some(json!({"clear_tables": false})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(state.store.counts().unwrap().raw > 0);

    let (status, _, body) = send(
        &router,
        "POST",
        "/reset",
        Some(json!({"clear_tables": true})),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["raw_rows"].as_u64(), Some(0));
    assert_eq!(state.store.counts().unwrap().raw, 0);
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let (router, _) = test_router(&dir);
    let (status, _, body) = send(&router, "GET", "/health", None, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".to_string()));
}

#[tokio::test]
async fn test_audit_chain_survives_full_flow() {
    let dir = TempDir::new().unwrap();
    let (router, state) = test_router(&dir);

    send(&router, "POST", "/ingest", Some(full_payload("audit-001")), &[]).await;
    send(&router, "POST", "/ingest", Some(full_payload("audit-001")), &[]).await; // duplicate
    send(
        &router,
        "POST",
        "/ingest",
        Some(json!({"timestamp": "2024-06-15T12:00:00Z"})),
        &[],
    )
    .await; // rejected

    assert!(state.audit.verify_chain().unwrap() >= 3);
    assert_eq!(state.audit.count_action("ingest.accepted"), 1);
    assert_eq!(state.audit.count_action("ingest.duplicate_rejected"), 1);
    assert_eq!(state.audit.count_action("ingest.rejected"), 1);
    assert_eq!(state.audit.count_action("calculation.performed"), 1);
}
