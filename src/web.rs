//! HTTP interface: POST /ingest, POST /replay, GET /metrics/report,
//! POST /reset, GET /health.
//!
//! The routing layer stays thin: content-type gate, header extraction,
//! request-id echo, and status mapping. All pipeline logic lives in the
//! orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;
use crate::errors::TelemetryError;
use crate::models::MetricFamily;
use crate::replay::{run_replay, ReplayRequest};

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ingest", post(ingest))
        .route("/replay", post(replay))
        .route("/metrics/report", get(metrics_report))
        .route("/reset", post(reset))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(Extension(state))
}

fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-request-id").and_then(|v| v.to_str().ok())
}

fn source_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-ingestion-source")
        .or_else(|| headers.get("x-source-id"))
        .and_then(|v| v.to_str().ok())
}

fn echo_request_id(mut resp: Response, request_id: Option<&str>) -> Response {
    if let Some(rid) = request_id {
        if let Ok(value) = HeaderValue::from_str(rid) {
            resp.headers_mut().insert("x-request-id", value);
        }
    }
    resp
}

/// Content-type gate plus body parse. A present content type must carry
/// application/json; the body must be a JSON object.
fn ensure_json(headers: &HeaderMap, body: &str) -> Result<Value, TelemetryError> {
    if let Some(ct) = headers.get(header::CONTENT_TYPE) {
        let ct = ct.to_str().unwrap_or("");
        if !ct.contains("application/json") {
            return Err(TelemetryError::UnsupportedMediaType);
        }
    }
    let value: Value = serde_json::from_str(body)
        .map_err(|_| TelemetryError::validation("body", "JSON body required"))?;
    if !value.is_object() {
        return Err(TelemetryError::validation("body", "JSON body required"));
    }
    Ok(value)
}

async fn ingest(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let rid = request_id(&headers);
    let data = match ensure_json(&headers, &body) {
        Ok(v) => v,
        Err(e) => return echo_request_id(e.into_response(), rid),
    };

    let outcome = match state.orchestrator.ingest(&data, rid, source_header(&headers)) {
        Ok(outcome) => outcome,
        Err(e) => return echo_request_id(e.into_response(), rid),
    };

    let mut out = json!({
        "status": "accepted",
        "raw_id": outcome.raw_id,
        "observation_time_utc": outcome.observation_time_utc,
        "summary": outcome.summary,
    });
    let include_scorecard = params
        .get("scorecard")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    if include_scorecard {
        out["scorecard"] = state.orchestrator.scorecard(&outcome.summary);
    }
    let status = if outcome.alerts.is_empty() {
        StatusCode::OK
    } else {
        out["alerts"] = json!(outcome.alerts);
        out["severity"] = json!(outcome.severity);
        StatusCode::CREATED
    };

    echo_request_id((status, Json(out)).into_response(), rid)
}

async fn replay(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let rid = request_id(&headers);
    let data = match ensure_json(&headers, &body) {
        Ok(v) => v,
        Err(e) => return echo_request_id(e.into_response(), rid),
    };
    let request: ReplayRequest = match serde_json::from_value(data) {
        Ok(r) => r,
        Err(e) => {
            return echo_request_id(
                TelemetryError::validation("replay", e.to_string()).into_response(),
                rid,
            )
        }
    };

    match run_replay(
        &state.store,
        &state.factors,
        &state.config.alerts,
        &state.audit,
        &request,
    ) {
        Ok(outcome) => echo_request_id((StatusCode::OK, Json(outcome)).into_response(), rid),
        Err(e) => echo_request_id(e.into_response(), rid),
    }
}

/// Most recent rows per metric family, lineage embedded.
async fn metrics_report(Extension(state): Extension<Arc<AppState>>) -> Response {
    let mut report = serde_json::Map::new();
    for family in MetricFamily::ALL {
        let rows = match state.store.latest_metrics(family, 20) {
            Ok(rows) => rows,
            Err(e) => return e.into_response(),
        };
        let entries: Vec<Value> = rows
            .iter()
            .map(|r| {
                let mut entry = json!({
                    "metric_type": r.metric_type,
                    "value": r.value,
                    "unit": r.unit,
                    "asset_id": r.asset_id,
                    "region": r.region,
                    "timestamp_utc": r.timestamp_utc,
                    "lineage": r.lineage,
                });
                if let Some(details) = &r.details {
                    entry["details"] = details.clone();
                }
                entry
            })
            .collect();
        report.insert(family.as_str().to_string(), Value::Array(entries));
    }
    Json(Value::Object(report)).into_response()
}

async fn reset(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let rid = request_id(&headers);
    // An empty or invalid body means the default, non-destructive reset.
    let data = ensure_json(&headers, &body).unwrap_or_else(|_| json!({}));
    let clear_tables = data
        .get("clear_tables")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match state.store.reset(clear_tables) {
        Ok(counts) => echo_request_id(
            Json(json!({
                "status": "ok",
                "cleared_tables": clear_tables,
                "raw_rows": counts.raw,
                "metric_rows": counts.metrics,
            }))
            .into_response(),
            rid,
        ),
        Err(e) => echo_request_id(e.into_response(), rid),
    }
}

async fn health() -> &'static str {
    "OK"
}
