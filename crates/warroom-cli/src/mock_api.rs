//! Local stand-in for the vendor market API and the report sink.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// A report received on `POST /v1/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReport {
    /// Report name.
    pub name: String,
    /// Report body.
    pub content: String,
    /// Optional metadata.
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Shared state of the mock server.
pub struct MockState {
    public_url: String,
    reports: RwLock<HashMap<String, StoredReport>>,
}

impl MockState {
    /// State whose report links point at `public_url`.
    pub fn new(public_url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            public_url: public_url.into().trim_end_matches('/').to_string(),
            reports: RwLock::new(HashMap::new()),
        })
    }
}

#[derive(Deserialize)]
struct SpotQuery {
    chip: String,
}

#[derive(Deserialize)]
struct ShippingQuery {
    origin: String,
    dest: String,
}

/// Build the mock API router.
pub fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/", get(health_handler))
        .route("/v1/market/spot", get(spot_handler))
        .route("/v1/shipping/estimate", get(shipping_handler))
        .route("/v1/reports", post(store_report_handler))
        .route("/v1/reports/{id}", get(fetch_report_handler))
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "online", "service": "Mock Vendor API"}))
}

/// Chips are matched by substring after uppercasing, so `h100-pcie` quotes H100.
async fn spot_handler(Query(query): Query<SpotQuery>) -> impl IntoResponse {
    let chip = query.chip.to_uppercase();
    info!(chip = %chip, "Spot price requested");
    let body = if chip.contains("H100") {
        json!({
            "chip": "H100",
            "price": 32000,
            "currency": "USD",
            "availability": 250,
            "vendor": "FastChips_Reseller_LLC",
        })
    } else if chip.contains("A100") {
        json!({
            "chip": "A100",
            "price": 15000,
            "availability": 50,
            "vendor": "Legacy_Systems_Inc",
        })
    } else {
        json!({
            "chip": query.chip,
            "price": 0,
            "availability": 0,
            "note": "No stock found in global spot market.",
        })
    };
    Json(body)
}

async fn shipping_handler(Query(query): Query<ShippingQuery>) -> impl IntoResponse {
    info!(origin = %query.origin, dest = %query.dest, "Shipping estimate requested");
    let body = if query.origin.eq_ignore_ascii_case("TW") && query.dest.eq_ignore_ascii_case("US") {
        json!({
            "route": "TW-US",
            "days": 14,
            "method": "AIR_FREIGHT_RUSH",
            "cost_per_unit": 150,
        })
    } else {
        json!({
            "route": format!("{}-{}", query.origin, query.dest),
            "days": 45,
            "method": "STANDARD_SEA",
            "cost_per_unit": 50,
        })
    };
    Json(body)
}

async fn store_report_handler(
    State(state): State<Arc<MockState>>,
    Json(report): Json<StoredReport>,
) -> impl IntoResponse {
    let id = Uuid::new_v4().to_string();
    let link = format!("{}/v1/reports/{id}", state.public_url);
    info!(id = %id, name = %report.name, bytes = report.content.len(), "Report received");
    state.reports.write().await.insert(id.clone(), report);
    (StatusCode::CREATED, Json(json!({"id": id, "link": link})))
}

async fn fetch_report_handler(
    State(state): State<Arc<MockState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.reports.read().await.get(&id) {
        Some(report) => (StatusCode::OK, Json(json!(report))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("report {id} not found")})),
        ),
    }
}
