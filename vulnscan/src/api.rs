use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, DefaultBodyLimit, Path, Query, Request, State},
    http::{StatusCode, Uri},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use vulnscan_core::catalog::{profiles, ScanProfile};
use vulnscan_core::report::now_rfc3339;
use vulnscan_core::ratelimiter::RateLimiter;
use vulnscan_core::{Orchestrator, ScanError, ScanReport, ScanRequest, Severity, ValidationError, VulnerabilityId};

use crate::sink::{with_db, SharedDb};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub limiter: RateLimiter,
    pub db: SharedDb,
}

pub fn router(state: AppState, body_limit: usize) -> Router {
    let api = Router::new()
        .route("/api/scan", post(scan_handler))
        .route("/api/scan/types", get(scan_types_handler))
        .route("/api/history", get(history_handler))
        .route("/api/history/:id", get(history_entry_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), admission));
    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationError),
    InvalidBody(String),
    PayloadTooLarge(String),
    TooManyRequests,
    ScanFailed(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Validation(v) => (StatusCode::BAD_REQUEST, v.label(), v.to_string()),
            ApiError::InvalidBody(m) => (StatusCode::BAD_REQUEST, "Invalid request body", m.clone()),
            ApiError::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large", m.clone()),
            ApiError::TooManyRequests => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests",
                "Too many requests from this IP, please try again later".to_string(),
            ),
            ApiError::ScanFailed(m) => (StatusCode::INTERNAL_SERVER_ERROR, "Scan failed", m.clone()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, "Not found", m.clone()),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, "Server error", m.clone()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        (status, Json(json!({ "error": error, "message": message }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<ScanError> for ApiError {
    fn from(e: ScanError) -> Self {
        match e {
            ScanError::Internal(m) => ApiError::ScanFailed(m),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(r: JsonRejection) -> Self {
        if r.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(r.body_text())
        } else {
            ApiError::InvalidBody(r.body_text())
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = %e, "request failed");
        ApiError::Internal(e.to_string())
    }
}

/// Per-client admission budget for `/api/*`.
pub fn admit(limiter: &RateLimiter, client: IpAddr) -> Result<(), ApiError> {
    if limiter.try_acquire(client) {
        Ok(())
    } else {
        Err(ApiError::TooManyRequests)
    }
}

/// Peer address recorded by the listener; requests without one share a single bucket.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

async fn admission(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_ip(&req);
    match admit(&state.limiter, client) {
        Ok(()) => next.run(req).await,
        Err(e) => {
            warn!(%client, path = %req.uri().path(), "request rejected by rate limiter");
            e.into_response()
        }
    }
}

pub async fn scan_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ScanReport>, ApiError> {
    let Json(body) = payload?;
    let request = ScanRequest::from_json(&body)?;
    info!(url = request.url(), checks = request.len(), "scan request received");
    let report = state.orchestrator.scan_isolated(request).await?;
    Ok(Json(report))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInfo {
    pub id: VulnerabilityId,
    pub title: &'static str,
    pub severity: Severity,
    pub available: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTypes {
    pub profiles: Vec<ScanProfile>,
    pub available_vulnerabilities: Vec<CheckInfo>,
}

pub fn scan_types(orchestrator: &Orchestrator) -> ScanTypes {
    let available_vulnerabilities = VulnerabilityId::ALL
        .iter()
        .map(|&id| CheckInfo {
            id,
            title: id.title(),
            severity: orchestrator.severity_table().severity(id),
            available: orchestrator.registry().contains(id),
        })
        .collect();
    ScanTypes { profiles: profiles(), available_vulnerabilities }
}

pub async fn scan_types_handler(State(state): State<AppState>) -> Json<ScanTypes> {
    Json(scan_types(&state.orchestrator))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: String,
    pub url: String,
    pub vulnerabilities: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub pages: u64,
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub scans: Vec<HistoryItem>,
    pub pagination: Pagination,
}

const MAX_HISTORY_LIMIT: u32 = 100;

fn ms_to_rfc3339(ms: i64) -> String {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)
        .ok()
        .and_then(|t| t.format(&Rfc3339).ok())
        .unwrap_or_default()
}

pub async fn history_handler(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<HistoryPage>, ApiError> {
    let limit = q.limit.unwrap_or(10).clamp(1, MAX_HISTORY_LIMIT);
    let page = q.page.unwrap_or(1).max(1);
    let offset = (page as u64 - 1) * limit as u64;
    let (total, rows) = with_db(state.db.clone(), move |db| Ok((db.count_scans()?, db.recent_scans(limit, offset)?))).await?;
    let scans = rows
        .into_iter()
        .map(|r| HistoryItem { id: r.id, url: r.url, vulnerabilities: r.vulnerabilities, created_at: ms_to_rfc3339(r.created_at_ms) })
        .collect();
    let pages = total.div_ceil(limit as u64);
    Ok(Json(HistoryPage { scans, pagination: Pagination { total, page, pages } }))
}

pub async fn history_entry_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let lookup = id.clone();
    match with_db(state.db.clone(), move |db| db.scan_results(&lookup)).await? {
        Some(results) => Ok(Json(json!({ "id": id, "results": results }))),
        None => Err(ApiError::NotFound(format!("Scan {id} not found"))),
    }
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "Server is healthy",
        "timestamp": now_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn not_found_handler(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}
