//! HTTP routes over the report store and the assistant gateway.

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::assistant::AssistantGateway;
use crate::db::{helpers::format_timestamp, Database, HazardReport, NewReport};
use crate::error::ReportError;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

const REPORT_ENDPOINT: &str = "/report";
const REPORTS_ENDPOINT: &str = "/reports";
const CHAT_ENDPOINT: &str = "/chat";
const HEALTH_ENDPOINT: &str = "/health";

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub gateway: AssistantGateway,
}

/// One entry of the map listing.
#[derive(Debug, Serialize)]
struct ReportListing {
    lat: f64,
    lng: f64,
    #[serde(rename = "type")]
    category: String,
    description: String,
    timestamp: String,
}

impl From<HazardReport> for ReportListing {
    fn from(report: HazardReport) -> Self {
        Self {
            lat: report.lat,
            lng: report.lng,
            category: report.category,
            description: report.description,
            timestamp: report
                .reported_at
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<Value>,
}

impl ChatRequest {
    /// Lenient: an unreadable body or a non-string message reads as "".
    fn from_body(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    fn message(&self) -> &str {
        self.message
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
    }
}

pub fn build_router(state: AppState, allowed_origins: &[String]) -> Result<Router> {
    Ok(Router::new()
        .route(HEALTH_ENDPOINT, get(handle_health))
        .route(REPORT_ENDPOINT, post(handle_submit_report))
        .route(REPORTS_ENDPOINT, get(handle_list_reports))
        .route(CHAT_ENDPOINT, post(handle_chat))
        .layer(cors_layer(allowed_origins)?)
        .with_state(state))
}

fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer> {
    if allowed_origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE]))
}

fn report_error_response(err: ReportError, action: &str) -> Response {
    match err {
        ReportError::Validation(message) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
        ReportError::Storage(source) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": format!("db {action} failed"),
                "details": format!("{source:#}"),
            })),
        )
            .into_response(),
    }
}

async fn handle_health(State(state): State<AppState>) -> Response {
    match state.db.count_reports().await {
        Ok(count) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "reports": count })),
        )
            .into_response(),
        Err(err) => report_error_response(err, "read"),
    }
}

async fn handle_submit_report(
    State(state): State<AppState>,
    payload: Result<Json<NewReport>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("invalid report payload: {}", rejection.body_text()) })),
            )
                .into_response();
        }
    };

    log_info!("Received report: {input:?}");

    match state.db.insert_report(input).await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "message": "Location reported successfully!" })),
        )
            .into_response(),
        Err(err) => report_error_response(err, "insert"),
    }
}

async fn handle_list_reports(State(state): State<AppState>) -> Response {
    match state.db.fetch_all_reports().await {
        Ok(reports) => {
            let listing: Vec<ReportListing> = reports.into_iter().map(ReportListing::from).collect();
            (StatusCode::OK, Json(listing)).into_response()
        }
        Err(err) => report_error_response(err, "read"),
    }
}

async fn handle_chat(State(state): State<AppState>, body: Bytes) -> Response {
    let request = ChatRequest::from_body(&body);
    let message = request.message();
    log_info!("Chat request: {message}");

    let window = state.gateway.context_config().recent_window;
    let reports = match state.db.fetch_recent_reports(window).await {
        Ok(reports) => reports,
        Err(err) => {
            log_warn!("Answering without report context: {err}");
            Vec::new()
        }
    };

    let reply = state.gateway.answer(message, &reports).await;
    (StatusCode::OK, Json(json!({ "reply": reply }))).into_response()
}
