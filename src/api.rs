// =============================================================================
// api.rs — THE FRONT DOOR
// =============================================================================
//
// A handful of JSON endpoints for the ops screens:
//
//   POST /api/report-analysis            submit a batch of report ids
//   GET  /api/report-analysis/{task_id}  poll it
//   GET  /api/court?text=...             tally pasted CNJs by court
//   GET  /api/distribution?cnj=...       who got this case, and when
//   GET  /api/companies/{id}/regexps     a client's party patterns
//   POST /api/companies/{id}/validate    does this party match one?
//   GET  /metrics                        counters
//   GET  /health                         "ok"
//
// Error bodies are always {"error": "..."} with the message a human sees.
// =============================================================================

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::court;
use crate::digesto::{DigestoClient, DigestoError};
use crate::metrics::MetricsCollector;
use crate::orchestrator::{Orchestrator, TASK_NOT_FOUND};
use crate::validator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub digesto: Arc<DigestoClient>,
    pub metrics: Arc<MetricsCollector>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/report-analysis", post(submit_analysis))
        .route("/api/report-analysis/{task_id}", get(analysis_status))
        .route("/api/court", get(court_tally))
        .route("/api/distribution", get(distribution))
        .route("/api/companies/{company_id}/regexps", get(company_regexps))
        .route("/api/companies/{company_id}/validate", post(validate_party))
        .route("/metrics", get(metrics))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn digesto_error_response(e: DigestoError) -> Response {
    let status = match &e {
        DigestoError::InvalidCnj | DigestoError::InvalidCompanyId => StatusCode::BAD_REQUEST,
        DigestoError::NoInformation => StatusCode::NOT_FOUND,
        DigestoError::MissingToken | DigestoError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
        DigestoError::Status(_) | DigestoError::Http(_) | DigestoError::Url(_) => StatusCode::BAD_GATEWAY,
    };
    error_response(status, e.to_string())
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub text: String,
}

async fn submit_analysis(State(state): State<AppState>, Json(req): Json<SubmitRequest>) -> Response {
    match state.orchestrator.submit(&req.text) {
        Ok(task_id) => Json(json!({ "taskId": task_id, "status": "PENDING" })).into_response(),
        Err(e) => {
            info!(error = %e, "Submission rejected");
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn analysis_status(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    let Ok(task_id) = Uuid::parse_str(&task_id) else {
        return error_response(StatusCode::NOT_FOUND, TASK_NOT_FOUND);
    };
    match state.orchestrator.status(&task_id) {
        Some(task) => Json(task).into_response(),
        None => error_response(StatusCode::NOT_FOUND, TASK_NOT_FOUND),
    }
}

#[derive(Debug, Deserialize)]
pub struct CourtQuery {
    #[serde(default)]
    pub text: String,
}

async fn court_tally(Query(query): Query<CourtQuery>) -> Response {
    Json(court::count_known_courts(&query.text)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct DistributionQuery {
    #[serde(default)]
    pub cnj: String,
}

async fn distribution(State(state): State<AppState>, Query(query): Query<DistributionQuery>) -> Response {
    state.metrics.increment_distribution_lookups();
    match state.digesto.distribution_lookup(&query.cnj).await {
        Ok(records) => Json(json!({ "success": true, "data": records })).into_response(),
        Err(e) => {
            warn!(error = %e, "Distribution lookup failed");
            digesto_error_response(e)
        }
    }
}

async fn company_regexps(State(state): State<AppState>, Path(company_id): Path<String>) -> Response {
    match state.digesto.regex_patterns(&company_id).await {
        Ok(regexps) => Json(json!({ "success": true, "regexps": regexps })).into_response(),
        Err(e) => digesto_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    #[serde(default)]
    pub party: String,
}

async fn validate_party(
    State(state): State<AppState>,
    Path(company_id): Path<String>,
    Json(req): Json<ValidateRequest>,
) -> Response {
    let party = req.party.trim();
    if party.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Informe a parte a ser validada.");
    }
    match state.digesto.regex_patterns(&company_id).await {
        Ok(patterns) => Json(validator::describe(party, &patterns)).into_response(),
        Err(e) => digesto_error_response(e),
    }
}

async fn metrics(State(state): State<AppState>) -> Response {
    let snapshot = state.metrics.snapshot(
        state.orchestrator.store().len(),
        Some(state.digesto.breaker().snapshot()),
    );
    Json(snapshot).into_response()
}
