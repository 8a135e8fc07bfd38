use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

use crate::auth::{AccessGate, Role};
use crate::errors::AppError;
use crate::models::{ListParams, ReportPage};
use crate::store::ReportStore;
use crate::workflow::ReportWorkflow;

const READ_ROLES: &[Role] = &[Role::User, Role::Admin];
const UPDATE_ROLES: &[Role] = &[Role::User, Role::Admin];
const DELETE_ROLES: &[Role] = &[Role::Admin];

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Shared application state injected into handlers.
pub struct AppState<S> {
    /// Report read/update/delete orchestration.
    pub workflow: ReportWorkflow<S>,
    /// Authorization check run before every report operation.
    pub gate: AccessGate,
}

/// Routes under `/crime-reports`, without state attached.
pub fn crime_report_routes<S: ReportStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/crime-reports", get(list_crime_reports::<S>))
        .route(
            "/crime-reports/:id",
            get(get_crime_report::<S>)
                .put(update_crime_report::<S>)
                .delete(delete_crime_report::<S>),
        )
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
}

/// Full application router minus rate limiting and tracing layers.
pub fn router<S: ReportStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(crime_report_routes::<S>())
        .with_state(state)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "crime-report-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /crime-reports/:id
///
/// Returns the report with its location and crime type resolved.
pub async fn get_crime_report<S: ReportStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(&headers, READ_ROLES)?;
    tracing::info!("GET /crime-reports/{} by {}", id, principal.subject);

    let report = state.workflow.get(&id).await?;

    Ok(Json(json!({ "data": report })))
}

/// GET /crime-reports
///
/// Lists reports, newest first. Filters: `case_status`, `crime_type`,
/// `barangay`; pagination: `page` (from 1) and `limit` (max 100).
pub async fn list_crime_reports<S: ReportStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<ReportPage>, AppError> {
    let principal = state.gate.authorize(&headers, READ_ROLES)?;
    let Query(params) =
        params.map_err(|e| AppError::Validation(format!("Invalid query parameters: {}", e)))?;
    tracing::info!("GET /crime-reports by {} - params: {:?}", principal.subject, params);

    let page = state.workflow.list(params).await?;

    Ok(Json(page))
}

/// PUT /crime-reports/:id
///
/// Applies a partial update. Address fields move the linked location
/// (re-geocoding it); `crime_type` may name a type, creating it when
/// `crime_type_category` is given, or carry the id of an existing one.
pub async fn update_crime_report<S: ReportStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(&headers, UPDATE_ROLES)?;
    tracing::info!("PUT /crime-reports/{} by {}", id, principal.subject);

    let Json(payload) =
        payload.map_err(|e| AppError::Validation(format!("Malformed JSON body: {}", e.body_text())))?;

    let report = state.workflow.update(&id, payload).await?;

    Ok(Json(json!({
        "message": "Crime report updated successfully",
        "data": report
    })))
}

/// DELETE /crime-reports/:id
///
/// Deletes the report and any location or crime type left unreferenced.
pub async fn delete_crime_report<S: ReportStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let principal = state.gate.authorize(&headers, DELETE_ROLES)?;
    tracing::info!("DELETE /crime-reports/{} by {}", id, principal.subject);

    let outcome = state.workflow.delete(&id).await?;

    let mut body = json!({ "message": "Crime report deleted successfully" });
    if !outcome.warnings.is_empty() {
        body["warnings"] = json!(outcome.warnings);
    }
    Ok(Json(body))
}
