//! REST API handlers.
//!
//! Each handler calls into the [`Ledger`](heirloom_ledger::Ledger) and
//! returns the result as JSON. Failures are reported through [`ApiError`].

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, Query, State};
use heirloom_ledger::{
    ActiveDeployment, DeploymentPage, ReleaseRequest, RollbackRequest, SummaryQuery,
};
use heirloom_state::{Application, Deployment, Environment, Region};
use serde::Deserialize;

use crate::ApiState;
use crate::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Query string of `GET /history`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub application: Option<String>,
    pub environment: Option<String>,
    pub region: Option<String>,
}

/// Query string of `GET /deployments`.
#[derive(Debug, Default, Deserialize)]
pub struct ApplicationParams {
    pub application: Option<String>,
}

/// Query string of `GET /all-deployments`. Values are parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryParams {
    pub limit: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl SummaryParams {
    fn to_query(&self) -> SummaryQuery {
        SummaryQuery::new(
            positive(self.limit.as_deref()),
            positive(self.page.as_deref()),
            positive(self.page_size.as_deref()),
        )
    }
}

/// Parse a positive integer, ignoring anything else.
fn positive(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("missing query parameter: {name}")))
}

// ── Transitions ────────────────────────────────────────────────

/// POST /api/v1/release
pub async fn release(
    State(state): State<ApiState>,
    payload: Result<Json<ReleaseRequest>, JsonRejection>,
) -> ApiResult<Deployment> {
    let Json(req) = payload.map_err(|_| ApiError::invalid_payload())?;
    Ok(Json(state.ledger.release(&req)?))
}

/// POST /api/v1/rollback
pub async fn rollback(
    State(state): State<ApiState>,
    payload: Result<Json<RollbackRequest>, JsonRejection>,
) -> ApiResult<Deployment> {
    let Json(req) = payload.map_err(|_| ApiError::invalid_payload())?;
    Ok(Json(state.ledger.rollback(&req)?))
}

// ── Queries ────────────────────────────────────────────────────

/// GET /api/v1/deployments?application=
pub async fn active_deployments(
    State(state): State<ApiState>,
    Query(params): Query<ApplicationParams>,
) -> ApiResult<Vec<ActiveDeployment>> {
    let application = required(&params.application, "application")?;
    Ok(Json(state.ledger.active_deployments(application)?))
}

/// GET /api/v1/history?application=&environment=&region=
pub async fn history(
    State(state): State<ApiState>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<Deployment>> {
    let application = required(&params.application, "application")?;
    let environment = required(&params.environment, "environment")?;
    let region = required(&params.region, "region")?;
    Ok(Json(state.ledger.history(application, environment, region)?))
}

/// GET /api/v1/all-deployments?limit=&page=&pageSize=
pub async fn all_deployments(
    State(state): State<ApiState>,
    Query(params): Query<SummaryParams>,
) -> ApiResult<DeploymentPage> {
    Ok(Json(state.ledger.summaries(&params.to_query())?))
}

// ── Browsing ───────────────────────────────────────────────────

fn ids<T>(path: Result<Path<T>, PathRejection>) -> Result<T, ApiError> {
    path.map(|Path(ids)| ids)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// GET /api/v1/applications
pub async fn list_applications(State(state): State<ApiState>) -> ApiResult<Vec<Application>> {
    Ok(Json(state.ledger.applications()?))
}

/// GET /api/v1/applications/{app_id}/regions
pub async fn list_regions(
    State(state): State<ApiState>,
    path: Result<Path<u64>, PathRejection>,
) -> ApiResult<Vec<Region>> {
    let app_id = ids(path)?;
    Ok(Json(state.ledger.regions_for_application(app_id)?))
}

/// GET /api/v1/applications/{app_id}/regions/{region_id}/environments
pub async fn list_environments(
    State(state): State<ApiState>,
    path: Result<Path<(u64, u64)>, PathRejection>,
) -> ApiResult<Vec<Environment>> {
    let (app_id, region_id) = ids(path)?;
    Ok(Json(state.ledger.environments_for(app_id, region_id)?))
}

/// GET /api/v1/applications/{app_id}/environments/{env_id}/regions/{region_id}/versions
pub async fn list_versions(
    State(state): State<ApiState>,
    path: Result<Path<(u64, u64, u64)>, PathRejection>,
) -> ApiResult<Vec<Deployment>> {
    let (app_id, env_id, region_id) = ids(path)?;
    Ok(Json(state.ledger.versions_for(app_id, env_id, region_id)?))
}

/// GET /healthz
pub async fn healthz() -> &'static str {
    "ok"
}
