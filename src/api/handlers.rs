//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::auth::{AuthUser, TokenIssuer, TokenPair};
use crate::error::ApiError;
use crate::grade::{
    summarize, FieldErrors, Grade, GradeChanges, GradeId, GradePayload, ScoreSummary,
};
use crate::metrics;
use crate::store::GradeStore;

/// Body returned by the stats endpoint when the store is empty.
pub const NO_GRADES: &str = "No grades available";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Grade records.
    pub store: Arc<dyn GradeStore>,
    /// Token issuer backing the bearer gate.
    pub tokens: Arc<TokenIssuer>,
    /// Prometheus renderer, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(store: Arc<dyn GradeStore>, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            store,
            tokens,
            metrics: None,
        }
    }

    /// Attach a Prometheus handle so `/metrics` is served.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: String,
}

/// Stats endpoint body: a summary, or an explicit "no data" marker.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StatsResponse {
    /// Mean, median and mode of all scores.
    Summary(ScoreSummary),
    /// No grades are stored.
    Empty {
        /// Always [`NO_GRADES`].
        error: &'static str,
    },
}

/// Username/password exchange request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    /// Account name.
    #[serde(default)]
    pub username: Option<String>,
    /// Account password.
    #[serde(default)]
    pub password: Option<String>,
}

/// Refresh token exchange request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    /// Refresh token from `/api/token/`.
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Newly issued access token.
#[derive(Debug, Serialize, ToSchema)]
pub struct AccessToken {
    /// Short-lived bearer credential.
    pub access: String,
}

fn parse_id(raw: &str) -> Result<GradeId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(raw.to_string()))
}

/// Writes resolve the target before looking at the body, so a missing id
/// is a 404 whatever the payload.
fn ensure_exists(state: &AppState, id: GradeId) -> Result<(), ApiError> {
    match state.store.get(id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::grade_not_found(id)),
    }
}

fn require_text<'a>(errors: &mut FieldErrors, field: &str, value: Option<&'a str>) -> &'a str {
    match value {
        None => {
            errors.add(field, "This field is required.");
            ""
        }
        Some(text) if text.is_empty() => {
            errors.add(field, "This field may not be blank.");
            ""
        }
        Some(text) => text,
    }
}

/// Health check handler - always returns 200.
#[utoipa::path(get, path = "/health", tag = "ops", responses((status = 200, body = HealthResponse)))]
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// List every grade in creation order.
#[utoipa::path(
    get,
    path = "/grades/",
    tag = "grades",
    responses(
        (status = 200, description = "All grades", body = Vec<Grade>),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0))]
pub async fn list_grades(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Grade>>, ApiError> {
    let grades = state.store.list()?;
    debug!(count = grades.len(), "Listed grades");
    Ok(Json(grades))
}

/// Create a grade.
#[utoipa::path(
    post,
    path = "/grades/",
    tag = "grades",
    request_body = GradePayload,
    responses(
        (status = 201, description = "Grade created", body = Grade),
        (status = 400, description = "Field validation errors"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0))]
pub async fn create_grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<GradePayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let new_grade = payload.validate()?;

    let grade = state.store.create(new_grade)?;
    metrics::inc_grades_created();
    info!(id = grade.id, "Created grade {}", grade);

    Ok((StatusCode::CREATED, Json(grade)))
}

/// Summary statistics over every stored score.
#[utoipa::path(
    get,
    path = "/grades/stats/",
    tag = "grades",
    responses(
        (status = 200, description = "Summary, or {\"error\": \"No grades available\"} when empty", body = ScoreSummary),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0))]
pub async fn grade_stats(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatsResponse>, ApiError> {
    let scores = state.store.scores()?;
    debug!(count = scores.len(), "Summarizing scores");

    Ok(Json(match summarize(&scores) {
        Some(summary) => StatsResponse::Summary(summary),
        None => StatsResponse::Empty { error: NO_GRADES },
    }))
}

/// Retrieve one grade.
#[utoipa::path(
    get,
    path = "/grades/{id}/",
    tag = "grades",
    params(("id" = i64, Path, description = "Grade id")),
    responses(
        (status = 200, description = "The grade", body = Grade),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such grade")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0, id = %id))]
pub async fn get_grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Grade>, ApiError> {
    let id = parse_id(&id)?;
    state
        .store
        .get(id)?
        .map(Json)
        .ok_or_else(|| ApiError::grade_not_found(id))
}

/// Replace a grade's name and score.
#[utoipa::path(
    put,
    path = "/grades/{id}/",
    tag = "grades",
    params(("id" = i64, Path, description = "Grade id")),
    request_body = GradePayload,
    responses(
        (status = 200, description = "Updated grade", body = Grade),
        (status = 400, description = "Field validation errors"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such grade")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0, id = %id))]
pub async fn update_grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<GradePayload>, JsonRejection>,
) -> Result<Json<Grade>, ApiError> {
    let id = parse_id(&id)?;
    ensure_exists(&state, id)?;
    let Json(payload) = payload?;
    let changes: GradeChanges = payload.validate()?.into();

    let grade = state
        .store
        .update(id, &changes)?
        .ok_or_else(|| ApiError::grade_not_found(id))?;
    metrics::inc_grades_updated();
    info!("Replaced grade {}", grade);

    Ok(Json(grade))
}

/// Change only the fields present in the body.
#[utoipa::path(
    patch,
    path = "/grades/{id}/",
    tag = "grades",
    params(("id" = i64, Path, description = "Grade id")),
    request_body = GradePayload,
    responses(
        (status = 200, description = "Updated grade", body = Grade),
        (status = 400, description = "Field validation errors"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such grade")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0, id = %id))]
pub async fn partial_update_grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<GradePayload>, JsonRejection>,
) -> Result<Json<Grade>, ApiError> {
    let id = parse_id(&id)?;
    ensure_exists(&state, id)?;
    let Json(payload) = payload?;
    let changes = payload.validate_partial()?;

    let grade = state
        .store
        .update(id, &changes)?
        .ok_or_else(|| ApiError::grade_not_found(id))?;
    metrics::inc_grades_updated();
    info!("Patched grade {}", grade);

    Ok(Json(grade))
}

/// Delete a grade.
#[utoipa::path(
    delete,
    path = "/grades/{id}/",
    tag = "grades",
    params(("id" = i64, Path, description = "Grade id")),
    responses(
        (status = 204, description = "Grade deleted"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such grade")
    ),
    security(("bearer" = []))
)]
#[instrument(skip_all, fields(user = %user.0, id = %id))]
pub async fn delete_grade(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    if !state.store.delete(id)? {
        return Err(ApiError::grade_not_found(id));
    }
    metrics::inc_grades_deleted();
    info!("Deleted grade");

    Ok(StatusCode::NO_CONTENT)
}

/// Exchange username/password for an access/refresh pair.
#[utoipa::path(
    post,
    path = "/api/token/",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Bad credentials")
    )
)]
#[instrument(skip_all)]
pub async fn obtain_token(
    State(state): State<AppState>,
    request: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(request) = request?;

    let mut errors = FieldErrors::default();
    let username = require_text(&mut errors, "username", request.username.as_deref());
    let password = require_text(&mut errors, "password", request.password.as_deref());
    if !errors.is_empty() {
        return Err(errors.into());
    }

    match state.tokens.obtain(username, password) {
        Ok(pair) => {
            metrics::inc_tokens_issued();
            info!(username, "Issued token pair");
            Ok(Json(pair))
        }
        Err(err) => {
            metrics::inc_auth_failures();
            warn!(username, "Token request refused: {}", err);
            Err(err.into())
        }
    }
}

/// Exchange a refresh token for a new access token.
#[utoipa::path(
    post,
    path = "/api/token/refresh/",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessToken),
        (status = 400, description = "Missing fields"),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
#[instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    request: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AccessToken>, ApiError> {
    let Json(request) = request?;

    let mut errors = FieldErrors::default();
    let refresh = require_text(&mut errors, "refresh", request.refresh.as_deref());
    if !errors.is_empty() {
        return Err(errors.into());
    }

    match state.tokens.refresh(refresh) {
        Ok(access) => {
            metrics::inc_tokens_issued();
            Ok(Json(AccessToken { access }))
        }
        Err(err) => {
            metrics::inc_auth_failures();
            warn!("Refresh refused: {}", err);
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_stats_serialize_as_error_marker() {
        let body = serde_json::to_value(StatsResponse::Empty { error: NO_GRADES }).unwrap();
        assert_eq!(body, json!({"error": "No grades available"}));
    }

    #[test]
    fn summary_stats_serialize_flat() {
        let body = serde_json::to_value(StatsResponse::Summary(ScoreSummary {
            mean: 89.0,
            median: 89.0,
            mode: 88,
        }))
        .unwrap();
        assert_eq!(body, json!({"mean": 89.0, "median": 89.0, "mode": 88}));
    }

    #[test]
    fn non_numeric_id_is_not_found() {
        assert!(matches!(parse_id("abc"), Err(ApiError::NotFound(_))));
        assert_eq!(parse_id("12").unwrap(), 12);
    }
}
