//! HTTP API route definitions.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_grade, delete_grade, get_grade, grade_stats, health, list_grades, obtain_token,
    partial_update_grade, refresh_token, update_grade, AppState,
};
use super::openapi::openapi_json;
use crate::auth::require_bearer;
use crate::metrics::track_requests;

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    // Everything under /grades/ sits behind the bearer gate.
    let grades = Router::new()
        .route("/grades/", get(list_grades).post(create_grade))
        .route("/grades/stats/", get(grade_stats))
        .route(
            "/grades/:id/",
            get(get_grade)
                .put(update_grade)
                .patch(partial_update_grade)
                .delete(delete_grade),
        )
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_bearer,
        ));

    let mut router = Router::new()
        // Health and docs
        .route("/health", get(health))
        .route("/api/openapi.json", get(openapi_json))
        // Token issuance
        .route("/api/token/", post(obtain_token))
        .route("/api/token/refresh/", post(refresh_token))
        .merge(grades);

    if let Some(handle) = state.metrics.clone() {
        router = router.route("/metrics", get(move || std::future::ready(handle.render())));
    }

    router
        .route_layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
