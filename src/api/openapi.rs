//! OpenAPI document for the HTTP API.

use axum::Json;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers;
use crate::auth::TokenPair;
use crate::grade::{Grade, GradePayload, ScoreSummary};

/// Generated API description.
#[derive(OpenApi)]
#[openapi(
    info(title = "grades_api", description = "Student grade records with summary statistics"),
    paths(
        handlers::health,
        handlers::list_grades,
        handlers::create_grade,
        handlers::grade_stats,
        handlers::get_grade,
        handlers::update_grade,
        handlers::partial_update_grade,
        handlers::delete_grade,
        handlers::obtain_token,
        handlers::refresh_token,
    ),
    components(schemas(
        Grade,
        GradePayload,
        ScoreSummary,
        TokenPair,
        handlers::HealthResponse,
        handlers::TokenRequest,
        handlers::RefreshRequest,
        handlers::AccessToken,
    )),
    modifiers(&BearerSecurity),
    tags(
        (name = "grades", description = "Grade records"),
        (name = "auth", description = "Token issuance"),
        (name = "ops", description = "Operational endpoints")
    )
)]
pub struct ApiDoc;

struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// Serve the OpenAPI document as JSON.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
