//! HTTP API: grade CRUD, stats, token endpoints and operational routes.

pub mod handlers;
pub mod openapi;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
