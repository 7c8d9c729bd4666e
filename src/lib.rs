//! Student grade records over HTTP.
//!
//! Authenticated CRUD on flat grade records plus one derived endpoint that
//! reports the mean, median and mode of every stored score.
//!
//! ```text
//! scores:  88, 90
//! ───────────────────
//! mean:    89.0
//! median:  89.0
//! mode:    88   (tie, first seen wins)
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`grade`]: Grade entity, payload validation and statistics
//! - [`store`]: Memory and SQLite record stores
//! - [`auth`]: Bearer token issuance and request gate
//! - [`api`]: HTTP routes, handlers and OpenAPI document
//! - [`metrics`]: Prometheus counters and latency histograms
//! - [`utils`]: Utility functions

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod grade;
pub mod metrics;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{Result, ServiceError};
