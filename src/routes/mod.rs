use axum::{routing::get, Router};

use crate::state::AppState;

pub mod health;
pub mod system;

pub use system::{method_not_allowed, not_found};

/// Operational endpoints that sit beside the module routers.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(system::metrics))
        .route("/error-codes", get(system::error_codes))
}
