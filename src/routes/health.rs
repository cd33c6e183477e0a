use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::{common::error::is_production_mode, state::AppState};

async fn ping(state: &AppState) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(&state.db).await.map(|_| ())
}

fn unhealthy(err: &sqlx::Error) -> (StatusCode, Json<Value>) {
    error!(error = %err, "database ping failed");
    let mut body = json!({
        "status": "unhealthy",
        "message": "Database ping failed",
    });
    if !is_production_mode() {
        body["error"] = Value::String(err.to_string());
    }
    (StatusCode::SERVICE_UNAVAILABLE, Json(body))
}

/// Liveness plus database reachability and pool occupancy.
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(err) = ping(&state).await {
        return unhealthy(&err);
    }
    let size = state.db.size();
    let idle = state.db.num_idle();
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "database": {
                "status": "connected",
                "open_connections": size,
                "in_use": (size as usize).saturating_sub(idle),
                "idle": idle,
            },
        })),
    )
}

#[instrument(skip(state))]
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match ping(&state).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Err(err) => unhealthy(&err),
    }
}

pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "alive" }))
}
