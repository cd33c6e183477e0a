use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use crate::common::{AppError, ErrorCode};

/// Answers `504` once `limit` elapses. The handler runs on its own task and
/// is left to finish in the background; its late result is discarded.
pub async fn enforce_timeout(
    State(limit): State<Duration>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let handler = tokio::spawn(next.run(req));

    match tokio::time::timeout(limit, handler).await {
        Ok(Ok(res)) => res,
        Ok(Err(join_err)) => {
            error!(%method, %path, error = %join_err, "request task failed");
            AppError::new(ErrorCode::InternalError, "Internal server error").into_response()
        }
        Err(_) => {
            warn!(%method, %path, timeout_secs = limit.as_secs_f64(), "request timed out");
            AppError::new(
                ErrorCode::RequestTimeout,
                "Request timeout - the server took too long to respond",
            )
            .into_response()
        }
    }
}
