use std::any::Any;

use axum::{
    body::Body,
    http::Response,
    response::IntoResponse,
};
use tracing::error;

use crate::common::{AppError, ErrorCode};

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Turns a caught handler panic into a generic 500 envelope. The backtrace is
/// logged by the process panic hook at the moment of the panic.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    error!(panic = panic_message(payload.as_ref()), "handler panicked");
    AppError::new(ErrorCode::InternalError, "Internal server error").into_response()
}
