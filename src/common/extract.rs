use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    extract::{FromRequest, FromRequestParts},
    http::StatusCode,
};

use super::error::{AppError, ErrorCode};

/// `axum::Json` whose rejection is rendered as the standard error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with enveloped rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::new(ErrorCode::RequestTooLarge, "Request body too large")
            }
            StatusCode::UNSUPPORTED_MEDIA_TYPE => AppError::new(
                ErrorCode::UnsupportedMediaType,
                "Content-Type must be application/json",
            ),
            _ => AppError::bad_request(format!("Invalid request body: {}", rejection.body_text())),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::bad_request(format!(
            "Invalid query parameters: {}",
            rejection.body_text()
        ))
    }
}
