use axum::{http::StatusCode, Json};
use serde::Serialize;

use super::error::ErrorCode;
use super::pagination::{Page, Pagination};

/// Uniform response envelope used by every JSON endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub is_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

pub type Reply<T> = (StatusCode, Json<ApiResponse<T>>);

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            is_success: true,
            data: Some(data),
            error: None,
            pagination: None,
        }
    }

    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            is_success: false,
            data: None,
            error: Some(ErrorInfo {
                code: code.as_str().to_string(),
                message: message.into(),
            }),
            pagination: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    pub fn paginated(page: Page<T>) -> Self {
        let pagination = page.pagination();
        Self {
            is_success: true,
            data: Some(page.items),
            error: None,
            pagination: Some(pagination),
        }
    }
}

pub fn ok<T>(data: T) -> Reply<T> {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

pub fn created<T>(data: T) -> Reply<T> {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Success without a payload, used by deletes.
pub fn done() -> Reply<()> {
    (
        StatusCode::OK,
        Json(ApiResponse {
            is_success: true,
            data: None,
            error: None,
            pagination: None,
        }),
    )
}

pub fn paged<T>(page: Page<T>) -> Reply<Vec<T>> {
    (StatusCode::OK, Json(ApiResponse::paginated(page)))
}
