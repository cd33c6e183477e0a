use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    common::{
        response::{self, Reply},
        AppError, ErrorCode,
    },
    state::AppState,
};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorCodeEntry {
    pub code: &'static str,
    pub message: &'static str,
    pub http_status: u16,
}

#[derive(Debug, Serialize)]
pub struct ErrorCatalogue {
    pub categories: BTreeMap<&'static str, BTreeMap<&'static str, ErrorCodeEntry>>,
}

pub fn error_catalogue() -> ErrorCatalogue {
    let mut categories: BTreeMap<_, BTreeMap<_, _>> = BTreeMap::new();
    for code in ErrorCode::ALL {
        categories.entry(code.category()).or_default().insert(
            code.as_str(),
            ErrorCodeEntry {
                code: code.as_str(),
                message: code.description(),
                http_status: code.status().as_u16(),
            },
        );
    }
    ErrorCatalogue { categories }
}

pub async fn error_codes() -> Reply<ErrorCatalogue> {
    response::ok(error_catalogue())
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| AppError::internal("Failed to render metrics", e))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        body,
    ))
}

/// Envelope for paths no route matched.
pub async fn not_found() -> AppError {
    AppError::not_found("The requested resource was not found")
}

/// Envelope for a known path hit with an unsupported method.
pub async fn method_not_allowed() -> AppError {
    AppError::new(
        ErrorCode::MethodNotAllowed,
        "The HTTP method is not allowed for this resource",
    )
}
