use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::common::{AppError, ErrorCode};

#[derive(Debug, Clone, Copy)]
pub struct BodyRules {
    pub max_bytes: u64,
}

fn declared_length(req: &Request) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

fn has_body(req: &Request) -> bool {
    match declared_length(req) {
        Some(len) => len > 0,
        None => req.headers().contains_key(header::TRANSFER_ENCODING),
    }
}

/// Rejects oversized declared bodies and non-JSON payloads on writes.
pub fn check(req: &Request, rules: BodyRules) -> Result<(), AppError> {
    if let Some(len) = declared_length(req) {
        if len > rules.max_bytes {
            warn!(content_length = len, max = rules.max_bytes, "request body too large");
            return Err(AppError::new(
                ErrorCode::RequestTooLarge,
                format!("Request body too large. Maximum size is {} bytes", rules.max_bytes),
            ));
        }
    }

    let method = req.method();
    if *method == Method::GET || *method == Method::DELETE || *method == Method::OPTIONS {
        return Ok(());
    }
    if !has_body(req) {
        return Ok(());
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match content_type {
        None => {
            warn!(%method, path = %req.uri().path(), "missing content-type");
            Err(AppError::bad_request("Content-Type header is required"))
        }
        Some(ct) if ct.eq_ignore_ascii_case("application/json") => Ok(()),
        Some(ct) => {
            warn!(%method, path = %req.uri().path(), content_type = %ct, "unsupported content-type");
            Err(AppError::new(
                ErrorCode::UnsupportedMediaType,
                "Content-Type must be application/json",
            ))
        }
    }
}

pub async fn validate_request(
    State(rules): State<BodyRules>,
    req: Request,
    next: Next,
) -> Response {
    if let Err(err) = check(&req, rules) {
        return err.into_response();
    }
    next.run(req).await
}
