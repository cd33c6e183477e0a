use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

const ALLOW_METHODS: &str = "POST, OPTIONS, GET, PUT, DELETE, PATCH";
const ALLOW_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, Authorization, \
                             Accept, Origin, Cache-Control, X-Requested-With, X-Request-ID";
const MAX_AGE_SECS: &str = "86400";

/// Which origins may call the API from a browser.
#[derive(Debug, Clone)]
pub enum CorsPolicy {
    /// Any origin; the request's own origin is echoed back.
    Any,
    /// Exact matches only. An empty list admits nobody.
    List(Arc<Vec<String>>),
}

impl CorsPolicy {
    /// Development falls back to any origin when none are configured;
    /// production never does.
    pub fn new(origins: &[String], production: bool) -> Self {
        if origins.iter().any(|o| o == "*") && !production {
            return CorsPolicy::Any;
        }
        if origins.is_empty() && !production {
            return CorsPolicy::Any;
        }
        CorsPolicy::List(Arc::new(
            origins.iter().filter(|o| *o != "*").cloned().collect(),
        ))
    }

    pub fn allows(&self, origin: &str) -> bool {
        match self {
            CorsPolicy::Any => true,
            CorsPolicy::List(list) => list.iter().any(|o| o == origin),
        }
    }
}

pub async fn cors(State(policy): State<CorsPolicy>, req: Request, next: Next) -> Response {
    let origin = req.headers().get(header::ORIGIN).cloned();
    let preflight = req.method() == Method::OPTIONS;

    let mut res = if preflight {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    let headers = res.headers_mut();
    if let Some(origin) = origin {
        let allowed = origin.to_str().map(|o| policy.allows(o)).unwrap_or(false);
        if allowed {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        } else {
            debug!(origin = ?origin, "origin not allowed");
        }
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(MAX_AGE_SECS),
    );
    res
}
