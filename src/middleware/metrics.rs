use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::HttpBody,
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::metrics::Metrics;

/// Route template for labels. Unmatched paths share one label so scanners
/// cannot blow up metric cardinality.
fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    req: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let path = route_label(&req);
    let request_bytes = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let res = next.run(req).await;

    let response_bytes = res.body().size_hint().exact();
    metrics.observe_http(
        &method,
        &path,
        res.status().as_u16(),
        started.elapsed(),
        request_bytes,
        response_bytes,
    );
    res
}
