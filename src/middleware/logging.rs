use std::time::Duration;

use axum::{
    extract::ConnectInfo,
    http::{header, Request, Response},
};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::{info, info_span, warn, Span};

use super::request_id::request_id;

pub const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(1);

pub fn is_slow(latency: Duration) -> bool {
    latency > SLOW_REQUEST_THRESHOLD
}

/// Opens the per-request span every handler log line is nested in.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let headers = req.headers();
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<std::net::SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_default();
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        info_span!(
            "http_request",
            request_id = %request_id(headers),
            method = %req.method(),
            path = %req.uri().path(),
            query = req.uri().query().unwrap_or(""),
            ip = %ip,
            user_agent = %user_agent,
        )
    }
}

/// One access-log line per response; 4xx/5xx and slow requests at warn.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogResponse;

impl<B> OnResponse<B> for LogResponse {
    fn on_response(self, res: &Response<B>, latency: Duration, _span: &Span) {
        let status = res.status().as_u16();
        let latency_ms = latency.as_millis() as u64;

        if is_slow(latency) {
            warn!(status, latency_ms, "slow request detected");
        }
        if status >= 400 {
            warn!(status, latency_ms, "request completed with error");
        } else {
            info!(status, latency_ms, "request completed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slow_threshold_is_exclusive() {
        assert!(!is_slow(Duration::from_millis(999)));
        assert!(!is_slow(SLOW_REQUEST_THRESHOLD));
        assert!(is_slow(Duration::from_millis(1001)));
    }
}
