//! Prometheus metrics for the HTTP layer and business operations.
//!
//! Everything is registered on a private [`Registry`] owned by [`Metrics`]
//! and rendered in the text exposition format by `GET /metrics`.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_request_size_bytes: HistogramVec,
    http_response_size_bytes: HistogramVec,
    business_operations_total: IntCounterVec,
    business_operation_duration_seconds: HistogramVec,
    business_errors_total: IntCounterVec,
}

const SIZE_BUCKETS: &[f64] = &[
    100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0,
];

impl Metrics {
    /// # Errors
    ///
    /// Fails if a metric is malformed or already registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "HTTP request latency in seconds",
            ),
            &["method", "path", "status"],
        )?;
        let http_request_size_bytes = HistogramVec::new(
            HistogramOpts::new("http_request_size_bytes", "HTTP request body size in bytes")
                .buckets(SIZE_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        let http_response_size_bytes = HistogramVec::new(
            HistogramOpts::new(
                "http_response_size_bytes",
                "HTTP response body size in bytes",
            )
            .buckets(SIZE_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        let business_operations_total = IntCounterVec::new(
            Opts::new(
                "business_operations_total",
                "Total number of business operations",
            ),
            &["module", "operation", "status"],
        )?;
        let business_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "business_operation_duration_seconds",
                "Business operation latency in seconds",
            ),
            &["module", "operation"],
        )?;
        let business_errors_total = IntCounterVec::new(
            Opts::new("business_errors_total", "Total number of business errors"),
            &["module", "operation", "error_code"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_request_size_bytes.clone()))?;
        registry.register(Box::new(http_response_size_bytes.clone()))?;
        registry.register(Box::new(business_operations_total.clone()))?;
        registry.register(Box::new(business_operation_duration_seconds.clone()))?;
        registry.register(Box::new(business_errors_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_request_size_bytes,
            http_response_size_bytes,
            business_operations_total,
            business_operation_duration_seconds,
            business_errors_total,
        })
    }

    pub fn observe_http(
        &self,
        method: &str,
        path: &str,
        status: u16,
        latency: Duration,
        request_bytes: Option<u64>,
        response_bytes: Option<u64>,
    ) {
        let status = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, status.as_str()])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path, status.as_str()])
            .observe(latency.as_secs_f64());
        if let Some(bytes) = request_bytes {
            self.http_request_size_bytes
                .with_label_values(&[method, path])
                .observe(bytes as f64);
        }
        if let Some(bytes) = response_bytes {
            self.http_response_size_bytes
                .with_label_values(&[method, path])
                .observe(bytes as f64);
        }
    }

    /// Records one business operation. `error_code` is set when it failed.
    pub fn observe_operation(
        &self,
        module: &str,
        operation: &str,
        latency: Duration,
        error_code: Option<&str>,
    ) {
        let status = if error_code.is_some() { "error" } else { "success" };
        self.business_operations_total
            .with_label_values(&[module, operation, status])
            .inc();
        self.business_operation_duration_seconds
            .with_label_values(&[module, operation])
            .observe(latency.as_secs_f64());
        if let Some(code) = error_code {
            self.business_errors_total
                .with_label_values(&[module, operation, code])
                .inc();
        }
    }

    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
