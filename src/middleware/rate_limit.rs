use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::common::{AppError, ErrorCode};

/// Continuously refilling bucket; each admitted request takes one token.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn new(rps: f64, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst.max(1));
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: rps,
            last: now,
        }
    }

    pub fn allow_at(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

type BucketMap = HashMap<String, Arc<Mutex<TokenBucket>>>;

struct Inner {
    buckets: RwLock<BucketMap>,
    last_sweep: Mutex<Instant>,
    rps: f64,
    burst: u32,
    trust_proxy_headers: bool,
}

/// Per-client token buckets keyed by client address.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

impl RateLimiter {
    /// `trust_proxy_headers` keys clients by `X-Forwarded-For` / `X-Real-IP`
    /// when present; otherwise only the socket peer address counts.
    pub fn new(rps: f64, burst: u32, trust_proxy_headers: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                buckets: RwLock::new(HashMap::new()),
                last_sweep: Mutex::new(Instant::now()),
                rps,
                burst,
                trust_proxy_headers,
            }),
        }
    }

    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> bool {
        let existing = self.inner.buckets.read().get(client).cloned();
        let bucket = match existing {
            Some(bucket) => bucket,
            None => self
                .inner
                .buckets
                .write()
                .entry(client.to_string())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(TokenBucket::new(
                        self.inner.rps,
                        self.inner.burst,
                        now,
                    )))
                })
                .clone(),
        };
        let allowed = bucket.lock().allow_at(now);
        allowed
    }

    /// Drops buckets not touched since the previous sweep. Returns how many
    /// were removed.
    pub fn sweep_at(&self, now: Instant) -> usize {
        let cutoff = std::mem::replace(&mut *self.inner.last_sweep.lock(), now);
        let mut buckets = self.inner.buckets.write();
        let before = buckets.len();
        buckets.retain(|_, bucket| bucket.lock().last >= cutoff);
        before - buckets.len()
    }

    pub fn len(&self) -> usize {
        self.inner.buckets.read().len()
    }

    /// Periodically evicts idle clients so the map does not grow unbounded.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = limiter.sweep_at(Instant::now());
                debug!(removed, remaining = limiter.len(), "rate limiter sweep");
            }
        })
    }
}

/// Client key: the socket peer address, or with `trust_proxy_headers` the
/// first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer address.
pub fn client_key(req: &Request, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(forwarded) = forwarded_client(req) {
            return forwarded;
        }
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_client(req: &Request) -> Option<String> {
    let headers = req.headers();
    if let Some(first) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return Some(first.to_string());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub async fn rate_limit(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    let client = client_key(&req, limiter.inner.trust_proxy_headers);
    if !limiter.check(&client) {
        warn!(client = %client, path = %req.uri().path(), "rate limit exceeded");
        return AppError::new(
            ErrorCode::RateLimitExceeded,
            "Rate limit exceeded. Please try again later.",
        )
        .into_response();
    }
    next.run(req).await
}
