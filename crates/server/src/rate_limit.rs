use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::errors::ApiError;
use crate::metrics::RATE_LIMITED_TOTAL;

/// Buckets idle longer than this are dropped once the table grows large.
const IDLE_BUCKET_TTL: Duration = Duration::from_secs(120);
const PRUNE_THRESHOLD: usize = 10_000;
/// At most one pruning sweep per interval, however many clients are live.
const PRUNE_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64, // tokens per second
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: f64, refill_rate: f64, now: Instant) -> Self {
        Self { capacity, tokens: capacity, refill_rate, last_refill: now }
    }

    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_refill)
    }
}

/// Per-client limiter: `per_minute` requests, refilled evenly across the minute.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<IpAddr, TokenBucket>>,
    per_minute: u64,
    prune_threshold: usize,
    last_prune: Arc<Mutex<Instant>>,
}

impl RateLimiter {
    /// `0` disables limiting.
    pub fn per_minute(per_minute: u64) -> Self {
        Self::starting_at(per_minute, Instant::now())
    }

    fn starting_at(per_minute: u64, now: Instant) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            per_minute,
            prune_threshold: PRUNE_THRESHOLD,
            last_prune: Arc::new(Mutex::new(now)),
        }
    }

    pub fn enabled(&self) -> bool {
        self.per_minute > 0
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> bool {
        if !self.enabled() {
            return true;
        }
        if self.buckets.len() > self.prune_threshold && self.prune_due(now) {
            self.buckets.retain(|_, b| b.idle_for(now) < IDLE_BUCKET_TTL);
            debug!(remaining = self.buckets.len(), "pruned idle rate-limit buckets");
        }
        let capacity = self.per_minute as f64;
        let mut bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(capacity, capacity / 60.0, now));
        bucket.try_acquire(now)
    }

    /// Claims the next sweep if `PRUNE_INTERVAL` has passed; a contended lock means
    /// another request is already sweeping.
    fn prune_due(&self, now: Instant) -> bool {
        match self.last_prune.try_lock() {
            Ok(mut last) if now.saturating_duration_since(*last) >= PRUNE_INTERVAL => {
                *last = now;
                true
            }
            _ => false,
        }
    }
}

/// Middleware rejecting over-limit clients with 429 before the handler runs.
/// Requests without connection info (in-process callers) share one bucket.
pub async fn enforce(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    if !limiter.check(ip) {
        RATE_LIMITED_TOTAL.inc();
        warn!(%ip, path = %req.uri().path(), "rate limit exceeded");
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}
