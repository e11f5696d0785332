//! Per-route rate limiting using token buckets.
//!
//! One bucket per (route, subject) pair. The subject is the caller's
//! authentication cookie value; requests without a resolvable subject are
//! admitted unconditionally, since the limiter only meters identified
//! callers. Refill is computed lazily from elapsed wall-clock time at check
//! time, so no timer is scheduled per bucket.

use crate::domain::config::RateLimitConfig;
use crate::domain::error::ApiErrorBody;
use crate::domain::headers::cookie_value;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use meridian_types::AUTH_COOKIE_NAME;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Bucket identity: independent budgets per route and per subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    route: String,
    subject: String,
}

/// Token bucket entry for one (route, subject) pair.
struct TokenBucket {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    /// Last access time (for idle eviction)
    last_access: Instant,
}

impl TokenBucket {
    fn new(quota: Quota) -> Self {
        Self {
            limiter: RateLimiter::direct(quota),
            last_access: Instant::now(),
        }
    }

    fn check(&mut self) -> Result<(), Duration> {
        self.last_access = Instant::now();
        match self.limiter.check() {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(governor::clock::Clock::now(
                    &governor::clock::DefaultClock::default(),
                ));
                Err(wait)
            }
        }
    }
}

/// Rate limiter state shared across requests.
pub struct RateLimitState {
    buckets: DashMap<BucketKey, TokenBucket>,
    quota: Quota,
    config: RateLimitConfig,
}

impl RateLimitState {
    pub fn new(config: RateLimitConfig) -> Self {
        let capacity = NonZeroU32::new(config.capacity).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(config.refill_duration)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(capacity);

        Self {
            buckets: DashMap::new(),
            quota,
            config,
        }
    }

    /// Admission check for one request.
    ///
    /// `Err` carries the wait until the next token becomes available.
    /// Buckets for different keys never contend; concurrent checks for the
    /// same key respect the capacity bound (the underlying limiter is
    /// atomic, so tokens cannot be double-spent under race).
    pub fn check(&self, route: &str, subject: Option<&str>) -> Result<(), Duration> {
        if !self.config.enabled {
            return Ok(());
        }

        // Rate limiting applies only when a subject is resolvable.
        let Some(subject) = subject.filter(|s| !s.is_empty()) else {
            return Ok(());
        };

        let key = BucketKey {
            route: route.to_string(),
            subject: subject.to_string(),
        };

        let mut bucket = self.buckets.entry(key).or_insert_with(|| {
            debug!(route, "creating rate limit bucket");
            TokenBucket::new(self.quota)
        });

        bucket.check()
    }

    /// Evicts buckets idle longer than `max_age`.
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.buckets.retain(|key, bucket| {
            let age = now.duration_since(bucket.last_access);
            if age > max_age {
                debug!(route = %key.route, age_secs = age.as_secs(), "evicting idle rate limit bucket");
                false
            } else {
                true
            }
        });
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

/// Rate limit layer
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
        }
    }

    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Rate limit service
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let route = first_path_segment(req.uri().path()).unwrap_or_default();
            let subject = cookie_value(req.headers(), AUTH_COOKIE_NAME);

            match state.check(&route, subject.as_deref()) {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    warn!(
                        route = %route,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "rate limit exceeded"
                    );
                    Ok(rate_limit_response(&route, retry_after))
                }
            }
        })
    }
}

/// First segment of a request path, the route id.
pub fn first_path_segment(path: &str) -> Option<String> {
    path.trim_start_matches('/')
        .split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Create the 429 response for a denied request.
fn rate_limit_response(route: &str, retry_after: Duration) -> Response {
    let body = ApiErrorBody::rate_limited(route);

    let mut response = Response::new(Body::from(
        serde_json::to_vec(&body).unwrap_or_default(),
    ));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    if let Ok(value) = "application/json".parse() {
        response.headers_mut().insert("Content-Type", value);
    }
    if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
        response.headers_mut().insert("Retry-After", value);
    }

    response
}

/// Background task evicting idle buckets.
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration, max_age: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        state.cleanup(max_age);
    }
}
