//! Middleware stack for the proxied request path.
//!
//! Layer order: Request → RateLimit → AuthScheme → Forward
//!
//! Rate limiting gates admission before any credential work begins. The
//! gateway's own endpoints (token exchange, cache management) sit outside
//! this stack.

pub mod auth_scheme;
pub mod rate_limit;

pub use auth_scheme::{
    AuthSchemeLayer, AuthSchemeService, AuthSchemeState, FilterOutcome, PeerCertificates,
};
pub use rate_limit::{cleanup_task, RateLimitLayer, RateLimitService, RateLimitState};

use std::sync::Arc;

/// Middleware stack builder
pub struct MiddlewareStack {
    pub rate_limit: RateLimitLayer,
    pub auth_scheme: AuthSchemeLayer,
}

impl MiddlewareStack {
    pub fn new(
        rate_limit_config: crate::domain::config::RateLimitConfig,
        auth_state: Arc<AuthSchemeState>,
    ) -> Self {
        Self {
            rate_limit: RateLimitLayer::new(rate_limit_config),
            auth_scheme: AuthSchemeLayer::new(auth_state),
        }
    }

    /// Get rate limit state for the cleanup task
    pub fn rate_limit_state(&self) -> Arc<RateLimitState> {
        self.rate_limit.state()
    }
}
