//! Correlation ID for request tracking.
//!
//! Every proxied request carries an `X-Request-Id`; an inbound one is reused
//! when parseable so traces span the caller, the gateway and the backend.
//! Fresh IDs are UUID v7, time-ordered for log correlation.

use axum::http::HeaderMap;
use std::fmt;
use uuid::Uuid;

/// Header carrying the correlation ID end to end.
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// Correlation ID for tracking one request through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a new correlation ID (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Parse from string
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(s).map(Self)
    }

    /// Reuses the caller's ID when present and valid, otherwise mints one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Self::parse(value).ok())
            .unwrap_or_default()
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
