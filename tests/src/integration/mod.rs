//! Cross-component choreography.

pub mod gateway_surface;
pub mod issuer_failover;
pub mod scheme_filter;
