#![warn(clippy::all)]
#![deny(unsafe_code)]

//! Meridian Gateway - credential-translating API gateway core.
//!
//! Fronts a set of backend services (mainframe-resident and cloud) behind
//! one endpoint, rewriting inbound credentials into whatever credential form
//! each backend expects before forwarding the request.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         MERIDIAN GATEWAY                             │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   inbound request                                                    │
//! │        │                                                             │
//! │  ┌─────┴──────────────────────────────────┐                          │
//! │  │            Middleware Stack            │                          │
//! │  │       RateLimit → AuthScheme           │                          │
//! │  └─────┬──────────────────────────────────┘                          │
//! │        │  extract → resolve scheme → translate → mutate              │
//! │        │                                                             │
//! │  ┌─────┴─────────┐   ┌──────────────────┐   ┌───────────────────┐    │
//! │  │ SchemeRegistry│   │ TokenIssuerClient│   │ PassTicketService │    │
//! │  │  (read-through│   │ + FailoverPool   │   │ (platform seam)   │    │
//! │  │   cache)      │   │ (redundant ZAAS) │   │                   │    │
//! │  └───────────────┘   └──────────────────┘   └───────────────────┘    │
//! │        │                                                             │
//! │  ┌─────┴──────────────────────────────────┐                          │
//! │  │            Forward Stage               │                          │
//! │  └────────────────────────────────────────┘                          │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use meridian_gateway::{Collaborators, GatewayConfig, GatewayService};
//!
//! let service = GatewayService::new(GatewayConfig::default(), Collaborators::default())?;
//! service.start().await?;
//! ```
//!
//! # Security
//!
//! - Client-supplied copies of gateway-set identity headers are stripped
//!   before any processing.
//! - The gateway's own signing certificate is never forwarded as caller
//!   identity.
//! - Failed translations strip the inbound credential rather than leaking it
//!   to a backend expecting a different scheme.

pub mod domain;
pub mod issuer;
pub mod middleware;
pub mod oidc;
pub mod passticket;
pub mod proxy;
pub mod registry;
pub mod router;
pub mod service;
pub mod token;
pub mod zaas;

// Re-exports for public API
pub use domain::config::GatewayConfig;
pub use domain::credential::{extract, Credential};
pub use domain::error::{ApiErrorBody, AuthError, GatewayError};
pub use issuer::{InstanceHealth, IssuerFailoverPool, IssuerInstance, PoolConfig, TokenIssuerClient};
pub use middleware::{AuthSchemeLayer, FilterOutcome, PeerCertificates, RateLimitLayer};
pub use passticket::{DummyPassTicketService, PassTicketError, PassTicketService};
pub use service::{Collaborators, GatewayService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
