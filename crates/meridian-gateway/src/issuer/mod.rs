//! Token issuer cluster access: instance health tracking and the
//! failover-aware exchange client.
//!
//! The issuer is deployed redundantly for availability, but gateway requests
//! are latency-sensitive, so failover is request-scoped and bounded: each
//! translation walks the live instances in order, never retrying beyond the
//! known instance list, and every call carries a fixed timeout.

pub mod client;
pub mod pool;

pub use client::TokenIssuerClient;
pub use pool::{InstanceHealth, IssuerFailoverPool, IssuerInstance, PoolConfig};
