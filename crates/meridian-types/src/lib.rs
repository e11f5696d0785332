//! # Meridian Types Crate
//!
//! Cross-crate vocabulary for the Meridian gateway: the authentication-scheme
//! enum, per-route authentication requirements resolved from service-registry
//! metadata, and the wire DTOs exchanged with the token-issuing endpoints.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary is
//!   defined here.
//! - **Closed scheme set**: `AuthenticationScheme` is a closed enum so the
//!   per-scheme dispatch in the gateway stays exhaustive at compile time.
//! - **Wire fidelity**: serde forms match the registry metadata and the
//!   token-exchange JSON bodies byte for byte, so cached values round-trip.

pub mod headers;
pub mod scheme;
pub mod wire;

pub use headers::*;
pub use scheme::{AuthenticationScheme, RouteAuthRequirement, SchemeParseError};
pub use wire::{AuthorizationResponse, TicketRequest, TicketResponse, TokenResponse};
