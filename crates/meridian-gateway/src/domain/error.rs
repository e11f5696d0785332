//! Error taxonomy of the credential translation layer.
//!
//! Extraction and classification problems never abort a request; they degrade
//! to the anonymous state and the proxied call proceeds. Issuer and
//! pass-ticket failures abort only the credential-setting step.

use crate::passticket::PassTicketError;
use serde::Serialize;

/// Failure modes of a scheme translation attempt.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No credential material present. A valid anonymous state, not a fault.
    #[error("no credential present on the request")]
    NoCredential,

    /// Credential material present but unusable (bad Base64, empty bearer).
    /// Collapses to the anonymous state at the filter.
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    /// Every known issuer instance failed, timed out or answered empty.
    #[error("no token issuer available ({tried} instance(s) tried)")]
    BackendUnavailable {
        /// Number of instances attempted before giving up.
        tried: usize,
    },

    /// An issuer answered 200 with no usable token fields. Folded into
    /// [`AuthError::BackendUnavailable`] once the instance list is exhausted.
    #[error("issuer instance {instance} returned an empty token response")]
    ZombieResponse {
        /// Identifier of the offending instance.
        instance: String,
    },

    /// The platform credential authority rejected pass-ticket generation.
    #[error(transparent)]
    PassTicket(#[from] PassTicketError),

    /// Route demands a pass-ticket but declares no APPLID.
    #[error("route {service_id} requires a pass-ticket but declares no APPLID")]
    MissingApplid {
        /// Route the requirement was resolved for.
        service_id: String,
    },

    /// The inbound credential could not be resolved to a user identity.
    #[error("could not resolve a user identity from the inbound credential: {0}")]
    IdentityUnresolved(String),
}

impl AuthError {
    /// True for states that mean "continue unauthenticated" rather than
    /// "translation failed".
    pub fn is_anonymous(&self) -> bool {
        matches!(self, AuthError::NoCredential | AuthError::MalformedCredential(_))
    }
}

/// Serializable error body returned by the gateway's own HTTP surface.
#[derive(Debug, Clone, Serialize)]
pub struct ApiErrorBody {
    /// Stable message key, mirrors the catalog keys used in logs.
    pub key: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl ApiErrorBody {
    pub fn new(key: &'static str, message: impl Into<String>) -> Self {
        ApiErrorBody {
            key,
            message: message.into(),
        }
    }

    /// Body for a missing or blank application name on a ticket request.
    pub fn invalid_application_name() -> Self {
        ApiErrorBody::new(
            "org.zowe.apiml.security.ticket.invalidApplicationName",
            "The 'applicationName' parameter name is missing.",
        )
    }

    /// Body for a failed pass-ticket generation.
    pub fn ticket_generate_failed(detail: impl Into<String>) -> Self {
        ApiErrorBody::new(
            "org.zowe.apiml.security.ticket.generateFailed",
            format!("The generation of the PassTicket failed: {}", detail.into()),
        )
    }

    /// Body for a rate-limited request.
    pub fn rate_limited(service_id: &str) -> Self {
        ApiErrorBody::new(
            "org.zowe.apiml.gateway.connectionsLimitApproached",
            format!("Too many requests for service {service_id}, try again later."),
        )
    }

    /// Body for an invalid or missing caller identity.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        ApiErrorBody::new("org.zowe.apiml.security.unauthorized", detail.into())
    }
}

/// Gateway-level faults outside the request path.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(#[from] std::io::Error),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
