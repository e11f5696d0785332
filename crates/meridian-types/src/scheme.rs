//! Authentication schemes and per-route requirements.
//!
//! A backend service declares the credential form it expects through
//! service-registry metadata (`apiml.authentication.scheme` and, for
//! pass-tickets, `apiml.authentication.applid`). The gateway resolves that
//! metadata into a [`RouteAuthRequirement`] snapshot per request.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Registry metadata key holding the scheme string.
pub const METADATA_SCHEME_KEY: &str = "apiml.authentication.scheme";
/// Registry metadata key holding the pass-ticket APPLID.
pub const METADATA_APPLID_KEY: &str = "apiml.authentication.applid";
/// Registry metadata key overriding the header the token is placed in.
pub const METADATA_HEADER_KEY: &str = "apiml.authentication.headerName";
/// Registry metadata key overriding the cookie the token is placed in.
pub const METADATA_COOKIE_KEY: &str = "apiml.authentication.cookieName";

/// Credential form a backend service expects on the southbound call.
///
/// Closed set: the gateway dispatches on this enum with a single exhaustive
/// match, so adding a variant forces every call site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthenticationScheme {
    /// Re-issued gateway JWT forwarded as the auth cookie.
    #[serde(rename = "zoweJwt")]
    ZoweJwt,
    /// z/OSMF-issued token (JWT or LTPA) obtained via token exchange.
    #[serde(rename = "zosmf")]
    Zosmf,
    /// One-time mainframe pass-ticket sent as HTTP Basic credentials.
    #[serde(rename = "httpBasicPassTicket")]
    PassTicket,
    /// SAF identity token forwarded in its own header.
    #[serde(rename = "safIdt")]
    SafIdt,
    /// Client certificate details forwarded as request headers.
    #[serde(rename = "x509")]
    X509,
    /// Externally-issued OIDC token, validated locally and forwarded.
    #[serde(rename = "oidc")]
    Oidc,
    /// No credential translation; request passes through unchanged.
    #[serde(rename = "bypass")]
    Bypass,
}

impl AuthenticationScheme {
    /// Wire form used in registry metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationScheme::ZoweJwt => "zoweJwt",
            AuthenticationScheme::Zosmf => "zosmf",
            AuthenticationScheme::PassTicket => "httpBasicPassTicket",
            AuthenticationScheme::SafIdt => "safIdt",
            AuthenticationScheme::X509 => "x509",
            AuthenticationScheme::Oidc => "oidc",
            AuthenticationScheme::Bypass => "bypass",
        }
    }

    /// True when the scheme is satisfied by calling a token-exchange
    /// endpoint rather than by a local request mutation.
    pub fn requires_token_exchange(&self) -> bool {
        matches!(
            self,
            AuthenticationScheme::ZoweJwt
                | AuthenticationScheme::Zosmf
                | AuthenticationScheme::SafIdt
        )
    }
}

impl fmt::Display for AuthenticationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for strict scheme parsing; registry resolution itself fails open.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown authentication scheme: {0}")]
pub struct SchemeParseError(pub String);

impl FromStr for AuthenticationScheme {
    type Err = SchemeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zoweJwt" => Ok(AuthenticationScheme::ZoweJwt),
            "zosmf" => Ok(AuthenticationScheme::Zosmf),
            "httpBasicPassTicket" => Ok(AuthenticationScheme::PassTicket),
            "safIdt" => Ok(AuthenticationScheme::SafIdt),
            "x509" => Ok(AuthenticationScheme::X509),
            "oidc" => Ok(AuthenticationScheme::Oidc),
            "bypass" => Ok(AuthenticationScheme::Bypass),
            other => Err(SchemeParseError(other.to_string())),
        }
    }
}

/// Authentication requirement of one backend route, resolved from registry
/// metadata. Read-only configuration snapshot per request; staleness is
/// corrected on the next registry refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAuthRequirement {
    /// Scheme the target service expects.
    pub scheme: AuthenticationScheme,
    /// Mainframe APPLID scoping pass-ticket generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applid: Option<String>,
    /// Override for the header the translated token is placed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
    /// Override for the cookie the translated token is placed in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
}

impl RouteAuthRequirement {
    /// Requirement for a route with no declared scheme.
    pub fn bypass() -> Self {
        RouteAuthRequirement {
            scheme: AuthenticationScheme::Bypass,
            applid: None,
            header_name: None,
            cookie_name: None,
        }
    }

    /// Builds a requirement from raw registry metadata.
    ///
    /// Unknown or missing scheme strings resolve to [`AuthenticationScheme::Bypass`]:
    /// the proxy still forwards the request, only credential mutation is
    /// skipped. This is deliberate fail-open behavior, not an error path.
    pub fn from_metadata(metadata: &HashMap<String, String>) -> Self {
        let scheme = metadata
            .get(METADATA_SCHEME_KEY)
            .and_then(|s| s.parse().ok())
            .unwrap_or(AuthenticationScheme::Bypass);

        RouteAuthRequirement {
            scheme,
            applid: metadata.get(METADATA_APPLID_KEY).cloned(),
            header_name: metadata.get(METADATA_HEADER_KEY).cloned(),
            cookie_name: metadata.get(METADATA_COOKIE_KEY).cloned(),
        }
    }

    /// Serializes the requirement back to registry metadata form.
    pub fn to_metadata(&self) -> HashMap<String, String> {
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_SCHEME_KEY.to_string(), self.scheme.as_str().to_string());
        if let Some(applid) = &self.applid {
            metadata.insert(METADATA_APPLID_KEY.to_string(), applid.clone());
        }
        if let Some(header) = &self.header_name {
            metadata.insert(METADATA_HEADER_KEY.to_string(), header.clone());
        }
        if let Some(cookie) = &self.cookie_name {
            metadata.insert(METADATA_COOKIE_KEY.to_string(), cookie.clone());
        }
        metadata
    }
}
