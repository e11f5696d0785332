//! Inbound credential extraction.
//!
//! At most one credential is extracted per request. Precedence is fixed and
//! documented because downstream services assert on exactly one credential
//! being forwarded:
//!
//! 1. TLS client certificate
//! 2. `Authorization: Bearer`
//! 3. `Authorization: Basic`
//! 4. `apimlAuthenticationToken` cookie
//! 5. `personalAccessToken` cookie
//!
//! Malformed material (empty bearer value, undecodable Basic payload) yields
//! no credential rather than an error; the caller continues unauthenticated.

use crate::domain::certificate::Certificate;
use crate::domain::headers::cookie_value;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use meridian_types::{AUTH_COOKIE_NAME, PAT_COOKIE_NAME};

/// One unit of inbound credential material. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// JWT or opaque token from the `Authorization: Bearer` header.
    Bearer(String),
    /// User id and password from the `Authorization: Basic` header.
    Basic { username: String, password: String },
    /// Client certificates presented on the TLS connection.
    ClientCertificate(Vec<Certificate>),
    /// Token from the authentication cookie.
    CookieToken(String),
    /// Personal access token cookie.
    PersonalAccessToken(String),
}

impl Credential {
    /// The raw token value, when the credential is token-shaped.
    pub fn token(&self) -> Option<&str> {
        match self {
            Credential::Bearer(token)
            | Credential::CookieToken(token)
            | Credential::PersonalAccessToken(token) => Some(token),
            Credential::Basic { .. } | Credential::ClientCertificate(_) => None,
        }
    }
}

/// Extracts at most one credential from the request, applying the documented
/// precedence. Pure and idempotent: repeated calls over the same input return
/// the same result and never mutate the request.
pub fn extract(headers: &HeaderMap, client_certs: &[Certificate]) -> Option<Credential> {
    if !client_certs.is_empty() {
        return Some(Credential::ClientCertificate(client_certs.to_vec()));
    }

    if let Some(credential) = from_authorization(headers) {
        return Some(credential);
    }

    if let Some(token) = cookie_value(headers, AUTH_COOKIE_NAME).filter(|t| !t.is_empty()) {
        return Some(Credential::CookieToken(token));
    }

    if let Some(token) = cookie_value(headers, PAT_COOKIE_NAME).filter(|t| !t.is_empty()) {
        return Some(Credential::PersonalAccessToken(token));
    }

    None
}

fn from_authorization(headers: &HeaderMap) -> Option<Credential> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;

    if let Some(token) = value.strip_prefix("Bearer ") {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        return Some(Credential::Bearer(token.to_string()));
    }

    if let Some(payload) = value.strip_prefix("Basic ") {
        let decoded = BASE64_STANDARD.decode(payload.trim()).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, password) = decoded.split_once(':')?;
        if username.is_empty() {
            return None;
        }
        return Some(Credential::Basic {
            username: username.to_string(),
            password: password.to_string(),
        });
    }

    None
}
