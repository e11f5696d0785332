//! Credential header and cookie sanitation rules.
//!
//! Two sets are distinguished, mirroring the request flow:
//!
//! - the *input* set is what gets copied onto a token-exchange call so the
//!   issuer can see the caller's credential;
//! - the *full* set is what gets removed from the southbound request once the
//!   gateway has produced its own credential, so a backend never receives two
//!   competing credential forms.

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use meridian_types::{
    AUTH_COOKIE_NAME, AUTH_FAIL_HEADER, CERT_CN_HEADER, CERT_DN_HEADER, CERT_PUBLIC_HEADER,
    CLIENT_CERT_HEADER, LEGACY_TOKEN_COOKIES, PAT_COOKIE_NAME, SAF_TOKEN_HEADER,
};

/// Headers only the gateway itself may set. Stripped from every inbound
/// request before any other processing, so a client cannot pre-set a marker
/// that downstream systems treat as already-validated identity.
pub const GATEWAY_ONLY_HEADERS: [&str; 6] = [
    CERT_PUBLIC_HEADER,
    CERT_DN_HEADER,
    CERT_CN_HEADER,
    SAF_TOKEN_HEADER,
    CLIENT_CERT_HEADER,
    AUTH_FAIL_HEADER,
];

/// True for headers that carry inbound credential material.
pub fn is_credential_header_input(name: &str) -> bool {
    name.eq_ignore_ascii_case(AUTHORIZATION.as_str())
}

/// True for every header stripped southbound once translation succeeded.
pub fn is_credential_header(name: &str) -> bool {
    is_credential_header_input(name)
        || GATEWAY_ONLY_HEADERS
            .iter()
            .any(|h| name.eq_ignore_ascii_case(h))
}

/// True for cookies that carry inbound credential material.
pub fn is_credential_cookie_input(name: &str) -> bool {
    name.eq_ignore_ascii_case(AUTH_COOKIE_NAME)
        || name
            .to_ascii_lowercase()
            .starts_with(&format!("{}.", AUTH_COOKIE_NAME.to_ascii_lowercase()))
        || name.eq_ignore_ascii_case(PAT_COOKIE_NAME)
}

/// True for every cookie stripped southbound once translation succeeded.
pub fn is_credential_cookie(name: &str) -> bool {
    is_credential_cookie_input(name)
        || LEGACY_TOKEN_COOKIES
            .iter()
            .any(|c| name.eq_ignore_ascii_case(c))
}

/// Iterates `name=value` pairs across all `Cookie` headers.
pub fn cookies(headers: &HeaderMap) -> impl Iterator<Item = (String, String)> + '_ {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
}

/// Value of the first cookie with the given name, if any.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    cookies(headers)
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v)
}

/// Removes the gateway-only headers from an inbound request.
pub fn strip_gateway_only_headers(headers: &mut HeaderMap) {
    for name in GATEWAY_ONLY_HEADERS {
        headers.remove(name);
    }
}

/// Removes all credential headers and cookies from a southbound request.
///
/// Cookie headers are rebuilt rather than dropped so unrelated cookies still
/// reach the backend.
pub fn strip_credentials(headers: &mut HeaderMap) {
    let retained: Vec<String> = cookies(headers)
        .filter(|(name, _)| !is_credential_cookie(name))
        .map(|(name, value)| format!("{name}={value}"))
        .collect();

    headers.remove(AUTHORIZATION);
    for name in GATEWAY_ONLY_HEADERS {
        headers.remove(name);
    }
    headers.remove(COOKIE);
    if !retained.is_empty() {
        if let Ok(value) = HeaderValue::from_str(&retained.join("; ")) {
            headers.insert(COOKIE, value);
        }
    }
}

/// Appends a cookie to the request's `Cookie` header.
pub fn append_request_cookie(headers: &mut HeaderMap, name: &str, value: &str) {
    let mut pairs: Vec<String> = cookies(headers)
        .map(|(n, v)| format!("{n}={v}"))
        .collect();
    pairs.push(format!("{name}={value}"));
    if let Ok(value) = HeaderValue::from_str(&pairs.join("; ")) {
        headers.remove(COOKIE);
        headers.insert(COOKIE, value);
    }
}
