//! Header and cookie names produced or consumed by the credential
//! translation layer.
//!
//! The `X-Certificate-*` family, `X-SAF-Token` and the failure header are
//! gateway-set only: inbound copies are stripped before the gateway writes
//! its own authoritative values.

/// Cookie carrying the gateway-issued authentication token.
pub const AUTH_COOKIE_NAME: &str = "apimlAuthenticationToken";

/// Cookie carrying a personal access token.
pub const PAT_COOKIE_NAME: &str = "personalAccessToken";

/// Header carrying a SAF identity token on the southbound call.
pub const SAF_TOKEN_HEADER: &str = "X-SAF-Token";

/// Base64 of the client certificate's public key, southbound only.
pub const CERT_PUBLIC_HEADER: &str = "X-Certificate-Public";

/// Distinguished name of the client certificate, southbound only.
pub const CERT_DN_HEADER: &str = "X-Certificate-DistinguishedName";

/// Common name of the client certificate, southbound only.
pub const CERT_CN_HEADER: &str = "X-Certificate-CommonName";

/// Base64 DER client certificate forwarded between gateway instances.
pub const CLIENT_CERT_HEADER: &str = "Client-Cert";

/// Diagnostic header describing why credential translation failed.
pub const AUTH_FAIL_HEADER: &str = "X-Zowe-Auth-Failure";

/// Identifies the target service on calls to a token-exchange endpoint.
pub const SERVICE_ID_HEADER: &str = "X-Service-Id";

/// Legacy session cookies that must never leak southbound.
pub const LEGACY_TOKEN_COOKIES: [&str; 2] = ["jwtToken", "LtpaToken2"];
