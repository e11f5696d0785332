//! Local validation of externally-issued OIDC tokens.
//!
//! Validation is stateless: signature and issuer are checked against the
//! configured provider, nothing is fetched on the request path. An invalid
//! token is reported as such and the filter degrades it to "no credential".

use crate::domain::config::OidcConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Claims the gateway reads from an external token.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcClaims {
    pub sub: String,
    pub iss: String,
    #[serde(default)]
    pub exp: i64,
}

/// OIDC validation failure.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("OIDC token rejected: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("OIDC public key is not a valid RSA PEM: {0}")]
    BadKey(jsonwebtoken::errors::Error),
}

/// Validates tokens of one configured OIDC provider.
pub struct OidcValidator {
    decoding_key: DecodingKey,
    issuer: String,
}

impl OidcValidator {
    pub fn new(config: &OidcConfig) -> Result<Self, OidcError> {
        let decoding_key =
            DecodingKey::from_rsa_pem(config.public_key_pem.as_bytes()).map_err(OidcError::BadKey)?;
        Ok(OidcValidator {
            decoding_key,
            issuer: config.issuer.clone(),
        })
    }

    /// Checks signature and issuer; returns the claims when valid.
    pub fn validate(&self, token: &str) -> Result<OidcClaims, OidcError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        let data = decode::<OidcClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}
