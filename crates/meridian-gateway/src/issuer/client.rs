//! Failover-aware client for the token-exchange endpoints.
//!
//! One translation request walks the pool's live instances in order and
//! stops at the first usable answer. A timeout, connection error or 5xx
//! counts against the instance and the walk advances; a 200 with no usable
//! token fields (a zombie answer) is treated the same way, because
//! forwarding an empty credential would silently strip authentication from
//! the southbound call. A 401 is terminal: the caller's credential is bad,
//! not the instance.

use crate::domain::credential::Credential;
use crate::domain::error::AuthError;
use crate::issuer::pool::IssuerFailoverPool;
use axum::http::header::{AUTHORIZATION, COOKIE};
use meridian_types::{
    AuthenticationScheme, AuthorizationResponse, TokenResponse, AUTH_COOKIE_NAME,
    CLIENT_CERT_HEADER, PAT_COOKIE_NAME, SERVICE_ID_HEADER,
};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Path of the exchange endpoint serving a scheme, when one exists.
fn exchange_path(scheme: AuthenticationScheme) -> Option<&'static str> {
    match scheme {
        AuthenticationScheme::ZoweJwt => Some("zoweJwt"),
        AuthenticationScheme::Zosmf => Some("zosmf"),
        AuthenticationScheme::SafIdt => Some("safIdt"),
        AuthenticationScheme::PassTicket
        | AuthenticationScheme::X509
        | AuthenticationScheme::Oidc
        | AuthenticationScheme::Bypass => None,
    }
}

/// Calls the token-issuing backend for schemes that need an exchange.
pub struct TokenIssuerClient {
    http: reqwest::Client,
    pool: Arc<IssuerFailoverPool>,
    timeout: Duration,
}

impl TokenIssuerClient {
    pub fn new(pool: Arc<IssuerFailoverPool>, timeout: Duration) -> Self {
        TokenIssuerClient {
            http: reqwest::Client::new(),
            pool,
            timeout,
        }
    }

    /// Exchanges the inbound credential for the scheme's token form.
    ///
    /// Short-circuits on the first success; instances after it are never
    /// called. Total latency is bounded by `timeout * instances tried`.
    pub async fn exchange(
        &self,
        scheme: AuthenticationScheme,
        credential: &Credential,
        service_id: &str,
        applid: Option<&str>,
    ) -> Result<AuthorizationResponse, AuthError> {
        let Some(path) = exchange_path(scheme) else {
            // Local-mutation schemes have nothing to exchange.
            return Ok(AuthorizationResponse::no_op());
        };

        let candidates = self.pool.candidates();
        let mut tried = 0usize;

        for instance in candidates {
            tried += 1;
            let url = format!("{}/gateway/zaas/{}", instance.base_url.trim_end_matches('/'), path);
            debug!(instance = %instance.id, url = %url, %scheme, "calling token issuer");

            let request = self
                .with_credential(self.http.post(&url), credential)
                .header(SERVICE_ID_HEADER, service_id)
                .json(&serde_json::json!({
                    "applicationName": applid.unwrap_or_default(),
                }))
                .timeout(self.timeout);

            let response = match request.send().await {
                Ok(response) => response,
                Err(error) => {
                    warn!(instance = %instance.id, %error, "issuer call failed");
                    self.pool.record_failure(&instance.id);
                    continue;
                }
            };

            match response.status() {
                StatusCode::OK => match response.json::<TokenResponse>().await {
                    Ok(body) if body.is_empty() => {
                        warn!(instance = %instance.id, "issuer returned an empty token response");
                        self.pool.record_failure(&instance.id);
                        continue;
                    }
                    Ok(body) => {
                        self.pool.record_success(&instance.id);
                        return Ok(body.into());
                    }
                    Err(error) => {
                        warn!(instance = %instance.id, %error, "issuer response body unreadable");
                        self.pool.record_failure(&instance.id);
                        continue;
                    }
                },
                StatusCode::UNAUTHORIZED => {
                    // The instance is healthy; the credential was rejected.
                    debug!(instance = %instance.id, "issuer rejected the credential");
                    self.pool.record_success(&instance.id);
                    return Ok(AuthorizationResponse::no_op());
                }
                status => {
                    warn!(instance = %instance.id, %status, "issuer answered with an error status");
                    self.pool.record_failure(&instance.id);
                    continue;
                }
            }
        }

        Err(AuthError::BackendUnavailable { tried })
    }

    /// Attaches the inbound credential to the exchange call exactly as it
    /// arrived, so the issuer sees what the caller presented.
    fn with_credential(
        &self,
        request: reqwest::RequestBuilder,
        credential: &Credential,
    ) -> reqwest::RequestBuilder {
        match credential {
            Credential::Bearer(token) => {
                request.header(AUTHORIZATION.as_str(), format!("Bearer {token}"))
            }
            Credential::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credential::CookieToken(token) => {
                request.header(COOKIE.as_str(), format!("{AUTH_COOKIE_NAME}={token}"))
            }
            Credential::PersonalAccessToken(token) => {
                request.header(COOKIE.as_str(), format!("{PAT_COOKIE_NAME}={token}"))
            }
            Credential::ClientCertificate(certs) => match certs.first() {
                Some(leaf) => request.header(CLIENT_CERT_HEADER, leaf.encoded_base64()),
                None => request,
            },
        }
    }
}
