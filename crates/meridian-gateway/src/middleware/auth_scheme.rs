//! The credential translation filter.
//!
//! Orchestrates extract → resolve → translate → mutate for every proxied
//! request:
//!
//! ```text
//! START → CREDENTIAL_EXTRACTED → SCHEME_RESOLVED → {LOCAL_MUTATION | ISSUER_CALL}
//!       → REQUEST_MUTATED → FORWARDED
//! ```
//!
//! Terminal states short of FORWARDED: `NoCredential` (forward unmodified)
//! and `TranslationFailed` (strip credential material, annotate with the
//! failure header, forward without auth). Translation failures never block
//! the call; whether missing credentials matter is the target service's
//! decision, enforced 401/403 on its side.

use crate::domain::certificate::{classify, Certificate, Classification};
use crate::domain::correlation::{CorrelationId, REQUEST_ID_HEADER};
use crate::domain::credential::{extract, Credential};
use crate::domain::error::AuthError;
use crate::domain::headers::{strip_credentials, strip_gateway_only_headers};
use crate::issuer::TokenIssuerClient;
use crate::middleware::rate_limit::first_path_segment;
use crate::oidc::OidcValidator;
use crate::passticket::PassTicketService;
use crate::registry::SchemeRegistry;
use crate::token::TokenService;
use axum::{
    body::Body,
    http::header::AUTHORIZATION,
    http::{HeaderValue, Request},
    response::Response,
};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use meridian_types::{
    AuthenticationScheme, AuthorizationResponse, RouteAuthRequirement, AUTH_COOKIE_NAME,
    AUTH_FAIL_HEADER, CERT_CN_HEADER, CERT_DN_HEADER, CERT_PUBLIC_HEADER, SAF_TOKEN_HEADER,
};
use std::collections::HashSet;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Client certificates handed over by the TLS termination layer.
#[derive(Debug, Clone, Default)]
pub struct PeerCertificates(pub Vec<Certificate>);

/// How the filter concluded for one request. Inserted into the request
/// extensions for the forward stage and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutcome {
    /// Route declares no scheme; request untouched.
    Passthrough,
    /// Scheme needs a credential and none was present; request untouched.
    NoCredential,
    /// Translation succeeded and the request carries the new credential.
    Mutated(AuthenticationScheme),
    /// Translation answered "set nothing"; inbound credentials removed.
    NoOp,
    /// Translation failed; credentials removed, failure header set.
    TranslationFailed(String),
}

/// Shared collaborators of the filter.
pub struct AuthSchemeState {
    pub registry: Arc<SchemeRegistry>,
    pub issuer: Arc<TokenIssuerClient>,
    pub passtickets: Arc<dyn PassTicketService>,
    pub tokens: Arc<TokenService>,
    pub oidc: Option<Arc<OidcValidator>>,
    pub gateway_public_keys: HashSet<String>,
}

/// Credential translation layer
#[derive(Clone)]
pub struct AuthSchemeLayer {
    state: Arc<AuthSchemeState>,
}

impl AuthSchemeLayer {
    pub fn new(state: Arc<AuthSchemeState>) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthSchemeLayer {
    type Service = AuthSchemeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthSchemeService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Credential translation service
#[derive(Clone)]
pub struct AuthSchemeService<S> {
    inner: S,
    state: Arc<AuthSchemeState>,
}

impl<S> Service<Request<Body>> for AuthSchemeService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // A client must never arrive with markers downstream systems
            // treat as already-validated identity.
            strip_gateway_only_headers(req.headers_mut());

            let correlation = CorrelationId::from_headers(req.headers());
            if let Ok(value) = HeaderValue::from_str(&correlation.to_string()) {
                req.headers_mut().insert(REQUEST_ID_HEADER, value);
            }

            let Some(service_id) = first_path_segment(req.uri().path()) else {
                req.extensions_mut().insert(FilterOutcome::Passthrough);
                return inner.call(req).await;
            };

            let requirement = state.registry.resolve(&service_id).await;

            let chain = req
                .extensions()
                .get::<PeerCertificates>()
                .map(|peer| peer.0.clone())
                .unwrap_or_default();
            let classification = classify(&chain, &state.gateway_public_keys);
            let credential = extract(req.headers(), &classification.client_certs);

            debug!(
                request_id = %correlation,
                service_id = %service_id,
                scheme = %requirement.scheme,
                has_credential = credential.is_some(),
                "translating credentials"
            );

            let outcome =
                apply_scheme(&state, &requirement, &service_id, credential, &classification, &mut req)
                    .await;

            let failure = match &outcome {
                FilterOutcome::TranslationFailed(message) => Some(message.clone()),
                _ => None,
            };
            req.extensions_mut().insert(outcome);

            let mut response = inner.call(req).await?;

            // The failure diagnostic goes to both sides: the southbound
            // request (set in apply_scheme) and the northbound response.
            if let Some(message) = failure {
                if let Ok(value) = HeaderValue::from_str(&message) {
                    response.headers_mut().append(AUTH_FAIL_HEADER, value);
                }
            }

            Ok(response)
        })
    }
}

async fn apply_scheme(
    state: &AuthSchemeState,
    requirement: &RouteAuthRequirement,
    service_id: &str,
    credential: Option<Credential>,
    classification: &Classification,
    req: &mut Request<Body>,
) -> FilterOutcome {
    match requirement.scheme {
        AuthenticationScheme::Bypass => FilterOutcome::Passthrough,

        AuthenticationScheme::X509 => apply_x509(classification, req),

        AuthenticationScheme::Oidc => apply_oidc(state, credential, req),

        AuthenticationScheme::PassTicket => {
            let Some(credential) = credential else {
                return FilterOutcome::NoCredential;
            };
            apply_passticket(state, requirement, service_id, &credential, req)
        }

        AuthenticationScheme::ZoweJwt
        | AuthenticationScheme::Zosmf
        | AuthenticationScheme::SafIdt => {
            let Some(credential) = credential else {
                return FilterOutcome::NoCredential;
            };
            // The exchange runs as its own task: a caller abort must not
            // cancel an issuer call mid-response. A stray call costs at most
            // the same bounded timeout as a normal one.
            let issuer = Arc::clone(&state.issuer);
            let scheme = requirement.scheme;
            let call_credential = credential.clone();
            let call_service = service_id.to_string();
            let call_applid = requirement.applid.clone();
            let exchange = tokio::spawn(async move {
                issuer
                    .exchange(scheme, &call_credential, &call_service, call_applid.as_deref())
                    .await
            })
            .await
            .unwrap_or_else(|_join_error| Err(AuthError::BackendUnavailable { tried: 0 }));
            match exchange {
                Ok(response) if response.is_no_op() => {
                    // The issuer rejected the credential. Nothing to set,
                    // but the stale inbound credential must not leak either.
                    strip_credentials(req.headers_mut());
                    FilterOutcome::NoOp
                }
                Ok(response) => {
                    strip_credentials(req.headers_mut());
                    set_translated_credential(requirement, &response, req);
                    FilterOutcome::Mutated(requirement.scheme)
                }
                Err(error) => {
                    warn!(service_id, %error, "credential translation failed");
                    translation_failed(req, error.to_string())
                }
            }
        }
    }
}

/// Forwards only caller-owned certificates; the gateway's own signing
/// certificate never masquerades as client identity.
fn apply_x509(classification: &Classification, req: &mut Request<Body>) -> FilterOutcome {
    let Some(cert) = classification.client_certs.first() else {
        return FilterOutcome::NoCredential;
    };

    let headers = req.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&cert.public_key_base64()) {
        headers.insert(CERT_PUBLIC_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(cert.subject_dn()) {
        headers.insert(CERT_DN_HEADER, value);
    }
    if let Some(common_name) = cert.common_name() {
        if let Ok(value) = HeaderValue::from_str(common_name) {
            headers.insert(CERT_CN_HEADER, value);
        }
    }
    FilterOutcome::Mutated(AuthenticationScheme::X509)
}

/// Validates an external token locally; an invalid signature degrades to the
/// anonymous state.
fn apply_oidc(
    state: &AuthSchemeState,
    credential: Option<Credential>,
    req: &mut Request<Body>,
) -> FilterOutcome {
    let Some(token) = credential.as_ref().and_then(Credential::token) else {
        return FilterOutcome::NoCredential;
    };

    let Some(validator) = state.oidc.as_ref() else {
        return translation_failed(req, "no OIDC provider is configured".to_string());
    };

    match validator.validate(token) {
        Ok(claims) => {
            debug!(subject = %claims.sub, "OIDC token accepted");
            FilterOutcome::Mutated(AuthenticationScheme::Oidc)
        }
        Err(error) => {
            debug!(%error, "OIDC token rejected, continuing unauthenticated");
            FilterOutcome::NoCredential
        }
    }
}

fn apply_passticket(
    state: &AuthSchemeState,
    requirement: &RouteAuthRequirement,
    service_id: &str,
    credential: &Credential,
    req: &mut Request<Body>,
) -> FilterOutcome {
    let Some(applid) = requirement.applid.as_deref().filter(|a| !a.is_empty()) else {
        let error = AuthError::MissingApplid {
            service_id: service_id.to_string(),
        };
        return translation_failed(req, error.to_string());
    };

    let user_id = match resolve_user(state, credential) {
        Ok(user_id) => user_id,
        Err(error) => return translation_failed(req, error.to_string()),
    };

    // A pass-ticket is valid once and expires immediately, so every request
    // generates a fresh one; a failed generation is not retryable.
    let ticket = match state.passtickets.generate(&user_id, applid) {
        Ok(ticket) => ticket,
        Err(error) => return translation_failed(req, error.to_string()),
    };

    strip_credentials(req.headers_mut());
    let encoded = BASE64_STANDARD.encode(format!("{user_id}:{ticket}"));
    if let Ok(value) = HeaderValue::from_str(&format!("Basic {encoded}")) {
        req.headers_mut().insert(AUTHORIZATION, value);
    }
    FilterOutcome::Mutated(AuthenticationScheme::PassTicket)
}

/// Resolves the authenticated user id behind a credential.
fn resolve_user(state: &AuthSchemeState, credential: &Credential) -> Result<String, AuthError> {
    match credential {
        Credential::Basic { username, .. } => Ok(username.clone()),
        Credential::Bearer(token)
        | Credential::CookieToken(token)
        | Credential::PersonalAccessToken(token) => state
            .tokens
            .parse(token)
            .map(|claims| claims.sub)
            .map_err(|error| AuthError::IdentityUnresolved(error.to_string())),
        Credential::ClientCertificate(_) => Err(AuthError::IdentityUnresolved(
            "certificate identity mapping is not available".to_string(),
        )),
    }
}

/// Places the translated token where the route expects it. Route overrides
/// win over the issuer's answer, which wins over the scheme default.
fn set_translated_credential(
    requirement: &RouteAuthRequirement,
    response: &AuthorizationResponse,
    req: &mut Request<Body>,
) {
    let Some(token) = response.token.as_deref() else {
        return;
    };

    let header_name = requirement
        .header_name
        .as_deref()
        .or(response.header_name.as_deref());
    let cookie_name = requirement
        .cookie_name
        .as_deref()
        .or(response.cookie_name.as_deref());

    if let Some(name) = header_name {
        if let (Ok(header), Ok(value)) = (
            axum::http::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(token),
        ) {
            req.headers_mut().insert(header, value);
        }
        return;
    }

    if let Some(name) = cookie_name {
        crate::domain::headers::append_request_cookie(req.headers_mut(), name, token);
        return;
    }

    // Scheme default placement.
    match requirement.scheme {
        AuthenticationScheme::SafIdt => {
            if let Ok(value) = HeaderValue::from_str(token) {
                req.headers_mut().insert(SAF_TOKEN_HEADER, value);
            }
        }
        _ => {
            crate::domain::headers::append_request_cookie(
                req.headers_mut(),
                AUTH_COOKIE_NAME,
                token,
            );
        }
    }
}

/// Enters the failed terminal state: credential material is removed and the
/// diagnostic header set on the southbound request.
fn translation_failed(req: &mut Request<Body>, message: String) -> FilterOutcome {
    strip_credentials(req.headers_mut());
    if let Ok(value) = HeaderValue::from_str(&message) {
        req.headers_mut().insert(AUTH_FAIL_HEADER, value);
    }
    FilterOutcome::TranslationFailed(message)
}
