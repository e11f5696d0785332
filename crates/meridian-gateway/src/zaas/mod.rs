//! Issuer-side token-exchange endpoints.
//!
//! These are the endpoints a peer gateway's issuer client calls:
//! `POST /gateway/zaas/{ticket,zoweJwt,zosmf,safIdt}`. Platform-backed
//! collaborators (z/OSMF, the SAF identity token provider, the pass-ticket
//! authority) sit behind traits with dummy substitutes, so the endpoints
//! behave identically on and off the mainframe.

use crate::domain::credential::{extract, Credential};
use crate::domain::error::ApiErrorBody;
use crate::passticket::PassTicketService;
use crate::token::TokenService;
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use meridian_types::{TicketRequest, TicketResponse, TokenResponse, AUTH_COOKIE_NAME};
use std::sync::Arc;
use tracing::{debug, warn};

/// z/OSMF token exchange boundary.
#[async_trait]
pub trait ZosmfTokenExchange: Send + Sync {
    /// Exchanges an authenticated user's credential for a z/OSMF token.
    async fn exchange(&self, user_id: &str) -> Result<TokenResponse, ExchangeError>;
}

/// SAF identity token provider boundary.
pub trait SafIdtProvider: Send + Sync {
    /// Generates a SAF identity token for the user, proving identity with a
    /// freshly generated pass-ticket.
    fn generate(&self, user_id: &str, passticket: &str, applid: &str)
        -> Result<String, ExchangeError>;
}

/// Failure of a platform-backed exchange.
#[derive(Debug, thiserror::Error)]
#[error("token exchange failed: {0}")]
pub struct ExchangeError(pub String);

/// Stand-in z/OSMF exchange used off the mainframe: answers with a
/// deterministic LTPA-style cookie token.
#[derive(Debug, Default)]
pub struct DummyZosmfExchange;

#[async_trait]
impl ZosmfTokenExchange for DummyZosmfExchange {
    async fn exchange(&self, user_id: &str) -> Result<TokenResponse, ExchangeError> {
        Ok(TokenResponse::in_cookie(
            "jwtToken",
            format!("zosmf-token-{user_id}"),
        ))
    }
}

/// Stand-in SAF identity token provider.
#[derive(Debug, Default)]
pub struct DummySafIdtProvider;

impl SafIdtProvider for DummySafIdtProvider {
    fn generate(
        &self,
        user_id: &str,
        _passticket: &str,
        applid: &str,
    ) -> Result<String, ExchangeError> {
        Ok(BASE64_STANDARD.encode(format!("{user_id}:{applid}:saf-idt")))
    }
}

/// Shared collaborators of the exchange endpoints.
pub struct ZaasState {
    pub tokens: Arc<TokenService>,
    pub passtickets: Arc<dyn PassTicketService>,
    pub safidt: Arc<dyn SafIdtProvider>,
    pub zosmf: Arc<dyn ZosmfTokenExchange>,
}

/// Resolves the caller identity from the request's credential material,
/// along with the raw token when the credential was token-shaped.
fn authenticated_caller(state: &ZaasState, headers: &HeaderMap) -> Option<(String, Option<String>)> {
    match extract(headers, &[])? {
        Credential::Basic { username, .. } => Some((username, None)),
        Credential::Bearer(token)
        | Credential::CookieToken(token)
        | Credential::PersonalAccessToken(token) => {
            let claims = state.tokens.parse(&token).ok()?;
            Some((claims.sub, Some(token)))
        }
        Credential::ClientCertificate(_) => None,
    }
}

fn authenticated_user(state: &ZaasState, headers: &HeaderMap) -> Option<String> {
    authenticated_caller(state, headers).map(|(user_id, _)| user_id)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorBody::unauthorized(
            "No authenticated identity on the request.",
        )),
    )
        .into_response()
}

/// `POST /gateway/zaas/ticket` — pass-ticket for the authenticated caller.
pub async fn post_ticket(
    State(state): State<Arc<ZaasState>>,
    headers: HeaderMap,
    Json(request): Json<TicketRequest>,
) -> Response {
    let Some((user_id, token)) = authenticated_caller(&state, &headers) else {
        return unauthorized();
    };

    let application_name = request.application_name.trim();
    if application_name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorBody::invalid_application_name()),
        )
            .into_response();
    }

    match state.passtickets.generate(&user_id, application_name) {
        Ok(ticket) => {
            debug!(user_id = %user_id, application_name, "pass-ticket issued");
            Json(TicketResponse {
                token,
                user_id,
                application_name: application_name.to_string(),
                ticket,
            })
            .into_response()
        }
        Err(error) => {
            warn!(%error, "pass-ticket generation rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody::ticket_generate_failed(error.to_string())),
            )
                .into_response()
        }
    }
}

/// `POST /gateway/zaas/zoweJwt` — re-issued gateway token for the caller.
pub async fn post_zowe_jwt(
    State(state): State<Arc<ZaasState>>,
    headers: HeaderMap,
) -> Response {
    let Some(user_id) = authenticated_user(&state, &headers) else {
        return unauthorized();
    };

    match state.tokens.issue(&user_id) {
        Ok(token) => Json(TokenResponse::in_cookie(AUTH_COOKIE_NAME, token)).into_response(),
        Err(error) => {
            warn!(%error, "token issue failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody::unauthorized(error.to_string())),
            )
                .into_response()
        }
    }
}

/// `POST /gateway/zaas/zosmf` — z/OSMF token for the caller.
pub async fn post_zosmf(State(state): State<Arc<ZaasState>>, headers: HeaderMap) -> Response {
    let Some(user_id) = authenticated_user(&state, &headers) else {
        return unauthorized();
    };

    match state.zosmf.exchange(&user_id).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => {
            warn!(%error, "z/OSMF exchange failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiErrorBody::new(
                    "org.zowe.apiml.zaas.zosmf.noZosmfTokenReceived",
                    error.to_string(),
                )),
            )
                .into_response()
        }
    }
}

/// `POST /gateway/zaas/safIdt` — SAF identity token for the caller.
///
/// Identity is proven to the provider with a single-use pass-ticket, so a
/// pass-ticket failure fails the whole exchange.
pub async fn post_safidt(
    State(state): State<Arc<ZaasState>>,
    headers: HeaderMap,
    Json(request): Json<TicketRequest>,
) -> Response {
    let Some(user_id) = authenticated_user(&state, &headers) else {
        return unauthorized();
    };

    let application_name = request.application_name.trim();
    if application_name.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiErrorBody::invalid_application_name()),
        )
            .into_response();
    }

    let passticket = match state.passtickets.generate(&user_id, application_name) {
        Ok(passticket) => passticket,
        Err(error) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody::ticket_generate_failed(error.to_string())),
            )
                .into_response();
        }
    };

    match state.safidt.generate(&user_id, &passticket, application_name) {
        Ok(token) => Json(TokenResponse {
            cookie_name: None,
            header_name: None,
            token: Some(token),
        })
        .into_response(),
        Err(error) => {
            warn!(%error, "SAF identity token generation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiErrorBody::new(
                    "org.zowe.apiml.security.idt.failed",
                    error.to_string(),
                )),
            )
                .into_response()
        }
    }
}
