//! Wire DTOs for the token-exchange endpoints.

use serde::{Deserialize, Serialize};

/// Response body of the token-exchange endpoints (`zoweJwt`, `zosmf`,
/// `safIdt`).
///
/// At most one of `cookie_name` / `header_name` is populated. A `200` whose
/// body deserializes to an empty response is a zombie answer: the instance is
/// reachable but produced no usable credential, and the caller must treat it
/// as that instance's failure rather than forward an empty credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl TokenResponse {
    /// Token delivered via a named cookie.
    pub fn in_cookie(cookie_name: impl Into<String>, token: impl Into<String>) -> Self {
        TokenResponse {
            cookie_name: Some(cookie_name.into()),
            header_name: None,
            token: Some(token.into()),
        }
    }

    /// Token delivered via a named header.
    pub fn in_header(header_name: impl Into<String>, token: impl Into<String>) -> Self {
        TokenResponse {
            cookie_name: None,
            header_name: Some(header_name.into()),
            token: Some(token.into()),
        }
    }

    /// True when the response carries no usable token.
    pub fn is_empty(&self) -> bool {
        self.token.as_deref().map_or(true, str::is_empty)
    }
}

/// Outcome of a successful scheme translation, applied to the outbound
/// request by the filter.
///
/// All fields empty is a valid "set nothing" result, distinct from a
/// translation failure: it forwards the request without new credentials but
/// without the failure diagnostics either.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationResponse {
    pub token: Option<String>,
    pub header_name: Option<String>,
    pub cookie_name: Option<String>,
}

impl AuthorizationResponse {
    /// The "success, set nothing" outcome.
    pub fn no_op() -> Self {
        AuthorizationResponse::default()
    }

    /// True when there is no credential to set on the outbound request.
    pub fn is_no_op(&self) -> bool {
        self.token.as_deref().map_or(true, str::is_empty)
    }
}

impl From<TokenResponse> for AuthorizationResponse {
    fn from(response: TokenResponse) -> Self {
        AuthorizationResponse {
            token: response.token,
            header_name: response.header_name,
            cookie_name: response.cookie_name,
        }
    }
}

/// Request body of `POST /gateway/zaas/ticket` and `/gateway/zaas/safIdt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    #[serde(default)]
    pub application_name: String,
}

/// Response body of `POST /gateway/zaas/ticket`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user_id: String,
    pub application_name: String,
    pub ticket: String,
}
