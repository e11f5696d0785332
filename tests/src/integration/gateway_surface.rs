//! The gateway's own HTTP surface: token-exchange endpoints, cache
//! eviction and rate limiting.

use crate::support::spawn_backend;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use meridian_gateway::proxy::StaticTargets;
use meridian_gateway::registry::StaticMetadataSource;
use meridian_gateway::token::TokenService;
use meridian_gateway::{Collaborators, GatewayConfig, GatewayService};
use meridian_types::{TicketResponse, TokenResponse};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "surface-secret";

fn config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.security.jwt_secret = SECRET.to_string();
    config
}

fn service() -> GatewayService {
    GatewayService::new(config(), Collaborators::default()).unwrap()
}

fn ticket_request(application_name: &str, authorization: Option<&str>) -> Request<Body> {
    let body = serde_json::json!({ "applicationName": application_name }).to_string();
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/gateway/zaas/ticket")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(authorization) = authorization {
        builder = builder.header(header::AUTHORIZATION, authorization);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_ticket_endpoint_issues_ticket() {
    let service = service();
    // user:pass
    let response = service
        .router()
        .oneshot(ticket_request("IZUDFLT", Some("Basic dXNlcjpwYXNz")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ticket: TicketResponse = body_json(response).await;
    assert_eq!(ticket.user_id, "user");
    assert_eq!(ticket.application_name, "IZUDFLT");
    assert!(ticket.ticket.starts_with("ZOWE_DUMMY_PASS_TICKET"));
}

#[tokio::test]
async fn test_ticket_endpoint_requires_application_name() {
    let service = service();
    let response = service
        .router()
        .oneshot(ticket_request("", Some("Basic dXNlcjpwYXNz")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ticket_endpoint_requires_identity() {
    let service = service();
    let response = service
        .router()
        .oneshot(ticket_request("IZUDFLT", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_zowe_jwt_endpoint_issues_parseable_token() {
    let service = service();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/gateway/zaas/zoweJwt")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())
        .unwrap();

    let response = service.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token_response: TokenResponse = body_json(response).await;
    let claims = TokenService::new(SECRET, Duration::from_secs(3600))
        .parse(token_response.token.as_deref().unwrap())
        .unwrap();
    assert_eq!(claims.sub, "user");
}

#[tokio::test]
async fn test_cache_eviction_endpoints() {
    let service = service();
    let registry = service.registry();

    registry.resolve("alpha").await;
    registry.resolve("beta").await;
    assert_eq!(registry.cached_count(), 2);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/gateway/cache/services/alpha")
        .body(Body::empty())
        .unwrap();
    let response = service.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(registry.cached_count(), 1);

    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/gateway/cache/services")
        .body(Body::empty())
        .unwrap();
    let response = service.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(registry.cached_count(), 0);
}

#[tokio::test]
async fn test_rate_limit_caps_identified_callers() {
    let backend = spawn_backend().await;
    let targets = StaticTargets::new();
    targets.insert("svc", &backend.base_url);

    let mut config = config();
    config.rate_limit.capacity = 2;
    config.rate_limit.refill_duration = Duration::from_secs(3600);

    let collaborators = Collaborators {
        metadata: Arc::new(StaticMetadataSource::default()),
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    let request = |cookie: &str| {
        Request::builder()
            .method(Method::GET)
            .uri("/svc/api/v1/data")
            .header(header::COOKIE, format!("apimlAuthenticationToken={cookie}"))
            .body(Body::empty())
            .unwrap()
    };

    for _ in 0..2 {
        let response = service.router().oneshot(request("caller-a")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = service.router().oneshot(request("caller-a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().get("Retry-After").is_some());
    assert_eq!(backend.calls(), 2);

    // A different caller still has a full budget.
    let response = service.router().oneshot(request("caller-b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_ignores_anonymous_requests() {
    let backend = spawn_backend().await;
    let targets = StaticTargets::new();
    targets.insert("svc", &backend.base_url);

    let mut config = config();
    config.rate_limit.capacity = 1;
    config.rate_limit.refill_duration = Duration::from_secs(3600);

    let collaborators = Collaborators {
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    for _ in 0..5 {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/svc/api/v1/data")
            .body(Body::empty())
            .unwrap();
        let response = service.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    assert_eq!(backend.calls(), 5);
}

#[tokio::test]
async fn test_unknown_service_is_not_found() {
    let service = service();
    let request = Request::builder()
        .method(Method::GET)
        .uri("/ghost/api/v1/data")
        .body(Body::empty())
        .unwrap();
    let response = service.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_encoded_slash_policy_is_per_route() {
    let backend = spawn_backend().await;
    let targets = StaticTargets::new();
    targets.insert("strict", &backend.base_url);

    let mut config = config();
    config.routes.overrides.insert(
        "strict".to_string(),
        meridian_gateway::domain::config::RouteOverride {
            allow_encoded_slashes: Some(false),
        },
    );

    let collaborators = Collaborators {
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/strict/api/v1/a%2Fb")
        .body(Body::empty())
        .unwrap();
    let response = service.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(backend.calls(), 0);
}
