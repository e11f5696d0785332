//! End-to-end credential translation through the full filter pipeline:
//! request in, mutated request observed at a live backend.

use crate::support::{spawn_backend, spawn_issuer, FixedTicketService, IssuerBehavior};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use meridian_gateway::domain::certificate::Certificate;
use meridian_gateway::proxy::StaticTargets;
use meridian_gateway::registry::StaticMetadataSource;
use meridian_gateway::token::TokenService;
use meridian_gateway::{Collaborators, GatewayConfig, GatewayService, PeerCertificates};
use meridian_types::scheme::{METADATA_APPLID_KEY, METADATA_SCHEME_KEY};
use meridian_types::{TokenResponse, AUTH_FAIL_HEADER, CERT_CN_HEADER, CERT_PUBLIC_HEADER};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "integration-secret";

fn metadata(scheme: &str, applid: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    map.insert(METADATA_SCHEME_KEY.to_string(), scheme.to_string());
    if let Some(applid) = applid {
        map.insert(METADATA_APPLID_KEY.to_string(), applid.to_string());
    }
    map
}

fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.security.jwt_secret = SECRET.to_string();
    config.issuer.timeout = Duration::from_millis(500);
    config
}

fn inbound_jwt(user: &str) -> String {
    TokenService::new(SECRET, Duration::from_secs(3600))
        .issue(user)
        .expect("mint inbound token")
}

async fn drive(service: &GatewayService, request: Request<Body>) -> axum::response::Response {
    service
        .router()
        .oneshot(request)
        .await
        .expect("infallible router call")
}

#[tokio::test]
async fn test_passticket_route_sets_basic_credentials() {
    let backend = spawn_backend().await;

    let targets = StaticTargets::new();
    targets.insert("mainframe", &backend.base_url);

    let collaborators = Collaborators {
        metadata: Arc::new(
            StaticMetadataSource::default()
                .with_service("mainframe", metadata("httpBasicPassTicket", Some("IZUDFLT"))),
        ),
        targets: Arc::new(targets),
        passtickets: Arc::new(FixedTicketService { ticket: "TICKET123" }),
        ..Collaborators::default()
    };
    let service = GatewayService::new(base_config(), collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/mainframe/api/v1/files")
        .header(header::AUTHORIZATION, format!("Bearer {}", inbound_jwt("user")))
        .body(Body::empty())
        .unwrap();

    let response = drive(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.calls(), 1);

    let seen = backend.last_headers();
    let authorization = seen.get(header::AUTHORIZATION).unwrap().to_str().unwrap();
    let expected = BASE64_STANDARD.encode("user:TICKET123");
    assert_eq!(authorization, format!("Basic {expected}"));

    // The inbound bearer token must not travel south in any form.
    assert!(seen.get(header::COOKIE).is_none());
}

#[tokio::test]
async fn test_token_route_with_all_issuers_down_strips_credentials() {
    let backend = spawn_backend().await;
    let broken_issuer = spawn_issuer(IssuerBehavior::Error).await;

    let targets = StaticTargets::new();
    targets.insert("cloudy", &backend.base_url);

    let mut config = base_config();
    config.issuer.instances = vec![broken_issuer.base_url.clone()];

    let collaborators = Collaborators {
        metadata: Arc::new(
            StaticMetadataSource::default().with_service("cloudy", metadata("zoweJwt", None)),
        ),
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/cloudy/api/v1/info")
        .header(header::COOKIE, "apimlAuthenticationToken=stale-token")
        .body(Body::empty())
        .unwrap();

    let response = drive(&service, request).await;

    // The call still proceeds; the backend decides whether auth matters.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(backend.calls(), 1);

    let seen = backend.last_headers();
    assert!(seen.get(header::COOKIE).is_none(), "stale cookie leaked south");
    assert!(seen.get(header::AUTHORIZATION).is_none());
    assert!(seen.get(AUTH_FAIL_HEADER).is_some());

    // Diagnostics are mirrored to the caller.
    assert!(response.headers().get(AUTH_FAIL_HEADER).is_some());
}

#[tokio::test]
async fn test_token_route_through_live_issuer_sets_fresh_cookie() {
    let backend = spawn_backend().await;

    // A second gateway instance plays the issuer role, sharing the secret.
    let issuer_gateway = GatewayService::new(base_config(), Collaborators::default()).unwrap();
    let issuer_router = issuer_gateway.router();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let issuer_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let _ = axum::serve(listener, issuer_router).await;
    });

    let targets = StaticTargets::new();
    targets.insert("cloudy", &backend.base_url);

    let mut config = base_config();
    config.issuer.instances = vec![issuer_url];

    let collaborators = Collaborators {
        metadata: Arc::new(
            StaticMetadataSource::default().with_service("cloudy", metadata("zoweJwt", None)),
        ),
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/cloudy/api/v1/info")
        .header(header::AUTHORIZATION, format!("Bearer {}", inbound_jwt("user")))
        .body(Body::empty())
        .unwrap();

    let response = drive(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = backend.last_headers();
    let cookie = seen.get(header::COOKIE).unwrap().to_str().unwrap();
    let token = cookie
        .strip_prefix("apimlAuthenticationToken=")
        .expect("translated cookie present");

    // The southbound token is a fresh gateway-signed JWT for the same user.
    let claims = TokenService::new(SECRET, Duration::from_secs(3600))
        .parse(token)
        .unwrap();
    assert_eq!(claims.sub, "user");

    // The original bearer header was replaced, not duplicated.
    assert!(seen.get(header::AUTHORIZATION).is_none());
}

#[tokio::test]
async fn test_bypass_route_forwards_unmodified() {
    let backend = spawn_backend().await;

    let targets = StaticTargets::new();
    targets.insert("plain", &backend.base_url);

    let collaborators = Collaborators {
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(base_config(), collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/plain/api/v1/data")
        .header(header::AUTHORIZATION, "Bearer untouched")
        .header(header::COOKIE, "JSESSIONID=abc")
        .body(Body::empty())
        .unwrap();

    let response = drive(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = backend.last_headers();
    assert_eq!(seen.get(header::AUTHORIZATION).unwrap(), "Bearer untouched");
    assert_eq!(seen.get(header::COOKIE).unwrap(), "JSESSIONID=abc");
}

#[tokio::test]
async fn test_spoofed_identity_headers_are_always_stripped() {
    let backend = spawn_backend().await;

    let targets = StaticTargets::new();
    targets.insert("plain", &backend.base_url);

    let collaborators = Collaborators {
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(base_config(), collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/plain/api/v1/data")
        .header(CERT_PUBLIC_HEADER, "spoofed-key")
        .header("X-SAF-Token", "spoofed-idt")
        .header(AUTH_FAIL_HEADER, "spoofed-diagnostic")
        .body(Body::empty())
        .unwrap();

    let response = drive(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = backend.last_headers();
    assert!(seen.get(CERT_PUBLIC_HEADER).is_none());
    assert!(seen.get("X-SAF-Token").is_none());
    assert!(seen.get(AUTH_FAIL_HEADER).is_none());
}

#[tokio::test]
async fn test_x509_route_forwards_only_client_certificate() {
    let backend = spawn_backend().await;

    let gateway_cert = Certificate::new(
        b"gateway-public-key".to_vec(),
        b"gateway-der".to_vec(),
        "CN=gateway",
        Some("gateway"),
    );
    let client_cert = Certificate::new(
        b"client-public-key".to_vec(),
        b"client-der".to_vec(),
        "CN=client",
        Some("client"),
    );

    let targets = StaticTargets::new();
    targets.insert("certified", &backend.base_url);

    let mut config = base_config();
    config.security.gateway_public_keys_base64 = vec![gateway_cert.public_key_base64()];

    let collaborators = Collaborators {
        metadata: Arc::new(
            StaticMetadataSource::default().with_service("certified", metadata("x509", None)),
        ),
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    let mut request = Request::builder()
        .method(Method::GET)
        .uri("/certified/api/v1/whoami")
        .body(Body::empty())
        .unwrap();
    request
        .extensions_mut()
        .insert(PeerCertificates(vec![client_cert.clone(), gateway_cert]));

    let response = drive(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let seen = backend.last_headers();
    assert_eq!(
        seen.get(CERT_PUBLIC_HEADER).unwrap().to_str().unwrap(),
        client_cert.public_key_base64()
    );
    assert_eq!(seen.get(CERT_CN_HEADER).unwrap(), "client");
}

#[tokio::test]
async fn test_token_route_without_credential_passes_through() {
    let backend = spawn_backend().await;
    let issuer = spawn_issuer(IssuerBehavior::Ok(TokenResponse::in_cookie(
        "apimlAuthenticationToken",
        "fresh",
    )))
    .await;

    let targets = StaticTargets::new();
    targets.insert("cloudy", &backend.base_url);

    let mut config = base_config();
    config.issuer.instances = vec![issuer.base_url.clone()];

    let collaborators = Collaborators {
        metadata: Arc::new(
            StaticMetadataSource::default().with_service("cloudy", metadata("zoweJwt", None)),
        ),
        targets: Arc::new(targets),
        ..Collaborators::default()
    };
    let service = GatewayService::new(config, collaborators).unwrap();

    let request = Request::builder()
        .method(Method::GET)
        .uri("/cloudy/api/v1/public")
        .body(Body::empty())
        .unwrap();

    let response = drive(&service, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Anonymous requests skip the issuer entirely.
    assert_eq!(issuer.calls(), 0);
    let seen = backend.last_headers();
    assert!(seen.get(header::COOKIE).is_none());
}
