//! Failover across redundant token issuer instances.
//!
//! Choreography mirrors a highly-available issuer deployment: instances that
//! error, hang, answer empty (zombies) or answer correctly, in every
//! combination the gateway must survive.

use crate::support::{spawn_issuer, IssuerBehavior, MockService};
use meridian_gateway::domain::credential::Credential;
use meridian_gateway::{AuthError, IssuerFailoverPool, IssuerInstance, PoolConfig, TokenIssuerClient};
use meridian_types::{AuthenticationScheme, TokenResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};

const COOKIE_NAME: &str = "token_cookie";
const JWT: &str = "jwt";

fn ok_response() -> TokenResponse {
    TokenResponse::in_cookie(COOKIE_NAME, JWT)
}

fn client_over(instances: &[&MockService], timeout: Duration) -> TokenIssuerClient {
    client_with_threshold(instances, timeout, 3)
}

fn client_with_threshold(
    instances: &[&MockService],
    timeout: Duration,
    failure_threshold: u32,
) -> TokenIssuerClient {
    let instances = instances
        .iter()
        .enumerate()
        .map(|(index, service)| {
            IssuerInstance::new(format!("issuer-{index}"), service.base_url.clone())
        })
        .collect();
    let pool = Arc::new(IssuerFailoverPool::new(
        instances,
        PoolConfig {
            failure_threshold,
            observation_window: Duration::from_secs(60),
        },
    ));
    TokenIssuerClient::new(pool, timeout)
}

fn bearer() -> Credential {
    Credential::Bearer("inbound-jwt".to_string())
}

#[tokio::test]
async fn test_single_healthy_instance_succeeds() {
    let ok = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let client = client_over(&[&ok], Duration::from_secs(1));

    let response = client
        .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
        .await
        .unwrap();

    assert_eq!(response.token.as_deref(), Some(JWT));
    assert_eq!(response.cookie_name.as_deref(), Some(COOKIE_NAME));
    assert_eq!(ok.calls(), 1);
}

#[tokio::test]
async fn test_exchange_carries_service_id_and_credential() {
    let ok = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let client = client_over(&[&ok], Duration::from_secs(1));

    client
        .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
        .await
        .unwrap();

    let headers = ok.last_headers();
    assert_eq!(headers.get("x-service-id").unwrap(), "service");
    assert_eq!(headers.get("authorization").unwrap(), "Bearer inbound-jwt");
}

#[tokio::test]
async fn test_short_circuits_after_first_success() {
    let dead = spawn_issuer(IssuerBehavior::Error).await;
    let ok = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let never = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let client = client_over(&[&dead, &ok, &never], Duration::from_secs(1));

    let response = client
        .exchange(AuthenticationScheme::Zosmf, &bearer(), "service", None)
        .await
        .unwrap();

    assert_eq!(response.token.as_deref(), Some(JWT));
    assert_eq!(dead.calls(), 1);
    assert_eq!(ok.calls(), 1);
    // Instances after the first success are never called.
    assert_eq!(never.calls(), 0);
}

#[tokio::test]
async fn test_zombie_instance_is_routed_around() {
    let zombie = spawn_issuer(IssuerBehavior::Zombie).await;
    let ok = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let client = client_over(&[&zombie, &ok], Duration::from_secs(1));

    for round in 1..10usize {
        let response = client
            .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
            .await
            .unwrap();
        assert_eq!(response.token.as_deref(), Some(JWT));
        assert_eq!(ok.calls(), round);
    }

    // The zombie accumulated failures until it was marked dead; from then on
    // it stops being called at all.
    assert!(zombie.calls() <= 3, "zombie called {} times", zombie.calls());
}

#[tokio::test]
async fn test_only_zombies_is_backend_unavailable() {
    let zombie = spawn_issuer(IssuerBehavior::Zombie).await;
    let client = client_over(&[&zombie], Duration::from_secs(1));

    let error = client
        .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
        .await
        .unwrap_err();

    assert!(matches!(error, AuthError::BackendUnavailable { tried: 1 }));
}

#[tokio::test]
async fn test_zombie_and_error_is_backend_unavailable() {
    let zombie = spawn_issuer(IssuerBehavior::Zombie).await;
    let error_instance = spawn_issuer(IssuerBehavior::Error).await;
    let client = client_over(&[&zombie, &error_instance], Duration::from_secs(1));

    let error = client
        .exchange(AuthenticationScheme::SafIdt, &bearer(), "service", Some("APPL"))
        .await
        .unwrap_err();

    assert!(matches!(error, AuthError::BackendUnavailable { tried: 2 }));
}

#[tokio::test]
async fn test_all_hanging_instances_fail_within_bounded_time() {
    let slow_a = spawn_issuer(IssuerBehavior::Hang(Duration::from_secs(10))).await;
    let slow_b = spawn_issuer(IssuerBehavior::Hang(Duration::from_secs(10))).await;
    let timeout = Duration::from_millis(200);
    let client = client_over(&[&slow_a, &slow_b], timeout);

    let started = Instant::now();
    let error = client
        .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(error, AuthError::BackendUnavailable { tried: 2 }));
    // Bounded by timeout * instances tried, with generous slack.
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
}

#[tokio::test]
async fn test_unauthorized_is_terminal_not_failover() {
    let rejecting = spawn_issuer(IssuerBehavior::Unauthorized).await;
    let ok = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let client = client_over(&[&rejecting, &ok], Duration::from_secs(1));

    let response = client
        .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
        .await
        .unwrap();

    // A 401 means the credential is bad, not the instance: the walk stops
    // without trying the healthy peer and the result is a set-nothing
    // response, distinct from backend-unavailable.
    assert!(response.is_no_op());
    assert_eq!(ok.calls(), 0);
}

#[tokio::test]
async fn test_dead_instance_skipped_on_later_requests() {
    let failing = spawn_issuer(IssuerBehavior::Error).await;
    let ok = spawn_issuer(IssuerBehavior::Ok(ok_response())).await;
    let client = client_with_threshold(&[&failing, &ok], Duration::from_secs(1), 2);

    for _ in 0..6 {
        client
            .exchange(AuthenticationScheme::ZoweJwt, &bearer(), "service", None)
            .await
            .unwrap();
    }

    // Two failures marked the instance dead; later requests skip it.
    assert_eq!(failing.calls(), 2);
    assert_eq!(ok.calls(), 6);
}
