//! Shared fixtures: scripted issuer instances and a header-capturing
//! backend service.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use meridian_gateway::passticket::{PassTicketError, PassTicketService};
use meridian_types::TokenResponse;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted behavior of a mock issuer instance.
#[derive(Clone)]
pub enum IssuerBehavior {
    /// 200 with a populated token response.
    Ok(TokenResponse),
    /// 500 on every call.
    Error,
    /// Reachable but useless: 200 with an empty body.
    Zombie,
    /// 401 on every call.
    Unauthorized,
    /// Accepts the connection and stalls longer than any client timeout.
    Hang(Duration),
}

/// One running mock service (issuer or backend).
pub struct MockService {
    pub base_url: String,
    pub counter: Arc<AtomicUsize>,
    pub seen_headers: Arc<Mutex<Option<HeaderMap>>>,
}

impl MockService {
    pub fn calls(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Headers of the most recent request.
    pub fn last_headers(&self) -> HeaderMap {
        self.seen_headers.lock().clone().unwrap_or_default()
    }
}

async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock service");
    let addr = listener.local_addr().expect("mock service addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// Starts a mock issuer instance answering every path with the scripted
/// behavior.
pub async fn spawn_issuer(behavior: IssuerBehavior) -> MockService {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen_headers = Arc::new(Mutex::new(None));

    let handler_counter = Arc::clone(&counter);
    let handler_headers = Arc::clone(&seen_headers);
    let router = Router::new().fallback(move |req: Request<Body>| {
        let behavior = behavior.clone();
        let counter = Arc::clone(&handler_counter);
        let seen = Arc::clone(&handler_headers);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            *seen.lock() = Some(req.headers().clone());
            match behavior {
                IssuerBehavior::Ok(response) => {
                    axum::Json(response).into_response()
                }
                IssuerBehavior::Error => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                IssuerBehavior::Zombie => axum::Json(TokenResponse::default()).into_response(),
                IssuerBehavior::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
                IssuerBehavior::Hang(delay) => {
                    tokio::time::sleep(delay).await;
                    StatusCode::OK.into_response()
                }
            }
        }
    });

    let base_url = spawn(router).await;
    MockService {
        base_url,
        counter,
        seen_headers,
    }
}

/// Starts a backend service that records the headers it receives.
pub async fn spawn_backend() -> MockService {
    let counter = Arc::new(AtomicUsize::new(0));
    let seen_headers = Arc::new(Mutex::new(None));

    let handler_counter = Arc::clone(&counter);
    let handler_headers = Arc::clone(&seen_headers);
    let router = Router::new().fallback(move |req: Request<Body>| {
        let counter = Arc::clone(&handler_counter);
        let seen = Arc::clone(&handler_headers);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            *seen.lock() = Some(req.headers().clone());
            Response::new(Body::from("ok"))
        }
    });

    let base_url = spawn(router).await;
    MockService {
        base_url,
        counter,
        seen_headers,
    }
}

/// Pass-ticket stub issuing a fixed ticket, for scripted expectations.
pub struct FixedTicketService {
    pub ticket: &'static str,
}

impl PassTicketService for FixedTicketService {
    fn generate(&self, user_id: &str, applid: &str) -> Result<String, PassTicketError> {
        if applid.is_empty() {
            return Err(PassTicketError {
                user_id: user_id.to_string(),
                applid: applid.to_string(),
            });
        }
        Ok(self.ticket.to_string())
    }
}
