//! Southbound forward stage.
//!
//! Deliberately thin: path rewriting, load balancing and retry of the
//! southbound call are outside this crate. The stage resolves the target
//! instance, enforces the per-route encoded-slash policy and replays the
//! mutated request as-is.

use crate::domain::config::RoutesConfig;
use crate::middleware::rate_limit::first_path_segment;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Resolves a service id to the base URL of a backend instance.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, service_id: &str) -> Option<String>;
}

/// Fixed route table used in tests and static deployments.
#[derive(Debug, Default)]
pub struct StaticTargets {
    targets: DashMap<String, String>,
}

impl StaticTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, service_id: &str, base_url: &str) {
        self.targets
            .insert(service_id.to_string(), base_url.to_string());
    }
}

impl TargetResolver for StaticTargets {
    fn resolve(&self, service_id: &str) -> Option<String> {
        self.targets.get(service_id).map(|url| url.value().clone())
    }
}

/// Shared state of the forward stage.
pub struct ProxyState {
    pub client: reqwest::Client,
    pub targets: Arc<dyn TargetResolver>,
    pub routes: RoutesConfig,
}

/// Forwards the (already credential-translated) request to its backend.
pub async fn forward(State(state): State<Arc<ProxyState>>, req: Request<Body>) -> Response {
    let raw_path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let Some(service_id) = first_path_segment(req.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    if !state.routes.allows_encoded_slashes(&service_id) && contains_encoded_slash(&raw_path) {
        debug!(service_id = %service_id, "rejecting percent-encoded slash in path");
        return (
            StatusCode::BAD_REQUEST,
            "encoded slashes are not allowed on this route",
        )
            .into_response();
    }

    let Some(base_url) = state.targets.resolve(&service_id) else {
        return (StatusCode::NOT_FOUND, format!("unknown service {service_id}")).into_response();
    };

    let url = format!("{}{}", base_url.trim_end_matches('/'), raw_path);
    let method = req.method().clone();
    let headers = req.headers().clone();

    let body = match axum::body::to_bytes(req.into_body(), 10 * 1024 * 1024).await {
        Ok(body) => body,
        Err(error) => {
            warn!(%error, "failed to buffer request body");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let mut outbound = state.client.request(method, &url).body(body.to_vec());
    for (name, value) in &headers {
        if *name != axum::http::header::HOST {
            outbound = outbound.header(name, value);
        }
    }

    match outbound.send().await {
        Ok(response) => {
            let status = response.status();
            let mut builder = axum::http::Response::builder().status(status);
            if let Some(response_headers) = builder.headers_mut() {
                for (name, value) in response.headers() {
                    response_headers.append(name.clone(), value.clone());
                }
            }
            let bytes = response.bytes().await.unwrap_or_default();
            builder
                .body(Body::from(bytes))
                .unwrap_or_else(|_| StatusCode::BAD_GATEWAY.into_response())
        }
        Err(error) => {
            warn!(service_id = %service_id, %error, "southbound call failed");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

fn contains_encoded_slash(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    lowered.contains("%2f")
}
