//! HTTP routing: the gateway's own endpoints plus the proxied fallback.

use crate::middleware::MiddlewareStack;
use crate::proxy::{self, ProxyState};
use crate::registry::SchemeRegistry;
use crate::zaas::{self, ZaasState};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::Router;
use std::sync::Arc;

/// Builds the full router.
///
/// The credential middleware wraps only the proxied fallback; the gateway's
/// own endpoints authenticate callers themselves.
pub fn build_router(
    registry: Arc<SchemeRegistry>,
    zaas_state: Arc<ZaasState>,
    proxy_state: Arc<ProxyState>,
    stack: &MiddlewareStack,
) -> Router {
    let zaas_routes = Router::new()
        .route("/gateway/zaas/ticket", post(zaas::post_ticket))
        .route("/gateway/zaas/zoweJwt", post(zaas::post_zowe_jwt))
        .route("/gateway/zaas/zosmf", post(zaas::post_zosmf))
        .route("/gateway/zaas/safIdt", post(zaas::post_safidt))
        .with_state(zaas_state);

    let cache_routes = Router::new()
        .route("/gateway/cache/services", delete(evict_all))
        .route("/gateway/cache/services/:service_id", delete(evict_one))
        .with_state(registry);

    let proxied = Router::new()
        .fallback(proxy::forward)
        .with_state(proxy_state)
        .layer(stack.auth_scheme.clone())
        .layer(stack.rate_limit.clone());

    Router::new()
        .merge(zaas_routes)
        .merge(cache_routes)
        .fallback_service(proxied)
}

/// `DELETE /gateway/cache/services` — drop every cached route requirement.
async fn evict_all(State(registry): State<Arc<SchemeRegistry>>) -> StatusCode {
    registry.evict_all();
    StatusCode::OK
}

/// `DELETE /gateway/cache/services/{serviceId}` — drop one cached entry.
async fn evict_one(
    State(registry): State<Arc<SchemeRegistry>>,
    Path(service_id): Path<String>,
) -> StatusCode {
    registry.evict(&service_id);
    StatusCode::OK
}
