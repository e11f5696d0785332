//! Composition root.
//!
//! Wires configuration, collaborator boundaries and the middleware stack
//! into a runnable gateway. Collaborators are passed in by constructor:
//! there is no ambient global state, which keeps unit tests deterministic.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::issuer::{IssuerFailoverPool, IssuerInstance, PoolConfig, TokenIssuerClient};
use crate::middleware::{cleanup_task, AuthSchemeState, MiddlewareStack};
use crate::oidc::OidcValidator;
use crate::passticket::{DummyPassTicketService, PassTicketService};
use crate::proxy::{ProxyState, StaticTargets, TargetResolver};
use crate::registry::{RouteMetadataSource, SchemeRegistry, StaticMetadataSource};
use crate::token::TokenService;
use crate::zaas::{DummySafIdtProvider, DummyZosmfExchange, SafIdtProvider, ZaasState, ZosmfTokenExchange};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Externally-provided collaborators of the gateway.
pub struct Collaborators {
    pub metadata: Arc<dyn RouteMetadataSource>,
    pub targets: Arc<dyn TargetResolver>,
    pub passtickets: Arc<dyn PassTicketService>,
    pub safidt: Arc<dyn SafIdtProvider>,
    pub zosmf: Arc<dyn ZosmfTokenExchange>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            metadata: Arc::new(StaticMetadataSource::default()),
            targets: Arc::new(StaticTargets::new()),
            passtickets: Arc::new(DummyPassTicketService),
            safidt: Arc::new(DummySafIdtProvider),
            zosmf: Arc::new(DummyZosmfExchange),
        }
    }
}

/// The assembled gateway.
pub struct GatewayService {
    config: GatewayConfig,
    router: Router,
    stack: MiddlewareStack,
    registry: Arc<SchemeRegistry>,
    pool: Arc<IssuerFailoverPool>,
}

impl GatewayService {
    /// Assembles the gateway from configuration and collaborators.
    pub fn new(config: GatewayConfig, collaborators: Collaborators) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|error| GatewayError::Config(error.to_string()))?;

        let registry = Arc::new(SchemeRegistry::new(collaborators.metadata));

        let instances = config
            .issuer
            .instances
            .iter()
            .enumerate()
            .map(|(index, url)| IssuerInstance::new(format!("issuer-{index}"), url.clone()))
            .collect();
        let pool = Arc::new(IssuerFailoverPool::new(
            instances,
            PoolConfig {
                failure_threshold: config.issuer.failure_threshold,
                observation_window: config.issuer.observation_window,
            },
        ));
        let issuer = Arc::new(TokenIssuerClient::new(
            Arc::clone(&pool),
            config.issuer.timeout,
        ));

        let tokens = Arc::new(TokenService::new(
            &config.security.jwt_secret,
            config.security.token_validity,
        ));

        let oidc = match &config.security.oidc {
            Some(oidc_config) => Some(Arc::new(
                OidcValidator::new(oidc_config)
                    .map_err(|error| GatewayError::Config(error.to_string()))?,
            )),
            None => None,
        };

        let auth_state = Arc::new(AuthSchemeState {
            registry: Arc::clone(&registry),
            issuer,
            passtickets: Arc::clone(&collaborators.passtickets),
            tokens: Arc::clone(&tokens),
            oidc,
            gateway_public_keys: config
                .security
                .gateway_public_keys_base64
                .iter()
                .cloned()
                .collect(),
        });

        let stack = MiddlewareStack::new(config.rate_limit.clone(), auth_state);

        let zaas_state = Arc::new(ZaasState {
            tokens,
            passtickets: collaborators.passtickets,
            safidt: collaborators.safidt,
            zosmf: collaborators.zosmf,
        });

        let proxy_state = Arc::new(ProxyState {
            client: reqwest::Client::new(),
            targets: collaborators.targets,
            routes: config.routes.clone(),
        });

        let router = crate::router::build_router(
            Arc::clone(&registry),
            zaas_state,
            proxy_state,
            &stack,
        )
        .layer(TraceLayer::new_for_http());

        Ok(Self {
            config,
            router,
            stack,
            registry,
            pool,
        })
    }

    /// The assembled router, for embedding or tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// The scheme cache, for administrative eviction.
    pub fn registry(&self) -> Arc<SchemeRegistry> {
        Arc::clone(&self.registry)
    }

    /// The issuer pool, for external health-check integration.
    pub fn pool(&self) -> Arc<IssuerFailoverPool> {
        Arc::clone(&self.pool)
    }

    /// Binds the listener and serves until shutdown.
    pub async fn start(self) -> Result<(), GatewayError> {
        let addr = self.config.server_addr();

        tokio::spawn(cleanup_task(
            self.stack.rate_limit_state(),
            Duration::from_secs(60),
            self.config.rate_limit.bucket_idle_timeout,
        ));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!(%addr, "gateway listening");
        axum::serve(listener, self.router)
            .await
            .map_err(GatewayError::Bind)
    }
}
