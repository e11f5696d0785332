//! Route authentication requirement resolution.
//!
//! A read-through cache over service-registry metadata. The registry itself
//! (registration, health polling, replication) is an external collaborator;
//! this module only consumes its metadata snapshots and answers "what scheme
//! does this route expect" on the request path.

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_types::RouteAuthRequirement;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Supplies raw registry metadata for a service id.
#[async_trait]
pub trait RouteMetadataSource: Send + Sync {
    /// Metadata of the service, or `None` when the service is unknown.
    async fn fetch(&self, service_id: &str) -> Option<HashMap<String, String>>;
}

/// Fixed metadata source used in tests and static deployments.
#[derive(Debug, Default)]
pub struct StaticMetadataSource {
    services: HashMap<String, HashMap<String, String>>,
}

impl StaticMetadataSource {
    pub fn new(services: HashMap<String, HashMap<String, String>>) -> Self {
        StaticMetadataSource { services }
    }

    pub fn with_service(mut self, service_id: &str, metadata: HashMap<String, String>) -> Self {
        self.services.insert(service_id.to_string(), metadata);
        self
    }
}

#[async_trait]
impl RouteMetadataSource for StaticMetadataSource {
    async fn fetch(&self, service_id: &str) -> Option<HashMap<String, String>> {
        self.services.get(service_id).cloned()
    }
}

/// Read-through cache of per-route authentication requirements.
///
/// Unknown services resolve to the bypass requirement: the proxy still
/// forwards the request and only credential mutation is skipped. Staleness
/// is acceptable; eviction forces a re-resolve on the next request.
pub struct SchemeRegistry {
    source: Arc<dyn RouteMetadataSource>,
    cache: DashMap<String, RouteAuthRequirement>,
}

impl SchemeRegistry {
    pub fn new(source: Arc<dyn RouteMetadataSource>) -> Self {
        SchemeRegistry {
            source,
            cache: DashMap::new(),
        }
    }

    /// Resolves the authentication requirement for a route.
    pub async fn resolve(&self, service_id: &str) -> RouteAuthRequirement {
        if let Some(requirement) = self.cache.get(service_id) {
            return requirement.clone();
        }

        let requirement = match self.source.fetch(service_id).await {
            Some(metadata) => RouteAuthRequirement::from_metadata(&metadata),
            None => {
                debug!(service_id, "service not registered, using bypass");
                RouteAuthRequirement::bypass()
            }
        };

        self.cache
            .insert(service_id.to_string(), requirement.clone());
        requirement
    }

    /// Evicts one cached requirement.
    pub fn evict(&self, service_id: &str) {
        if self.cache.remove(service_id).is_some() {
            debug!(service_id, "evicted cached route requirement");
        }
    }

    /// Evicts every cached requirement.
    pub fn evict_all(&self) {
        let evicted = self.cache.len();
        self.cache.clear();
        debug!(evicted, "evicted all cached route requirements");
    }

    /// Number of cached entries.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
