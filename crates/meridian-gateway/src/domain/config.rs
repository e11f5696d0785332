//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Per-route rate limiting
    pub rate_limit: RateLimitConfig,
    /// Token issuer cluster and failover behavior
    pub issuer: IssuerConfig,
    /// Keys and token material
    pub security: SecurityConfig,
    /// Per-route proxy options
    pub routes: RoutesConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            issuer: IssuerConfig::default(),
            security: SecurityConfig::default(),
            routes: RoutesConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.enabled && self.rate_limit.capacity == 0 {
            return Err(ConfigError::InvalidRateLimit("capacity cannot be 0".into()));
        }

        if self.rate_limit.enabled && self.rate_limit.refill_duration.is_zero() {
            return Err(ConfigError::InvalidRateLimit(
                "refill duration cannot be 0".into(),
            ));
        }

        if self.issuer.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "issuer call timeout cannot be 0".into(),
            ));
        }

        if self.issuer.failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "issuer failure threshold cannot be 0".into(),
            ));
        }

        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Invalid("jwt secret cannot be empty".into()));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn server_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 10010)
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 10010,
        }
    }
}

/// Rate limiting configuration: one token bucket per (route, subject) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting
    pub enabled: bool,
    /// Bucket capacity (burst allowance)
    pub capacity: u32,
    /// Time to replenish one token, computed lazily at check time
    #[serde(with = "humantime_serde")]
    pub refill_duration: Duration,
    /// Idle time after which a bucket is evicted
    #[serde(with = "humantime_serde")]
    pub bucket_idle_timeout: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 20,
            refill_duration: Duration::from_millis(1000),
            bucket_idle_timeout: Duration::from_secs(600),
        }
    }
}

/// Token issuer cluster configuration.
///
/// An empty instance list is valid: routes that need a token exchange then
/// fail with backend-unavailable at call time, while every other route keeps
/// working.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerConfig {
    /// Ordered base URLs of the known issuer instances
    pub instances: Vec<String>,
    /// Upper bound for a single issuer call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Failures within the observation window before an instance is dead
    pub failure_threshold: u32,
    /// Window after which a dead mark expires and the instance is probed again
    #[serde(with = "humantime_serde")]
    pub observation_window: Duration,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            timeout: Duration::from_secs(3),
            failure_threshold: 3,
            observation_window: Duration::from_secs(30),
        }
    }
}

/// Keys and token material.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Base64-encoded public keys identifying the gateway's own certificates
    pub gateway_public_keys_base64: Vec<String>,
    /// HMAC secret for gateway-issued tokens
    pub jwt_secret: String,
    /// Validity of gateway-issued tokens
    #[serde(with = "humantime_serde")]
    pub token_validity: Duration,
    /// External OIDC provider accepted by the `oidc` scheme
    pub oidc: Option<OidcConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            gateway_public_keys_base64: Vec::new(),
            jwt_secret: "change-me-in-production".to_string(),
            token_validity: Duration::from_secs(8 * 60 * 60),
            oidc: None,
        }
    }
}

/// External OIDC provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OidcConfig {
    /// Expected `iss` claim
    pub issuer: String,
    /// PEM-encoded RSA public key used to check token signatures
    pub public_key_pem: String,
}

/// Per-route proxy options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Allow percent-encoded slashes in proxied paths unless overridden
    pub allow_encoded_slashes: bool,
    /// Per-route overrides keyed by service id
    pub overrides: HashMap<String, RouteOverride>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            allow_encoded_slashes: true,
            overrides: HashMap::new(),
        }
    }
}

impl RoutesConfig {
    /// Effective encoded-slash policy for one route.
    pub fn allows_encoded_slashes(&self, service_id: &str) -> bool {
        self.overrides
            .get(service_id)
            .and_then(|o| o.allow_encoded_slashes)
            .unwrap_or(self.allow_encoded_slashes)
    }
}

/// Overridable options of a single route.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOverride {
    /// Override the workspace-wide encoded-slash policy
    pub allow_encoded_slashes: Option<bool>,
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid rate limiting configuration
    #[error("invalid rate limit: {0}")]
    InvalidRateLimit(String),
    /// Invalid timeout value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Plain number means seconds
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid duration format")
        }
    }
}
