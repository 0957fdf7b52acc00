//! Transaction service configuration with validation.

use crate::domain::error::ConfigError;
use serde::{Deserialize, Serialize};
use shared_types::{AUTH_REQUEST_CHANNEL, AUTH_RESPONSE_CHANNEL};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Main transaction service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionsConfig {
    /// HTTP server configuration
    pub http: HttpConfig,
    /// Bus channels and consumer group
    pub channels: ChannelConfig,
    /// Authorize-call behaviour
    pub authorization: AuthorizationConfig,
    /// Correlation table bounds
    pub correlation: CorrelationConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// CORS configuration
    pub cors: CorsConfig,
}

impl TransactionsConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate channels
        if self.channels.request_channel.is_empty() || self.channels.response_channel.is_empty() {
            return Err(ConfigError::InvalidChannels(
                "channel names cannot be empty".into(),
            ));
        }
        if self.channels.request_channel == self.channels.response_channel {
            return Err(ConfigError::InvalidChannels(
                "request and response channels must differ".into(),
            ));
        }
        if self.channels.group_id.is_empty() {
            return Err(ConfigError::InvalidChannels("group_id cannot be empty".into()));
        }

        // Validate timeouts
        if self.authorization.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "authorization timeout cannot be 0".into(),
            ));
        }
        if self.correlation.ttl < self.authorization.timeout {
            return Err(ConfigError::InvalidTimeout(
                "correlation ttl must not be shorter than the authorization timeout".into(),
            ));
        }
        if self.correlation.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "sweep interval cannot be 0".into(),
            ));
        }

        // Validate limits
        if self.correlation.max_entries == 0 {
            return Err(ConfigError::InvalidLimit("max_entries cannot be 0".into()));
        }
        if self.limits.max_request_size == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_request_size cannot be 0".into(),
            ));
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 8080)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
        }
    }
}

/// Bus channel configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel authentication requests are published to
    pub request_channel: String,
    /// Channel verdicts are consumed from
    pub response_channel: String,
    /// Consumer group for the response channel
    pub group_id: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            request_channel: AUTH_REQUEST_CHANNEL.to_string(),
            response_channel: AUTH_RESPONSE_CHANNEL.to_string(),
            group_id: "transaction-service".to_string(),
        }
    }
}

/// Authorize-call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// How long one authorize call waits for a verdict
    pub timeout: Duration,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
        }
    }
}

/// Correlation table configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Maximum pending slots
    pub max_entries: usize,
    /// Age at which a pending slot is evicted by the sweep
    pub ttl: Duration,
    /// How often the sweep runs
    pub sweep_interval: Duration,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(10 * 60),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes
    pub max_request_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 64 * 1024,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins (* for any)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers (* for any)
    pub allowed_headers: Vec<String>,
    /// Max age for preflight cache (seconds)
    pub max_age: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["Content-Type".to_string()],
            max_age: 3600,
        }
    }
}
