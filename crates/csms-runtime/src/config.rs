//! Runtime configuration: defaults overridden by `CSMS_*` environment variables.

use csms_authentication::AuthenticationConfig;
use csms_transactions::TransactionsConfig;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Default Redis endpoint
pub const DEFAULT_BUS_URL: &str = "redis://127.0.0.1:6379";

/// Configuration errors
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    /// A variable is set but cannot be used
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    /// The assembled configuration is inconsistent
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Which message bus backend to run on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusBackend {
    /// In-process broadcast bus
    Memory,
    /// Redis Streams
    Redis,
}

impl std::str::FromStr for BusBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => Err(format!("unknown backend '{other}' (expected memory or redis)")),
        }
    }
}

/// Bus connection settings
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub backend: BusBackend,
    /// Candidate endpoints, tried in order
    pub urls: Vec<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackend::Memory,
            urls: vec![DEFAULT_BUS_URL.to_string()],
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bus: BusConfig,
    /// Run the authentication worker in this process
    pub worker_enabled: bool,
    pub transactions: TransactionsConfig,
    pub authentication: AuthenticationConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            worker_enabled: true,
            transactions: TransactionsConfig::default(),
            authentication: AuthenticationConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, RuntimeConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RuntimeConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = get("CSMS_HTTP_HOST") {
            config.transactions.http.host = parse::<IpAddr>("CSMS_HTTP_HOST", &host)?;
        }
        if let Some(port) = get("CSMS_HTTP_PORT") {
            config.transactions.http.port = parse("CSMS_HTTP_PORT", &port)?;
        }

        if let Some(backend) = get("CSMS_BUS_BACKEND") {
            config.bus.backend = backend
                .parse()
                .map_err(|reason| RuntimeConfigError::Invalid {
                    key: "CSMS_BUS_BACKEND",
                    reason,
                })?;
        }
        if let Some(urls) = get("CSMS_BUS_URL") {
            config.bus.urls = split_list(&urls);
        }

        // Both services must agree on the channel names
        if let Some(channel) = get("CSMS_AUTH_REQUEST_CHANNEL") {
            config.transactions.channels.request_channel = channel.clone();
            config.authentication.request_channel = channel;
        }
        if let Some(channel) = get("CSMS_AUTH_RESPONSE_CHANNEL") {
            config.transactions.channels.response_channel = channel.clone();
            config.authentication.response_channel = channel;
        }
        if let Some(group) = get("CSMS_TRANSACTIONS_GROUP_ID") {
            config.transactions.channels.group_id = group;
        }
        if let Some(group) = get("CSMS_AUTHENTICATION_GROUP_ID") {
            config.authentication.group_id = group;
        }

        if let Some(secs) = get("CSMS_AUTHORIZATION_TIMEOUT_SECONDS") {
            config.transactions.authorization.timeout =
                Duration::from_secs(parse("CSMS_AUTHORIZATION_TIMEOUT_SECONDS", &secs)?);
        }
        if let Some(max) = get("CSMS_CORRELATION_MAX_ENTRIES") {
            config.transactions.correlation.max_entries = parse("CSMS_CORRELATION_MAX_ENTRIES", &max)?;
        }
        if let Some(minutes) = get("CSMS_CORRELATION_TTL_MINUTES") {
            let minutes: u64 = parse("CSMS_CORRELATION_TTL_MINUTES", &minutes)?;
            config.transactions.correlation.ttl = Duration::from_secs(minutes * 60);
        }

        if let Some(enabled) = get("CSMS_WORKER_ENABLED") {
            config.worker_enabled = parse_bool("CSMS_WORKER_ENABLED", &enabled)?;
        }
        if let Some(origins) = get("CSMS_CORS_ALLOWED_ORIGINS") {
            config.transactions.cors.allowed_origins = split_list(&origins);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the assembled configuration
    pub fn validate(&self) -> Result<(), RuntimeConfigError> {
        self.transactions
            .validate()
            .map_err(|e| RuntimeConfigError::Validation(e.to_string()))?;
        self.authentication
            .validate()
            .map_err(RuntimeConfigError::Validation)?;

        if self.bus.backend == BusBackend::Redis && self.bus.urls.is_empty() {
            return Err(RuntimeConfigError::Validation(
                "redis backend needs at least one CSMS_BUS_URL".into(),
            ));
        }
        if self.transactions.channels.group_id == self.authentication.group_id {
            return Err(RuntimeConfigError::Validation(
                "transaction and authentication consumer groups must differ".into(),
            ));
        }
        Ok(())
    }

    /// Log the effective configuration
    pub fn log_summary(&self) {
        info!(
            http = %self.transactions.http_addr(),
            backend = ?self.bus.backend,
            worker = self.worker_enabled,
            request_channel = %self.transactions.channels.request_channel,
            response_channel = %self.transactions.channels.response_channel,
            timeout_secs = self.transactions.authorization.timeout.as_secs(),
            max_entries = self.transactions.correlation.max_entries,
            ttl_secs = self.transactions.correlation.ttl.as_secs(),
            "Effective configuration"
        );
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, RuntimeConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| RuntimeConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, RuntimeConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(RuntimeConfigError::Invalid {
            key,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
