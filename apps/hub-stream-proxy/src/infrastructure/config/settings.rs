//! Configuration Settings
//!
//! Configuration types for the stream proxy server and the push consumer,
//! loaded from environment variables. Numeric values that fail to parse fall
//! back to their defaults; enumerated values that fail to parse are errors.

use std::str::FromStr;
use std::time::Duration;

use crate::domain::backoff::{BackoffPolicy, ExponentialBackoff, ExponentialConfig, LinearBackoff};
use crate::infrastructure::grpc::{MalformedPayloadPolicy, StreamProxyServerConfig};
use crate::infrastructure::sources::LokiConfig;
use crate::infrastructure::unistream::{PushProtocol, PushTransportConfig};

/// Environment lookup, `std::env::var` in production.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// =============================================================================
// Server
// =============================================================================

/// Where unidirectional sessions get their publications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Numbered ticks.
    #[default]
    Ticker,
    /// Live tail of a Loki query.
    Loki,
}

impl SourceKind {
    /// Source name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Loki => "loki",
        }
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ticker" => Ok(Self::Ticker),
            "loki" => Ok(Self::Loki),
            other => Err(format!("unknown source: {other}")),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// gRPC server port.
    pub grpc_port: u16,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            grpc_port: 12000,
            health_port: 8082,
        }
    }
}

/// Complete stream proxy configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Server port settings.
    pub server: ServerSettings,
    /// Publication source for unidirectional sessions.
    pub source: SourceKind,
    /// Ticker period.
    pub tick_interval: Duration,
    /// Publications per unidirectional session (`None` = unlimited).
    pub max_emissions: Option<u64>,
    /// Loki base URL for the log tail source.
    pub loki_url: String,
    /// Malformed client payload handling.
    pub malformed_payload: MalformedPayloadPolicy,
    /// User reported in connect acknowledgements.
    pub connect_user: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        let server = StreamProxyServerConfig::default();
        Self {
            server: ServerSettings::default(),
            source: SourceKind::default(),
            tick_interval: Duration::from_secs(1),
            max_emissions: server.max_emissions,
            loki_url: LokiConfig::default().url,
            malformed_payload: server.malformed_payload,
            connect_user: server.connect_user,
        }
    }
}

impl ProxyConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an enumerated variable has an unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let server = ServerSettings {
            grpc_port: parse_or(env, "STREAM_PROXY_GRPC_PORT", defaults.server.grpc_port),
            health_port: parse_or(env, "STREAM_PROXY_HEALTH_PORT", defaults.server.health_port),
        };

        let max_emissions = match env("STREAM_PROXY_MAX_EMISSIONS")
            .and_then(|v| v.parse::<u64>().ok())
        {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_emissions,
        };

        Ok(Self {
            server,
            source: parse_enum(env, "STREAM_PROXY_SOURCE", defaults.source)?,
            tick_interval: parse_millis(env, "STREAM_PROXY_TICK_INTERVAL_MS", defaults.tick_interval),
            max_emissions,
            loki_url: env("STREAM_PROXY_LOKI_URL").unwrap_or(defaults.loki_url),
            malformed_payload: parse_enum(
                env,
                "STREAM_PROXY_MALFORMED_PAYLOAD",
                defaults.malformed_payload,
            )?,
            connect_user: env("STREAM_PROXY_CONNECT_USER").unwrap_or(defaults.connect_user),
        })
    }

    /// Settings for the gRPC service.
    #[must_use]
    pub fn server_config(&self) -> StreamProxyServerConfig {
        StreamProxyServerConfig {
            max_emissions: self.max_emissions,
            malformed_payload: self.malformed_payload,
            connect_user: self.connect_user.clone(),
            ..StreamProxyServerConfig::default()
        }
    }

    /// Settings for the Loki log tail.
    #[must_use]
    pub fn loki_config(&self) -> LokiConfig {
        LokiConfig {
            url: self.loki_url.clone(),
        }
    }
}

// =============================================================================
// Consumer
// =============================================================================

/// Reconnect backoff flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffKind {
    /// `n` seconds after `n` consecutive failures.
    #[default]
    Linear,
    /// Doubling with cap and jitter.
    Exponential,
}

impl BackoffKind {
    /// Backoff name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Exponential => "exponential",
        }
    }
}

impl FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "exponential" => Ok(Self::Exponential),
            other => Err(format!("unknown backoff: {other}")),
        }
    }
}

/// Complete push consumer configuration.
#[derive(Clone)]
pub struct ConsumerConfig {
    /// Hub gRPC address.
    pub server_addr: String,
    /// Push wire generation.
    pub protocol: PushProtocol,
    /// Connection token. Never logged.
    pub token: String,
    /// Channels subscribed at connect time.
    pub channels: Vec<String>,
    /// Reconnect backoff.
    pub backoff: BackoffKind,
    /// Dial timeout.
    pub connect_timeout: Duration,
    /// Health check HTTP port.
    pub health_port: u16,
}

impl std::fmt::Debug for ConsumerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerConfig")
            .field("server_addr", &self.server_addr)
            .field("protocol", &self.protocol)
            .field("token", &"[REDACTED]")
            .field("channels", &self.channels)
            .field("backoff", &self.backoff)
            .field("connect_timeout", &self.connect_timeout)
            .field("health_port", &self.health_port)
            .finish()
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        let transport = PushTransportConfig::default();
        Self {
            server_addr: transport.server_addr,
            protocol: transport.protocol,
            token: String::new(),
            channels: Vec::new(),
            backoff: BackoffKind::default(),
            connect_timeout: transport.connect_timeout,
            health_port: 8083,
        }
    }
}

impl ConsumerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an enumerated variable has an unknown value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&process_env)
    }

    fn from_lookup(env: Lookup<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let channels = env("CONSUMER_CHANNELS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server_addr: env("CONSUMER_SERVER_ADDR").unwrap_or(defaults.server_addr),
            protocol: parse_enum(env, "CONSUMER_PROTOCOL", defaults.protocol)?,
            token: env("CONSUMER_TOKEN").unwrap_or_default(),
            channels,
            backoff: parse_enum(env, "CONSUMER_BACKOFF", defaults.backoff)?,
            connect_timeout: parse_millis(
                env,
                "CONSUMER_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout,
            ),
            health_port: parse_or(env, "CONSUMER_HEALTH_PORT", defaults.health_port),
        })
    }

    /// Settings for the gRPC push transport.
    #[must_use]
    pub fn transport_config(&self) -> PushTransportConfig {
        PushTransportConfig {
            server_addr: self.server_addr.clone(),
            protocol: self.protocol,
            connect_timeout: self.connect_timeout,
        }
    }

    /// The configured backoff policy.
    #[must_use]
    pub fn backoff_policy(&self) -> Box<dyn BackoffPolicy> {
        match self.backoff {
            BackoffKind::Linear => Box::new(LinearBackoff::default()),
            BackoffKind::Exponential => {
                Box::new(ExponentialBackoff::new(ExponentialConfig::default()))
            }
        }
    }
}

// =============================================================================
// Errors & Parsing
// =============================================================================

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has a value outside its allowed set.
    #[error("invalid value for {key}: {message}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Parser message.
        message: String,
    },
}

fn parse_or<T: FromStr>(env: Lookup<'_>, key: &str, default: T) -> T {
    env(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_millis(env: Lookup<'_>, key: &str, default: Duration) -> Duration {
    env(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_enum<T>(env: Lookup<'_>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr<Err = String>,
{
    match env(key) {
        None => Ok(default),
        Some(v) if v.trim().is_empty() => Ok(default),
        Some(v) => v.trim().parse().map_err(|message| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn proxy_defaults() {
        let config = ProxyConfig::from_lookup(&lookup(&[])).unwrap();
        assert_eq!(config.server.grpc_port, 12000);
        assert_eq!(config.server.health_port, 8082);
        assert_eq!(config.source, SourceKind::Ticker);
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.max_emissions, Some(20));
        assert_eq!(config.loki_url, "ws://loki:3100");
        assert_eq!(config.malformed_payload, MalformedPayloadPolicy::Close);
        assert_eq!(config.connect_user, "test");
    }

    #[test]
    fn proxy_overrides() {
        let env = lookup(&[
            ("STREAM_PROXY_GRPC_PORT", "13000"),
            ("STREAM_PROXY_SOURCE", "LOKI"),
            ("STREAM_PROXY_TICK_INTERVAL_MS", "250"),
            ("STREAM_PROXY_MAX_EMISSIONS", "0"),
            ("STREAM_PROXY_MALFORMED_PAYLOAD", "reject"),
        ]);
        let config = ProxyConfig::from_lookup(&env).unwrap();
        assert_eq!(config.server.grpc_port, 13000);
        assert_eq!(config.source, SourceKind::Loki);
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.max_emissions, None);
        assert_eq!(config.server_config().malformed_payload, MalformedPayloadPolicy::Reject);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let env = lookup(&[("STREAM_PROXY_GRPC_PORT", "lots"), ("STREAM_PROXY_MAX_EMISSIONS", "-1")]);
        let config = ProxyConfig::from_lookup(&env).unwrap();
        assert_eq!(config.server.grpc_port, 12000);
        assert_eq!(config.max_emissions, Some(20));
    }

    #[test]
    fn bad_enum_is_error() {
        let env = lookup(&[("STREAM_PROXY_SOURCE", "kafka")]);
        let err = ProxyConfig::from_lookup(&env).unwrap_err();
        assert!(err.to_string().contains("STREAM_PROXY_SOURCE"));
    }

    #[test]
    fn consumer_parses_channels_and_protocol() {
        let env = lookup(&[
            ("CONSUMER_SERVER_ADDR", "http://hub:11000"),
            ("CONSUMER_PROTOCOL", "v1"),
            ("CONSUMER_TOKEN", "secret-token"),
            ("CONSUMER_CHANNELS", " news, chat ,,"),
            ("CONSUMER_BACKOFF", "exponential"),
        ]);
        let config = ConsumerConfig::from_lookup(&env).unwrap();
        assert_eq!(config.protocol, PushProtocol::V1);
        assert_eq!(config.channels, vec!["news", "chat"]);
        assert_eq!(config.backoff, BackoffKind::Exponential);
        assert_eq!(config.transport_config().server_addr, "http://hub:11000");
        assert!(!format!("{config:?}").contains("secret-token"));
    }

    #[test]
    fn consumer_defaults_to_linear_v2() {
        let config = ConsumerConfig::from_lookup(&lookup(&[])).unwrap();
        assert_eq!(config.protocol, PushProtocol::V2);
        assert_eq!(config.backoff, BackoffKind::Linear);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.backoff_policy().delay(3), Duration::from_secs(3));
        assert_eq!(config.health_port, 8083);
    }
}
