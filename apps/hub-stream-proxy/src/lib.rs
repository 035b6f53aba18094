#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Hub Stream Proxy - On-demand streams for a real-time messaging hub
//!
//! Two sides of the same hub integration:
//!
//! - A gRPC server the hub dials when a client subscribes to a proxied
//!   channel. Each call becomes a stream session: unidirectional sessions
//!   push publications from a source, bidirectional sessions echo client
//!   payloads back after a one-time negotiation.
//! - A push consumer that holds one long-lived stream to the hub, decodes
//!   every push into an envelope and dispatches it to a handler, redialing
//!   with backoff whenever the stream drops.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Envelope model, connection state and backoff policy
//!   - `envelope`: Push kinds, payload variants and boundary validation
//!   - `connection`: Consumer state machine and subscription set
//!   - `backoff`: Linear and exponential wait policies
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Publication sources, push transport, push handler
//!   - `services`: Push dispatcher and reconnect loop
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `grpc`: Stream proxy server and sessions
//!   - `unistream`: Hub push client and versioned wire codecs
//!   - `sources`: Ticker and Loki log tail publication sources
//!   - `config`, `health`, `metrics`, `telemetry`, `shutdown`
//!
//! # Data Flow
//!
//! ```text
//! Hub ──Subscribe/Connect──► StreamProxyServer ──► StreamSession ──► source / echo
//!
//! Hub ──push stream──► GrpcPushTransport ──► PushConsumer ──► PushDispatcher ──► handler
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Envelope model and pure policies with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::backoff::{BackoffPolicy, ExponentialBackoff, ExponentialConfig, LinearBackoff};
pub use domain::connection::{ConnectParams, ConnectionState, SubscriptionSet};
pub use domain::envelope::{ChannelScope, ClientInfo, Envelope, EnvelopeError, Payload, PushKind};

// Ports and services
pub use application::ports::{
    ConsumerError, PublicationSource, PushHandler, PushTransport, SourceError,
};
pub use application::services::{ConsumerEvent, PushConsumer, PushConsumerConfig, PushDispatcher};

// Infrastructure config
pub use infrastructure::config::{ConfigError, ConsumerConfig, ProxyConfig, ServerSettings};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{
    MalformedPayloadPolicy, SessionMode, StreamProxyServer, StreamProxyServerConfig,
    proto::proxy as proto,
};

// Push client
pub use infrastructure::unistream::{GrpcPushTransport, PushProtocol, StaticConnectParams};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
