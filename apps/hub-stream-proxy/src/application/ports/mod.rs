//! Port Interfaces
//!
//! Contracts between the application services and the outside world,
//! following the hexagonal layout of the rest of the crate.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`PublicationSource`]: produces publication bodies for a stream session
//! - [`LogTail`]: live tail on an upstream log store
//! - [`PushTransport`]: dials the hub and opens a push stream
//! - [`ConnectParamsProvider`]: token and channel inventory for each attempt
//!
//! ## Driver Ports (Inbound)
//!
//! - [`PushHandler`]: per-kind callbacks the push dispatcher invokes

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::domain::connection::ConnectParams;
use crate::domain::envelope::{ChannelPosition, ClientInfo, Envelope, EnvelopeError};

// =============================================================================
// Publication Sources (server side)
// =============================================================================

/// Errors raised while opening or reading a publication source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The subscribe request does not carry what the source needs.
    #[error("invalid subscribe request: {0}")]
    InvalidRequest(String),

    /// The upstream collaborator failed.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Negotiation data a source is opened with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRequest {
    /// Channel the hub subscribed the client to.
    pub channel: String,
    /// User id of the subscribing client.
    pub user: String,
    /// Hub-assigned client id.
    pub client: String,
    /// Opaque subscribe data from the client.
    pub data: Vec<u8>,
}

/// Ordered feed of publication bodies. Ends when the source is exhausted.
pub type PublicationFeed = BoxStream<'static, Result<Vec<u8>, SourceError>>;

/// Produces the publications a unidirectional session emits.
#[async_trait]
pub trait PublicationSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Open a feed for one session.
    async fn open(&self, request: &SourceRequest) -> Result<PublicationFeed, SourceError>;
}

/// One line from the upstream log store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the line was recorded.
    pub timestamp: DateTime<Utc>,
    /// The log line.
    pub line: String,
}

/// Live tail of log lines matching a query.
pub type LogFeed = BoxStream<'static, Result<LogEntry, SourceError>>;

/// Upstream log store able to tail a query.
#[async_trait]
pub trait LogTail: Send + Sync {
    /// Start tailing `query`.
    async fn tail(&self, query: &str) -> Result<LogFeed, SourceError>;
}

// =============================================================================
// Push Consumer (client side)
// =============================================================================

/// Errors raised by the push consumer and its collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConsumerError {
    /// Channel inventory or token lookup failed.
    #[error("connect parameters unavailable: {0}")]
    Inventory(String),

    /// The hub could not be reached.
    #[error("dial failed: {0}")]
    Dial(String),

    /// The hub rejected the connect request.
    #[error("handshake rejected: {0}")]
    Handshake(String),

    /// Reading from an open stream failed.
    #[error("stream read failed: {0}")]
    Stream(String),
}

/// One item read from a push stream: a transport-level receipt whose payload
/// may still fail to decode.
pub type DecodedPush = Result<Envelope, EnvelopeError>;

/// Open push stream. Ends on clean close; an `Err` item is a read failure.
pub type PushStream = BoxStream<'static, Result<DecodedPush, ConsumerError>>;

/// Dials the hub and opens a push stream.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Dial a fresh connection and send the connect request.
    async fn open(&self, params: &ConnectParams) -> Result<PushStream, ConsumerError>;
}

/// Supplies the token and subscription set before each connection attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConnectParamsProvider: Send + Sync {
    /// Current connect parameters.
    async fn connect_params(&self) -> Result<ConnectParams, ConsumerError>;
}

/// Per-kind callbacks for dispatched envelopes.
///
/// Every method has a default that logs the envelope and succeeds, so
/// implementors only override the kinds they care about. Errors are logged by
/// the dispatcher and never end the stream.
#[async_trait]
pub trait PushHandler: Send + Sync {
    /// Connection negotiation result.
    async fn on_connect(
        &self,
        client: &str,
        version: &str,
        subscriptions: &BTreeMap<String, ChannelPosition>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            client,
            version,
            channels = subscriptions.len(),
            "Connected to hub"
        );
        Ok(())
    }

    /// Channel subscription acknowledged.
    async fn on_subscribe(&self, channel: &str, data: &[u8]) -> anyhow::Result<()> {
        tracing::info!(channel, bytes = data.len(), "Subscribed");
        Ok(())
    }

    /// Publication received.
    async fn on_publication(
        &self,
        channel: &str,
        data: &[u8],
        tags: &BTreeMap<String, String>,
        offset: u64,
        info: Option<&ClientInfo>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            channel,
            offset,
            tags = tags.len(),
            publisher = info.map_or("", |i| i.user.as_str()),
            data = %String::from_utf8_lossy(data),
            "Publication"
        );
        Ok(())
    }

    /// Client joined a channel.
    async fn on_join(&self, channel: &str, info: &ClientInfo) -> anyhow::Result<()> {
        tracing::info!(channel, user = %info.user, client = %info.client, "Join");
        Ok(())
    }

    /// Client left a channel.
    async fn on_leave(&self, channel: &str, info: &ClientInfo) -> anyhow::Result<()> {
        tracing::info!(channel, user = %info.user, client = %info.client, "Leave");
        Ok(())
    }

    /// Hub announced a disconnect.
    async fn on_disconnect(&self, code: u32, reason: &str) -> anyhow::Result<()> {
        tracing::info!(code, reason, "Disconnect advice");
        Ok(())
    }
}

/// Handler that keeps every default.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPushHandler;

impl PushHandler for LoggingPushHandler {}
