//! gRPC Stream Proxy Server Implementation
//!
//! Implements the `StreamProxy` service. Every RPC spawns one session task
//! that writes into a bounded channel; the receiving half is returned to
//! tonic as the response stream.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};

use super::proto::proxy::{
    StreamConnectRequest, StreamConnectResponse, StreamSubscribeRequest, StreamSubscribeResponse,
    SubscribeRequest, stream_proxy_server::StreamProxy,
};
use super::schema::{ConnectSchema, DuplexSchema, SubscribeSchema};
use super::session::{MalformedPayloadPolicy, Outbound, SessionMode, StreamSession};
use crate::application::ports::PublicationSource;

// =============================================================================
// Type Aliases
// =============================================================================

type StreamResult<T> = Result<Response<T>, Status>;
type BoxedStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Outbound frames buffered per session before the session waits on the hub.
const OUTBOUND_BUFFER: usize = 64;

// =============================================================================
// Server Configuration
// =============================================================================

/// Configuration for the stream proxy server.
#[derive(Debug, Clone)]
pub struct StreamProxyServerConfig {
    /// Proxy version string.
    pub version: String,
    /// Publications per unidirectional session; `None` streams until the
    /// source ends.
    pub max_emissions: Option<u64>,
    /// What to do with an unparseable client payload.
    pub malformed_payload: MalformedPayloadPolicy,
    /// User reported in the connect acknowledgement.
    pub connect_user: String,
}

impl Default for StreamProxyServerConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_emissions: Some(20),
            malformed_payload: MalformedPayloadPolicy::default(),
            connect_user: "test".to_string(),
        }
    }
}

// =============================================================================
// Session Stats
// =============================================================================

/// Session counters shared with the health endpoint.
#[derive(Debug, Default)]
pub struct SessionStats {
    active: AtomicUsize,
    total: AtomicU64,
}

impl SessionStats {
    /// Sessions currently running.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Sessions accepted since start.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn enter(self: &Arc<Self>) -> ActiveSession {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.total.fetch_add(1, Ordering::Relaxed);
        ActiveSession(Arc::clone(self))
    }
}

struct ActiveSession(Arc<SessionStats>);

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::Relaxed);
    }
}

// =============================================================================
// Server Implementation
// =============================================================================

/// gRPC server for on-demand hub streams.
pub struct StreamProxyServer {
    config: StreamProxyServerConfig,
    source: Arc<dyn PublicationSource>,
    subscribe_schema: Arc<SubscribeSchema>,
    connect_schema: Arc<ConnectSchema>,
    shutdown: CancellationToken,
    stats: Arc<SessionStats>,
}

impl StreamProxyServer {
    /// Create a server that feeds unidirectional sessions from `source`.
    #[must_use]
    pub fn new(config: StreamProxyServerConfig, source: Arc<dyn PublicationSource>) -> Self {
        tracing::info!(
            version = %config.version,
            source = source.name(),
            max_emissions = ?config.max_emissions,
            malformed_payload = ?config.malformed_payload,
            "Stream proxy server configured"
        );
        let connect_schema = Arc::new(ConnectSchema::new(config.connect_user.clone()));
        Self {
            config,
            source,
            subscribe_schema: Arc::new(SubscribeSchema),
            connect_schema,
            shutdown: CancellationToken::new(),
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Cancel every running session when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Session counters.
    #[must_use]
    pub fn stats(&self) -> Arc<SessionStats> {
        Arc::clone(&self.stats)
    }

    /// Start a session and its outbound channel.
    ///
    /// The session token is a child of the shutdown token and is also
    /// cancelled when tonic drops the response stream.
    fn open<T: Send + 'static>(
        &self,
        mode: SessionMode,
    ) -> (StreamSession, Outbound<T>, ReceiverStream<Result<T, Status>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let cancel = self.shutdown.child_token();

        let watch_tx = tx.clone();
        let watch_cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = watch_tx.closed() => watch_cancel.cancel(),
                () = watch_cancel.cancelled() => {}
            }
        });

        (
            StreamSession::start(mode, cancel),
            tx,
            ReceiverStream::new(rx),
        )
    }

    fn spawn_duplex<S>(
        &self,
        schema: Arc<S>,
        inbound: Streaming<S::Inbound>,
    ) -> ReceiverStream<Result<S::Outbound, Status>>
    where
        S: DuplexSchema,
    {
        let (mut session, tx, rx) = self.open(S::MODE);
        let policy = self.config.malformed_payload;
        let guard = self.stats.enter();

        tokio::spawn(async move {
            let _guard = guard;
            let result = session.run_duplex(&*schema, inbound, policy, &tx).await;
            session.finish(result, &tx).await;
        });

        rx
    }
}

#[tonic::async_trait]
impl StreamProxy for StreamProxyServer {
    type SubscribeUnidirectionalStream = BoxedStream<StreamSubscribeResponse>;
    type SubscribeBidirectionalStream = BoxedStream<StreamSubscribeResponse>;
    type ConnectBidirectionalStream = BoxedStream<StreamConnectResponse>;

    async fn subscribe_unidirectional(
        &self,
        request: Request<SubscribeRequest>,
    ) -> StreamResult<Self::SubscribeUnidirectionalStream> {
        let request = request.into_inner();
        let (mut session, tx, rx) = self.open(SessionMode::Unidirectional);
        let source = Arc::clone(&self.source);
        let max_emissions = self.config.max_emissions;
        let guard = self.stats.enter();

        tokio::spawn(async move {
            let _guard = guard;
            let result = session
                .run_unidirectional(source.as_ref(), request, max_emissions, &tx)
                .await;
            session.finish(result, &tx).await;
        });

        Ok(Response::new(
            Box::pin(rx) as Self::SubscribeUnidirectionalStream
        ))
    }

    async fn subscribe_bidirectional(
        &self,
        request: Request<Streaming<StreamSubscribeRequest>>,
    ) -> StreamResult<Self::SubscribeBidirectionalStream> {
        let stream = self.spawn_duplex(Arc::clone(&self.subscribe_schema), request.into_inner());
        Ok(Response::new(
            Box::pin(stream) as Self::SubscribeBidirectionalStream
        ))
    }

    async fn connect_bidirectional(
        &self,
        request: Request<Streaming<StreamConnectRequest>>,
    ) -> StreamResult<Self::ConnectBidirectionalStream> {
        let stream = self.spawn_duplex(Arc::clone(&self.connect_schema), request.into_inner());
        Ok(Response::new(
            Box::pin(stream) as Self::ConnectBidirectionalStream
        ))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_track_active_sessions() {
        let stats = Arc::new(SessionStats::default());

        let first = stats.enter();
        let second = stats.enter();
        assert_eq!(stats.active(), 2);
        assert_eq!(stats.total(), 2);

        drop(first);
        assert_eq!(stats.active(), 1);
        drop(second);
        assert_eq!(stats.active(), 0);
        assert_eq!(stats.total(), 2);
    }

    #[test]
    fn default_config_streams_twenty_and_closes_on_malformed() {
        let config = StreamProxyServerConfig::default();
        assert_eq!(config.max_emissions, Some(20));
        assert_eq!(config.malformed_payload, MalformedPayloadPolicy::Close);
        assert_eq!(config.connect_user, "test");
    }
}
