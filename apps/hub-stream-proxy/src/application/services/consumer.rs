//! Push Consumer
//!
//! Keeps one push stream to the hub alive: wait out the backoff, dial,
//! send the connect request, wait for the hub's connect push, read envelopes
//! until the stream fails, repeat. The loop only exits when its cancellation
//! token fires.
//!
//! Failure accounting lives in [`ConnectionTracker`]; the wait before each
//! attempt is `backoff.delay(consecutive_failures)`.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::dispatcher::PushDispatcher;
use crate::application::ports::{
    ConnectParamsProvider, ConsumerError, PushHandler, PushStream, PushTransport,
};
use crate::domain::backoff::BackoffPolicy;
use crate::domain::connection::ConnectionTracker;
use crate::domain::envelope::{ChannelScope, Envelope, PushKind};
use crate::infrastructure::metrics;

// =============================================================================
// Events
// =============================================================================

/// Lifecycle transitions reported by the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// Waiting before the next attempt.
    Backoff {
        /// Wait duration.
        delay: Duration,
        /// Failures the wait was computed from.
        consecutive_failures: u32,
    },
    /// Dialing.
    Connecting {
        /// 1-based attempt number.
        attempt: u64,
    },
    /// Push stream open and the hub's connect push received.
    Connected {
        /// Attempt that succeeded.
        attempt: u64,
    },
    /// Dial, handshake or inventory failure.
    AttemptFailed {
        /// What went wrong.
        error: ConsumerError,
        /// Failures after this one.
        consecutive_failures: u32,
    },
    /// An open stream ended.
    StreamEnded {
        /// Envelopes received on the stream.
        received: u64,
        /// Read error, or `None` on clean close.
        error: Option<ConsumerError>,
        /// Failures after the stream ended.
        consecutive_failures: u32,
    },
    /// The loop exited after cancellation.
    Stopped,
}

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for [`PushConsumer`].
#[derive(Debug, Clone)]
pub struct PushConsumerConfig {
    /// Validation scope applied to every decoded envelope.
    pub scope: ChannelScope,
}

impl Default for PushConsumerConfig {
    fn default() -> Self {
        Self {
            scope: ChannelScope::Channel,
        }
    }
}

// =============================================================================
// Consumer
// =============================================================================

enum StreamEnd {
    Cancelled,
    Closed,
    Failed(ConsumerError),
}

/// Reconnect loop around a [`PushTransport`].
pub struct PushConsumer<T, P, H> {
    config: PushConsumerConfig,
    transport: Arc<T>,
    params: Arc<P>,
    dispatcher: PushDispatcher<H>,
    backoff: Box<dyn BackoffPolicy>,
    events: Option<mpsc::Sender<ConsumerEvent>>,
}

impl<T, P, H> PushConsumer<T, P, H>
where
    T: PushTransport,
    P: ConnectParamsProvider,
    H: PushHandler,
{
    /// Create a consumer.
    #[must_use]
    pub fn new(
        config: PushConsumerConfig,
        transport: Arc<T>,
        params: Arc<P>,
        dispatcher: PushDispatcher<H>,
        backoff: Box<dyn BackoffPolicy>,
    ) -> Self {
        Self {
            config,
            transport,
            params,
            dispatcher,
            backoff,
            events: None,
        }
    }

    /// Report lifecycle events on `tx`.
    #[must_use]
    pub fn with_events(mut self, tx: mpsc::Sender<ConsumerEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Run until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut tracker = ConnectionTracker::new();

        loop {
            let failures = tracker.consecutive_failures();
            let delay = self.backoff.delay(failures);
            if !delay.is_zero() {
                tracing::info!(
                    consecutive_failures = failures,
                    delay_ms = delay.as_millis(),
                    "Waiting before reconnect"
                );
                self.emit(ConsumerEvent::Backoff {
                    delay,
                    consecutive_failures: failures,
                })
                .await;

                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            let attempt = tracker.begin_attempt();
            metrics::record_reconnect_attempt();
            self.emit(ConsumerEvent::Connecting { attempt }).await;

            let opened = tokio::select! {
                () = cancel.cancelled() => break,
                opened = self.open() => opened,
            };

            let (mut stream, connect) = match opened {
                Ok(opened) => opened,
                Err(error) => {
                    tracker.attempt_failed();
                    metrics::set_consecutive_failures(tracker.consecutive_failures());
                    tracing::warn!(
                        attempt,
                        consecutive_failures = tracker.consecutive_failures(),
                        error = %error,
                        "Push stream connection failed"
                    );
                    self.emit(ConsumerEvent::AttemptFailed {
                        error,
                        consecutive_failures: tracker.consecutive_failures(),
                    })
                    .await;
                    continue;
                }
            };

            tracker.stream_opened();
            tracker.envelope_received();
            tracing::info!(attempt, "Push stream open");
            self.emit(ConsumerEvent::Connected { attempt }).await;
            self.dispatcher.dispatch(&connect).await;

            let end = self.consume(&mut stream, &mut tracker, &cancel).await;
            let error = match end {
                StreamEnd::Cancelled => break,
                StreamEnd::Closed => None,
                StreamEnd::Failed(error) => Some(error),
            };

            tracker.stream_ended();
            metrics::set_consecutive_failures(tracker.consecutive_failures());
            match &error {
                Some(e) => tracing::warn!(
                    received = tracker.received_on_stream(),
                    error = %e,
                    "Push stream failed"
                ),
                None => tracing::info!(
                    received = tracker.received_on_stream(),
                    "Push stream closed by server"
                ),
            }
            self.emit(ConsumerEvent::StreamEnded {
                received: tracker.received_on_stream(),
                error,
                consecutive_failures: tracker.consecutive_failures(),
            })
            .await;
        }

        tracing::info!(attempts = tracker.attempts(), "Push consumer stopped");
        self.emit(ConsumerEvent::Stopped).await;
    }

    /// Dial and read the first push, which must be the hub's connect push.
    async fn open(&self) -> Result<(PushStream, Envelope), ConsumerError> {
        let params = self.params.connect_params().await?;
        tracing::debug!(
            channels = params.subscriptions.len(),
            "Opening push stream"
        );
        let mut stream = self.transport.open(&params).await?;

        let first = match stream.next().await {
            None => {
                return Err(ConsumerError::Handshake(
                    "stream closed before connect push".to_string(),
                ));
            }
            Some(Err(e)) => return Err(ConsumerError::Handshake(e.to_string())),
            Some(Ok(Err(e))) => {
                return Err(ConsumerError::Handshake(format!(
                    "undecodable first push: {e}"
                )));
            }
            Some(Ok(Ok(envelope))) => envelope,
        };
        if first.kind() != PushKind::Connect {
            return Err(ConsumerError::Handshake(format!(
                "first push must be connect, got {}",
                first.kind()
            )));
        }
        Ok((stream, first))
    }

    async fn consume(
        &self,
        stream: &mut PushStream,
        tracker: &mut ConnectionTracker,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        loop {
            let item = tokio::select! {
                () = cancel.cancelled() => return StreamEnd::Cancelled,
                item = stream.next() => item,
            };

            let decoded = match item {
                None => return StreamEnd::Closed,
                Some(Err(e)) => return StreamEnd::Failed(e),
                Some(Ok(decoded)) => decoded,
            };
            tracker.envelope_received();

            let envelope = match decoded.and_then(|envelope| {
                envelope.validate(self.config.scope)?;
                Ok(envelope)
            }) {
                Ok(envelope) => envelope,
                Err(e) => {
                    metrics::record_push_decode_error(e.kind());
                    tracing::warn!(error = %e, "Dropping push envelope");
                    continue;
                }
            };

            self.dispatcher.dispatch(&envelope).await;
        }
    }

    async fn emit(&self, event: ConsumerEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }
}
