//! Stream Sessions
//!
//! One [`StreamSession`] per RPC the hub opens. A session owns its id, start
//! time, cancellation token and counters; nothing is shared between
//! sessions.
//!
//! Every variant follows the same shape: read or receive the negotiation,
//! answer with exactly one acknowledgement, then stream. Cancellation is
//! checked at every suspension point and always wins over a ready frame.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use uuid::Uuid;

use super::proto::proxy::{StreamSubscribeResponse, SubscribeRequest};
use super::schema::{DuplexSchema, Frame, SubscribeSchema};
use crate::application::ports::{PublicationSource, SourceError, SourceRequest};
use crate::infrastructure::metrics;

/// Sender half of a session's outbound stream.
pub type Outbound<T> = mpsc::Sender<Result<T, Status>>;

/// How long the closing status may wait for room in a full outbound buffer.
pub const FINAL_STATUS_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Mode & Policy
// =============================================================================

/// Which RPC a session serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// `SubscribeUnidirectional`.
    Unidirectional,
    /// `SubscribeBidirectional`.
    Bidirectional,
    /// `ConnectBidirectional`.
    Connect,
}

impl SessionMode {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unidirectional => "unidirectional",
            Self::Bidirectional => "bidirectional",
            Self::Connect => "connect",
        }
    }
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a bidirectional session does with a client payload it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPayloadPolicy {
    /// End the call cleanly and send nothing more.
    #[default]
    Close,
    /// End the call with `InvalidArgument`.
    Reject,
}

impl FromStr for MalformedPayloadPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "close" => Ok(Self::Close),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown malformed payload policy: {other}")),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Why a session ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The hub cancelled the call or the server is shutting down.
    #[error("session cancelled")]
    Cancelled,

    /// The first frame was missing or was not a negotiation frame.
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    /// A later frame was not a publication.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A client payload could not be parsed and the policy is `Reject`.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The publication source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Reading the inbound stream failed.
    #[error("inbound stream error: {0}")]
    Inbound(Status),
}

impl SessionError {
    /// Metric label for the session outcome.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Negotiation(_) | Self::Protocol(_) | Self::MalformedPayload(_) => "rejected",
            Self::Source(_) | Self::Inbound(_) => "error",
        }
    }
}

impl From<SessionError> for Status {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Cancelled => Self::cancelled("session cancelled"),
            SessionError::Negotiation(msg)
            | SessionError::Protocol(msg)
            | SessionError::MalformedPayload(msg) => Self::invalid_argument(msg),
            SessionError::Source(SourceError::InvalidRequest(msg)) => Self::invalid_argument(msg),
            SessionError::Source(SourceError::Upstream(msg)) => Self::unavailable(msg),
            SessionError::Inbound(status) => status,
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// State owned by one running session.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    mode: SessionMode,
    started_at: Instant,
    cancel: CancellationToken,
    emitted: u64,
    received: u64,
}

impl StreamSession {
    /// Start a session. `cancel` fires when the hub drops the call or the
    /// server shuts down.
    #[must_use]
    pub fn start(mode: SessionMode, cancel: CancellationToken) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            mode,
            started_at: Instant::now(),
            cancel,
            emitted: 0,
            received: 0,
        };
        metrics::record_session_started(mode);
        tracing::info!(session_id = %session.id, mode = %mode, "Stream session started");
        session
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Session mode.
    #[must_use]
    pub const fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Time since the session started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Publications sent so far.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Client payloads received so far.
    #[must_use]
    pub const fn received(&self) -> u64 {
        self.received
    }

    /// Cancellation token of the session.
    #[must_use]
    pub const fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Serve `SubscribeUnidirectional`: open the source, acknowledge, then
    /// forward publications until the limit, the source ends, or
    /// cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cancelled`] on cancellation, a negotiation
    /// error for a request without channel, and the source error when the
    /// source cannot be opened or fails mid-stream.
    pub async fn run_unidirectional(
        &mut self,
        source: &dyn PublicationSource,
        request: SubscribeRequest,
        max_emissions: Option<u64>,
        tx: &Outbound<StreamSubscribeResponse>,
    ) -> Result<(), SessionError> {
        SubscribeSchema
            .validate(&request)
            .map_err(SessionError::Negotiation)?;
        tracing::info!(
            session_id = %self.id,
            channel = %request.channel,
            user = %request.user,
            client = %request.client,
            source = source.name(),
            "Subscribe request"
        );

        let ack = SubscribeSchema.ack(&request);
        let source_request = SourceRequest {
            channel: request.channel,
            user: request.user,
            client: request.client,
            data: request.data,
        };
        let mut feed = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(SessionError::Cancelled),
            feed = source.open(&source_request) => feed?,
        };

        self.send(tx, ack).await?;

        loop {
            if max_emissions.is_some_and(|limit| self.emitted >= limit) {
                tracing::debug!(session_id = %self.id, emitted = self.emitted, "Emission limit reached");
                return Ok(());
            }

            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(SessionError::Cancelled),
                next = feed.next() => next,
            };

            match next {
                None => return Ok(()),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(data)) => {
                    self.send(tx, SubscribeSchema.reply(data)).await?;
                    self.emitted += 1;
                    metrics::record_publication_sent(self.mode);
                }
            }
        }
    }

    /// Serve a bidirectional call: the first inbound frame must be the
    /// negotiation, every later frame a publication whose `input` is echoed
    /// back.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cancelled`] on cancellation, a negotiation
    /// error when the first frame is missing or wrong, a protocol error for
    /// a later non-publication frame, the inbound status on read failure, and
    /// [`SessionError::MalformedPayload`] under [`MalformedPayloadPolicy::Reject`].
    pub async fn run_duplex<S, I>(
        &mut self,
        schema: &S,
        mut inbound: I,
        policy: MalformedPayloadPolicy,
        tx: &Outbound<S::Outbound>,
    ) -> Result<(), SessionError>
    where
        S: DuplexSchema,
        I: Stream<Item = Result<S::Inbound, Status>> + Unpin,
    {
        let negotiation = match self.next_frame(&mut inbound).await? {
            None => {
                return Err(SessionError::Negotiation(
                    "stream closed before negotiation".to_string(),
                ));
            }
            Some(frame) => match schema.classify(frame) {
                Frame::Negotiation(negotiation) => negotiation,
                Frame::Payload(_) | Frame::Empty => {
                    return Err(SessionError::Negotiation(format!(
                        "first frame must be a {}",
                        schema.negotiation_name()
                    )));
                }
            },
        };
        schema.validate(&negotiation).map_err(SessionError::Negotiation)?;
        tracing::info!(
            session_id = %self.id,
            negotiation = %schema.describe(&negotiation),
            "Negotiation received"
        );

        self.send(tx, schema.ack(&negotiation)).await?;

        loop {
            let Some(frame) = self.next_frame(&mut inbound).await? else {
                tracing::debug!(session_id = %self.id, "Hub closed the inbound stream");
                return Ok(());
            };

            let data = match schema.classify(frame) {
                Frame::Payload(data) => data,
                Frame::Negotiation(_) => {
                    return Err(SessionError::Protocol(format!(
                        "unexpected {} after negotiation",
                        schema.negotiation_name()
                    )));
                }
                Frame::Empty => {
                    return Err(SessionError::Protocol("empty frame".to_string()));
                }
            };
            self.received += 1;
            metrics::record_publication_received(self.mode);

            match echo(&data) {
                Ok(reply) => {
                    self.send(tx, schema.reply(reply)).await?;
                    self.emitted += 1;
                    metrics::record_publication_sent(self.mode);
                }
                Err(e) => {
                    metrics::record_malformed_payload(self.mode);
                    tracing::warn!(
                        session_id = %self.id,
                        message = self.received,
                        error = %e,
                        policy = ?policy,
                        "Malformed client payload"
                    );
                    return match policy {
                        MalformedPayloadPolicy::Close => Ok(()),
                        MalformedPayloadPolicy::Reject => Err(SessionError::MalformedPayload(
                            format!("message {}: {e}", self.received),
                        )),
                    };
                }
            }
        }
    }

    /// Log and record the outcome, report an error status to the hub, and
    /// release the session's cancellation token.
    pub async fn finish<T>(self, result: Result<(), SessionError>, tx: &Outbound<T>) {
        let elapsed = self.elapsed();
        let outcome = match &result {
            Ok(()) => "completed",
            Err(e) => e.outcome(),
        };
        metrics::record_session_finished(self.mode, outcome, elapsed);

        match result {
            Ok(()) => tracing::info!(
                session_id = %self.id,
                mode = %self.mode,
                emitted = self.emitted,
                received = self.received,
                elapsed_ms = elapsed.as_millis(),
                "Stream session finished"
            ),
            Err(e) => {
                tracing::info!(
                    session_id = %self.id,
                    mode = %self.mode,
                    emitted = self.emitted,
                    received = self.received,
                    elapsed_ms = elapsed.as_millis(),
                    error = %e,
                    "Stream session ended with error"
                );
                if tokio::time::timeout(FINAL_STATUS_TIMEOUT, tx.send(Err(e.into())))
                    .await
                    .is_err()
                {
                    tracing::warn!(
                        session_id = %self.id,
                        "Hub not reading, dropping closing status"
                    );
                }
            }
        }
        self.cancel.cancel();
    }

    async fn next_frame<I, T>(&self, inbound: &mut I) -> Result<Option<T>, SessionError>
    where
        I: Stream<Item = Result<T, Status>> + Unpin,
    {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SessionError::Cancelled),
            frame = inbound.next() => frame.transpose().map_err(SessionError::Inbound),
        }
    }

    async fn send<T>(&self, tx: &Outbound<T>, message: T) -> Result<(), SessionError> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(SessionError::Cancelled),
            sent = tx.send(Ok(message)) => sent.map_err(|_| SessionError::Cancelled),
        }
    }
}

// =============================================================================
// Echo
// =============================================================================

#[derive(Deserialize)]
struct ClientData {
    #[serde(default)]
    input: String,
}

/// Echo transform: `{"input": x}` in, `{"input": x}` out. Arrays and other
/// non-object JSON are malformed.
fn echo(data: &[u8]) -> Result<Vec<u8>, serde_json::Error> {
    let object: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(data)?;
    let parsed: ClientData = serde_json::from_value(serde_json::Value::Object(object))?;
    serde_json::to_vec(&serde_json::json!({ "input": parsed.input }))
}
