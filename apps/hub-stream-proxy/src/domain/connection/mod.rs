//! Consumer Connection State
//!
//! The reconnect loop owns exactly one [`ConnectionTracker`]. It records the
//! current [`ConnectionState`] and the consecutive-failure count the backoff
//! policy is fed with.
//!
//! # Failure accounting
//!
//! - dial, handshake or inventory failure: `+1`
//! - any envelope received: reset to `0`
//! - stream end (clean or error) after at least one envelope: unchanged,
//!   so the next attempt starts without waiting
//! - stream end before any envelope: `+1`

use std::collections::BTreeMap;
use std::fmt;

/// Where the consumer is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No stream open; waiting out backoff or about to dial.
    #[default]
    Disconnected,
    /// Dialing and sending the connect request.
    Connecting,
    /// Stream open, reading envelopes.
    Streaming,
}

impl ConnectionState {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State plus failure bookkeeping for one consumer.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: ConnectionState,
    consecutive_failures: u32,
    received_on_stream: u64,
    attempts: u64,
}

impl ConnectionTracker {
    /// Fresh tracker: disconnected, no failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Failures since the last received envelope.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Envelopes received on the current (or last) stream.
    #[must_use]
    pub const fn received_on_stream(&self) -> u64 {
        self.received_on_stream
    }

    /// Connection attempts started so far.
    #[must_use]
    pub const fn attempts(&self) -> u64 {
        self.attempts
    }

    /// `Disconnected -> Connecting`. Returns the 1-based attempt number.
    pub const fn begin_attempt(&mut self) -> u64 {
        self.state = ConnectionState::Connecting;
        self.received_on_stream = 0;
        self.attempts += 1;
        self.attempts
    }

    /// `Connecting -> Streaming`.
    pub const fn stream_opened(&mut self) {
        self.state = ConnectionState::Streaming;
    }

    /// `Connecting -> Disconnected` after a dial, handshake or inventory
    /// failure.
    pub const fn attempt_failed(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// An envelope arrived: the stream is healthy again.
    pub const fn envelope_received(&mut self) {
        self.consecutive_failures = 0;
        self.received_on_stream += 1;
    }

    /// `Streaming -> Disconnected` on read error or remote close.
    pub const fn stream_ended(&mut self) {
        self.state = ConnectionState::Disconnected;
        if self.received_on_stream == 0 {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
    }
}

// =============================================================================
// Connect Parameters
// =============================================================================

/// Negotiation placeholder sent for each channel in a [`SubscriptionSet`].
///
/// Always the default value: the consumer never asks for history recovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelSubscribe {
    /// Ask the hub to recover missed publications.
    pub recover: bool,
    /// Epoch to recover from.
    pub epoch: String,
    /// Offset to recover from.
    pub offset: u64,
}

/// Channels the consumer subscribes to at connect time.
///
/// Built from the channel inventory before every attempt and never changed
/// while a stream is open.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet(BTreeMap<String, ChannelSubscribe>);

impl SubscriptionSet {
    /// One placeholder per distinct, non-empty channel name.
    pub fn from_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            channels
                .into_iter()
                .map(Into::into)
                .filter(|channel: &String| !channel.is_empty())
                .map(|channel| (channel, ChannelSubscribe::default()))
                .collect(),
        )
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no channel is requested.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Channel names in order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Entries in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChannelSubscribe)> {
        self.0.iter()
    }
}

/// Everything sent in the connect request that opens a push stream.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    /// Opaque connection token. Never logged.
    pub token: String,
    /// Channels to subscribe to server-side.
    pub subscriptions: SubscriptionSet,
    /// Client name advertised to the hub.
    pub name: String,
    /// Client version advertised to the hub.
    pub version: String,
}

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("token", &"[REDACTED]")
            .field("subscriptions", &self.subscriptions)
            .field("name", &self.name)
            .field("version", &self.version)
            .finish()
    }
}
