//! Push Envelope Model
//!
//! An [`Envelope`] is the unit of traffic on a push stream: a channel name
//! plus exactly one payload. The payload is a closed sum type, so the kind of
//! an envelope is always derived from its payload and the two can never
//! disagree.
//!
//! Wire encodings live in `infrastructure::unistream`; this module only knows
//! about the canonical in-memory shape.

use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Kind
// =============================================================================

/// Classification of an envelope, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PushKind {
    /// Connection-level negotiation result.
    Connect,
    /// Channel-level negotiation acknowledgement.
    Subscribe,
    /// Data published into a channel.
    Publication,
    /// A client joined a channel.
    Join,
    /// A client left a channel.
    Leave,
    /// Server-initiated disconnect advice.
    Disconnect,
    /// Anything this model does not classify.
    Unknown,
}

impl PushKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Connect,
        Self::Subscribe,
        Self::Publication,
        Self::Join,
        Self::Leave,
        Self::Disconnect,
        Self::Unknown,
    ];

    /// Stable lowercase label, used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::Subscribe => "subscribe",
            Self::Publication => "publication",
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Disconnect => "disconnect",
            Self::Unknown => "unknown",
        }
    }

    /// Whether envelopes of this kind must name a channel when the stream is
    /// channel-scoped.
    #[must_use]
    pub const fn requires_channel(self) -> bool {
        matches!(self, Self::Publication | Self::Join | Self::Leave)
    }
}

impl fmt::Display for PushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payload
// =============================================================================

/// Identity of a client attached to a join, leave or publication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    /// User id the client authenticated as.
    pub user: String,
    /// Hub-assigned client id.
    pub client: String,
    /// Opaque connection metadata.
    pub conn_info: Vec<u8>,
    /// Opaque channel metadata.
    pub chan_info: Vec<u8>,
}

/// Per-channel state returned inside a connect result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPosition {
    /// Whether history recovery is available for the channel.
    pub recoverable: bool,
    /// Stream epoch.
    pub epoch: String,
    /// Stream offset at subscribe time.
    pub offset: u64,
    /// Opaque subscribe data.
    pub data: Vec<u8>,
}

/// Closed set of payloads an envelope can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Connection negotiation result.
    Connect {
        /// Hub-assigned client id.
        client: String,
        /// Hub version string.
        version: String,
        /// Opaque connect data.
        data: Vec<u8>,
        /// Channels the connection was subscribed to server-side.
        subscriptions: BTreeMap<String, ChannelPosition>,
    },
    /// Channel negotiation acknowledgement.
    Subscribe {
        /// Opaque subscribe data.
        data: Vec<u8>,
    },
    /// Published data.
    Publication {
        /// Publication body, usually JSON.
        data: Vec<u8>,
        /// Free-form tags attached by the publisher.
        tags: BTreeMap<String, String>,
        /// Offset in the channel history stream.
        offset: u64,
        /// Publisher identity when published by a client.
        info: Option<ClientInfo>,
    },
    /// A client joined the channel.
    Join {
        /// Who joined.
        info: ClientInfo,
    },
    /// A client left the channel.
    Leave {
        /// Who left.
        info: ClientInfo,
    },
    /// The hub is closing the connection.
    Disconnect {
        /// Disconnect code.
        code: u32,
        /// Human readable reason.
        reason: String,
    },
    /// An envelope the model does not classify.
    Unknown {
        /// Wire kind code, when the wire format carries one.
        code: Option<i32>,
        /// Undecoded bytes as received.
        raw: Vec<u8>,
    },
}

impl Payload {
    /// Kind of this payload.
    #[must_use]
    pub const fn kind(&self) -> PushKind {
        match self {
            Self::Connect { .. } => PushKind::Connect,
            Self::Subscribe { .. } => PushKind::Subscribe,
            Self::Publication { .. } => PushKind::Publication,
            Self::Join { .. } => PushKind::Join,
            Self::Leave { .. } => PushKind::Leave,
            Self::Disconnect { .. } => PushKind::Disconnect,
            Self::Unknown { .. } => PushKind::Unknown,
        }
    }

    /// Shorthand for a publication with no tags, offset or publisher.
    #[must_use]
    pub fn publication(data: impl Into<Vec<u8>>) -> Self {
        Self::Publication {
            data: data.into(),
            tags: BTreeMap::new(),
            offset: 0,
            info: None,
        }
    }
}

// =============================================================================
// Envelope
// =============================================================================

/// Whether a stream carries traffic for one channel or a whole connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelScope {
    /// Channel-scoped stream: channel-bound kinds must name their channel.
    Channel,
    /// Connection-scoped stream: an empty channel means "this connection".
    Connection,
}

/// A channel name plus one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Channel the envelope belongs to. May be empty for connection-level
    /// kinds.
    pub channel: String,
    /// The payload.
    pub payload: Payload,
}

impl Envelope {
    /// Create an envelope.
    #[must_use]
    pub fn new(channel: impl Into<String>, payload: Payload) -> Self {
        Self {
            channel: channel.into(),
            payload,
        }
    }

    /// Kind derived from the payload.
    #[must_use]
    pub const fn kind(&self) -> PushKind {
        self.payload.kind()
    }

    /// Whether this is a negotiation envelope (connect or subscribe).
    #[must_use]
    pub const fn is_negotiation(&self) -> bool {
        matches!(self.kind(), PushKind::Connect | PushKind::Subscribe)
    }

    /// Boundary check applied right after decoding.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::MissingChannel`] for a publication, join or
    /// leave without a channel on a channel-scoped stream.
    pub fn validate(&self, scope: ChannelScope) -> Result<(), EnvelopeError> {
        let kind = self.kind();
        if scope == ChannelScope::Channel && kind.requires_channel() && self.channel.is_empty() {
            return Err(EnvelopeError::MissingChannel { kind });
        }
        Ok(())
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Envelope decode and validation faults.
///
/// None of these end a stream: the offending envelope is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// The kind was recognized but its inner payload could not be decoded.
    #[error("malformed {kind} payload: {message}")]
    Payload {
        /// Kind announced by the wire envelope.
        kind: PushKind,
        /// Decoder message.
        message: String,
    },

    /// A channel-bound kind arrived without a channel.
    #[error("{kind} envelope has no channel")]
    MissingChannel {
        /// Kind of the rejected envelope.
        kind: PushKind,
    },
}

impl EnvelopeError {
    /// Kind of the envelope that was dropped.
    #[must_use]
    pub const fn kind(&self) -> PushKind {
        match self {
            Self::Payload { kind, .. } | Self::MissingChannel { kind } => *kind,
        }
    }
}
