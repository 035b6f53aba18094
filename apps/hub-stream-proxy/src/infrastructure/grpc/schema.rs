//! Duplex frame schemas.
//!
//! The two bidirectional RPCs share one handshake-then-stream core and differ
//! only in their frame types. A [`DuplexSchema`] tells the core how to pull
//! the negotiation and payloads out of inbound frames and how to build the
//! outbound acknowledgement and replies.

use super::proto::proxy::{
    ConnectRequest, ConnectResponse, ConnectResult, Message, Publication, StreamConnectRequest,
    StreamConnectResponse, StreamSubscribeRequest, StreamSubscribeResponse, SubscribeRequest,
    SubscribeResponse, stream_connect_request, stream_connect_response, stream_subscribe_request,
    stream_subscribe_response,
};
use super::session::SessionMode;

/// Inbound frame after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<N> {
    /// The negotiation request.
    Negotiation(N),
    /// A client payload.
    Payload(Vec<u8>),
    /// A frame with no variant set.
    Empty,
}

/// Frame types of one bidirectional RPC.
pub trait DuplexSchema: Send + Sync + 'static {
    /// Frames read from the hub.
    type Inbound: Send + 'static;
    /// Frames written to the hub.
    type Outbound: Send + 'static;
    /// The negotiation request carried by the first inbound frame.
    type Negotiation: Send;

    /// Mode label for sessions using this schema.
    const MODE: SessionMode;

    /// Split an inbound frame into negotiation, payload or nothing.
    fn classify(&self, frame: Self::Inbound) -> Frame<Self::Negotiation>;

    /// Human readable name of the negotiation frame.
    fn negotiation_name(&self) -> &'static str;

    /// Reject a negotiation the session cannot serve.
    ///
    /// # Errors
    ///
    /// Returns a message describing the missing field.
    fn validate(&self, _negotiation: &Self::Negotiation) -> Result<(), String> {
        Ok(())
    }

    /// Short log description of the negotiation.
    fn describe(&self, negotiation: &Self::Negotiation) -> String;

    /// The single acknowledgement frame.
    fn ack(&self, negotiation: &Self::Negotiation) -> Self::Outbound;

    /// Wrap a reply payload.
    fn reply(&self, data: Vec<u8>) -> Self::Outbound;
}

// =============================================================================
// SubscribeBidirectional
// =============================================================================

/// Channel-scoped frames of `SubscribeBidirectional`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeSchema;

impl DuplexSchema for SubscribeSchema {
    type Inbound = StreamSubscribeRequest;
    type Outbound = StreamSubscribeResponse;
    type Negotiation = SubscribeRequest;

    const MODE: SessionMode = SessionMode::Bidirectional;

    fn classify(&self, frame: StreamSubscribeRequest) -> Frame<SubscribeRequest> {
        match frame.frame {
            Some(stream_subscribe_request::Frame::SubscribeRequest(request)) => {
                Frame::Negotiation(request)
            }
            Some(stream_subscribe_request::Frame::Publication(publication)) => {
                Frame::Payload(publication.data)
            }
            None => Frame::Empty,
        }
    }

    fn negotiation_name(&self) -> &'static str {
        "subscribe request"
    }

    fn validate(&self, negotiation: &SubscribeRequest) -> Result<(), String> {
        if negotiation.channel.is_empty() {
            return Err("subscribe request has no channel".to_string());
        }
        Ok(())
    }

    fn describe(&self, negotiation: &SubscribeRequest) -> String {
        format!(
            "channel={} user={} client={}",
            negotiation.channel, negotiation.user, negotiation.client
        )
    }

    fn ack(&self, _negotiation: &SubscribeRequest) -> StreamSubscribeResponse {
        StreamSubscribeResponse {
            frame: Some(stream_subscribe_response::Frame::SubscribeResponse(
                SubscribeResponse {},
            )),
        }
    }

    fn reply(&self, data: Vec<u8>) -> StreamSubscribeResponse {
        StreamSubscribeResponse {
            frame: Some(stream_subscribe_response::Frame::Publication(Publication {
                data,
                tags: std::collections::HashMap::new(),
            })),
        }
    }
}

// =============================================================================
// ConnectBidirectional
// =============================================================================

/// Connection-scoped frames of `ConnectBidirectional`.
#[derive(Debug, Clone)]
pub struct ConnectSchema {
    user: String,
}

impl ConnectSchema {
    /// Acknowledge every connection as `user`.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self { user: user.into() }
    }
}

impl DuplexSchema for ConnectSchema {
    type Inbound = StreamConnectRequest;
    type Outbound = StreamConnectResponse;
    type Negotiation = ConnectRequest;

    const MODE: SessionMode = SessionMode::Connect;

    fn classify(&self, frame: StreamConnectRequest) -> Frame<ConnectRequest> {
        match frame.frame {
            Some(stream_connect_request::Frame::ConnectRequest(request)) => {
                Frame::Negotiation(request)
            }
            Some(stream_connect_request::Frame::Message(message)) => Frame::Payload(message.data),
            None => Frame::Empty,
        }
    }

    fn negotiation_name(&self) -> &'static str {
        "connect request"
    }

    fn describe(&self, negotiation: &ConnectRequest) -> String {
        format!(
            "client={} name={} version={} transport={}",
            negotiation.client, negotiation.name, negotiation.version, negotiation.transport
        )
    }

    fn ack(&self, _negotiation: &ConnectRequest) -> StreamConnectResponse {
        StreamConnectResponse {
            frame: Some(stream_connect_response::Frame::ConnectResponse(
                ConnectResponse {
                    result: Some(ConnectResult {
                        user: self.user.clone(),
                    }),
                },
            )),
        }
    }

    fn reply(&self, data: Vec<u8>) -> StreamConnectResponse {
        StreamConnectResponse {
            frame: Some(stream_connect_response::Frame::Message(Message { data })),
        }
    }
}
