//! Hub Push Stream Client
//!
//! Adapters behind the push consumer's ports:
//!
//! - [`GrpcPushTransport`] dials the hub's `CentrifugoUniStream.Consume`
//!   endpoint over a fresh channel per attempt and decodes every push with the
//!   configured wire generation. v2 frames are decoded from their raw bytes.
//! - [`StaticConnectParams`] hands out a fixed token and channel list.
//!
//! Wire codecs live in [`codec`].

pub mod codec;

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use prost::bytes::Buf;
use tonic::codec::{Codec, DecodeBuf, Decoder};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Status};
use tonic_prost::{ProstCodec, ProstEncoder};

pub use codec::PushProtocol;

use crate::application::ports::{
    ConnectParamsProvider, ConsumerError, PushStream, PushTransport,
};
use crate::domain::connection::{ChannelSubscribe, ConnectParams, SubscriptionSet};
use crate::infrastructure::grpc::proto::{unistream_v1, unistream_v2};

// =============================================================================
// Transport
// =============================================================================

/// Settings for dialing the hub.
#[derive(Debug, Clone)]
pub struct PushTransportConfig {
    /// Hub gRPC address, e.g. `http://localhost:11000`.
    pub server_addr: String,
    /// Wire generation.
    pub protocol: PushProtocol,
    /// Dial timeout.
    pub connect_timeout: Duration,
}

impl Default for PushTransportConfig {
    fn default() -> Self {
        Self {
            server_addr: "http://localhost:11000".to_string(),
            protocol: PushProtocol::default(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// [`PushTransport`] over tonic.
#[derive(Debug, Clone)]
pub struct GrpcPushTransport {
    config: PushTransportConfig,
}

impl GrpcPushTransport {
    /// Create a transport.
    #[must_use]
    pub const fn new(config: PushTransportConfig) -> Self {
        Self { config }
    }

    fn create_endpoint(&self) -> Result<Endpoint, ConsumerError> {
        let endpoint = Channel::from_shared(self.config.server_addr.clone())
            .map_err(|e| ConsumerError::Dial(format!("invalid server address: {e}")))?
            .connect_timeout(self.config.connect_timeout)
            .tcp_nodelay(true);
        Ok(endpoint)
    }
}

#[async_trait]
impl PushTransport for GrpcPushTransport {
    async fn open(&self, params: &ConnectParams) -> Result<PushStream, ConsumerError> {
        let channel = self
            .create_endpoint()?
            .connect()
            .await
            .map_err(|e| ConsumerError::Dial(e.to_string()))?;

        tracing::debug!(
            server = %self.config.server_addr,
            protocol = %self.config.protocol,
            channels = params.subscriptions.len(),
            "Opening push stream"
        );

        let stream = match self.config.protocol {
            PushProtocol::V1 => {
                let mut client =
                    unistream_v1::centrifugo_uni_stream_client::CentrifugoUniStreamClient::new(
                        channel,
                    );
                client
                    .consume(v1_connect_request(params))
                    .await
                    .map_err(|status| ConsumerError::Handshake(status.to_string()))?
                    .into_inner()
                    .map(|item| {
                        item.map(|push| codec::v1::decode(&push))
                            .map_err(|status| ConsumerError::Stream(status.to_string()))
                    })
                    .boxed()
            }
            PushProtocol::V2 => {
                let mut grpc = tonic::client::Grpc::new(channel);
                grpc.ready()
                    .await
                    .map_err(|e| ConsumerError::Dial(format!("service not ready: {e}")))?;
                grpc.server_streaming(
                    Request::new(v2_connect_request(params)),
                    PathAndQuery::from_static(V2_CONSUME_PATH),
                    RawPushCodec,
                )
                .await
                .map_err(|status| ConsumerError::Handshake(status.to_string()))?
                .into_inner()
                .map(|item| {
                    item.map(|frame| codec::v2::decode_frame(&frame))
                        .map_err(|status| ConsumerError::Stream(status.to_string()))
                })
                .boxed()
            }
        };

        Ok(stream)
    }
}

const V2_CONSUME_PATH: &str = "/hubstream.unistream.v2.CentrifugoUniStream/Consume";

/// Encodes the v2 connect request with prost and hands every push back as
/// its undecoded frame, so unknown kinds keep their bytes.
#[derive(Debug, Clone, Copy)]
struct RawPushCodec;

impl Codec for RawPushCodec {
    type Encode = unistream_v2::ConnectRequest;
    type Decode = Vec<u8>;
    type Encoder = ProstEncoder<unistream_v2::ConnectRequest>;
    type Decoder = RawFrameDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        ProstCodec::<unistream_v2::ConnectRequest, unistream_v2::Push>::default().encoder()
    }

    fn decoder(&mut self) -> Self::Decoder {
        RawFrameDecoder
    }
}

#[derive(Debug, Clone, Copy)]
struct RawFrameDecoder;

impl Decoder for RawFrameDecoder {
    type Item = Vec<u8>;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        Ok(Some(src.copy_to_bytes(src.remaining()).to_vec()))
    }
}

macro_rules! connect_request {
    ($name:ident, $wire:ident) => {
        fn $name(params: &ConnectParams) -> $wire::ConnectRequest {
            $wire::ConnectRequest {
                token: params.token.clone(),
                data: Vec::new(),
                subs: params
                    .subscriptions
                    .iter()
                    .map(|(channel, sub): (&String, &ChannelSubscribe)| {
                        (
                            channel.clone(),
                            $wire::SubscribeRequest {
                                recover: sub.recover,
                                epoch: sub.epoch.clone(),
                                offset: sub.offset,
                            },
                        )
                    })
                    .collect(),
                name: params.name.clone(),
                version: params.version.clone(),
            }
        }
    };
}

connect_request!(v1_connect_request, unistream_v1);
connect_request!(v2_connect_request, unistream_v2);

// =============================================================================
// Connect Parameters
// =============================================================================

/// [`ConnectParamsProvider`] returning the same token and channels on every
/// attempt.
#[derive(Debug, Clone)]
pub struct StaticConnectParams {
    params: ConnectParams,
}

impl StaticConnectParams {
    /// Build from a token and channel list. Client name and version come from
    /// this crate.
    #[must_use]
    pub fn new<I, S>(token: impl Into<String>, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            params: ConnectParams {
                token: token.into(),
                subscriptions: SubscriptionSet::from_channels(channels),
                name: env!("CARGO_PKG_NAME").to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        }
    }
}

#[async_trait]
impl ConnectParamsProvider for StaticConnectParams {
    async fn connect_params(&self) -> Result<ConnectParams, ConsumerError> {
        Ok(self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_params_dedupe_channels() {
        let provider = StaticConnectParams::new("secret", ["news", "", "chat", "news"]);
        let params = provider.connect_params().await.unwrap();

        assert_eq!(params.token, "secret");
        assert_eq!(params.subscriptions.channels().collect::<Vec<_>>(), ["chat", "news"]);
        assert_eq!(params.name, "hub-stream-proxy");
    }

    #[test]
    fn connect_request_carries_subscriptions() {
        let params = ConnectParams {
            token: "t".into(),
            subscriptions: SubscriptionSet::from_channels(["a", "b"]),
            ..ConnectParams::default()
        };

        let v1 = v1_connect_request(&params);
        let v2 = v2_connect_request(&params);
        assert_eq!(v1.token, "t");
        assert_eq!(v1.subs.len(), 2);
        assert!(v2.subs.contains_key("b"));
    }

    #[tokio::test]
    async fn invalid_address_is_dial_error() {
        let transport = GrpcPushTransport::new(PushTransportConfig {
            server_addr: "not a uri".to_string(),
            ..PushTransportConfig::default()
        });
        let err = transport
            .open(&ConnectParams::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConsumerError::Dial(_)));
    }

    #[tokio::test]
    async fn unreachable_hub_is_dial_error() {
        let transport = GrpcPushTransport::new(PushTransportConfig {
            server_addr: "http://127.0.0.1:1".to_string(),
            connect_timeout: Duration::from_millis(200),
            ..PushTransportConfig::default()
        });
        let err = transport
            .open(&ConnectParams::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ConsumerError::Dial(_)));
    }
}
