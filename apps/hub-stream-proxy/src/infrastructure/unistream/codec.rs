//! Push wire codecs.
//!
//! Two wire generations map onto the same [`Envelope`] model:
//!
//! - **v1**: `Push { type, channel, data }` where `data` is the encoded
//!   inner message selected by `type`.
//! - **v2**: `Push { channel, oneof kind }` with one field per kind.
//!
//! Kinds the envelope model does not classify (unsubscribe, message,
//! refresh, or anything newer) decode to [`Payload::Unknown`] and are
//! encoded back to the same wire shape.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use prost::Message;

use crate::domain::envelope::{
    ChannelPosition, ClientInfo, Envelope, EnvelopeError, Payload, PushKind,
};
use crate::infrastructure::grpc::proto::{unistream_v1, unistream_v2};

/// Wire generation spoken with the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushProtocol {
    /// Typed push with an inner encoded message.
    V1,
    /// Push with one oneof field per kind.
    #[default]
    V2,
}

impl PushProtocol {
    /// Label used in config and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

impl fmt::Display for PushProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PushProtocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            other => Err(format!("unknown push protocol: {other}")),
        }
    }
}

// =============================================================================
// Shared Conversions
// =============================================================================

macro_rules! client_info_conversions {
    ($wire:path) => {
        impl From<$wire> for ClientInfo {
            fn from(info: $wire) -> Self {
                Self {
                    user: info.user,
                    client: info.client,
                    conn_info: info.conn_info,
                    chan_info: info.chan_info,
                }
            }
        }

        impl From<ClientInfo> for $wire {
            fn from(info: ClientInfo) -> Self {
                Self {
                    user: info.user,
                    client: info.client,
                    conn_info: info.conn_info,
                    chan_info: info.chan_info,
                }
            }
        }
    };
}

client_info_conversions!(unistream_v1::ClientInfo);
client_info_conversions!(unistream_v2::ClientInfo);

fn sorted_tags(tags: HashMap<String, String>) -> BTreeMap<String, String> {
    tags.into_iter().collect()
}

fn hashed_tags(tags: &BTreeMap<String, String>) -> HashMap<String, String> {
    tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

// =============================================================================
// V1
// =============================================================================

/// Typed-push codec.
pub mod v1 {
    use super::*;
    use crate::infrastructure::grpc::proto::unistream_v1::push::PushType;
    use crate::infrastructure::grpc::proto::unistream_v1::{
        Connect, Disconnect, Join, Leave, Publication, Push, Subscribe, SubscribeResult,
    };

    fn inner<M: Message + Default>(kind: PushKind, data: &[u8]) -> Result<M, EnvelopeError> {
        M::decode(data).map_err(|e| EnvelopeError::Payload {
            kind,
            message: e.to_string(),
        })
    }

    /// Decode a typed push.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Payload`] when `data` is not a valid message
    /// of the announced type.
    pub fn decode(push: &Push) -> Result<Envelope, EnvelopeError> {
        let Ok(push_type) = PushType::try_from(push.r#type) else {
            return Ok(unknown(push));
        };

        let payload = match push_type {
            PushType::Publication => {
                let p: Publication = inner(PushKind::Publication, &push.data)?;
                Payload::Publication {
                    data: p.data,
                    tags: sorted_tags(p.tags),
                    offset: p.offset,
                    info: p.info.map(ClientInfo::from),
                }
            }
            PushType::Join => {
                let j: Join = inner(PushKind::Join, &push.data)?;
                Payload::Join {
                    info: j.info.map(ClientInfo::from).unwrap_or_default(),
                }
            }
            PushType::Leave => {
                let l: Leave = inner(PushKind::Leave, &push.data)?;
                Payload::Leave {
                    info: l.info.map(ClientInfo::from).unwrap_or_default(),
                }
            }
            PushType::Subscribe => {
                let s: Subscribe = inner(PushKind::Subscribe, &push.data)?;
                Payload::Subscribe { data: s.data }
            }
            PushType::Connect => {
                let c: Connect = inner(PushKind::Connect, &push.data)?;
                Payload::Connect {
                    client: c.client,
                    version: c.version,
                    data: c.data,
                    subscriptions: c
                        .subs
                        .into_iter()
                        .map(|(channel, result)| (channel, position(result)))
                        .collect(),
                }
            }
            PushType::Disconnect => {
                let d: Disconnect = inner(PushKind::Disconnect, &push.data)?;
                Payload::Disconnect {
                    code: d.code,
                    reason: d.reason,
                }
            }
            PushType::Unsubscribe | PushType::Message | PushType::Refresh => {
                return Ok(unknown(push));
            }
        };

        Ok(Envelope::new(push.channel.clone(), payload))
    }

    /// Encode an envelope as a typed push. `Unknown` without a wire code is
    /// written with type `-1`.
    #[must_use]
    pub fn encode(envelope: &Envelope) -> Push {
        let (push_type, data) = match &envelope.payload {
            Payload::Publication {
                data,
                tags,
                offset,
                info,
            } => (
                PushType::Publication as i32,
                Publication {
                    data: data.clone(),
                    info: info.clone().map(Into::into),
                    offset: *offset,
                    tags: hashed_tags(tags),
                }
                .encode_to_vec(),
            ),
            Payload::Join { info } => (
                PushType::Join as i32,
                Join {
                    info: Some(info.clone().into()),
                }
                .encode_to_vec(),
            ),
            Payload::Leave { info } => (
                PushType::Leave as i32,
                Leave {
                    info: Some(info.clone().into()),
                }
                .encode_to_vec(),
            ),
            Payload::Subscribe { data } => (
                PushType::Subscribe as i32,
                Subscribe {
                    data: data.clone(),
                    ..Subscribe::default()
                }
                .encode_to_vec(),
            ),
            Payload::Connect {
                client,
                version,
                data,
                subscriptions,
            } => (
                PushType::Connect as i32,
                Connect {
                    client: client.clone(),
                    version: version.clone(),
                    data: data.clone(),
                    subs: subscriptions
                        .iter()
                        .map(|(channel, p)| (channel.clone(), subscribe_result(p)))
                        .collect(),
                    ..Connect::default()
                }
                .encode_to_vec(),
            ),
            Payload::Disconnect { code, reason } => (
                PushType::Disconnect as i32,
                Disconnect {
                    code: *code,
                    reason: reason.clone(),
                }
                .encode_to_vec(),
            ),
            Payload::Unknown { code, raw } => (code.unwrap_or(-1), raw.clone()),
        };

        Push {
            r#type: push_type,
            channel: envelope.channel.clone(),
            data,
        }
    }

    fn unknown(push: &Push) -> Envelope {
        Envelope::new(
            push.channel.clone(),
            Payload::Unknown {
                code: Some(push.r#type),
                raw: push.data.clone(),
            },
        )
    }

    fn position(result: SubscribeResult) -> ChannelPosition {
        ChannelPosition {
            recoverable: result.recoverable,
            epoch: result.epoch,
            offset: result.offset,
            data: result.data,
        }
    }

    fn subscribe_result(position: &ChannelPosition) -> SubscribeResult {
        SubscribeResult {
            recoverable: position.recoverable,
            epoch: position.epoch.clone(),
            offset: position.offset,
            data: position.data.clone(),
            ..SubscribeResult::default()
        }
    }
}

// =============================================================================
// V2
// =============================================================================

/// Field-per-kind codec.
pub mod v2 {
    use super::*;
    use crate::infrastructure::grpc::proto::unistream_v2::push::Kind;
    use crate::infrastructure::grpc::proto::unistream_v2::{
        Connect, Disconnect, Join, Leave, Message as WireMessage, Publication, Push, Refresh,
        Subscribe, SubscribeResult, Unsubscribe,
    };

    /// Oneof field numbers of the kinds without an envelope payload.
    const UNSUBSCRIBE_FIELD: i32 = 7;
    const MESSAGE_FIELD: i32 = 8;
    const REFRESH_FIELD: i32 = 12;

    /// Decode a push straight from its wire bytes.
    ///
    /// prost drops oneof fields it does not know, so a push whose kind is
    /// newer than this build keeps the whole frame as the `Unknown` payload.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Payload`] when the frame is not a `Push`.
    pub fn decode_frame(frame: &[u8]) -> Result<Envelope, EnvelopeError> {
        let push = Push::decode(frame).map_err(|e| EnvelopeError::Payload {
            kind: PushKind::Unknown,
            message: e.to_string(),
        })?;
        if push.kind.is_none() {
            return Ok(Envelope::new(
                push.channel,
                Payload::Unknown {
                    code: None,
                    raw: frame.to_vec(),
                },
            ));
        }
        decode(&push)
    }

    /// Decode an already parsed field-per-kind push. Never fails: every set
    /// field is well formed.
    ///
    /// # Errors
    ///
    /// Infallible today; the signature matches [`super::v1::decode`].
    #[allow(clippy::unnecessary_wraps)]
    pub fn decode(push: &Push) -> Result<Envelope, EnvelopeError> {
        let channel = push.channel.clone();
        let payload = match &push.kind {
            Some(Kind::Pub(p)) => Payload::Publication {
                data: p.data.clone(),
                tags: sorted_tags(p.tags.clone()),
                offset: p.offset,
                info: p.info.clone().map(ClientInfo::from),
            },
            Some(Kind::Join(j)) => Payload::Join {
                info: j.info.clone().map(ClientInfo::from).unwrap_or_default(),
            },
            Some(Kind::Leave(l)) => Payload::Leave {
                info: l.info.clone().map(ClientInfo::from).unwrap_or_default(),
            },
            Some(Kind::Subscribe(s)) => Payload::Subscribe {
                data: s.data.clone(),
            },
            Some(Kind::Connect(c)) => Payload::Connect {
                client: c.client.clone(),
                version: c.version.clone(),
                data: c.data.clone(),
                subscriptions: c
                    .subs
                    .iter()
                    .map(|(channel, result)| (channel.clone(), position(result)))
                    .collect(),
            },
            Some(Kind::Disconnect(d)) => Payload::Disconnect {
                code: d.code,
                reason: d.reason.clone(),
            },
            Some(Kind::Unsubscribe(u)) => Payload::Unknown {
                code: Some(UNSUBSCRIBE_FIELD),
                raw: u.encode_to_vec(),
            },
            Some(Kind::Message(m)) => Payload::Unknown {
                code: Some(MESSAGE_FIELD),
                raw: m.encode_to_vec(),
            },
            Some(Kind::Refresh(r)) => Payload::Unknown {
                code: Some(REFRESH_FIELD),
                raw: r.encode_to_vec(),
            },
            None => Payload::Unknown {
                code: None,
                raw: push.encode_to_vec(),
            },
        };

        Ok(Envelope::new(channel, payload))
    }

    /// Encode an envelope as a field-per-kind push.
    #[must_use]
    pub fn encode(envelope: &Envelope) -> Push {
        let kind = match &envelope.payload {
            Payload::Publication {
                data,
                tags,
                offset,
                info,
            } => Some(Kind::Pub(Publication {
                data: data.clone(),
                info: info.clone().map(Into::into),
                offset: *offset,
                tags: hashed_tags(tags),
            })),
            Payload::Join { info } => Some(Kind::Join(Join {
                info: Some(info.clone().into()),
            })),
            Payload::Leave { info } => Some(Kind::Leave(Leave {
                info: Some(info.clone().into()),
            })),
            Payload::Subscribe { data } => Some(Kind::Subscribe(Subscribe {
                data: data.clone(),
                ..Subscribe::default()
            })),
            Payload::Connect {
                client,
                version,
                data,
                subscriptions,
            } => Some(Kind::Connect(Connect {
                client: client.clone(),
                version: version.clone(),
                data: data.clone(),
                subs: subscriptions
                    .iter()
                    .map(|(channel, p)| (channel.clone(), subscribe_result(p)))
                    .collect(),
                ..Connect::default()
            })),
            Payload::Disconnect { code, reason } => Some(Kind::Disconnect(Disconnect {
                code: *code,
                reason: reason.clone(),
            })),
            Payload::Unknown { code, raw } => unknown_kind(*code, raw),
        };

        Push {
            channel: envelope.channel.clone(),
            kind,
        }
    }

    fn unknown_kind(code: Option<i32>, raw: &[u8]) -> Option<Kind> {
        match code? {
            UNSUBSCRIBE_FIELD => Unsubscribe::decode(raw).ok().map(Kind::Unsubscribe),
            MESSAGE_FIELD => WireMessage::decode(raw).ok().map(Kind::Message),
            REFRESH_FIELD => Refresh::decode(raw).ok().map(Kind::Refresh),
            _ => None,
        }
    }

    fn position(result: &SubscribeResult) -> ChannelPosition {
        ChannelPosition {
            recoverable: result.recoverable,
            epoch: result.epoch.clone(),
            offset: result.offset,
            data: result.data.clone(),
        }
    }

    fn subscribe_result(position: &ChannelPosition) -> SubscribeResult {
        SubscribeResult {
            recoverable: position.recoverable,
            epoch: position.epoch.clone(),
            offset: position.offset,
            data: position.data.clone(),
            ..SubscribeResult::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    fn info() -> ClientInfo {
        ClientInfo {
            user: "42".into(),
            client: "c-1".into(),
            conn_info: b"{\"name\":\"a\"}".to_vec(),
            chan_info: vec![],
        }
    }

    fn sample(kind: PushKind) -> Envelope {
        let payload = match kind {
            PushKind::Connect => Payload::Connect {
                client: "c-1".into(),
                version: "6.1.0".into(),
                data: b"{}".to_vec(),
                subscriptions: BTreeMap::from([(
                    "news".to_string(),
                    ChannelPosition {
                        recoverable: true,
                        epoch: "xyz".into(),
                        offset: 7,
                        data: vec![],
                    },
                )]),
            },
            PushKind::Subscribe => Payload::Subscribe {
                data: b"{\"ok\":true}".to_vec(),
            },
            PushKind::Publication => Payload::Publication {
                data: b"{\"input\":\"1\"}".to_vec(),
                tags: BTreeMap::from([("k".to_string(), "v".to_string())]),
                offset: 12,
                info: Some(info()),
            },
            PushKind::Join => Payload::Join { info: info() },
            PushKind::Leave => Payload::Leave { info: info() },
            PushKind::Disconnect => Payload::Disconnect {
                code: 3001,
                reason: "shutdown".into(),
            },
            PushKind::Unknown => Payload::Unknown {
                code: Some(8),
                raw: vec![],
            },
        };
        let channel = if matches!(kind, PushKind::Connect | PushKind::Disconnect) {
            ""
        } else {
            "news"
        };
        Envelope::new(channel, payload)
    }

    #[test_case(PushKind::Connect ; "connect")]
    #[test_case(PushKind::Subscribe ; "subscribe")]
    #[test_case(PushKind::Publication ; "publication")]
    #[test_case(PushKind::Join ; "join")]
    #[test_case(PushKind::Leave ; "leave")]
    #[test_case(PushKind::Disconnect ; "disconnect")]
    fn v1_preserves_known_kinds(kind: PushKind) {
        let envelope = sample(kind);
        assert_eq!(v1::decode(&v1::encode(&envelope)).unwrap(), envelope);
    }

    #[test_case(PushKind::Connect ; "connect")]
    #[test_case(PushKind::Subscribe ; "subscribe")]
    #[test_case(PushKind::Publication ; "publication")]
    #[test_case(PushKind::Join ; "join")]
    #[test_case(PushKind::Leave ; "leave")]
    #[test_case(PushKind::Disconnect ; "disconnect")]
    fn v2_preserves_known_kinds(kind: PushKind) {
        let envelope = sample(kind);
        assert_eq!(v2::decode(&v2::encode(&envelope)).unwrap(), envelope);
    }

    #[test]
    fn v1_unclassified_types_are_unknown() {
        for code in [3, 4, 8, 99] {
            let push = unistream_v1::Push {
                r#type: code,
                channel: "news".into(),
                data: vec![0x0a, 0x01, 0x41],
            };
            let envelope = v1::decode(&push).unwrap();
            assert_eq!(
                envelope.payload,
                Payload::Unknown {
                    code: Some(code),
                    raw: push.data.clone()
                }
            );
            assert_eq!(v1::encode(&envelope), push);
        }
    }

    #[test]
    fn v1_bad_inner_bytes_is_payload_fault() {
        let push = unistream_v1::Push {
            r#type: unistream_v1::push::PushType::Join as i32,
            channel: "news".into(),
            data: vec![0x0a, 0xff],
        };
        let err = v1::decode(&push).unwrap_err();
        assert_eq!(err.kind(), PushKind::Join);
    }

    #[test]
    fn v2_empty_push_is_unknown() {
        let push = unistream_v2::Push {
            channel: "news".into(),
            kind: None,
        };
        let envelope = v2::decode(&push).unwrap();
        assert_eq!(envelope.kind(), PushKind::Unknown);
        assert_eq!(v2::decode(&v2::encode(&envelope)).unwrap(), envelope);
    }

    #[test]
    fn v2_frame_with_newer_kind_keeps_its_bytes() {
        let mut frame = unistream_v2::Push {
            channel: "chat".into(),
            kind: None,
        }
        .encode_to_vec();
        // field 20, length delimited
        frame.extend_from_slice(&[0xA2, 0x01, 5]);
        frame.extend_from_slice(b"hello");

        let envelope = v2::decode_frame(&frame).unwrap();
        assert_eq!(envelope.channel, "chat");
        assert_eq!(
            envelope.payload,
            Payload::Unknown {
                code: None,
                raw: frame.clone(),
            }
        );
    }

    #[test]
    fn v2_frame_with_known_kind_matches_decode() {
        let push = v2::encode(&sample(PushKind::Publication));
        let frame = push.encode_to_vec();
        assert_eq!(v2::decode_frame(&frame).unwrap(), v2::decode(&push).unwrap());
    }

    #[test]
    fn v2_garbage_frame_is_payload_fault() {
        let err = v2::decode_frame(&[0xFF, 0xFF, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), PushKind::Unknown);
    }

    #[test]
    fn v2_unclassified_fields_survive() {
        let push = unistream_v2::Push {
            channel: "news".into(),
            kind: Some(unistream_v2::push::Kind::Refresh(unistream_v2::Refresh {
                expires: true,
                ttl: 30,
            })),
        };
        let envelope = v2::decode(&push).unwrap();
        assert!(matches!(envelope.payload, Payload::Unknown { code: Some(12), .. }));
        assert_eq!(v2::encode(&envelope), push);
    }

    #[test]
    fn protocol_parses() {
        assert_eq!("v1".parse(), Ok(PushProtocol::V1));
        assert_eq!("V2".parse(), Ok(PushProtocol::V2));
        assert!("v3".parse::<PushProtocol>().is_err());
    }

    fn arb_info() -> impl Strategy<Value = ClientInfo> {
        ("[a-z0-9]{0,8}", "[a-z0-9]{0,8}", prop::collection::vec(any::<u8>(), 0..8)).prop_map(
            |(user, client, conn_info)| ClientInfo {
                user,
                client,
                conn_info,
                chan_info: vec![],
            },
        )
    }

    fn arb_positions() -> impl Strategy<Value = BTreeMap<String, ChannelPosition>> {
        let position = (any::<bool>(), "[a-z]{0,4}", any::<u64>()).prop_map(
            |(recoverable, epoch, offset)| ChannelPosition {
                recoverable,
                epoch,
                offset,
                data: vec![],
            },
        );
        prop::collection::btree_map("[a-z]{1,6}", position, 0..3)
    }

    fn arb_payload() -> impl Strategy<Value = Payload> {
        prop_oneof![
            (
                prop::collection::vec(any::<u8>(), 0..32),
                prop::collection::btree_map("[a-z]{1,4}", "[a-z]{0,4}", 0..3),
                any::<u64>(),
                prop::option::of(arb_info()),
            )
                .prop_map(|(data, tags, offset, info)| Payload::Publication {
                    data,
                    tags,
                    offset,
                    info
                }),
            arb_info().prop_map(|info| Payload::Join { info }),
            arb_info().prop_map(|info| Payload::Leave { info }),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(|data| Payload::Subscribe { data }),
            (any::<u32>(), "[a-z ]{0,12}")
                .prop_map(|(code, reason)| Payload::Disconnect { code, reason }),
            ("[a-z0-9-]{0,8}", "[0-9.]{0,6}", arb_positions())
                .prop_map(|(client, version, subscriptions)| Payload::Connect {
                    client,
                    version,
                    data: vec![],
                    subscriptions,
                }),
        ]
    }

    proptest! {
        #[test]
        fn decode_is_idempotent_v1(channel in "[a-z]{0,6}", payload in arb_payload()) {
            let first = v1::decode(&v1::encode(&Envelope::new(channel, payload))).unwrap();
            let second = v1::decode(&v1::encode(&first)).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn decode_is_idempotent_v2(channel in "[a-z]{0,6}", payload in arb_payload()) {
            let first = v2::decode(&v2::encode(&Envelope::new(channel, payload))).unwrap();
            let second = v2::decode(&v2::encode(&first)).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn versions_agree(channel in "[a-z]{0,6}", payload in arb_payload()) {
            let envelope = Envelope::new(channel, payload);
            prop_assert_eq!(
                v1::decode(&v1::encode(&envelope)).unwrap(),
                v2::decode(&v2::encode(&envelope)).unwrap()
            );
        }
    }
}
