//! Push Consumer Integration Tests
//!
//! A fake hub serves `CentrifugoUniStream.Consume` on a loopback port. Each
//! call sends a connect push, replays a fixed batch of pushes and then ends
//! the stream, so the consumer has to redial for every batch.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use parking_lot::Mutex;
use prost::Message as _;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

use hub_stream_proxy::infrastructure::grpc::proto::{unistream_v1, unistream_v2};
use hub_stream_proxy::infrastructure::unistream::PushTransportConfig;
use hub_stream_proxy::{
    ClientInfo, ConsumerError, ConsumerEvent, GrpcPushTransport, LinearBackoff, PushConsumer, PushConsumerConfig,
    PushDispatcher, PushHandler, PushProtocol, StaticConnectParams,
};

const WAIT: Duration = Duration::from_secs(10);

// =============================================================================
// Fake Hub
// =============================================================================

/// Replays `batch` on every call, optionally failing the stream afterwards.
struct FakeHub<P> {
    batch: Vec<P>,
    fail_after_batch: bool,
    tokens: Arc<Mutex<Vec<(String, Vec<String>)>>>,
}

impl<P: Clone + Send + 'static> FakeHub<P> {
    fn new(batch: Vec<P>) -> Self {
        Self {
            batch,
            fail_after_batch: false,
            tokens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn replay(&self) -> BoxStream<'static, Result<P, Status>> {
        let tail = self
            .fail_after_batch
            .then(|| Err(Status::unavailable("hub restarting")));
        stream::iter(self.batch.clone().into_iter().map(Ok).chain(tail)).boxed()
    }
}

#[tonic::async_trait]
impl unistream_v2::centrifugo_uni_stream_server::CentrifugoUniStream
    for FakeHub<unistream_v2::Push>
{
    type ConsumeStream = BoxStream<'static, Result<unistream_v2::Push, Status>>;

    async fn consume(
        &self,
        request: Request<unistream_v2::ConnectRequest>,
    ) -> Result<Response<Self::ConsumeStream>, Status> {
        let request = request.into_inner();
        let mut channels: Vec<String> = request.subs.into_keys().collect();
        channels.sort();
        self.tokens.lock().push((request.token, channels));
        Ok(Response::new(self.replay()))
    }
}

#[tonic::async_trait]
impl unistream_v1::centrifugo_uni_stream_server::CentrifugoUniStream
    for FakeHub<unistream_v1::Push>
{
    type ConsumeStream = BoxStream<'static, Result<unistream_v1::Push, Status>>;

    async fn consume(
        &self,
        request: Request<unistream_v1::ConnectRequest>,
    ) -> Result<Response<Self::ConsumeStream>, Status> {
        let request = request.into_inner();
        let mut channels: Vec<String> = request.subs.into_keys().collect();
        channels.sort();
        self.tokens.lock().push((request.token, channels));
        Ok(Response::new(self.replay()))
    }
}

async fn listen() -> (tokio::net::TcpListener, String) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = format!("http://{}", listener.local_addr().unwrap());
    (listener, addr)
}

fn v2_connect() -> unistream_v2::Push {
    unistream_v2::Push {
        channel: String::new(),
        kind: Some(unistream_v2::push::Kind::Connect(unistream_v2::Connect {
            client: "c-1".to_string(),
            version: "6.1.0".to_string(),
            ..unistream_v2::Connect::default()
        })),
    }
}

fn v1_connect() -> unistream_v1::Push {
    unistream_v1::Push {
        r#type: unistream_v1::push::PushType::Connect as i32,
        channel: String::new(),
        data: unistream_v1::Connect {
            client: "c-1".to_string(),
            version: "6.1.0".to_string(),
            ..unistream_v1::Connect::default()
        }
        .encode_to_vec(),
    }
}

/// Connect push followed by `pushes`.
fn negotiated<P>(connect: P, pushes: impl IntoIterator<Item = P>) -> Vec<P> {
    std::iter::once(connect).chain(pushes).collect()
}

fn v2_publication(channel: &str, i: usize) -> unistream_v2::Push {
    unistream_v2::Push {
        channel: channel.to_string(),
        kind: Some(unistream_v2::push::Kind::Pub(unistream_v2::Publication {
            data: format!(r#"{{"input":"{i}"}}"#).into_bytes(),
            offset: i as u64,
            ..unistream_v2::Publication::default()
        })),
    }
}

fn v1_publication(channel: &str, i: usize) -> unistream_v1::Push {
    unistream_v1::Push {
        r#type: unistream_v1::push::PushType::Publication as i32,
        channel: channel.to_string(),
        data: unistream_v1::Publication {
            data: format!(r#"{{"input":"{i}"}}"#).into_bytes(),
            offset: i as u64,
            ..unistream_v1::Publication::default()
        }
        .encode_to_vec(),
    }
}

// =============================================================================
// Consumer Harness
// =============================================================================

#[derive(Default)]
struct Recorder {
    publications: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl PushHandler for Recorder {
    async fn on_publication(
        &self,
        channel: &str,
        data: &[u8],
        _tags: &BTreeMap<String, String>,
        _offset: u64,
        _info: Option<&ClientInfo>,
    ) -> anyhow::Result<()> {
        self.publications
            .lock()
            .push((channel.to_string(), String::from_utf8_lossy(data).into_owned()));
        Ok(())
    }
}

/// Run a consumer against `addr` until `until` matches an event, then stop
/// it and return every event seen.
async fn run_consumer(
    addr: String,
    protocol: PushProtocol,
    recorder: Arc<Recorder>,
    until: impl Fn(&ConsumerEvent) -> bool,
) -> Vec<ConsumerEvent> {
    let transport = GrpcPushTransport::new(PushTransportConfig {
        server_addr: addr,
        protocol,
        connect_timeout: Duration::from_secs(1),
    });
    let (tx, mut rx) = mpsc::channel(64);
    let consumer = PushConsumer::new(
        PushConsumerConfig::default(),
        Arc::new(transport),
        Arc::new(StaticConnectParams::new("secret", ["news", "chat"])),
        PushDispatcher::from_arc(recorder),
        Box::new(LinearBackoff::new(Duration::from_millis(20))),
    )
    .with_events(tx);

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let handle = tokio::spawn(async move { consumer.run(run_cancel).await });

    let mut events = Vec::new();
    timeout(WAIT, async {
        while let Some(event) = rx.recv().await {
            let done = until(&event);
            events.push(event);
            if done {
                break;
            }
        }
    })
    .await
    .unwrap();

    cancel.cancel();
    drop(rx);
    timeout(WAIT, handle).await.unwrap().unwrap();
    events
}

fn connected_count(events: &[ConsumerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, ConsumerEvent::Connected { .. }))
        .count()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_twenty_publications_then_immediate_redial() {
    let hub = FakeHub::new(negotiated(
        v2_connect(),
        (0..20).map(|i| v2_publication("news", i)),
    ));
    let tokens = Arc::clone(&hub.tokens);
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        Server::builder()
            .add_service(unistream_v2::centrifugo_uni_stream_server::CentrifugoUniStreamServer::new(hub))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let recorder = Arc::new(Recorder::default());
    let events = run_consumer(addr, PushProtocol::V2, Arc::clone(&recorder), |event| {
        matches!(event, ConsumerEvent::Connected { attempt: 2 })
    })
    .await;

    let ended = events
        .iter()
        .position(|e| matches!(e, ConsumerEvent::StreamEnded { .. }))
        .unwrap();
    assert_eq!(
        events[ended],
        ConsumerEvent::StreamEnded {
            received: 21,
            error: None,
            consecutive_failures: 0,
        }
    );
    assert_eq!(events[ended + 1], ConsumerEvent::Connecting { attempt: 2 });
    assert!(!events
        .iter()
        .any(|e| matches!(e, ConsumerEvent::Backoff { .. })));

    let first_batch: Vec<String> = recorder.publications.lock()[..20]
        .iter()
        .map(|(_, body)| body.clone())
        .collect();
    let expected: Vec<String> = (0..20).map(|i| format!(r#"{{"input":"{i}"}}"#)).collect();
    assert_eq!(first_batch, expected);

    let (token, channels) = tokens.lock()[0].clone();
    assert_eq!(token, "secret");
    assert_eq!(channels, ["chat", "news"]);

    server.abort();
}

#[tokio::test]
async fn test_unknown_and_invalid_pushes_do_not_end_stream() {
    let batch = vec![
        v2_connect(),
        v2_publication("news", 0),
        unistream_v2::Push {
            channel: "news".to_string(),
            kind: None,
        },
        v2_publication("", 1),
        v2_publication("news", 2),
    ];
    let hub = FakeHub::new(batch);
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        Server::builder()
            .add_service(unistream_v2::centrifugo_uni_stream_server::CentrifugoUniStreamServer::new(hub))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let recorder = Arc::new(Recorder::default());
    let events = run_consumer(addr, PushProtocol::V2, Arc::clone(&recorder), |event| {
        matches!(event, ConsumerEvent::StreamEnded { .. })
    })
    .await;

    assert_eq!(
        events.last(),
        Some(&ConsumerEvent::StreamEnded {
            received: 5,
            error: None,
            consecutive_failures: 0,
        })
    );
    let bodies: Vec<String> = recorder
        .publications
        .lock()
        .iter()
        .map(|(_, body)| body.clone())
        .collect();
    assert_eq!(bodies[..2], [r#"{"input":"0"}"#, r#"{"input":"2"}"#]);

    server.abort();
}

#[tokio::test]
async fn test_v1_stream_error_after_receipts_redials_without_backoff() {
    let mut hub = FakeHub::new(negotiated(
        v1_connect(),
        (0..3).map(|i| v1_publication("news", i)),
    ));
    hub.fail_after_batch = true;
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        Server::builder()
            .add_service(unistream_v1::centrifugo_uni_stream_server::CentrifugoUniStreamServer::new(hub))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let recorder = Arc::new(Recorder::default());
    let events = run_consumer(addr, PushProtocol::V1, Arc::clone(&recorder), |event| {
        matches!(event, ConsumerEvent::Connected { attempt: 2 })
    })
    .await;

    let ended = events
        .iter()
        .find(|e| matches!(e, ConsumerEvent::StreamEnded { .. }))
        .unwrap();
    match ended {
        ConsumerEvent::StreamEnded {
            received,
            error,
            consecutive_failures,
        } => {
            assert_eq!(*received, 4);
            assert!(error.is_some());
            assert_eq!(*consecutive_failures, 0);
        }
        _ => unreachable!(),
    }
    assert_eq!(connected_count(&events), 2);
    assert!(recorder.publications.lock().len() >= 3);

    server.abort();
}

#[tokio::test]
async fn test_publication_before_connect_push_is_handshake_failure() {
    let hub = FakeHub::new(vec![v2_publication("news", 0), v2_connect()]);
    let (listener, addr) = listen().await;
    let server = tokio::spawn(async move {
        Server::builder()
            .add_service(unistream_v2::centrifugo_uni_stream_server::CentrifugoUniStreamServer::new(hub))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    let recorder = Arc::new(Recorder::default());
    let events = run_consumer(addr, PushProtocol::V2, Arc::clone(&recorder), |event| {
        matches!(event, ConsumerEvent::Backoff { .. })
    })
    .await;

    assert!(matches!(
        &events[..],
        [
            ConsumerEvent::Connecting { attempt: 1 },
            ConsumerEvent::AttemptFailed {
                error: ConsumerError::Handshake(_),
                consecutive_failures: 1,
            },
            ConsumerEvent::Backoff { .. },
        ]
    ));
    assert!(recorder.publications.lock().is_empty());

    server.abort();
}

#[tokio::test]
async fn test_unreachable_hub_backs_off() {
    let (listener, addr) = listen().await;
    drop(listener);

    let recorder = Arc::new(Recorder::default());
    let events = run_consumer(addr, PushProtocol::V2, recorder, |event| {
        matches!(
            event,
            ConsumerEvent::Backoff {
                consecutive_failures: 2,
                ..
            }
        )
    })
    .await;

    let delays: Vec<Duration> = events
        .iter()
        .filter_map(|e| match e {
            ConsumerEvent::Backoff { delay, .. } => Some(*delay),
            _ => None,
        })
        .collect();
    assert_eq!(
        delays,
        [Duration::from_millis(20), Duration::from_millis(40)]
    );
    assert_eq!(connected_count(&events), 0);
}
