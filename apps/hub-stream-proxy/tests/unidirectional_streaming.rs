//! Unidirectional Streaming Integration Tests
//!
//! Runs the proxy on a loopback port and drives `SubscribeUnidirectional`
//! with the generated client.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Server};
use tonic::{Code, Request};

use hub_stream_proxy::application::ports::{PublicationFeed, SourceRequest};
use hub_stream_proxy::infrastructure::grpc::server::SessionStats;
use hub_stream_proxy::infrastructure::sources::TickerSource;
use hub_stream_proxy::{
    PublicationSource, SourceError, StreamProxyServer, StreamProxyServerConfig,
    proto::{
        StreamSubscribeResponse, SubscribeRequest, stream_proxy_client::StreamProxyClient,
        stream_proxy_server::StreamProxyServer as StreamProxyService,
        stream_subscribe_response::Frame,
    },
};

const WAIT: Duration = Duration::from_secs(5);

/// Start a proxy on a random port and return a connected client.
async fn setup_test_server(
    config: StreamProxyServerConfig,
    source: Arc<dyn PublicationSource>,
    shutdown: CancellationToken,
) -> (StreamProxyClient<Channel>, tokio::task::JoinHandle<()>) {
    let (client, handle, _stats) = setup_test_server_with_stats(config, source, shutdown).await;
    (client, handle)
}

/// Like [`setup_test_server`], also returning the server's session counters.
async fn setup_test_server_with_stats(
    config: StreamProxyServerConfig,
    source: Arc<dyn PublicationSource>,
    shutdown: CancellationToken,
) -> (
    StreamProxyClient<Channel>,
    tokio::task::JoinHandle<()>,
    Arc<SessionStats>,
) {
    let server = StreamProxyServer::new(config, source).with_shutdown(shutdown);
    let stats = server.stats();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_handle = tokio::spawn(async move {
        Server::builder()
            .add_service(StreamProxyService::new(server))
            .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    let client = StreamProxyClient::connect(format!("http://{addr}"))
        .await
        .unwrap();

    (client, server_handle, stats)
}

fn fast_ticker() -> Arc<dyn PublicationSource> {
    Arc::new(TickerSource::new(Duration::from_millis(10)))
}

fn subscribe(channel: &str) -> Request<SubscribeRequest> {
    Request::new(SubscribeRequest {
        channel: channel.to_string(),
        user: "42".to_string(),
        client: "c-1".to_string(),
        ..SubscribeRequest::default()
    })
}

fn publication_body(response: &StreamSubscribeResponse) -> String {
    match &response.frame {
        Some(Frame::Publication(publication)) => String::from_utf8(publication.data.clone()).unwrap(),
        other => panic!("expected publication, got {other:?}"),
    }
}

/// Replays fixed bodies, then optionally fails.
struct ScriptedSource {
    bodies: Vec<&'static str>,
    fail_with: Option<SourceError>,
}

#[async_trait]
impl PublicationSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open(&self, _request: &SourceRequest) -> Result<PublicationFeed, SourceError> {
        let items = self
            .bodies
            .iter()
            .map(|body| Ok(body.as_bytes().to_vec()))
            .chain(self.fail_with.clone().map(Err));
        Ok(stream::iter(items.collect::<Vec<_>>()).boxed())
    }
}

// =============================================================================
// Emission Tests
// =============================================================================

#[tokio::test]
async fn test_ack_then_limited_ordered_publications() {
    let config = StreamProxyServerConfig {
        max_emissions: Some(5),
        ..StreamProxyServerConfig::default()
    };
    let (mut client, handle) =
        setup_test_server(config, fast_ticker(), CancellationToken::new()).await;

    let mut stream = client
        .subscribe_unidirectional(subscribe("ticks"))
        .await
        .unwrap()
        .into_inner();

    let ack = timeout(WAIT, stream.message()).await.unwrap().unwrap().unwrap();
    assert!(matches!(ack.frame, Some(Frame::SubscribeResponse(_))));

    let mut bodies = Vec::new();
    while let Some(response) = timeout(WAIT, stream.message()).await.unwrap().unwrap() {
        bodies.push(publication_body(&response));
    }

    let expected: Vec<String> = (0..5).map(|i| format!(r#"{{"input":"{i}"}}"#)).collect();
    assert_eq!(bodies, expected);

    handle.abort();
}

#[tokio::test]
async fn test_default_config_emits_twenty() {
    let (mut client, handle) = setup_test_server(
        StreamProxyServerConfig::default(),
        Arc::new(TickerSource::new(Duration::from_millis(1))),
        CancellationToken::new(),
    )
    .await;

    let mut stream = client
        .subscribe_unidirectional(subscribe("ticks"))
        .await
        .unwrap()
        .into_inner();

    let mut count = 0;
    while timeout(WAIT, stream.message()).await.unwrap().unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, 21, "one ack plus twenty publications");

    handle.abort();
}

#[tokio::test]
async fn test_source_end_closes_stream() {
    let source = Arc::new(ScriptedSource {
        bodies: vec!["a", "b"],
        fail_with: None,
    });
    let (mut client, handle) = setup_test_server(
        StreamProxyServerConfig::default(),
        source,
        CancellationToken::new(),
    )
    .await;

    let mut stream = client
        .subscribe_unidirectional(subscribe("logs"))
        .await
        .unwrap()
        .into_inner();

    let _ack = stream.message().await.unwrap().unwrap();
    assert_eq!(publication_body(&stream.message().await.unwrap().unwrap()), "a");
    assert_eq!(publication_body(&stream.message().await.unwrap().unwrap()), "b");
    assert!(timeout(WAIT, stream.message()).await.unwrap().unwrap().is_none());

    handle.abort();
}

// =============================================================================
// Failure Tests
// =============================================================================

#[tokio::test]
async fn test_upstream_error_surfaces_as_unavailable() {
    let source = Arc::new(ScriptedSource {
        bodies: vec!["only"],
        fail_with: Some(SourceError::Upstream("loki went away".into())),
    });
    let (mut client, handle) = setup_test_server(
        StreamProxyServerConfig::default(),
        source,
        CancellationToken::new(),
    )
    .await;

    let mut stream = client
        .subscribe_unidirectional(subscribe("logs"))
        .await
        .unwrap()
        .into_inner();

    let _ack = stream.message().await.unwrap().unwrap();
    assert_eq!(publication_body(&stream.message().await.unwrap().unwrap()), "only");

    let status = timeout(WAIT, stream.message()).await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    handle.abort();
}

#[tokio::test]
async fn test_missing_channel_is_invalid_argument() {
    let (mut client, handle) =
        setup_test_server(StreamProxyServerConfig::default(), fast_ticker(), CancellationToken::new())
            .await;

    // The status may arrive trailers-only or after the headers.
    let status = match client.subscribe_unidirectional(subscribe("")).await {
        Err(status) => status,
        Ok(response) => timeout(WAIT, response.into_inner().message())
            .await
            .unwrap()
            .unwrap_err(),
    };
    assert_eq!(status.code(), Code::InvalidArgument);

    handle.abort();
}

#[tokio::test]
async fn test_server_shutdown_cancels_session() {
    let shutdown = CancellationToken::new();
    let config = StreamProxyServerConfig {
        max_emissions: None,
        ..StreamProxyServerConfig::default()
    };
    let (mut client, handle) = setup_test_server(config, fast_ticker(), shutdown.clone()).await;

    let mut stream = client
        .subscribe_unidirectional(subscribe("ticks"))
        .await
        .unwrap()
        .into_inner();

    let _ack = stream.message().await.unwrap().unwrap();
    let _first = stream.message().await.unwrap().unwrap();

    shutdown.cancel();

    let status = loop {
        match timeout(WAIT, stream.message()).await.unwrap() {
            Ok(Some(_)) => {}
            Ok(None) => panic!("stream ended without a status"),
            Err(status) => break status,
        }
    };
    assert_eq!(status.code(), Code::Cancelled);

    handle.abort();
}

#[tokio::test]
async fn test_hub_drop_ends_session() {
    let config = StreamProxyServerConfig {
        max_emissions: None,
        ..StreamProxyServerConfig::default()
    };
    let (mut client, handle, stats) =
        setup_test_server_with_stats(config, fast_ticker(), CancellationToken::new()).await;

    let mut stream = client
        .subscribe_unidirectional(subscribe("ticks"))
        .await
        .unwrap()
        .into_inner();

    let _ack = stream.message().await.unwrap().unwrap();
    let _first = stream.message().await.unwrap().unwrap();
    assert_eq!(stats.active(), 1);

    drop(stream);

    timeout(WAIT, async {
        while stats.active() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("session still active after the hub dropped the stream");
    assert_eq!(stats.total(), 1);

    handle.abort();
}
