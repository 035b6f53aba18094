//! Bidirectional Streaming Integration Tests
//!
//! Drives `SubscribeBidirectional` and `ConnectBidirectional` over a loopback
//! connection: negotiation, ordered echo and malformed payload handling.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::{Channel, Server};
use tonic::{Code, Status, Streaming};

use hub_stream_proxy::infrastructure::sources::TickerSource;
use hub_stream_proxy::{
    MalformedPayloadPolicy, StreamProxyServer, StreamProxyServerConfig,
    proto::{
        ConnectRequest, Message, Publication, StreamConnectRequest, StreamSubscribeRequest,
        StreamSubscribeResponse, SubscribeRequest, stream_connect_request,
        stream_connect_response, stream_proxy_client::StreamProxyClient,
        stream_proxy_server::StreamProxyServer as StreamProxyService, stream_subscribe_request,
        stream_subscribe_response,
    },
};

const WAIT: Duration = Duration::from_secs(5);

async fn setup_test_server(
    policy: MalformedPayloadPolicy,
) -> (StreamProxyClient<Channel>, tokio::task::JoinHandle<()>) {
    let config = StreamProxyServerConfig {
        malformed_payload: policy,
        ..StreamProxyServerConfig::default()
    };
    let server = StreamProxyServer::new(config, Arc::new(TickerSource::default()));

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

    (client, server_handle)
}

fn negotiate(channel: &str) -> StreamSubscribeRequest {
    StreamSubscribeRequest {
        frame: Some(stream_subscribe_request::Frame::SubscribeRequest(
            SubscribeRequest {
                channel: channel.to_string(),
                user: "42".to_string(),
                ..SubscribeRequest::default()
            },
        )),
    }
}

fn publish(data: &str) -> StreamSubscribeRequest {
    StreamSubscribeRequest {
        frame: Some(stream_subscribe_request::Frame::Publication(Publication {
            data: data.as_bytes().to_vec(),
            ..Publication::default()
        })),
    }
}

fn input(value: &str) -> String {
    format!(r#"{{"input":"{value}"}}"#)
}

fn echoed(response: &StreamSubscribeResponse) -> String {
    match &response.frame {
        Some(stream_subscribe_response::Frame::Publication(publication)) => {
            String::from_utf8(publication.data.clone()).unwrap()
        }
        other => panic!("expected publication, got {other:?}"),
    }
}

/// Open `SubscribeBidirectional` with `frames` already queued. The sender is
/// returned so the request side stays open.
async fn open_subscribe(
    client: &mut StreamProxyClient<Channel>,
    frames: Vec<StreamSubscribeRequest>,
) -> (
    Result<Streaming<StreamSubscribeResponse>, Status>,
    mpsc::Sender<StreamSubscribeRequest>,
) {
    let (tx, rx) = mpsc::channel(16);
    for frame in frames {
        tx.send(frame).await.unwrap();
    }
    let response = client
        .subscribe_bidirectional(ReceiverStream::new(rx))
        .await
        .map(tonic::Response::into_inner);
    (response, tx)
}

async fn next(stream: &mut Streaming<StreamSubscribeResponse>) -> Result<Option<StreamSubscribeResponse>, Status> {
    timeout(WAIT, stream.message()).await.unwrap()
}

// =============================================================================
// SubscribeBidirectional
// =============================================================================

#[tokio::test]
async fn test_echo_preserves_order() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Close).await;

    let (response, tx) = open_subscribe(
        &mut client,
        vec![
            negotiate("chat"),
            publish(&input("a")),
            publish(&input("b")),
            publish(&input("c")),
        ],
    )
    .await;
    let mut stream = response.unwrap();

    let ack = next(&mut stream).await.unwrap().unwrap();
    assert!(matches!(
        ack.frame,
        Some(stream_subscribe_response::Frame::SubscribeResponse(_))
    ));
    for value in ["a", "b", "c"] {
        assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input(value));
    }

    tx.send(publish(&input("d"))).await.unwrap();
    assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input("d"));

    drop(tx);
    handle.abort();
}

#[tokio::test]
async fn test_malformed_payload_closes_cleanly() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Close).await;

    let (response, _tx) = open_subscribe(
        &mut client,
        vec![
            negotiate("chat"),
            publish(&input("1")),
            publish(&input("2")),
            publish("not json"),
            publish(&input("4")),
        ],
    )
    .await;
    let mut stream = response.unwrap();

    let _ack = next(&mut stream).await.unwrap().unwrap();
    assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input("1"));
    assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input("2"));
    assert!(next(&mut stream).await.unwrap().is_none());

    handle.abort();
}

#[tokio::test]
async fn test_malformed_payload_rejected_with_status() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Reject).await;

    let (response, _tx) = open_subscribe(
        &mut client,
        vec![
            negotiate("chat"),
            publish(&input("1")),
            publish(&input("2")),
            publish("{broken"),
        ],
    )
    .await;
    let mut stream = response.unwrap();

    let _ack = next(&mut stream).await.unwrap().unwrap();
    assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input("1"));
    assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input("2"));

    let status = next(&mut stream).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("message 3"), "{}", status.message());

    handle.abort();
}

#[tokio::test]
async fn test_array_payload_is_malformed() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Reject).await;

    let (response, _tx) = open_subscribe(
        &mut client,
        vec![
            negotiate("chat"),
            publish(&input("1")),
            publish(r#"["x"]"#),
        ],
    )
    .await;
    let mut stream = response.unwrap();

    let _ack = next(&mut stream).await.unwrap().unwrap();
    assert_eq!(echoed(&next(&mut stream).await.unwrap().unwrap()), input("1"));

    let status = next(&mut stream).await.unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("message 2"), "{}", status.message());

    handle.abort();
}

#[tokio::test]
async fn test_empty_array_payload_closes_cleanly() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Close).await;

    let (response, _tx) = open_subscribe(&mut client, vec![negotiate("chat"), publish("[]")]).await;
    let mut stream = response.unwrap();

    let _ack = next(&mut stream).await.unwrap().unwrap();
    assert!(next(&mut stream).await.unwrap().is_none());

    handle.abort();
}

#[tokio::test]
async fn test_publication_before_negotiation_is_rejected() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Close).await;

    let (response, _tx) = open_subscribe(&mut client, vec![publish(&input("early"))]).await;

    let status = match response {
        Err(status) => status,
        Ok(mut stream) => next(&mut stream).await.unwrap_err(),
    };
    assert_eq!(status.code(), Code::InvalidArgument);

    handle.abort();
}

// =============================================================================
// ConnectBidirectional
// =============================================================================

#[tokio::test]
async fn test_connect_acknowledges_user_and_echoes() {
    let (mut client, handle) = setup_test_server(MalformedPayloadPolicy::Close).await;

    let (tx, rx) = mpsc::channel(16);
    tx.send(StreamConnectRequest {
        frame: Some(stream_connect_request::Frame::ConnectRequest(
            ConnectRequest {
                client: "c-9".to_string(),
                name: "integration".to_string(),
                ..ConnectRequest::default()
            },
        )),
    })
    .await
    .unwrap();
    tx.send(StreamConnectRequest {
        frame: Some(stream_connect_request::Frame::Message(Message {
            data: input("hello").into_bytes(),
        })),
    })
    .await
    .unwrap();

    let mut stream = client
        .connect_bidirectional(ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    let ack = timeout(WAIT, stream.message()).await.unwrap().unwrap().unwrap();
    match ack.frame {
        Some(stream_connect_response::Frame::ConnectResponse(response)) => {
            assert_eq!(response.result.unwrap().user, "test");
        }
        other => panic!("expected connect response, got {other:?}"),
    }

    let reply = timeout(WAIT, stream.message()).await.unwrap().unwrap().unwrap();
    match reply.frame {
        Some(stream_connect_response::Frame::Message(message)) => {
            assert_eq!(message.data, input("hello").into_bytes());
        }
        other => panic!("expected message, got {other:?}"),
    }

    drop(tx);
    handle.abort();
}
