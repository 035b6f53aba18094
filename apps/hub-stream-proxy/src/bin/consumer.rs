//! Hub Stream Consumer Binary
//!
//! Keeps a push stream to the hub open and logs every envelope it receives.
//!
//! # Usage
//!
//! ```bash
//! CONSUMER_CHANNELS=news,chat cargo run --bin hub-stream-consumer
//! ```
//!
//! # Environment Variables
//!
//! - `CONSUMER_SERVER_ADDR`: Hub gRPC address (default: <http://localhost:11000>)
//! - `CONSUMER_PROTOCOL`: `v2` | `v1` (default: v2)
//! - `CONSUMER_TOKEN`: Connection token
//! - `CONSUMER_CHANNELS`: Comma-separated channels to subscribe at connect
//! - `CONSUMER_BACKOFF`: `linear` | `exponential` (default: linear)
//! - `CONSUMER_CONNECT_TIMEOUT_MS`: Dial timeout (default: 5000)
//! - `CONSUMER_HEALTH_PORT`: Health check HTTP port (default: 8083)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use hub_stream_proxy::application::ports::LoggingPushHandler;
use hub_stream_proxy::application::services::{
    ConsumerEvent, PushConsumer, PushConsumerConfig, PushDispatcher,
};
use hub_stream_proxy::infrastructure::config::{ConsumerConfig, load_dotenv};
use hub_stream_proxy::infrastructure::health::{ConsumerStatus, HealthServer, HealthServerState};
use hub_stream_proxy::infrastructure::shutdown::{await_shutdown, drain};
use hub_stream_proxy::infrastructure::telemetry;
use hub_stream_proxy::infrastructure::unistream::{GrpcPushTransport, StaticConnectParams};
use hub_stream_proxy::init_metrics;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init("hub-stream-consumer");

    tracing::info!("Starting Hub Stream Consumer");

    let _metrics_handle = init_metrics();

    let config = ConsumerConfig::from_env()?;
    tracing::info!(
        server_addr = %config.server_addr,
        protocol = %config.protocol,
        channels = ?config.channels,
        backoff = config.backoff.as_str(),
        health_port = config.health_port,
        "Configuration loaded"
    );
    if config.channels.is_empty() {
        tracing::warn!("No channels configured; the hub will only send connection-level pushes");
    }

    let shutdown_token = CancellationToken::new();

    let status = Arc::new(ConsumerStatus::new());
    let health_state = Arc::new(HealthServerState::consumer(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&status),
    ));
    let health_server = HealthServer::new(config.health_port, health_state, shutdown_token.clone());
    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let (events_tx, events_rx) = mpsc::channel::<ConsumerEvent>(64);
    let status_task = tokio::spawn(track_status(events_rx, status));

    let consumer = PushConsumer::new(
        PushConsumerConfig::default(),
        Arc::new(GrpcPushTransport::new(config.transport_config())),
        Arc::new(StaticConnectParams::new(
            config.token.clone(),
            config.channels.clone(),
        )),
        PushDispatcher::new(LoggingPushHandler),
        config.backoff_policy(),
    )
    .with_events(events_tx);

    let consumer_cancel = shutdown_token.clone();
    let consumer_task = tokio::spawn(async move {
        consumer.run(consumer_cancel).await;
    });

    tracing::info!("Push consumer running");

    await_shutdown(shutdown_token).await;

    drain("consumer", consumer_task).await;
    drain("status", status_task).await;
    drain("health", health_task).await;

    tracing::info!("Push consumer stopped");
    Ok(())
}

/// Fold consumer events into the health status until the consumer exits.
async fn track_status(mut rx: mpsc::Receiver<ConsumerEvent>, status: Arc<ConsumerStatus>) {
    while let Some(event) = rx.recv().await {
        status.apply(&event);
    }
}
