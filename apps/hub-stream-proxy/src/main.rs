//! Hub Stream Proxy Binary
//!
//! Serves on-demand unidirectional and bidirectional streams to the hub.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin hub-stream-proxy
//! ```
//!
//! # Environment Variables
//!
//! - `STREAM_PROXY_GRPC_PORT`: gRPC server port (default: 12000)
//! - `STREAM_PROXY_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `STREAM_PROXY_SOURCE`: `ticker` | `loki` (default: ticker)
//! - `STREAM_PROXY_TICK_INTERVAL_MS`: Ticker period (default: 1000)
//! - `STREAM_PROXY_MAX_EMISSIONS`: Publications per unidirectional session, 0 for unbounded (default: 20)
//! - `STREAM_PROXY_LOKI_URL`: Loki base URL (default: `ws://loki:3100`)
//! - `STREAM_PROXY_MALFORMED_PAYLOAD`: `close` | `reject` (default: close)
//! - `STREAM_PROXY_CONNECT_USER`: User returned in connect acknowledgements (default: test)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint; setting it enables export
//! - `RUST_LOG`: Log level (default: info)

use std::net::SocketAddr;
use std::sync::Arc;

use hub_stream_proxy::application::ports::PublicationSource;
use hub_stream_proxy::infrastructure::config::{ProxyConfig, SourceKind, load_dotenv};
use hub_stream_proxy::infrastructure::grpc::StreamProxyServer;
use hub_stream_proxy::infrastructure::grpc::proto::proxy::stream_proxy_server::StreamProxyServer as StreamProxyService;
use hub_stream_proxy::infrastructure::health::{HealthServer, HealthServerState};
use hub_stream_proxy::infrastructure::shutdown::{await_shutdown, drain};
use hub_stream_proxy::infrastructure::sources::{LogTailSource, LokiTail, TickerSource};
use hub_stream_proxy::infrastructure::telemetry;
use hub_stream_proxy::init_metrics;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init("hub-stream-proxy");

    tracing::info!("Starting Hub Stream Proxy");

    let _metrics_handle = init_metrics();

    let config = ProxyConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let source: Arc<dyn PublicationSource> = match config.source {
        SourceKind::Ticker => Arc::new(TickerSource::new(config.tick_interval)),
        SourceKind::Loki => Arc::new(LogTailSource::new(LokiTail::new(config.loki_config()))),
    };

    let grpc_server = Arc::new(
        StreamProxyServer::new(config.server_config(), source).with_shutdown(shutdown_token.clone()),
    );

    let health_state = Arc::new(HealthServerState::proxy(
        env!("CARGO_PKG_VERSION").to_string(),
        grpc_server.stats(),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    let health_task = tokio::spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    let grpc_addr: SocketAddr = format!("0.0.0.0:{}", config.server.grpc_port).parse()?;
    let grpc_service = StreamProxyService::from_arc(grpc_server);
    let grpc_shutdown = shutdown_token.clone();

    let grpc_task = tokio::spawn(async move {
        tracing::info!(addr = %grpc_addr, "gRPC server listening");
        if let Err(e) = Server::builder()
            .add_service(grpc_service)
            .serve_with_shutdown(grpc_addr, grpc_shutdown.cancelled())
            .await
        {
            tracing::error!(error = %e, "gRPC server error");
            grpc_shutdown.cancel();
        }
        tracing::info!("gRPC server stopped");
    });

    tracing::info!("Stream proxy ready");

    await_shutdown(shutdown_token).await;

    drain("grpc", grpc_task).await;
    drain("health", health_task).await;

    tracing::info!("Stream proxy stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &ProxyConfig) {
    tracing::info!(
        source = config.source.as_str(),
        grpc_port = config.server.grpc_port,
        health_port = config.server.health_port,
        max_emissions = ?config.max_emissions,
        malformed_payload = ?config.malformed_payload,
        "Configuration loaded"
    );
    match config.source {
        SourceKind::Ticker => tracing::debug!(
            tick_interval_ms = config.tick_interval.as_millis(),
            "Ticker source"
        ),
        SourceKind::Loki => tracing::debug!(loki_url = %config.loki_url, "Loki source"),
    }
}
