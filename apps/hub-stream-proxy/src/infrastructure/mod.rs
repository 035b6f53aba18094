//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// gRPC streaming server implementation.
pub mod grpc;

/// Hub push stream client and wire codecs.
pub mod unistream;

/// Publication sources for unidirectional sessions.
pub mod sources;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;

/// Process signal handling.
pub mod shutdown;
