//! Application Layer - Use cases and port definitions.
//!
//! Ports describe what the push consumer and the stream sessions need from
//! the outside world; services hold the transport-independent logic.

/// Port interfaces for publication sources, transports and handlers.
pub mod ports;

/// Push dispatch and the reconnect loop.
pub mod services;
