//! Domain Layer - Envelope model, connection state and backoff policy.
//!
//! Pure Rust types with no transport dependencies. The wire schemas in the
//! infrastructure layer convert to and from these types.

/// Push envelope model shared by both protocol generations.
pub mod envelope;

/// Reconnect wait policies.
pub mod backoff;

/// Consumer connection state machine.
pub mod connection;
