//! Application Services
//!
//! - [`PushDispatcher`]: routes decoded envelopes to a [`PushHandler`](crate::application::ports::PushHandler)
//! - [`PushConsumer`]: the reconnect loop around one push stream

mod consumer;
mod dispatcher;

pub use consumer::{ConsumerEvent, PushConsumer, PushConsumerConfig};
pub use dispatcher::{DispatchOutcome, PushDispatcher};
