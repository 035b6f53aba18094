//! Publication source adapters for unidirectional sessions.
//!
//! - [`TickerSource`]: numbered `{"input": "<i>"}` bodies on a fixed period
//! - [`LogTailSource`]: one publication per line of an upstream log tail
//! - [`LokiTail`]: the [`LogTail`](crate::application::ports::LogTail) port
//!   over Loki's WebSocket tail endpoint

mod log_tail;
mod loki;
mod ticker;

pub use log_tail::{LogTailSource, format_log_line};
pub use loki::{LokiConfig, LokiTail};
pub use ticker::TickerSource;
