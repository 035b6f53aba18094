//! Log tail source.
//!
//! The subscribe data is `{"query": "<log query>"}`. Every tailed entry is
//! published as `{"line": "<RFC 3339 timestamp>: <line>"}`.

use async_trait::async_trait;
use chrono::SecondsFormat;
use futures::StreamExt;
use serde::Deserialize;

use crate::application::ports::{
    LogEntry, LogTail, PublicationFeed, PublicationSource, SourceError, SourceRequest,
};

#[derive(Debug, Deserialize)]
struct TailRequest {
    query: String,
}

/// Publishes the live tail of the query carried in the subscribe data.
#[derive(Debug, Clone)]
pub struct LogTailSource<T> {
    tail: T,
}

impl<T: LogTail> LogTailSource<T> {
    /// Wrap a log tail.
    #[must_use]
    pub const fn new(tail: T) -> Self {
        Self { tail }
    }
}

#[async_trait]
impl<T: LogTail> PublicationSource for LogTailSource<T> {
    fn name(&self) -> &'static str {
        "log-tail"
    }

    async fn open(&self, request: &SourceRequest) -> Result<PublicationFeed, SourceError> {
        let parsed: TailRequest = serde_json::from_slice(&request.data)
            .map_err(|e| SourceError::InvalidRequest(format!("subscribe data: {e}")))?;
        if parsed.query.trim().is_empty() {
            return Err(SourceError::InvalidRequest("empty query".to_string()));
        }

        tracing::info!(channel = %request.channel, query = %parsed.query, "Starting log tail");
        let feed = self.tail.tail(&parsed.query).await?;
        Ok(feed
            .map(|entry| entry.map(|e| format_log_line(&e)))
            .boxed())
    }
}

/// Publication body for one log entry.
#[must_use]
pub fn format_log_line(entry: &LogEntry) -> Vec<u8> {
    let line = format!(
        "{}: {}",
        entry.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.line
    );
    serde_json::json!({ "line": line }).to_string().into_bytes()
}
