//! Loki WebSocket Tail
//!
//! Implements [`LogTail`] over Loki's `/loki/api/v1/tail` endpoint. Each
//! text frame is a JSON document:
//!
//! ```json
//! {"streams":[{"stream":{"app":"hub"},"values":[["1714566600000000000","line"]]}]}
//! ```
//!
//! Values carry a nanosecond Unix timestamp and the log line. One tail is
//! opened per session and closed when the session drops the feed.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use futures_util::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;

use crate::application::ports::{LogEntry, LogFeed, LogTail, SourceError};

/// Connection settings for the Loki tail endpoint.
#[derive(Debug, Clone)]
pub struct LokiConfig {
    /// Base WebSocket URL, e.g. `ws://loki:3100`.
    pub url: String,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            url: "ws://loki:3100".to_string(),
        }
    }
}

/// [`LogTail`] backed by Loki.
#[derive(Debug, Clone, Default)]
pub struct LokiTail {
    config: LokiConfig,
}

impl LokiTail {
    /// Create a tail client.
    #[must_use]
    pub const fn new(config: LokiConfig) -> Self {
        Self { config }
    }

    /// Full tail URL for `query`.
    #[must_use]
    pub fn tail_url(&self, query: &str) -> String {
        let params = form_urlencoded::Serializer::new(String::new())
            .append_pair("query", query)
            .finish();
        format!(
            "{}/loki/api/v1/tail?{params}",
            self.config.url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl LogTail for LokiTail {
    async fn tail(&self, query: &str) -> Result<LogFeed, SourceError> {
        let url = self.tail_url(query);
        tracing::debug!(url = %url, "Connecting to Loki tail");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| SourceError::Upstream(format!("loki tail connect failed: {e}")))?;

        let feed = ws_stream
            .map(|message| match message {
                Ok(Message::Text(text)) => decode_frame(text.as_str()),
                Ok(Message::Binary(data)) => match std::str::from_utf8(&data) {
                    Ok(text) => decode_frame(text),
                    Err(e) => vec![Err(SourceError::Upstream(format!(
                        "non-UTF8 loki frame: {e}"
                    )))],
                },
                Ok(Message::Close(frame)) => {
                    tracing::info!(frame = ?frame, "Loki closed the tail");
                    Vec::new()
                }
                Ok(_) => Vec::new(),
                Err(e) => vec![Err(SourceError::Upstream(format!("loki tail read failed: {e}")))],
            })
            .flat_map(stream::iter);

        Ok(feed.boxed())
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct TailResponse {
    #[serde(default)]
    streams: Vec<TailStream>,
}

#[derive(Debug, Deserialize)]
struct TailStream {
    #[serde(default)]
    values: Vec<(String, String)>,
}

/// Entries of one tail frame, in the order Loki sent them. An undecodable
/// frame or timestamp is an upstream fault and ends the feed.
fn decode_frame(text: &str) -> Vec<Result<LogEntry, SourceError>> {
    let response: TailResponse = match serde_json::from_str(text) {
        Ok(response) => response,
        Err(e) => {
            return vec![Err(SourceError::Upstream(format!(
                "undecodable loki frame: {e}"
            )))];
        }
    };

    response
        .streams
        .into_iter()
        .flat_map(|s| s.values)
        .map(|(ts, line)| match parse_timestamp(&ts) {
            Some(timestamp) => Ok(LogEntry { timestamp, line }),
            None => Err(SourceError::Upstream(format!(
                "bad loki timestamp: {ts}"
            ))),
        })
        .collect()
}

fn parse_timestamp(nanos: &str) -> Option<DateTime<Utc>> {
    nanos.parse::<i64>().ok().map(DateTime::from_timestamp_nanos)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn tail_url_encodes_query() {
        let tail = LokiTail::new(LokiConfig {
            url: "ws://loki:3100/".to_string(),
        });
        assert_eq!(
            tail.tail_url(r#"{app="hub"}"#),
            "ws://loki:3100/loki/api/v1/tail?query=%7Bapp%3D%22hub%22%7D"
        );
    }

    #[test]
    fn decodes_values_across_streams() {
        let frame = r#"{
            "streams": [
                {"stream": {"source": "backend1"}, "values": [["1714566600000000000", "first"]]},
                {"stream": {"source": "backend2"}, "values": [["1714566600500000000", "second"]]}
            ],
            "dropped_entries": null
        }"#;

        let entries: Vec<_> = decode_frame(frame).into_iter().map(Result::unwrap).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].line, "first");
        assert_eq!(
            entries[0].timestamp,
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
        );
        assert_eq!(entries[1].timestamp.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn garbage_is_an_upstream_error() {
        let frames = decode_frame("not json");
        assert!(matches!(frames.as_slice(), [Err(SourceError::Upstream(_))]));

        let values = decode_frame(r#"{"streams":[{"values":[["1714566600000000000","ok"],["abc","x"]]}]}"#);
        assert!(values[0].is_ok());
        assert!(matches!(values[1], Err(SourceError::Upstream(_))));
    }

    #[test]
    fn frame_without_streams_is_empty() {
        assert!(decode_frame("{}").is_empty());
    }
}
