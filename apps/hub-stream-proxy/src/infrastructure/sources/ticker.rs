//! Fixed-period ticker source.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::IntervalStream;

use crate::application::ports::{PublicationFeed, PublicationSource, SourceError, SourceRequest};

/// Emits `{"input":"0"}`, `{"input":"1"}`, ... one per period.
///
/// The first body is emitted one full period after the session opens.
#[derive(Debug, Clone, Copy)]
pub struct TickerSource {
    period: Duration,
}

impl TickerSource {
    /// Create a ticker with the given period.
    #[must_use]
    pub const fn new(period: Duration) -> Self {
        Self { period }
    }

    /// Emission period.
    #[must_use]
    pub const fn period(&self) -> Duration {
        self.period
    }
}

impl Default for TickerSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PublicationSource for TickerSource {
    fn name(&self) -> &'static str {
        "ticker"
    }

    async fn open(&self, request: &SourceRequest) -> Result<PublicationFeed, SourceError> {
        tracing::debug!(channel = %request.channel, period_ms = self.period.as_millis(), "Starting ticker");

        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let feed = IntervalStream::new(interval)
            .enumerate()
            .map(|(i, _)| Ok(tick_body(i)));
        Ok(feed.boxed())
    }
}

fn tick_body(i: usize) -> Vec<u8> {
    serde_json::json!({ "input": i.to_string() })
        .to_string()
        .into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_numbered_bodies_after_each_period() {
        let source = TickerSource::new(Duration::from_secs(1));
        let mut feed = source.open(&SourceRequest::default()).await.unwrap();

        let started = Instant::now();
        let first = feed.next().await.unwrap().unwrap();
        assert_eq!(first, br#"{"input":"0"}"#.to_vec());
        assert!(started.elapsed() >= Duration::from_secs(1));

        let second = feed.next().await.unwrap().unwrap();
        assert_eq!(second, br#"{"input":"1"}"#.to_vec());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_before_first_period() {
        let source = TickerSource::new(Duration::from_millis(500));
        let mut feed = source.open(&SourceRequest::default()).await.unwrap();

        let mut next = tokio_test::task::spawn(feed.next());
        tokio_test::assert_pending!(next.poll());

        tokio::time::advance(Duration::from_millis(500)).await;
        let body = tokio_test::assert_ready!(next.poll());
        assert_eq!(body.unwrap().unwrap(), br#"{"input":"0"}"#.to_vec());
    }
}
