//! Push Dispatcher
//!
//! Routes each decoded envelope to the matching [`PushHandler`] callback.
//! Nothing that happens here can end the stream: handler failures and
//! unknown kinds are logged and counted, then the read loop moves on.

use std::sync::Arc;

use crate::application::ports::PushHandler;
use crate::domain::envelope::{Envelope, Payload};
use crate::infrastructure::metrics;

/// What the dispatcher did with one envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler accepted the envelope.
    Handled,
    /// The handler returned an error, which was logged.
    HandlerFailed,
    /// No handler exists for the kind.
    Unhandled,
}

/// Classifies envelopes and invokes the handler.
#[derive(Debug)]
pub struct PushDispatcher<H> {
    handler: Arc<H>,
}

impl<H> Clone for PushDispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<H: PushHandler> PushDispatcher<H> {
    /// Create a dispatcher around a handler.
    #[must_use]
    pub fn new(handler: H) -> Self {
        Self::from_arc(Arc::new(handler))
    }

    /// Create a dispatcher around a shared handler.
    #[must_use]
    pub const fn from_arc(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// The wrapped handler.
    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Route one envelope. Never fails.
    pub async fn dispatch(&self, envelope: &Envelope) -> DispatchOutcome {
        let kind = envelope.kind();
        let channel = envelope.channel.as_str();
        metrics::record_push_dispatched(kind);

        let result = match &envelope.payload {
            Payload::Connect {
                client,
                version,
                subscriptions,
                ..
            } => self.handler.on_connect(client, version, subscriptions).await,
            Payload::Subscribe { data } => self.handler.on_subscribe(channel, data).await,
            Payload::Publication {
                data,
                tags,
                offset,
                info,
            } => {
                self.handler
                    .on_publication(channel, data, tags, *offset, info.as_ref())
                    .await
            }
            Payload::Join { info } => self.handler.on_join(channel, info).await,
            Payload::Leave { info } => self.handler.on_leave(channel, info).await,
            Payload::Disconnect { code, reason } => {
                self.handler.on_disconnect(*code, reason).await
            }
            Payload::Unknown { code, raw } => {
                tracing::warn!(
                    channel,
                    code = ?code,
                    bytes = raw.len(),
                    "No handler for push kind"
                );
                return DispatchOutcome::Unhandled;
            }
        };

        match result {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                metrics::record_handler_error(kind);
                tracing::warn!(channel, kind = %kind, error = %e, "Push handler failed");
                DispatchOutcome::HandlerFailed
            }
        }
    }
}
