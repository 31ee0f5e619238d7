//! # Context Stream
//!
//! The inbound side of a registered subscription, exposed as a
//! `tokio_stream::Stream` of [`Context`]s in arrival order.
//!
//! The stream:
//! - drops envelopes whose ID was already delivered within the dedup window
//! - clears `reply` for listen-mode subscriptions, so listeners cannot answer
//! - ends when the transport closes the channel or the registry entry is removed
//! - releases its subscription when dropped

use crate::bus::Bus;
use crate::context::Context;
use crate::dedup::RecentIdCache;
use crate::envelope::Envelope;
use crate::registry::SubscriptionMode;
use crate::transport::{InboundSubscription, SubscriptionId};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

/// Ordered stream of inbound contexts for one subscription.
pub struct ContextStream {
    id: SubscriptionId,
    subject: String,
    mode: SubscriptionMode,
    messages: mpsc::Receiver<Envelope>,
    /// Fires when the registry entry is removed.
    closed: oneshot::Receiver<()>,
    seen: RecentIdCache,
    bus: Bus,
    done: bool,
}

impl ContextStream {
    pub(crate) fn new(
        bus: Bus,
        subject: String,
        mode: SubscriptionMode,
        inbound: InboundSubscription,
        closed: oneshot::Receiver<()>,
    ) -> Self {
        let seen =
            RecentIdCache::with_config(bus.config().dedup_window, RecentIdCache::DEFAULT_GC_INTERVAL);
        Self {
            id: inbound.id,
            subject,
            mode,
            messages: inbound.messages,
            closed,
            seen,
            bus,
            done: false,
        }
    }

    /// The subscription ID, as accepted by [`Bus::unsubscribe`].
    #[must_use]
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    /// Receive the next context.
    ///
    /// # Returns
    ///
    /// - `Some(context)` - The next inbound message
    /// - `None` - The subscription was cancelled
    pub async fn recv(&mut self) -> Option<Context> {
        self.next().await
    }

    fn accept(&mut self, mut envelope: Envelope) -> Option<Context> {
        if !self.seen.check_and_insert(&envelope.id) {
            warn!(
                subject = %self.subject,
                id = %envelope.id,
                "Duplicate envelope dropped"
            );
            return None;
        }

        if self.mode == SubscriptionMode::Listen {
            envelope.reply.clear();
        }

        Some(Context::new(self.bus.clone(), envelope))
    }
}

impl Stream for ContextStream {
    type Item = Context;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.done {
            return Poll::Ready(None);
        }

        if Pin::new(&mut this.closed).poll(cx).is_ready() {
            this.done = true;
            return Poll::Ready(None);
        }

        loop {
            match this.messages.poll_recv(cx) {
                Poll::Ready(Some(envelope)) => {
                    if let Some(context) = this.accept(envelope) {
                        return Poll::Ready(Some(context));
                    }
                }
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl Drop for ContextStream {
    fn drop(&mut self) {
        self.bus.release(&self.id);
    }
}
