//! # Bus
//!
//! Combines topics, envelopes, the codec and a [`Transport`] into three
//! messaging patterns:
//!
//! ```text
//!   request(T, v)  ──► T.REQ  (reply on T.RES.<uuid>, raced against timeout)
//!   publish(T, v)  ──► T.REQ  (no reply)
//!   subscribe(S)   ◄── S      (competing consumers, one handler task per message)
//!   listen(S)      ◄── S      (broadcast, reply stripped)
//! ```
//!
//! Handler tasks are bounded by `max_concurrent_handlers`; when saturated,
//! dispatch waits for a free slot instead of spawning without limit.

use crate::config::BusConfig;
use crate::context::Context;
use crate::envelope::{Envelope, Payload};
use crate::error::BusError;
use crate::registry::{SubscriptionInfo, SubscriptionMode, SubscriptionRegistry};
use crate::serializer::{BusSerializer, SerializationFormat};
use crate::stream::ContextStream;
use crate::topic::Topic;
use crate::transport::{InboundSubscription, SubscriptionId, Transport};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio_stream::StreamExt;
use tracing::{debug, warn};

/// Handler invoked once per inbound message.
///
/// Implemented for every `Fn(Context) -> impl Future<Output = ()>` closure.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn handle(&self, context: Context);
}

#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn handle(&self, context: Context) {
        (self)(context).await;
    }
}

struct BusInner {
    transport: Arc<dyn Transport>,
    config: BusConfig,
    registry: SubscriptionRegistry,
    handler_slots: Arc<Semaphore>,
}

/// Messaging bus. Cheap to clone; clones share the transport and registry.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

impl Bus {
    /// Create a bus with default configuration and the given codec.
    pub fn new(transport: Arc<dyn Transport>, format: SerializationFormat) -> Self {
        Self::with_config(transport, BusConfig::default().with_serialization(format))
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: BusConfig) -> Self {
        let slots = config
            .max_concurrent_handlers
            .clamp(1, Semaphore::MAX_PERMITS);
        Self {
            inner: Arc::new(BusInner {
                transport,
                config,
                registry: SubscriptionRegistry::new(),
                handler_slots: Arc::new(Semaphore::new(slots)),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.inner.config.default_timeout
    }

    /// Send `req` to `topic.REQ` and wait for the reply.
    ///
    /// # Errors
    ///
    /// - `BusError::Application` - The handler answered with `respond_error`
    /// - `BusError::Timeout` - No reply within the default timeout
    /// - `BusError::Serialization` - Encoding the request or decoding the reply failed
    /// - `BusError::Transport` - The transport rejected the subscribe or publish
    pub async fn request<Req, Res>(&self, topic: &Topic, req: &Req) -> Result<Res, BusError>
    where
        Req: Serialize + ?Sized + Sync,
        Res: DeserializeOwned,
    {
        let subject = topic.req()?;
        let reply = topic.res_unique()?;
        let data = self.codec().encode(req)?;
        let envelope = Envelope::request(subject.as_str(), reply.as_str(), data);

        // The reply listener must exist before the request goes out.
        let InboundSubscription { id, mut messages } =
            self.inner.transport.subscribe(reply.as_str()).await?;

        let outcome = self
            .exchange(envelope, &mut messages, subject.as_str())
            .await;

        if let Err(e) = self
            .inner
            .transport
            .unsubscribe(std::slice::from_ref(&id))
            .await
        {
            warn!(reply = %reply, error = %e, "Failed to release reply subscription");
        }

        let response = outcome?;
        if response.payload.is_error() {
            return Err(BusError::Application(response.payload.error));
        }
        Ok(self.codec().decode(&response.payload.data)?)
    }

    async fn exchange(
        &self,
        envelope: Envelope,
        replies: &mut mpsc::Receiver<Envelope>,
        subject: &str,
    ) -> Result<Envelope, BusError> {
        let reply = envelope.reply.clone();
        self.send(envelope).await?;

        let timeout = self.inner.config.default_timeout;
        match tokio::time::timeout(timeout, replies.recv()).await {
            Ok(Some(response)) => Ok(response),
            Ok(None) => Err(BusError::ReplyChannelClosed { subject: reply }),
            Err(_) => {
                warn!(subject = %subject, timeout = ?timeout, "Request timed out");
                Err(BusError::Timeout {
                    subject: subject.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Fire-and-forget `value` to `topic.REQ`.
    pub async fn publish<T>(&self, topic: &Topic, value: &T) -> Result<(), BusError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let subject = topic.req()?;
        let data = self.codec().encode(value)?;
        self.send(Envelope::new(subject.as_str(), Payload::data(data)))
            .await
    }

    /// Competing-consumer subscription on `topic`.
    ///
    /// Each message runs `handler` on its own task. Subscribers sharing a
    /// topic and queue group split the messages between them.
    pub async fn subscribe<H: MessageHandler>(
        &self,
        topic: &Topic,
        handler: H,
    ) -> Result<SubscriptionId, BusError> {
        let stream = self.open(topic, SubscriptionMode::Subscribe).await?;
        Ok(self.dispatch(stream, handler))
    }

    /// Broadcast subscription on `topic`.
    ///
    /// Every listener sees every message. Contexts handed to listeners are
    /// never replyable.
    pub async fn listen<H: MessageHandler>(
        &self,
        topic: &Topic,
        handler: H,
    ) -> Result<SubscriptionId, BusError> {
        let stream = self.open(topic, SubscriptionMode::Listen).await?;
        Ok(self.dispatch(stream, handler))
    }

    /// Competing-consumer subscription delivered as an ordered stream.
    pub async fn subscribe_stream(&self, topic: &Topic) -> Result<ContextStream, BusError> {
        self.open(topic, SubscriptionMode::Subscribe).await
    }

    /// Broadcast subscription delivered as an ordered stream.
    pub async fn listen_stream(&self, topic: &Topic) -> Result<ContextStream, BusError> {
        self.open(topic, SubscriptionMode::Listen).await
    }

    /// Cancel subscriptions.
    ///
    /// Entries leave the registry even if the transport reports an error.
    /// In-flight handler tasks are not awaited.
    pub async fn unsubscribe(&self, ids: &[SubscriptionId]) -> Result<(), BusError> {
        let removed = self.inner.registry.remove(ids);
        let released = self.inner.transport.unsubscribe(ids).await;
        debug!(requested = ids.len(), removed, "Unsubscribed");
        released.map_err(BusError::from)
    }

    #[must_use]
    pub fn active_subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner.registry.snapshot()
    }

    #[must_use]
    pub fn is_subscribed(&self, id: &SubscriptionId) -> bool {
        self.inner.registry.contains(id)
    }

    pub(crate) async fn send(&self, envelope: Envelope) -> Result<(), BusError> {
        debug!(subject = %envelope.topic, id = %envelope.id, "Publishing envelope");
        self.inner.transport.publish(envelope).await?;
        Ok(())
    }

    fn codec(&self) -> SerializationFormat {
        self.inner.config.serialization
    }

    async fn open(
        &self,
        topic: &Topic,
        mode: SubscriptionMode,
    ) -> Result<ContextStream, BusError> {
        let inbound = match mode {
            SubscriptionMode::Subscribe => self.inner.transport.subscribe(topic.as_str()).await?,
            SubscriptionMode::Listen => self.inner.transport.listen(topic.as_str()).await?,
        };

        let registered = self.inner.registry.register(SubscriptionInfo {
            id: inbound.id.clone(),
            subject: topic.to_string(),
            mode,
            created_at: Instant::now(),
        });
        let closed = match registered {
            Ok(closed) => closed,
            Err(e) => {
                // Untracked routes would never be released.
                if let Err(release) = self.inner.transport.unsubscribe(&[inbound.id.clone()]).await {
                    warn!(subject = %topic, subscription_id = %inbound.id, error = %release, "Failed to release unregistered route");
                }
                return Err(e);
            }
        };

        debug!(subject = %topic, subscription_id = %inbound.id, mode = ?mode, "Subscription opened");
        Ok(ContextStream::new(
            self.clone(),
            topic.to_string(),
            mode,
            inbound,
            closed,
        ))
    }

    /// Release a subscription whose stream was dropped without `unsubscribe`.
    ///
    /// Runs from `Drop`, so the transport call is spawned onto the current
    /// runtime. No-op when the subscription was already removed.
    pub(crate) fn release(&self, id: &SubscriptionId) {
        if self.inner.registry.remove(std::slice::from_ref(id)) == 0 {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(subscription_id = %id, "No runtime to release dropped subscription");
            return;
        };

        let transport = Arc::clone(&self.inner.transport);
        let id = id.clone();
        runtime.spawn(async move {
            match transport.unsubscribe(std::slice::from_ref(&id)).await {
                Ok(()) => debug!(subscription_id = %id, "Dropped subscription released"),
                Err(e) => warn!(subscription_id = %id, error = %e, "Failed to release dropped subscription"),
            }
        });
    }

    fn dispatch<H: MessageHandler>(&self, mut stream: ContextStream, handler: H) -> SubscriptionId {
        let id = stream.id().clone();
        let handler = Arc::new(handler);
        let slots = Arc::clone(&self.inner.handler_slots);

        tokio::spawn(async move {
            while let Some(context) = stream.next().await {
                let Ok(slot) = Arc::clone(&slots).acquire_owned().await else {
                    break;
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.handle(context).await;
                    drop(slot);
                });
            }
            debug!(subject = %stream.subject(), subscription_id = %stream.id(), "Dispatch loop finished");
        });

        id
    }
}
