//! # Producer
//!
//! Publishes events on a unique stream subject and answers heartbeat probes.
//!
//! ## Lifecycle
//!
//! ```text
//! Open ──close() / no probe within heartbeat_interval──► Closed (terminal)
//! ```
//!
//! A producer that stops receiving probes assumes nobody is consuming and
//! closes itself, releasing its heartbeat subscription.

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::info::{Heartbeat, StreamInfo};
use hub_bus::{Bus, ContextStream, Topic};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

struct ProducerInner {
    bus: Bus,
    info: StreamInfo,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ProducerInner {
    /// Returns true if this call performed the transition.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.send_replace(true);
        info!(stream = %self.info.stream_topic(), "Producer closed");
        true
    }
}

/// Sending half of a supervised stream.
pub struct Producer {
    inner: Arc<ProducerInner>,
}

impl Producer {
    /// Derive fresh stream subjects from `topic` and start answering probes.
    ///
    /// The heartbeat subscription is open when this returns, so a consumer
    /// started right after can probe immediately.
    pub async fn start(bus: Bus, topic: &Topic, config: &StreamConfig) -> Result<Self, StreamError> {
        config.validate()?;
        let info = StreamInfo::derive(topic, config.heartbeat_interval)?;
        let probes = bus.subscribe_stream(&info.heartbeat_topic().req()?).await?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(ProducerInner {
            bus,
            info,
            closed: AtomicBool::new(false),
            shutdown,
        });

        tokio::spawn(run_liveness(Arc::clone(&inner), probes, shutdown_rx));

        info!(
            stream = %inner.info.stream_topic(),
            heartbeat = %inner.info.heartbeat_topic(),
            interval = ?inner.info.heartbeat_interval(),
            "Producer opened"
        );
        Ok(Self { inner })
    }

    /// Descriptor to hand to consumers.
    #[must_use]
    pub fn info(&self) -> &StreamInfo {
        &self.inner.info
    }

    /// Broadcast `event` to every consumer of this stream.
    ///
    /// # Errors
    ///
    /// - `StreamError::Closed` - The producer is closed
    /// - `StreamError::Bus` - Encoding or publishing failed
    pub async fn send<T>(&self, event: &T) -> Result<(), StreamError>
    where
        T: Serialize + ?Sized + Sync,
    {
        if !self.is_open() {
            return Err(StreamError::Closed);
        }
        self.inner
            .bus
            .publish(self.inner.info.stream_topic(), event)
            .await?;
        Ok(())
    }

    /// Stop answering probes. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.inner.close();
    }
}

async fn run_liveness(
    inner: Arc<ProducerInner>,
    mut probes: ContextStream,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = inner.info.heartbeat_interval();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            probe = tokio::time::timeout(interval, probes.next()) => match probe {
                Ok(Some(ctx)) => {
                    debug!(heartbeat = %inner.info.heartbeat_topic(), "Heartbeat probe received");
                    if let Err(e) = ctx.respond(&Heartbeat::default()).await {
                        warn!(heartbeat = %inner.info.heartbeat_topic(), error = %e, "Failed to acknowledge heartbeat");
                    }
                }
                Ok(None) => {
                    debug!(heartbeat = %inner.info.heartbeat_topic(), "Heartbeat subscription ended");
                    break;
                }
                Err(_) => {
                    warn!(
                        stream = %inner.info.stream_topic(),
                        interval = ?interval,
                        "No heartbeat probe within interval"
                    );
                    break;
                }
            },
        }
    }

    inner.close();
    if let Err(e) = inner.bus.unsubscribe(&[probes.id().clone()]).await {
        warn!(heartbeat = %inner.info.heartbeat_topic(), error = %e, "Failed to release heartbeat subscription");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_bus::{BusConfig, InMemoryTransport};
    use std::time::Duration;
    use tokio::time::sleep;

    fn bus() -> Bus {
        let config = BusConfig::default().with_default_timeout(Duration::from_millis(200));
        Bus::with_config(Arc::new(InMemoryTransport::default()), config)
    }

    fn config(interval_ms: u64) -> StreamConfig {
        StreamConfig::default().with_heartbeat_interval(Duration::from_millis(interval_ms))
    }

    #[tokio::test]
    async fn test_closes_without_probes() {
        let producer = Producer::start(bus(), &Topic::new("events"), &config(100))
            .await
            .unwrap();
        assert!(producer.is_open());

        sleep(Duration::from_millis(300)).await;
        assert!(!producer.is_open());
    }

    #[tokio::test]
    async fn test_stays_open_while_probed() {
        let bus = bus();
        let producer = Producer::start(bus.clone(), &Topic::new("events"), &config(150))
            .await
            .unwrap();

        for _ in 0..6 {
            sleep(Duration::from_millis(50)).await;
            let _: Heartbeat = bus
                .request(producer.info().heartbeat_topic(), &Heartbeat::default())
                .await
                .unwrap();
        }

        assert!(producer.is_open());
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_rejects_send() {
        let bus = bus();
        let producer = Producer::start(bus.clone(), &Topic::new("events"), &config(1000))
            .await
            .unwrap();

        producer.close();
        producer.close();
        assert!(!producer.is_open());
        assert!(matches!(producer.send(&1u32).await, Err(StreamError::Closed)));

        // Liveness task releases the heartbeat subscription.
        sleep(Duration::from_millis(50)).await;
        assert!(bus.active_subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_start_rejects_derived_topic() {
        let result = Producer::start(bus(), &Topic::new("events.REQ"), &config(1000)).await;
        assert!(matches!(result, Err(StreamError::Topic(_))));
    }

    #[tokio::test]
    async fn test_send_publishes_on_stream_subject() {
        let bus = bus();
        let producer = Producer::start(bus.clone(), &Topic::new("events"), &config(1000))
            .await
            .unwrap();
        let mut events = bus
            .listen_stream(&producer.info().stream_topic().req().unwrap())
            .await
            .unwrap();

        producer.send(&"hello").await.unwrap();

        let ctx = tokio::time::timeout(Duration::from_millis(200), events.recv())
            .await
            .expect("timed out")
            .expect("event");
        assert_eq!(ctx.bind::<String>().unwrap(), "hello");
    }
}
