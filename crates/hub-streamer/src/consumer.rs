//! # Consumer
//!
//! Receiving half of a supervised stream. Two background tasks share one
//! closed flag and one shutdown signal:
//!
//! 1. **Subscription task**: listens on the stream subject and pushes each
//!    event into the ring buffer, evicting the oldest when full
//! 2. **Heartbeat task**: probes the producer every `heartbeat_interval / 3`;
//!    any failed probe closes the consumer
//!
//! [`Consumer::next`] pops straight from the ring buffer, so events come out
//! in arrival order within the retained window.

use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::info::{Heartbeat, StreamInfo};
use crate::ring::RingBuffer;
use hub_bus::{Bus, Context, ContextStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

struct ConsumerInner {
    bus: Bus,
    info: StreamInfo,
    buffer: RingBuffer<Context>,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ConsumerInner {
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.send_replace(true);
        self.buffer.close();
        info!(stream = %self.info.stream_topic(), "Consumer closed");
        true
    }
}

/// Receiving half of a supervised stream.
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

impl Consumer {
    /// Attach to the stream described by `info`.
    ///
    /// The probe period comes from `info`; only `config.buffer_capacity` is
    /// read, `config.heartbeat_interval` is ignored. The stream subscription
    /// is open when this returns.
    ///
    /// # Errors
    ///
    /// - `StreamError::Config` - Zero buffer capacity, or `info` carries a
    ///   heartbeat interval below [`MIN_HEARTBEAT_INTERVAL`](crate::MIN_HEARTBEAT_INTERVAL)
    /// - `StreamError::Topic` / `StreamError::Bus` - The stream subscription failed
    pub async fn start(bus: Bus, info: StreamInfo, config: &StreamConfig) -> Result<Self, StreamError> {
        config.validate_buffer()?;
        info.validate()?;
        let events = bus.listen_stream(&info.stream_topic().req()?).await?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let inner = Arc::new(ConsumerInner {
            bus,
            info,
            buffer: RingBuffer::new(config.buffer_capacity),
            closed: AtomicBool::new(false),
            shutdown,
        });

        tokio::spawn(run_subscription(
            Arc::clone(&inner),
            events,
            shutdown_rx.clone(),
        ));
        tokio::spawn(run_heartbeat(Arc::clone(&inner), shutdown_rx));

        info!(
            stream = %inner.info.stream_topic(),
            capacity = config.buffer_capacity,
            "Consumer opened"
        );
        Ok(Self { inner })
    }

    #[must_use]
    pub fn info(&self) -> &StreamInfo {
        &self.inner.info
    }

    /// Wait for the next buffered event.
    ///
    /// # Returns
    ///
    /// - `Some(context)` - The oldest retained event
    /// - `None` - The consumer is closed; events still buffered are discarded
    pub async fn next(&self) -> Option<Context> {
        self.inner.buffer.pop().await
    }

    /// Stop both background tasks. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    /// Events evicted so far because the buffer was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.inner.buffer.evicted()
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        self.inner.close();
    }
}

async fn run_subscription(
    inner: Arc<ConsumerInner>,
    mut events: ContextStream,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.next() => match event {
                Some(ctx) => match inner.buffer.push(ctx) {
                    Ok(Some(evicted)) => {
                        warn!(
                            stream = %inner.info.stream_topic(),
                            id = %evicted.id(),
                            "Buffer full, oldest event dropped"
                        );
                    }
                    Ok(None) => {}
                    Err(_) => break,
                },
                None => {
                    debug!(stream = %inner.info.stream_topic(), "Stream subscription ended");
                    inner.close();
                    break;
                }
            },
        }
    }

    if let Err(e) = inner.bus.unsubscribe(&[events.id().clone()]).await {
        warn!(stream = %inner.info.stream_topic(), error = %e, "Failed to release stream subscription");
    }
}

async fn run_heartbeat(inner: Arc<ConsumerInner>, mut shutdown: watch::Receiver<bool>) {
    let period = inner.info.probe_period();
    let heartbeat = inner.info.heartbeat_topic().clone();
    let body = Heartbeat::default();

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(period) => {
                let probe = tokio::select! {
                    _ = shutdown.changed() => break,
                    probe = inner.bus.request::<_, Heartbeat>(&heartbeat, &body) => probe,
                };
                match probe {
                    Ok(_) => debug!(heartbeat = %heartbeat, "Heartbeat acknowledged"),
                    Err(e) => {
                        warn!(heartbeat = %heartbeat, error = %e, "Heartbeat failed, closing consumer");
                        inner.close();
                        break;
                    }
                }
            }
        }
    }
}
