//! # Stream Flows
//!
//! Producer and consumers on separate services, supervising each other
//! through heartbeats over a shared broker.
//!
//! ## Flows Tested:
//!
//! 1. **Discovery**: a consumer obtains the `StreamInfo` by request and receives events
//! 2. **Fan-out**: every consumer of a stream sees every event
//! 3. **Supervision**: each side closes when the other goes away
//! 4. **Binary codec**: the same flow with bincode payloads

#[cfg(test)]
mod tests {
    use hub_bus::{Bus, BusConfig, Context, InMemoryTransport, SerializationFormat, Topic};
    use hub_streamer::{Consumer, Producer, StreamConfig, StreamInfo};
    use serde::{Deserialize, Serialize};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{sleep, timeout};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PriceTick {
        symbol: String,
        price: u64,
    }

    fn service(broker: &InMemoryTransport, group: &str, format: SerializationFormat) -> Bus {
        let config = BusConfig::default()
            .with_default_timeout(Duration::from_millis(100))
            .with_serialization(format);
        Bus::with_config(Arc::new(broker.connect(group)), config)
    }

    fn stream_config() -> StreamConfig {
        StreamConfig::default()
            .with_heartbeat_interval(Duration::from_millis(150))
            .with_buffer_capacity(16)
    }

    fn tick(price: u64) -> PriceTick {
        PriceTick {
            symbol: "HUB".to_string(),
            price,
        }
    }

    /// Serve the producer's descriptor on `prices.REQ`.
    async fn serve_discovery(bus: &Bus, topic: &Topic, info: StreamInfo) {
        bus.subscribe(&topic.req().unwrap(), move |ctx: Context| {
            let info = info.clone();
            async move {
                ctx.respond(&info).await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    async fn next_tick(consumer: &Consumer) -> PriceTick {
        timeout(Duration::from_millis(500), consumer.next())
            .await
            .expect("timed out")
            .expect("event")
            .bind()
            .unwrap()
    }

    async fn run_discovery_flow(format: SerializationFormat) {
        let broker = InMemoryTransport::new("feeds");
        let feed = service(&broker, "feeds", format);
        let client = service(&broker, "clients", format);
        let topic = Topic::new(format!("prices-{}", uuid::Uuid::new_v4()));

        let producer = Producer::start(feed.clone(), &topic, &stream_config())
            .await
            .unwrap();
        serve_discovery(&feed, &topic, producer.info().clone()).await;

        let info: StreamInfo = client.request(&topic, &()).await.unwrap();
        assert_eq!(&info, producer.info());

        let consumer = Consumer::start(client, info, &stream_config())
            .await
            .unwrap();

        for price in 1..=3 {
            producer.send(&tick(price)).await.unwrap();
        }
        for price in 1..=3 {
            assert_eq!(next_tick(&consumer).await, tick(price));
        }

        // Several heartbeat intervals: both sides stay open.
        sleep(Duration::from_millis(400)).await;
        assert!(producer.is_open());
        assert!(consumer.is_open());
    }

    // =============================================================================
    // INTEGRATION TESTS: DISCOVERY AND DELIVERY
    // =============================================================================

    #[tokio::test]
    async fn test_discovery_flow_json() {
        hub_telemetry::init_test_logging();
        run_discovery_flow(SerializationFormat::Json).await;
    }

    #[tokio::test]
    async fn test_discovery_flow_binary() {
        hub_telemetry::init_test_logging();
        run_discovery_flow(SerializationFormat::Binary).await;
    }

    #[tokio::test]
    async fn test_every_consumer_sees_every_event() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("feeds");
        let feed = service(&broker, "feeds", SerializationFormat::Json);
        let producer = Producer::start(feed, &Topic::new("prices"), &stream_config())
            .await
            .unwrap();

        let mut consumers = Vec::new();
        for group in ["desk-a", "desk-b", "desk-b"] {
            let bus = service(&broker, group, SerializationFormat::Json);
            let consumer = Consumer::start(bus, producer.info().clone(), &stream_config())
                .await
                .unwrap();
            consumers.push(consumer);
        }

        for price in 10..15 {
            producer.send(&tick(price)).await.unwrap();
        }

        for consumer in &consumers {
            for price in 10..15 {
                assert_eq!(next_tick(consumer).await, tick(price));
            }
        }
    }

    // =============================================================================
    // INTEGRATION TESTS: SUPERVISION
    // =============================================================================

    #[tokio::test]
    async fn test_consumer_closes_when_producer_dropped() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("feeds");
        let feed = service(&broker, "feeds", SerializationFormat::Json);
        let client = service(&broker, "clients", SerializationFormat::Json);

        let producer = Producer::start(feed, &Topic::new("prices"), &stream_config())
            .await
            .unwrap();
        let consumer = Consumer::start(client, producer.info().clone(), &stream_config())
            .await
            .unwrap();

        drop(producer);

        let next = timeout(Duration::from_secs(1), consumer.next())
            .await
            .expect("consumer should close");
        assert!(next.is_none());
        assert!(!consumer.is_open());

        // Every subscription on the broker has been released.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(broker.stats().active_subscriptions, 0);
    }

    #[tokio::test]
    async fn test_producer_closes_after_last_consumer_leaves() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("feeds");
        let feed = service(&broker, "feeds", SerializationFormat::Json);
        let client = service(&broker, "clients", SerializationFormat::Json);

        let producer = Producer::start(feed, &Topic::new("prices"), &stream_config())
            .await
            .unwrap();
        let consumer = Consumer::start(client, producer.info().clone(), &stream_config())
            .await
            .unwrap();

        sleep(Duration::from_millis(300)).await;
        assert!(producer.is_open());

        consumer.close();
        consumer.close();

        sleep(Duration::from_millis(400)).await;
        assert!(!producer.is_open());
        assert!(producer.send(&tick(1)).await.is_err());
    }
}
