//! # Bus Flows
//!
//! Several services, each with its own `Bus` and queue group, attached to one
//! in-memory broker.
//!
//! ## Flows Tested:
//!
//! 1. **Gateway → Orders (2 instances)**: requests are load-shared, each handled once
//! 2. **Publish → Orders + Audit**: every queue group handles a published event once
//! 3. **Audit listener**: observes requests on `REQ` and replies on `RES.*`
//! 4. **Failure paths**: application errors and timeouts reach the requester

#[cfg(test)]
mod tests {
    use hub_bus::{Bus, BusConfig, BusError, Context, InMemoryTransport, Topic};
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct PlaceOrder {
        sku: String,
        quantity: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderPlaced {
        order_id: String,
        handled_by: String,
    }

    fn service(broker: &InMemoryTransport, group: &str) -> Bus {
        let config = BusConfig::default().with_default_timeout(Duration::from_millis(300));
        Bus::with_config(Arc::new(broker.connect(group)), config)
    }

    fn orders_topic() -> Topic {
        Topic::new(format!("orders-{}", uuid::Uuid::new_v4()))
    }

    fn place_order(quantity: u32) -> PlaceOrder {
        PlaceOrder {
            sku: "SKU-1".to_string(),
            quantity,
        }
    }

    /// Start an orders instance that rejects zero quantities.
    async fn start_orders_instance(bus: &Bus, topic: &Topic, name: &str) {
        let name = name.to_string();
        bus.subscribe(&topic.req().unwrap(), move |ctx: Context| {
            let name = name.clone();
            async move {
                let order: PlaceOrder = ctx.bind().unwrap();
                if order.quantity == 0 {
                    ctx.respond_error("quantity must be positive").await.unwrap();
                    return;
                }
                let placed = OrderPlaced {
                    order_id: uuid::Uuid::new_v4().to_string(),
                    handled_by: name,
                };
                ctx.respond(&placed).await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    // =============================================================================
    // INTEGRATION TESTS: REQUEST / RESPONSE
    // =============================================================================

    #[tokio::test]
    async fn test_requests_load_shared_across_instances() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("gateway");
        let gateway = service(&broker, "gateway");
        let orders_a = service(&broker, "orders");
        let orders_b = service(&broker, "orders");
        let topic = orders_topic();

        start_orders_instance(&orders_a, &topic, "a").await;
        start_orders_instance(&orders_b, &topic, "b").await;

        let mut handled_by: HashMap<String, usize> = HashMap::new();
        for quantity in 1..=10 {
            let placed: OrderPlaced = gateway.request(&topic, &place_order(quantity)).await.unwrap();
            *handled_by.entry(placed.handled_by).or_default() += 1;
        }

        assert_eq!(handled_by.get("a"), Some(&5));
        assert_eq!(handled_by.get("b"), Some(&5));
    }

    #[tokio::test]
    async fn test_application_error_crosses_services() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("gateway");
        let gateway = service(&broker, "gateway");
        let orders = service(&broker, "orders");
        let topic = orders_topic();
        start_orders_instance(&orders, &topic, "a").await;

        let err = gateway
            .request::<_, OrderPlaced>(&topic, &place_order(0))
            .await
            .unwrap_err();

        assert!(err.is_application());
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[tokio::test]
    async fn test_unsubscribed_service_times_out() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("gateway");
        let gateway = service(&broker, "gateway");
        let orders = service(&broker, "orders");
        let topic = orders_topic();

        start_orders_instance(&orders, &topic, "a").await;
        let ids: Vec<_> = orders.active_subscriptions().into_iter().map(|s| s.id).collect();
        orders.unsubscribe(&ids).await.unwrap();

        let err = gateway
            .request::<_, OrderPlaced>(&topic, &place_order(1))
            .await
            .unwrap_err();

        assert!(matches!(err, BusError::Timeout { .. }));
        assert_eq!(broker.stats().active_subscriptions, 0);
    }

    // =============================================================================
    // INTEGRATION TESTS: PUBLISH / LISTEN
    // =============================================================================

    #[tokio::test]
    async fn test_each_group_handles_publish_once() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("gateway");
        let gateway = service(&broker, "gateway");
        let topic = orders_topic();

        let orders_handled = Arc::new(AtomicUsize::new(0));
        let audit_handled = Arc::new(AtomicUsize::new(0));

        for (group, counter) in [
            ("orders", &orders_handled),
            ("orders", &orders_handled),
            ("audit", &audit_handled),
        ] {
            let counter = Arc::clone(counter);
            service(&broker, group)
                .subscribe(&topic.req().unwrap(), move |_ctx: Context| {
                    let counter = Arc::clone(&counter);
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .await
                .unwrap();
        }

        for quantity in 0..6 {
            gateway.publish(&topic, &place_order(quantity)).await.unwrap();
        }
        sleep(Duration::from_millis(100)).await;

        assert_eq!(orders_handled.load(Ordering::SeqCst), 6);
        assert_eq!(audit_handled.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_listener_observes_requests_and_replies() {
        hub_telemetry::init_test_logging();

        let broker = InMemoryTransport::new("gateway");
        let gateway = service(&broker, "gateway");
        let orders = service(&broker, "orders");
        let audit = service(&broker, "audit");
        let topic = orders_topic();
        start_orders_instance(&orders, &topic, "a").await;

        let (tx, mut rx) = mpsc::channel(8);
        for subject in [topic.req().unwrap(), topic.res_wildcard().unwrap()] {
            let tx = tx.clone();
            audit
                .listen(&subject, move |ctx: Context| {
                    let tx = tx.clone();
                    async move {
                        tx.send((ctx.envelope().is_response, ctx.is_replyable()))
                            .await
                            .unwrap();
                    }
                })
                .await
                .unwrap();
        }

        let _: OrderPlaced = gateway.request(&topic, &place_order(3)).await.unwrap();

        let mut observed = Vec::new();
        for _ in 0..2 {
            let seen = timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timed out")
                .expect("observation");
            observed.push(seen);
        }
        observed.sort();

        // Request then response; neither is replyable for a listener.
        assert_eq!(observed, vec![(false, false), (true, false)]);
    }
}
