//! # End-to-End History Tests
//!
//! ```text
//! [Thing] ──ValuePublished──→ [Event Bus] ──→ [HistoryBusAdapter]
//!                                                    │
//!                                                    ↓
//!                                  [AddHistory] ──→ bucket "{agent}/{thing}"
//!                                         │
//!                                         └──→ [LatestPropertiesCache]
//!                                                    │
//! [Client] ──getCursor/next──→ [ReadHistory] ←───────┘
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: values published on the bus are readable in order
//! 2. **Retention**: values dropped by policy never reach history or latest
//! 3. **Runtime**: the assembled hub stores, flushes and shuts down

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hub_history::test_utils::MockTimeSource;
    use hub_history::{
        HistoryBusAdapter, HistoryConfig, HistoryService, IngestApi, ManageHistoryApi,
        ReadHistoryApi, RetentionRule, RetentionRuleSet,
    };
    use hub_runtime::{HubConfig, HubRuntime};
    use shared_buckets::InMemoryBucketStore;
    use shared_bus::{EventPublisher, HubEvent, InMemoryEventBus};
    use shared_types::{ThingValue, EVENT_NAME_PROPS};
    use tokio::sync::watch;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    const NOW: u64 = 100_000;

    fn history() -> Arc<HistoryService> {
        let service = HistoryService::with_time_source(
            Arc::new(InMemoryBucketStore::new()),
            HistoryConfig::default(),
            Arc::new(MockTimeSource::new(NOW)),
        )
        .unwrap();
        Arc::new(service)
    }

    fn temp(created: u64, data: &str) -> ThingValue {
        ThingValue::event("ag1", "th1", "temp", data).with_created(created)
    }

    fn humidity(created: u64, data: &str) -> ThingValue {
        ThingValue::event("ag1", "th1", "humidity", data).with_created(created)
    }

    /// Publish events, close the bus and wait for the adapter to drain it.
    async fn deliver(service: &Arc<HistoryService>, events: Vec<HubEvent>) -> u64 {
        let bus = InMemoryEventBus::new();
        let adapter = HistoryBusAdapter::new(Arc::clone(service));
        let subscription = bus.subscribe(HistoryBusAdapter::subscription_filter());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { adapter.run(subscription, shutdown_rx).await });

        for event in events {
            bus.publish(event).await;
        }
        drop(bus);
        task.await.unwrap()
    }

    fn created(values: &[ThingValue]) -> Vec<u64> {
        values.iter().map(|tv| tv.created_msec).collect()
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_bus_values_readable_in_order() {
        let service = history();
        service.start().unwrap();

        let handled = deliver(
            &service,
            vec![
                HubEvent::ValuePublished(temp(1000, "20")),
                HubEvent::ValuePublished(humidity(1500, "40")),
                HubEvent::ValuesPublished(vec![temp(3000, "22"), temp(2000, "21")]),
            ],
        )
        .await;
        assert_eq!(handled, 3);

        let reader = service.read_history();
        let key = reader
            .get_cursor("user1", "ag1", "th1", Some("temp"))
            .unwrap();

        let first = reader.first("user1", &key).unwrap().unwrap();
        assert_eq!(first.created_msec, 1000);
        assert_eq!(first.data, b"20".to_vec());

        let batch = reader.next_n("user1", &key, 10).unwrap();
        assert_eq!(created(&batch.values), vec![2000, 3000]);
        assert!(!batch.items_remaining);

        // Unfiltered cursor sees every name in time order
        let all = reader.get_cursor("user1", "ag1", "th1", None).unwrap();
        reader.first("user1", &all).unwrap();
        let rest = reader.next_n("user1", &all, 10).unwrap();
        assert_eq!(created(&rest.values), vec![1500, 2000, 3000]);

        reader.release("user1", &key).unwrap();
        reader.release("user1", &all).unwrap();
        assert_eq!(service.open_cursors(), 0);
        service.stop().unwrap();
    }

    #[tokio::test]
    async fn test_bus_values_update_latest() {
        let service = history();
        service.start().unwrap();

        deliver(
            &service,
            vec![
                HubEvent::ValuePublished(temp(2000, "21")),
                // Older value arriving late does not replace the newer one
                HubEvent::ValuePublished(temp(1000, "19")),
                HubEvent::ValuePublished(
                    ThingValue::event("ag1", "th1", EVENT_NAME_PROPS, r#"{"humidity":"45","on":true}"#)
                        .with_created(1500),
                ),
            ],
        )
        .await;

        let latest = service
            .read_history()
            .get_latest("ag1", "th1", &[])
            .unwrap();
        assert_eq!(latest["temp"].data, b"21".to_vec());
        assert_eq!(latest["humidity"].data, b"45".to_vec());
        assert_eq!(latest["on"].data, b"true".to_vec());

        let only_temp = service
            .read_history()
            .get_latest("ag1", "th1", &["temp".to_string()])
            .unwrap();
        assert_eq!(only_temp.len(), 1);
        service.stop().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_value_does_not_stop_ingest() {
        let service = history();
        service.start().unwrap();

        let bad = ThingValue::event("ag1", "", "temp", "1").with_created(500);
        let handled = deliver(
            &service,
            vec![
                HubEvent::ValuePublished(bad),
                HubEvent::ValuePublished(temp(1000, "20")),
            ],
        )
        .await;
        assert_eq!(handled, 2);

        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.values_rejected, 1);
        assert_eq!(snapshot.values_stored, 1);
        service.stop().unwrap();
    }

    // =============================================================================
    // RETENTION
    // =============================================================================

    #[tokio::test]
    async fn test_retention_filters_bus_values() {
        let service = history();
        service.start().unwrap();

        let mut rules = RetentionRuleSet::new();
        rules.insert(
            "temp".to_string(),
            vec![RetentionRule::new("temp", "ag1", "", true)],
        );
        service.manage_history().set_retention_rules(rules).unwrap();

        deliver(
            &service,
            vec![
                HubEvent::ValuePublished(temp(1000, "20")),
                HubEvent::ValuePublished(humidity(1100, "40")),
            ],
        )
        .await;

        let reader = service.read_history();
        let key = reader.get_cursor("user1", "ag1", "th1", None).unwrap();
        reader.first("user1", &key).unwrap();
        let batch = reader.next_n("user1", &key, 10).unwrap();
        assert!(batch.values.is_empty());

        let latest = reader.get_latest("ag1", "th1", &[]).unwrap();
        assert!(latest.contains_key("temp"));
        assert!(!latest.contains_key("humidity"));
        assert_eq!(service.metrics().snapshot().values_dropped, 1);
        service.stop().unwrap();
    }

    // =============================================================================
    // RUNTIME
    // =============================================================================

    #[tokio::test]
    async fn test_runtime_end_to_end() {
        let config = HubConfig {
            flush_interval: Duration::from_millis(50),
            ..HubConfig::default()
        };
        let hub = HubRuntime::new(config, None).unwrap();
        hub.start().unwrap();

        hub.bus()
            .publish(HubEvent::ValuePublished(temp(1000, "20")))
            .await;

        let history = hub.history();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let snapshot = history.metrics().snapshot();
                if snapshot.values_stored == 1 && snapshot.properties_flushed == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let reader = history.read_history();
        let key = reader.get_cursor("user1", "ag1", "th1", None).unwrap();
        assert_eq!(reader.last("user1", &key).unwrap().unwrap().data, b"20".to_vec());
        assert_eq!(history.latest().dirty_count(), 0);

        hub.shutdown().await.unwrap();
        assert!(history.is_stopped());
        assert!(history.add_history().add_message(temp(2000, "21")).is_err());
    }
}
