//! # IPC Flows
//!
//! JSON requests from authenticated clients through `HistoryRequestHandler`.
//!
//! ## Flows Tested
//!
//! 1. **Cursor session**: getCursor, first, nextN, seek and release as JSON
//! 2. **Envelope identity**: a cursor is bound to the envelope's client id
//! 3. **Manage capability**: retention rules set by an admin govern ingest

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hub_history::test_utils::MockTimeSource;
    use hub_history::{
        HistoryConfig, HistoryErrorType, HistoryRequestHandler, HistoryService, IngestApi,
        ManageHistoryRequest, ManageHistoryResponse, ReadHistoryRequest, ReadHistoryResponse,
    };
    use serde_json::json;
    use shared_buckets::InMemoryBucketStore;
    use shared_types::{ClientRole, RequestEnvelope, ThingValue};

    fn handler() -> (Arc<HistoryService>, HistoryRequestHandler) {
        let service = Arc::new(
            HistoryService::with_time_source(
                Arc::new(InMemoryBucketStore::new()),
                HistoryConfig::default(),
                Arc::new(MockTimeSource::new(50_000)),
            )
            .unwrap(),
        );
        service.start().unwrap();
        let ingest = service.add_history();
        for created in [1000, 2000, 3000, 4000] {
            ingest
                .add_message(
                    ThingValue::event("ag1", "th1", "temp", created.to_string())
                        .with_created(created),
                )
                .unwrap();
        }
        (Arc::clone(&service), HistoryRequestHandler::new(service))
    }

    fn read(value: serde_json::Value) -> ReadHistoryRequest {
        serde_json::from_value(value).unwrap()
    }

    fn read_as(
        handler: &HistoryRequestHandler,
        client: &str,
        request: ReadHistoryRequest,
    ) -> Result<ReadHistoryResponse, hub_history::HistoryErrorPayload> {
        let envelope = RequestEnvelope::new(client, ClientRole::Viewer, request);
        let response = handler.handle_read(&envelope);
        assert_eq!(response.correlation_id, envelope.correlation_id);
        response.payload
    }

    fn cursor_key(response: ReadHistoryResponse) -> String {
        match response {
            ReadHistoryResponse::Cursor { cursor_key } => cursor_key,
            other => panic!("expected cursor, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cursor_session_over_json() {
        let (service, handler) = handler();

        let key = cursor_key(
            read_as(
                &handler,
                "viewer1",
                read(json!({"method": "getCursor", "agentId": "ag1", "thingId": "th1", "name": "temp"})),
            )
            .unwrap(),
        );

        let first = read_as(&handler, "viewer1", read(json!({"method": "first", "cursorKey": key})))
            .unwrap();
        match first {
            ReadHistoryResponse::Value { value, valid } => {
                assert!(valid);
                assert_eq!(value.unwrap().created_msec, 1000);
            }
            other => panic!("expected value, got {other:?}"),
        }

        let batch = read_as(
            &handler,
            "viewer1",
            read(json!({"method": "nextN", "cursorKey": key, "limit": 2})),
        )
        .unwrap();
        match batch {
            ReadHistoryResponse::Batch(batch) => {
                let created: Vec<u64> = batch.values.iter().map(|tv| tv.created_msec).collect();
                assert_eq!(created, vec![2000, 3000]);
                assert!(batch.items_remaining);
            }
            other => panic!("expected batch, got {other:?}"),
        }

        let seek = read_as(
            &handler,
            "viewer1",
            read(json!({"method": "seek", "cursorKey": key, "timestampMsec": 2500})),
        )
        .unwrap();
        assert!(matches!(
            seek,
            ReadHistoryResponse::Value { value: Some(ref tv), valid: true } if tv.created_msec == 3000
        ));

        let released = read_as(&handler, "viewer1", read(json!({"method": "release", "cursorKey": key})))
            .unwrap();
        assert_eq!(released, ReadHistoryResponse::Released);

        let gone = read_as(&handler, "viewer1", read(json!({"method": "next", "cursorKey": key})))
            .unwrap_err();
        assert_eq!(gone.error_type, HistoryErrorType::CursorNotFound);
        assert!(gone.is_cursor_lost());

        service.stop().unwrap();
    }

    #[tokio::test]
    async fn test_cursor_bound_to_envelope_client() {
        let (service, handler) = handler();

        let key = cursor_key(
            read_as(
                &handler,
                "viewer1",
                ReadHistoryRequest::GetCursor {
                    agent_id: "ag1".into(),
                    thing_id: "th1".into(),
                    name: None,
                },
            )
            .unwrap(),
        );

        let err = read_as(
            &handler,
            "intruder",
            ReadHistoryRequest::First { cursor_key: key.clone() },
        )
        .unwrap_err();
        assert_eq!(err.error_type, HistoryErrorType::CursorUnauthorized);

        // The owner's cursor is untouched
        assert!(read_as(&handler, "viewer1", ReadHistoryRequest::Last { cursor_key: key }).is_ok());
        service.stop().unwrap();
    }

    #[tokio::test]
    async fn test_response_payload_serializes() {
        let (service, handler) = handler();

        let envelope = RequestEnvelope::new(
            "viewer1",
            ClientRole::Viewer,
            ReadHistoryRequest::GetLatest {
                agent_id: "ag1".into(),
                thing_id: "th1".into(),
                names: vec!["temp".into()],
            },
        );
        let response = handler.handle_read(&envelope);
        let json = serde_json::to_value(&response.payload).unwrap();
        assert_eq!(json["Ok"]["type"], "latest");
        assert_eq!(json["Ok"]["values"]["temp"]["createdMsec"], 4000);

        service.stop().unwrap();
    }

    #[tokio::test]
    async fn test_admin_rules_govern_ingest() {
        let (service, handler) = handler();

        let set: ManageHistoryRequest = serde_json::from_value(json!({
            "method": "setRetentionRules",
            "rules": {"temp": [{"agentId": "ag2", "retain": true}]}
        }))
        .unwrap();

        // Viewers cannot manage
        let denied = handler.handle_manage(&RequestEnvelope::new("viewer1", ClientRole::Viewer, set.clone()));
        assert_eq!(
            denied.payload.unwrap_err().error_type,
            HistoryErrorType::PermissionDenied
        );

        let updated = handler.handle_manage(&RequestEnvelope::new("admin1", ClientRole::Admin, set));
        assert_eq!(
            updated.payload.unwrap(),
            ManageHistoryResponse::RulesUpdated { count: 1 }
        );

        let ingest = service.add_history();
        ingest
            .add_message(ThingValue::event("ag1", "th1", "temp", "x").with_created(5000))
            .unwrap();
        ingest
            .add_message(ThingValue::event("ag2", "th1", "temp", "y").with_created(5000))
            .unwrap();
        let snapshot = service.metrics().snapshot();
        assert_eq!(snapshot.values_dropped, 1);
        assert_eq!(snapshot.values_stored, 5);

        let rule = handler.handle_manage(&RequestEnvelope::new(
            "admin1",
            ClientRole::Admin,
            ManageHistoryRequest::GetRetentionRule {
                agent_id: "ag2".into(),
                thing_id: "th9".into(),
                name: "temp".into(),
            },
        ));
        match rule.payload.unwrap() {
            ManageHistoryResponse::Rule { rule: Some(rule) } => {
                assert_eq!(rule.name, "temp");
                assert!(rule.retain);
            }
            other => panic!("expected rule, got {other:?}"),
        }

        service.stop().unwrap();
    }
}
