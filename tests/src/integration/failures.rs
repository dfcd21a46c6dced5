//! Malformed input, configuration errors and buffer loss.

#[cfg(test)]
mod tests {
    use crate::harness::{Pipeline, BROKER};
    use filter_runtime::{run_filter, RunOutcome, RunnerError};
    use serde_json::json;
    use shared_bus::InMemoryBroker;
    use std::io::Write;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_malformed_payloads_do_not_stop_the_pipeline() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "logger"),
            ("EIP_IN", &format!("{BROKER},in")),
            ("EIP_OUT", &format!("{BROKER},out")),
        ]);

        pipeline.broker().enqueue("in", b"{not json".to_vec());
        pipeline.broker().enqueue("in", br#"{"id":"x"}"#.to_vec());
        let good = pipeline.send("in", json!({"ok": true}));

        let out = pipeline.collect("out", 1).await;
        assert_eq!(out[0].id, good.id);

        pipeline.settle(&["in"]).await;
        assert_eq!(pipeline.broker().dead_lettered_count(), 2);
        let outcomes = pipeline.stop().await;
        let RunOutcome::Filtered(summary) = outcomes[0].as_ref().unwrap() else {
            panic!("expected runner outcome");
        };
        assert_eq!(summary.metrics.rejected, 2);
    }

    #[tokio::test]
    async fn test_fail_policy_leaves_message_for_redelivery() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "logger"),
            ("EIP_IN", &format!("{BROKER},in")),
            ("EIP_OUT", &format!("{BROKER},out")),
            ("EIP_DECODE_POLICY", "fail"),
        ]);
        let broker = pipeline.broker().clone();
        broker.enqueue("in", b"garbage".to_vec());

        let outcomes = pipeline.finished().await;
        assert!(matches!(outcomes[0], Err(RunnerError::Decode(_))));
        assert_eq!(broker.unacked_count(), 0);
        assert_eq!(broker.queue_depth("in"), 1);
        assert_eq!(broker.dead_lettered_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_document_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"selector":[],"count":2}}"#).unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = Pipeline::config(&[
            ("EIP_FILTER", "aggregator"),
            ("EIP_IN", &format!("{BROKER},in")),
            ("EIP_OUT", &format!("{BROKER},out")),
            ("EIP_CONFIG", &path),
        ])
        .unwrap();

        let broker = InMemoryBroker::new();
        let err = run_filter(config, Arc::new(broker.clone()), std::future::pending())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Configuration(_)));
        assert!(!broker.has_queue("in"));
    }

    #[tokio::test]
    async fn test_buffered_messages_reported_at_shutdown() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "aggregator"),
            ("EIP_IN", &format!("{BROKER},in")),
            ("EIP_OUT", &format!("{BROKER},out")),
            ("EIP_CONFIG_JSON", r#"{"selector":["n"],"count":2}"#),
        ]);
        for n in 0..5 {
            pipeline.send("in", json!({"n": n}));
        }

        let batches = pipeline.collect("out", 2).await;
        assert_eq!(batches.len(), 2);
        pipeline.settle(&["in"]).await;

        let outcomes = pipeline.stop().await;
        let RunOutcome::Filtered(summary) = outcomes[0].as_ref().unwrap() else {
            panic!("expected runner outcome");
        };
        assert_eq!(summary.discarded, 1);
        assert_eq!(summary.metrics.acknowledged, 5);
    }
}
