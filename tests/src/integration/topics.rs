//! Topic exchanges: fan-out to every matching binding.

#[cfg(test)]
mod tests {
    use crate::harness::{Pipeline, BROKER};
    use serde_json::json;

    #[tokio::test]
    async fn test_topic_fan_out_by_routing_key() {
        let mut pipeline = Pipeline::new();
        let exchange = format!("{BROKER},order-events,topic");

        // Two wire taps subscribe with different binding keys.
        pipeline.spawn(&[
            ("EIP_FILTER", "logger"),
            ("EIP_IN", &exchange),
            ("EIP_IN_ROUTING_KEY", "order.*"),
            ("EIP_OUT", &format!("{BROKER},all-orders")),
        ]);
        pipeline.spawn(&[
            ("EIP_FILTER", "logger"),
            ("EIP_IN", &exchange),
            ("EIP_IN_ROUTING_KEY", "order.cancelled"),
            ("EIP_OUT", &format!("{BROKER},cancellations")),
        ]);
        // The publisher: a logger that forwards from a queue onto the topic.
        pipeline.spawn(&[
            ("EIP_FILTER", "logger"),
            ("EIP_IN", &format!("{BROKER},incoming")),
            ("EIP_OUT", &exchange),
            ("EIP_OUT_ROUTING_KEY", "order.created"),
        ]);
        pipeline.await_bindings("order-events", 2).await;

        let created = pipeline.send("incoming", json!({"order": 1}));

        let all = pipeline.collect("all-orders", 1).await;
        assert_eq!(all[0].id, created.id);

        pipeline.settle(&["incoming"]).await;
        assert_eq!(pipeline.broker().queue_depth("cancellations"), 0);
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_router_output_on_topic() {
        let mut pipeline = Pipeline::new();
        let alerts = format!("{BROKER},alerts,topic");

        pipeline.spawn(&[
            ("EIP_FILTER", "logger"),
            ("EIP_IN", &alerts),
            ("EIP_IN_ROUTING_KEY", "#"),
            ("EIP_OUT", &format!("{BROKER},alert-log")),
        ]);
        pipeline.spawn(&[
            ("EIP_FILTER", "router"),
            ("EIP_IN", &format!("{BROKER},metrics")),
            ("EIP_OUT", &alerts),
            ("EIP_OUT_ROUTING_KEY", "cpu.high"),
            (
                "EIP_CONFIG_JSON",
                r#"{"criterias":[{"condition":"message.data.cpu > 90","destination":"alerts"}]}"#,
            ),
        ]);
        pipeline.await_bindings("alerts", 1).await;

        pipeline.send("metrics", json!({"cpu": 97}));
        pipeline.send("metrics", json!({"cpu": 12}));

        let logged = pipeline.collect("alert-log", 1).await;
        assert_eq!(logged[0].data, Some(json!({"cpu": 97})));

        pipeline.settle(&["metrics"]).await;
        assert_eq!(pipeline.broker().queue_depth("alert-log"), 0);
        pipeline.stop().await;
    }
}
