//! Multi-stage pipelines over queues.

#[cfg(test)]
mod tests {
    use crate::harness::{Pipeline, BROKER};
    use filter_runtime::RunOutcome;
    use serde_json::json;

    fn pipe(name: &str) -> String {
        format!("{BROKER},{name}")
    }

    #[tokio::test]
    async fn test_router_then_translator() {
        let mut pipeline = Pipeline::new();
        let readings = pipe("readings");
        let hot = pipe("hot");
        let cold = pipe("cold");
        let hot_celsius = pipe("hot-celsius");

        pipeline.spawn(&[
            ("EIP_FILTER", "content-based-router"),
            ("EIP_IN", &readings),
            ("EIP_OUT", &format!("{hot};{cold}")),
            (
                "EIP_CONFIG_JSON",
                r#"{"criterias":[
                    {"condition":"message.data.fahrenheit >= 100","destination":"hot"}
                ],"default":"cold"}"#,
            ),
        ]);
        pipeline.spawn(&[
            ("EIP_FILTER", "translator"),
            ("EIP_IN", &hot),
            ("EIP_OUT", &hot_celsius),
            (
                "EIP_CONFIG_JSON",
                r#"{"celsius":"(data.fahrenheit - 32) * 5 / 9","probe":"data.probe"}"#,
            ),
        ]);

        let boiling = pipeline.send("readings", json!({"probe": "p1", "fahrenheit": 212}));
        pipeline.send("readings", json!({"probe": "p2", "fahrenheit": 50}));

        let translated = pipeline.collect("hot-celsius", 1).await;
        assert_eq!(translated.len(), 1);
        assert_eq!(translated[0].data, Some(json!({"celsius": 100, "probe": "p1"})));
        // Default envelope policy keeps the identity of the routed message.
        assert_eq!(translated[0].id, boiling.id);

        let cold_readings = pipeline.collect("cold", 1).await;
        assert_eq!(cold_readings[0].data, Some(json!({"probe": "p2", "fahrenheit": 50})));

        pipeline.settle(&["readings", "hot"]).await;
        let outcomes = pipeline.stop().await;
        assert!(outcomes.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_recipient_list_copies_to_every_match() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "recipient-list"),
            ("EIP_IN", &pipe("orders")),
            (
                "EIP_CONFIG_JSON",
                r#"{"criterias":[
                    {"condition":"message.data.total > 100","destination":"review"},
                    {"condition":"exists(message.data.coupon)","destination":"marketing"},
                    {"condition":"true","destination":"archive"}
                ]}"#,
            ),
        ]);

        let big = pipeline.send("orders", json!({"total": 250, "coupon": "SPRING"}));
        pipeline.send("orders", json!({"total": 20}));

        let archive = pipeline.collect("archive", 2).await;
        assert_eq!(archive.len(), 2);
        let review = pipeline.collect("review", 1).await;
        assert_eq!(review[0].id, big.id);
        let marketing = pipeline.collect("marketing", 1).await;
        assert_eq!(marketing[0].id, big.id);

        pipeline.settle(&["orders"]).await;
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_splitter_then_content_filter() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "splitter"),
            ("EIP_IN", &pipe("orders")),
            ("EIP_OUT", &pipe("parts")),
            ("EIP_SOURCE", "order-splitter"),
            ("EIP_CONFIG_JSON", r#"{"fields":["customer","shipping.address"]}"#),
        ]);
        pipeline.spawn(&[
            ("EIP_FILTER", "content-filter"),
            ("EIP_IN", &pipe("parts")),
            ("EIP_OUT", &pipe("public-parts")),
            ("EIP_CONFIG_JSON", r#"{"fieldsToRemove":["customer.ssn"]}"#),
        ]);

        let order = pipeline.send(
            "orders",
            json!({
                "customer": {"name": "Ada", "ssn": "000-00-0000"},
                "shipping": {"address": "1 Loop Rd"},
                "total": 9
            }),
        );

        let parts = pipeline.collect("public-parts", 2).await;
        assert_eq!(parts[0].data, Some(json!({"customer": {"name": "Ada"}})));
        assert_eq!(parts[1].data, Some(json!({"address": "1 Loop Rd"})));
        for part in &parts {
            assert_ne!(part.id, order.id);
            assert_eq!(part.source, "order-splitter");
        }

        pipeline.settle(&["orders", "parts"]).await;
        pipeline.stop().await;
    }

    #[tokio::test]
    async fn test_resequencer_then_aggregator() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "resequencer"),
            ("EIP_IN", &pipe("events")),
            ("EIP_OUT", &pipe("ordered")),
            ("EIP_CONFIG_JSON", r#"{"field":"data.seq","count":3}"#),
        ]);
        pipeline.spawn(&[
            ("EIP_FILTER", "aggregator"),
            ("EIP_IN", &pipe("ordered")),
            ("EIP_OUT", &pipe("batches")),
            ("EIP_CONFIG_JSON", r#"{"selector":["seq","value"],"count":3}"#),
        ]);

        for (seq, value) in [(3, "c"), (1, "a"), (2, "b")] {
            pipeline.send("events", json!({"seq": seq, "value": value}));
        }

        let batches = pipeline.collect("batches", 1).await;
        assert_eq!(
            batches[0].data,
            Some(json!({"aggregate": [
                {"seq": 1, "value": "a"},
                {"seq": 2, "value": "b"},
                {"seq": 3, "value": "c"}
            ]}))
        );
        assert_eq!(batches[0].source, "eip-filters/aggregator");

        pipeline.settle(&["events", "ordered"]).await;
        for outcome in pipeline.stop().await {
            let RunOutcome::Filtered(summary) = outcome.unwrap() else {
                panic!("expected runner outcomes");
            };
            assert_eq!(summary.metrics.flushes, 1);
            assert_eq!(summary.discarded, 0);
        }
    }

    #[tokio::test]
    async fn test_message_filter_then_receiver() {
        let mut pipeline = Pipeline::new();
        pipeline.spawn(&[
            ("EIP_FILTER", "message-filter"),
            ("EIP_IN", &pipe("payments")),
            ("EIP_OUT", &pipe("large-payments")),
            (
                "EIP_CONFIG_JSON",
                r#"{"rules":[
                    {"condition":"message.data.amount >= 1000"},
                    {"condition":"message.data.currency == 'EUR'"}
                ]}"#,
            ),
        ]);
        pipeline.spawn(&[
            ("EIP_FILTER", "receiver"),
            ("EIP_IN", &pipe("large-payments")),
        ]);

        pipeline.send("payments", json!({"amount": 5000, "currency": "EUR"}));
        pipeline.send("payments", json!({"amount": 5000, "currency": "USD"}));
        pipeline.send("payments", json!({"amount": 10, "currency": "EUR"}));

        pipeline.settle(&["payments", "large-payments"]).await;
        let outcomes = pipeline.stop().await;

        let RunOutcome::Filtered(gate) = outcomes[0].as_ref().unwrap() else {
            panic!("expected runner outcome");
        };
        assert_eq!(gate.metrics.consumed, 3);
        assert_eq!(gate.metrics.dropped, 2);
        assert_eq!(gate.metrics.published, 1);

        let RunOutcome::Filtered(sink) = outcomes[1].as_ref().unwrap() else {
            panic!("expected runner outcome");
        };
        assert_eq!(sink.metrics.consumed, 1);
        assert_eq!(sink.metrics.acknowledged, 1);
    }
}
