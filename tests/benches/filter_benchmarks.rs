//! # EIP Filter Benchmarks
//!
//! Per-message cost of the filter hot paths, without the broker:
//!
//! | Area | Operation |
//! |------|-----------|
//! | eip-01 Rule Engine | compile, evaluate |
//! | eip-02 Routing | single and multiple mode over growing tables |
//! | eip-03 Buffering | aggregator and resequencer batches |
//! | eip-04 Transformation | translator rewrite |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use eip_01_rule_engine::Condition;
use eip_02_routing::{RoutingMode, RoutingTable, Rule};
use eip_03_buffering::{AggregatorConfig, BufferingFilter, ResequencerConfig};
use eip_04_transformation::{EnvelopePolicy, Translator, TranslatorConfig};
use serde_json::json;
use shared_types::{EnvelopeIdentity, MessageEnvelope, MessageFilter};
use std::time::Duration;

fn reading(n: i64) -> MessageEnvelope {
    MessageEnvelope::new(
        "bench",
        "reading",
        json!({"sensor": {"id": n, "kind": "thermo"}, "temperature": n % 50, "unit": "C"}),
    )
}

// ============================================================================
// EIP-01: Rule Engine
// ============================================================================

fn bench_rule_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("eip-01-rule-engine");
    group.measurement_time(Duration::from_secs(5));

    let source = "message.data.temperature > 30 && lower(message.data.unit) == 'c' || !exists(message.data.sensor.id)";
    group.bench_function("compile", |b| {
        b.iter(|| black_box(Condition::compile(black_box(source)).is_ok()))
    });

    let condition = match Condition::compile(source) {
        Ok(condition) => condition,
        Err(e) => panic!("benchmark expression must compile: {e}"),
    };
    let message = reading(42);
    group.bench_function("evaluate", |b| {
        b.iter(|| black_box(condition.evaluate(black_box(&message))))
    });

    group.finish();
}

// ============================================================================
// EIP-02: Routing
// ============================================================================

fn table(rules: usize) -> RoutingTable {
    let rules = (0..rules)
        .map(|i| {
            let condition = match Condition::compile(&format!("message.data.temperature == {i}")) {
                Ok(condition) => condition,
                Err(e) => panic!("benchmark rule must compile: {e}"),
            };
            Rule {
                condition,
                destination: format!("q{i}"),
            }
        })
        .collect();
    match RoutingTable::new(rules, Some("fallback".into())) {
        Ok(table) => table,
        Err(e) => panic!("benchmark table must be valid: {e}"),
    }
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("eip-02-routing");
    let message = reading(49);

    for size in [1, 10, 50] {
        let table = table(size);
        group.throughput(Throughput::Elements(size as u64));
        for mode in [RoutingMode::Single, RoutingMode::Multiple] {
            group.bench_with_input(
                BenchmarkId::new(mode.as_str(), size),
                &table,
                |b, table| b.iter(|| black_box(table.route(mode, black_box(&message)).is_ok())),
            );
        }
    }

    group.finish();
}

// ============================================================================
// EIP-03: Buffering
// ============================================================================

fn bench_buffering(c: &mut Criterion) {
    let mut group = c.benchmark_group("eip-03-buffering");

    for count in [10, 100] {
        let messages: Vec<MessageEnvelope> = (0..count).rev().map(reading).collect();
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("aggregate", count), &messages, |b, batch| {
            b.iter(|| {
                let config = AggregatorConfig {
                    selector: vec![
                        "sensor.id".parse().unwrap_or_else(|e| panic!("{e}")),
                        "temperature".parse().unwrap_or_else(|e| panic!("{e}")),
                    ],
                    count: count as usize,
                };
                let identity = EnvelopeIdentity::for_filter("aggregator");
                let mut filter = BufferingFilter::aggregator(config, identity)
                    .unwrap_or_else(|e| panic!("{e}"));
                for message in batch {
                    black_box(filter.process(message.clone()).is_ok());
                }
            })
        });

        group.bench_with_input(BenchmarkId::new("resequence", count), &messages, |b, batch| {
            b.iter(|| {
                let config = ResequencerConfig {
                    field: "data.sensor.id".parse().unwrap_or_else(|e| panic!("{e}")),
                    count: count as usize,
                };
                let mut filter =
                    BufferingFilter::resequencer(config).unwrap_or_else(|e| panic!("{e}"));
                for message in batch {
                    black_box(filter.process(message.clone()).is_ok());
                }
            })
        });
    }

    group.finish();
}

// ============================================================================
// EIP-04: Transformation
// ============================================================================

fn bench_translator(c: &mut Criterion) {
    let mut group = c.benchmark_group("eip-04-transformation");

    let config = match TranslatorConfig::from_json(
        r#"{"fahrenheit":"message.data.temperature * 9 / 5 + 32","sensor":"message.data.sensor.id","kind":"upper(message.data.sensor.kind)"}"#,
    ) {
        Ok(config) => config,
        Err(e) => panic!("benchmark document must parse: {e}"),
    };
    let translator = Translator::new(
        config,
        EnvelopePolicy::Preserve,
        EnvelopeIdentity::for_filter("translator"),
    );
    let message = reading(7);
    group.bench_function("translate_data", |b| {
        b.iter(|| black_box(translator.translate_data(black_box(&message))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_rule_engine,
    bench_routing,
    bench_buffering,
    bench_translator
);
criterion_main!(benches);
