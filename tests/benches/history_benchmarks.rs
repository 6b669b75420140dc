//! # Hub History Benchmarks
//!
//! | Area | Operation | Target |
//! |------|-----------|--------|
//! | Key codec | encode + parse one key | < 1µs |
//! | Ingest | batch of 100 values, one bucket write | < 1ms |
//! | Query | filtered scan over a mixed-name bucket | linear in skipped entries |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hub_history::test_utils::MockTimeSource;
use hub_history::{
    decode, encode, parse_key, HistoryConfig, HistoryService, IngestApi, ReadHistoryApi,
};
use shared_buckets::InMemoryBucketStore;
use shared_types::{ThingValue, ValueKind};
use std::sync::Arc;
use std::time::Duration;

const NOW: u64 = 10_000_000;

fn value(name: &str, created: u64) -> ThingValue {
    ThingValue::new(ValueKind::Event, "agent-1", "sensor-1", name, "21.5", "client-7")
        .with_created(created)
}

fn service() -> HistoryService {
    HistoryService::with_time_source(
        Arc::new(InMemoryBucketStore::new()),
        HistoryConfig::default(),
        Arc::new(MockTimeSource::new(NOW)),
    )
    .expect("history service")
}

// ============================================================================
// Key codec
// ============================================================================

fn bench_key_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("history-key-codec");
    let tv = value("temperature", 1_700_000_000_000);

    group.bench_function("encode", |b| b.iter(|| black_box(encode(black_box(&tv)))));

    let (key, data) = encode(&tv);
    group.bench_function("parse_key", |b| {
        b.iter(|| black_box(parse_key(black_box(&key)).is_ok()))
    });
    group.bench_function("decode", |b| {
        b.iter(|| black_box(decode("agent-1/sensor-1", black_box(&key), &data).is_ok()))
    });

    group.finish();
}

// ============================================================================
// Ingest
// ============================================================================

fn bench_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("history-ingest");
    group.measurement_time(Duration::from_secs(5));

    for size in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("add_messages", size), &size, |b, &size| {
            let service = service();
            let mut created = 0u64;
            b.iter(|| {
                let batch: Vec<ThingValue> = (0..size)
                    .map(|_| {
                        created += 1;
                        value("temperature", created)
                    })
                    .collect();
                service
                    .add_history()
                    .add_messages(batch)
                    .expect("ingest");
            });
        });
    }

    group.finish();
}

// ============================================================================
// Filtered scans
// ============================================================================

fn bench_filtered_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("history-filtered-scan");
    group.measurement_time(Duration::from_secs(5));

    // One matching name per `stride` entries
    for stride in [1u64, 10, 100] {
        let service = service();
        let values: Vec<ThingValue> = (1..=5_000u64)
            .map(|i| {
                let name = if i % stride == 0 { "temperature" } else { "humidity" };
                value(name, i)
            })
            .collect();
        service
            .add_history()
            .add_messages(values)
            .expect("seed history");

        let matches = 5_000 / stride;
        group.throughput(Throughput::Elements(matches));
        group.bench_with_input(BenchmarkId::new("next_n", stride), &stride, |b, _| {
            let reader = service.read_history();
            b.iter(|| {
                let key = reader
                    .get_cursor("bench", "agent-1", "sensor-1", Some("temperature"))
                    .expect("cursor");
                reader.first("bench", &key).expect("first");
                let batch = reader.next_n("bench", &key, 1000).expect("next_n");
                reader.release("bench", &key).expect("release");
                black_box(batch.values.len())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_codec, bench_ingest, bench_filtered_scan);
criterion_main!(benches);
