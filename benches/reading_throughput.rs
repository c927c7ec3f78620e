use chrono::{Duration, TimeZone};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use iot_streams::engine::{DEFAULT_STREAM_IRI, ResultConsumer};
use iot_streams::{DEFAULT_TIME_ZONE, RSPEngine, Reading, ReadingMerger, SsnModeller};
use std::sync::Arc;
use std::time::Instant;

/// Readings one minute apart, delivered newest first
fn generate_readings(count: usize) -> Vec<Reading> {
    let base = DEFAULT_TIME_ZONE
        .with_ymd_and_hms(2016, 1, 31, 0, 0, 0)
        .unwrap();
    (0..count)
        .rev()
        .map(|i| {
            Reading::wireless_tag(
                (i % 4) as u32,
                base + Duration::minutes(i as i64),
                15.0 + (i % 10) as f64,
                40.0,
            )
        })
        .collect()
}

/// Benchmark: merge and order readings from several sources
fn benchmark_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");
    group.sample_size(20);

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let readings = generate_readings(count);
            b.iter(|| {
                let merger = ReadingMerger::new();
                for chunk in readings.chunks(count / 4) {
                    merger.extend(chunk.to_vec()).unwrap();
                }
                let mut seen = 0;
                merger
                    .done(|r| {
                        black_box(r);
                        seen += 1;
                        Ok(())
                    })
                    .unwrap();
                seen
            });
        });
    }

    group.finish();
}

/// Benchmark: model readings and put them on a stream with one query
fn benchmark_model_and_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("model_and_put");
    group.sample_size(10);

    let query = r#"
        REGISTER QUERY all AS
        SELECT ?s ?p ?o
        FROM STREAM <http://iotstreams> [RANGE 10m STEP 5m]
        WHERE { ?s ?p ?o }
    "#;

    for count in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let mut readings = generate_readings(count);
            readings.reverse();
            b.iter_custom(|iters| {
                let mut total = std::time::Duration::ZERO;
                for _ in 0..iters {
                    let mut engine = RSPEngine::new(DEFAULT_STREAM_IRI);
                    let consumer: ResultConsumer = Arc::new(|result| {
                        black_box(result.map(|w| w.rows.len()).unwrap_or(0));
                    });
                    engine.register_query("all", query, consumer).unwrap();
                    let mut modeller = SsnModeller::new();

                    let start = Instant::now();
                    for reading in &readings {
                        let graph = modeller.model(reading).unwrap();
                        engine.put(reading.timestamp_millis(), &graph).unwrap();
                    }
                    engine.close_stream().unwrap();
                    engine.shutdown().unwrap();
                    total += start.elapsed();
                }
                total
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_merge, benchmark_model_and_put);
criterion_main!(benches);
