//! Benchmark suite for the output formatters.
//!
//! Isolates formatter performance from async runtime overhead.

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::{Duration, SystemTime};
use tilt_listener::{InfluxDbFormatter, JsonFormatter, OutputFormatter, Reading, TiltColor};

fn reading(label: &str) -> Reading {
    Reading {
        id: TiltColor::Black.id(),
        label: label.to_string(),
        temperature: 72,
        specific_gravity: 1.035,
        timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
    }
}

fn bench_formatters(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_reading");
    group.throughput(Throughput::Elements(1));

    let plain = reading("BLACK");
    let escaped = reading("Ale, batch=2");

    let json = JsonFormatter;
    group.bench_function("json", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(128);
            json.write(black_box(&plain), &mut out).unwrap();
            black_box(out)
        })
    });

    let influx = InfluxDbFormatter::new("tilt".to_string());
    group.bench_function("influxdb", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(128);
            influx.write(black_box(&plain), &mut out).unwrap();
            black_box(out)
        })
    });

    group.bench_function("influxdb_escaped_label", |b| {
        b.iter(|| {
            let mut out = Vec::with_capacity(128);
            influx.write(black_box(&escaped), &mut out).unwrap();
            black_box(out)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_formatters);
criterion_main!(benches);
