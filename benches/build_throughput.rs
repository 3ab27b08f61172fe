//! Benchmarks for the hot paths of a sector build: name parsing and
//! streaming stats accumulation.
//!
//! Run with:
//!   cargo bench --bench build_throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use sectordb::name_parser::parse_system_name;
use sectordb::sector_stats::SectorStatsAccumulator;
use sectordb::system_record::{Coords, SystemRecord};

fn synthetic_records(n: usize) -> Vec<SystemRecord> {
    (0..n)
        .map(|i| {
            let name = if i % 10 == 0 {
                // Roughly the non-standard share seen on real catalogs.
                format!("Catalog Star {i}")
            } else {
                format!("Sector{} AB-C d{}", i % 97, i)
            };
            SystemRecord {
                name,
                coords: Some(Coords::new(i as f64, (i % 31) as f64, -(i as f64) / 3.0)),
                extra: serde_json::Map::new(),
            }
        })
        .collect()
}

fn bench_name_parsing(c: &mut Criterion) {
    let names: Vec<String> = synthetic_records(10_000)
        .into_iter()
        .map(|r| r.name)
        .collect();

    let mut group = c.benchmark_group("name_parsing");
    group.throughput(Throughput::Elements(names.len() as u64));
    group.bench_function("parse_10k_names", |b| {
        b.iter(|| {
            let mut standard = 0usize;
            for name in &names {
                if parse_system_name(black_box(name)).is_some() {
                    standard += 1;
                }
            }
            black_box(standard)
        })
    });
    group.finish();
}

fn bench_accumulation(c: &mut Criterion) {
    let records = synthetic_records(10_000);

    let mut group = c.benchmark_group("accumulation");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("accumulate_10k_records", |b| {
        b.iter(|| {
            let mut acc = SectorStatsAccumulator::new();
            for record in &records {
                acc.accumulate(record.clone());
            }
            black_box(acc.finalize(10))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_name_parsing, bench_accumulation);
criterion_main!(benches);
