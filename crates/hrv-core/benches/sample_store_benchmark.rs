//! Append and snapshot costs of the sample window
//!
//! The append path runs once per incoming chunk and the detection task takes
//! a snapshot every period, so both have to stay cheap at full window size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hrv_core::{RingBuffer, SampleStore};

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_store_append");

    for &chunk_len in &[16usize, 128, 1024] {
        let chunk: Vec<f64> = (0..chunk_len).map(|i| (i as f64 * 0.1).sin()).collect();
        let mut store = SampleStore::new(500.0, 5.0).expect("valid store");

        group.bench_with_input(BenchmarkId::from_parameter(chunk_len), &chunk, |b, chunk| {
            b.iter(|| black_box(store.append(black_box(chunk))));
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut store = SampleStore::new(500.0, 5.0).expect("valid store");
    let signal: Vec<f64> = (0..5000).map(|i| (i as f64 * 0.01).cos()).collect();
    store.append(&signal);

    c.bench_function("sample_store_snapshot_full", |b| {
        b.iter(|| black_box(store.snapshot()))
    });
}

fn bench_ring_tail(c: &mut Criterion) {
    let mut buffer = RingBuffer::with_capacity(500);
    buffer.extend((0..1200).map(|i| i as f64));

    c.bench_function("ring_buffer_tail_5", |b| b.iter(|| black_box(buffer.tail(5))));
}

criterion_group!(benches, bench_append, bench_snapshot, bench_ring_tail);
criterion_main!(benches);
