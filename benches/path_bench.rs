// Benchmark for circle path generation and envelope encoding
// Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use krusty_motion::envelope::Envelope;
use krusty_motion::gcode;
use krusty_motion::path::{Point, circle_path};

fn bench_circle_path(c: &mut Criterion) {
    c.bench_function("circle_path 10k points", |b| {
        b.iter(|| {
            let path = circle_path(Point::new(60.0, 60.0), 25.0, 10_000).unwrap();
            assert_eq!(path.len(), 10_001);
        });
    });
}

fn bench_encode_moves(c: &mut Criterion) {
    let path = circle_path(Point::new(60.0, 60.0), 25.0, 1_000).unwrap();
    c.bench_function("encode 1k G1 envelopes", |b| {
        b.iter(|| {
            let mut bytes = 0;
            for point in &path {
                bytes += Envelope::script(&gcode::linear_move(*point)).encode().unwrap().len();
            }
            assert!(bytes > 0);
        });
    });
}

criterion_group!(benches, bench_circle_path, bench_encode_moves);
criterion_main!(benches);
