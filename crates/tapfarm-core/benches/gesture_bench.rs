//! Criterion benchmarks for gesture interpolation and script building.
//!
//! A smoothed swipe is the hot path of the controller: every drag turns
//! into dozens of interpolated points, each rendered as a protocol line.
//!
//! Run with:
//! ```bash
//! cargo bench --package tapfarm-core --bench gesture_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tapfarm_core::{interpolate, Point, TouchScript};

fn bench_interpolate(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolate");
    for step in [5u32, 20, 50] {
        let points = [Point::new(0, 0), Point::new(1080, 1920)];
        group.bench_with_input(BenchmarkId::from_parameter(step), &step, |b, &step| {
            b.iter(|| interpolate(black_box(&points), black_box(step)));
        });
    }
    group.finish();
}

fn bench_build_swipe_script(c: &mut Criterion) {
    let points = interpolate(&[Point::new(0, 0), Point::new(1080, 1920)], 10);

    c.bench_function("build_swipe_script", |b| {
        b.iter(|| {
            let mut script = TouchScript::new();
            script.down(0, points[0].x, points[0].y, 50);
            script.commit();
            for p in &points {
                script.move_to(0, p.x, p.y, 50);
                script.wait(5);
                script.commit();
            }
            script.up(0);
            black_box(script.finish())
        });
    });
}

criterion_group!(benches, bench_interpolate, bench_build_swipe_script);
criterion_main!(benches);
