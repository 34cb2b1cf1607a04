//! Benchmarks for BVH construction and collision testing.
//!
//! Run with: cargo bench -p mesh-collide
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-collide -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-collide -- --baseline main

#![allow(missing_docs, clippy::cast_possible_truncation)]

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_collide::{BuildConfig, Bvh, Matrix4, Point3, Triangle, Vector3, test_collision};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Test Mesh Generation
// =============================================================================

/// Scatter small triangles through a cube of the given half-extent.
fn random_triangles(count: usize, extent: f64, seed: u64) -> Vec<Triangle> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            let base = Point3::new(
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
                rng.gen_range(-extent..extent),
            );
            Triangle::new(
                base,
                Point3::new(base.x + rng.gen_range(0.1..0.5), base.y, base.z),
                Point3::new(
                    base.x,
                    base.y + rng.gen_range(0.1..0.5),
                    base.z + rng.gen_range(0.1..0.5),
                ),
            )
        })
        .collect()
}

// =============================================================================
// Construction Benchmarks
// =============================================================================

fn bench_bvh_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("BvhBuild");
    group.sample_size(10);

    let config = BuildConfig::default();

    for count in [1_000usize, 10_000] {
        let triangles = random_triangles(count, 10.0, 42);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(
            BenchmarkId::new("serial", format!("{count}_tri")),
            &triangles,
            |b, triangles| {
                b.iter(|| Bvh::build(black_box(triangles), black_box(&config)));
            },
        );

        group.bench_with_input(
            BenchmarkId::new("parallel", format!("{count}_tri")),
            &triangles,
            |b, triangles| {
                b.iter(|| Bvh::build_parallel(black_box(triangles), black_box(&config)));
            },
        );
    }

    group.finish();
}

// =============================================================================
// Collision Benchmarks
// =============================================================================

fn bench_collision_test(c: &mut Criterion) {
    let mut group = c.benchmark_group("CollisionTest");
    group.sample_size(10);

    let config = BuildConfig::default();
    let triangles_a = random_triangles(5_000, 10.0, 1);
    let triangles_b = random_triangles(5_000, 10.0, 2);

    let mut first = Bvh::build(&triangles_a, &config).expect("build first");
    let mut second = Bvh::build(&triangles_b, &config).expect("build second");

    group.throughput(Throughput::Elements(
        (triangles_a.len() + triangles_b.len()) as u64,
    ));

    let identity = Matrix4::identity();
    group.bench_function("overlapping_5k", |b| {
        b.iter(|| {
            first.reset_collision_flags();
            second.reset_collision_flags();
            test_collision(
                black_box(&mut first),
                black_box(&identity),
                black_box(&mut second),
                black_box(&identity),
            );
        });
    });

    // Roots separate on the first overlap test, so this measures the
    // prune fast path plus the flag reset.
    let far = Matrix4::new_translation(&Vector3::new(1_000.0, 0.0, 0.0));
    group.bench_function("disjoint_5k", |b| {
        b.iter(|| {
            first.reset_collision_flags();
            second.reset_collision_flags();
            test_collision(
                black_box(&mut first),
                black_box(&identity),
                black_box(&mut second),
                black_box(&far),
            );
        });
    });

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_bvh_build, bench_collision_test);
criterion_main!(benches);
