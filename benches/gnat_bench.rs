//! Benchmarks for GNAT construction and queries against a linear scan

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gnat::{DistanceMetric, Gnat, GnatConfig, LinearIndex, NearestNeighbors, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn create_random_points(n: usize, dim: usize, seed: u64) -> Vec<Point> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| Point::new((0..dim).map(|_| rng.gen::<f64>()).collect()))
        .collect()
}

fn benchmark_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("gnat_insert");
    group.sample_size(10);

    for size in [1000, 10000].iter() {
        let points = create_random_points(*size, 8, 1);

        group.bench_with_input(BenchmarkId::new("incremental", size), size, |b, _| {
            b.iter(|| {
                let mut index = Gnat::default();
                for p in &points {
                    index.add(p.clone()).unwrap();
                }
                index
            });
        });

        group.bench_with_input(BenchmarkId::new("bulk", size), size, |b, _| {
            b.iter(|| {
                let mut index = Gnat::default();
                index.add_list(points.clone()).unwrap();
                index
            });
        });
    }

    group.finish();
}

fn benchmark_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    for size in [1000, 10000, 50000].iter() {
        let points = create_random_points(*size, 8, 2);
        let queries = create_random_points(64, 8, 3);

        let mut tree = Gnat::with_metric(GnatConfig::default(), DistanceMetric::Euclidean).unwrap();
        tree.add_list(points.clone()).unwrap();
        let mut linear = LinearIndex::new(DistanceMetric::Euclidean);
        linear.add_list(points).unwrap();

        group.bench_with_input(BenchmarkId::new("gnat_knn10", size), size, |b, _| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % queries.len();
                tree.nearest_k(black_box(&queries[i]), black_box(10)).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("linear_knn10", size), size, |b, _| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % queries.len();
                linear.nearest_k(black_box(&queries[i]), black_box(10)).unwrap()
            });
        });

        group.bench_with_input(BenchmarkId::new("gnat_radius", size), size, |b, _| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % queries.len();
                tree.nearest_r(black_box(&queries[i]), black_box(0.3)).unwrap()
            });
        });
    }

    group.finish();
}

fn benchmark_batch(c: &mut Criterion) {
    let points = create_random_points(20000, 8, 4);
    let queries = create_random_points(256, 8, 5);
    let mut tree = Gnat::default();
    tree.add_list(points).unwrap();

    c.bench_function("gnat_batch_knn10_256", |b| {
        b.iter(|| tree.nearest_k_batch(black_box(&queries), 10).unwrap())
    });
}

criterion_group!(benches, benchmark_insert, benchmark_search, benchmark_batch);
criterion_main!(benches);
