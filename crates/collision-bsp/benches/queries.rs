//! Build and query benchmarks

use collision_bsp::bsp::{FirstTriangle, LeastSplits};
use collision_bsp::{BspTree, BuildConfig, CollectingVisitor, WorldTriangle};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use nalgebra::{Point3, Vector3};

fn terrain(n: usize) -> Vec<WorldTriangle> {
    let height = |x: usize, z: usize| ((x * 7 + z * 13) % 5) as f32 * 0.3;
    let p = |x: usize, z: usize| Point3::new(x as f32, height(x, z), z as f32);

    let mut tris = Vec::with_capacity(n * n * 2);
    for x in 0..n {
        for z in 0..n {
            tris.push(WorldTriangle::new(p(x, z), p(x, z + 1), p(x + 1, z)));
            tris.push(WorldTriangle::new(p(x + 1, z), p(x, z + 1), p(x + 1, z + 1)));
        }
    }
    tris
}

fn rays(n: usize) -> Vec<(Point3<f32>, Point3<f32>)> {
    let size = n as f32;
    (0..256)
        .map(|i| {
            let u = (i as f32 * 0.618_034).fract() * size;
            let v = (i as f32 * 0.414_214).fract() * size;
            (Point3::new(u, 10.0, v), Point3::new(size - v, -3.0, size - u))
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");
    let config = BuildConfig::default();

    for n in [16, 32, 64] {
        let tris = terrain(n);
        group.bench_with_input(BenchmarkId::new("least_splits", tris.len()), &tris, |b, tris| {
            b.iter(|| BspTree::build_with(black_box(tris.clone()), &config, &LeastSplits::default()).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("first_triangle", tris.len()), &tris, |b, tris| {
            b.iter(|| BspTree::build_with(black_box(tris.clone()), &config, &FirstTriangle).unwrap());
        });
    }

    group.finish();
}

fn bench_ray(c: &mut Criterion) {
    let mut group = c.benchmark_group("ray");
    let n = 64;
    let built = BspTree::from_triangles(terrain(n)).unwrap();
    let loaded = BspTree::from_bytes(&built.to_bytes().unwrap()).unwrap();
    let rays = rays(n);

    for (name, tree) in [("built", &built), ("loaded", &loaded)] {
        group.bench_function(BenchmarkId::new("closest", name), |b| {
            b.iter(|| {
                for (start, end) in &rays {
                    black_box(tree.intersects_ray(*start, *end, 1.0));
                }
            });
        });
    }

    group.bench_function("visit_all", |b| {
        b.iter(|| {
            let mut visitor = CollectingVisitor::new();
            for (start, end) in &rays {
                built.visit_ray(black_box(*start), black_box(*end), 1.0, &mut visitor);
            }
            black_box(visitor.hits().len())
        });
    });

    group.finish();
}

fn bench_swept(c: &mut Criterion) {
    let tree = BspTree::from_triangles(terrain(64)).unwrap();
    let probe = WorldTriangle::new(
        Point3::new(10.2, 5.0, 10.2),
        Point3::new(10.2, 5.0, 10.7),
        Point3::new(10.7, 5.0, 10.2),
    );

    c.bench_function("swept_down", |b| {
        b.iter(|| tree.intersects_swept(black_box(&probe), Vector3::new(0.0, -10.0, 0.0)));
    });
    c.bench_function("static_triangle", |b| {
        b.iter(|| tree.intersects_triangle(black_box(&probe)));
    });
}

criterion_group!(benches, bench_build, bench_ray, bench_swept);
criterion_main!(benches);
