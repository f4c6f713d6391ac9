//! Tree queries checked against brute force over the stored triangles.

use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use collision_bsp::bsp::{FirstHits, FirstTriangle};
use collision_bsp::{BspTree, BuildConfig, CollectingVisitor, WorldTriangle};
use nalgebra::{Point3, Vector3};

/// A bumpy `n` x `n` heightfield with unit cells, plus walls cutting across it.
fn terrain(n: usize) -> Vec<WorldTriangle> {
    let height = |x: usize, z: usize| ((x * 7 + z * 13) % 5) as f32 * 0.3;
    let p = |x: usize, z: usize| Point3::new(x as f32, height(x, z), z as f32);

    let mut tris = Vec::new();
    for x in 0..n {
        for z in 0..n {
            tris.push(WorldTriangle::new(p(x, z), p(x, z + 1), p(x + 1, z)));
            tris.push(WorldTriangle::new(p(x + 1, z), p(x, z + 1), p(x + 1, z + 1)));
        }
    }

    let size = n as f32;
    for k in 1..4 {
        let c = size * k as f32 / 4.0 + 0.25;
        tris.push(WorldTriangle::new(
            Point3::new(c, -1.0, -1.0),
            Point3::new(c, 6.0, -1.0),
            Point3::new(c, -1.0, size + 1.0),
        ));
        tris.push(WorldTriangle::new(
            Point3::new(-1.0, -1.0, c),
            Point3::new(size + 1.0, -1.0, c),
            Point3::new(-1.0, 6.0, c),
        ));
    }
    tris
}

fn brute_force(tree: &BspTree, start: Point3<f32>, end: Point3<f32>) -> Option<f32> {
    tree.triangles()
        .iter()
        .filter(|t| t.is_collidable())
        .filter_map(|t| t.intersects_ray(start, end - start, 1.0))
        .min_by(f32::total_cmp)
}

/// Deterministic rays over the terrain, some vertical and some slanted.
fn rays(n: usize) -> Vec<(Point3<f32>, Point3<f32>)> {
    let size = n as f32;
    let mut out = Vec::new();
    for i in 0..40 {
        let u = (i as f32 * 0.618_034).fract() * size;
        let v = (i as f32 * 0.414_214).fract() * size;
        out.push((Point3::new(u, 10.0, v), Point3::new(u, -5.0, v)));
        out.push((Point3::new(u, 8.0, v), Point3::new(size - v, -3.0, size - u)));
        out.push((Point3::new(-2.0, 0.5 + v * 0.1, u), Point3::new(size + 2.0, 0.2, v)));
    }
    out
}

#[test]
fn closest_hit_matches_brute_force() {
    let n = 12;
    let tree = BspTree::from_triangles(terrain(n)).unwrap();
    assert!(tree.stats().nodes > 1);

    for (start, end) in rays(n) {
        let expected = brute_force(&tree, start, end);
        let actual = tree.intersects_ray(start, end, 1.0).map(|h| h.distance);
        match (expected, actual) {
            (Some(e), Some(a)) => assert_relative_eq!(e, a, epsilon = 1e-5),
            (None, None) => {}
            other => panic!("ray {start} -> {end}: brute force {:?}, tree {:?}", other.0, other.1),
        }
    }
}

#[test]
fn visitor_reports_every_hit_once() {
    let n = 8;
    let config = BuildConfig::default().with_max_leaf_size(4);
    let tree = BspTree::build(terrain(n), &config).unwrap();

    for (start, end) in rays(n) {
        let mut visitor = CollectingVisitor::new();
        tree.visit_ray(start, end, 1.0, &mut visitor);

        let mut reported: Vec<f32> = visitor.hits().iter().map(|h| h.distance).collect();
        assert!(reported.windows(2).all(|w| w[0] <= w[1]), "{reported:?}");

        let mut expected: Vec<f32> = tree
            .triangles()
            .iter()
            .filter_map(|t| t.intersects_ray(start, end - start, 1.0))
            .collect();
        reported.sort_by(f32::total_cmp);
        expected.sort_by(f32::total_cmp);
        assert_eq!(reported.len(), expected.len());
        for (r, e) in reported.iter().zip(&expected) {
            assert_relative_eq!(*r, *e, max_relative = 1e-5);
        }
    }
}

#[test]
fn visitor_distances_never_decrease_across_shared_edges() {
    let n = 12;
    let config = BuildConfig::default().with_max_leaf_size(2);
    let built = BspTree::build(terrain(n), &config).unwrap();
    let loaded = BspTree::from_bytes(&built.to_bytes().unwrap()).unwrap();

    // Slanted rays starting over grid vertices and cell diagonals, so many
    // of them pass through edges shared by two triangles.
    let size = n as f32;
    for x in 0..=n {
        for z in 0..=n {
            let (fx, fz) = (x as f32, z as f32);
            for (start, end) in [
                (Point3::new(fx, 4.0, fz), Point3::new(size - fz, -2.0, fx)),
                (Point3::new(fx + 0.5, 3.0, fz + 0.5), Point3::new(fz, -2.0, size - fx)),
            ] {
                for tree in [&built, &loaded] {
                    let mut visitor = CollectingVisitor::new();
                    tree.visit_ray(start, end, 1.0, &mut visitor);
                    let distances: Vec<f32> = visitor.hits().iter().map(|h| h.distance).collect();
                    assert!(
                        distances.windows(2).all(|w| w[0] <= w[1]),
                        "ray {start} -> {end}: {distances:?}"
                    );
                }
            }
        }
    }
}

#[test]
fn first_hits_stops_after_limit() {
    let n = 8;
    let tree = BspTree::from_triangles(terrain(n)).unwrap();
    // Runs along a wall-crossing diagonal, so several hits exist.
    let start = Point3::new(-2.0, 0.4, 0.5);
    let end = Point3::new(n as f32 + 2.0, 0.4, n as f32 - 0.5);

    let mut all = CollectingVisitor::new();
    tree.visit_ray(start, end, 1.0, &mut all);
    assert!(all.hits().len() >= 3);

    let mut two = FirstHits::new(2);
    let stopped = tree.visit_ray(start, end, 1.0, &mut two).unwrap();
    assert_eq!(two.hits().len(), 2);
    assert_relative_eq!(stopped.distance, two.hits()[1].distance);
}

#[test]
fn first_triangle_tree_matches_brute_force() {
    let n = 10;
    let config = BuildConfig::default().with_max_leaf_size(3);
    let tree = BspTree::build_with(terrain(n), &config, &FirstTriangle).unwrap();

    for (start, end) in rays(n) {
        let expected = brute_force(&tree, start, end);
        let actual = tree.intersects_ray(start, end, 1.0).map(|h| h.distance);
        assert_eq!(expected.is_some(), actual.is_some(), "ray {start} -> {end}");
        if let (Some(e), Some(a)) = (expected, actual) {
            assert_relative_eq!(e, a, epsilon = 1e-5);
        }
    }
}

#[test]
fn swept_and_static_queries() {
    let tree = BspTree::from_triangles(terrain(6)).unwrap();
    let probe = WorldTriangle::new(
        Point3::new(1.2, 5.0, 1.2),
        Point3::new(1.2, 5.0, 1.6),
        Point3::new(1.6, 5.0, 1.2),
    );

    assert!(tree.intersects_triangle(&probe).is_none());
    assert!(tree.intersects_swept(&probe, Vector3::new(0.0, 1.0, 0.0)).is_none());
    assert!(tree.intersects_swept(&probe, Vector3::new(0.0, -10.0, 0.0)).is_some());

    let buried = WorldTriangle::new(
        Point3::new(1.2, -3.0, 1.2),
        Point3::new(1.2, 3.0, 1.6),
        Point3::new(1.6, -3.0, 1.2),
    );
    assert!(tree.intersects_triangle(&buried).is_some());

    let mut count = 0;
    let mut count_all = |_: &WorldTriangle, _: f32| {
        count += 1;
        false
    };
    assert!(tree
        .visit_swept(&probe, Vector3::new(0.0, -10.0, 0.0), &mut count_all)
        .is_none());
    assert!(count >= 1);
}

#[test]
fn concurrent_queries_share_one_tree() {
    let n = 10;
    let tree = Arc::new(BspTree::from_triangles(terrain(n)).unwrap());
    let expected: Vec<Option<f32>> = rays(n)
        .into_iter()
        .map(|(s, e)| tree.intersects_ray(s, e, 1.0).map(|h| h.distance))
        .collect();

    thread::scope(|scope| {
        for _ in 0..4 {
            let tree = Arc::clone(&tree);
            let expected = &expected;
            scope.spawn(move || {
                let got: Vec<Option<f32>> = rays(n)
                    .into_iter()
                    .map(|(s, e)| tree.intersects_ray(s, e, 1.0).map(|h| h.distance))
                    .collect();
                assert_eq!(&got, expected);
            });
        }
    });
}
