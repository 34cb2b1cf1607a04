//! End-to-end collision scenarios across the public API.
//!
//! Each test builds two hierarchies from scratch, runs a collision test
//! with real model transforms, and checks the resulting node and
//! triangle flags against the geometry. The deep-tree scenario also
//! pins the expected tree shape, so a change to the split heuristics
//! shows up here before it shows up as a missed collision.

// Allow test-specific patterns
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::cast_precision_loss)]

use std::f64::consts::FRAC_PI_2;

use mesh_collide::{BuildConfig, Bvh, BvhNode, Matrix4, Point3, Triangle, Vector3, test_collision};

/// A flat triangle in the z = 0 plane spanning [x, x + 0.1] on the x axis.
fn flat_triangle(x: f64) -> Triangle {
    Triangle::new(
        Point3::new(x, 0.0, 0.0),
        Point3::new(x + 0.1, 0.0, 0.0),
        Point3::new(x + 0.05, 0.1, 0.0),
    )
}

/// A triangle with a vertical edge that pierces the z = 0 plane at
/// (x + 0.05, y + 0.03), inside a matching [`flat_triangle`] at `x`
/// when `y` lines up with it.
fn crossing_probe(x: f64, y: f64) -> Triangle {
    Triangle::new(
        Point3::new(x + 0.05, y + 0.03, -0.5),
        Point3::new(x + 0.05, y + 0.03, 0.5),
        Point3::new(x, y + 0.1, 0.5),
    )
}

fn unit_box() -> Vec<Triangle> {
    let vertices = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
        Point3::new(0.0, 0.0, 1.0),
        Point3::new(1.0, 0.0, 1.0),
        Point3::new(1.0, 1.0, 1.0),
        Point3::new(0.0, 1.0, 1.0),
    ];

    let faces = [
        [0, 1, 2],
        [0, 2, 3],
        [4, 6, 5],
        [4, 7, 6],
        [0, 5, 1],
        [0, 4, 5],
        [2, 7, 3],
        [2, 6, 7],
        [0, 3, 7],
        [0, 7, 4],
        [1, 5, 6],
        [1, 6, 2],
    ];

    faces
        .iter()
        .map(|face| Triangle::new(vertices[face[0]], vertices[face[1]], vertices[face[2]]))
        .collect()
}

fn assert_no_flags(node: &BvhNode) {
    assert!(!node.collision());
    if let (Some(left), Some(right)) = (node.left(), node.right()) {
        assert_no_flags(left);
        assert_no_flags(right);
    }
}

/// Every node on the path to `target`'s leaf must be flagged, and no
/// other node anywhere in the tree may be.
fn assert_flags_trace_path_to(node: &BvhNode, target: u32) {
    assert_eq!(
        node.collision(),
        node.triangle_indices().contains(&target),
        "node at depth {} holds {:?}",
        node.depth(),
        node.triangle_indices()
    );
    if let (Some(left), Some(right)) = (node.left(), node.right()) {
        assert_flags_trace_path_to(left, target);
        assert_flags_trace_path_to(right, target);
    }
}

#[test]
fn single_pair_forced_together_by_transforms() {
    // One triangle per mesh, built 100 units apart on x; the second
    // mesh's model matrix pulls it back onto the first.
    let a = vec![flat_triangle(0.0)];
    let b = vec![crossing_probe(100.0, 0.0)];

    let mut first = Bvh::build(&a, &BuildConfig::default()).unwrap();
    let mut second = Bvh::build(&b, &BuildConfig::default()).unwrap();

    assert!(first.root().is_leaf());
    assert!(second.root().is_leaf());

    let identity = Matrix4::identity();
    let back = Matrix4::new_translation(&Vector3::new(-100.0, 0.0, 0.0));
    test_collision(&mut first, &identity, &mut second, &back);

    assert!(first.root().collision());
    assert!(second.root().collision());
    assert_eq!(first.collided_triangles(), vec![0]);
    assert_eq!(second.collided_triangles(), vec![0]);
}

#[test]
fn disjoint_meshes_leave_every_flag_clear() {
    let a = unit_box();
    let b = unit_box();

    let config = BuildConfig::default().with_min_triangles_for_split(2);
    let mut first = Bvh::build(&a, &config).unwrap();
    let mut second = Bvh::build(&b, &config).unwrap();

    let identity = Matrix4::identity();
    let far = Matrix4::new_translation(&Vector3::new(100.0, 0.0, 0.0));
    test_collision(&mut first, &identity, &mut second, &far);

    assert_no_flags(first.root());
    assert_no_flags(second.root());
    assert!(first.collided_triangles().is_empty());
    assert!(second.collided_triangles().is_empty());
}

#[test]
fn deep_trees_flag_only_the_colliding_path() {
    // First mesh: a strip of 32 flat triangles along x, two units apart.
    let strip: Vec<Triangle> = (0..32).map(|i| flat_triangle(f64::from(i) * 2.0)).collect();

    // Second mesh: a strip of 32 probes running along y instead, built
    // 1000 units below its world position. Probe 17 lands exactly on
    // strip triangle 17 (x = 34) once the model matrix lifts it back;
    // every other probe stays at least 1.9 units off the strip's y band.
    let probes: Vec<Triangle> = (0..32)
        .map(|j| crossing_probe(34.0, (f64::from(j) - 17.0) * 2.0 - 1000.0))
        .collect();

    let mut first = Bvh::build(&strip, &BuildConfig::default()).unwrap();
    let mut second = Bvh::build(&probes, &BuildConfig::default()).unwrap();

    // With the default split settings both trees bottom out in leaves
    // of four triangles, three levels down.
    for tree in [&first, &second] {
        let stats = tree.stats();
        assert_eq!(stats.max_depth, 3);
        assert_eq!(stats.leaf_count, 8);
        assert_eq!(stats.internal_count, 7);
        assert_eq!(stats.max_leaf_size, 4);
    }

    let identity = Matrix4::identity();
    let lift = Matrix4::new_translation(&Vector3::new(0.0, 1000.0, 0.0));
    test_collision(&mut first, &identity, &mut second, &lift);

    // Only the ancestors of each tree's triangle 17 saw overlapping
    // boxes; sibling subtrees were pruned without being touched.
    assert_flags_trace_path_to(first.root(), 17);
    assert_flags_trace_path_to(second.root(), 17);

    assert_eq!(first.collided_triangles(), vec![17]);
    assert_eq!(second.collided_triangles(), vec![17]);
}

#[test]
fn rotated_mesh_is_still_detected() {
    // The flat triangle sits in the quadrant the probe only reaches
    // after a quarter turn about z.
    let a = vec![Triangle::new(
        Point3::new(-1.0, 0.0, 0.0),
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    )];
    let b = vec![crossing_probe(0.2, 0.22)];

    let mut first = Bvh::build(&a, &BuildConfig::default()).unwrap();
    let mut second = Bvh::build(&b, &BuildConfig::default()).unwrap();

    let identity = Matrix4::identity();
    test_collision(&mut first, &identity, &mut second, &identity);
    assert!(first.collided_triangles().is_empty());

    first.reset_collision_flags();
    second.reset_collision_flags();

    // (x, y) -> (-y, x): the probe's piercing edge moves to
    // (-0.25, 0.25), inside the flat triangle.
    let quarter_turn = Matrix4::new_rotation(Vector3::new(0.0, 0.0, FRAC_PI_2));
    test_collision(&mut first, &identity, &mut second, &quarter_turn);

    assert!(first.root().collision());
    assert_eq!(first.collided_triangles(), vec![0]);
    assert_eq!(second.collided_triangles(), vec![0]);
}
