//! Triangle-triangle intersection testing in world space.
//!
//! This is the built-in narrow-phase primitive the collision tester
//! falls back to at the leaves. Both triangles are mapped to world
//! space by their model matrices, then the six edge-against-triangle
//! combinations are checked with a Möller-Trumbore segment test.
//!
//! Coplanar overlap without an edge crossing the other triangle's
//! interior is not detected; callers that need exact coplanar handling
//! can supply their own test through
//! [`test_collision_with`](crate::collide::test_collision_with).

// Allow this pattern - it's correct for barycentric coordinate determinant calculation
#![allow(clippy::suspicious_operation_groupings)]

use nalgebra::{Matrix4, Point3};

use crate::transform::transform_triangle;
use crate::triangle::Triangle;

/// Default tolerance for the built-in triangle intersection test.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Test whether two transformed triangles intersect.
///
/// `matrix_a` and `matrix_b` map each triangle from its local space
/// into a common world space before testing.
///
/// # Arguments
///
/// * `a`, `b` - The triangles in their local spaces
/// * `matrix_a`, `matrix_b` - Model matrices for `a` and `b`
/// * `epsilon` - Tolerance for parallel rejection and segment bounds
///
/// # Returns
///
/// `true` if any edge of one world-space triangle passes through the
/// other, `false` otherwise.
#[must_use]
pub fn triangles_intersect(
    a: &Triangle,
    matrix_a: &Matrix4<f64>,
    b: &Triangle,
    matrix_b: &Matrix4<f64>,
    epsilon: f64,
) -> bool {
    let a_world = transform_triangle(matrix_a, a);
    let b_world = transform_triangle(matrix_b, b);

    // Check if any edge of A intersects triangle B
    let edges_a = [
        (a_world.v0, a_world.v1),
        (a_world.v1, a_world.v2),
        (a_world.v2, a_world.v0),
    ];
    for (e0, e1) in &edges_a {
        if edge_crosses_triangle(e0, e1, &b_world.v0, &b_world.v1, &b_world.v2, epsilon) {
            return true;
        }
    }

    // Check if any edge of B intersects triangle A
    let edges_b = [
        (b_world.v0, b_world.v1),
        (b_world.v1, b_world.v2),
        (b_world.v2, b_world.v0),
    ];
    for (e0, e1) in &edges_b {
        if edge_crosses_triangle(e0, e1, &a_world.v0, &a_world.v1, &a_world.v2, epsilon) {
            return true;
        }
    }

    false
}

/// Möller-Trumbore segment-against-triangle test.
fn edge_crosses_triangle(
    e0: &Point3<f64>,
    e1: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    epsilon: f64,
) -> bool {
    let direction = e1 - e0;
    let edge_length_sq = direction.norm_squared();

    // Degenerate edge
    if edge_length_sq < epsilon * epsilon {
        return false;
    }

    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);

    // Edge is parallel to the triangle plane
    if a.abs() < epsilon {
        return false;
    }

    let f = 1.0 / a;
    let s = e0 - v0;
    let u = f * s.dot(&h);

    // Intersection is outside triangle
    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);

    // Intersection is outside triangle
    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    // Intersection must sit within the segment bounds
    let t = f * edge2.dot(&q);
    (-epsilon..=1.0 + epsilon).contains(&t)
}
