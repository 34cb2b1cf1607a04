//! Dual-tree collision testing between transformed hierarchies.
//!
//! Both trees are descended in lockstep. A node pair whose world-space
//! boxes do not overlap prunes its whole subtree product; an overlapping
//! pair marks both nodes and descends; a leaf/leaf pair hands every
//! triangle combination to the intersection primitive. Node and triangle
//! flags only ever move from false to true during a run, so callers that
//! need a clean result reset both trees first with
//! [`Bvh::reset_collision_flags`].

use nalgebra::Matrix4;
use tracing::debug;

use crate::bvh::{Bvh, BvhNode};
use crate::intersect::{DEFAULT_EPSILON, triangles_intersect};
use crate::triangle::Triangle;

/// Test two hierarchies for collision using the built-in triangle
/// intersection primitive.
///
/// Traverses both trees in lockstep, marking node collision flags on
/// every world-space box overlap and triangle collision flags on every
/// intersecting leaf-level pair.
///
/// # Arguments
///
/// * `first`, `second` - The hierarchies to test, flags updated in place
/// * `first_matrix`, `second_matrix` - Model matrices mapping each
///   mesh's local space into a common world space
///
/// # Example
///
/// ```
/// use mesh_collide::{BuildConfig, Bvh, Matrix4, Point3, Triangle, test_collision};
///
/// let a = vec![Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// )];
/// let b = vec![Triangle::new(
///     Point3::new(0.25, 0.25, -0.5),
///     Point3::new(0.25, 0.25, 0.5),
///     Point3::new(1.5, 0.25, 0.5),
/// )];
///
/// let mut first = Bvh::build(&a, &BuildConfig::default())?;
/// let mut second = Bvh::build(&b, &BuildConfig::default())?;
///
/// let identity = Matrix4::identity();
/// test_collision(&mut first, &identity, &mut second, &identity);
///
/// assert!(first.root().collision());
/// assert_eq!(first.collided_triangles(), vec![0]);
/// assert_eq!(second.collided_triangles(), vec![0]);
/// # Ok::<(), mesh_collide::CollideError>(())
/// ```
pub fn test_collision(
    first: &mut Bvh,
    first_matrix: &Matrix4<f64>,
    second: &mut Bvh,
    second_matrix: &Matrix4<f64>,
) {
    test_collision_with(first, first_matrix, second, second_matrix, |a, ma, b, mb| {
        triangles_intersect(a, ma, b, mb, DEFAULT_EPSILON)
    });
}

/// Test two hierarchies for collision with a caller-supplied triangle
/// intersection primitive.
///
/// The primitive receives both triangles in their local spaces together
/// with the two model matrices and returns whether they intersect in
/// world space. Traversal, pruning, and flag updates are identical to
/// [`test_collision`]; only the leaf-level triangle test is swapped out.
pub fn test_collision_with<F>(
    first: &mut Bvh,
    first_matrix: &Matrix4<f64>,
    second: &mut Bvh,
    second_matrix: &Matrix4<f64>,
    mut triangles_intersect: F,
) where
    F: FnMut(&Triangle, &Matrix4<f64>, &Triangle, &Matrix4<f64>) -> bool,
{
    debug!(
        first_triangles = first.triangle_count(),
        second_triangles = second.triangle_count(),
        "Testing collision between hierarchies"
    );

    let (first_root, first_triangles) = first.split_mut();
    let (second_root, second_triangles) = second.split_mut();

    test_nodes(
        first_root,
        first_triangles,
        first_matrix,
        second_root,
        second_triangles,
        second_matrix,
        &mut triangles_intersect,
    );
}

#[allow(clippy::too_many_arguments)]
fn test_nodes<F>(
    first: &mut BvhNode,
    first_triangles: &mut [Triangle],
    first_matrix: &Matrix4<f64>,
    second: &mut BvhNode,
    second_triangles: &mut [Triangle],
    second_matrix: &Matrix4<f64>,
    triangles_intersect: &mut F,
) where
    F: FnMut(&Triangle, &Matrix4<f64>, &Triangle, &Matrix4<f64>) -> bool,
{
    let first_world = first.aabb().transformed(first_matrix);
    let second_world = second.aabb().transformed(second_matrix);

    if !first_world.overlaps(&second_world) {
        return;
    }

    // A node flag records box-level proximity, not a confirmed triangle
    // intersection; it stays set even when no leaf pair below intersects.
    first.mark_collision();
    second.mark_collision();

    if first.is_leaf() && second.is_leaf() {
        // Every pair is tested; no early exit once one pair hits, so
        // all intersecting triangles end up flagged.
        for &first_idx in first.triangle_indices() {
            for &second_idx in second.triangle_indices() {
                let hit = triangles_intersect(
                    &first_triangles[first_idx as usize],
                    first_matrix,
                    &second_triangles[second_idx as usize],
                    second_matrix,
                );
                if hit {
                    first_triangles[first_idx as usize].collision = true;
                    second_triangles[second_idx as usize].collision = true;
                }
            }
        }
        return;
    }

    // A leaf on one side descends against both children of the other.
    if first.is_leaf() {
        if let Some(second_children) = second.children_mut() {
            test_nodes(
                first,
                first_triangles,
                first_matrix,
                &mut second_children.left,
                second_triangles,
                second_matrix,
                triangles_intersect,
            );
            test_nodes(
                first,
                first_triangles,
                first_matrix,
                &mut second_children.right,
                second_triangles,
                second_matrix,
                triangles_intersect,
            );
        }
        return;
    }

    if second.is_leaf() {
        if let Some(first_children) = first.children_mut() {
            test_nodes(
                &mut first_children.left,
                first_triangles,
                first_matrix,
                second,
                second_triangles,
                second_matrix,
                triangles_intersect,
            );
            test_nodes(
                &mut first_children.right,
                first_triangles,
                first_matrix,
                second,
                second_triangles,
                second_matrix,
                triangles_intersect,
            );
        }
        return;
    }

    if let (Some(first_children), Some(second_children)) =
        (first.children_mut(), second.children_mut())
    {
        test_nodes(
            &mut first_children.left,
            first_triangles,
            first_matrix,
            &mut second_children.left,
            second_triangles,
            second_matrix,
            triangles_intersect,
        );
        test_nodes(
            &mut first_children.left,
            first_triangles,
            first_matrix,
            &mut second_children.right,
            second_triangles,
            second_matrix,
            triangles_intersect,
        );
        test_nodes(
            &mut first_children.right,
            first_triangles,
            first_matrix,
            &mut second_children.left,
            second_triangles,
            second_matrix,
            triangles_intersect,
        );
        test_nodes(
            &mut first_children.right,
            first_triangles,
            first_matrix,
            &mut second_children.right,
            second_triangles,
            second_matrix,
            triangles_intersect,
        );
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use nalgebra::{Point3, Vector3};

    fn flat_triangle() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    fn piercing_triangle() -> Triangle {
        Triangle::new(
            Point3::new(0.25, 0.25, -0.5),
            Point3::new(0.25, 0.25, 0.5),
            Point3::new(1.5, 0.25, 0.5),
        )
    }

    /// A small triangle spanning [x, x + 0.1] on the x axis.
    fn thin_triangle(x: f64) -> Triangle {
        Triangle::new(
            Point3::new(x, 0.0, 0.0),
            Point3::new(x + 0.1, 0.0, 0.0),
            Point3::new(x + 0.05, 0.1, 0.0),
        )
    }

    fn single_leaf_tree(triangles: Vec<Triangle>) -> Bvh {
        let config = BuildConfig::default().with_max_depth(0);
        Bvh::build(&triangles, &config).unwrap()
    }

    #[test]
    fn test_disjoint_trees_untouched() {
        let mut first = single_leaf_tree(vec![thin_triangle(0.0)]);
        let mut second = single_leaf_tree(vec![thin_triangle(100.0)]);
        let identity = Matrix4::identity();

        let mut calls = 0;
        test_collision_with(&mut first, &identity, &mut second, &identity, |_, _, _, _| {
            calls += 1;
            true
        });

        assert_eq!(calls, 0);
        assert!(!first.root().collision());
        assert!(!second.root().collision());
        assert!(first.collided_triangles().is_empty());
        assert!(second.collided_triangles().is_empty());
    }

    #[test]
    fn test_overlap_flags_nodes_without_triangle_hit() {
        let mut first = single_leaf_tree(vec![flat_triangle()]);
        let mut second = single_leaf_tree(vec![piercing_triangle()]);
        let identity = Matrix4::identity();

        let mut calls = 0;
        test_collision_with(&mut first, &identity, &mut second, &identity, |_, _, _, _| {
            calls += 1;
            false
        });

        // Boxes overlap so both nodes are marked, but the primitive said
        // no, so no triangle flag moves.
        assert_eq!(calls, 1);
        assert!(first.root().collision());
        assert!(second.root().collision());
        assert!(first.collided_triangles().is_empty());
        assert!(second.collided_triangles().is_empty());
    }

    #[test]
    fn test_all_leaf_pairs_tested() {
        let mut first = single_leaf_tree(vec![thin_triangle(0.0), thin_triangle(0.2)]);
        let mut second = single_leaf_tree(vec![thin_triangle(0.1), thin_triangle(0.3)]);
        let identity = Matrix4::identity();

        let mut calls = 0;
        test_collision_with(&mut first, &identity, &mut second, &identity, |_, _, _, _| {
            calls += 1;
            true
        });

        assert_eq!(calls, 4);
        assert_eq!(first.collided_triangles(), vec![0, 1]);
        assert_eq!(second.collided_triangles(), vec![0, 1]);
    }

    #[test]
    fn test_triangle_flags_follow_primitive_verdict() {
        let mut first = single_leaf_tree(vec![thin_triangle(0.0), thin_triangle(10.0)]);
        let mut second = single_leaf_tree(vec![thin_triangle(10.0), thin_triangle(20.0)]);
        let identity = Matrix4::identity();

        // Only the pair sharing an x position counts as a hit.
        test_collision_with(&mut first, &identity, &mut second, &identity, |a, _, b, _| {
            (a.v0.x - b.v0.x).abs() < 1e-9
        });

        assert_eq!(first.collided_triangles(), vec![1]);
        assert_eq!(second.collided_triangles(), vec![0]);
    }

    #[test]
    fn test_leaf_against_internal_descends_and_prunes() {
        let strip = vec![
            thin_triangle(0.0),
            thin_triangle(0.25),
            thin_triangle(0.5),
            thin_triangle(0.75),
        ];
        let config = BuildConfig::default().with_min_triangles_for_split(2);
        let mut first = Bvh::build(&strip, &config).unwrap();
        let mut second = single_leaf_tree(vec![thin_triangle(0.5)]);
        let identity = Matrix4::identity();

        assert!(!first.root().is_leaf());
        assert!(second.root().is_leaf());

        test_collision_with(&mut first, &identity, &mut second, &identity, |a, _, b, _| {
            (a.v0.x - b.v0.x).abs() < 0.01
        });

        // The query triangle only reaches the far half of the strip.
        assert!(first.root().collision());
        assert!(!first.root().left().unwrap().collision());
        assert!(first.root().right().unwrap().collision());
        assert_eq!(first.collided_triangles(), vec![2]);
        assert_eq!(second.collided_triangles(), vec![0]);

        // Swapping the argument order exercises the mirrored descent.
        first.reset_collision_flags();
        second.reset_collision_flags();
        test_collision_with(&mut second, &identity, &mut first, &identity, |a, _, b, _| {
            (a.v0.x - b.v0.x).abs() < 0.01
        });

        assert!(!first.root().left().unwrap().collision());
        assert!(first.root().right().unwrap().collision());
        assert_eq!(first.collided_triangles(), vec![2]);
        assert_eq!(second.collided_triangles(), vec![0]);
    }

    #[test]
    fn test_default_primitive_detects_crossing() {
        let mut first = single_leaf_tree(vec![flat_triangle()]);
        let mut second = single_leaf_tree(vec![piercing_triangle()]);
        let identity = Matrix4::identity();

        test_collision(&mut first, &identity, &mut second, &identity);

        assert!(first.root().collision());
        assert!(second.root().collision());
        assert_eq!(first.collided_triangles(), vec![0]);
        assert_eq!(second.collided_triangles(), vec![0]);
    }

    #[test]
    fn test_transforms_bring_meshes_together() {
        let mut first = single_leaf_tree(vec![flat_triangle()]);
        // Built 100 units out on x, pulled back by its model matrix.
        let far_piercing = Triangle::new(
            Point3::new(100.25, 0.25, -0.5),
            Point3::new(100.25, 0.25, 0.5),
            Point3::new(101.5, 0.25, 0.5),
        );
        let mut second = single_leaf_tree(vec![far_piercing]);
        let identity = Matrix4::identity();
        let back = Matrix4::new_translation(&Vector3::new(-100.0, 0.0, 0.0));

        test_collision(&mut first, &identity, &mut second, &identity);
        assert!(!first.root().collision());
        assert!(first.collided_triangles().is_empty());

        test_collision(&mut first, &identity, &mut second, &back);
        assert!(first.root().collision());
        assert_eq!(first.collided_triangles(), vec![0]);
        assert_eq!(second.collided_triangles(), vec![0]);
    }

    #[test]
    fn test_flags_idempotent_across_runs() {
        let mut first = single_leaf_tree(vec![flat_triangle()]);
        let mut second = single_leaf_tree(vec![piercing_triangle()]);
        let identity = Matrix4::identity();

        test_collision(&mut first, &identity, &mut second, &identity);
        let first_flags = first.collided_triangles();
        let second_flags = second.collided_triangles();

        test_collision(&mut first, &identity, &mut second, &identity);
        assert_eq!(first.collided_triangles(), first_flags);
        assert_eq!(second.collided_triangles(), second_flags);
    }

    #[test]
    fn test_flags_survive_later_disjoint_run() {
        let mut first = single_leaf_tree(vec![flat_triangle()]);
        let mut second = single_leaf_tree(vec![piercing_triangle()]);
        let identity = Matrix4::identity();
        let far = Matrix4::new_translation(&Vector3::new(500.0, 0.0, 0.0));

        test_collision(&mut first, &identity, &mut second, &identity);
        assert!(first.root().collision());

        // A later non-overlapping run never clears anything.
        test_collision(&mut first, &identity, &mut second, &far);
        assert!(first.root().collision());
        assert_eq!(first.collided_triangles(), vec![0]);
    }

    #[test]
    fn test_reset_gives_clean_rerun() {
        let mut first = single_leaf_tree(vec![flat_triangle()]);
        let mut second = single_leaf_tree(vec![piercing_triangle()]);
        let identity = Matrix4::identity();
        let far = Matrix4::new_translation(&Vector3::new(500.0, 0.0, 0.0));

        test_collision(&mut first, &identity, &mut second, &identity);
        first.reset_collision_flags();
        second.reset_collision_flags();

        test_collision(&mut first, &identity, &mut second, &far);
        assert!(!first.root().collision());
        assert!(!second.root().collision());
        assert!(first.collided_triangles().is_empty());
        assert!(second.collided_triangles().is_empty());
    }
}
