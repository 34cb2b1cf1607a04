//! Bounding volume hierarchy construction over triangle sets.
//!
//! The tree is built top-down: each node takes the tight bounding box of
//! its triangle set, splits it at the midpoint of the longest axis, and
//! partitions whole triangles to the two sides. Nodes keep their full
//! triangle set, so every ancestor of a leaf can enumerate the triangles
//! below it. Topology and boxes are fixed once construction returns;
//! only collision flags change afterwards.

use rayon::prelude::*;
use smallvec::SmallVec;
use tracing::debug;

use crate::bounds::{Aabb, axis_coord};
use crate::config::BuildConfig;
use crate::error::{CollideError, CollideResult};
use crate::triangle::Triangle;

/// A node of the hierarchy.
///
/// Every node carries its own tight bounding box, the indices of all
/// triangles in its subtree, its depth below the root, and a collision
/// flag. A node without children is a leaf.
#[derive(Debug)]
pub struct BvhNode {
    aabb: Aabb,
    triangles: SmallVec<[u32; 8]>,
    depth: u32,
    collision: bool,
    children: Option<Box<Children>>,
}

/// Child pair of an internal node. Nodes have both children or neither.
#[derive(Debug)]
pub(crate) struct Children {
    pub(crate) left: BvhNode,
    pub(crate) right: BvhNode,
}

impl BvhNode {
    fn leaf(aabb: Aabb, triangles: SmallVec<[u32; 8]>, depth: u32) -> Self {
        Self {
            aabb,
            triangles,
            depth,
            collision: false,
            children: None,
        }
    }

    fn internal(
        aabb: Aabb,
        triangles: SmallVec<[u32; 8]>,
        depth: u32,
        left: Self,
        right: Self,
    ) -> Self {
        Self {
            aabb,
            triangles,
            depth,
            collision: false,
            children: Some(Box::new(Children { left, right })),
        }
    }

    /// Get the bounding box of this node.
    #[must_use]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    /// Indices into the tree's triangle list for every triangle in this
    /// node's subtree.
    #[must_use]
    pub fn triangle_indices(&self) -> &[u32] {
        &self.triangles
    }

    /// Depth of this node below the root (the root is at depth 0).
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Whether a collision test flagged this node's bounding box as
    /// overlapping the other tree in world space.
    #[must_use]
    pub fn collision(&self) -> bool {
        self.collision
    }

    /// Check whether this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Get the left child, if this node is internal.
    #[must_use]
    pub fn left(&self) -> Option<&Self> {
        self.children.as_deref().map(|children| &children.left)
    }

    /// Get the right child, if this node is internal.
    #[must_use]
    pub fn right(&self) -> Option<&Self> {
        self.children.as_deref().map(|children| &children.right)
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Children> {
        self.children.as_deref_mut()
    }

    pub(crate) fn mark_collision(&mut self) {
        self.collision = true;
    }
}

/// Bounding volume hierarchy over an owned triangle set.
///
/// The tree owns a copy of the input triangles; nodes refer to them by
/// index, so a triangle shared by every ancestor of its leaf has exactly
/// one collision flag no matter how many nodes enumerate it.
#[derive(Debug)]
pub struct Bvh {
    root: BvhNode,
    triangles: Vec<Triangle>,
}

impl Bvh {
    /// Build a hierarchy from a triangle list.
    ///
    /// # Arguments
    ///
    /// * `triangles` - The triangles in the mesh's local space
    /// * `config` - Depth and split tuning parameters
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::InvalidConfig`] if `config` fails
    /// validation, or [`CollideError::EmptyTriangleList`] if `triangles`
    /// is empty.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_collide::{BuildConfig, Bvh, Point3, Triangle};
    ///
    /// let triangles = vec![Triangle::new(
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.5, 1.0, 0.0),
    /// )];
    ///
    /// let bvh = Bvh::build(&triangles, &BuildConfig::default())?;
    /// assert_eq!(bvh.triangle_count(), 1);
    /// assert!(bvh.root().is_leaf());
    /// # Ok::<(), mesh_collide::CollideError>(())
    /// ```
    pub fn build(triangles: &[Triangle], config: &BuildConfig) -> CollideResult<Self> {
        config.validate()?;
        if triangles.is_empty() {
            return Err(CollideError::EmptyTriangleList);
        }

        debug!(
            triangles = triangles.len(),
            max_depth = config.max_depth,
            "Building collision hierarchy"
        );

        let owned = triangles.to_vec();
        let boxes: Vec<Aabb> = owned.iter().map(Aabb::from_triangle).collect();
        let indices: SmallVec<[u32; 8]> = (0..boxes.len() as u32).collect();
        let root = Self::build_node(&boxes, indices, 0, config.max_depth, false, config);

        Ok(Self {
            root,
            triangles: owned,
        })
    }

    /// Build a hierarchy using parallel construction for large meshes.
    ///
    /// Subtrees with at least [`BuildConfig::parallel_threshold`]
    /// triangles are built on rayon's thread pool; the resulting tree is
    /// identical to the one [`Bvh::build`] produces.
    ///
    /// # Errors
    ///
    /// Returns [`CollideError::InvalidConfig`] if `config` fails
    /// validation, or [`CollideError::EmptyTriangleList`] if `triangles`
    /// is empty.
    pub fn build_parallel(triangles: &[Triangle], config: &BuildConfig) -> CollideResult<Self> {
        config.validate()?;
        if triangles.is_empty() {
            return Err(CollideError::EmptyTriangleList);
        }

        debug!(
            triangles = triangles.len(),
            max_depth = config.max_depth,
            parallel_threshold = config.parallel_threshold,
            "Building collision hierarchy in parallel"
        );

        let owned = triangles.to_vec();
        let boxes: Vec<Aabb> = owned.par_iter().map(Aabb::from_triangle).collect();
        let indices: SmallVec<[u32; 8]> = (0..boxes.len() as u32).collect();

        let root = if boxes.len() >= config.parallel_threshold {
            Self::build_node_parallel(&boxes, indices, 0, config.max_depth, false, config)
        } else {
            Self::build_node(&boxes, indices, 0, config.max_depth, false, config)
        };

        Ok(Self {
            root,
            triangles: owned,
        })
    }

    fn build_node(
        boxes: &[Aabb],
        indices: SmallVec<[u32; 8]>,
        depth: u32,
        remaining_depth: u32,
        force_leaf: bool,
        config: &BuildConfig,
    ) -> BvhNode {
        let aabb = Self::bounds_of(boxes, &indices);

        // The split is evaluated even on calls already forced to
        // collapse: a branch below the split threshold gets one more
        // bounding-box and partition pass before it leafs out.
        let axis = aabb.longest_axis();
        let split_coord = axis_coord(&aabb.center(), axis);
        let (left, right) = Self::partition(boxes, &indices, axis, split_coord);

        if force_leaf || remaining_depth == 0 || left.is_empty() || right.is_empty() {
            return BvhNode::leaf(aabb, indices, depth);
        }

        let left_force = left.len() < config.min_triangles_for_split;
        let right_force = right.len() < config.min_triangles_for_split;

        let left_child =
            Self::build_node(boxes, left, depth + 1, remaining_depth - 1, left_force, config);
        let right_child =
            Self::build_node(boxes, right, depth + 1, remaining_depth - 1, right_force, config);

        BvhNode::internal(aabb, indices, depth, left_child, right_child)
    }

    fn build_node_parallel(
        boxes: &[Aabb],
        indices: SmallVec<[u32; 8]>,
        depth: u32,
        remaining_depth: u32,
        force_leaf: bool,
        config: &BuildConfig,
    ) -> BvhNode {
        let aabb = Self::bounds_of(boxes, &indices);

        let axis = aabb.longest_axis();
        let split_coord = axis_coord(&aabb.center(), axis);
        let (left, right) = Self::partition(boxes, &indices, axis, split_coord);

        if force_leaf || remaining_depth == 0 || left.is_empty() || right.is_empty() {
            return BvhNode::leaf(aabb, indices, depth);
        }

        let left_force = left.len() < config.min_triangles_for_split;
        let right_force = right.len() < config.min_triangles_for_split;

        // Fork only while a side is still large enough to be worth it
        let (left_child, right_child) = if left.len() >= config.parallel_threshold
            || right.len() >= config.parallel_threshold
        {
            rayon::join(
                || {
                    Self::build_node_parallel(
                        boxes,
                        left,
                        depth + 1,
                        remaining_depth - 1,
                        left_force,
                        config,
                    )
                },
                || {
                    Self::build_node_parallel(
                        boxes,
                        right,
                        depth + 1,
                        remaining_depth - 1,
                        right_force,
                        config,
                    )
                },
            )
        } else {
            (
                Self::build_node(boxes, left, depth + 1, remaining_depth - 1, left_force, config),
                Self::build_node(boxes, right, depth + 1, remaining_depth - 1, right_force, config),
            )
        };

        BvhNode::internal(aabb, indices, depth, left_child, right_child)
    }

    fn bounds_of(boxes: &[Aabb], indices: &[u32]) -> Aabb {
        let mut aabb = Aabb::empty();
        for &idx in indices {
            aabb.expand(&boxes[idx as usize]);
        }
        aabb
    }

    /// Partition triangle indices against a split plane on one axis.
    ///
    /// A triangle entirely at or below the plane goes left, entirely
    /// above goes right. Straddlers fall to the side holding more of
    /// their extent, with ties going left.
    fn partition(
        boxes: &[Aabb],
        indices: &[u32],
        axis: usize,
        split_coord: f64,
    ) -> (SmallVec<[u32; 8]>, SmallVec<[u32; 8]>) {
        let mut left = SmallVec::new();
        let mut right = SmallVec::new();

        for &idx in indices {
            let bounds = &boxes[idx as usize];
            let lo = axis_coord(&bounds.min, axis);
            let hi = axis_coord(&bounds.max, axis);

            if hi <= split_coord {
                left.push(idx);
            } else if lo > split_coord {
                right.push(idx);
            } else if split_coord - lo >= hi - split_coord {
                left.push(idx);
            } else {
                right.push(idx);
            }
        }

        (left, right)
    }

    /// Get the root node of the hierarchy.
    #[must_use]
    pub fn root(&self) -> &BvhNode {
        &self.root
    }

    /// Get the triangles this tree was built over, in input order.
    ///
    /// Collision flags on these triangles are updated in place by
    /// [`test_collision`](crate::collide::test_collision).
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Get the total number of triangles in the hierarchy.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Indices of all triangles whose collision flag is set.
    #[must_use]
    pub fn collided_triangles(&self) -> Vec<u32> {
        self.triangles
            .iter()
            .enumerate()
            .filter(|(_, triangle)| triangle.collision)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Clear every node and triangle collision flag.
    ///
    /// Collision tests only ever raise flags; call this between runs
    /// when a clean result is needed.
    pub fn reset_collision_flags(&mut self) {
        Self::reset_node_flags(&mut self.root);
        for triangle in &mut self.triangles {
            triangle.collision = false;
        }
    }

    fn reset_node_flags(node: &mut BvhNode) {
        node.collision = false;
        if let Some(children) = node.children_mut() {
            Self::reset_node_flags(&mut children.left);
            Self::reset_node_flags(&mut children.right);
        }
    }

    /// Root node and triangle list, borrowed mutably side by side for
    /// the collision traversal.
    pub(crate) fn split_mut(&mut self) -> (&mut BvhNode, &mut [Triangle]) {
        (&mut self.root, &mut self.triangles)
    }

    /// Get statistics about the hierarchy structure.
    #[must_use]
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        Self::collect_stats(&self.root, &mut stats);
        stats
    }

    fn collect_stats(node: &BvhNode, stats: &mut BvhStats) {
        stats.max_depth = stats.max_depth.max(node.depth as usize);

        if let Some(children) = node.children.as_deref() {
            stats.internal_count += 1;
            Self::collect_stats(&children.left, stats);
            Self::collect_stats(&children.right, stats);
        } else {
            stats.leaf_count += 1;
            stats.total_triangles_in_leaves += node.triangles.len();
            stats.max_leaf_size = stats.max_leaf_size.max(node.triangles.len());
        }
    }
}

/// Statistics about hierarchy structure.
#[derive(Debug, Default, Clone)]
pub struct BvhStats {
    /// Number of internal (branch) nodes.
    pub internal_count: usize,
    /// Number of leaf nodes.
    pub leaf_count: usize,
    /// Maximum depth of the tree.
    pub max_depth: usize,
    /// Maximum number of triangles in any leaf.
    pub max_leaf_size: usize,
    /// Total triangles stored across all leaves.
    pub total_triangles_in_leaves: usize,
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
    use nalgebra::Point3;

    fn create_test_triangles() -> Vec<Triangle> {
        // A box mesh with 12 triangles (2 per face)
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
            // Bottom face
            [0, 1, 2],
            [0, 2, 3],
            // Top face
            [4, 6, 5],
            [4, 7, 6],
            // Front face
            [0, 5, 1],
            [0, 4, 5],
            // Back face
            [2, 7, 3],
            [2, 6, 7],
            // Left face
            [0, 3, 7],
            [0, 7, 4],
            // Right face
            [1, 5, 6],
            [1, 6, 2],
        ];

        faces
            .iter()
            .map(|face| Triangle::new(vertices[face[0]], vertices[face[1]], vertices[face[2]]))
            .collect()
    }

    /// A small triangle spanning [x, x + 0.1] on the x axis.
    fn thin_triangle(x: f64) -> Triangle {
        Triangle::new(
            Point3::new(x, 0.0, 0.0),
            Point3::new(x + 0.1, 0.0, 0.0),
            Point3::new(x + 0.05, 0.1, 0.0),
        )
    }

    fn assert_partition(node: &BvhNode) {
        let (Some(left), Some(right)) = (node.left(), node.right()) else {
            return;
        };

        let mut combined: Vec<u32> = left
            .triangle_indices()
            .iter()
            .chain(right.triangle_indices())
            .copied()
            .collect();
        combined.sort_unstable();

        let mut own: Vec<u32> = node.triangle_indices().to_vec();
        own.sort_unstable();

        // Equal sorted lists mean the children partition the parent set
        // with no triangle duplicated or dropped.
        assert_eq!(combined, own);

        assert_partition(left);
        assert_partition(right);
    }

    fn assert_containment(node: &BvhNode, triangles: &[Triangle]) {
        let aabb = node.aabb();
        for &idx in node.triangle_indices() {
            for vertex in &triangles[idx as usize].vertices() {
                assert!(vertex.x >= aabb.min.x - 1e-12 && vertex.x <= aabb.max.x + 1e-12);
                assert!(vertex.y >= aabb.min.y - 1e-12 && vertex.y <= aabb.max.y + 1e-12);
                assert!(vertex.z >= aabb.min.z - 1e-12 && vertex.z <= aabb.max.z + 1e-12);
            }
        }

        if let (Some(left), Some(right)) = (node.left(), node.right()) {
            assert_containment(left, triangles);
            assert_containment(right, triangles);
        }
    }

    fn assert_same_shape(a: &BvhNode, b: &BvhNode) {
        assert_eq!(a.depth(), b.depth());
        assert_eq!(a.is_leaf(), b.is_leaf());
        assert_eq!(a.triangle_indices(), b.triangle_indices());

        if let (Some(a_left), Some(b_left)) = (a.left(), b.left()) {
            assert_same_shape(a_left, b_left);
        }
        if let (Some(a_right), Some(b_right)) = (a.right(), b.right()) {
            assert_same_shape(a_right, b_right);
        }
    }

    #[test]
    fn test_build_rejects_empty_list() {
        let result = Bvh::build(&[], &BuildConfig::default());
        assert!(matches!(result, Err(CollideError::EmptyTriangleList)));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let triangles = vec![thin_triangle(0.0)];
        let config = BuildConfig::default().with_min_triangles_for_split(0);

        let result = Bvh::build(&triangles, &config);
        assert!(matches!(result, Err(CollideError::InvalidConfig { .. })));
    }

    #[test]
    fn test_build_single_triangle_is_leaf_root() {
        let triangles = vec![thin_triangle(0.0)];
        let bvh = Bvh::build(&triangles, &BuildConfig::default()).unwrap();

        assert_eq!(bvh.triangle_count(), 1);
        assert!(bvh.root().is_leaf());
        assert_eq!(bvh.root().depth(), 0);
        assert_eq!(bvh.root().triangle_indices(), &[0]);
    }

    #[test]
    fn test_max_depth_zero_builds_single_leaf() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default().with_max_depth(0);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        assert!(bvh.root().is_leaf());
        assert_eq!(bvh.root().triangle_indices().len(), 12);

        let stats = bvh.stats();
        assert_eq!(stats.leaf_count, 1);
        assert_eq!(stats.internal_count, 0);
        assert_eq!(stats.max_depth, 0);
    }

    #[test]
    fn test_root_bounds_cover_mesh() {
        let triangles = create_test_triangles();
        let bvh = Bvh::build(&triangles, &BuildConfig::default()).unwrap();

        let aabb = bvh.root().aabb();
        assert!((aabb.min.x - 0.0).abs() < 1e-10);
        assert!((aabb.min.y - 0.0).abs() < 1e-10);
        assert!((aabb.min.z - 0.0).abs() < 1e-10);
        assert!((aabb.max.x - 1.0).abs() < 1e-10);
        assert!((aabb.max.y - 1.0).abs() < 1e-10);
        assert!((aabb.max.z - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_root_keeps_full_triangle_set() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default().with_min_triangles_for_split(1);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        assert!(!bvh.root().is_leaf());
        let expected: Vec<u32> = (0..12).collect();
        assert_eq!(bvh.root().triangle_indices(), expected.as_slice());
    }

    #[test]
    fn test_children_partition_parent_triangles() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default().with_min_triangles_for_split(1);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        assert_partition(bvh.root());
    }

    #[test]
    fn test_node_bounds_contain_triangle_vertices() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default().with_min_triangles_for_split(1);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        assert_containment(bvh.root(), bvh.triangles());
    }

    #[test]
    fn test_small_side_leafs_one_level_down() {
        // Four triangles clustered near the origin and three far out on
        // x. The first split separates the clusters; the far side is
        // below min_triangles_for_split, so it must still appear as a
        // child node and collapse there, not be folded into the root.
        let triangles = vec![
            thin_triangle(0.0),
            thin_triangle(0.25),
            thin_triangle(0.5),
            thin_triangle(0.75),
            thin_triangle(8.0),
            thin_triangle(9.0),
            thin_triangle(10.0),
        ];
        let config = BuildConfig::default().with_min_triangles_for_split(4);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        let root = bvh.root();
        assert!(!root.is_leaf());

        let left = root.left().unwrap();
        let right = root.right().unwrap();

        // The near cluster meets the split threshold and keeps splitting.
        assert_eq!(left.triangle_indices(), &[0, 1, 2, 3]);
        assert!(!left.is_leaf());

        // The far cluster is under the threshold: one more level, then leaf.
        assert_eq!(right.triangle_indices(), &[4, 5, 6]);
        assert!(right.is_leaf());
        assert_eq!(right.depth(), 1);

        // The near cluster's children are under the threshold themselves,
        // so they collapse at depth 2 instead of splitting further.
        let near_left = left.left().unwrap();
        let near_right = left.right().unwrap();
        assert_eq!(near_left.triangle_indices(), &[0, 1]);
        assert!(near_left.is_leaf());
        assert_eq!(near_left.depth(), 2);
        assert_eq!(near_right.triangle_indices(), &[2, 3]);
        assert!(near_right.is_leaf());
        assert_eq!(near_right.depth(), 2);

        assert_eq!(bvh.stats().max_depth, 2);
    }

    #[test]
    fn test_max_depth_limits_tree_height() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default()
            .with_max_depth(2)
            .with_min_triangles_for_split(1);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        let stats = bvh.stats();
        assert!(stats.max_depth <= 2);
        assert_eq!(stats.total_triangles_in_leaves, 12);
    }

    #[test]
    fn test_stats_counts_box_mesh() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default().with_min_triangles_for_split(2);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        let stats = bvh.stats();
        assert!(stats.leaf_count > 0);
        assert!(stats.internal_count > 0);
        assert_eq!(stats.total_triangles_in_leaves, 12);
        assert!(stats.max_leaf_size <= 12);
    }

    #[test]
    fn test_parallel_build_matches_serial() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default()
            .with_min_triangles_for_split(2)
            .with_parallel_threshold(2);

        let serial = Bvh::build(&triangles, &config).unwrap();
        let parallel = Bvh::build_parallel(&triangles, &config).unwrap();

        assert_eq!(serial.triangle_count(), parallel.triangle_count());
        assert_same_shape(serial.root(), parallel.root());
    }

    #[test]
    fn test_parallel_build_below_threshold() {
        let triangles = create_test_triangles();
        let config = BuildConfig::default().with_parallel_threshold(1000);

        let bvh = Bvh::build_parallel(&triangles, &config).unwrap();
        assert_eq!(bvh.triangle_count(), 12);
    }

    #[test]
    fn test_collided_triangles_reads_flags() {
        let triangles = create_test_triangles();
        let mut bvh = Bvh::build(&triangles, &BuildConfig::default()).unwrap();

        assert!(bvh.collided_triangles().is_empty());

        bvh.triangles[3].collision = true;
        bvh.triangles[7].collision = true;
        assert_eq!(bvh.collided_triangles(), vec![3, 7]);
    }

    #[test]
    fn test_reset_collision_flags() {
        let triangles = create_test_triangles();
        let mut bvh = Bvh::build(&triangles, &BuildConfig::default()).unwrap();

        bvh.root.mark_collision();
        bvh.triangles[0].collision = true;

        bvh.reset_collision_flags();

        assert!(!bvh.root().collision());
        assert!(bvh.collided_triangles().is_empty());
    }

    #[test]
    fn test_degenerate_mesh_still_terminates() {
        // All triangles identical: every split puts everything on one
        // side, so the root must give up and stay a leaf.
        let triangles = vec![thin_triangle(0.0); 64];
        let config = BuildConfig::default().with_min_triangles_for_split(1);
        let bvh = Bvh::build(&triangles, &config).unwrap();

        assert!(bvh.root().is_leaf());
        assert_eq!(bvh.root().triangle_indices().len(), 64);
    }
}
