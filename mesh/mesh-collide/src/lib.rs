//! Broad-phase collision detection for triangle meshes.
//!
//! This crate builds bounding volume hierarchies (BVHs) over triangle
//! sets and tests two transformed hierarchies against each other in a
//! synchronized descent, flagging every node whose world-space box
//! overlaps the other tree and every triangle pair the intersection
//! primitive confirms.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//! - CLI tools
//! - Web applications (WASM)
//! - Servers
//! - Other game engines
//! - Python bindings
//!
//! # Features
//!
//! - **Midpoint-split BVH construction** with depth and leaf-size tuning
//! - **Dual-tree traversal** that prunes non-overlapping subtree pairs
//! - **Pluggable narrow phase** via [`test_collision_with`]
//! - **Parallel construction** for large meshes (rayon)
//! - **Configuration presets** for coarse and fine hierarchies
//!
//! # Quick Start
//!
//! ```ignore
//! use mesh_collide::prelude::*;
//!
//! let mut first = Bvh::build(&triangles_a, &BuildConfig::default())?;
//! let mut second = Bvh::build(&triangles_b, &BuildConfig::default())?;
//!
//! test_collision(&mut first, &model_a, &mut second, &model_b);
//!
//! for index in first.collided_triangles() {
//!     println!("triangle {index} collided");
//! }
//! ```
//!
//! # Flag Semantics
//!
//! Node flags mark bounding-box proximity: a node is flagged as soon as
//! its world-space box overlaps a box of the other tree, even when no
//! triangle below it ends up intersecting. Triangle flags mark pairs
//! confirmed by the narrow phase. Flags only ever move from false to
//! true within a run; call [`Bvh::reset_collision_flags`] between runs
//! for a clean result.
//!
//! # Quality Standards
//!
//! - Zero clippy/doc warnings
//! - Zero `unwrap`/`expect` in library code

// Safety: Deny unwrap/expect in library code. Tests may use them (workspace warns).
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that conflict with API design choices
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
// Allow single-char names in math-heavy code (standard in graphics/geometry algorithms)
#![allow(clippy::many_single_char_names)]
// Allow cast truncation - triangle indices stay well under u32::MAX
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
// Allow some nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::suboptimal_flops)]
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_panics_doc)]

pub mod bounds;
pub mod bvh;
pub mod collide;
pub mod config;
pub mod error;
pub mod intersect;
pub mod transform;
pub mod triangle;

// Re-export main types and functions for convenient access
pub use bounds::Aabb;
pub use bvh::{Bvh, BvhNode, BvhStats};
pub use collide::{test_collision, test_collision_with};
pub use config::BuildConfig;
pub use error::{CollideError, CollideResult};
pub use intersect::{DEFAULT_EPSILON, triangles_intersect};
pub use transform::{transform_point, transform_triangle};
pub use triangle::Triangle;

// Re-export nalgebra types used throughout the public API
pub use nalgebra::{Matrix4, Point3, Vector3};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```ignore
/// use mesh_collide::prelude::*;
///
/// let bvh = Bvh::build(&triangles, &BuildConfig::default())?;
/// ```
pub mod prelude {
    pub use crate::bounds::Aabb;
    pub use crate::bvh::{Bvh, BvhNode, BvhStats};
    pub use crate::collide::{test_collision, test_collision_with};
    pub use crate::config::BuildConfig;
    pub use crate::error::{CollideError, CollideResult};
    pub use crate::intersect::{DEFAULT_EPSILON, triangles_intersect};
    pub use crate::triangle::Triangle;
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

    fn create_test_box(offset: Vector3<f64>) -> Vec<Triangle> {
        let vertices = [
            Point3::new(0.0, 0.0, 0.0) + offset,
            Point3::new(1.0, 0.0, 0.0) + offset,
            Point3::new(1.0, 1.0, 0.0) + offset,
            Point3::new(0.0, 1.0, 0.0) + offset,
            Point3::new(0.0, 0.0, 1.0) + offset,
            Point3::new(1.0, 0.0, 1.0) + offset,
            Point3::new(1.0, 1.0, 1.0) + offset,
            Point3::new(0.0, 1.0, 1.0) + offset,
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

    #[test]
    fn test_overlapping_boxes_collide() {
        let a = create_test_box(Vector3::new(0.0, 0.0, 0.0));
        let b = create_test_box(Vector3::new(0.3, 0.4, 0.5));

        let config = BuildConfig::default().with_min_triangles_for_split(2);
        let mut first = Bvh::build(&a, &config).unwrap();
        let mut second = Bvh::build(&b, &config).unwrap();

        let identity = Matrix4::identity();
        test_collision(&mut first, &identity, &mut second, &identity);

        assert!(first.root().collision());
        assert!(second.root().collision());
        assert!(!first.collided_triangles().is_empty());
        assert!(!second.collided_triangles().is_empty());
    }

    #[test]
    fn test_far_apart_boxes_stay_clean() {
        let a = create_test_box(Vector3::new(0.0, 0.0, 0.0));
        let b = create_test_box(Vector3::new(100.0, 0.0, 0.0));

        let mut first = Bvh::build(&a, &BuildConfig::default()).unwrap();
        let mut second = Bvh::build(&b, &BuildConfig::default()).unwrap();

        let identity = Matrix4::identity();
        test_collision(&mut first, &identity, &mut second, &identity);

        assert!(!first.root().collision());
        assert!(!second.root().collision());
        assert!(first.collided_triangles().is_empty());
        assert!(second.collided_triangles().is_empty());
    }

    #[test]
    fn test_model_matrices_drive_world_positions() {
        let a = create_test_box(Vector3::new(0.0, 0.0, 0.0));
        let b = create_test_box(Vector3::new(0.0, 0.0, 0.0));

        let mut first = Bvh::build(&a, &BuildConfig::default()).unwrap();
        let mut second = Bvh::build(&b, &BuildConfig::default()).unwrap();

        // Identical local geometry pushed far apart by the transforms.
        let identity = Matrix4::identity();
        let far = Matrix4::new_translation(&Vector3::new(0.0, 50.0, 0.0));

        test_collision(&mut first, &identity, &mut second, &far);

        assert!(!first.root().collision());
        assert!(first.collided_triangles().is_empty());
        assert!(second.collided_triangles().is_empty());
    }
}
