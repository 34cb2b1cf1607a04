//! Triangle type carrying a collision flag.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A triangle with concrete vertex positions and a collision flag.
///
/// Vertices are in the owning mesh's local space; model matrices map
/// them into world space at test time. The flag starts out `false` and
/// is raised by the collision tester when this triangle intersects one
/// from the other mesh. The tester never clears it; use
/// [`Bvh::reset_collision_flags`](crate::Bvh::reset_collision_flags)
/// between runs.
///
/// # Example
///
/// ```
/// use mesh_collide::{Point3, Triangle};
///
/// let tri = Triangle::new(
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
/// );
///
/// assert!(!tri.collision);
/// assert_eq!(tri.vertices()[1].x, 1.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Triangle {
    /// First vertex.
    pub v0: Point3<f64>,
    /// Second vertex.
    pub v1: Point3<f64>,
    /// Third vertex.
    pub v2: Point3<f64>,
    /// Set when a collision test found this triangle intersecting one
    /// from the other mesh.
    pub collision: bool,
}

impl Triangle {
    /// Create a triangle from three points with the flag cleared.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_collide::{Point3, Triangle};
    ///
    /// let tri = Triangle::new(
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(0.0, 1.0, 0.0),
    /// );
    /// ```
    #[inline]
    #[must_use]
    pub const fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self {
            v0,
            v1,
            v2,
            collision: false,
        }
    }

    /// Create a triangle from coordinate arrays.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_collide::Triangle;
    ///
    /// let tri = Triangle::from_arrays(
    ///     [0.0, 0.0, 0.0],
    ///     [1.0, 0.0, 0.0],
    ///     [0.0, 1.0, 0.0],
    /// );
    /// ```
    #[inline]
    #[must_use]
    pub fn from_arrays(v0: [f64; 3], v1: [f64; 3], v2: [f64; 3]) -> Self {
        Self::new(
            Point3::new(v0[0], v0[1], v0[2]),
            Point3::new(v1[0], v1[1], v1[2]),
            Point3::new(v2[0], v2[1], v2[2]),
        )
    }

    /// Get vertices as an array.
    #[inline]
    #[must_use]
    pub const fn vertices(&self) -> [Point3<f64>; 3] {
        [self.v0, self.v1, self.v2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clears_flag() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert!(!tri.collision);
    }

    #[test]
    fn from_arrays_matches_points() {
        let tri = Triangle::from_arrays([0.0, 1.0, 2.0], [3.0, 4.0, 5.0], [6.0, 7.0, 8.0]);
        assert!((tri.v0.z - 2.0).abs() < 1e-10);
        assert!((tri.v1.x - 3.0).abs() < 1e-10);
        assert!((tri.v2.y - 7.0).abs() < 1e-10);
    }

    #[test]
    fn vertices_in_order() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        let [v0, v1, v2] = tri.vertices();
        assert_eq!(v0, tri.v0);
        assert_eq!(v1, tri.v1);
        assert_eq!(v2, tri.v2);
    }
}
