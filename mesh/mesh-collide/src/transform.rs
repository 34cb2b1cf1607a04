//! Model matrix application for points and triangles.
//!
//! Geometry is stored in mesh-local space; these helpers apply a 4x4
//! affine model matrix using homogeneous coordinates (w = 1).

use nalgebra::{Matrix4, Point3, Vector4};

use crate::triangle::Triangle;

/// Transform a point by an affine matrix.
#[must_use]
pub fn transform_point(matrix: &Matrix4<f64>, point: &Point3<f64>) -> Point3<f64> {
    let p = Vector4::new(point.x, point.y, point.z, 1.0);
    let result = matrix * p;
    Point3::new(result.x, result.y, result.z)
}

/// Transform all three triangle vertices by an affine matrix.
///
/// The collision flag carries over unchanged.
#[must_use]
pub fn transform_triangle(matrix: &Matrix4<f64>, triangle: &Triangle) -> Triangle {
    Triangle {
        v0: transform_point(matrix, &triangle.v0),
        v1: transform_point(matrix, &triangle.v1),
        v2: transform_point(matrix, &triangle.v2),
        collision: triangle.collision,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn translation_moves_point() {
        let matrix = Matrix4::new_translation(&Vector3::new(1.0, 2.0, 3.0));
        let result = transform_point(&matrix, &Point3::new(1.0, 1.0, 1.0));

        assert_relative_eq!(result.x, 2.0, epsilon = 1e-10);
        assert_relative_eq!(result.y, 3.0, epsilon = 1e-10);
        assert_relative_eq!(result.z, 4.0, epsilon = 1e-10);
    }

    #[test]
    fn rotation_z_quarter_turn() {
        let matrix = Matrix4::new_rotation(Vector3::new(0.0, 0.0, FRAC_PI_2));
        let result = transform_point(&matrix, &Point3::new(1.0, 0.0, 0.0));

        assert_relative_eq!(result.x, 0.0, epsilon = 1e-10);
        assert_relative_eq!(result.y, 1.0, epsilon = 1e-10);
        assert_relative_eq!(result.z, 0.0, epsilon = 1e-10);
    }

    #[test]
    fn identity_leaves_point() {
        let result = transform_point(&Matrix4::identity(), &Point3::new(4.0, 5.0, 6.0));

        assert_relative_eq!(result.x, 4.0, epsilon = 1e-10);
        assert_relative_eq!(result.y, 5.0, epsilon = 1e-10);
        assert_relative_eq!(result.z, 6.0, epsilon = 1e-10);
    }

    #[test]
    fn transform_triangle_keeps_flag() {
        let mut tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        tri.collision = true;

        let matrix = Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0));
        let moved = transform_triangle(&matrix, &tri);

        assert!(moved.collision);
        assert_relative_eq!(moved.v0.x, 10.0, epsilon = 1e-10);
        assert_relative_eq!(moved.v1.x, 11.0, epsilon = 1e-10);
        assert_relative_eq!(moved.v2.y, 1.0, epsilon = 1e-10);
    }
}
