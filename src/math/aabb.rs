//! Axis-aligned bounding box

use glam::{Mat4, Vec3};

/// Tolerance used when comparing box faces produced by float transforms
pub const FACE_EPSILON: f32 = 1e-4;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create AABB from center and half-extents
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// True when the box has no extent on any axis.
    pub fn is_degenerate(&self) -> bool {
        self.size().cmple(Vec3::ZERO).all()
    }

    /// Check if point is inside AABB
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if `other` lies entirely inside this box
    pub fn contains(&self, other: &Aabb) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Bounding box of this box after an affine transform.
    ///
    /// All eight corners are transformed, so rotations yield the
    /// enclosing box rather than a rotated one.
    pub fn transformed(&self, transform: &Mat4) -> Aabb {
        let first = transform.transform_point3(self.min);
        let mut result = Aabb::new(first, first);
        for i in 1..8u8 {
            let corner = Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            );
            result.expand(transform.transform_point3(corner));
        }
        result
    }

    /// Whether `inner` shares a face coordinate with this box.
    ///
    /// A box not contained in `self` counts as touching.
    pub fn touches_boundary(&self, inner: &Aabb) -> bool {
        if !self.inflated(FACE_EPSILON).contains(inner) {
            return true;
        }
        let near_min = (inner.min - self.min).abs().cmple(Vec3::splat(FACE_EPSILON));
        let near_max = (self.max - inner.max).abs().cmple(Vec3::splat(FACE_EPSILON));
        near_min.any() || near_max.any()
    }

    fn inflated(&self, amount: f32) -> Aabb {
        Aabb::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    fn test_contains_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(!aabb.contains_point(Vec3::splat(2.0)));
    }

    #[test]
    fn test_degenerate() {
        assert!(Aabb::default().is_degenerate());
        assert!(!Aabb::new(Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)).is_degenerate());
    }

    #[test]
    fn test_transformed_rotation() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 1.0, 1.0));
        let rot = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let out = aabb.transformed(&rot);
        // x extent maps onto -z
        assert!((out.min.z - -2.0).abs() < 1e-5);
        assert!((out.max.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transformed_translation() {
        let aabb = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let out = aabb.transformed(&Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0)));
        assert_eq!(out, Aabb::new(Vec3::new(2.5, -0.5, -0.5), Vec3::new(3.5, 0.5, 0.5)));
    }

    #[test]
    fn test_touches_boundary() {
        let outer = Aabb::new(Vec3::ZERO, Vec3::splat(10.0));
        let interior = Aabb::new(Vec3::splat(4.0), Vec3::splat(5.0));
        let on_min_x = Aabb::new(Vec3::new(0.0, 4.0, 4.0), Vec3::splat(5.0));
        let on_max_y = Aabb::new(Vec3::splat(4.0), Vec3::new(5.0, 10.0, 5.0));
        let outside = Aabb::new(Vec3::splat(20.0), Vec3::splat(21.0));

        assert!(!outer.touches_boundary(&interior));
        assert!(outer.touches_boundary(&on_min_x));
        assert!(outer.touches_boundary(&on_max_y));
        assert!(outer.touches_boundary(&outside));
    }
}
