//! Boxes and rays in volume index space.

use glam::DVec3;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BBox {
    /// Creates a box from two corners; the corners are reordered per axis.
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The unit cube `[0,1]^3`.
    pub fn unit() -> Self {
        Self::new(DVec3::ZERO, DVec3::ONE)
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn diagonal(&self) -> DVec3 {
        self.max - self.min
    }

    /// Returns true when every extent is strictly positive.
    pub fn is_valid(&self) -> bool {
        let d = self.diagonal();
        d.x > 0.0 && d.y > 0.0 && d.z > 0.0
    }

    /// Returns the 8 corners in the binary order `(x, y, z)` = bit `(2, 1, 0)`.
    pub fn corners(&self) -> [DVec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            lo,
            DVec3::new(lo.x, lo.y, hi.z),
            DVec3::new(lo.x, hi.y, lo.z),
            DVec3::new(lo.x, hi.y, hi.z),
            DVec3::new(hi.x, lo.y, lo.z),
            DVec3::new(hi.x, lo.y, hi.z),
            DVec3::new(hi.x, hi.y, lo.z),
            hi,
        ]
    }

    /// Returns the box shrunk by `diag / divisor` on every side.
    pub fn shrunk(&self, divisor: f64) -> Self {
        let pad = self.diagonal() / divisor;
        Self {
            min: self.min + pad,
            max: self.max - pad,
        }
    }

    /// Grows the box to include another one.
    pub fn extend(&mut self, other: &BBox) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn contains(&self, p: DVec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Maps a point inside the box to `[0,1]^3`.
    pub fn to_local(&self, p: DVec3) -> DVec3 {
        (p - self.min) / self.diagonal()
    }
}

impl Default for BBox {
    fn default() -> Self {
        Self::unit()
    }
}

/// A ray with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Creates a ray; the direction is normalized (falls back to -Z when degenerate).
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(DVec3::NEG_Z),
        }
    }

    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }

    /// Signed distance of `p` along the ray measured from the origin.
    pub fn project(&self, p: DVec3) -> f64 {
        (p - self.origin).dot(self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_corners_cover_extremes() {
        let b = BBox::new(DVec3::new(1.0, 2.0, 3.0), DVec3::ZERO);
        let corners = b.corners();
        assert_eq!(corners[0], DVec3::ZERO);
        assert_eq!(corners[7], DVec3::new(1.0, 2.0, 3.0));
        assert!(corners.iter().all(|c| b.contains(*c)));
    }

    #[test]
    fn test_bbox_shrunk_and_local() {
        let b = BBox::new(DVec3::ZERO, DVec3::splat(1000.0));
        let s = b.shrunk(1000.0);
        assert!((s.min - DVec3::ONE).length() < 1e-9);
        assert!((b.to_local(DVec3::splat(500.0)) - DVec3::splat(0.5)).length() < 1e-12);
    }

    #[test]
    fn test_ray_project() {
        let ray = Ray::new(DVec3::ZERO, DVec3::new(0.0, 0.0, 2.0));
        assert_eq!(ray.direction, DVec3::Z);
        assert!((ray.project(DVec3::new(5.0, 5.0, 3.0)) - 3.0).abs() < 1e-12);
        assert_eq!(Ray::new(DVec3::ZERO, DVec3::ZERO).direction, DVec3::NEG_Z);
    }
}
