//! Clipping planes for cropping a volume.
//!
//! Every volume carries exactly six planes. A point is kept when it lies on the
//! non-negative side of all of them. The planes are uploaded to the volume shader
//! for per-fragment clipping and reused on the CPU to reject whole bricks.

use glam::{DMat3, DVec3};

/// A plane `a*x + b*y + c*z + d = 0`; the positive side is kept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal direction (points toward kept geometry).
    pub normal: DVec3,
    /// Offset term.
    pub d: f64,
}

impl Plane {
    /// Creates a plane from its `(a, b, c, d)` coefficients.
    pub const fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            normal: DVec3::new(a, b, c),
            d,
        }
    }

    /// Creates a plane through `point` with the given normal.
    pub fn from_point_normal(point: DVec3, normal: DVec3) -> Self {
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance scaled by the normal length.
    pub fn signed_distance(&self, p: DVec3) -> f64 {
        self.normal.dot(p) + self.d
    }

    /// Returns true if the point is on the kept side.
    pub fn is_kept(&self, p: DVec3) -> bool {
        self.signed_distance(p) >= 0.0
    }

    /// Returns the `(a, b, c, d)` coefficients.
    pub fn abcd(&self) -> [f64; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }
}

/// The six clipping planes of one volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes(pub [Plane; 6]);

impl ClipPlanes {
    /// Planes bounding the unit cube: `x >= 0, x <= 1, y >= 0, y <= 1, z >= 0, z <= 1`.
    pub const UNIT_CUBE: ClipPlanes = ClipPlanes([
        Plane::new(1.0, 0.0, 0.0, 0.0),
        Plane::new(-1.0, 0.0, 0.0, 1.0),
        Plane::new(0.0, 1.0, 0.0, 0.0),
        Plane::new(0.0, -1.0, 0.0, 1.0),
        Plane::new(0.0, 0.0, 1.0, 0.0),
        Plane::new(0.0, 0.0, -1.0, 1.0),
    ]);

    /// Planes that keep everything within `extent` of the origin.
    pub fn permissive(extent: f64) -> Self {
        let mut planes = Self::UNIT_CUBE;
        for plane in &mut planes.0 {
            plane.d = extent;
        }
        planes
    }

    pub fn planes(&self) -> &[Plane; 6] {
        &self.0
    }

    pub fn set(&mut self, index: usize, plane: Plane) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = plane;
        }
    }

    /// Returns true if the whole box lies on the negative side of one plane.
    pub fn rejects_box(&self, corners: &[DVec3; 8]) -> bool {
        self.0
            .iter()
            .any(|plane| corners.iter().all(|c| plane.signed_distance(*c) < 0.0))
    }

    /// Builds the clip region when the planes form three opposite pairs.
    ///
    /// Returns `None` when a pair is not antiparallel or the pairs are degenerate.
    pub fn region(&self) -> Option<ClipRegion> {
        let p = &self.0;
        for pair in 0..3 {
            let (a, b) = (p[pair * 2].normal, p[pair * 2 + 1].normal);
            let (la, lb) = (a.length(), b.length());
            if la <= f64::EPSILON || lb <= f64::EPSILON || a.dot(b) / (la * lb) > -1.0 + 1e-6 {
                return None;
            }
        }

        let mut vertices = [DVec3::ZERO; 8];
        for (i, vertex) in vertices.iter_mut().enumerate() {
            let px = &p[usize::from(i & 4 != 0)];
            let py = &p[2 + usize::from(i & 2 != 0)];
            let pz = &p[4 + usize::from(i & 1 != 0)];
            *vertex = intersect_planes(px, py, pz)?;
        }

        Some(ClipRegion {
            vertices,
            face_normals: [p[0].normal, p[2].normal, p[4].normal],
        })
    }
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self::UNIT_CUBE
    }
}

fn intersect_planes(a: &Plane, b: &Plane, c: &Plane) -> Option<DVec3> {
    let m = DMat3::from_cols(a.normal, b.normal, c.normal).transpose();
    let det = m.determinant();
    if det.abs() < 1e-12 {
        return None;
    }
    Some(m.inverse() * DVec3::new(-a.d, -b.d, -c.d))
}

/// The parallelepiped enclosed by the six planes, used for separating-axis tests.
#[derive(Debug, Clone, Copy)]
pub struct ClipRegion {
    vertices: [DVec3; 8],
    face_normals: [DVec3; 3],
}

impl ClipRegion {
    pub fn vertices(&self) -> &[DVec3; 8] {
        &self.vertices
    }

    fn edge_directions(&self) -> [DVec3; 3] {
        let v = &self.vertices;
        [v[4] - v[0], v[2] - v[0], v[1] - v[0]]
    }

    /// Separating-axis test between an axis-aligned box and the region.
    ///
    /// Returns true when the two convex solids overlap.
    pub fn overlaps_box(&self, corners: &[DVec3; 8]) -> bool {
        let box_axes = [DVec3::X, DVec3::Y, DVec3::Z];
        let edges = self.edge_directions();

        let mut axes: Vec<DVec3> = Vec::with_capacity(15);
        axes.extend_from_slice(&box_axes);
        axes.extend_from_slice(&self.face_normals);
        for a in box_axes {
            for e in edges {
                axes.push(a.cross(e));
            }
        }

        for axis in axes {
            if axis.length_squared() < 1e-18 {
                continue;
            }
            let (amin, amax) = project_interval(corners, axis);
            let (bmin, bmax) = project_interval(&self.vertices, axis);
            if amax < bmin || bmax < amin {
                return false;
            }
        }
        true
    }
}

fn project_interval(points: &[DVec3; 8], axis: DVec3) -> (f64, f64) {
    points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
        let t = p.dot(axis);
        (lo.min(t), hi.max(t))
    })
}

/// GPU-compatible clip plane uniforms (parameter slots 10..15).
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ClipPlaneUniforms {
    pub planes: [[f32; 4]; 6],
}

impl From<&ClipPlanes> for ClipPlaneUniforms {
    #[allow(clippy::cast_possible_truncation)]
    fn from(planes: &ClipPlanes) -> Self {
        let mut out = [[0.0f32; 4]; 6];
        for (dst, plane) in out.iter_mut().zip(planes.0.iter()) {
            *dst = plane.abcd().map(|v| v as f32);
        }
        Self { planes: out }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BBox;

    #[test]
    fn test_unit_cube_keeps_center() {
        let planes = ClipPlanes::default();
        let center = DVec3::splat(0.5);
        assert!(planes.planes().iter().all(|p| p.is_kept(center)));
    }

    #[test]
    fn test_rejects_box_behind_plane() {
        let planes = ClipPlanes::default();
        let outside = BBox::new(DVec3::new(1.5, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        let straddling = BBox::new(DVec3::new(0.5, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        assert!(planes.rejects_box(&outside.corners()));
        assert!(!planes.rejects_box(&straddling.corners()));
    }

    #[test]
    fn test_region_of_unit_cube() {
        let region = ClipPlanes::default().region().unwrap();
        let v = region.vertices();
        assert!((v[0] - DVec3::ZERO).length() < 1e-12);
        assert!((v[7] - DVec3::ONE).length() < 1e-12);
    }

    #[test]
    fn test_region_sat_catches_diagonal_crop() {
        // A slab rotated 45 degrees around z: x + y in [0, 0.4]
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let mut planes = ClipPlanes::default();
        planes.set(0, Plane::new(s, s, 0.0, 0.0));
        planes.set(1, Plane::new(-s, -s, 0.0, 0.4 * s));
        planes.set(2, Plane::new(-s, s, 0.0, 1.0));
        planes.set(3, Plane::new(s, -s, 0.0, 1.0));
        let region = planes.region().unwrap();

        let near = BBox::new(DVec3::ZERO, DVec3::splat(0.2));
        let far = BBox::new(DVec3::new(0.8, 0.8, 0.0), DVec3::ONE);
        assert!(region.overlaps_box(&near.corners()));
        assert!(!region.overlaps_box(&far.corners()));
    }

    #[test]
    fn test_region_none_for_non_pairs() {
        let mut planes = ClipPlanes::default();
        planes.set(1, Plane::new(0.0, 1.0, 0.0, 0.0));
        assert!(planes.region().is_none());
    }

    #[test]
    fn test_uniforms() {
        let u = ClipPlaneUniforms::from(&ClipPlanes::default());
        assert_eq!(u.planes[1], [-1.0, 0.0, 0.0, 1.0]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn rejected_boxes_have_no_kept_point(
                lo in prop::array::uniform3(-2.0f64..2.0),
                size in prop::array::uniform3(0.01f64..1.0),
                t in prop::array::uniform3(0.0f64..1.0),
            ) {
                let min = DVec3::from_array(lo);
                let bbox = BBox::new(min, min + DVec3::from_array(size));
                let p = bbox.min + bbox.diagonal() * DVec3::from_array(t);
                let planes = ClipPlanes::default();
                if planes.rejects_box(&bbox.corners()) {
                    prop_assert!(!planes.planes().iter().all(|pl| pl.is_kept(p)));
                }
            }
        }
    }
}
