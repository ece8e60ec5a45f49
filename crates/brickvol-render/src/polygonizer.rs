//! View-aligned slicing of brick boxes.
//!
//! A brick is drawn as a stack of planar polygons perpendicular to the view ray. Each
//! polygon is the intersection of one plane `dot(p - origin, dir) = t` with the brick
//! box, so it has between three and six vertices.

use brickvol_core::{BBox, DVec3, Ray, UpdateOrder};

use crate::visibility::compute_t_index;

/// Box edges as pairs of corner indices (see [`BBox::corners`]).
const EDGES: [(usize, usize); 12] = [
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
];

/// One slice through a brick.
#[derive(Debug, Clone, PartialEq)]
pub struct SlicePolygon {
    /// Distance of the slice plane along the view ray.
    pub t: f64,
    /// Positions in volume index space, ordered around the centroid.
    pub vertices: Vec<DVec3>,
    /// Brick-local texture coordinates in `[0,1]^3`.
    pub texcoords: Vec<DVec3>,
}

impl SlicePolygon {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Closed outline as line segments.
    pub fn outline(&self) -> Vec<[DVec3; 2]> {
        let n = self.vertices.len();
        (0..n)
            .map(|i| [self.vertices[i], self.vertices[(i + 1) % n]])
            .collect()
    }
}

/// Intersects the plane at distance `t` along `ray` with a box.
///
/// Returns `None` when the plane misses the box or only touches an edge or corner.
pub fn slice_polygon(bbox: &BBox, ray: &Ray, t: f64) -> Option<SlicePolygon> {
    let corners = bbox.corners();
    let dist = corners.map(|c| ray.project(c) - t);
    let eps = bbox.diagonal().length() * 1e-9;

    let mut vertices: Vec<DVec3> = Vec::with_capacity(6);
    let mut push = |p: DVec3| {
        if !vertices.iter().any(|v| (*v - p).length() <= eps) {
            vertices.push(p);
        }
    };

    for (a, b) in EDGES {
        let (da, db) = (dist[a], dist[b]);
        if da == 0.0 {
            push(corners[a]);
        }
        if db == 0.0 {
            push(corners[b]);
        }
        if (da < 0.0 && db > 0.0) || (da > 0.0 && db < 0.0) {
            let s = da / (da - db);
            push(corners[a] + (corners[b] - corners[a]) * s);
        }
    }

    if vertices.len() < 3 {
        return None;
    }
    order_around_centroid(&mut vertices, ray.direction);

    let texcoords = vertices
        .iter()
        .map(|p| bbox.to_local(*p).clamp(DVec3::ZERO, DVec3::ONE))
        .collect();
    Some(SlicePolygon {
        t,
        vertices,
        texcoords,
    })
}

/// Sorts coplanar points by angle around their centroid, counter-clockwise about `normal`.
fn order_around_centroid(vertices: &mut [DVec3], normal: DVec3) {
    #[allow(clippy::cast_precision_loss)]
    let centroid = vertices.iter().copied().sum::<DVec3>() / vertices.len() as f64;
    let u = normal.any_orthonormal_vector();
    let v = normal.cross(u);
    vertices.sort_by(|a, b| {
        let (pa, pb) = (*a - centroid, *b - centroid);
        let angle_a = pa.dot(v).atan2(pa.dot(u));
        let angle_b = pb.dot(v).atan2(pb.dot(u));
        angle_a.total_cmp(&angle_b)
    });
}

/// The twelve edges of a box as line segments.
pub fn box_edges(bbox: &BBox) -> [[DVec3; 2]; 12] {
    let corners = bbox.corners();
    EDGES.map(|(a, b)| [corners[a], corners[b]])
}

/// The slice at time index `index`, i.e. at `t = index * dt`.
pub fn polygon_at_index(bbox: &BBox, ray: &Ray, dt: f64, index: i32) -> Option<SlicePolygon> {
    slice_polygon(bbox, ray, f64::from(index) * dt)
}

/// Every slice of a box spaced `dt` apart, in draw order.
///
/// Back-to-front walks the time indices downward from the far end of the box.
pub fn compute_polygons(bbox: &BBox, ray: &Ray, dt: f64, order: UpdateOrder) -> Vec<SlicePolygon> {
    let Some((timin, timax)) = compute_t_index(bbox, ray, dt) else {
        return Vec::new();
    };
    let indices: Box<dyn Iterator<Item = i32>> = match order {
        UpdateOrder::FrontToBack => Box::new(timin..=timax),
        UpdateOrder::BackToFront => Box::new((timin..=timax).rev()),
    };
    indices
        .filter_map(|i| polygon_at_index(bbox, ray, dt, i))
        .collect()
}

/// Number of slices spanning a diagonal of length `diag_len`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn num_slices(diag_len: f64, dt: f64) -> u32 {
    if dt <= 0.0 {
        return 0;
    }
    (diag_len / dt) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray_z() -> Ray {
        Ray::new(DVec3::new(0.5, 0.5, -2.0), DVec3::Z)
    }

    #[test]
    fn test_axis_aligned_slice_is_quad() {
        let poly = slice_polygon(&BBox::unit(), &ray_z(), 2.5).unwrap();
        assert_eq!(poly.len(), 4);
        for (p, tc) in poly.vertices.iter().zip(&poly.texcoords) {
            assert!((p.z - 0.5).abs() < 1e-12);
            assert!((tc.z - 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn test_corner_slice_is_triangle() {
        let ray = Ray::new(DVec3::ZERO, DVec3::ONE);
        let poly = slice_polygon(&BBox::unit(), &ray, 0.25).unwrap();
        assert_eq!(poly.len(), 3);
    }

    #[test]
    fn test_center_diagonal_slice_is_hexagon() {
        let ray = Ray::new(DVec3::ZERO, DVec3::ONE);
        let t = ray.project(DVec3::splat(0.5));
        let poly = slice_polygon(&BBox::unit(), &ray, t).unwrap();
        assert_eq!(poly.len(), 6);
    }

    #[test]
    fn test_missing_plane_yields_none() {
        assert!(slice_polygon(&BBox::unit(), &ray_z(), 10.0).is_none());
        assert!(slice_polygon(&BBox::unit(), &ray_z(), 1.999).is_none());
        // The plane z = 0 coincides with the front face.
        assert_eq!(slice_polygon(&BBox::unit(), &ray_z(), 2.0).unwrap().len(), 4);
    }

    #[test]
    fn test_compute_polygons_order() {
        let f2b = compute_polygons(&BBox::unit(), &ray_z(), 0.25, UpdateOrder::FrontToBack);
        let b2f = compute_polygons(&BBox::unit(), &ray_z(), 0.25, UpdateOrder::BackToFront);
        assert_eq!(f2b.len(), 5);
        assert!(f2b.windows(2).all(|w| w[0].t < w[1].t));
        assert!(b2f.windows(2).all(|w| w[0].t > w[1].t));
    }

    #[test]
    fn test_outline_is_closed() {
        let poly = slice_polygon(&BBox::unit(), &ray_z(), 2.5).unwrap();
        let outline = poly.outline();
        assert_eq!(outline.len(), 4);
        assert_eq!(outline[3][1], outline[0][0]);
    }

    #[test]
    fn test_box_edges_are_axis_aligned() {
        for [a, b] in box_edges(&BBox::unit()) {
            let d = (b - a).abs();
            assert!((d.x + d.y + d.z - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_num_slices() {
        assert_eq!(num_slices(1.0, 0.25), 4);
        assert_eq!(num_slices(1.0, 0.0), 0);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn slices_stay_in_box_and_on_plane(
                dir in prop::array::uniform3(-1.0f64..1.0),
                s in 0.0f64..1.0,
            ) {
                let direction = DVec3::from_array(dir);
                prop_assume!(direction.length() > 0.1);
                let bbox = BBox::new(DVec3::new(0.0, 0.25, 0.5), DVec3::new(0.5, 1.0, 1.0));
                let ray = Ray::new(DVec3::splat(-3.0), direction);
                let ts = bbox.corners().map(|c| ray.project(c));
                let (lo, hi) = ts.iter().fold((f64::MAX, f64::MIN), |(a, b), t| (a.min(*t), b.max(*t)));
                let t = lo + (hi - lo) * s;
                if let Some(poly) = slice_polygon(&bbox, &ray, t) {
                    prop_assert!((3..=6).contains(&poly.len()));
                    for p in &poly.vertices {
                        prop_assert!((ray.project(*p) - t).abs() < 1e-9);
                        prop_assert!(p.cmpge(bbox.min - 1e-9).all() && p.cmple(bbox.max + 1e-9).all());
                    }
                    for tc in &poly.texcoords {
                        prop_assert!(tc.cmpge(DVec3::ZERO).all() && tc.cmple(DVec3::ONE).all());
                    }
                }
            }
        }
    }
}
