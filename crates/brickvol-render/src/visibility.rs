//! Brick visibility tests, depth ordering, and time-index windows.

use std::collections::HashSet;

use brickvol_core::{BBox, Brick, ClipPlanes, ClipRegion, DMat4, DVec3, Ray, UpdateOrder};
use glam::DVec4;

use crate::backend::Viewport;

/// Camera state of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub modelview: DMat4,
    pub projection: DMat4,
    pub orthographic: bool,
    pub viewport: Viewport,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            modelview: DMat4::IDENTITY,
            projection: DMat4::IDENTITY,
            orthographic: true,
            viewport: Viewport::sized(800, 600),
        }
    }
}

impl ViewState {
    /// Full transform from volume index space to clip space.
    pub fn mvp(&self, field: &DMat4) -> DMat4 {
        self.projection * self.modelview * *field
    }

    /// World-space viewing direction (negated third row of the modelview).
    pub fn world_direction(&self) -> DVec3 {
        let m = &self.modelview;
        DVec3::new(-m.x_axis.z, -m.y_axis.z, -m.z_axis.z)
            .try_normalize()
            .unwrap_or(DVec3::NEG_Z)
    }
}

/// Eye position and viewing direction in volume index space.
pub fn compute_view(view: &ViewState, field: &DMat4) -> Ray {
    let inv = (view.modelview * *field).inverse();
    let eye = inv.transform_point3(DVec3::ZERO);
    let dir = inv.transform_vector3(DVec3::NEG_Z);
    Ray::new(eye, dir)
}

/// How stretched the field transform is along the view and along its longest axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingScale {
    /// Length of the view direction after the field transform.
    pub view_len: f64,
    /// Longest transformed basis vector.
    pub max_axis_len: f64,
}

impl SamplingScale {
    pub fn new(view: &ViewState, field: &DMat4) -> Self {
        let dir = view.world_direction();
        let v = field.transform_vector3(dir).normalize_or_zero();
        let view_len = dir.dot(field.transform_vector3(v)).abs();
        let max_axis_len = [DVec3::X, DVec3::Y, DVec3::Z]
            .iter()
            .map(|e| field.transform_vector3(*e).length())
            .fold(0.0, f64::max);
        Self {
            view_len: if view_len > 1e-12 { view_len } else { 1.0 },
            max_axis_len: if max_axis_len > 1e-12 {
                max_axis_len
            } else {
                1.0
            },
        }
    }

    /// Slice spacing in index space for a world spacing `dt`.
    ///
    /// `sampling_frq_fac > 0` forces a shared reference length across volumes.
    pub fn index_dt(&self, dt: f64, sampling_frq_fac: f64) -> f64 {
        let maxlen = if sampling_frq_fac > 0.0 {
            sampling_frq_fac
        } else {
            self.max_axis_len
        };
        dt * maxlen / self.view_len
    }

    /// Opacity correction relative to the shared reference length.
    pub fn rate_fac(&self, sampling_frq_fac: f64) -> f64 {
        if sampling_frq_fac > 0.0 {
            sampling_frq_fac / self.max_axis_len
        } else {
            1.0
        }
    }
}

/// Returns false when the box cannot contribute to the image.
///
/// A box is rejected when all its corners are outside one side of the view frustum,
/// when it lies wholly behind one clip plane, or when it misses the clip region.
pub fn test_against_view(
    bbox: &BBox,
    mvp: &DMat4,
    planes: &ClipPlanes,
    region: Option<&ClipRegion>,
) -> bool {
    let corners = bbox.corners();
    let clip: [DVec4; 8] = corners.map(|c| *mvp * c.extend(1.0));

    let outside: [fn(&DVec4) -> bool; 6] = [
        |p: &DVec4| p.x < -p.w,
        |p: &DVec4| p.x > p.w,
        |p: &DVec4| p.y < -p.w,
        |p: &DVec4| p.y > p.w,
        |p: &DVec4| p.z < -p.w,
        |p: &DVec4| p.z > p.w,
    ];
    if outside.iter().any(|side| clip.iter().all(|p| side(p))) {
        return false;
    }
    if planes.rejects_box(&corners) {
        return false;
    }
    region.map_or(true, |r| r.overlaps_box(&corners))
}

/// Depth of a box along the ray: its nearest corner.
///
/// Orthographic views measure along the direction; perspective views measure the
/// Euclidean distance from the eye.
pub fn depth_key(bbox: &BBox, ray: &Ray, orthographic: bool) -> f64 {
    bbox.corners()
        .iter()
        .map(|c| {
            if orthographic {
                ray.project(*c)
            } else {
                (*c - ray.origin).length()
            }
        })
        .fold(f64::MAX, f64::min)
}

fn sort_by_key(indices: &mut [usize], key: impl Fn(usize) -> f64, order: UpdateOrder) {
    indices.sort_by(|&a, &b| {
        let ord = key(a).total_cmp(&key(b)).then(a.cmp(&b));
        if order.is_front_to_back() {
            ord
        } else {
            ord.reverse()
        }
    });
}

/// Stores every brick's depth key and returns the brick indices in draw order.
pub fn sort_bricks(
    bricks: &mut [Brick],
    ray: &Ray,
    orthographic: bool,
    order: UpdateOrder,
) -> Vec<usize> {
    for brick in bricks.iter_mut() {
        let d = depth_key(brick.bbox(), ray, orthographic);
        brick.set_d(d);
    }
    let mut indices: Vec<usize> = (0..bricks.len()).collect();
    sort_by_key(&mut indices, |i| bricks[i].d(), order);
    indices
}

/// The time-index window `[timin, timax]` covered by a box.
///
/// Returns `None` when no slice index falls inside the box.
#[allow(clippy::cast_possible_truncation)]
pub fn compute_t_index(bbox: &BBox, ray: &Ray, dt: f64) -> Option<(i32, i32)> {
    if dt <= 0.0 {
        return None;
    }
    let (tmin, tmax) = bbox
        .corners()
        .iter()
        .map(|c| ray.project(*c))
        .fold((f64::MAX, f64::MIN), |(lo, hi), t| (lo.min(t), hi.max(t)));
    let timin = (tmin / dt).ceil() as i32;
    let timax = (tmax / dt).floor() as i32;
    (timax >= timin).then_some((timin, timax))
}

/// Brick indices ordered by distance from `center`, nearest first.
fn distance_ranking(bricks: &[Brick], center: DVec3) -> Vec<usize> {
    let dist: Vec<f64> = bricks
        .iter()
        .map(|b| (b.bbox().center() - center).length())
        .collect();
    let mut ranked: Vec<usize> = (0..bricks.len()).collect();
    sort_by_key(&mut ranked, |i| dist[i], UpdateOrder::FrontToBack);
    ranked
}

/// Ranks bricks by distance from `center`, nearest first, storing the rank in `ind`.
fn rank_by_distance(bricks: &mut [Brick], center: DVec3) -> Vec<usize> {
    let ranked = distance_ranking(bricks, center);
    for (rank, &i) in ranked.iter().enumerate() {
        bricks[i].set_ind(rank);
    }
    ranked
}

/// Picks at most `quota` bricks nearest to `center` and returns them in draw order.
pub fn closest_bricks(
    bricks: &mut [Brick],
    center: DVec3,
    quota: usize,
    ray: &Ray,
    orthographic: bool,
    order: UpdateOrder,
) -> Vec<usize> {
    let ranked = rank_by_distance(bricks, center);
    let mut picked: Vec<usize> = ranked
        .into_iter()
        .filter(|&i| !bricks[i].is_skipped())
        .take(quota)
        .collect();
    for &i in &picked {
        let d = depth_key(bricks[i].bbox(), ray, orthographic);
        bricks[i].set_d(d);
    }
    sort_by_key(&mut picked, |i| bricks[i].d(), order);
    picked
}

/// Builds matching quota selections for several co-registered volumes.
///
/// Each volume contributes its `quota` nearest bricks; the union is deduplicated by
/// rank, ordered by the depth of the first volume's slightly shrunk boxes, and mapped
/// back onto every volume by rank. Returns one list of brick indices per volume.
pub fn combine_quota_bricks(
    volumes: &mut [&mut [Brick]],
    center: DVec3,
    quota: usize,
    ray: &Ray,
    orthographic: bool,
    order: UpdateOrder,
) -> Vec<Vec<usize>> {
    if volumes.is_empty() {
        return Vec::new();
    }
    let ranked: Vec<Vec<usize>> = volumes
        .iter_mut()
        .map(|bricks| rank_by_distance(bricks, center))
        .collect();

    let mut seen = HashSet::new();
    let mut ranks: Vec<usize> = Vec::new();
    for (bricks, order_v) in volumes.iter().zip(&ranked) {
        for &i in order_v
            .iter()
            .filter(|&&i| !bricks[i].is_skipped())
            .take(quota)
        {
            let rank = bricks[i].ind();
            if rank < ranked[0].len() && seen.insert(rank) {
                ranks.push(rank);
            }
        }
    }

    let first = &volumes[0];
    let keys: Vec<f64> = ranks
        .iter()
        .map(|&r| depth_key(&first[ranked[0][r]].bbox().shrunk(1000.0), ray, orthographic))
        .collect();
    let mut positions: Vec<usize> = (0..ranks.len()).collect();
    sort_by_key(&mut positions, |p| keys[p], order);

    ranked
        .iter()
        .map(|order_v| {
            positions
                .iter()
                .filter_map(|&p| order_v.get(ranks[p]).copied())
                .collect()
        })
        .collect()
}

/// Number of bricks [`combine_quota_bricks`] selects from each volume.
///
/// Leaves the bricks untouched, so a frame can be sized before it is drawn.
pub fn combined_quota_sizes(volumes: &[&[Brick]], center: DVec3, quota: usize) -> Vec<usize> {
    let ranked: Vec<Vec<usize>> = volumes
        .iter()
        .map(|bricks| distance_ranking(bricks, center))
        .collect();
    let Some(first_len) = ranked.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut ranks = HashSet::new();
    for (bricks, order_v) in volumes.iter().zip(&ranked) {
        ranks.extend(
            order_v
                .iter()
                .enumerate()
                .filter(|(_, &i)| !bricks[i].is_skipped())
                .take(quota)
                .map(|(rank, _)| rank)
                .filter(|&rank| rank < first_len),
        );
    }
    ranked
        .iter()
        .map(|order_v| ranks.iter().filter(|&&r| r < order_v.len()).count())
        .collect()
}
