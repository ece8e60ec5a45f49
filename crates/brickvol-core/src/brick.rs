//! Bricks: the unit of streaming and draw ordering.

use glam::{DMat4, DVec3, UVec3};

use crate::BBox;

/// Distinct purposes a brick can be drawn for within one streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderPurpose {
    /// Regular color rendering.
    Normal,
    /// Rendering that shows the mask channel.
    Mask,
    /// Rendering that shows the label channel.
    Label,
    /// Depth-encoded rendering for shadows.
    Depth,
}

/// Number of [`RenderPurpose`] variants.
pub const RENDER_PURPOSE_COUNT: usize = 4;

impl RenderPurpose {
    pub const ALL: [RenderPurpose; RENDER_PURPOSE_COUNT] = [
        RenderPurpose::Normal,
        RenderPurpose::Mask,
        RenderPurpose::Label,
        RenderPurpose::Depth,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// A sub-region of a volume with its own voxel payload.
///
/// The geometry (`bbox`, `dbox`, dimensions) is fixed once the volume is decomposed.
/// The remaining fields are transient scheduling state rewritten every frame.
#[derive(Debug, Clone)]
pub struct Brick {
    bbox: BBox,
    dbox: BBox,
    dims: UVec3,
    offset: UVec3,

    d: f64,
    ind: usize,
    priority: u32,
    drawn: [bool; RENDER_PURPOSE_COUNT],
    timin: i32,
    timax: i32,
    rate_fac: f64,
}

impl Brick {
    /// Creates a brick covering `bbox` with `dims` voxels starting at `offset`.
    ///
    /// The display box defaults to the model box.
    pub fn new(bbox: BBox, dims: UVec3, offset: UVec3) -> Self {
        Self {
            bbox,
            dbox: bbox,
            dims: dims.max(UVec3::ONE),
            offset,
            d: 0.0,
            ind: 0,
            priority: 0,
            drawn: [false; RENDER_PURPOSE_COUNT],
            timin: 0,
            timax: -1,
            rate_fac: 1.0,
        }
    }

    /// Sets a display box differing from the model box (e.g. with a border).
    #[must_use]
    pub fn with_dbox(mut self, dbox: BBox) -> Self {
        self.dbox = dbox;
        self
    }

    pub fn bbox(&self) -> &BBox {
        &self.bbox
    }

    pub fn dbox(&self) -> &BBox {
        &self.dbox
    }

    pub fn nx(&self) -> u32 {
        self.dims.x
    }

    pub fn ny(&self) -> u32 {
        self.dims.y
    }

    pub fn nz(&self) -> u32 {
        self.dims.z
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    /// Voxel offset of this brick inside its volume.
    pub fn offset(&self) -> UVec3 {
        self.offset
    }

    /// Number of voxels in the brick.
    pub fn voxel_count(&self) -> usize {
        self.dims.x as usize * self.dims.y as usize * self.dims.z as usize
    }

    pub fn d(&self) -> f64 {
        self.d
    }

    pub fn set_d(&mut self, d: f64) {
        self.d = d;
    }

    pub fn ind(&self) -> usize {
        self.ind
    }

    pub fn set_ind(&mut self, ind: usize) {
        self.ind = ind;
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    /// A positive priority means the brick is skipped this frame.
    pub fn set_priority(&mut self, priority: u32) {
        self.priority = priority;
    }

    pub fn is_skipped(&self) -> bool {
        self.priority > 0
    }

    pub fn drawn(&self, purpose: RenderPurpose) -> bool {
        self.drawn[purpose.index()]
    }

    pub fn set_drawn(&mut self, purpose: RenderPurpose, drawn: bool) {
        self.drawn[purpose.index()] = drawn;
    }

    /// Clears every drawn flag.
    pub fn reset_drawn(&mut self) {
        self.drawn = [false; RENDER_PURPOSE_COUNT];
    }

    pub fn timin(&self) -> i32 {
        self.timin
    }

    pub fn timax(&self) -> i32 {
        self.timax
    }

    /// Returns true when the time-index window holds at least one index.
    pub fn has_window(&self) -> bool {
        self.timax >= self.timin
    }

    pub fn set_window(&mut self, timin: i32, timax: i32) {
        self.timin = timin;
        self.timax = timax;
    }

    /// Returns true if the time index lies inside the window.
    pub fn covers(&self, index: i32) -> bool {
        index >= self.timin && index <= self.timax
    }

    pub fn rate_fac(&self) -> f64 {
        self.rate_fac
    }

    pub fn set_rate_fac(&mut self, rate_fac: f64) {
        self.rate_fac = rate_fac;
    }

    /// Transform mapping the unit cube onto the display box.
    pub fn unit_cube_transform(&self) -> DMat4 {
        DMat4::from_translation(self.dbox.min) * DMat4::from_scale(self.dbox.diagonal())
    }

    /// Transform mapping the unit cube onto the model box.
    pub fn bbox_transform(&self) -> DMat4 {
        DMat4::from_translation(self.bbox.min) * DMat4::from_scale(self.bbox.diagonal())
    }

    /// Inverse voxel size in texture space: `(1/nx, 1/ny, 1/nz)`.
    pub fn inv_dims(&self) -> DVec3 {
        DVec3::ONE / self.dims.as_dvec3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brick() -> Brick {
        Brick::new(
            BBox::new(DVec3::new(0.5, 0.0, 0.0), DVec3::new(1.0, 0.5, 0.25)),
            UVec3::new(64, 64, 32),
            UVec3::new(64, 0, 0),
        )
    }

    #[test]
    fn test_drawn_flags_are_per_purpose() {
        let mut b = brick();
        b.set_drawn(RenderPurpose::Mask, true);
        assert!(b.drawn(RenderPurpose::Mask));
        assert!(!b.drawn(RenderPurpose::Normal));
        b.reset_drawn();
        assert!(!b.drawn(RenderPurpose::Mask));
    }

    #[test]
    fn test_window_defaults_to_empty() {
        let mut b = brick();
        assert!(!b.has_window());
        b.set_window(3, 7);
        assert!(b.covers(3) && b.covers(7) && !b.covers(8));
    }

    #[test]
    fn test_unit_cube_transform() {
        let b = brick();
        let m = b.unit_cube_transform();
        let p = m.transform_point3(DVec3::ONE);
        assert!((p - DVec3::new(1.0, 0.5, 0.25)).length() < 1e-12);
        let q = m.transform_point3(DVec3::ZERO);
        assert!((q - DVec3::new(0.5, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_zero_dims_are_clamped() {
        let b = Brick::new(BBox::unit(), UVec3::ZERO, UVec3::ZERO);
        assert_eq!(b.dims(), UVec3::ONE);
        assert_eq!(b.voxel_count(), 1);
    }
}
