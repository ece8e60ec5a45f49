//! Shader parameter slots and the per-colormap uniform table.
//!
//! Volume, segmentation, and image shaders read sixteen `vec4` parameters and four
//! matrices. Both renderers fill them through the helpers here so that the slot
//! layout is defined once.

use brickvol_core::{
    ClipPlaneUniforms, ClipPlanes, ColormapMode, DMat4, DVec3, Hsv, Mat4, ShaderBucket,
    VolumeParams, Vec4, COLORMAP_MODE_COUNT,
};

use crate::backend::CommandSink;

/// Number of `vec4` parameter slots.
pub const PARAM_SLOTS: usize = 16;
/// Number of matrix slots.
pub const MATRIX_SLOTS: usize = 4;

/// Parameter slot assignments.
pub mod slot {
    /// Light direction and alpha.
    pub const LIGHT: u32 = 0;
    /// Ambient, diffuse, specular, shine.
    pub const MATERIAL: u32 = 1;
    /// Scalar scale, gradient scale, low and high thresholds.
    pub const TRANSFER: u32 = 2;
    /// Inverse gamma, gradient threshold, offset, soft threshold.
    pub const GAMMA: u32 = 3;
    /// Inverse brick dimensions and opacity correction.
    pub const BRICK: u32 = 4;
    pub const SPACING: u32 = 5;
    /// Colormap-dependent color parameters.
    pub const COLOR: u32 = 6;
    /// Inverse target size, or segmentation thresholds.
    pub const VIEWPORT: u32 = 7;
    pub const PAINT: u32 = 8;
    pub const DIMS: u32 = 9;
    /// First of the six clip plane slots.
    pub const CLIP_BASE: u32 = 10;
}

/// Matrix slot assignments.
pub mod matrix {
    pub const MODELVIEW: u32 = 0;
    pub const PROJECTION: u32 = 1;
    pub const BRICK: u32 = 2;
    pub const INV_MODELVIEW: u32 = 3;
}

/// Builds an `f32` parameter from `f64` components.
#[allow(clippy::cast_possible_truncation)]
pub fn vec4(x: f64, y: f64, z: f64, w: f64) -> Vec4 {
    Vec4::new(x as f32, y as f32, z as f32, w as f32)
}

pub fn mat4(m: &DMat4) -> Mat4 {
    m.as_mat4()
}

/// CPU mirror of the parameter and matrix slots, laid out for a uniform buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ParamBlock {
    pub params: [[f32; 4]; PARAM_SLOTS],
    pub matrices: [[f32; 16]; MATRIX_SLOTS],
}

impl Default for ParamBlock {
    fn default() -> Self {
        Self {
            params: [[0.0; 4]; PARAM_SLOTS],
            matrices: [Mat4::IDENTITY.to_cols_array(); MATRIX_SLOTS],
        }
    }
}

impl ParamBlock {
    pub fn set_param(&mut self, slot: u32, value: Vec4) {
        if let Some(dst) = self.params.get_mut(slot as usize) {
            *dst = value.to_array();
        }
    }

    pub fn param(&self, slot: u32) -> Vec4 {
        self.params
            .get(slot as usize)
            .map_or(Vec4::ZERO, |p| Vec4::from_array(*p))
    }

    pub fn set_matrix(&mut self, slot: u32, value: Mat4) {
        if let Some(dst) = self.matrices.get_mut(slot as usize) {
            *dst = value.to_cols_array();
        }
    }

    pub fn matrix(&self, slot: u32) -> Mat4 {
        self.matrices
            .get(slot as usize)
            .map_or(Mat4::IDENTITY, Mat4::from_cols_array)
    }
}

/// Per-draw values the colormap fillers need besides the volume parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColormapContext {
    /// Size of the accumulation target.
    pub target_width: u32,
    pub target_height: u32,
    /// The mask channel is shown without labels.
    pub mask_shown: bool,
    /// Selects how the index shader writes ids.
    pub id_mode: f64,
}

impl ColormapContext {
    pub fn new(target_width: u32, target_height: u32) -> Self {
        Self {
            target_width,
            target_height,
            mask_shown: false,
            id_mode: 0.0,
        }
    }

    fn inv_size(&self) -> (f64, f64) {
        (
            1.0 / f64::from(self.target_width.max(1)),
            1.0 / f64::from(self.target_height.max(1)),
        )
    }
}

/// Computes the colormap-dependent slot and its value for one volume.
pub type UniformFill = fn(&VolumeParams, &ColormapContext) -> (u32, Vec4);

/// One row of the colormap table.
#[derive(Clone, Copy)]
pub struct ColormapEntry {
    pub mode: ColormapMode,
    /// Shader buckets for opaque and solid rendering.
    pub buckets: [ShaderBucket; 2],
    pub fill: UniformFill,
}

impl ColormapEntry {
    const fn new(mode: ColormapMode, fill: UniformFill) -> Self {
        Self {
            mode,
            buckets: [ShaderBucket::new(mode, false), ShaderBucket::new(mode, true)],
            fill,
        }
    }

    /// The shader bucket a volume in this mode is drawn with.
    pub fn bucket(&self, solid: bool) -> ShaderBucket {
        self.buckets[usize::from(solid)]
    }
}

/// Shader buckets and uniform fillers indexed by [`ColormapMode::index`].
pub static COLORMAP_TABLE: [ColormapEntry; COLORMAP_MODE_COUNT] = [
    ColormapEntry::new(ColormapMode::Default, fill_default),
    ColormapEntry::new(ColormapMode::Rainbow, fill_rainbow),
    ColormapEntry::new(ColormapMode::Depth, fill_depth),
    ColormapEntry::new(ColormapMode::Index, fill_index),
];

/// The table row for `mode`.
pub fn colormap_entry(mode: ColormapMode) -> &'static ColormapEntry {
    &COLORMAP_TABLE[mode.index()]
}

fn fill_default(params: &VolumeParams, ctx: &ColormapContext) -> (u32, Vec4) {
    let (color, thresh) = if ctx.mask_shown {
        (params.mask_color(), params.mask_thresh)
    } else {
        (params.color(), 0.0)
    };
    let c = color.as_dvec3();
    (slot::COLOR, vec4(c.x, c.y, c.z, thresh))
}

fn fill_rainbow(params: &VolumeParams, _ctx: &ColormapContext) -> (u32, Vec4) {
    let (lo, hi) = (params.colormap_low, params.colormap_high);
    (slot::COLOR, vec4(lo, hi, hi - lo, 0.0))
}

fn fill_depth(_params: &VolumeParams, ctx: &ColormapContext) -> (u32, Vec4) {
    let (iw, ih) = ctx.inv_size();
    (slot::VIEWPORT, vec4(iw, ih, 0.0, 0.0))
}

fn fill_index(params: &VolumeParams, ctx: &ColormapContext) -> (u32, Vec4) {
    let (iw, ih) = ctx.inv_size();
    let luminance = f64::from(Hsv::from_rgb(params.color()).val);
    (slot::COLOR, vec4(iw, ih, luminance, ctx.id_mode))
}

/// Fills the colormap slot for `mode`.
pub fn fill_colormap<S: CommandSink + ?Sized>(
    sink: &mut S,
    mode: ColormapMode,
    params: &VolumeParams,
    ctx: &ColormapContext,
) {
    let (slot, value) = (colormap_entry(mode).fill)(params, ctx);
    sink.set_param(slot, value);
}

/// Fills the lighting, material, transfer, gamma, and spacing slots.
pub fn set_shading_params<S: CommandSink + ?Sized>(
    sink: &mut S,
    params: &VolumeParams,
    light: DVec3,
    spacing: DVec3,
) {
    let light = light.normalize_or_zero();
    sink.set_param(slot::LIGHT, vec4(light.x, light.y, light.z, params.alpha));
    let diffuse = if params.shading { params.diffuse } else { 0.0 };
    sink.set_param(
        slot::MATERIAL,
        vec4(2.0 - params.ambient, diffuse, params.specular, params.shine),
    );
    sink.set_param(slot::SPACING, vec4(spacing.x, spacing.y, spacing.z, 1.0));
    sink.set_param(
        slot::TRANSFER,
        vec4(
            params.signed_scalar_scale(),
            params.gm_scale,
            params.lo_thresh,
            params.hi_thresh,
        ),
    );
    set_gamma_params(sink, params);
}

/// Fills only the gamma slot.
pub fn set_gamma_params<S: CommandSink + ?Sized>(sink: &mut S, params: &VolumeParams) {
    let inv_gamma = if params.gamma3d.abs() > f64::EPSILON {
        1.0 / params.gamma3d
    } else {
        1.0
    };
    sink.set_param(
        slot::GAMMA,
        vec4(
            inv_gamma,
            params.gm_thresh,
            params.offset,
            params.soft_threshold,
        ),
    );
}

/// Uploads the six clip planes into slots 10..15.
pub fn set_clip_planes<S: CommandSink + ?Sized>(sink: &mut S, planes: &ClipPlanes) {
    let uniforms = ClipPlaneUniforms::from(planes);
    for (slot, plane) in (slot::CLIP_BASE..).zip(uniforms.planes) {
        sink.set_param(slot, Vec4::from_array(plane));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_match_modes() {
        for (i, entry) in COLORMAP_TABLE.iter().enumerate() {
            assert_eq!(entry.mode.index(), i);
        }
    }

    #[test]
    fn test_table_provides_shader_buckets() {
        let entry = colormap_entry(ColormapMode::Index);
        assert_eq!(entry.bucket(false), ShaderBucket::new(ColormapMode::Index, false));
        assert!(entry.bucket(true).solid);
        let indices: std::collections::HashSet<usize> = COLORMAP_TABLE
            .iter()
            .flat_map(|e| e.buckets.map(ShaderBucket::index))
            .collect();
        assert_eq!(indices.len(), ShaderBucket::COUNT);
    }

    #[test]
    fn test_fillers_pick_slots() {
        let mut params = VolumeParams::default();
        params.colormap_low = 0.2;
        params.colormap_high = 0.7;
        let ctx = ColormapContext::new(200, 100);
        let (s, v) = (COLORMAP_TABLE[ColormapMode::Rainbow.index()].fill)(&params, &ctx);
        assert_eq!(s, slot::COLOR);
        assert!((v.z - 0.5).abs() < 1e-6);
        let (s, v) = (COLORMAP_TABLE[ColormapMode::Depth.index()].fill)(&params, &ctx);
        assert_eq!(s, slot::VIEWPORT);
        assert!((v.x - 0.005).abs() < 1e-6 && (v.y - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_default_fill_uses_mask_color_when_shown() {
        let params = VolumeParams::default();
        let ctx = ColormapContext {
            mask_shown: true,
            ..ColormapContext::new(1, 1)
        };
        let (_, v) = fill_default(&params, &ctx);
        assert_eq!(v.truncate(), params.mask_color());
    }

    #[test]
    fn test_param_block_defaults() {
        let block = ParamBlock::default();
        assert_eq!(block.matrix(matrix::BRICK), Mat4::IDENTITY);
        assert_eq!(block.param(slot::COLOR), Vec4::ZERO);
        assert_eq!(std::mem::size_of::<ParamBlock>(), 16 * 16 + 4 * 64);
    }

    #[test]
    fn test_param_block_ignores_out_of_range() {
        let mut block = ParamBlock::default();
        block.set_param(99, Vec4::ONE);
        block.set_param(3, Vec4::ONE);
        assert_eq!(block.param(3), Vec4::ONE);
        assert_eq!(block.param(99), Vec4::ZERO);
    }
}
