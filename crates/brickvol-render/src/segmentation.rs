//! Mask and label generation, voxel calculations, and readback.
//!
//! These passes draw axis-aligned layers into brick textures instead of view-aligned
//! slices: for every brick the viewport is set to the brick's `nx x ny` and each z
//! layer of the target texture is rendered in turn.

use brickvol_core::{
    CalcOp, ColormapMode, HiddenRemoval, LabelMode, LabelOp, MaskOp, PaintMode, RenderMode,
    SegShaderKey, UVec3, UpdateOrder, VolumeTexture,
};

use crate::backend::{units, Channel, RenderBackend, RenderTarget, TextureHandle, Viewport};
use crate::error::{RenderError, RenderResult};
use crate::mask_threshold;
use crate::uniforms::{
    fill_colormap, mat4, matrix, set_clip_planes, set_gamma_params, set_shading_params, slot,
    vec4, ColormapContext,
};
use crate::visibility::{compute_view, sort_bricks, ViewState};
use crate::volume_renderer::VolumeRenderer;

/// Inputs of a mask pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    pub op: MaskOp,
    pub paint_mode: PaintMode,
    pub hidden_removal: HiddenRemoval,
    /// A 2D weight map accompanies the paint stroke.
    pub use_2d_weight: bool,
    pub ini_thresh: f64,
    pub gm_falloff: f64,
    pub scl_falloff: f64,
    pub scl_translate: f64,
    pub w2d: f64,
    pub bins: f64,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            op: MaskOp::Initialize,
            paint_mode: PaintMode::Select,
            hidden_removal: HiddenRemoval::None,
            use_2d_weight: false,
            ini_thresh: 0.0,
            gm_falloff: 1.0,
            scl_falloff: 0.0,
            scl_translate: 0.0,
            w2d: 0.0,
            bins: 0.0,
        }
    }
}

/// Inputs of a label pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelParams {
    pub op: LabelOp,
    pub mode: LabelMode,
    pub thresh: f64,
}

impl Default for LabelParams {
    fn default() -> Self {
        Self {
            op: LabelOp::Initialize,
            mode: LabelMode::Normal,
            thresh: 0.0,
        }
    }
}

/// Draws every z layer of `target` at the layer centers.
fn draw_layers<B: RenderBackend + ?Sized>(backend: &mut B, target: TextureHandle, nz: u32) {
    for z in 0..nz {
        backend.bind_target(RenderTarget::Layer { texture: target, z });
        backend.draw_layer((f64::from(z) + 0.5) / f64::from(nz));
    }
}

fn restore<B: RenderBackend + ?Sized>(backend: &mut B, viewport: Viewport, used_units: &[u32]) {
    backend.set_viewport(viewport);
    backend.bind_target(RenderTarget::Frame);
    for unit in used_units {
        backend.bind_texture(*unit, None);
    }
    backend.release_shader();
}

fn read_channel<B: RenderBackend + ?Sized>(
    backend: &mut B,
    tex: &VolumeTexture,
    channel: Channel,
) -> RenderResult<Vec<Vec<u8>>> {
    let mut payloads = Vec::with_capacity(tex.brick_count());
    for (i, brick) in tex.bricks().iter().enumerate() {
        let brick_ref = tex.brick_ref(i);
        if backend
            .load_brick(brick_ref, brick.dims(), channel, wgpu::FilterMode::Nearest)
            .is_none()
        {
            return Err(RenderError::ReadbackFailed(format!(
                "brick {i} {channel:?} could not be made resident"
            )));
        }
        payloads.push(backend.read_back(brick_ref, channel)?);
    }
    Ok(payloads)
}

impl VolumeRenderer {
    /// Generates or refines the mask, or removes noise from the data.
    pub fn draw_mask<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        view: &ViewState,
        mask: &MaskParams,
    ) -> RenderResult<()> {
        if self.texture.as_ref().map_or(true, |t| t.brick_count() == 0) {
            return Ok(());
        }
        let noise_removal = mask.op == MaskOp::NoiseRemove;
        let key = SegShaderKey::Mask {
            op: mask.op,
            paint_mode: mask.paint_mode,
            hidden_removal: mask.hidden_removal,
            use_2d_weight: mask.use_2d_weight && !noise_removal,
            depth_peel: 0,
            hi_quality: true,
        };
        let shader = backend.seg_shader(&key)?;

        let params = &self.params;
        let planes = &self.planes;
        let Some(tex) = self.texture.as_mut() else {
            return Ok(());
        };
        let ray = compute_view(view, tex.transform());
        let sequence = sort_bricks(
            tex.bricks_mut(),
            &ray,
            view.orthographic,
            UpdateOrder::BackToFront,
        );

        backend.set_blend(0, None);
        backend.bind_shader(shader);
        set_shading_params(backend, params, ray.direction, tex.spacing());
        fill_colormap(
            backend,
            ColormapMode::Default,
            params,
            &ColormapContext::new(1, 1),
        );
        backend.set_param(
            slot::VIEWPORT,
            vec4(
                mask.ini_thresh,
                mask.gm_falloff,
                mask.scl_falloff,
                mask.scl_translate,
            ),
        );
        backend.set_param(slot::PAINT, vec4(mask.w2d, mask.bins, 0.0, 0.0));
        set_clip_planes(backend, planes);

        let modelview = view.modelview * *tex.transform();
        backend.set_matrix(matrix::MODELVIEW, mat4(&modelview));
        backend.set_matrix(matrix::PROJECTION, mat4(&view.projection));
        if mask.hidden_removal != HiddenRemoval::None {
            backend.set_matrix(matrix::INV_MODELVIEW, mat4(&modelview.inverse()));
        }

        let rate_term = if params.render_mode == RenderMode::Over {
            1.0 / params.sampling_rate()
        } else {
            1.0
        };
        let saved = backend.viewport();
        for i in sequence {
            let brick = &tex.bricks()[i];
            let dims = brick.dims();
            let inv = brick.inv_dims();
            backend.set_matrix(matrix::BRICK, mat4(&brick.bbox_transform()));
            backend.set_viewport(Viewport::sized(dims.x, dims.y));

            let brick_ref = tex.brick_ref(i);
            let data = backend.load_brick(brick_ref, dims, Channel::Data, wgpu::FilterMode::Nearest);
            let mask_tex =
                backend.load_brick(brick_ref, dims, Channel::Mask, wgpu::FilterMode::Nearest);
            let target = if noise_removal { data } else { mask_tex };
            let Some(target) = target else {
                log::warn!("brick {i} has no writable texture for {:?}, skipping", mask.op);
                continue;
            };
            backend.bind_texture(units::DATA, data);
            backend.bind_texture(units::MASK, mask_tex);
            backend.set_param(slot::BRICK, vec4(inv.x, inv.y, inv.z, rate_term));
            draw_layers(backend, target, dims.z);
        }
        restore(backend, saved, &[units::DATA, units::MASK]);

        if !noise_removal {
            tex.set_has_mask(true);
        }
        Ok(())
    }

    /// Generates labels inside the mask, or spreads them with a maximum filter.
    pub fn draw_label<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        view: &ViewState,
        label: &LabelParams,
    ) -> RenderResult<()> {
        if self.texture.as_ref().map_or(true, |t| t.brick_count() == 0) {
            return Ok(());
        }
        let has_mask = self.texture.as_ref().is_some_and(VolumeTexture::has_mask);
        let key = SegShaderKey::Label {
            op: label.op,
            mode: label.mode,
            has_mask,
            hi_quality: true,
        };
        let shader = backend.seg_shader(&key)?;

        let params = &self.params;
        let Some(tex) = self.texture.as_mut() else {
            return Ok(());
        };
        let initialize = label.op == LabelOp::Initialize;

        backend.set_blend(0, None);
        backend.bind_shader(shader);
        if initialize {
            let ray = compute_view(view, tex.transform());
            set_shading_params(backend, params, ray.direction, tex.spacing());
            fill_colormap(
                backend,
                ColormapMode::Default,
                params,
                &ColormapContext::new(1, 1),
            );
        }
        backend.set_param(slot::VIEWPORT, vec4(label.thresh, 0.0, 0.0, 0.0));

        let saved = backend.viewport();
        for i in 0..tex.brick_count() {
            let brick = &tex.bricks()[i];
            let dims = brick.dims();
            let d = dims.as_dvec3();
            if initialize {
                backend.set_param(slot::DIMS, vec4(d.x, d.y, d.z, 0.0));
            } else {
                backend.set_param(slot::LIGHT, vec4(1.0 / d.x, 1.0 / d.y, 1.0 / d.z, 0.0));
            }
            backend.set_viewport(Viewport::sized(dims.x, dims.y));

            let brick_ref = tex.brick_ref(i);
            let nearest = wgpu::FilterMode::Nearest;
            if initialize {
                let data = backend.load_brick(brick_ref, dims, Channel::Data, nearest);
                backend.bind_texture(units::DATA, data);
            }
            if has_mask {
                let mask = backend.load_brick(brick_ref, dims, Channel::Mask, nearest);
                backend.bind_texture(units::MASK, mask);
            }
            let Some(label_tex) = backend.load_brick(brick_ref, dims, Channel::Label, nearest)
            else {
                log::warn!("brick {i} label texture unavailable, skipping");
                continue;
            };
            backend.bind_texture(units::LABEL, Some(label_tex));
            draw_layers(backend, label_tex, dims.z);
        }
        restore(backend, saved, &[units::DATA, units::MASK, units::LABEL]);

        tex.set_has_label(true);
        Ok(())
    }

    /// Combines this volume with up to two operands, writing into this volume's data.
    ///
    /// Bricks are paired by index, so the operands must share this volume's brick
    /// layout. Operands cannot alias `self`.
    pub fn calculate<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        op: CalcOp,
        a: Option<&VolumeRenderer>,
        b: Option<&VolumeRenderer>,
    ) -> RenderResult<()> {
        if self.texture.as_ref().map_or(true, |t| t.brick_count() == 0) {
            return Ok(());
        }
        let shader = backend.calc_shader(op)?;
        backend.set_blend(0, None);
        backend.bind_shader(shader);

        let scale = |v: Option<&VolumeRenderer>| v.map_or(1.0, |v| v.params.scalar_scale);
        let flag = |v: Option<&VolumeRenderer>| {
            if op.reports_masks() {
                if v.and_then(VolumeRenderer::texture)
                    .is_some_and(VolumeTexture::has_mask)
                {
                    1.0
                } else {
                    0.0
                }
            } else if v.is_some_and(|v| v.params.inverted) {
                -1.0
            } else {
                0.0
            }
        };
        backend.set_param(0, vec4(scale(a), scale(b), flag(a), flag(b)));
        if a.is_some() && op.uses_transfer() {
            let p = &self.params;
            backend.set_param(
                slot::TRANSFER,
                vec4(p.signed_scalar_scale(), p.gm_scale, p.lo_thresh, p.hi_thresh),
            );
            set_gamma_params(backend, p);
        }

        let operand = |v: Option<&VolumeRenderer>, i: usize| {
            v.and_then(VolumeRenderer::texture)
                .filter(|t| i < t.brick_count())
                .map(|t| (t.brick_ref(i), t.bricks()[i].dims()))
        };
        let Some(tex) = self.texture.as_ref() else {
            return Ok(());
        };
        let nearest = wgpu::FilterMode::Nearest;
        let saved = backend.viewport();
        for (i, brick) in tex.bricks().iter().enumerate() {
            let dims: UVec3 = brick.dims();
            backend.set_viewport(Viewport::sized(dims.x, dims.y));
            let Some(target) = backend.load_brick(tex.brick_ref(i), dims, Channel::Data, nearest)
            else {
                log::warn!("brick {i} data texture unavailable, skipping");
                continue;
            };
            backend.bind_texture(units::DATA, Some(target));
            if let Some((r, d)) = operand(a, i) {
                let t = backend.load_brick(r, d, Channel::Data, nearest);
                backend.bind_texture(units::OPERAND_A, t);
                if op.reads_mask_a() {
                    let m = backend.load_brick(r, d, Channel::Mask, nearest);
                    backend.bind_texture(units::MASK_A, m);
                }
            }
            if let Some((r, d)) = operand(b, i) {
                let t = backend.load_brick(r, d, Channel::Data, nearest);
                backend.bind_texture(units::OPERAND_B, t);
                if op.reads_mask_b() {
                    let m = backend.load_brick(r, d, Channel::Mask, nearest);
                    backend.bind_texture(units::MASK_B, m);
                }
            }
            draw_layers(backend, target, dims.z);
        }
        restore(
            backend,
            saved,
            &[
                units::DATA,
                units::OPERAND_A,
                units::OPERAND_B,
                units::MASK_A,
                units::MASK_B,
            ],
        );
        Ok(())
    }

    /// Reads every brick's data back, in brick order.
    pub fn return_volume<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> RenderResult<Vec<Vec<u8>>> {
        match self.texture.as_ref() {
            Some(tex) => read_channel(backend, tex, Channel::Data),
            None => Ok(Vec::new()),
        }
    }

    /// Reads every brick's mask back; empty when the volume has no mask.
    pub fn return_mask<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> RenderResult<Vec<Vec<u8>>> {
        match self.texture.as_ref() {
            Some(tex) if tex.has_mask() => read_channel(backend, tex, Channel::Mask),
            _ => Ok(Vec::new()),
        }
    }

    /// Reads every brick's labels back; empty when the volume has no labels.
    pub fn return_label<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
    ) -> RenderResult<Vec<Vec<u8>>> {
        match self.texture.as_ref() {
            Some(tex) if tex.has_label() => read_channel(backend, tex, Channel::Label),
            _ => Ok(Vec::new()),
        }
    }

    /// Reads data and mask back and keeps mask voxels whose data lies in `[lo, hi]`.
    ///
    /// Returns the thresholded mask of every brick.
    pub fn threshold_mask<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        lo: f64,
        hi: f64,
    ) -> RenderResult<Vec<Vec<u8>>> {
        let mut masks = self.return_mask(backend)?;
        if masks.is_empty() {
            return Ok(masks);
        }
        let data = self.return_volume(backend)?;
        let kept: usize = masks
            .iter_mut()
            .zip(&data)
            .map(|(m, d)| mask_threshold::threshold_mask(d, m, lo, hi))
            .sum();
        log::info!("mask threshold [{lo:.3}, {hi:.3}] kept {kept} voxels");
        Ok(masks)
    }
}
