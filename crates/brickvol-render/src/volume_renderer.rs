//! Single-volume slice renderer.
//!
//! Each frame the bricks are sorted along the view ray, sliced into view-aligned
//! polygons, and composited into the accumulation target. With memory swap enabled a
//! frame may stop when its time budget runs out; drawn flags on the bricks and the
//! counters in [`StreamingSession`] let the next pass pick up where this one stopped.

use brickvol_core::{
    BBox, BrickRef, ClipPlanes, Clock, ColormapMode, DVec3, Interpolation, MaskLabelMode, RenderMode, RenderOptions,
    RenderPurpose, StreamingSession, UpdateOrder, VolumeParams, VolumeShaderKey, VolumeTexture,
};

use crate::backend::{units, Channel, RenderBackend, RenderTarget, Surface, TextureProvider, Viewport};
use crate::blend;
use crate::error::RenderResult;
use crate::filter_pass::{composite, CompositeParams};
use crate::polygonizer::{box_edges, compute_polygons, num_slices};
use crate::scale::{calc_scale_factor, ScaleFactorState};
use crate::uniforms::{
    colormap_entry, fill_colormap, mat4, matrix, set_clip_planes, set_shading_params, slot,
    vec4, ColormapContext,
};
use crate::visibility::{
    closest_bricks, compute_view, sort_bricks, test_against_view, SamplingScale, ViewState,
};

/// World-space slice spacing at sampling rate 1.
pub const BASE_SLICE_SPACING: f64 = 0.0025;

/// Per-frame inputs shared by both renderers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub view: ViewState,
    /// Also draw brick outlines and sparse slices.
    pub wireframe: bool,
    /// The user is interacting; adaptive volumes drop to their interactive rate.
    pub interactive: bool,
    pub zoom: f64,
    /// Linear texture filtering.
    pub interpolate: bool,
    /// Which drawn-flag slot this frame uses.
    pub purpose: RenderPurpose,
    /// Shared reference length for slice spacing (0 = per volume).
    pub sampling_frq_fac: f64,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            view: ViewState::default(),
            wireframe: false,
            interactive: false,
            zoom: 1.0,
            interpolate: true,
            purpose: RenderPurpose::Normal,
            sampling_frq_fac: 0.0,
        }
    }
}

/// Slice spacing of one volume for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceSpacing {
    /// Sampling rate in effect.
    pub rate: f64,
    /// Spacing in volume index space.
    pub dt: f64,
    /// Opacity correction against the shared reference length.
    pub rate_fac: f64,
    pub num_slices: u32,
}

/// Renders one bricked volume.
#[derive(Debug)]
pub struct VolumeRenderer {
    pub(crate) texture: Option<VolumeTexture>,
    pub params: VolumeParams,
    pub(crate) planes: ClipPlanes,
    quota_center: DVec3,
    quota_bricks: usize,
    scale: ScaleFactorState,
    targets_resize: bool,
    num_slices: u32,
}

impl VolumeRenderer {
    pub fn new(texture: VolumeTexture) -> Self {
        Self {
            texture: Some(texture),
            ..Self::empty()
        }
    }

    /// A renderer without a volume; drawing is a no-op.
    pub fn empty() -> Self {
        Self {
            texture: None,
            params: VolumeParams::default(),
            planes: ClipPlanes::default(),
            quota_center: DVec3::splat(0.5),
            quota_bricks: 16,
            scale: ScaleFactorState::default(),
            targets_resize: true,
            num_slices: 0,
        }
    }

    pub fn texture(&self) -> Option<&VolumeTexture> {
        self.texture.as_ref()
    }

    pub fn texture_mut(&mut self) -> Option<&mut VolumeTexture> {
        self.texture.as_mut()
    }

    pub fn set_texture(&mut self, texture: Option<VolumeTexture>) {
        self.texture = texture;
        self.targets_resize = true;
    }

    pub fn planes(&self) -> &ClipPlanes {
        &self.planes
    }

    pub fn set_planes(&mut self, planes: ClipPlanes) {
        self.planes = planes;
    }

    pub fn quota_center(&self) -> DVec3 {
        self.quota_center
    }

    /// Center of the brick selection used while interacting with a streamed volume.
    pub fn set_quota_center(&mut self, center: DVec3) {
        self.quota_center = center;
    }

    pub fn quota_bricks(&self) -> usize {
        self.quota_bricks
    }

    pub fn set_quota_bricks(&mut self, quota: usize) {
        self.quota_bricks = quota;
    }

    /// Copies the shared configuration surface into this renderer.
    pub fn apply_options(&mut self, options: &RenderOptions) {
        self.params.apply_options(options);
        self.quota_bricks = options.quota_bricks;
    }

    /// Slice count of the last drawn frame.
    pub fn num_slices(&self) -> u32 {
        self.num_slices
    }

    /// Bricks a streamed frame of this volume retires: the quota selection while the
    /// session is interactive, every brick otherwise.
    pub fn frame_brick_count(&self, session: &StreamingSession) -> usize {
        let Some(tex) = self.texture() else {
            return 0;
        };
        if session.mem_swap && session.interactive {
            tex.bricks()
                .iter()
                .filter(|b| !b.is_skipped())
                .count()
                .min(self.quota_bricks)
        } else {
            tex.brick_count()
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale.factor()
    }

    /// Falls back to a mask/label mode the volume's channels can serve.
    ///
    /// Returns the mode in effect, which is also written back to the parameters.
    pub fn reassess_mask_label(&mut self) -> MaskLabelMode {
        let Some(tex) = self.texture.as_ref() else {
            return self.params.mask_label_mode;
        };
        let mode = self
            .params
            .mask_label_mode
            .resolve(tex.has_mask(), tex.has_label());
        if mode != self.params.mask_label_mode {
            log::warn!(
                "mask/label mode {:?} unavailable, falling back to {:?}",
                self.params.mask_label_mode,
                mode
            );
            self.params.mask_label_mode = mode;
        }
        mode
    }

    /// Whether the mask and label channels are shown.
    pub(crate) fn shown_channels(&self) -> (bool, bool) {
        let Some(tex) = self.texture.as_ref() else {
            return (false, false);
        };
        let mode = self.params.mask_label_mode;
        (
            mode.uses_mask() && tex.has_mask(),
            mode.uses_label() && tex.has_label(),
        )
    }

    /// The shader variant for the current parameters.
    pub fn shader_key(&self) -> VolumeShaderKey {
        let bucket = colormap_entry(self.params.colormap_mode).bucket(self.params.solid);
        VolumeShaderKey {
            components: self.texture.as_ref().map_or(1, VolumeTexture::components),
            shading: self.params.shading,
            fog: false,
            depth_peel: 0,
            hi_quality: true,
            mask_label: self.params.mask_label_mode,
            colormap: bucket.colormap,
            solid: bucket.solid,
        }
    }

    /// Slice spacing for this frame, or `None` without a volume.
    pub fn slice_spacing(&self, frame: &FrameParams) -> Option<SliceSpacing> {
        let tex = self.texture.as_ref()?;
        let rate = self
            .params
            .effective_rate(self.params.adaptive && frame.interactive);
        let rate = if rate > 0.0 { rate } else { 1.0 };
        let world_dt = BASE_SLICE_SPACING / rate;
        let scale = SamplingScale::new(&frame.view, tex.transform());
        Some(SliceSpacing {
            rate,
            dt: scale.index_dt(world_dt, frame.sampling_frq_fac),
            rate_fac: scale.rate_fac(frame.sampling_frq_fac),
            num_slices: num_slices(tex.bbox().diagonal().length(), world_dt),
        })
    }

    /// Index-space spacing this volume uses when several volumes are interleaved.
    pub(crate) fn sampling_scale(&self, view: &ViewState) -> Option<SamplingScale> {
        self.texture
            .as_ref()
            .map(|tex| SamplingScale::new(view, tex.transform()))
    }

    /// Sampling rate that yields `num_slices` slices across the volume diagonal.
    #[allow(clippy::cast_precision_loss)]
    pub fn num_slices_to_rate(&self, num_slices: u32) -> Option<f64> {
        let tex = self.texture.as_ref()?;
        if num_slices == 0 {
            return None;
        }
        let diag = tex.bbox().diagonal();
        let cell_diag = diag / tex.dims().as_dvec3();
        let dt = diag.length() / f64::from(num_slices);
        Some(cell_diag.length() / dt)
    }

    /// Returns false when the box cannot contribute under the current view and planes.
    pub fn test_against_view(&self, bbox: &BBox, view: &ViewState) -> bool {
        let Some(tex) = self.texture.as_ref() else {
            return false;
        };
        test_against_view(
            bbox,
            &view.mvp(tex.transform()),
            &self.planes,
            self.planes.region().as_ref(),
        )
    }

    /// Draws the volume, then the wireframe if requested.
    pub fn draw<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        session: &mut StreamingSession,
        clock: &dyn Clock,
        frame: &FrameParams,
    ) -> RenderResult<()> {
        self.draw_volume(backend, session, clock, frame)?;
        if frame.wireframe {
            self.draw_wireframe(backend, frame);
        }
        Ok(())
    }

    fn draw_volume<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        session: &mut StreamingSession,
        clock: &dyn Clock,
        frame: &FrameParams,
    ) -> RenderResult<()> {
        if self.texture.as_ref().map_or(true, |t| t.brick_count() == 0) {
            return Ok(());
        }
        let mode = self.reassess_mask_label();
        let (show_mask, show_label) = self.shown_channels();
        let Some(spacing) = self.slice_spacing(frame) else {
            return Ok(());
        };
        self.num_slices = spacing.num_slices;
        let key = self.shader_key();
        let shader = backend.volume_shader(&key)?;

        let params = &self.params;
        let planes = &self.planes;
        let Some(tex) = self.texture.as_mut() else {
            return Ok(());
        };
        let ray = compute_view(&frame.view, tex.transform());
        let order = session.update_order;
        let orthographic = frame.view.orthographic;

        let sequence = if session.mem_swap && session.interactive {
            let picked = closest_bricks(
                tex.bricks_mut(),
                self.quota_center,
                self.quota_bricks,
                &ray,
                orthographic,
                order,
            );
            update_quota_pins(backend, tex, picked.clone());
            picked
        } else {
            sort_bricks(tex.bricks_mut(), &ray, orthographic, order)
        };
        if sequence.is_empty() {
            return Ok(());
        }

        // Accumulation target at the scaled size.
        let viewport = backend.viewport();
        let sf = calc_scale_factor(
            f64::from(viewport.width),
            f64::from(viewport.height),
            f64::from(tex.nx()),
            f64::from(tex.ny()),
            frame.zoom,
        );
        if self.scale.update(sf) {
            self.targets_resize = true;
        }
        let (w2, h2) = self.scale.target_size(viewport.width, viewport.height);
        let resize = self.targets_resize;
        let use_blend_target = session.blend_num_bits > 8;
        if use_blend_target {
            backend.ensure_surface(Surface::Blend, w2, h2, resize)?;
            backend.ensure_surface(Surface::BlendId, w2, h2, resize)?;
            self.targets_resize = false;
            backend.bind_target(RenderTarget::Blend { with_id: true });
            backend.clear(if session.cur_chan_brick_num == 0 { 2 } else { 1 });
            backend.set_viewport(Viewport::new(viewport.x, viewport.y, w2, h2));
        }
        backend.set_blend(0, Some(blend::accumulate(params.render_mode, order)));
        backend.set_blend(1, None);

        backend.bind_shader(shader);
        backend.set_matrix(
            matrix::MODELVIEW,
            mat4(&(frame.view.modelview * *tex.transform())),
        );
        backend.set_matrix(matrix::PROJECTION, mat4(&frame.view.projection));
        set_shading_params(backend, params, ray.direction, tex.spacing());
        let ctx = ColormapContext {
            mask_shown: show_mask && !show_label,
            ..ColormapContext::new(w2, h2)
        };
        fill_colormap(backend, params.colormap_mode, params, &ctx);
        set_clip_planes(backend, planes);

        let purpose = if show_label {
            RenderPurpose::Label
        } else if show_mask {
            RenderPurpose::Mask
        } else {
            frame.purpose
        };
        let filter = if frame.interpolate
            && params.interpolation == Interpolation::Linear
            && params.colormap_mode != ColormapMode::Index
        {
            wgpu::FilterMode::Linear
        } else {
            wgpu::FilterMode::Nearest
        };
        let opacity_correction = if params.render_mode == RenderMode::Over {
            spacing.rate_fac / spacing.rate
        } else {
            1.0
        };
        let mvp = frame.view.mvp(tex.transform());
        let region = planes.region();
        let streaming = session.is_streaming();

        log::debug!(
            "drawing {} bricks, dt {:.5}, mode {:?}",
            sequence.len(),
            spacing.dt,
            mode
        );

        for &i in &sequence {
            if streaming && tex.bricks()[i].drawn(purpose) {
                continue;
            }
            if session.budget_exceeded(clock) {
                log::debug!("frame budget exhausted after {} bricks", session.cur_brick_num);
                break;
            }
            let brick = &tex.bricks()[i];
            let (bbox, dims, skipped) = (*brick.bbox(), brick.dims(), brick.is_skipped());
            let inv_dims = brick.inv_dims();
            let brick_transform = brick.unit_cube_transform();

            if skipped || !test_against_view(&bbox, &mvp, planes, region.as_ref()) {
                if streaming {
                    tex.bricks_mut()[i].set_drawn(purpose, true);
                    session.count_brick();
                    session.cur_chan_brick_num += 1;
                }
                continue;
            }

            let polygons = compute_polygons(&bbox, &ray, spacing.dt, order);
            if polygons.is_empty() {
                if streaming {
                    tex.bricks_mut()[i].set_drawn(purpose, true);
                    session.count_brick();
                }
                session.cur_chan_brick_num += 1;
                continue;
            }

            let brick_ref = tex.brick_ref(i);
            let Some(data) = backend.load_brick(brick_ref, dims, Channel::Data, filter) else {
                log::warn!("brick {i} could not be made resident, skipping");
                if streaming {
                    tex.bricks_mut()[i].set_drawn(purpose, true);
                    session.count_brick();
                    session.cur_chan_brick_num += 1;
                }
                continue;
            };
            backend.bind_texture(units::DATA, Some(data));
            if show_mask {
                let mask = backend.load_brick(brick_ref, dims, Channel::Mask, filter);
                backend.bind_texture(units::MASK, mask);
            }
            if show_label {
                let label =
                    backend.load_brick(brick_ref, dims, Channel::Label, wgpu::FilterMode::Nearest);
                backend.bind_texture(units::LABEL, label);
            }

            backend.set_param(
                slot::BRICK,
                vec4(inv_dims.x, inv_dims.y, inv_dims.z, opacity_correction),
            );
            backend.set_matrix(matrix::BRICK, mat4(&brick_transform));
            for polygon in &polygons {
                backend.draw_polygon(polygon);
            }

            if streaming {
                tex.bricks_mut()[i].set_drawn(purpose, true);
                session.count_brick();
                session.cur_chan_brick_num += 1;
                session.finished_bricks += 1;
            }
        }

        if session.mem_swap {
            session.update_done();
            if session.cur_chan_brick_num >= sequence.len() {
                session.done_current_chan = true;
                session.clear_chan_buffer = true;
                session.save_final_buffer = true;
                session.cur_chan_brick_num = 0;
                session.done_loop[purpose.index()] = true;
            }
        }

        backend.bind_texture(units::DATA, None);
        if show_mask {
            backend.bind_texture(units::MASK, None);
        }
        if show_label {
            backend.bind_texture(units::LABEL, None);
        }
        backend.release_shader();

        if use_blend_target {
            composite(
                backend,
                &CompositeParams {
                    viewport,
                    target_width: w2,
                    target_height: h2,
                    tex_width: f64::from(tex.nx()),
                    tex_height: f64::from(tex.ny()),
                    zoom: frame.zoom,
                    scale_factor: self.scale.factor(),
                    min_weight: 0.5,
                    noise_reduction: params.noise_reduction
                        && params.colormap_mode != ColormapMode::Depth,
                    resize,
                },
            )?;
        }
        Ok(())
    }

    /// Draws brick outlines and every tenth slice as lines.
    pub fn draw_wireframe<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, frame: &FrameParams) {
        let Some(spacing) = self.slice_spacing(frame) else {
            return;
        };
        let planes = &self.planes;
        let Some(tex) = self.texture.as_mut() else {
            return;
        };
        let ray = compute_view(&frame.view, tex.transform());
        let order = UpdateOrder::BackToFront;
        let sequence = sort_bricks(tex.bricks_mut(), &ray, frame.view.orthographic, order);
        let mvp = frame.view.mvp(tex.transform());
        let region = planes.region();

        backend.release_shader();
        backend.set_blend(0, None);
        backend.set_matrix(
            matrix::MODELVIEW,
            mat4(&(frame.view.modelview * *tex.transform())),
        );
        #[allow(clippy::cast_precision_loss)]
        let count = sequence.len() as f64;
        for (n, &i) in sequence.iter().enumerate() {
            let bbox = *tex.bricks()[i].bbox();
            if !test_against_view(&bbox, &mvp, planes, region.as_ref()) {
                continue;
            }
            #[allow(clippy::cast_precision_loss)]
            let shade = 0.8 * (n as f64 + 1.0) / count;
            backend.draw_lines(&box_edges(&bbox), vec4(shade, shade, 0.8, 1.0));
            let outlines: Vec<_> = compute_polygons(&bbox, &ray, spacing.dt * 10.0, order)
                .iter()
                .flat_map(|p| p.outline())
                .collect();
            if !outlines.is_empty() {
                backend.draw_lines(&outlines, vec4(0.4, 0.4, 0.4, 1.0));
            }
        }
    }
}

/// Pins the new quota selection and releases bricks that left it.
pub(crate) fn update_quota_pins<B: TextureProvider + ?Sized>(
    backend: &mut B,
    tex: &mut VolumeTexture,
    picked: Vec<usize>,
) {
    let refs = |indices: &[usize]| -> Vec<BrickRef> {
        indices.iter().map(|&i| tex.brick_ref(i)).collect()
    };
    let old = refs(tex.quota());
    let new = refs(&picked);
    for brick in old.iter().filter(|b| !new.contains(b)) {
        backend.unpin(*brick);
    }
    for brick in new.iter().filter(|b| !old.contains(b)) {
        backend.pin(*brick);
    }
    tex.set_quota(picked);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, RecordingBackend};
    use brickvol_core::{DMat4, StepClock, SystemClock, UVec3};

    fn camera_at_plus_z() -> FrameParams {
        FrameParams {
            view: ViewState {
                modelview: DMat4::from_translation(DVec3::new(-0.5, -0.5, -3.0)),
                projection: DMat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
                orthographic: true,
                viewport: Viewport::sized(100, 100),
            },
            ..Default::default()
        }
    }

    fn renderer(brick_dims: UVec3) -> VolumeRenderer {
        let mut vr = VolumeRenderer::new(VolumeTexture::from_grid(UVec3::splat(8), brick_dims));
        vr.params.set_sampling_rate(0.05);
        vr
    }

    #[test]
    fn test_empty_renderer_is_noop() {
        let mut vr = VolumeRenderer::empty();
        let mut rb = RecordingBackend::default();
        let mut session = StreamingSession::default();
        vr.draw(&mut rb, &mut session, &SystemClock::new(), &camera_at_plus_z())
            .unwrap();
        assert!(rb.commands.is_empty());
    }

    #[test]
    fn test_missing_shader_fails_before_drawing() {
        let mut vr = renderer(UVec3::splat(8));
        let mut rb = RecordingBackend::default();
            rb.shaders_unavailable = true;
        let mut session = StreamingSession::default();
        let result = vr.draw(&mut rb, &mut session, &SystemClock::new(), &camera_at_plus_z());
        assert!(result.is_err());
        assert!(rb.polygon_draws().is_empty());
    }

    #[test]
    fn test_single_brick_back_to_front() {
        let mut vr = renderer(UVec3::splat(8));
        let mut rb = RecordingBackend::default();
        let mut session = StreamingSession::default();
        vr.draw(&mut rb, &mut session, &SystemClock::new(), &camera_at_plus_z())
            .unwrap();

        let over = blend::accumulate(RenderMode::Over, UpdateOrder::BackToFront);
        assert_eq!(rb.blend_states(0)[0], Some(over));

        // dt = 0.0025 / 0.05 = 0.05, box spans t in [2, 3].
        let draws = rb.polygon_draws();
        assert!((19..=21).contains(&draws.len()));
        assert!(draws.windows(2).all(|w| w[0].1 > w[1].1));

        let tex = vr.texture().unwrap();
        assert!(!tex.bricks()[0].drawn(RenderPurpose::Normal));
        assert!(!session.done_loop(RenderPurpose::Normal));
    }

    #[test]
    fn test_brick_uniforms() {
        let mut vr = renderer(UVec3::new(8, 8, 4));
        vr.params.render_mode = RenderMode::Mip;
        let mut rb = RecordingBackend::default();
        let mut session = StreamingSession::default();
        vr.draw(&mut rb, &mut session, &SystemClock::new(), &camera_at_plus_z())
            .unwrap();
        let brick_params = rb.param_writes(slot::BRICK);
        assert_eq!(brick_params.len(), 2);
        assert_eq!(brick_params[0], vec4(0.125, 0.125, 0.25, 1.0));
    }

    #[test]
    fn test_texture_failure_skips_brick() {
        let mut vr = renderer(UVec3::new(8, 8, 4));
        let mut rb = RecordingBackend::default();
        let failing = vr.texture().unwrap().brick_ref(1);
        rb.failing_textures.insert(failing);
        let mut session = StreamingSession::default();
        vr.draw(&mut rb, &mut session, &SystemClock::new(), &camera_at_plus_z())
            .unwrap();
        let drawn = rb.drawn_bricks();
        assert_eq!(drawn.len(), 1);
        assert_ne!(drawn[0], failing);
    }

    #[test]
    fn test_streamed_frame_retires_brick_that_fails_to_load() {
        let mut vr = renderer(UVec3::new(8, 8, 4));
        let mut rb = RecordingBackend::default();
        let failing = vr.texture().unwrap().brick_ref(1);
        rb.failing_textures.insert(failing);
        let mut session = StreamingSession {
            mem_swap: true,
            up_time: 1000,
            ..Default::default()
        };
        session.begin(vr.frame_brick_count(&session), 0);
        vr.draw(&mut rb, &mut session, &StepClock::new(1), &camera_at_plus_z())
            .unwrap();
        assert!(session.done_update_loop);
        assert_eq!(session.cur_brick_num, 2);
        assert!(vr.texture().unwrap().bricks()[1].drawn(RenderPurpose::Normal));
        assert_eq!(rb.drawn_bricks().len(), 1);
    }

    #[test]
    fn test_frame_brick_count_follows_quota() {
        let mut vr = renderer(UVec3::new(8, 8, 2));
        vr.set_quota_bricks(2);
        let mut session = StreamingSession {
            mem_swap: true,
            ..Default::default()
        };
        assert_eq!(vr.frame_brick_count(&session), 4);
        session.interactive = true;
        assert_eq!(vr.frame_brick_count(&session), 2);
        vr.texture_mut().unwrap().bricks_mut()[0].set_priority(1);
        vr.set_quota_bricks(8);
        assert_eq!(vr.frame_brick_count(&session), 3);
        assert_eq!(VolumeRenderer::empty().frame_brick_count(&session), 0);
    }

    #[test]
    fn test_streaming_completes_channel() {
        let mut vr = renderer(UVec3::new(8, 8, 4));
        let mut rb = RecordingBackend::default();
        let mut session = StreamingSession {
            mem_swap: true,
            up_time: 1000,
            ..Default::default()
        };
        session.begin(2, 0);
        vr.draw(&mut rb, &mut session, &StepClock::new(1), &camera_at_plus_z())
            .unwrap();
        assert!(session.done_update_loop);
        assert!(session.done_loop(RenderPurpose::Normal));
        assert!(session.clear_chan_buffer && session.save_final_buffer);
        assert_eq!(session.cur_chan_brick_num, 0);
        assert_eq!(session.finished_bricks, 2);
    }

    #[test]
    fn test_mask_mode_falls_back_without_mask() {
        let mut vr = renderer(UVec3::splat(8));
        vr.params.mask_label_mode = MaskLabelMode::ShowMasked;
        assert_eq!(vr.reassess_mask_label(), MaskLabelMode::None);
        assert_eq!(vr.params.mask_label_mode, MaskLabelMode::None);
    }

    #[test]
    fn test_mask_channel_is_loaded_when_shown() {
        let mut vr = renderer(UVec3::splat(8));
        vr.texture_mut().unwrap().set_has_mask(true);
        vr.params.mask_label_mode = MaskLabelMode::ShowMasked;
        let mut rb = RecordingBackend::default();
        let mut session = StreamingSession::default();
        vr.draw(&mut rb, &mut session, &SystemClock::new(), &camera_at_plus_z())
            .unwrap();
        assert_eq!(
            rb.count(|c| matches!(c, Command::LoadBrick { channel: Channel::Mask, .. })),
            1
        );
        let color = rb.param_writes(slot::COLOR)[0];
        assert_eq!(color.truncate(), vr.params.mask_color());
    }

    #[test]
    fn test_wireframe_lines() {
        let mut vr = renderer(UVec3::new(8, 8, 4));
        let mut rb = RecordingBackend::default();
        let frame = FrameParams {
            wireframe: true,
            ..camera_at_plus_z()
        };
        vr.draw_wireframe(&mut rb, &frame);
        let edges = rb.count(|c| {
            matches!(c, Command::DrawLines { segments: 12, color } if (color.z - 0.8).abs() < 1e-6)
        });
        assert_eq!(edges, 2);
    }

    #[test]
    fn test_num_slices_to_rate() {
        let vr = renderer(UVec3::splat(8));
        // diag = sqrt(3), cell diag = sqrt(3) / 8; 8 slices -> rate 1.
        let rate = vr.num_slices_to_rate(8).unwrap();
        assert!((rate - 1.0).abs() < 1e-12);
        assert!(vr.num_slices_to_rate(0).is_none());
    }

    #[test]
    fn test_quota_mode_pins_selection() {
        let mut vr = renderer(UVec3::new(8, 8, 2));
        vr.set_quota_bricks(2);
        vr.set_quota_center(DVec3::new(0.5, 0.5, 1.0));
        let mut rb = RecordingBackend::default();
        let mut session = StreamingSession {
            mem_swap: true,
            interactive: true,
            up_time: 1000,
            ..Default::default()
        };
        session.begin(vr.frame_brick_count(&session), 0);
        vr.draw(&mut rb, &mut session, &StepClock::new(1), &camera_at_plus_z())
            .unwrap();
        assert!(session.done_update_loop);
        let tex = vr.texture().unwrap();
        assert_eq!(tex.quota(), &[2, 3]);
        assert!(rb.is_pinned(tex.brick_ref(3)));
        assert!(!rb.is_pinned(tex.brick_ref(0)));
        assert_eq!(rb.drawn_bricks().len(), 2);
    }
}
