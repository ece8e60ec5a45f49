//! Interleaved rendering of several co-registered volumes.
//!
//! Bricks of all member volumes are windowed against the shared view ray and swept by
//! time index, so slices of overlapping volumes composite in depth order as if they
//! belonged to one dataset. A streamed sweep stores the index it stopped at in
//! [`StreamingSession::cur_tid_offset_multi`] and resumes there on the next pass.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::rc::Rc;

use brickvol_core::{
    BBox, Brick, ClipRegion, Clock, ColormapMode, DMat4, DVec3, ImageShader, Ray, RenderMode,
    RenderOptions, RenderPurpose, ShaderBucket, StreamingSession, UVec3, VolumeShaderKey,
    VolumeTexture,
};

use crate::backend::{units, Channel, RenderBackend, RenderTarget, ShaderHandle, Surface, Viewport};
use crate::blend;
use crate::error::RenderResult;
use crate::filter_pass::{composite, CompositeParams};
use crate::polygonizer::{num_slices, polygon_at_index};
use crate::scale::{calc_scale_factor, ScaleFactorState};
use crate::uniforms::{
    colormap_entry, fill_colormap, mat4, matrix, set_clip_planes, set_shading_params, slot,
    vec4, ColormapContext,
};
use crate::visibility::{
    combine_quota_bricks, combined_quota_sizes, compute_t_index, compute_view,
    test_against_view, SamplingScale,
};
use crate::volume_renderer::{update_quota_pins, FrameParams, VolumeRenderer, BASE_SLICE_SPACING};

/// A member volume shared with the caller.
pub type SharedVolume = Rc<RefCell<VolumeRenderer>>;

/// Shader bucket of a member; a global depth colormap overrides the member's own.
fn shader_bucket(vr: &VolumeRenderer, depth_mode: bool) -> ShaderBucket {
    let cmode = if depth_mode {
        ColormapMode::Depth
    } else {
        vr.params.colormap_mode
    };
    colormap_entry(cmode).bucket(vr.params.solid)
}

/// Per-volume values fixed for one frame.
struct MemberFrame {
    ray: Ray,
    dt: f64,
    mvp: DMat4,
    region: Option<ClipRegion>,
    in_quota: Option<HashSet<usize>>,
}

/// One windowed brick of the sweep, tagged with the member it belongs to.
#[derive(Debug, Clone, Copy)]
struct SweepBrick {
    member: usize,
    brick: usize,
    timin: i32,
    timax: i32,
}

/// Renders several volumes into one accumulation target.
#[derive(Debug)]
pub struct MultiVolumeRenderer {
    volumes: Vec<SharedVolume>,
    bbox: Option<BBox>,
    res: UVec3,
    pub render_mode: RenderMode,
    /// `Depth` overrides every member's colormap.
    pub colormap_mode: ColormapMode,
    sampling_rate: f64,
    interactive_rate: f64,
    pub adaptive: bool,
    pub noise_reduction: bool,
    /// Accumulate each time index separately before compositing it.
    pub blend_slices: bool,
    quota_center: DVec3,
    quota_bricks: usize,
    scale: ScaleFactorState,
    targets_resize: bool,
    num_slices: u32,
}

impl Default for MultiVolumeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiVolumeRenderer {
    pub fn new() -> Self {
        Self {
            volumes: Vec::new(),
            bbox: None,
            res: UVec3::ZERO,
            render_mode: RenderMode::Over,
            colormap_mode: ColormapMode::Default,
            sampling_rate: 1.0,
            interactive_rate: 0.5,
            adaptive: true,
            noise_reduction: false,
            blend_slices: false,
            quota_center: DVec3::splat(0.5),
            quota_bricks: 16,
            scale: ScaleFactorState::default(),
            targets_resize: true,
            num_slices: 0,
        }
    }

    /// Adds a member; adding the same renderer again is a no-op.
    pub fn add_vr(&mut self, vr: SharedVolume) {
        if self.volumes.iter().any(|v| Rc::ptr_eq(v, &vr)) {
            return;
        }
        if let Some(tex) = vr.borrow().texture() {
            match self.bbox.as_mut() {
                Some(bbox) => bbox.extend(tex.bbox()),
                None => self.bbox = Some(*tex.bbox()),
            }
            self.res = self.res.max(tex.dims());
        }
        self.volumes.push(vr);
    }

    pub fn clear_vr(&mut self) {
        self.volumes.clear();
        self.bbox = None;
        self.res = UVec3::ZERO;
    }

    pub fn vr_count(&self) -> usize {
        self.volumes.len()
    }

    pub fn volumes(&self) -> &[SharedVolume] {
        &self.volumes
    }

    /// Union of the members' boxes.
    pub fn bbox(&self) -> Option<&BBox> {
        self.bbox.as_ref()
    }

    /// Largest member resolution per axis.
    pub fn res(&self) -> UVec3 {
        self.res
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Sets the still-frame rate; the interactive rate becomes `max(rate / 2, 0.1)`.
    pub fn set_sampling_rate(&mut self, rate: f64) {
        self.sampling_rate = rate;
        self.interactive_rate = (rate / 2.0).max(0.1);
    }

    pub fn set_interactive_rate(&mut self, rate: f64) {
        self.interactive_rate = rate;
    }

    pub fn set_quota_center(&mut self, center: DVec3) {
        self.quota_center = center;
    }

    pub fn set_quota_bricks(&mut self, quota: usize) {
        self.quota_bricks = quota;
    }

    pub fn apply_options(&mut self, options: &RenderOptions) {
        self.render_mode = options.render_mode;
        self.set_sampling_rate(options.sampling_rate);
        self.interactive_rate = options.interactive_rate;
        self.adaptive = options.adaptive;
        self.noise_reduction = options.noise_reduction;
        self.blend_slices = options.blend_slices;
        self.quota_bricks = options.quota_bricks;
    }

    /// Bricks a streamed frame of the merged volumes retires: the combined quota
    /// selection while the session is interactive, every member brick otherwise.
    pub fn frame_brick_count(&self, session: &StreamingSession) -> usize {
        let members: Vec<Ref<'_, VolumeRenderer>> = self
            .volumes
            .iter()
            .filter_map(|v| v.try_borrow().ok())
            .filter(|vr| vr.texture().is_some())
            .collect();
        let textures = members.iter().filter_map(|vr| vr.texture());
        if session.mem_swap && session.interactive {
            let bricks: Vec<&[Brick]> = textures.map(VolumeTexture::bricks).collect();
            combined_quota_sizes(&bricks, self.quota_center, self.quota_bricks)
                .iter()
                .sum()
        } else {
            textures.map(VolumeTexture::brick_count).sum()
        }
    }

    /// Slice count of the last drawn frame.
    pub fn num_slices(&self) -> u32 {
        self.num_slices
    }

    /// Sampling rate that yields `num_slices` slices across the combined box.
    pub fn num_slices_to_rate(&self, num_slices: u32) -> Option<f64> {
        let bbox = self.bbox.as_ref()?;
        if num_slices == 0 || self.res.min_element() == 0 {
            return None;
        }
        let diag = bbox.diagonal();
        let cell_diag = diag / self.res.as_dvec3();
        let dt = diag.length() / f64::from(num_slices);
        Some(cell_diag.length() / dt)
    }

    /// Draws the merged volumes, then each member's wireframe if requested.
    pub fn draw<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        session: &mut StreamingSession,
        clock: &dyn Clock,
        frame: &FrameParams,
    ) -> RenderResult<()> {
        self.draw_volumes(backend, session, clock, frame)?;
        if frame.wireframe {
            self.draw_wireframe(backend, frame);
        }
        Ok(())
    }

    /// Draws every member's brick outlines.
    pub fn draw_wireframe<B: RenderBackend + ?Sized>(&self, backend: &mut B, frame: &FrameParams) {
        for vr in &self.volumes {
            match vr.try_borrow_mut() {
                Ok(mut vr) => vr.draw_wireframe(backend, frame),
                Err(_) => log::warn!("volume is borrowed elsewhere, skipping its wireframe"),
            }
        }
    }

    #[allow(clippy::too_many_lines)]
    fn draw_volumes<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        session: &mut StreamingSession,
        clock: &dyn Clock,
        frame: &FrameParams,
    ) -> RenderResult<()> {
        let Some(first) = self.volumes.first() else {
            return Ok(());
        };
        if first.try_borrow().map_or(true, |vr| vr.texture().is_none()) {
            return Ok(());
        }

        let mut members: Vec<RefMut<'_, VolumeRenderer>> = Vec::with_capacity(self.volumes.len());
        for vr in &self.volumes {
            match vr.try_borrow_mut() {
                Ok(vr) if vr.texture().is_some() => members.push(vr),
                Ok(_) => {}
                Err(_) => log::warn!("volume is borrowed elsewhere, leaving it out of this frame"),
            }
        }
        if members.is_empty() {
            return Ok(());
        }

        let depth_mode = self.colormap_mode == ColormapMode::Depth;
        let purpose = if depth_mode {
            RenderPurpose::Depth
        } else {
            frame.purpose
        };
        let mut used = [false; ShaderBucket::COUNT];
        for vr in &members {
            used[shader_bucket(vr, depth_mode).index()] = true;
        }
        let used_index = members
            .iter()
            .any(|vr| shader_bucket(vr, depth_mode).colormap == ColormapMode::Index);

        let sampling_frq_fac = if frame.sampling_frq_fac > 0.0 {
            frame.sampling_frq_fac
        } else {
            members
                .iter()
                .filter_map(|vr| vr.sampling_scale(&frame.view))
                .map(|s| s.max_axis_len)
                .fold(0.0, f64::max)
        };
        let rate = if self.adaptive && frame.interactive {
            self.interactive_rate
        } else {
            self.sampling_rate
        };
        let rate = if rate > 0.0 { rate } else { 1.0 };
        let dt = BASE_SLICE_SPACING / rate;
        if let Some(tex) = members[0].texture() {
            self.num_slices = num_slices(tex.bbox().diagonal().length(), dt);
        }

        let streaming = session.is_streaming();
        let order = session.update_order;
        let orthographic = frame.view.orthographic;
        let mut frames: Vec<MemberFrame> = Vec::with_capacity(members.len());
        for vr in &members {
            let Some(tex) = vr.texture() else { continue };
            let scale = SamplingScale::new(&frame.view, tex.transform());
            frames.push(MemberFrame {
                ray: compute_view(&frame.view, tex.transform()),
                dt: scale.index_dt(dt, sampling_frq_fac),
                mvp: frame.view.mvp(tex.transform()),
                region: vr.planes.region(),
                in_quota: None,
            });
        }

        if session.mem_swap && session.interactive {
            let ray = frames[0].ray;
            let selections = {
                let mut slices: Vec<&mut [Brick]> = members
                    .iter_mut()
                    .filter_map(|vr| vr.texture.as_mut().map(|t| t.bricks_mut()))
                    .collect();
                combine_quota_bricks(
                    &mut slices,
                    self.quota_center,
                    self.quota_bricks,
                    &ray,
                    orthographic,
                    order,
                )
            };
            for ((vr, member), picked) in members.iter_mut().zip(&mut frames).zip(selections) {
                member.in_quota = Some(picked.iter().copied().collect());
                if let Some(tex) = vr.texture.as_mut() {
                    update_quota_pins(backend, tex, picked);
                }
            }
        }

        // Window every brick against the shared ray.
        let mut work: Vec<SweepBrick> = Vec::new();
        let (mut all_timin, mut all_timax) = (i32::MAX, i32::MIN);
        let mut remain = 0usize;
        for (m, (vr, member)) in members.iter_mut().zip(&frames).enumerate() {
            let planes = vr.planes;
            let sampling = vr.sampling_scale(&frame.view);
            let Some(tex) = vr.texture.as_mut() else { continue };
            let rate_fac = sampling.map_or(1.0, |s| s.rate_fac(sampling_frq_fac));
            for (j, brick) in tex.bricks_mut().iter_mut().enumerate() {
                if member.in_quota.as_ref().is_some_and(|q| !q.contains(&j)) {
                    continue;
                }
                let in_view = !brick.is_skipped()
                    && test_against_view(brick.bbox(), &member.mvp, &planes, member.region.as_ref());
                let drawn = brick.drawn(purpose);
                if let Some((timin, timax)) = compute_t_index(brick.bbox(), &member.ray, member.dt)
                {
                    brick.set_window(timin, timax);
                    brick.set_rate_fac(rate_fac);
                    all_timin = all_timin.min(timin);
                    all_timax = all_timax.max(timax);
                    work.push(SweepBrick {
                        member: m,
                        brick: j,
                        timin,
                        timax,
                    });
                    if in_view && !(streaming && drawn) {
                        remain += 1;
                    }
                } else if streaming && !drawn {
                    brick.set_drawn(purpose, true);
                    session.count_brick();
                }
            }
        }
        if remain == 0 {
            if streaming {
                // Nothing visible is left; retire the rest of the frame.
                for w in &work {
                    if let Some(tex) = members[w.member].texture.as_mut() {
                        let brick = &mut tex.bricks_mut()[w.brick];
                        if !brick.drawn(purpose) {
                            brick.set_drawn(purpose, true);
                            session.count_brick();
                        }
                    }
                }
                session.update_done();
            }
            log::debug!("no bricks remain across {} volumes", members.len());
            return Ok(());
        }

        // One shader per bucket in use.
        let components = members[0].texture().map_or(1, |t| t.components());
        let shading = members[0].params.shading;
        let mut shaders: [Option<ShaderHandle>; ShaderBucket::COUNT] = [None; ShaderBucket::COUNT];
        for vr in &members {
            let bucket = shader_bucket(vr, depth_mode);
            if shaders[bucket.index()].is_some() {
                continue;
            }
            let key = VolumeShaderKey {
                components,
                shading,
                colormap: bucket.colormap,
                solid: bucket.solid,
                ..VolumeShaderKey::default()
            };
            shaders[bucket.index()] = Some(backend.volume_shader(&key)?);
        }
        let multi_shader = used.iter().filter(|u| **u).count() > 1;
        let blend_slices = self.blend_slices && !depth_mode;
        let id_composite = if blend_slices && used_index {
            Some(backend.image_shader(ImageShader::BlendIdColor)?)
        } else {
            None
        };

        // Accumulation targets.
        let viewport = backend.viewport();
        let sf = calc_scale_factor(
            f64::from(viewport.width),
            f64::from(viewport.height),
            f64::from(self.res.x),
            f64::from(self.res.y),
            frame.zoom,
        );
        if self.scale.update(sf) {
            self.targets_resize = true;
        }
        let (w2, h2) = self.scale.target_size(viewport.width, viewport.height);
        let resize = self.targets_resize;
        let use_blend_target = session.blend_num_bits > 8;
        let accum_target = if use_blend_target {
            RenderTarget::Blend {
                with_id: used_index,
            }
        } else {
            RenderTarget::Frame
        };
        if use_blend_target {
            backend.ensure_surface(Surface::Blend, w2, h2, resize)?;
            backend.ensure_surface(Surface::BlendId, w2, h2, resize)?;
            backend.bind_target(accum_target);
            backend.clear(if session.cur_tid_offset_multi == 0 && used_index {
                2
            } else {
                1
            });
            backend.set_viewport(Viewport::new(viewport.x, viewport.y, w2, h2));
        }
        if blend_slices {
            backend.ensure_surface(Surface::Slice, w2, h2, resize)?;
            backend.ensure_surface(Surface::SliceId, w2, h2, resize)?;
        }
        self.targets_resize = false;

        let order_blend = blend::accumulate(self.render_mode, order);
        backend.set_blend(0, Some(order_blend));
        if used_index {
            backend.set_blend(1, None);
        }
        if !multi_shader && !blend_slices {
            if let Some(shader) = shaders.iter().flatten().next() {
                backend.bind_shader(*shader);
            }
        }
        backend.set_matrix(matrix::PROJECTION, mat4(&frame.view.projection));

        // The sweep.
        let f2b = order.is_front_to_back();
        if f2b {
            work.sort_by(|a, b| a.timin.cmp(&b.timin));
        } else {
            work.sort_by(|a, b| b.timax.cmp(&a.timax));
        }
        let step = if f2b { 1 } else { -1 };
        let origin = if f2b { all_timin } else { all_timax };
        let mut i = origin + if streaming { session.cur_tid_offset_multi } else { 0 };
        let in_range = |i: i32| if f2b { i <= all_timax } else { i >= all_timin };

        let mut active: Vec<SweepBrick> = Vec::new();
        let mut next = 0usize;
        let mut finished = 0usize;
        while in_range(i) {
            if session.budget_exceeded(clock) {
                log::debug!("frame budget exhausted at time index {i}");
                break;
            }
            while let Some(w) = work.get(next).copied() {
                let entered = if f2b { w.timin <= i } else { w.timax >= i };
                if !entered {
                    break;
                }
                next += 1;
                let member = &frames[w.member];
                let planes = members[w.member].planes;
                let Some(tex) = members[w.member].texture.as_mut() else {
                    continue;
                };
                let brick = &mut tex.bricks_mut()[w.brick];
                if streaming && brick.drawn(purpose) {
                    continue;
                }
                let in_view = !brick.is_skipped()
                    && test_against_view(brick.bbox(), &member.mvp, &planes, member.region.as_ref());
                if in_view {
                    active.push(w);
                } else if streaming {
                    brick.set_drawn(purpose, true);
                    session.count_brick();
                }
            }

            if active.is_empty() {
                i += step;
                continue;
            }

            if blend_slices {
                backend.bind_target(RenderTarget::Slice {
                    with_id: used_index,
                });
                backend.clear(if used_index { 2 } else { 1 });
                backend.set_blend(0, Some(blend::additive()));
            }

            for w in &active {
                let vr = &members[w.member];
                let member = &frames[w.member];
                let Some(tex) = vr.texture() else { continue };
                let brick = &tex.bricks()[w.brick];
                let Some(polygon) = polygon_at_index(brick.bbox(), &member.ray, member.dt, i) else {
                    continue;
                };
                let bucket = shader_bucket(vr, depth_mode);
                if blend_slices || multi_shader {
                    if let Some(shader) = shaders[bucket.index()] {
                        backend.bind_shader(shader);
                        backend.set_matrix(matrix::PROJECTION, mat4(&frame.view.projection));
                    }
                }
                let id_mode = if blend_slices && bucket.colormap == ColormapMode::Index {
                    1.0
                } else {
                    0.0
                };

                backend.set_matrix(
                    matrix::MODELVIEW,
                    mat4(&(frame.view.modelview * *tex.transform())),
                );
                backend.set_matrix(matrix::BRICK, mat4(&brick.unit_cube_transform()));
                let inv = brick.inv_dims();
                backend.set_param(
                    slot::BRICK,
                    vec4(inv.x, inv.y, inv.z, brick.rate_fac() / rate),
                );
                set_shading_params(backend, &vr.params, member.ray.direction, tex.spacing());
                let ctx = ColormapContext {
                    id_mode,
                    ..ColormapContext::new(w2, h2)
                };
                fill_colormap(backend, bucket.colormap, &vr.params, &ctx);
                set_clip_planes(backend, &vr.planes);

                let filter = if frame.interpolate && bucket.colormap != ColormapMode::Index {
                    wgpu::FilterMode::Linear
                } else {
                    wgpu::FilterMode::Nearest
                };
                let Some(data) =
                    backend.load_brick(tex.brick_ref(w.brick), brick.dims(), Channel::Data, filter)
                else {
                    log::warn!("brick {} of volume {} could not be made resident", w.brick, w.member);
                    continue;
                };
                backend.bind_texture(units::DATA, Some(data));
                backend.draw_polygon(&polygon);
            }

            if blend_slices {
                backend.bind_target(accum_target);
                match id_composite {
                    Some(shader) => backend.bind_shader(shader),
                    None => backend.release_shader(),
                }
                backend.bind_surface(units::IMAGE, Some(Surface::Slice));
                if used_index {
                    backend.bind_surface(units::IMAGE_ID, Some(Surface::SliceId));
                }
                backend.set_blend(0, Some(blend::accumulate(RenderMode::Over, order)));
                if used_index {
                    backend.set_blend(1, None);
                }
                backend.draw_quad();
                backend.bind_surface(units::IMAGE, None);
                if used_index {
                    backend.bind_surface(units::IMAGE_ID, None);
                }
            }

            active.retain(|w| {
                let passed = if f2b { w.timax <= i } else { w.timin >= i };
                if passed {
                    if streaming {
                        if let Some(tex) = members[w.member].texture.as_mut() {
                            tex.bricks_mut()[w.brick].set_drawn(purpose, true);
                        }
                        session.count_brick();
                    }
                    finished += 1;
                }
                !passed
            });
            i += step;
        }

        let mut offset = i - origin;
        if (f2b && offset > all_timax - all_timin) || (!f2b && offset < all_timin - all_timax) {
            offset = 0;
        }
        session.cur_tid_offset_multi = offset;

        if session.mem_swap && finished >= remain {
            session.clear_chan_buffer = true;
            session.save_final_buffer = true;
            session.done_current_chan = true;
            session.done_loop[purpose.index()] = true;
        }
        session.update_done();

        backend.bind_texture(units::DATA, None);
        backend.release_shader();
        if use_blend_target {
            composite(
                backend,
                &CompositeParams {
                    viewport,
                    target_width: w2,
                    target_height: h2,
                    tex_width: f64::from(self.res.x),
                    tex_height: f64::from(self.res.y),
                    zoom: frame.zoom,
                    scale_factor: self.scale.factor(),
                    min_weight: 0.4,
                    noise_reduction: self.noise_reduction && !depth_mode,
                    resize,
                },
            )?;
        }
        Ok(())
    }
}
