//! A backend that records every call instead of drawing.
//!
//! Used to run the renderers without a GPU: tests inspect the recorded command
//! stream, the current parameter slots, and which bricks were drawn at which slice.

use std::collections::{HashMap, HashSet};

use brickvol_core::{
    BrickRef, CalcOp, DVec3, ImageShader, Mat4, SegShaderKey, UVec3, Vec4, VolumeShaderKey,
};

use crate::backend::{
    Channel, CommandSink, RenderTarget, ShaderHandle, ShaderProvider, Surface, TextureHandle,
    TextureProvider, Viewport,
};
use crate::error::{RenderError, RenderResult};
use crate::gpu_textures::voxel_count;
use crate::polygonizer::SlicePolygon;
use crate::uniforms::ParamBlock;

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadBrick {
        brick: BrickRef,
        channel: Channel,
        filter: wgpu::FilterMode,
    },
    Pin(BrickRef),
    Unpin(BrickRef),
    ReadBack {
        brick: BrickRef,
        channel: Channel,
    },
    SetViewport(Viewport),
    BindShader(ShaderHandle),
    ReleaseShader,
    SetParam {
        slot: u32,
        value: Vec4,
    },
    SetMatrix {
        slot: u32,
        matrix: Mat4,
    },
    SetBlend {
        attachment: u32,
        blend: Option<wgpu::BlendState>,
    },
    EnsureSurface {
        surface: Surface,
        width: u32,
        height: u32,
        resize: bool,
    },
    BindTarget(RenderTarget),
    Clear(u32),
    BindTexture {
        unit: u32,
        texture: Option<TextureHandle>,
    },
    BindSurface {
        unit: u32,
        surface: Option<Surface>,
    },
    /// A slice polygon, attributed to the brick bound on the data unit.
    DrawPolygon {
        brick: Option<BrickRef>,
        t: f64,
        vertices: usize,
    },
    DrawLayer {
        target: Option<BrickRef>,
        z: f64,
    },
    DrawQuad,
    DrawLines {
        segments: usize,
        color: Vec4,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ShaderRequest {
    Volume(VolumeShaderKey),
    Seg(SegShaderKey),
    Calc(CalcOp),
    Image(ImageShader),
}

/// Records calls and hands out fake handles.
#[derive(Debug)]
pub struct RecordingBackend {
    pub commands: Vec<Command>,
    /// Current value of every parameter and matrix slot.
    pub params: ParamBlock,
    viewport: Viewport,

    textures: HashMap<TextureHandle, (BrickRef, Channel, UVec3)>,
    handles: HashMap<(BrickRef, Channel), TextureHandle>,
    next_texture: u64,
    shaders: HashMap<ShaderRequest, ShaderHandle>,
    pinned: HashSet<BrickRef>,
    bound: HashMap<u32, TextureHandle>,
    target: RenderTarget,

    /// Bricks whose textures fail to load.
    pub failing_textures: HashSet<BrickRef>,
    /// Makes every shader request fail.
    pub shaders_unavailable: bool,
    /// Payloads returned by [`TextureProvider::read_back`].
    pub payloads: HashMap<(BrickRef, Channel), Vec<u8>>,
}

impl RecordingBackend {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            commands: Vec::new(),
            params: ParamBlock::default(),
            viewport,
            textures: HashMap::new(),
            handles: HashMap::new(),
            next_texture: 1,
            shaders: HashMap::new(),
            pinned: HashSet::new(),
            bound: HashMap::new(),
            target: RenderTarget::Frame,
            failing_textures: HashSet::new(),
            shaders_unavailable: false,
            payloads: HashMap::new(),
        }
    }

    /// Forgets recorded commands, keeping handles and state.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Every drawn polygon as `(brick, t)`.
    pub fn polygon_draws(&self) -> Vec<(Option<BrickRef>, f64)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawPolygon { brick, t, .. } => Some((*brick, *t)),
                _ => None,
            })
            .collect()
    }

    /// Distinct bricks that received at least one polygon, in first-draw order.
    pub fn drawn_bricks(&self) -> Vec<BrickRef> {
        let mut seen = HashSet::new();
        self.polygon_draws()
            .into_iter()
            .filter_map(|(b, _)| b)
            .filter(|b| seen.insert(*b))
            .collect()
    }

    /// Number of axis-aligned layers drawn into brick textures.
    pub fn layer_draws(&self) -> Vec<(Option<BrickRef>, f64)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawLayer { target, z } => Some((*target, *z)),
                _ => None,
            })
            .collect()
    }

    /// Blend states set on one attachment, in order.
    pub fn blend_states(&self, attachment: u32) -> Vec<Option<wgpu::BlendState>> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SetBlend {
                    attachment: a,
                    blend,
                } if *a == attachment => Some(*blend),
                _ => None,
            })
            .collect()
    }

    /// Every value written to one parameter slot, in order.
    pub fn param_writes(&self, slot: u32) -> Vec<Vec4> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::SetParam { slot: s, value } if *s == slot => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Command) -> bool) -> usize {
        self.commands.iter().filter(|c| pred(c)).count()
    }

    pub fn is_pinned(&self, brick: BrickRef) -> bool {
        self.pinned.contains(&brick)
    }

    /// The brick and channel behind a texture handle.
    pub fn texture_source(&self, texture: TextureHandle) -> Option<(BrickRef, Channel)> {
        self.textures.get(&texture).map(|(b, c, _)| (*b, *c))
    }

    fn shader(&mut self, request: ShaderRequest) -> RenderResult<ShaderHandle> {
        if self.shaders_unavailable {
            return Err(RenderError::ShaderUnavailable(format!("{request:?}")));
        }
        let next = ShaderHandle(self.shaders.len() as u64 + 1);
        Ok(*self.shaders.entry(request).or_insert(next))
    }
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new(Viewport::sized(800, 600))
    }
}

impl TextureProvider for RecordingBackend {
    fn load_brick(
        &mut self,
        brick: BrickRef,
        dims: UVec3,
        channel: Channel,
        filter: wgpu::FilterMode,
    ) -> Option<TextureHandle> {
        self.commands.push(Command::LoadBrick {
            brick,
            channel,
            filter,
        });
        if self.failing_textures.contains(&brick) {
            return None;
        }
        if let Some(handle) = self.handles.get(&(brick, channel)) {
            return Some(*handle);
        }
        let handle = TextureHandle(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(handle, (brick, channel, dims));
        self.handles.insert((brick, channel), handle);
        Some(handle)
    }

    fn pin(&mut self, brick: BrickRef) {
        self.commands.push(Command::Pin(brick));
        self.pinned.insert(brick);
    }

    fn unpin(&mut self, brick: BrickRef) {
        self.commands.push(Command::Unpin(brick));
        self.pinned.remove(&brick);
    }

    fn read_back(&mut self, brick: BrickRef, channel: Channel) -> RenderResult<Vec<u8>> {
        self.commands.push(Command::ReadBack { brick, channel });
        if let Some(payload) = self.payloads.get(&(brick, channel)) {
            return Ok(payload.clone());
        }
        let handle = self.handles.get(&(brick, channel)).ok_or_else(|| {
            RenderError::ReadbackFailed(format!("brick {} is not resident", brick.index))
        })?;
        let dims = self.textures.get(handle).map_or(UVec3::ZERO, |t| t.2);
        Ok(vec![0; voxel_count(dims)])
    }
}

impl ShaderProvider for RecordingBackend {
    fn volume_shader(&mut self, key: &VolumeShaderKey) -> RenderResult<ShaderHandle> {
        self.shader(ShaderRequest::Volume(*key))
    }

    fn seg_shader(&mut self, key: &SegShaderKey) -> RenderResult<ShaderHandle> {
        self.shader(ShaderRequest::Seg(*key))
    }

    fn calc_shader(&mut self, op: CalcOp) -> RenderResult<ShaderHandle> {
        self.shader(ShaderRequest::Calc(op))
    }

    fn image_shader(&mut self, kind: ImageShader) -> RenderResult<ShaderHandle> {
        self.shader(ShaderRequest::Image(kind))
    }
}

impl CommandSink for RecordingBackend {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
    }

    fn bind_shader(&mut self, shader: ShaderHandle) {
        self.commands.push(Command::BindShader(shader));
    }

    fn release_shader(&mut self) {
        self.commands.push(Command::ReleaseShader);
    }

    fn set_param(&mut self, slot: u32, value: Vec4) {
        self.params.set_param(slot, value);
        self.commands.push(Command::SetParam { slot, value });
    }

    fn set_matrix(&mut self, slot: u32, matrix: Mat4) {
        self.params.set_matrix(slot, matrix);
        self.commands.push(Command::SetMatrix { slot, matrix });
    }

    fn set_blend(&mut self, attachment: u32, blend: Option<wgpu::BlendState>) {
        self.commands.push(Command::SetBlend { attachment, blend });
    }

    fn ensure_surface(
        &mut self,
        surface: Surface,
        width: u32,
        height: u32,
        resize: bool,
    ) -> RenderResult<()> {
        self.commands.push(Command::EnsureSurface {
            surface,
            width,
            height,
            resize,
        });
        Ok(())
    }

    fn bind_target(&mut self, target: RenderTarget) {
        self.target = target;
        self.commands.push(Command::BindTarget(target));
    }

    fn clear(&mut self, attachments: u32) {
        self.commands.push(Command::Clear(attachments));
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(t) => {
                self.bound.insert(unit, t);
            }
            None => {
                self.bound.remove(&unit);
            }
        }
        self.commands.push(Command::BindTexture { unit, texture });
    }

    fn bind_surface(&mut self, unit: u32, surface: Option<Surface>) {
        self.commands.push(Command::BindSurface { unit, surface });
    }

    fn draw_polygon(&mut self, polygon: &SlicePolygon) {
        let brick = self
            .bound
            .get(&crate::backend::units::DATA)
            .and_then(|t| self.texture_source(*t))
            .map(|(b, _)| b);
        self.commands.push(Command::DrawPolygon {
            brick,
            t: polygon.t,
            vertices: polygon.len(),
        });
    }

    fn draw_layer(&mut self, z: f64) {
        let target = match self.target {
            RenderTarget::Layer { texture, .. } => self.texture_source(texture).map(|(b, _)| b),
            _ => None,
        };
        self.commands.push(Command::DrawLayer { target, z });
    }

    fn draw_quad(&mut self) {
        self.commands.push(Command::DrawQuad);
    }

    fn draw_lines(&mut self, segments: &[[DVec3; 2]], color: Vec4) {
        self.commands.push(Command::DrawLines {
            segments: segments.len(),
            color,
        });
    }
}
