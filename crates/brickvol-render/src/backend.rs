//! The seams between the renderers and the graphics layer.
//!
//! Renderers never talk to the GPU directly. They ask a [`TextureProvider`] for
//! resident brick textures, a [`ShaderProvider`] for compiled program variants, and
//! push draw state into a [`CommandSink`]. Anything implementing all three is a
//! [`RenderBackend`].

use brickvol_core::{
    BrickRef, CalcOp, DVec3, ImageShader, Mat4, SegShaderKey, UVec3, Vec4, VolumeShaderKey,
};

use crate::error::RenderResult;
use crate::polygonizer::SlicePolygon;

/// Opaque handle to a resident texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Opaque handle to a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u64);

/// Which payload of a brick to make resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Data,
    Mask,
    Label,
}

/// Texture units used by the volume and segmentation shaders.
pub mod units {
    pub const DATA: u32 = 0;
    /// Second operand data in calculations.
    pub const OPERAND_A: u32 = 1;
    pub const OPERAND_B: u32 = 2;
    pub const MASK: u32 = 2;
    pub const LABEL: u32 = 3;
    pub const MASK_A: u32 = 3;
    pub const MASK_B: u32 = 4;
    /// Screen-space input of full-screen passes.
    pub const IMAGE: u32 = 0;
    pub const IMAGE_ID: u32 = 1;
}

/// Offscreen 2D surfaces shared by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    /// Float accumulation target.
    Blend,
    /// Per-fragment volume id written alongside [`Surface::Blend`].
    BlendId,
    /// Intermediate target of the noise-reduction chain.
    Filter,
    /// Scratch target for one time index when blending slices.
    Slice,
    SliceId,
}

/// Where subsequent draws land.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// The caller's framebuffer.
    Frame,
    /// The accumulation target, optionally with its ID attachment.
    Blend { with_id: bool },
    Filter,
    Slice { with_id: bool },
    /// One z layer of a 3D brick texture.
    Layer { texture: TextureHandle, z: u32 },
}

/// Screen rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn sized(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }
}

/// Brick texture residency.
pub trait TextureProvider {
    /// Makes one channel of a brick resident and returns its handle.
    ///
    /// `None` means the brick could not be made resident this frame; callers skip it.
    fn load_brick(
        &mut self,
        brick: BrickRef,
        dims: UVec3,
        channel: Channel,
        filter: wgpu::FilterMode,
    ) -> Option<TextureHandle>;

    /// Keeps a brick resident across frames.
    fn pin(&mut self, brick: BrickRef);

    fn unpin(&mut self, brick: BrickRef);

    /// Copies a resident channel back to the CPU.
    fn read_back(&mut self, brick: BrickRef, channel: Channel) -> RenderResult<Vec<u8>>;
}

/// Compiled shader variants, cached by key.
pub trait ShaderProvider {
    fn volume_shader(&mut self, key: &VolumeShaderKey) -> RenderResult<ShaderHandle>;
    fn seg_shader(&mut self, key: &SegShaderKey) -> RenderResult<ShaderHandle>;
    fn calc_shader(&mut self, op: CalcOp) -> RenderResult<ShaderHandle>;
    fn image_shader(&mut self, kind: ImageShader) -> RenderResult<ShaderHandle>;
}

/// Draw state and draw calls.
pub trait CommandSink {
    /// Size of the caller's framebuffer.
    fn viewport(&self) -> Viewport;
    fn set_viewport(&mut self, viewport: Viewport);

    fn bind_shader(&mut self, shader: ShaderHandle);
    fn release_shader(&mut self);
    fn set_param(&mut self, slot: u32, value: Vec4);
    fn set_matrix(&mut self, slot: u32, matrix: Mat4);

    /// Sets the blend state of one color attachment; `None` disables blending.
    fn set_blend(&mut self, attachment: u32, blend: Option<wgpu::BlendState>);

    /// Allocates a surface, reallocating when `resize` is set or the size changed.
    fn ensure_surface(
        &mut self,
        surface: Surface,
        width: u32,
        height: u32,
        resize: bool,
    ) -> RenderResult<()>;
    fn bind_target(&mut self, target: RenderTarget);
    /// Clears the first `attachments` color attachments of the bound target.
    fn clear(&mut self, attachments: u32);

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);
    fn bind_surface(&mut self, unit: u32, surface: Option<Surface>);

    fn draw_polygon(&mut self, polygon: &SlicePolygon);
    /// Draws an axis-aligned unit quad at texture depth `z`.
    fn draw_layer(&mut self, z: f64);
    /// Draws a full-screen quad.
    fn draw_quad(&mut self);
    fn draw_lines(&mut self, segments: &[[DVec3; 2]], color: Vec4);
}

/// Everything a renderer needs from the graphics layer.
pub trait RenderBackend: TextureProvider + ShaderProvider + CommandSink {}

impl<T: TextureProvider + ShaderProvider + CommandSink> RenderBackend for T {}
