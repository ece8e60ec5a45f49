//! brickvol: brick-based slice volume rendering.
//!
//! Volumes are split into bricks. Every frame the renderers order the bricks along the
//! view ray, cut them into view-aligned slice polygons and composite the slices into an
//! accumulation target. With memory swap enabled a frame is drawn across several
//! budget-limited passes, each resuming where the previous one stopped.
//!
//! # Quick Start
//!
//! ```no_run
//! use brickvol::*;
//!
//! fn main() -> brickvol::Result<()> {
//!     init();
//!
//!     let options = RenderOptions::default();
//!     let mut vr = VolumeRenderer::new(VolumeTexture::from_grid(
//!         UVec3::new(256, 256, 128),
//!         UVec3::splat(64),
//!     ));
//!     vr.apply_options(&options);
//!
//!     let mut backend = RecordingBackend::default();
//!     let mut driver = FrameDriver::new(&options, SystemClock::new());
//!     driver.begin(&[&vr]);
//!     while driver.draw_single(&mut backend, &mut vr, &FrameParams::default())?
//!         == PassOutcome::Continue
//!     {}
//!     driver.finish(&mut [&mut vr]);
//!     Ok(())
//! }
//! ```
//!
//! # Crates
//!
//! - `brickvol-core`: bricks, volume textures, parameters, options and the streaming
//!   session
//! - `brickvol-render`: scheduling, the renderers and the backend seams

mod driver;
mod error;

use pollster::FutureExt;

pub use driver::{FrameDriver, PassOutcome};
pub use error::{Error, Result};

// Re-export core types
pub use brickvol_core::{
    BBox, Brick, BrickRef, BrickvolError, CalcOp, ClipPlanes, ClipRegion, Clock, ColormapMode,
    DMat4, DVec3, Interpolation, LabelMode, LabelOp, MaskLabelMode, MaskOp, Mat4, PaintMode,
    Plane, Ray, RenderMode, RenderOptions, RenderPurpose, StepClock, StreamingSession,
    SystemClock, UVec3, UpdateOrder, Vec3, Vec4, VolumeId, VolumeParams, VolumeTexture,
};

// Re-export render types
pub use brickvol_render::{
    Channel, Command, CommandSink, FrameParams, LabelParams, MaskParams, MultiVolumeRenderer,
    RecordingBackend, RenderBackend, RenderError, ShaderProvider, SharedVolume,
    TextureProvider, ViewState, Viewport, VolumeRenderer, WgpuBrickTextures,
};

/// Installs the `env_logger` backend for the `log` facade.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    if env_logger::try_init().is_ok() {
        log::info!("brickvol initialized");
    }
}

/// Creates a wgpu brick residency provider on a headless device.
///
/// # Errors
/// Fails when no adapter or device is available.
pub fn headless_textures(max_resident: usize) -> Result<WgpuBrickTextures> {
    let textures = WgpuBrickTextures::new_headless(max_resident).block_on()?;
    Ok(textures)
}

/// The wgpu filter mode matching a volume's interpolation setting.
pub fn filter_mode(interpolation: Interpolation) -> wgpu::FilterMode {
    match interpolation {
        Interpolation::Linear => wgpu::FilterMode::Linear,
        Interpolation::Nearest => wgpu::FilterMode::Nearest,
    }
}
