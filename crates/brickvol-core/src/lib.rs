//! Core types for brickvol.
//!
//! This crate holds the data the brick renderers schedule over:
//! - [`Brick`] and the [`VolumeTexture`] container that owns a volume's bricks
//! - Geometry ([`BBox`], [`Ray`]) and the six-plane [`ClipPlanes`] set
//! - Per-volume [`VolumeParams`] and the shared [`RenderOptions`] configuration
//! - The [`StreamingSession`] that lets a frame be drawn across budget-limited passes
//! - Typed shader variant keys

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Options and session structs legitimately have many boolean flags
#![allow(clippy::struct_excessive_bools)]
// Accessors return values which don't need must_use
#![allow(clippy::must_use_candidate)]
// Names like nx/ny/nz and timin/timax are the established vocabulary
#![allow(clippy::similar_names)]

pub mod brick;
pub mod clip_planes;
pub mod color;
pub mod error;
pub mod geometry;
pub mod options;
pub mod params;
pub mod session;
pub mod shader_key;
pub mod texture;

pub use brick::{Brick, RenderPurpose, RENDER_PURPOSE_COUNT};
pub use clip_planes::{ClipPlaneUniforms, ClipPlanes, ClipRegion, Plane};
pub use color::{mask_color_for, Hsv};
pub use error::{BrickvolError, Result};
pub use geometry::{BBox, Ray};
pub use options::{
    ColormapMode, Interpolation, MaskLabelMode, RenderMode, RenderOptions, UpdateOrder,
    COLORMAP_MODE_COUNT,
};
pub use params::VolumeParams;
pub use session::{Clock, StepClock, StreamingSession, SystemClock};
pub use shader_key::{
    CalcOp, HiddenRemoval, ImageShader, LabelMode, LabelOp, MaskOp, PaintMode, SegShaderKey,
    ShaderBucket, VolumeShaderKey,
};
pub use texture::{BrickRef, VolumeId, VolumeTexture};

// Re-export glam types for convenience
pub use glam::{DMat4, DVec3, Mat4, UVec3, Vec3, Vec4};
