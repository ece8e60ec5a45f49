//! Brick scheduling and slice-based volume rendering for brickvol.
//!
//! This crate provides:
//! - Brick visibility tests, depth ordering and time-index windows
//! - The view-aligned slice polygonizer
//! - [`VolumeRenderer`] and the interleaving [`MultiVolumeRenderer`]
//! - Mask/label painting and volume calculations on top of the single-volume renderer
//! - The backend traits renderers draw through, a recording backend for tests, and a
//!   wgpu brick residency provider

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Accessors return values which don't need must_use
#![allow(clippy::must_use_candidate)]
// Names like nx/ny/nz and timin/timax are the established vocabulary
#![allow(clippy::similar_names)]
// GPU-facing values are f32 while scheduling math runs in f64
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod blend;
pub mod error;
pub mod filter_pass;
pub mod gpu_textures;
pub mod headless;
pub mod mask_threshold;
pub mod multi_volume_renderer;
pub mod polygonizer;
pub mod scale;
pub mod segmentation;
pub mod uniforms;
pub mod visibility;
pub mod volume_renderer;

pub use backend::{
    Channel, CommandSink, RenderBackend, RenderTarget, ShaderHandle, ShaderProvider, Surface,
    TextureHandle, TextureProvider, Viewport,
};
pub use error::{RenderError, RenderResult};
pub use filter_pass::{composite, CompositeParams};
pub use gpu_textures::{voxel_count, WgpuBrickTextures};
pub use headless::{Command, RecordingBackend};
pub use mask_threshold::threshold_mask;
pub use multi_volume_renderer::{MultiVolumeRenderer, SharedVolume};
pub use polygonizer::{
    box_edges, compute_polygons, num_slices, polygon_at_index, slice_polygon, SlicePolygon,
};
pub use scale::{calc_filter_size, calc_scale_factor, FilterKind, ScaleFactorState};
pub use segmentation::{LabelParams, MaskParams};
pub use visibility::{
    closest_bricks, combine_quota_bricks, compute_t_index, compute_view, depth_key,
    sort_bricks, test_against_view, SamplingScale, ViewState,
};
pub use volume_renderer::{FrameParams, SliceSpacing, VolumeRenderer, BASE_SLICE_SPACING};
