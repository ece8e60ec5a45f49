//! Rendering error types.

use brickvol_core::BrickvolError;
use thiserror::Error;

/// Errors that can occur during rendering operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// The shader provider has no program for the requested variant.
    #[error("shader unavailable: {0}")]
    ShaderUnavailable(String),

    /// Texture creation failed.
    #[error("texture creation failed: {0}")]
    TextureCreationFailed(String),

    /// Reading a brick back from the GPU failed.
    #[error("readback failed: {0}")]
    ReadbackFailed(String),

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,

    /// Error from the core data model.
    #[error(transparent)]
    Core(#[from] BrickvolError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;
