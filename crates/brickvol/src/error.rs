//! Error type of the facade crate.

use brickvol_core::BrickvolError;
use brickvol_render::RenderError;
use thiserror::Error;

/// Errors surfaced by brickvol.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or data.
    #[error(transparent)]
    Core(#[from] BrickvolError),

    /// A rendering pass failed before drawing.
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A specialized Result type for brickvol operations.
pub type Result<T> = std::result::Result<T, Error>;
