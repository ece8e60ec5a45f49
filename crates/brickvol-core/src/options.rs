//! Configuration options for volume rendering.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{BrickvolError, Result};

/// Recognized renderer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Sampling rate used for still frames.
    pub sampling_rate: f64,

    /// Sampling rate used while the view is being manipulated.
    pub interactive_rate: f64,

    /// Whether to switch to the interactive rate during interaction.
    pub adaptive: bool,

    /// Compositing operator.
    pub render_mode: RenderMode,

    /// How values are mapped to colors.
    pub colormap_mode: ColormapMode,

    /// Which segmentation channels are shown.
    pub mask_label_mode: MaskLabelMode,

    /// Whether the min/max/sharpen filter chain runs after accumulation.
    pub noise_reduction: bool,

    /// Whether volumes are drawn as solids (no alpha accumulation).
    pub solid: bool,

    /// Texture filter for brick sampling.
    pub interpolation: Interpolation,

    /// Bits per channel of the accumulation target (8 draws directly, higher uses
    /// an offscreen float target).
    pub blend_num_bits: u32,

    /// Compositing direction.
    pub update_order: UpdateOrder,

    /// Whether frames are drawn across several budget-limited passes.
    pub mem_swap: bool,

    /// Per-pass time budget in milliseconds.
    pub up_time_ms: u64,

    /// Bricks per channel drawn in interactive streaming mode.
    pub quota_bricks: usize,

    /// Whether the multi-volume sweep composites each time index separately.
    pub blend_slices: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sampling_rate: 1.0,
            interactive_rate: 0.5,
            adaptive: true,
            render_mode: RenderMode::Over,
            colormap_mode: ColormapMode::Default,
            mask_label_mode: MaskLabelMode::None,
            noise_reduction: false,
            solid: false,
            interpolation: Interpolation::Linear,
            blend_num_bits: 32,
            update_order: UpdateOrder::BackToFront,
            mem_swap: false,
            up_time_ms: 100,
            quota_bricks: 16,
            blend_slices: false,
        }
    }
}

impl RenderOptions {
    /// Reads options from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    /// Writes options to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.sampling_rate.is_nan() || self.sampling_rate <= 0.0 {
            return Err(BrickvolError::InvalidConfig(format!(
                "sampling_rate must be positive, got {}",
                self.sampling_rate
            )));
        }
        if self.interactive_rate.is_nan() || self.interactive_rate <= 0.0 {
            return Err(BrickvolError::InvalidConfig(format!(
                "interactive_rate must be positive, got {}",
                self.interactive_rate
            )));
        }
        if self.mem_swap && self.up_time_ms == 0 {
            return Err(BrickvolError::InvalidConfig(
                "up_time_ms must be non-zero when mem_swap is enabled".into(),
            ));
        }
        if self.blend_num_bits == 0 {
            return Err(BrickvolError::InvalidConfig(
                "blend_num_bits must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Compositing operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RenderMode {
    /// Alpha compositing.
    #[default]
    Over,
    /// Maximum intensity projection.
    Mip,
}

/// How sampled values turn into colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColormapMode {
    /// Base color scaled by the transfer function.
    #[default]
    Default,
    /// Rainbow lookup between a low and high value.
    Rainbow,
    /// Depth encoding (used for shadows).
    Depth,
    /// Per-label index colors.
    Index,
}

/// Number of [`ColormapMode`] variants.
pub const COLORMAP_MODE_COUNT: usize = 4;

impl ColormapMode {
    pub const ALL: [ColormapMode; COLORMAP_MODE_COUNT] = [
        ColormapMode::Default,
        ColormapMode::Rainbow,
        ColormapMode::Depth,
        ColormapMode::Index,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Which segmentation channels are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MaskLabelMode {
    /// Data only.
    #[default]
    None,
    /// Data inside the mask.
    ShowMasked,
    /// Data outside the mask.
    ShowUnmasked,
    /// Label colors.
    Label,
    /// Label colors restricted to the mask.
    LabelAndMask,
}

impl MaskLabelMode {
    /// Numeric code used by shader variants.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Falls back to a mode the available channels can serve.
    pub fn resolve(self, has_mask: bool, has_label: bool) -> Self {
        match self {
            Self::None => Self::None,
            Self::ShowMasked | Self::ShowUnmasked if !has_mask => Self::None,
            Self::Label if !has_label => Self::None,
            Self::LabelAndMask if !has_label && has_mask => Self::ShowMasked,
            Self::LabelAndMask if !has_label => Self::None,
            other => other,
        }
    }

    pub fn uses_mask(self) -> bool {
        matches!(self, Self::ShowMasked | Self::ShowUnmasked | Self::LabelAndMask)
    }

    pub fn uses_label(self) -> bool {
        matches!(self, Self::Label | Self::LabelAndMask)
    }
}

/// Compositing direction.
///
/// `BackToFront` composites with the over operator `src + dst * (1 - srcA)`;
/// `FrontToBack` uses the under operator `src * (1 - dstA) + dst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum UpdateOrder {
    /// Update order 0.
    #[default]
    BackToFront,
    /// Update order 1.
    FrontToBack,
}

impl UpdateOrder {
    pub fn code(self) -> u32 {
        match self {
            Self::BackToFront => 0,
            Self::FrontToBack => 1,
        }
    }

    pub fn from_code(code: u32) -> Self {
        if code == 1 {
            Self::FrontToBack
        } else {
            Self::BackToFront
        }
    }

    pub fn is_front_to_back(self) -> bool {
        self == Self::FrontToBack
    }
}

/// Texture sampling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}
