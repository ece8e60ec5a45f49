//! Strongly typed shader variant keys.
//!
//! Shader providers cache compiled programs by these keys; the renderers never build
//! numeric variant ids.

use crate::{ColormapMode, MaskLabelMode, COLORMAP_MODE_COUNT};

/// Selects one volume-rendering shader variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeShaderKey {
    /// Data components per voxel.
    pub components: u32,
    pub shading: bool,
    pub fog: bool,
    /// Depth-peeling layer (0 = off).
    pub depth_peel: u32,
    pub hi_quality: bool,
    pub mask_label: MaskLabelMode,
    pub colormap: ColormapMode,
    pub solid: bool,
}

impl Default for VolumeShaderKey {
    fn default() -> Self {
        Self {
            components: 1,
            shading: false,
            fog: false,
            depth_peel: 0,
            hi_quality: true,
            mask_label: MaskLabelMode::None,
            colormap: ColormapMode::Default,
            solid: false,
        }
    }
}

/// One of the `(colormap, solid)` shader buckets of the multi-volume renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderBucket {
    pub colormap: ColormapMode,
    pub solid: bool,
}

impl ShaderBucket {
    pub const COUNT: usize = COLORMAP_MODE_COUNT * 2;

    pub const fn new(colormap: ColormapMode, solid: bool) -> Self {
        Self { colormap, solid }
    }

    /// Dense index in `0..COUNT`.
    pub fn index(self) -> usize {
        self.colormap.index() * 2 + usize::from(self.solid)
    }
}

/// Mask generation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaskOp {
    /// Seed the mask from a 2D paint stroke.
    Initialize,
    /// Grow the mask by diffusion.
    DiffusionGrow,
    /// Remove small noise using the mask (writes the data texture).
    NoiseRemove,
}

/// Paint tool modes forwarded to mask shaders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaintMode {
    #[default]
    Select,
    Append,
    Erase,
    Diffuse,
    Flood,
    Clear,
    All,
    Posterize,
}

impl PaintMode {
    pub fn code(self) -> u32 {
        match self {
            Self::Select => 1,
            Self::Append => 2,
            Self::Erase => 3,
            Self::Diffuse => 4,
            Self::Flood => 5,
            Self::Clear => 6,
            Self::All => 7,
            Self::Posterize => 11,
        }
    }
}

/// Hidden-surface removal while painting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HiddenRemoval {
    #[default]
    None,
    Orthographic,
    Perspective,
}

/// Label generation passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelOp {
    /// Assign initial ids inside the mask.
    Initialize,
    /// Propagate the maximum id to neighbors.
    MaxFilter,
}

/// Label value assignment modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LabelMode {
    #[default]
    Normal,
    Posterized,
    CopyValues,
    PosterizedCopy,
}

/// Selects one segmentation shader variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegShaderKey {
    Mask {
        op: MaskOp,
        paint_mode: PaintMode,
        hidden_removal: HiddenRemoval,
        use_2d_weight: bool,
        depth_peel: u32,
        hi_quality: bool,
    },
    Label {
        op: LabelOp,
        mode: LabelMode,
        has_mask: bool,
        hi_quality: bool,
    },
}

/// Voxel combination operators between volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcOp {
    Subtract,
    Add,
    Divide,
    Intersect,
    ApplyMask,
    ApplyMaskTransfer,
    ApplyMaskTransferInverse,
    IntersectMasked,
}

impl CalcOp {
    /// Numeric operator id (1..8).
    pub fn code(self) -> u32 {
        match self {
            Self::Subtract => 1,
            Self::Add => 2,
            Self::Divide => 3,
            Self::Intersect => 4,
            Self::ApplyMask => 5,
            Self::ApplyMaskTransfer => 6,
            Self::ApplyMaskTransferInverse => 7,
            Self::IntersectMasked => 8,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            1 => Self::Subtract,
            2 => Self::Add,
            3 => Self::Divide,
            4 => Self::Intersect,
            5 => Self::ApplyMask,
            6 => Self::ApplyMaskTransfer,
            7 => Self::ApplyMaskTransferInverse,
            8 => Self::IntersectMasked,
            _ => return None,
        })
    }

    /// Operators whose slot 0 carries mask presence instead of inversion flags.
    pub fn reports_masks(self) -> bool {
        matches!(
            self,
            Self::Subtract | Self::Add | Self::Divide | Self::Intersect | Self::IntersectMasked
        )
    }

    /// Operators that also read the primary transfer function.
    pub fn uses_transfer(self) -> bool {
        matches!(self, Self::ApplyMaskTransfer | Self::ApplyMaskTransferInverse)
    }

    /// Operators that read the first operand's mask.
    pub fn reads_mask_a(self) -> bool {
        matches!(
            self,
            Self::ApplyMask
                | Self::ApplyMaskTransfer
                | Self::ApplyMaskTransferInverse
                | Self::IntersectMasked
        )
    }

    /// Operators that read the second operand's mask.
    pub fn reads_mask_b(self) -> bool {
        self == Self::IntersectMasked
    }
}

/// Full-screen image passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageShader {
    FilterMin,
    FilterMax,
    Sharpen,
    /// Composites a per-slice scratch target together with its ID buffer.
    BlendIdColor,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_indices_are_dense() {
        let mut seen = [false; ShaderBucket::COUNT];
        for cmode in ColormapMode::ALL {
            for solid in [false, true] {
                seen[ShaderBucket::new(cmode, solid).index()] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_calc_codes() {
        for code in 1..=8 {
            assert_eq!(CalcOp::from_code(code).unwrap().code(), code);
        }
        assert!(CalcOp::from_code(9).is_none());
        assert!(CalcOp::IntersectMasked.reads_mask_a() && CalcOp::IntersectMasked.reads_mask_b());
    }
}
