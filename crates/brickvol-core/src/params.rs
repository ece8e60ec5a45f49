//! Per-volume render parameters.

use glam::Vec3;

use crate::color::mask_color_for;
use crate::{ColormapMode, Interpolation, MaskLabelMode, RenderMode, RenderOptions};

/// Transfer function, shading, color, and sampling settings of one volume.
///
/// Read every frame to fill shader parameter slots; the renderers never change them
/// while drawing.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeParams {
    pub render_mode: RenderMode,

    pub scalar_scale: f64,
    pub gm_scale: f64,
    pub gamma3d: f64,
    pub gm_thresh: f64,
    pub offset: f64,
    /// Soft threshold width forwarded with the gamma slot.
    pub soft_threshold: f64,
    pub lo_thresh: f64,
    pub hi_thresh: f64,
    /// Negates the scalar scale in the shader.
    pub inverted: bool,

    pub shading: bool,
    pub ambient: f64,
    pub diffuse: f64,
    pub specular: f64,
    pub shine: f64,

    color: Vec3,
    mask_color: Vec3,
    mask_color_set: bool,
    pub mask_thresh: f64,
    pub alpha: f64,

    sampling_rate: f64,
    interactive_rate: f64,
    pub adaptive: bool,

    pub colormap_mode: ColormapMode,
    pub colormap_low: f64,
    pub colormap_high: f64,
    pub solid: bool,
    pub mask_label_mode: MaskLabelMode,
    pub noise_reduction: bool,
    pub interpolation: Interpolation,
}

impl Default for VolumeParams {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Over,
            scalar_scale: 1.0,
            gm_scale: 1.0,
            gamma3d: 1.0,
            gm_thresh: 0.0,
            offset: 1.0,
            soft_threshold: 0.0,
            lo_thresh: 0.0,
            hi_thresh: 1.0,
            inverted: false,
            shading: false,
            ambient: 1.0,
            diffuse: 1.0,
            specular: 1.0,
            shine: 10.0,
            color: Vec3::ONE,
            mask_color: Vec3::new(0.0, 1.0, 0.0),
            mask_color_set: false,
            mask_thresh: 0.0,
            alpha: 1.0,
            sampling_rate: 1.0,
            interactive_rate: 0.5,
            adaptive: true,
            colormap_mode: ColormapMode::Default,
            colormap_low: 0.0,
            colormap_high: 1.0,
            solid: false,
            mask_label_mode: MaskLabelMode::None,
            noise_reduction: false,
            interpolation: Interpolation::Linear,
        }
    }
}

impl VolumeParams {
    /// Copies the shared configuration surface into these parameters.
    pub fn apply_options(&mut self, options: &RenderOptions) {
        self.render_mode = options.render_mode;
        self.set_sampling_rate(options.sampling_rate);
        self.interactive_rate = options.interactive_rate;
        self.adaptive = options.adaptive;
        self.colormap_mode = options.colormap_mode;
        self.mask_label_mode = options.mask_label_mode;
        self.noise_reduction = options.noise_reduction;
        self.solid = options.solid;
        self.interpolation = options.interpolation;
    }

    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Sets the base color; the mask color follows unless it was set explicitly.
    pub fn set_color(&mut self, color: Vec3) {
        self.color = color;
        if !self.mask_color_set {
            self.mask_color = mask_color_for(color);
        }
    }

    pub fn mask_color(&self) -> Vec3 {
        self.mask_color
    }

    /// Overrides the derived mask color.
    pub fn set_mask_color(&mut self, color: Vec3) {
        self.mask_color = color;
        self.mask_color_set = true;
    }

    /// Returns to the mask color derived from the base color.
    pub fn reset_mask_color(&mut self) {
        self.mask_color_set = false;
        self.mask_color = mask_color_for(self.color);
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    /// Sets the still-frame rate; the interactive rate becomes `max(rate / 2, 0.1)`.
    pub fn set_sampling_rate(&mut self, rate: f64) {
        self.sampling_rate = rate;
        self.interactive_rate = (rate / 2.0).max(0.1);
    }

    pub fn interactive_rate(&self) -> f64 {
        self.interactive_rate
    }

    pub fn set_interactive_rate(&mut self, rate: f64) {
        self.interactive_rate = rate;
    }

    /// The rate in effect for the given interaction state.
    pub fn effective_rate(&self, interactive: bool) -> f64 {
        if interactive {
            self.interactive_rate
        } else {
            self.sampling_rate
        }
    }

    /// Scalar scale as uploaded (negated when inverted).
    pub fn signed_scalar_scale(&self) -> f64 {
        if self.inverted {
            -self.scalar_scale
        } else {
            self.scalar_scale
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interactive_rate_floor() {
        let mut p = VolumeParams::default();
        p.set_sampling_rate(0.1);
        assert!((p.interactive_rate() - 0.1).abs() < 1e-12);
        p.set_sampling_rate(4.0);
        assert!((p.interactive_rate() - 2.0).abs() < 1e-12);
        assert!((p.effective_rate(true) - 2.0).abs() < 1e-12);
        assert!((p.effective_rate(false) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_mask_color_follows_until_overridden() {
        let mut p = VolumeParams::default();
        p.set_color(Vec3::Y);
        assert!((p.mask_color() - Vec3::X).length() < 1e-4);
        p.set_mask_color(Vec3::Z);
        p.set_color(Vec3::X);
        assert_eq!(p.mask_color(), Vec3::Z);
        p.reset_mask_color();
        assert!((p.mask_color() - Vec3::new(0.0, 1.0, 1.0)).length() < 1e-4);
    }
}
