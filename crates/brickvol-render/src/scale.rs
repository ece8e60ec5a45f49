//! Offscreen target scaling and noise-filter sizing.
//!
//! Accumulation targets are rendered below screen resolution when the volume is small
//! on screen. The fitted curves below pick the scale factor and the kernel sizes of
//! the min, max, and sharpen filters from the viewport, the volume resolution, and the
//! zoom.

/// Which image filter to size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Min,
    Max,
    Sharpen,
}

/// Clamped texture size and the matching viewport extent.
fn reference_sizes(w: f64, h: f64, tex_w: f64, tex_h: f64, max_cs: f64) -> (f64, f64) {
    if w > h {
        (tex_h.clamp(500.0, max_cs), h)
    } else {
        (tex_w.clamp(500.0, max_cs), w)
    }
}

/// Scale factor in `[0.6, 1.0]` for the accumulation targets.
pub fn calc_scale_factor(w: f64, h: f64, tex_w: f64, tex_h: f64, zoom: f64) -> f64 {
    let (cs, vs) = reference_sizes(w, h, tex_w, tex_h, 2000.0);
    let cs3 = cs * cs * cs;
    let p1 = 1.282e9 / cs3 + 1.522;
    let p2 = -8.494e7 / cs3 + 0.496;
    let sf = cs * p1 / (vs * zoom) + p2;
    if sf.is_nan() {
        return 1.0;
    }
    sf.clamp(0.6, 1.0)
}

/// Kernel size of an image filter, in pixels of the full-size viewport.
pub fn calc_filter_size(
    kind: FilterKind,
    w: f64,
    h: f64,
    tex_w: f64,
    tex_h: f64,
    zoom: f64,
    sf: f64,
) -> f64 {
    let (cs, vs) = reference_sizes(w, h, tex_w, tex_h, 1200.0);
    let size = match kind {
        FilterKind::Min => {
            let p = 0.29633 - 2.18448e-4 * cs;
            ((p * zoom + 0.24512) * sf).clamp(0.0, 2.0)
        }
        FilterKind::Max => {
            let p1 = 0.26051 - 1.90542e-4 * cs;
            let p2 = (-0.29188 + 2.45276e-4 * cs).min(0.0);
            ((p1 * zoom + p2) * sf).clamp(0.0, 2.0)
        }
        FilterKind::Sharpen => (0.012221 * zoom).clamp(0.0, 0.25),
    };
    size * vs / 800.0
}

/// The current scale factor, updated with hysteresis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactorState {
    factor: f64,
}

impl Default for ScaleFactorState {
    fn default() -> Self {
        Self { factor: 1.0 }
    }
}

impl ScaleFactorState {
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Adopts `sf` when it moved by more than 0.05 or snapped back to 1.
    ///
    /// Returns true when the targets must be reallocated.
    #[allow(clippy::float_cmp)]
    pub fn update(&mut self, sf: f64) -> bool {
        if (sf - self.factor).abs() > 0.05 || (sf == 1.0 && self.factor != 1.0) {
            self.factor = sf;
            true
        } else {
            false
        }
    }

    /// Scaled target size `round(w * sf) x round(h * sf)`.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |v: u32| ((f64::from(v) * self.factor + 0.5) as u32).max(1);
        (scale(width), scale(height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor_is_clamped() {
        // Tiny volume on a large screen: the fit drops below the floor.
        assert!((calc_scale_factor(2000.0, 1000.0, 100.0, 100.0, 10.0) - 0.6).abs() < 1e-12);
        // Large volume zoomed out on a small screen: capped at 1.
        assert!((calc_scale_factor(400.0, 300.0, 2000.0, 2000.0, 0.5) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_scale_factor_fit() {
        // cs = 1000, vs = 1000, zoom = 1: p1 = 2.804, p2 = 0.41106
        let sf = calc_scale_factor(1200.0, 1000.0, 1000.0, 1000.0, 1.0);
        assert!((sf - 1.0).abs() < 1e-12);
        let sf = calc_scale_factor(1200.0, 1000.0, 1000.0, 1000.0, 8.0);
        let expected = 1000.0 * 2.804 / 8000.0 + 0.41106;
        assert!((sf - expected).abs() < 1e-9);
    }

    #[test]
    fn test_filter_sizes() {
        let min = calc_filter_size(FilterKind::Min, 800.0, 800.0, 500.0, 500.0, 1.0, 1.0);
        let expected = (0.29633 - 2.18448e-4 * 500.0) + 0.24512;
        assert!((min - expected).abs() < 1e-9);

        let shp = calc_filter_size(FilterKind::Sharpen, 1600.0, 800.0, 500.0, 500.0, 100.0, 1.0);
        assert!((shp - 0.25).abs() < 1e-12);

        let max = calc_filter_size(FilterKind::Max, 800.0, 800.0, 1200.0, 1200.0, 0.0, 1.0);
        assert!(max.abs() < 1e-12);
    }

    #[test]
    fn test_hysteresis() {
        let mut state = ScaleFactorState::default();
        assert!(!state.update(0.97));
        assert!(state.update(0.8));
        assert!(!state.update(0.84));
        assert!(state.update(1.0));
        assert!((state.factor() - 1.0).abs() < 1e-12);
        assert!(state.update(0.7));
        assert_eq!(state.target_size(1000, 501), (700, 351));
    }
}
