//! HSV helpers and mask color derivation.

use glam::Vec3;

/// A color in hue (degrees), saturation, value form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: f32,
    pub sat: f32,
    pub val: f32,
}

impl Hsv {
    pub fn new(hue: f32, sat: f32, val: f32) -> Self {
        Self { hue, sat, val }
    }

    /// Converts an RGB color in `[0,1]^3`.
    pub fn from_rgb(rgb: Vec3) -> Self {
        let max = rgb.max_element();
        let min = rgb.min_element();
        let delta = max - min;

        let sat = if max > 0.0 { delta / max } else { 0.0 };
        let hue = if delta <= f32::EPSILON {
            0.0
        } else if (max - rgb.x).abs() <= f32::EPSILON {
            60.0 * ((rgb.y - rgb.z) / delta)
        } else if (max - rgb.y).abs() <= f32::EPSILON {
            60.0 * ((rgb.z - rgb.x) / delta + 2.0)
        } else {
            60.0 * ((rgb.x - rgb.y) / delta + 4.0)
        };

        Self {
            hue: hue.rem_euclid(360.0),
            sat,
            val: max,
        }
    }

    pub fn to_rgb(self) -> Vec3 {
        let h = self.hue.rem_euclid(360.0) / 60.0;
        let c = self.val * self.sat;
        let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
        let m = self.val - c;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        Vec3::new(r + m, g + m, b + m)
    }
}

/// Derives a mask color that stands out against `color`.
///
/// Unsaturated colors get green; otherwise the hue is rotated to a contrasting one at
/// full saturation and value.
pub fn mask_color_for(color: Vec3) -> Vec3 {
    let hsv = Hsv::from_rgb(color);
    if hsv.sat < 0.2 {
        return Vec3::new(0.0, 1.0, 0.0);
    }
    let h0 = hsv.hue;
    let h = if h0 < 30.0 {
        h0 - 180.0
    } else if h0 < 90.0 {
        h0 + 120.0
    } else if h0 < 210.0 {
        h0 - 120.0
    } else {
        h0 - 180.0
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    Hsv::new(h, 1.0, 1.0).to_rgb()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_hsv_round_trip_primaries() {
        for c in [Vec3::X, Vec3::Y, Vec3::Z, Vec3::new(1.0, 1.0, 0.0)] {
            assert!(close(Hsv::from_rgb(c).to_rgb(), c));
        }
    }

    #[test]
    fn test_mask_color_gray_is_green() {
        assert_eq!(mask_color_for(Vec3::splat(0.7)), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_mask_color_red_is_cyan() {
        // hue 0 -> -180 -> 180
        assert!(close(mask_color_for(Vec3::X), Vec3::new(0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_mask_color_green_is_red() {
        // hue 120 -> 0
        assert!(close(mask_color_for(Vec3::Y), Vec3::X));
    }
}
