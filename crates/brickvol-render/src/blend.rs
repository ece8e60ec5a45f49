//! Blend equations for accumulating slices.
//!
//! Back-to-front compositing uses "over" (`src + dst * (1 - src.a)`), front-to-back
//! uses "under" (`src * (1 - dst.a) + dst`), and maximum-intensity projection keeps the
//! per-channel maximum.

use brickvol_core::{RenderMode, UpdateOrder};

const OVER: wgpu::BlendComponent = wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::One,
    dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
    operation: wgpu::BlendOperation::Add,
};

const UNDER: wgpu::BlendComponent = wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::OneMinusDstAlpha,
    dst_factor: wgpu::BlendFactor::One,
    operation: wgpu::BlendOperation::Add,
};

const MAX: wgpu::BlendComponent = wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::One,
    dst_factor: wgpu::BlendFactor::One,
    operation: wgpu::BlendOperation::Max,
};

const ADD: wgpu::BlendComponent = wgpu::BlendComponent {
    src_factor: wgpu::BlendFactor::One,
    dst_factor: wgpu::BlendFactor::One,
    operation: wgpu::BlendOperation::Add,
};

/// Blend state for drawing slices into the accumulation target.
pub fn accumulate(mode: RenderMode, order: UpdateOrder) -> wgpu::BlendState {
    let component = match (mode, order) {
        (RenderMode::Mip, _) => MAX,
        (RenderMode::Over, UpdateOrder::BackToFront) => OVER,
        (RenderMode::Over, UpdateOrder::FrontToBack) => UNDER,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

/// Additive blending used to gather all volumes of one time index.
pub fn additive() -> wgpu::BlendState {
    wgpu::BlendState {
        color: ADD,
        alpha: ADD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_front_is_over() {
        let b = accumulate(RenderMode::Over, UpdateOrder::BackToFront);
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::One);
        assert_eq!(b.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
        assert_eq!(b.color.operation, wgpu::BlendOperation::Add);
    }

    #[test]
    fn test_front_to_back_is_under() {
        let b = accumulate(RenderMode::Over, UpdateOrder::FrontToBack);
        assert_eq!(b.color.src_factor, wgpu::BlendFactor::OneMinusDstAlpha);
        assert_eq!(b.color.dst_factor, wgpu::BlendFactor::One);
    }

    #[test]
    fn test_mip_ignores_order() {
        for order in [UpdateOrder::BackToFront, UpdateOrder::FrontToBack] {
            let b = accumulate(RenderMode::Mip, order);
            assert_eq!(b.color.operation, wgpu::BlendOperation::Max);
            assert_eq!(b.alpha, b.color);
        }
    }
}
