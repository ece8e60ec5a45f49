//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use brickvol::{
    DMat4, DVec3, FrameParams, SharedVolume, UVec3, ViewState, Viewport, VolumeRenderer,
    VolumeTexture,
};

/// Orthographic camera on the +z axis looking at the unit cube.
pub fn ortho_frame() -> FrameParams {
    FrameParams {
        view: ViewState {
            modelview: DMat4::from_translation(DVec3::new(-0.5, -0.5, -3.0)),
            projection: DMat4::orthographic_rh_gl(-1.0, 1.0, -1.0, 1.0, 0.1, 10.0),
            orthographic: true,
            viewport: Viewport::sized(100, 100),
        },
        ..Default::default()
    }
}

/// Perspective camera looking at the cube from an oblique direction.
pub fn oblique_frame() -> FrameParams {
    let eye = DVec3::new(2.5, 1.8, 3.2);
    FrameParams {
        view: ViewState {
            modelview: DMat4::look_at_rh(eye, DVec3::splat(0.5), DVec3::Y),
            projection: DMat4::perspective_rh_gl(0.8, 1.0, 0.1, 20.0),
            orthographic: false,
            viewport: Viewport::sized(100, 100),
        },
        ..Default::default()
    }
}

/// An 8^3 volume split into bricks of `brick_dims`, sampled coarsely.
pub fn renderer(brick_dims: UVec3) -> VolumeRenderer {
    let mut vr = VolumeRenderer::new(VolumeTexture::from_grid(UVec3::splat(8), brick_dims));
    vr.params.set_sampling_rate(0.1);
    vr
}

pub fn shared(brick_dims: UVec3) -> SharedVolume {
    Rc::new(RefCell::new(renderer(brick_dims)))
}
