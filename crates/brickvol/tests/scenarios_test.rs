//! End-to-end frames through the recording backend.

mod common;

use std::rc::Rc;

use brickvol::*;

#[test]
fn test_single_brick_orthographic_frame() {
    let mut vr = common::renderer(UVec3::splat(8));
    let mut rb = RecordingBackend::default();
    let mut session = StreamingSession::default();
    vr.draw(&mut rb, &mut session, &SystemClock::new(), &common::ortho_frame())
        .unwrap();

    let draws = rb.polygon_draws();
    // dt = 0.025 over a unit-deep box.
    assert!((39..=41).contains(&draws.len()));
    assert!(draws.windows(2).all(|w| w[0].1 > w[1].1));
    // One composite quad onto the frame.
    assert_eq!(rb.count(|c| matches!(c, Command::DrawQuad)), 1);
}

#[test]
fn test_oblique_slices_stay_within_hexagons() {
    let mut vr = common::renderer(UVec3::splat(4));
    let mut rb = RecordingBackend::default();
    let mut session = StreamingSession::default();
    vr.draw(&mut rb, &mut session, &SystemClock::new(), &common::oblique_frame())
        .unwrap();
    assert_eq!(rb.drawn_bricks().len(), 8);
    assert!(rb
        .commands
        .iter()
        .all(|c| !matches!(c, Command::DrawPolygon { vertices, .. } if !(3..=6).contains(vertices))));
}

#[test]
fn test_two_overlapping_volumes_share_time_indices() {
    let a = common::shared(UVec3::splat(8));
    let b = common::shared(UVec3::splat(8));
    b.borrow_mut().params.colormap_mode = ColormapMode::Rainbow;
    let mut mvr = MultiVolumeRenderer::new();
    mvr.set_sampling_rate(0.1);
    mvr.add_vr(Rc::clone(&a));
    mvr.add_vr(Rc::clone(&b));

    let mut rb = RecordingBackend::default();
    let mut session = StreamingSession::default();
    mvr.draw(&mut rb, &mut session, &SystemClock::new(), &common::ortho_frame())
        .unwrap();

    let ra = a.borrow().texture().unwrap().brick_ref(0);
    let rbk = b.borrow().texture().unwrap().brick_ref(0);
    let draws = rb.polygon_draws();
    let from_a: Vec<f64> = draws.iter().filter(|d| d.0 == Some(ra)).map(|d| d.1).collect();
    let from_b: Vec<f64> = draws.iter().filter(|d| d.0 == Some(rbk)).map(|d| d.1).collect();
    assert!(!from_a.is_empty());
    assert_eq!(from_a, from_b);
    // Different colormaps land in different shader buckets.
    assert!(rb.count(|c| matches!(c, Command::BindShader(_))) >= draws.len());
}

#[test]
fn test_clip_plane_excludes_brick_from_both_renderers() {
    let mut planes = ClipPlanes::default();
    planes.set(5, Plane::new(0.0, 0.0, -1.0, 0.4));

    let mut vr = common::renderer(UVec3::new(8, 8, 4));
    vr.set_planes(planes);
    let upper = vr.texture().unwrap().brick_ref(1);
    let mut rb = RecordingBackend::default();
    let mut session = StreamingSession::default();
    vr.draw(&mut rb, &mut session, &SystemClock::new(), &common::ortho_frame())
        .unwrap();
    assert!(!rb.drawn_bricks().contains(&upper));
    assert_eq!(rb.drawn_bricks().len(), 1);

    let shared = common::shared(UVec3::new(8, 8, 4));
    shared.borrow_mut().set_planes(planes);
    let upper = shared.borrow().texture().unwrap().brick_ref(1);
    let mut mvr = MultiVolumeRenderer::new();
    mvr.set_sampling_rate(0.1);
    mvr.add_vr(Rc::clone(&shared));
    let mut rb = RecordingBackend::default();
    mvr.draw(&mut rb, &mut session, &SystemClock::new(), &common::ortho_frame())
        .unwrap();
    assert!(!rb.drawn_bricks().contains(&upper));
    assert_eq!(rb.drawn_bricks().len(), 1);
}

#[test]
fn test_missing_shader_is_reported_before_drawing() {
    let shared = common::shared(UVec3::splat(8));
    let mut mvr = MultiVolumeRenderer::new();
    mvr.add_vr(shared);
    let mut rb = RecordingBackend::default();
    rb.shaders_unavailable = true;
    let mut session = StreamingSession::default();
    let result = mvr.draw(&mut rb, &mut session, &SystemClock::new(), &common::ortho_frame());
    assert!(matches!(result, Err(RenderError::ShaderUnavailable(_))));
    assert!(rb.polygon_draws().is_empty());
}

#[test]
fn test_empty_multi_renderer_is_a_noop() {
    let mut mvr = MultiVolumeRenderer::new();
    let mut rb = RecordingBackend::default();
    let mut session = StreamingSession::default();
    mvr.draw(&mut rb, &mut session, &SystemClock::new(), &common::ortho_frame())
        .unwrap();
    assert!(rb.commands.is_empty());
}
