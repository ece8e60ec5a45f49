//! Configuration loading and application.

use brickvol::*;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("brickvol-{}-{name}.json", std::process::id()))
}

#[test]
fn test_options_save_and_load() {
    let options = RenderOptions {
        sampling_rate: 2.0,
        mem_swap: true,
        up_time_ms: 40,
        update_order: UpdateOrder::FrontToBack,
        ..Default::default()
    };
    let path = temp_path("roundtrip");
    options.save(&path).unwrap();
    let loaded = RenderOptions::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(loaded, options);
}

#[test]
fn test_partial_file_takes_defaults() {
    let path = temp_path("partial");
    std::fs::write(&path, serde_json::json!({ "render_mode": "Mip" }).to_string()).unwrap();
    let loaded = RenderOptions::load(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    assert_eq!(loaded.render_mode, RenderMode::Mip);
    assert_eq!(loaded.sampling_rate, RenderOptions::default().sampling_rate);
}

#[test]
fn test_invalid_rate_is_rejected() {
    let path = temp_path("invalid");
    std::fs::write(&path, r#"{ "sampling_rate": 0.0 }"#).unwrap();
    let result = RenderOptions::load(&path);
    let _ = std::fs::remove_file(&path);
    assert!(matches!(result, Err(BrickvolError::InvalidConfig(_))));
}

#[test]
fn test_options_reach_renderer_and_session() {
    let options = RenderOptions {
        sampling_rate: 3.0,
        quota_bricks: 5,
        mem_swap: true,
        up_time_ms: 80,
        ..Default::default()
    };
    let mut vr = VolumeRenderer::empty();
    vr.apply_options(&options);
    assert_eq!(vr.quota_bricks(), 5);
    assert!((vr.params.sampling_rate() - 3.0).abs() < 1e-12);

    let session = StreamingSession::from_options(&options);
    assert!(session.mem_swap);
    assert_eq!(session.up_time, 80);
}

#[test]
fn test_init_is_idempotent() {
    init();
    init();
}
