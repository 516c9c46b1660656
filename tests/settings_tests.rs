//! Settings Serialization Tests
//!
//! Tests for:
//! - BlurSettings JSON round trip
//! - Out-of-range values are clamped on load
//! - Missing fields fall back to defaults

use static_blur::settings::{MAX_BLUR, MAX_ITERATIONS};
use static_blur::{BlurMode, BlurSettings, DesamplingRate, TextureFilter};

#[test]
fn json_round_trip() {
    let mut settings = BlurSettings::default();
    settings.set_blur(0.5);
    settings.set_blur_mode(BlurMode::Detail);
    settings.set_desampling_rate(DesamplingRate::X4);
    settings.set_filter_mode(TextureFilter::Nearest);
    settings.set_iterations(3);

    let json = serde_json::to_string(&settings).unwrap();
    let restored: BlurSettings = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, settings);
}

#[test]
fn out_of_range_values_are_clamped_on_load() {
    let json = r#"{ "blur": 4.0, "iterations": 64 }"#;
    let settings: BlurSettings = serde_json::from_str(json).unwrap();

    assert!((settings.blur() - MAX_BLUR).abs() < f32::EPSILON);
    assert_eq!(settings.iterations(), MAX_ITERATIONS);
}

#[test]
fn missing_fields_use_defaults() {
    let settings: BlurSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(settings, BlurSettings::default());
    assert_eq!(settings.desampling_rate(), DesamplingRate::X2);
    assert!(settings.keep_canvas_size());
}
