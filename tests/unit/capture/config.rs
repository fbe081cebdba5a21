use super::*;
use std::time::Duration;

#[test]
fn defaults_are_valid() {
    let cfg = RecordingConfig::default();
    cfg.validate().unwrap();
    assert_eq!(cfg.rate().unwrap().frame_interval(), Duration::from_secs(1) / 15);
}

#[test]
fn each_bound_is_enforced() {
    let bad = [
        RecordingConfig {
            frame_count: 0,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            frame_count: 201,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            fps: 9,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            fps: 31,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            scale: 0.2,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            scale: f32::NAN,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            colors: 1,
            ..RecordingConfig::default()
        },
        RecordingConfig {
            colors: 257,
            ..RecordingConfig::default()
        },
    ];
    for cfg in bad {
        assert!(
            matches!(cfg.validate(), Err(FramegifError::Validation(_))),
            "{cfg:?}"
        );
    }

    let edges = RecordingConfig {
        frame_count: 200,
        fps: 30,
        scale: 0.25,
        colors: 2,
        loop_count: 3,
    };
    edges.validate().unwrap();
}

#[test]
fn json_fills_missing_fields_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, r#"{ "frame_count": 12, "colors": 32 }"#).unwrap();

    let cfg = RecordingConfig::from_json_path(&path).unwrap();
    assert_eq!(cfg.frame_count, 12);
    assert_eq!(cfg.colors, 32);
    assert_eq!(cfg.fps, RecordingConfig::default().fps);
}

#[test]
fn json_rejects_unknown_fields_and_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{ "frames": 12 }"#).unwrap();
    assert!(matches!(
        RecordingConfig::from_json_path(&path),
        Err(FramegifError::Validation(_))
    ));
    assert!(matches!(
        RecordingConfig::from_json_path(&dir.path().join("missing.json")),
        Err(FramegifError::Other(_))
    ));
}
