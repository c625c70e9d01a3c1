use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use people_counter::config::ServiceConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PEOPLE_COUNTER_CONFIG",
        "PEOPLE_COUNTER_ADDR",
        "PEOPLE_COUNTER_SOURCE",
        "PEOPLE_COUNTER_MIN_AREA",
        "PEOPLE_COUNTER_FONT",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "stream": { "addr": "0.0.0.0:8080", "target_fps": 5 },
        "camera": {
            "source": "/var/lib/frames",
            "width": 640,
            "height": 480,
            "hflip": true,
            "loop_playback": false
        },
        "detection": { "min_area": 1200.0, "diff_threshold": 40 },
        "tracking": { "inactivity_timeout_ms": 750, "crossing_margin": 30 },
        "overlay": { "jpeg_quality": 90 }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("PEOPLE_COUNTER_CONFIG", file.path());
    std::env::set_var("PEOPLE_COUNTER_SOURCE", "stub://lobby");
    std::env::set_var("PEOPLE_COUNTER_MIN_AREA", "950");
    std::env::set_var("PEOPLE_COUNTER_FONT", "/opt/fonts/Overlay.ttf");

    let cfg = ServiceConfig::load().expect("load config");

    assert_eq!(cfg.stream_addr, "0.0.0.0:8080");
    assert_eq!(cfg.stream_fps, 5);
    assert_eq!(cfg.camera.source, "stub://lobby");
    assert!(!cfg.camera.loop_playback);
    assert_eq!((cfg.counter.width, cfg.counter.height), (640, 480));
    assert!(cfg.counter.hflip);
    assert!(!cfg.counter.vflip);
    assert_eq!(cfg.counter.min_area, 950.0);
    assert_eq!(cfg.counter.diff_threshold, 40);
    assert_eq!(cfg.counter.dilate_iterations, 2);
    assert_eq!(cfg.counter.inactivity_timeout, Duration::from_millis(750));
    assert_eq!(cfg.counter.center_y(), 240);
    assert_eq!(cfg.counter.crossing_margin(), 30);
    assert_eq!(cfg.overlay.jpeg_quality, 90);
    assert_eq!(
        cfg.overlay.font_path,
        Some(PathBuf::from("/opt/fonts/Overlay.ttf"))
    );

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[stream]
addr = "127.0.0.1:5050"

[camera]
source = "stub://hallway"
vflip = true

[tracking]
max_trajectory = 64
"#;
    file.write_all(toml.as_bytes()).expect("write config");

    let cfg = ServiceConfig::load_from(Some(file.path())).expect("load config");

    assert_eq!(cfg.stream_addr, "127.0.0.1:5050");
    assert_eq!(cfg.camera.source, "stub://hallway");
    assert!(cfg.counter.vflip);
    assert_eq!(cfg.counter.max_trajectory, 64);
    assert_eq!(cfg.counter.width, 800);
    assert_eq!(cfg.counter.height, 608);
    assert_eq!(cfg.counter.crossing_margin(), 60);

    clear_env();
}

#[test]
fn defaults_apply_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ServiceConfig::load().expect("load defaults");
    assert_eq!(cfg.stream_addr, "127.0.0.1:5000");
    assert_eq!(cfg.camera.source, "stub://entrance");
    assert_eq!(cfg.counter.min_area, 800.0);
    assert_eq!(cfg.counter.hard_min_area, 700.0);
    assert_eq!(cfg.counter.diff_threshold, 70);
    assert_eq!(cfg.counter.inactivity_timeout, Duration::from_millis(500));
    assert_eq!(cfg.counter.max_trajectory, 256);
    assert_eq!(cfg.overlay.jpeg_quality, 80);

    clear_env();
}

#[test]
fn rejects_non_numeric_min_area_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PEOPLE_COUNTER_MIN_AREA", "lots");
    let err = ServiceConfig::load().expect_err("invalid override");
    assert!(err.to_string().contains("PEOPLE_COUNTER_MIN_AREA"));

    clear_env();
}

#[test]
fn rejects_invalid_values_from_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "overlay": { "jpeg_quality": 0 } }"#)
        .expect("write config");
    assert!(ServiceConfig::load_from(Some(file.path())).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "tracking": { "inactivity_timeout_ms": 0 } }"#)
        .expect("write config");
    assert!(ServiceConfig::load_from(Some(file.path())).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{ "camera": { "width": 0 } }"#)
        .expect("write config");
    assert!(ServiceConfig::load_from(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(b"{ not json").expect("write config");
    let err = ServiceConfig::load_from(Some(file.path())).expect_err("malformed");
    assert!(err.to_string().contains("invalid config file"));

    clear_env();
}
