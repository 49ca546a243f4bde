//! Integration tests for configuration loading

use kiosk_poc::domain::types::{AcceptanceRegion, DedupPolicy};
use kiosk_poc::infra::Config;
use kiosk_poc::io::camera::FacingMode;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[site]
id = "popup-store"

[api]
base_url = "http://10.0.0.5:9000"
timeout_ms = 2500
probe_on_not_found = false

[camera]
width_ideal = 1280
height_ideal = 720
facing = "user"

[decoder]
readers = ["ean_13"]
diagnostics = true

[scanner]
dedup = "window"
dedup_window_ms = 2000
acceptance = "center_band"
center_band_fraction = 0.4

[metrics]
interval_secs = 30

[sim]
codes = ["4912345678904"]
repeats_per_code = 1
detect_interval_ms = 50
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "popup-store");
    assert_eq!(config.api_base_url(), "http://10.0.0.5:9000");
    assert_eq!(config.api_timeout_ms(), 2500);
    assert!(!config.api_probe_on_not_found());
    assert_eq!(config.stream_constraints().width_ideal, 1280);
    assert_eq!(config.stream_constraints().facing, FacingMode::User);
    assert_eq!(config.engine_config().readers, vec!["ean_13".to_string()]);
    assert!(config.engine_config().diagnostics);
    assert_eq!(config.dedup_policy(), DedupPolicy::Window(Duration::from_millis(2000)));
    assert_eq!(config.acceptance_region(), AcceptanceRegion::CenterBand(0.4));
    assert_eq!(config.metrics_interval_secs(), 30);
    assert_eq!(config.sim().codes, vec!["4912345678904".to_string()]);
}

#[test]
fn test_partial_config_uses_section_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            br#"
[api]
base_url = "http://localhost:9999"
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.api_base_url(), "http://localhost:9999");
    assert_eq!(config.api_timeout_ms(), 5000);
    assert_eq!(config.site_id(), "kiosk");
    assert_eq!(config.dedup_policy(), DedupPolicy::LastCode);
    assert_eq!(config.acceptance_region(), AcceptanceRegion::Full);
}

#[test]
fn test_invalid_facing_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            br#"
[camera]
facing = "sideways"
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.api_base_url(), "http://localhost:8800");
    assert_eq!(config.site_id(), "kiosk");
}
