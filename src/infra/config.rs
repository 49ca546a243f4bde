//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! A missing or unparsable file falls back to built-in defaults with a
//! warning, so the kiosk always comes up.

use crate::domain::types::{AcceptanceRegion, DedupPolicy};
use crate::io::camera::{FacingMode, StreamConstraints};
use crate::io::decoder::EngineConfig;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupMode {
    LastCode,
    Window,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptanceMode {
    Full,
    CenterBand,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "kiosk".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
    /// Probe the backend's /test-db endpoint after a 404 lookup.
    #[serde(default = "default_probe_on_not_found")]
    pub probe_on_not_found: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            timeout_ms: default_api_timeout_ms(),
            probe_on_not_found: default_probe_on_not_found(),
        }
    }
}

fn default_api_base_url() -> String {
    "http://localhost:8800".to_string()
}

fn default_api_timeout_ms() -> u64 {
    5000
}

fn default_probe_on_not_found() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_width_ideal")]
    pub width_ideal: u32,
    #[serde(default = "default_height_ideal")]
    pub height_ideal: u32,
    #[serde(default = "default_facing")]
    pub facing: String,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width_ideal: default_width_ideal(),
            height_ideal: default_height_ideal(),
            facing: default_facing(),
        }
    }
}

fn default_width_ideal() -> u32 {
    640
}

fn default_height_ideal() -> u32 {
    480
}

fn default_facing() -> String {
    "environment".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct DecoderConfig {
    #[serde(default = "default_readers")]
    pub readers: Vec<String>,
    #[serde(default)]
    pub diagnostics: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self { readers: default_readers(), diagnostics: false }
    }
}

fn default_readers() -> Vec<String> {
    vec!["ean_13".to_string(), "ean_8".to_string()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_dedup_mode")]
    pub dedup: DedupMode,
    /// Only used with dedup = "window".
    #[serde(default = "default_dedup_window_ms")]
    pub dedup_window_ms: u64,
    #[serde(default = "default_acceptance_mode")]
    pub acceptance: AcceptanceMode,
    /// Only used with acceptance = "center_band".
    #[serde(default = "default_center_band_fraction")]
    pub center_band_fraction: f64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            dedup: default_dedup_mode(),
            dedup_window_ms: default_dedup_window_ms(),
            acceptance: default_acceptance_mode(),
            center_band_fraction: default_center_band_fraction(),
        }
    }
}

fn default_dedup_mode() -> DedupMode {
    DedupMode::LastCode
}

fn default_dedup_window_ms() -> u64 {
    1500
}

fn default_acceptance_mode() -> AcceptanceMode {
    AcceptanceMode::Full
}

fn default_center_band_fraction() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs() }
    }
}

fn default_metrics_interval_secs() -> u64 {
    10
}

/// Scripted devices for the headless kiosk binary.
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    #[serde(default = "default_sim_codes")]
    pub codes: Vec<String>,
    #[serde(default = "default_sim_repeats")]
    pub repeats_per_code: u32,
    #[serde(default = "default_sim_interval_ms")]
    pub detect_interval_ms: u64,
    #[serde(default = "default_sim_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    #[serde(default)]
    pub camera_denied: bool,
    #[serde(default)]
    pub playback_blocked: bool,
    #[serde(default)]
    pub engine_rejected: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            codes: default_sim_codes(),
            repeats_per_code: default_sim_repeats(),
            detect_interval_ms: default_sim_interval_ms(),
            scan_timeout_ms: default_sim_scan_timeout_ms(),
            camera_denied: false,
            playback_blocked: false,
            engine_rejected: false,
        }
    }
}

fn default_sim_codes() -> Vec<String> {
    vec![
        "4912345678904".to_string(),
        "4901234567894".to_string(),
        "4909876543210".to_string(),
    ]
}

fn default_sim_repeats() -> u32 {
    3
}

fn default_sim_interval_ms() -> u64 {
    400
}

fn default_sim_scan_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    api_base_url: String,
    api_timeout_ms: u64,
    api_probe_on_not_found: bool,
    camera_width_ideal: u32,
    camera_height_ideal: u32,
    camera_facing: FacingMode,
    decoder_readers: Vec<String>,
    decoder_diagnostics: bool,
    dedup_mode: DedupMode,
    dedup_window_ms: u64,
    acceptance_mode: AcceptanceMode,
    center_band_fraction: f64,
    metrics_interval_secs: u64,
    sim: SimConfig,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_id: default_site_id(),
            api_base_url: default_api_base_url(),
            api_timeout_ms: default_api_timeout_ms(),
            api_probe_on_not_found: true,
            camera_width_ideal: default_width_ideal(),
            camera_height_ideal: default_height_ideal(),
            camera_facing: FacingMode::Environment,
            decoder_readers: default_readers(),
            decoder_diagnostics: false,
            dedup_mode: DedupMode::LastCode,
            dedup_window_ms: default_dedup_window_ms(),
            acceptance_mode: AcceptanceMode::Full,
            center_band_fraction: default_center_band_fraction(),
            metrics_interval_secs: default_metrics_interval_secs(),
            sim: SimConfig::default(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let facing = toml_config
            .camera
            .facing
            .parse::<FacingMode>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid camera.facing in {}", path.display()))?;

        Ok(Self {
            site_id: toml_config.site.id,
            api_base_url: toml_config.api.base_url,
            api_timeout_ms: toml_config.api.timeout_ms,
            api_probe_on_not_found: toml_config.api.probe_on_not_found,
            camera_width_ideal: toml_config.camera.width_ideal,
            camera_height_ideal: toml_config.camera.height_ideal,
            camera_facing: facing,
            decoder_readers: toml_config.decoder.readers,
            decoder_diagnostics: toml_config.decoder.diagnostics,
            dedup_mode: toml_config.scanner.dedup,
            dedup_window_ms: toml_config.scanner.dedup_window_ms,
            acceptance_mode: toml_config.scanner.acceptance,
            center_band_fraction: toml_config.scanner.center_band_fraction,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            sim: toml_config.sim,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout_ms(&self) -> u64 {
        self.api_timeout_ms
    }

    pub fn api_probe_on_not_found(&self) -> bool {
        self.api_probe_on_not_found
    }

    pub fn stream_constraints(&self) -> StreamConstraints {
        StreamConstraints {
            width_ideal: self.camera_width_ideal,
            height_ideal: self.camera_height_ideal,
            facing: self.camera_facing,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            readers: self.decoder_readers.clone(),
            diagnostics: self.decoder_diagnostics,
        }
    }

    pub fn dedup_policy(&self) -> DedupPolicy {
        match self.dedup_mode {
            DedupMode::LastCode => DedupPolicy::LastCode,
            DedupMode::Window => {
                DedupPolicy::Window(Duration::from_millis(self.dedup_window_ms))
            }
        }
    }

    pub fn acceptance_region(&self) -> AcceptanceRegion {
        match self.acceptance_mode {
            AcceptanceMode::Full => AcceptanceRegion::Full,
            AcceptanceMode::CenterBand => {
                AcceptanceRegion::CenterBand(self.center_band_fraction.clamp(0.0, 1.0))
            }
        }
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn sim(&self) -> &SimConfig {
        &self.sim
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to select the dedup policy
    #[cfg(test)]
    pub fn with_dedup_mode(mut self, mode: DedupMode, window_ms: u64) -> Self {
        self.dedup_mode = mode;
        self.dedup_window_ms = window_ms;
        self
    }

    /// Builder method for tests to select the acceptance region
    #[cfg(test)]
    pub fn with_acceptance_mode(mut self, mode: AcceptanceMode, fraction: f64) -> Self {
        self.acceptance_mode = mode;
        self.center_band_fraction = fraction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.site_id(), "kiosk");
        assert_eq!(config.api_base_url(), "http://localhost:8800");
        assert_eq!(config.api_timeout_ms(), 5000);
        assert_eq!(config.metrics_interval_secs(), 10);
        assert_eq!(config.dedup_policy(), DedupPolicy::LastCode);
        assert_eq!(config.acceptance_region(), AcceptanceRegion::Full);
    }

    #[test]
    fn test_default_stream_constraints() {
        let constraints = Config::default().stream_constraints();
        assert_eq!(constraints.width_ideal, 640);
        assert_eq!(constraints.height_ideal, 480);
        assert_eq!(constraints.facing, FacingMode::Environment);
    }

    #[test]
    fn test_dedup_window_policy() {
        let config = Config::default().with_dedup_mode(DedupMode::Window, 2500);
        assert_eq!(config.dedup_policy(), DedupPolicy::Window(Duration::from_millis(2500)));
    }

    #[test]
    fn test_center_band_fraction_clamped() {
        let config = Config::default().with_acceptance_mode(AcceptanceMode::CenterBand, 1.7);
        assert_eq!(config.acceptance_region(), AcceptanceRegion::CenterBand(1.0));
    }

    #[test]
    fn test_resolve_config_path_default() {
        let args: Vec<String> = vec!["kiosk-poc".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/dev.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        let args: Vec<String> = vec![
            "kiosk-poc".to_string(),
            "--config".to_string(),
            "config/store.toml".to_string(),
        ];
        assert_eq!(Config::resolve_config_path(&args), "config/store.toml");
    }

    #[test]
    fn test_resolve_config_path_from_arg_equals() {
        let args: Vec<String> =
            vec!["kiosk-poc".to_string(), "--config=config/store.toml".to_string()];
        assert_eq!(Config::resolve_config_path(&args), "config/store.toml");
    }
}
