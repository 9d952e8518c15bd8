use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::types::{DiffThresholds, ThemeConfig, TimeoutConfig, ViewportConfig};
use crate::error_handling::types::ConfigError;

/// Default preview server base URL; `STORYBOOK_URL` overrides it at the CLI.
pub const DEFAULT_STORYBOOK_URL: &str = "http://localhost:6006";

/// Runtime configuration for a baseline run.
///
/// Holds the immutable capture matrix (browsers x themes x viewports),
/// the diffing thresholds, the capture timeouts, and the directory
/// layout roots. Loaded from an optional TOML file with compiled-in
/// defaults; every field may be omitted in the file.
///
/// Directory layout derived from here:
/// `{baseline_dir}/{status}/{theme}/{browser}/{viewport}/{sanitized_story}.png`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the running preview server.
    pub storybook_url: String,

    /// Root directory owning every status bucket and the metadata index.
    pub baseline_dir: PathBuf,

    /// Component source root scanned when the preview server is unreachable.
    pub story_source_root: PathBuf,

    /// Browser engines to capture with, in capture order.
    pub browsers: Vec<String>,

    /// Themes to capture under, in capture order.
    pub themes: Vec<ThemeConfig>,

    /// Viewports to capture at, in capture order.
    pub viewports: Vec<ViewportConfig>,

    pub thresholds: DiffThresholds,
    pub timeouts: TimeoutConfig,

    /// Rejected artifacts older than this move to the archive bucket on cleanup.
    pub archive_after_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storybook_url: DEFAULT_STORYBOOK_URL.to_string(),
            baseline_dir: PathBuf::from("visual-baselines"),
            story_source_root: PathBuf::from("src"),
            browsers: vec!["chromium".to_string()],
            themes: vec![
                ThemeConfig {
                    name: "light".to_string(),
                    global_value: "light".to_string(),
                    expected_background: Some("rgb(255, 255, 255)".to_string()),
                },
                ThemeConfig {
                    name: "dark".to_string(),
                    global_value: "dark".to_string(),
                    expected_background: Some("rgb(18, 18, 18)".to_string()),
                },
            ],
            viewports: vec![
                ViewportConfig {
                    name: "desktop".to_string(),
                    width: 1920,
                    height: 1080,
                    device_scale_factor: 1.0,
                },
                ViewportConfig {
                    name: "tablet".to_string(),
                    width: 768,
                    height: 1024,
                    device_scale_factor: 2.0,
                },
                ViewportConfig {
                    name: "mobile".to_string(),
                    width: 375,
                    height: 667,
                    device_scale_factor: 2.0,
                },
            ],
            thresholds: DiffThresholds::default(),
            timeouts: TimeoutConfig::default(),
            archive_after_days: 7,
        }
    }
}

impl Config {
    /// Loads and validates a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Checks the matrix is non-empty and thresholds/viewports are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.browsers.is_empty() {
            return Err(ConfigError::EmptyMatrix("no browsers configured".into()));
        }
        if self.themes.is_empty() {
            return Err(ConfigError::EmptyMatrix("no themes configured".into()));
        }
        if self.viewports.is_empty() {
            return Err(ConfigError::EmptyMatrix("no viewports configured".into()));
        }
        let t = &self.thresholds;
        for (name, value) in [
            ("pixel", t.pixel),
            ("layout", t.layout),
            ("color", t.color),
            ("auto_approve_confidence", t.auto_approve_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::BadThreshold(format!("{}: {}", name, value)));
            }
        }
        for v in &self.viewports {
            if v.width == 0 || v.height == 0 {
                return Err(ConfigError::BadViewport(format!(
                    "{}: {}x{}",
                    v.name, v.width, v.height
                )));
            }
            if v.device_scale_factor <= 0.0 {
                return Err(ConfigError::BadViewport(format!(
                    "{}: scale factor {}",
                    v.name, v.device_scale_factor
                )));
            }
        }
        if !self.storybook_url.starts_with("http://") && !self.storybook_url.starts_with("https://")
        {
            return Err(ConfigError::BadUrl(self.storybook_url.clone()));
        }
        debug!(
            "Configuration valid: {} browser(s) x {} theme(s) x {} viewport(s)",
            self.browsers.len(),
            self.themes.len(),
            self.viewports.len()
        );
        Ok(())
    }
}
