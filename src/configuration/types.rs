use serde::{Deserialize, Serialize};

/// A named browser window size applied before every capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportConfig {
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_scale_factor")]
    pub device_scale_factor: f64,
}

fn default_scale_factor() -> f64 {
    1.0
}

/// A theme the preview server can switch to via its global theme toggle.
///
/// `global_value` is what gets encoded into the story URL;
/// `expected_background` is the computed body background the capture
/// engine polls for as evidence the theme has visually applied. A theme
/// without one skips the poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeConfig {
    pub name: String,
    pub global_value: String,
    #[serde(default)]
    pub expected_background: Option<String>,
}

/// Diffing thresholds used by the auto-approve predicate. All in 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffThresholds {
    pub pixel: f64,
    pub layout: f64,
    pub color: f64,
    pub auto_approve_confidence: f64,
}

impl Default for DiffThresholds {
    fn default() -> Self {
        Self {
            pixel: 0.1,
            layout: 0.05,
            color: 0.15,
            auto_approve_confidence: 0.8,
        }
    }
}

/// Bounded waits and retry budget for the capture engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_secs: u64,
    pub selector_secs: u64,
    pub theme_poll_attempts: u32,
    pub theme_poll_interval_ms: u64,
    pub stabilization_ms: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub server_startup_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_secs: 30,
            selector_secs: 10,
            theme_poll_attempts: 10,
            theme_poll_interval_ms: 200,
            stabilization_ms: 1500,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            server_startup_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_defaults_in_unit_range() {
        let t = DiffThresholds::default();
        for v in [t.pixel, t.layout, t.color, t.auto_approve_confidence] {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_viewport_scale_defaults_when_omitted() {
        let v: ViewportConfig =
            toml::from_str("name = \"desktop\"\nwidth = 1920\nheight = 1080\n").unwrap();
        assert_eq!(v.device_scale_factor, 1.0);
    }
}
