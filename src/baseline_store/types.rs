use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle bucket an artifact currently lives in.
///
/// An artifact exists in at most one bucket at a time; movement between
/// buckets is a move, not a copy-and-keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    Approved,
    Pending,
    Rejected,
    Archive,
}

impl ArtifactStatus {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactStatus::Approved => "approved",
            ArtifactStatus::Pending => "pending",
            ArtifactStatus::Rejected => "rejected",
            ArtifactStatus::Archive => "archive",
        }
    }

    pub fn all() -> [ArtifactStatus; 4] {
        [
            ArtifactStatus::Approved,
            ArtifactStatus::Pending,
            ArtifactStatus::Rejected,
            ArtifactStatus::Archive,
        ]
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// Replaces anything outside `[A-Za-z0-9-_]` so story ids are safe filenames.
pub fn sanitize_story_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Identity of one logical artifact slot: the capture matrix tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey {
    pub story_id: String,
    pub browser: String,
    pub viewport: String,
    pub theme: String,
}

impl ArtifactKey {
    pub fn new(story_id: &str, browser: &str, viewport: &str, theme: &str) -> Self {
        Self {
            story_id: story_id.to_string(),
            browser: browser.to_string(),
            viewport: viewport.to_string(),
            theme: theme.to_string(),
        }
    }

    /// Metadata index key: `{story}-{browser}-{viewport}-{theme}`.
    pub fn index_key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.story_id, self.browser, self.viewport, self.theme
        )
    }

    /// File path inside a bucket:
    /// `{theme}/{browser}/{viewport}/{sanitized_story}.png`.
    pub fn bucket_relative(&self) -> PathBuf {
        PathBuf::from(&self.theme)
            .join(&self.browser)
            .join(&self.viewport)
            .join(format!("{}.png", sanitize_story_id(&self.story_id)))
    }

    /// Bucket-relative file path:
    /// `{status}/{theme}/{browser}/{viewport}/{sanitized_story}.png`.
    pub fn relative_path(&self, status: ArtifactStatus) -> PathBuf {
        PathBuf::from(status.dir_name()).join(self.bucket_relative())
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.story_id, self.browser, self.viewport, self.theme
        )
    }
}

/// Persisted metadata record for one captured image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub story_id: String,
    pub browser: String,
    pub viewport: String,
    pub theme: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    pub hash: String,
    pub status: ArtifactStatus,
}

impl ArtifactRecord {
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey::new(&self.story_id, &self.browser, &self.viewport, &self.theme)
    }
}

/// Outcome of comparing two captured images. All metrics in 0..=1.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffResult {
    pub identical: bool,
    /// Fraction of pixels differing beyond the anti-aliasing tolerance.
    pub pixel_diff: f64,
    /// Relative dimension mismatch between the two images.
    pub layout_shift: f64,
    /// Mean absolute per-channel delta over the overlapping region.
    pub color_variance: f64,
    /// How confident the diff is that the images show the same thing.
    pub confidence: f64,
}

impl DiffResult {
    pub fn identical() -> Self {
        Self {
            identical: true,
            pixel_diff: 0.0,
            layout_shift: 0.0,
            color_variance: 0.0,
            confidence: 1.0,
        }
    }

    /// Worst-case result used when images cannot be decoded; never
    /// auto-approvable.
    pub fn unreadable() -> Self {
        Self {
            identical: false,
            pixel_diff: 1.0,
            layout_shift: 1.0,
            color_variance: 1.0,
            confidence: 0.0,
        }
    }
}

/// One exhausted capture combination, aggregated for the end-of-run summary.
#[derive(Debug, Clone)]
pub struct CaptureFailure {
    pub story_id: String,
    pub browser: String,
    pub viewport: String,
    pub theme: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_story_id() {
        assert_eq!(
            sanitize_story_id("components/button--primary!"),
            "components_button--primary_"
        );
        assert_eq!(sanitize_story_id("chip--default"), "chip--default");
    }

    #[test]
    fn test_index_key_format() {
        let key = ArtifactKey::new("button--primary", "chromium", "desktop", "dark");
        assert_eq!(key.index_key(), "button--primary-chromium-desktop-dark");
    }

    #[test]
    fn test_relative_path_layout() {
        let key = ArtifactKey::new("a/b", "chromium", "mobile", "light");
        assert_eq!(
            key.relative_path(ArtifactStatus::Pending),
            PathBuf::from("pending/light/chromium/mobile/a_b.png")
        );
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&ArtifactStatus::Approved).unwrap();
        assert_eq!(json, "\"approved\"");
    }
}
