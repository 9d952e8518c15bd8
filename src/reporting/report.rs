use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline_store::types::{ArtifactStatus, CaptureFailure};

/// Coverage summary nested in the analysis report JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub percentage: u32,
}

/// Persisted output of the analyze operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub total_stories: usize,
    pub covered_stories: usize,
    pub coverage: CoverageSummary,
    pub uncovered_stories: Vec<String>,
}

impl AnalysisReport {
    pub fn build(total_stories: usize, mut uncovered_stories: Vec<String>) -> Self {
        uncovered_stories.sort();
        let covered_stories = total_stories.saturating_sub(uncovered_stories.len());
        Self {
            generated_at: Utc::now(),
            total_stories,
            covered_stories,
            coverage: CoverageSummary {
                percentage: coverage_percentage(total_stories, covered_stories),
            },
            uncovered_stories,
        }
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Baseline coverage: {}/{} story(ies) ({}%)\n",
            self.covered_stories, self.total_stories, self.coverage.percentage
        );
        for story in &self.uncovered_stories {
            out.push_str(&format!("  uncovered: {}\n", story));
        }
        out
    }
}

/// `round(100 * covered / total)`; zero stories means zero coverage.
pub fn coverage_percentage(total: usize, covered: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * covered as f64 / total as f64).round() as u32
}

/// Human-readable per-bucket totals for the status report.
pub fn render_status(counts: &[(ArtifactStatus, usize)]) -> String {
    let mut out = String::from("Baseline status:\n");
    for (status, count) in counts {
        out.push_str(&format!("  {:>8}: {} file(s)\n", status.dir_name(), count));
    }
    out
}

/// End-of-run failure summary. With `skip_failures` only the total is
/// shown; otherwise every failed combination is enumerated.
pub fn render_failures(failures: &[CaptureFailure], skip_failures: bool) -> String {
    if failures.is_empty() {
        return String::from("All captures succeeded\n");
    }
    let mut out = format!("{} capture(s) failed\n", failures.len());
    if !skip_failures {
        for f in failures {
            out.push_str(&format!(
                "  {} ({}, {}, {}): {}\n",
                f.story_id, f.browser, f.viewport, f.theme, f.reason
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_percentage_rounds() {
        assert_eq!(coverage_percentage(10, 7), 70);
        assert_eq!(coverage_percentage(3, 2), 67);
        assert_eq!(coverage_percentage(0, 0), 0);
    }

    #[test]
    fn test_report_coverage_with_uncovered_stories() {
        // 10 total stories, 3 with zero approved artifacts
        let report = AnalysisReport::build(
            10,
            vec!["a--x".into(), "b--y".into(), "c--z".into()],
        );
        assert_eq!(report.covered_stories, 7);
        assert_eq!(report.coverage.percentage, 70);
    }

    #[test]
    fn test_render_failures_respects_skip_flag() {
        let failures = vec![CaptureFailure {
            story_id: "a--x".into(),
            browser: "chromium".into(),
            viewport: "mobile".into(),
            theme: "dark".into(),
            reason: "boom".into(),
        }];
        let detailed = render_failures(&failures, false);
        assert!(detailed.contains("a--x"));
        assert!(detailed.contains("boom"));
        let summary_only = render_failures(&failures, true);
        assert!(summary_only.contains("1 capture(s) failed"));
        assert!(!summary_only.contains("boom"));
    }

    #[test]
    fn test_report_serializes_expected_shape() {
        let report = AnalysisReport::build(2, vec!["a--x".into()]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["coverage"]["percentage"], 50);
        assert_eq!(json["covered_stories"], 1);
    }
}
