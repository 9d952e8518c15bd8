use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use chrono::Utc;
use log::{error, info, warn};

use crate::baseline_store::types::{ArtifactKey, ArtifactStatus, CaptureFailure, DiffResult};
use crate::baseline_store::BaselineStore;
use crate::capture::browser::BrowserSession;
use crate::capture::chromium::ChromiumSession;
use crate::capture::engine::CaptureEngine;
use crate::configuration::config::Config;
use crate::discovery::story_discovery::StoryDiscovery;
use crate::discovery::types::Story;
use crate::error_handling::types::{ControllerError, StoreError};
use crate::reporting::report::{self, AnalysisReport};

/// Primary operation selected at the CLI. No mode flag runs Status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generate,
    Update,
    Approve,
    Reject,
    Cleanup,
    Analyze,
    Status,
}

/// The two modes that drive the capture matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Generate,
    Update,
}

/// Matrix filters from the CLI. `component` is a substring match on the
/// story id; the others match configuration entry names exactly.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub component: Option<String>,
    pub viewport: Option<String>,
    pub browser: Option<String>,
    pub theme: Option<String>,
}

/// Orchestrates all batch operations over the baseline store.
///
/// Captures are sequential and failure-isolated: one exhausted
/// combination is recorded and the matrix continues. Only whole-run
/// setup errors (no browser at all) propagate out.
pub struct LifecycleController {
    config: Config,
    store: BaselineStore,
    skip_failures: bool,
}

impl LifecycleController {
    pub fn new(config: Config, skip_failures: bool) -> Result<Self, ControllerError> {
        config.validate()?;
        let store = BaselineStore::new(&config.baseline_dir)?;
        Ok(Self {
            config,
            store,
            skip_failures,
        })
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    pub async fn run(&mut self, mode: Mode, filters: &Filters) -> Result<(), ControllerError> {
        match mode {
            Mode::Generate => self.run_capture_cycle(CaptureMode::Generate, filters).await,
            Mode::Update => self.run_capture_cycle(CaptureMode::Update, filters).await,
            Mode::Approve => self.approve(),
            Mode::Reject => self.reject(),
            Mode::Cleanup => self.cleanup(),
            Mode::Analyze => self.analyze().await,
            Mode::Status => self.status(),
        }
    }

    async fn run_capture_cycle(
        &mut self,
        mode: CaptureMode,
        filters: &Filters,
    ) -> Result<(), ControllerError> {
        let discovery =
            StoryDiscovery::new(&self.config.storybook_url, &self.config.story_source_root);
        let startup = Duration::from_secs(self.config.timeouts.server_startup_secs);
        if !discovery.wait_for_server(startup).await {
            warn!("Proceeding without a confirmed preview server");
        }
        let stories = discovery.discover().await;

        let mut sessions = self.launch_browsers(filters).await?;
        let (captured, failures) = self
            .capture_matrix(mode, &stories, &sessions, filters)
            .await?;
        self.store.save_index()?;
        for session in &mut sessions {
            if let Err(e) = session.close().await {
                warn!("Browser {} close failed: {}", session.name(), e);
            }
        }

        info!("Captured {} combination(s)", captured);
        print!("{}", report::render_failures(&failures, self.skip_failures));
        Ok(())
    }

    async fn launch_browsers(
        &self,
        filters: &Filters,
    ) -> Result<Vec<Box<dyn BrowserSession>>, ControllerError> {
        let mut sessions: Vec<Box<dyn BrowserSession>> = Vec::new();
        for name in &self.config.browsers {
            if let Some(wanted) = &filters.browser {
                if name != wanted {
                    continue;
                }
            }
            match name.as_str() {
                "chromium" | "chrome" => match ChromiumSession::launch(name).await {
                    Ok(session) => sessions.push(Box::new(session)),
                    Err(e) => error!("Failed to launch {}: {}", name, e),
                },
                other => warn!("Unsupported browser {} skipped", other),
            }
        }
        if sessions.is_empty() {
            return Err(ControllerError::SetupFailed(
                "no browser could be launched".to_string(),
            ));
        }
        Ok(sessions)
    }

    /// Runs the full story x browser x viewport x theme matrix
    /// sequentially, in configuration order, story ids sorted for
    /// deterministic logging. Returns the success count and the
    /// aggregated failures.
    pub async fn capture_matrix(
        &self,
        mode: CaptureMode,
        stories: &HashMap<String, Story>,
        sessions: &[Box<dyn BrowserSession>],
        filters: &Filters,
    ) -> Result<(usize, Vec<CaptureFailure>), ControllerError> {
        let engine = CaptureEngine::new(&self.config.storybook_url, self.config.timeouts.clone());
        let mut story_ids: Vec<&String> = stories.keys().collect();
        story_ids.sort();

        let mut captured = 0usize;
        let mut failures = Vec::new();
        for story_id in story_ids {
            if let Some(filter) = &filters.component {
                if !story_id.contains(filter.as_str()) {
                    continue;
                }
            }
            for session in sessions {
                for viewport in &self.config.viewports {
                    if let Some(wanted) = &filters.viewport {
                        if &viewport.name != wanted {
                            continue;
                        }
                    }
                    for theme in &self.config.themes {
                        if let Some(wanted) = &filters.theme {
                            if &theme.name != wanted {
                                continue;
                            }
                        }
                        let key = ArtifactKey::new(
                            story_id,
                            session.name(),
                            &viewport.name,
                            &theme.name,
                        );
                        match engine
                            .capture_with_retry(session.as_ref(), story_id, viewport, theme)
                            .await
                        {
                            Ok(bytes) => match self.ingest(mode, &key, &bytes) {
                                Ok(()) => captured += 1,
                                Err(e) => {
                                    error!("Failed to store capture for {}: {}", key, e);
                                    failures.push(Self::failure(&key, &e.to_string()));
                                }
                            },
                            Err(e) => {
                                failures.push(Self::failure(&key, &e.to_string()));
                            }
                        }
                    }
                }
            }
        }
        Ok((captured, failures))
    }

    fn failure(key: &ArtifactKey, reason: &str) -> CaptureFailure {
        CaptureFailure {
            story_id: key.story_id.clone(),
            browser: key.browser.clone(),
            viewport: key.viewport.clone(),
            theme: key.theme.clone(),
            reason: reason.to_string(),
        }
    }

    fn ingest(&self, mode: CaptureMode, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError> {
        match mode {
            // First-time baseline creation: nothing to compare against
            CaptureMode::Generate => {
                self.store.write(key, bytes, ArtifactStatus::Approved)?;
                Ok(())
            }
            CaptureMode::Update => self.update_artifact(key, bytes),
        }
    }

    /// Captures into pending, then either auto-approves against the
    /// existing baseline or leaves the capture for manual review.
    fn update_artifact(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StoreError> {
        let had_baseline = self.store.exists(key, ArtifactStatus::Approved);
        self.store.write(key, bytes, ArtifactStatus::Pending)?;
        if !had_baseline {
            self.store
                .move_artifact(key, ArtifactStatus::Pending, ArtifactStatus::Approved)?;
            info!("No prior baseline for {}, approved directly", key);
            return Ok(());
        }
        let approved = self.store.artifact_path(key, ArtifactStatus::Approved);
        let pending = self.store.artifact_path(key, ArtifactStatus::Pending);
        match self.store.compare(&approved, &pending) {
            Ok(diff) if self.auto_approvable(&diff) => {
                self.store
                    .move_artifact(key, ArtifactStatus::Pending, ArtifactStatus::Approved)?;
                info!(
                    "Auto-approved {} (pixel {:.4}, confidence {:.2})",
                    key, diff.pixel_diff, diff.confidence
                );
            }
            Ok(diff) => {
                info!(
                    "{} awaits manual review (pixel {:.4}, layout {:.4}, color {:.4}, confidence {:.2})",
                    key, diff.pixel_diff, diff.layout_shift, diff.color_variance, diff.confidence
                );
            }
            Err(e) => {
                warn!("Compare failed for {} ({}), leaving pending", key, e);
            }
        }
        Ok(())
    }

    fn auto_approvable(&self, diff: &DiffResult) -> bool {
        let t = &self.config.thresholds;
        diff.identical
            || (diff.pixel_diff < t.pixel
                && diff.layout_shift < t.layout
                && diff.color_variance < t.color
                && diff.confidence > t.auto_approve_confidence)
    }

    pub fn approve(&self) -> Result<(), ControllerError> {
        let moved = self
            .store
            .move_bucket(ArtifactStatus::Pending, ArtifactStatus::Approved)?;
        self.store.save_index()?;
        println!("Approved {} pending file(s)", moved);
        Ok(())
    }

    pub fn reject(&self) -> Result<(), ControllerError> {
        let moved = self
            .store
            .move_bucket(ArtifactStatus::Pending, ArtifactStatus::Rejected)?;
        self.store.save_index()?;
        println!("Rejected {} pending file(s)", moved);
        Ok(())
    }

    pub fn cleanup(&self) -> Result<(), ControllerError> {
        let cutoff = Utc::now() - chrono::Duration::days(self.config.archive_after_days);
        let moved = self.store.archive_rejected(cutoff)?;
        self.store.save_index()?;
        println!("Archived {} rejected file(s)", moved);
        Ok(())
    }

    pub async fn analyze(&self) -> Result<(), ControllerError> {
        let discovery =
            StoryDiscovery::new(&self.config.storybook_url, &self.config.story_source_root);
        let stories = discovery.discover().await;
        let uncovered: Vec<String> = stories
            .keys()
            .filter(|id| !self.store.has_approved_for_story(id))
            .cloned()
            .collect();
        let analysis = AnalysisReport::build(stories.len(), uncovered);
        let path = self.store.base_path().join("analysis-report.json");
        let json = serde_json::to_string_pretty(&analysis)
            .map_err(|e| StoreError::IndexCorrupt(e.to_string()))?;
        fs::write(&path, json).map_err(StoreError::from)?;
        info!("Analysis report written to {}", path.display());
        print!("{}", analysis.render());
        Ok(())
    }

    pub fn status(&self) -> Result<(), ControllerError> {
        let counts: Vec<(ArtifactStatus, usize)> = ArtifactStatus::all()
            .iter()
            .map(|s| (*s, self.store.count_bucket(*s)))
            .collect();
        print!("{}", report::render_status(&counts));
        let pending = counts
            .iter()
            .find(|(s, _)| *s == ArtifactStatus::Pending)
            .map(|(_, n)| *n)
            .unwrap_or(0);
        if pending > 0 {
            warn!(
                "{} pending artifact(s) awaiting review; run --approve or --reject",
                pending
            );
        }
        Ok(())
    }
}
