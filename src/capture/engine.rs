//! Per-combination capture procedure.
//!
//! For each (story, viewport, theme) on a given browser: set the
//! viewport, navigate to the story URL with the theme global, wait for
//! the preview root, poll for the theme to visually apply, let
//! animations settle, hide loading indicators, then screenshot the
//! viewport. The page is always closed, even on error. Bounded retry
//! wraps the whole procedure.

use std::time::Duration;

use log::{debug, info, warn};
use serde_json::Value;

use super::browser::{BrowserSession, PageHandle};
use crate::configuration::types::{ThemeConfig, TimeoutConfig, ViewportConfig};
use crate::error_handling::types::CaptureError;

const ROOT_SELECTOR: &str = "#storybook-root, #root";

const BODY_BACKGROUND_JS: &str = "getComputedStyle(document.body).backgroundColor";

const HIDE_LOADERS_JS: &str = "document.querySelectorAll('.loading, [data-loading], \
     .MuiCircularProgress-root, .MuiSkeleton-root')\
     .forEach((el) => { el.style.display = 'none'; });";

pub struct CaptureEngine {
    base_url: String,
    timeouts: TimeoutConfig,
}

impl CaptureEngine {
    pub fn new(base_url: &str, timeouts: TimeoutConfig) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeouts,
        }
    }

    /// Story URL with the theme encoded as a preview global.
    pub fn story_url(&self, story_id: &str, theme: &ThemeConfig) -> String {
        format!(
            "{}/iframe.html?id={}&viewMode=story&globals=theme:{}",
            self.base_url, story_id, theme.global_value
        )
    }

    /// One capture attempt. The page is closed on every exit path.
    pub async fn capture(
        &self,
        session: &dyn BrowserSession,
        story_id: &str,
        viewport: &ViewportConfig,
        theme: &ThemeConfig,
    ) -> Result<Vec<u8>, CaptureError> {
        let mut page = session.open_page().await?;
        let result = self
            .capture_on_page(page.as_mut(), story_id, viewport, theme)
            .await;
        if let Err(e) = page.close().await {
            debug!("Page close failed for {}: {}", story_id, e);
        }
        result
    }

    async fn capture_on_page(
        &self,
        page: &mut dyn PageHandle,
        story_id: &str,
        viewport: &ViewportConfig,
        theme: &ThemeConfig,
    ) -> Result<Vec<u8>, CaptureError> {
        page.set_viewport(viewport.width, viewport.height, viewport.device_scale_factor)
            .await?;
        let url = self.story_url(story_id, theme);
        page.navigate(&url, Duration::from_secs(self.timeouts.navigation_secs))
            .await?;

        // Missing root is logged but does not abort the capture
        match page
            .wait_for_selector(ROOT_SELECTOR, Duration::from_secs(self.timeouts.selector_secs))
            .await
        {
            Ok(true) => {}
            Ok(false) => warn!("Preview root absent for {}, capturing anyway", story_id),
            Err(e) => warn!("Preview root wait failed for {}: {}", story_id, e),
        }

        self.wait_for_theme(page, story_id, theme).await;

        if self.timeouts.stabilization_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.timeouts.stabilization_ms)).await;
        }

        if let Err(e) = page.evaluate(HIDE_LOADERS_JS).await {
            debug!("Hiding loading indicators failed for {}: {}", story_id, e);
        }

        page.screenshot().await
    }

    /// Polls the body background color as evidence the theme has visually
    /// applied; the page exposes no explicit ready signal for theming.
    async fn wait_for_theme(&self, page: &mut dyn PageHandle, story_id: &str, theme: &ThemeConfig) {
        let expected = match &theme.expected_background {
            Some(bg) => bg,
            None => return,
        };
        let attempts = self.timeouts.theme_poll_attempts;
        for attempt in 1..=attempts {
            match page.evaluate(BODY_BACKGROUND_JS).await {
                Ok(Value::String(bg)) if bg == *expected => {
                    debug!("Theme {} applied for {} (attempt {})", theme.name, story_id, attempt);
                    return;
                }
                Ok(_) => {}
                Err(e) => debug!("Theme poll failed for {}: {}", story_id, e),
            }
            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(self.timeouts.theme_poll_interval_ms))
                    .await;
            }
        }
        warn!(
            "Theme {} background never settled for {}, capturing anyway",
            theme.name, story_id
        );
    }

    /// Retries [`capture`](CaptureEngine::capture) up to the configured
    /// attempt budget with a fixed delay; exhaustion propagates so the
    /// caller can record the failure and continue with the next
    /// combination.
    pub async fn capture_with_retry(
        &self,
        session: &dyn BrowserSession,
        story_id: &str,
        viewport: &ViewportConfig,
        theme: &ThemeConfig,
    ) -> Result<Vec<u8>, CaptureError> {
        let attempts = self.timeouts.retry_attempts.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.capture(session, story_id, viewport, theme).await {
                Ok(bytes) => {
                    if attempt > 1 {
                        info!("Capture recovered for {} on attempt {}", story_id, attempt);
                    }
                    return Ok(bytes);
                }
                Err(e) => {
                    warn!(
                        "Capture attempt {}/{} failed for {} ({}, {}, {}): {}",
                        attempt,
                        attempts,
                        story_id,
                        session.name(),
                        viewport.name,
                        theme.name,
                        e
                    );
                    last_error = e.to_string();
                    if attempt < attempts && self.timeouts.retry_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.timeouts.retry_delay_ms))
                            .await;
                    }
                }
            }
        }
        Err(CaptureError::RetriesExhausted(format!(
            "{} ({}, {}, {}): {}",
            story_id,
            session.name(),
            viewport.name,
            theme.name,
            last_error
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::browser::mock::{MockBrowser, MockPlan};
    use std::sync::atomic::Ordering;

    fn fast_timeouts() -> TimeoutConfig {
        TimeoutConfig {
            navigation_secs: 1,
            selector_secs: 1,
            theme_poll_attempts: 1,
            theme_poll_interval_ms: 0,
            stabilization_ms: 0,
            retry_attempts: 3,
            retry_delay_ms: 0,
            server_startup_secs: 1,
        }
    }

    fn test_viewport() -> ViewportConfig {
        ViewportConfig {
            name: "desktop".into(),
            width: 800,
            height: 600,
            device_scale_factor: 1.0,
        }
    }

    fn test_theme() -> ThemeConfig {
        ThemeConfig {
            name: "light".into(),
            global_value: "light".into(),
            expected_background: None,
        }
    }

    #[test]
    fn test_story_url_encodes_theme_global() {
        let engine = CaptureEngine::new("http://localhost:6006/", fast_timeouts());
        let theme = ThemeConfig {
            name: "dark".into(),
            global_value: "dark".into(),
            expected_background: None,
        };
        assert_eq!(
            engine.story_url("button--primary", &theme),
            "http://localhost:6006/iframe.html?id=button--primary&viewMode=story&globals=theme:dark"
        );
    }

    #[tokio::test]
    async fn test_capture_returns_screenshot_bytes() {
        let plan = MockPlan::with_default_bytes(vec![1, 2, 3]);
        let browser = MockBrowser::new("chromium", plan.clone());
        let engine = CaptureEngine::new("http://localhost:6006", fast_timeouts());
        let bytes = engine
            .capture(&browser, "button--primary", &test_viewport(), &test_theme())
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let plan = MockPlan::with_default_bytes(vec![7]);
        plan.fail_story("chip--default", 2);
        let browser = MockBrowser::new("chromium", plan.clone());
        let engine = CaptureEngine::new("http://localhost:6006", fast_timeouts());
        let bytes = engine
            .capture_with_retry(&browser, "chip--default", &test_viewport(), &test_theme())
            .await
            .unwrap();
        assert_eq!(bytes, vec![7]);
        // Two failed attempts plus the successful one
        assert_eq!(plan.pages_opened.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_propagates() {
        let plan = MockPlan::with_default_bytes(vec![7]);
        plan.fail_story("chip--default", u32::MAX);
        let browser = MockBrowser::new("chromium", plan.clone());
        let engine = CaptureEngine::new("http://localhost:6006", fast_timeouts());
        let result = engine
            .capture_with_retry(&browser, "chip--default", &test_viewport(), &test_theme())
            .await;
        assert!(matches!(result, Err(CaptureError::RetriesExhausted(_))));
        assert_eq!(plan.pages_opened.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_page_closed_on_every_exit_path() {
        let plan = MockPlan::with_default_bytes(vec![7]);
        plan.fail_story("menu--open", u32::MAX);
        let browser = MockBrowser::new("chromium", plan.clone());
        let engine = CaptureEngine::new("http://localhost:6006", fast_timeouts());

        let _ = engine
            .capture(&browser, "button--primary", &test_viewport(), &test_theme())
            .await;
        let _ = engine
            .capture(&browser, "menu--open", &test_viewport(), &test_theme())
            .await;

        assert_eq!(
            plan.pages_opened.load(Ordering::SeqCst),
            plan.pages_closed.load(Ordering::SeqCst)
        );
    }
}
