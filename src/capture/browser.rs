//! Browser automation seam.
//!
//! The capture engine only talks to these traits; the chromiumoxide
//! implementation lives in `chromium.rs` and tests substitute in-memory
//! mocks, so nothing above this seam needs a real browser.

use std::time::Duration;

use async_trait::async_trait;

use crate::error_handling::types::CaptureError;

/// One launched browser instance, shared across all captures for that
/// browser. A new page is opened and closed per capture to avoid state
/// bleed between captures.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn name(&self) -> &str;

    async fn open_page(&self) -> Result<Box<dyn PageHandle>, CaptureError>;

    async fn close(&mut self) -> Result<(), CaptureError>;
}

/// One open page (tab). All waits are bounded by the caller.
#[async_trait]
pub trait PageHandle: Send {
    async fn set_viewport(
        &mut self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
    ) -> Result<(), CaptureError>;

    /// Navigates and waits for load completion within `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), CaptureError>;

    /// Waits for a matching element. `Ok(false)` means the timeout
    /// expired without a match; callers treat that as a soft failure.
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, CaptureError>;

    /// Evaluates a script in the page and returns its JSON value.
    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, CaptureError>;

    /// Viewport screenshot (not full-page), PNG bytes.
    async fn screenshot(&mut self) -> Result<Vec<u8>, CaptureError>;

    async fn close(&mut self) -> Result<(), CaptureError>;
}
