//! chromiumoxide-backed implementation of the browser seam.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use log::{debug, info, warn};
use tokio::task::JoinHandle;

use super::browser::{BrowserSession, PageHandle};
use crate::error_handling::types::CaptureError;

/// A headless Chromium instance plus its CDP event pump.
pub struct ChromiumSession {
    name: String,
    browser: Browser,
    handler_task: JoinHandle<()>,
}

impl ChromiumSession {
    pub async fn launch(name: &str) -> Result<Self, CaptureError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(CaptureError::LaunchFailed)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CaptureError::LaunchFailed(e.to_string()))?;
        // The handler must be pumped for the lifetime of the browser
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!("Launched headless {} instance", name);
        Ok(Self {
            name: name.to_string(),
            browser,
            handler_task,
        })
    }
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_page(&self) -> Result<Box<dyn PageHandle>, CaptureError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::PageFailed(e.to_string()))?;
        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        if let Err(e) = self.browser.close().await {
            warn!("Browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("Browser process reap failed: {}", e);
        }
        self.handler_task.abort();
        Ok(())
    }
}

struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl PageHandle for ChromiumPage {
    async fn set_viewport(
        &mut self,
        width: u32,
        height: u32,
        device_scale_factor: f64,
    ) -> Result<(), CaptureError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(width as i64)
            .height(height as i64)
            .device_scale_factor(device_scale_factor)
            .mobile(false)
            .build()
            .map_err(CaptureError::PageFailed)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| CaptureError::PageFailed(e.to_string()))?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), CaptureError> {
        let navigation = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };
        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(CaptureError::PageFailed(e.to_string())),
            Err(_) => Err(CaptureError::NavigationTimeout(format!(
                "{} after {:?}",
                url, timeout
            ))),
        }
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<bool, CaptureError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, CaptureError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| CaptureError::EvaluationFailed(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, CaptureError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| CaptureError::ScreenshotFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), CaptureError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| CaptureError::PageFailed(e.to_string()))
    }
}
