//! Capture subsystem.
//!
//! `browser` defines the automation seam, `chromium` the real driver,
//! `engine` the per-combination capture procedure with bounded retry.

pub mod browser;
pub mod chromium;
pub mod engine;

pub use browser::{BrowserSession, PageHandle};
pub use chromium::ChromiumSession;
pub use engine::CaptureEngine;
