//! Error taxonomy for the baseline manager.
//!
//! Each functional area carries its own error enum; the controller wraps
//! them for whole-run propagation. Only setup failures are expected to
//! reach the process boundary.

pub mod types;

pub use types::{CaptureError, ConfigError, ControllerError, DiscoveryError, StoreError};
