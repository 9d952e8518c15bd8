//! Baseline store subsystem.
//!
//! Filesystem + JSON-index backed CRUD over captured image artifacts,
//! organized by lifecycle bucket (approved / pending / rejected /
//! archive), plus the perceptual diff used by the auto-approve decision.

pub mod diff;
pub mod store;
pub mod types;

pub use store::BaselineStore;
pub use types::{ArtifactKey, ArtifactRecord, ArtifactStatus, CaptureFailure, DiffResult};
