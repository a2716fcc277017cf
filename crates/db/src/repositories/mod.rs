//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod camera_repo;
pub mod recording_repo;

pub use camera_repo::CameraRepo;
pub use recording_repo::{DuplicateResolution, RecordingRepo, UpsertOutcome};
