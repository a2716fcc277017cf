//! Pure domain logic for the recording lifecycle reconciliation engine.
//!
//! No database or network access lives here. Each module is a leaf the
//! other crates compose: path normalization, camera identity resolution,
//! segment filename conventions, duration estimation, and link
//! disposition rules.

pub mod duration;
pub mod error;
pub mod identity;
pub mod linking;
pub mod paths;
pub mod probe;
pub mod segments;
pub mod types;
