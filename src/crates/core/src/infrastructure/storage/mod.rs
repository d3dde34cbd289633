//! Storage: per-session scratch directories and the persistent volume.

pub mod session_files;
pub mod volume;

pub use session_files::SessionStorage;
pub use volume::{TrackingRecord, VolumeStore};
