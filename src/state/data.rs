/// Shared data structures for the preloader
///
/// These structs represent the data model that flows between
/// the consuming UI sections and the preload controller.
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Reference to one image resource supplied by a UI section
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Canonical path or URL of the image (e.g., "/images/projects/cover.jpg")
    pub cover: String,
}

impl ImageDescriptor {
    pub fn new(cover: impl Into<String>) -> Self {
        Self {
            cover: cover.into(),
        }
    }
}

/// Lifecycle of the current descriptor list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadPhase {
    Idle,
    Preloading,
    Completed,
}

/// Point-in-time view of the controller, as read by the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadSnapshot {
    pub phase: PreloadPhase,
    pub all_images_preloaded: bool,
    pub is_preloading: bool,
    pub loaded_count: usize,
    /// URLs processed in the last session that did not preload
    pub failed_count: usize,
    pub total_count: usize,
    /// Ratio in [0, 1]; an empty list counts as complete
    pub progress: f64,
    pub preloaded_images: BTreeSet<String>,
}

/// `loaded / total`, with an empty list defined as fully loaded
pub fn progress_ratio(loaded: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (loaded.min(total) as f64) / (total as f64)
}
