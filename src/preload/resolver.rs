use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::state::data::ImageDescriptor;

/// Extensions that have a precomputed optimized variant
const OPTIMIZABLE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Layout of the optimized variants produced by the static export
///
/// `/images/projects/cover.jpg` maps to
/// `/images/projects/{directory}/cover-opt-{width}.{extension}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizedPaths {
    pub directory: String,
    pub width: u32,
    pub extension: String,
}

impl Default for OptimizedPaths {
    fn default() -> Self {
        Self {
            directory: "optimized".to_string(),
            width: 1920,
            extension: "webp".to_string(),
        }
    }
}

/// Turns image descriptors into the URLs that are actually requested
#[derive(Debug, Clone)]
pub struct UrlResolver {
    rewrite: bool,
    paths: OptimizedPaths,
}

impl UrlResolver {
    /// Optimized paths are only used in production builds with the option enabled
    pub fn new(production: bool, use_optimized_paths: bool, paths: OptimizedPaths) -> Self {
        Self {
            rewrite: production && use_optimized_paths,
            paths,
        }
    }

    /// Resolver that returns every path unchanged
    pub fn passthrough() -> Self {
        Self::new(false, false, OptimizedPaths::default())
    }

    pub fn resolve(&self, image: &ImageDescriptor) -> String {
        if !self.rewrite {
            return image.cover.clone();
        }
        self.optimized_path(&image.cover)
            .unwrap_or_else(|| image.cover.clone())
    }

    /// Resolve a list, dropping repeats but keeping first-seen order
    pub fn resolve_all(&self, images: &[ImageDescriptor]) -> Vec<String> {
        let mut seen = HashSet::new();
        images
            .iter()
            .map(|image| self.resolve(image))
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    fn optimized_path(&self, cover: &str) -> Option<String> {
        // Remote and inline images are served as-is
        if cover.contains("://") || cover.starts_with("data:") {
            return None;
        }

        let (dir, file) = match cover.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", cover),
        };
        let (stem, ext) = file.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }

        let ext = ext.to_ascii_lowercase();
        if !OPTIMIZABLE_EXTENSIONS.contains(&ext.as_str()) {
            return None;
        }

        let prefix = if dir.is_empty() && !cover.starts_with('/') {
            String::new()
        } else {
            format!("{dir}/")
        };

        Some(format!(
            "{prefix}{}/{stem}-opt-{}.{}",
            self.paths.directory, self.paths.width, self.paths.extension
        ))
    }
}
