/// Image lists built from an exported asset folder
use std::path::Path;

use walkdir::WalkDir;

use crate::state::data::ImageDescriptor;

/// Extensions picked up when scanning a folder
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "webp", "gif", "avif"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Site-relative descriptors for every image under `folder`, sorted by path.
///
/// `folder` plays the role of the site root, so `folder/images/a.jpg`
/// becomes `/images/a.jpg`.
pub fn scan_folder(folder: &Path) -> Vec<ImageDescriptor> {
    tracing::debug!(folder = %folder.display(), "scanning for images");

    let mut images: Vec<ImageDescriptor> = WalkDir::new(folder)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_image(entry.path()))
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(folder).ok()?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            Some(ImageDescriptor::new(format!("/{}", segments.join("/"))))
        })
        .collect();

    images.sort_by(|a, b| a.cover.cmp(&b.cover));
    images
}
