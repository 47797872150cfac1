/// Configuration for the preloader and the site tooling
///
/// Every field has a default, so a config file only needs to list what it
/// changes. Files are JSON with camelCase keys, matching the options the UI
/// sections pass to the preloader.
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::i18n::negotiate::LocaleConfig;
use crate::preload::resolver::OptimizedPaths;

/// Options a UI section passes to its preloader
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct PreloadOptions {
    /// Preloads per normal-tier batch
    pub concurrent: usize,

    /// Per-image timeout in milliseconds
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,

    /// Start preloading shortly after mount
    pub eager: bool,

    /// Request the precomputed optimized variants in production
    pub use_optimized_paths: bool,
}

impl Default for PreloadOptions {
    fn default() -> Self {
        Self {
            concurrent: 4,
            timeout_ms: 8000,
            eager: false,
            use_optimized_paths: true,
        }
    }
}

impl PreloadOptions {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Everything the command-line front end needs to know about the site
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SiteConfig {
    /// Production builds fetch optimized variants over HTTP
    pub production: bool,

    /// Origin that site-relative image paths are fetched from
    pub base_url: Option<String>,

    /// Local directory holding the exported `public/` assets
    pub asset_root: PathBuf,

    pub preload: PreloadOptions,

    pub optimized_paths: OptimizedPaths,

    pub locales: LocaleConfig,

    /// Directory with one `<locale>.json` message file per locale
    pub messages_dir: PathBuf,

    /// Parsed message files kept in memory
    pub catalog_capacity: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            production: false,
            base_url: None,
            asset_root: PathBuf::from("public"),
            preload: PreloadOptions::default(),
            optimized_paths: OptimizedPaths::default(),
            locales: LocaleConfig::default(),
            messages_dir: PathBuf::from("messages"),
            catalog_capacity: 8,
        }
    }
}

impl SiteConfig {
    /// Default location of the config file
    ///
    /// - Linux: ~/.config/portfolio-preload/config.json
    /// - macOS: ~/Library/Application Support/portfolio-preload/config.json
    /// - Windows: %APPDATA%\portfolio-preload\config.json
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir().or_else(dirs::home_dir)?;
        path.push("portfolio-preload");
        path.push("config.json");
        Some(path)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading default config");
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }
}
