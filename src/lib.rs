//! Image preloading for a localized portfolio site.
//!
//! The core is [`ImagePreloader`]: a UI section hands it a list of image
//! descriptors and it warms the browser-equivalent cache for them in
//! prioritized, bounded batches, reporting progress as it goes. Host
//! capabilities (network info, viewport, visibility) come in through the
//! [`Environment`] trait.

pub mod cache;
pub mod config;
pub mod env;
pub mod error;
pub mod i18n;
pub mod preload;
pub mod state;

pub use config::{PreloadOptions, SiteConfig};
pub use env::{EffectiveConnectionType, Environment, NetworkInfo, StaticEnvironment};
pub use error::{ConfigError, PreloadError, PreloadResult};
pub use preload::controller::{ImagePreloader, PreloaderBuilder};
pub use preload::loader::{DecodeLoader, FetchPriority, HttpFetchLoader, ImageLoader};
pub use state::data::{ImageDescriptor, PreloadPhase, PreloadSnapshot};
