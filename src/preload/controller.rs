use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::config::PreloadOptions;
use crate::env::Environment;
use crate::state::data::{ImageDescriptor, PreloadPhase, PreloadSnapshot};
use crate::state::session::PreloadState;

use super::batcher;
use super::loader::ImageLoader;
use super::resolver::{OptimizedPaths, UrlResolver};
use super::visibility::{wait_until_visible, ObserverOptions, VisibilityWatch};

/// Delay between `mount` and the first eager preload
pub const EAGER_START_DELAY: Duration = Duration::from_millis(100);

/// State shared between the controller handle and its preload tasks
pub(crate) struct Shared {
    pub(crate) env: Arc<dyn Environment>,
    pub(crate) loader: Arc<dyn ImageLoader>,
    pub(crate) options: PreloadOptions,
    pub(crate) resolver: UrlResolver,
    state: Mutex<PreloadState>,
}

impl Shared {
    pub(crate) fn new(
        env: Arc<dyn Environment>,
        loader: Arc<dyn ImageLoader>,
        options: PreloadOptions,
        resolver: UrlResolver,
        urls: Vec<String>,
    ) -> Self {
        Self {
            env,
            loader,
            options,
            resolver,
            state: Mutex::new(PreloadState::new(urls)),
        }
    }

    /// The state stays consistent even if a holder panicked, so poisoning is ignored
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PreloadState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`ImagePreloader`]
pub struct PreloaderBuilder {
    env: Arc<dyn Environment>,
    loader: Arc<dyn ImageLoader>,
    options: PreloadOptions,
    paths: OptimizedPaths,
    images: Vec<ImageDescriptor>,
}

impl PreloaderBuilder {
    pub fn options(mut self, options: PreloadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn optimized_paths(mut self, paths: OptimizedPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn images(mut self, images: &[ImageDescriptor]) -> Self {
        self.images = images.to_vec();
        self
    }

    pub fn build(self) -> ImagePreloader {
        let resolver = UrlResolver::new(
            self.env.is_production(),
            self.options.use_optimized_paths,
            self.paths,
        );
        let urls = resolver.resolve_all(&self.images);

        ImagePreloader {
            shared: Arc::new(Shared::new(
                self.env,
                self.loader,
                self.options,
                resolver,
                urls,
            )),
        }
    }
}

/// Prefetches the images of one UI section before it reveals them
///
/// Cloning is cheap; clones share the same state and sessions.
#[derive(Clone)]
pub struct ImagePreloader {
    shared: Arc<Shared>,
}

impl ImagePreloader {
    pub fn builder(env: Arc<dyn Environment>, loader: Arc<dyn ImageLoader>) -> PreloaderBuilder {
        PreloaderBuilder {
            env,
            loader,
            options: PreloadOptions::default(),
            paths: OptimizedPaths::default(),
            images: Vec::new(),
        }
    }

    pub fn options(&self) -> &PreloadOptions {
        &self.shared.options
    }

    /// Replace the descriptor list.
    ///
    /// When the resolved URLs change, the running session is aborted, entries
    /// no longer listed are evicted and completion resets. Returns whether
    /// anything changed.
    pub fn set_images(&self, images: &[ImageDescriptor]) -> bool {
        let urls = self.shared.resolver.resolve_all(images);
        let total = urls.len();
        let changed = self.shared.lock_state().replace_urls(urls);
        if changed {
            tracing::debug!(total, "image list changed");
        }
        changed
    }

    /// Preload every image of the current list.
    ///
    /// Never fails. Returns immediately on the server, while another session
    /// is running, or once the list has been preloaded.
    pub async fn preload_all_images(&self) {
        if self.shared.env.is_server_side() {
            return;
        }

        let ticket = self.shared.lock_state().begin_session();
        let Some(ticket) = ticket else {
            return;
        };

        let started = Instant::now();
        tracing::info!(
            total = ticket.urls.len(),
            generation = ticket.generation,
            "starting preload session"
        );

        let completed = if ticket.urls.is_empty() {
            true
        } else {
            match batcher::run_session(Arc::clone(&self.shared), &ticket).await {
                Ok(completed) => completed,
                Err(e) => {
                    tracing::error!(error = %e, "preload session ended early");
                    false
                }
            }
        };

        let (current, snapshot) = {
            let mut state = self.shared.lock_state();
            let current = state.finish_session(&ticket, completed);
            (current, state.snapshot())
        };

        if !current || ticket.signal.is_aborted() {
            tracing::debug!(generation = ticket.generation, "preload session superseded");
            return;
        }

        tracing::info!(
            loaded = snapshot.loaded_count,
            failed = snapshot.failed_count,
            total = snapshot.total_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "preload session finished"
        );
    }

    /// Preload once `target` becomes visible.
    ///
    /// Falls back to preloading right away when the host cannot observe
    /// visibility. Must be called from within a Tokio runtime.
    pub fn preload_on_visible(&self, target: &str) -> VisibilityWatch {
        let preloader = self.clone();
        let target = target.to_string();

        match self.shared.env.observe(&target, ObserverOptions::default()) {
            Some(mut observer) => {
                let handle = tokio::spawn(async move {
                    if wait_until_visible(observer.as_mut()).await {
                        tracing::debug!(target, "target visible, preloading");
                        preloader.preload_all_images().await;
                    }
                });
                VisibilityWatch::new(handle, true)
            }
            None => {
                tracing::debug!(target, "visibility observation unavailable, preloading now");
                let handle = tokio::spawn(async move {
                    preloader.preload_all_images().await;
                });
                VisibilityWatch::new(handle, false)
            }
        }
    }

    /// Start the eager preload, if enabled, shortly after mount
    pub fn mount(&self) -> Option<JoinHandle<()>> {
        if !self.shared.options.eager || self.shared.env.is_server_side() {
            return None;
        }

        let preloader = self.clone();
        Some(tokio::spawn(async move {
            tokio::time::sleep(EAGER_START_DELAY).await;
            preloader.preload_all_images().await;
        }))
    }

    /// Abort the running session; preloaded entries stay valid
    pub fn unmount(&self) {
        self.shared.lock_state().abort_session();
    }

    pub fn all_images_preloaded(&self) -> bool {
        self.shared.lock_state().all_preloaded()
    }

    pub fn is_preloading(&self) -> bool {
        self.shared.lock_state().is_preloading()
    }

    pub fn is_preloaded(&self, url: &str) -> bool {
        self.shared.lock_state().is_preloaded(url)
    }

    pub fn preloaded_images(&self) -> HashSet<String> {
        self.shared.lock_state().preloaded().clone()
    }

    pub fn progress(&self) -> f64 {
        self.shared.lock_state().progress()
    }

    pub fn loaded_count(&self) -> usize {
        self.shared.lock_state().loaded_count()
    }

    pub fn failed_count(&self) -> usize {
        self.shared.lock_state().failed_count()
    }

    pub fn total_count(&self) -> usize {
        self.shared.lock_state().total_count()
    }

    pub fn phase(&self) -> PreloadPhase {
        self.shared.lock_state().phase()
    }

    /// Resolved URLs of the current list, in dispatch order
    pub fn urls(&self) -> Vec<String> {
        self.shared.lock_state().urls().to_vec()
    }

    pub fn snapshot(&self) -> PreloadSnapshot {
        self.shared.lock_state().snapshot()
    }
}

impl std::fmt::Debug for ImagePreloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePreloader")
            .field("options", &self.shared.options)
            .field("state", &*self.shared.lock_state())
            .finish()
    }
}
