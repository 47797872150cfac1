/// Session bookkeeping for one preload controller
///
/// `PreloadState` owns the resolved URL list, the set of preloaded URLs and
/// the current session's abort signal. Every session gets a new generation
/// number; results tagged with an older generation are dropped, which is how
/// superseded sessions are kept from touching fresh state.
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tokio::sync::watch;

use super::data::{progress_ratio, PreloadPhase, PreloadSnapshot};

/// Cancellation token shared by every preload in one session
#[derive(Debug, Clone)]
pub struct AbortSignal {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn abort(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once `abort` has been called (immediately if it already was)
    pub async fn aborted(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives as long as `self`, so this only returns on abort
        let _ = receiver.wait_for(|aborted| *aborted).await;
    }
}

/// Everything a running session needs, captured when it begins
#[derive(Debug, Clone)]
pub struct SessionTicket {
    pub generation: u64,
    pub signal: AbortSignal,
    pub urls: Vec<String>,
}

#[derive(Debug, Default)]
pub struct PreloadState {
    /// Deduplicated resolved URLs, in priority order
    urls: Vec<String>,
    preloaded: HashSet<String>,
    /// URLs processed without success in the current session
    failed: HashSet<String>,
    all_preloaded: bool,
    is_preloading: bool,
    generation: u64,
    abort: Option<AbortSignal>,
}

impl PreloadState {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::default()
        }
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Swap in a new URL list.
    ///
    /// Aborts the running session, evicts preloaded entries that are no longer
    /// listed and resets completion. Returns `false` when the list is unchanged.
    pub fn replace_urls(&mut self, urls: Vec<String>) -> bool {
        if self.urls == urls {
            return false;
        }

        if let Some(signal) = self.abort.take() {
            signal.abort();
        }
        self.generation += 1;

        let keep: HashSet<&str> = urls.iter().map(String::as_str).collect();
        self.preloaded.retain(|url| keep.contains(url.as_str()));
        self.failed.clear();
        self.all_preloaded = false;
        self.is_preloading = false;
        self.urls = urls;
        true
    }

    /// Start a session, or `None` if one is running or the list is complete
    pub fn begin_session(&mut self) -> Option<SessionTicket> {
        if self.all_preloaded || self.is_preloading {
            return None;
        }

        if let Some(previous) = self.abort.take() {
            previous.abort();
        }
        self.generation += 1;

        let signal = AbortSignal::new();
        self.abort = Some(signal.clone());
        self.is_preloading = true;
        self.failed.clear();

        Some(SessionTicket {
            generation: self.generation,
            signal,
            urls: self.urls.clone(),
        })
    }

    /// Close a session. `completed` is false when the batch loop ended early.
    /// Returns `false` if the ticket was superseded in the meantime.
    pub fn finish_session(&mut self, ticket: &SessionTicket, completed: bool) -> bool {
        if ticket.generation != self.generation {
            return false;
        }

        self.is_preloading = false;
        self.abort = None;
        if completed && !ticket.signal.is_aborted() {
            self.all_preloaded = true;
        }
        true
    }

    /// Abort whatever is running without touching the URL list
    pub fn abort_session(&mut self) {
        if let Some(signal) = self.abort.take() {
            signal.abort();
        }
        self.generation += 1;
        self.is_preloading = false;
    }

    pub fn is_preloaded(&self, url: &str) -> bool {
        self.preloaded.contains(url)
    }

    pub fn record_success(&mut self, url: &str, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.failed.remove(url);
        self.preloaded.insert(url.to_string())
    }

    pub fn record_failure(&mut self, url: &str, generation: u64) -> bool {
        if generation != self.generation || self.preloaded.contains(url) {
            return false;
        }
        self.failed.insert(url.to_string())
    }

    pub fn preloaded(&self) -> &HashSet<String> {
        &self.preloaded
    }

    pub fn loaded_count(&self) -> usize {
        self.preloaded.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total_count(&self) -> usize {
        self.urls.len()
    }

    pub fn progress(&self) -> f64 {
        progress_ratio(self.loaded_count(), self.total_count())
    }

    pub fn all_preloaded(&self) -> bool {
        self.all_preloaded
    }

    pub fn is_preloading(&self) -> bool {
        self.is_preloading
    }

    pub fn phase(&self) -> PreloadPhase {
        if self.is_preloading {
            PreloadPhase::Preloading
        } else if self.all_preloaded {
            PreloadPhase::Completed
        } else {
            PreloadPhase::Idle
        }
    }

    pub fn snapshot(&self) -> PreloadSnapshot {
        PreloadSnapshot {
            phase: self.phase(),
            all_images_preloaded: self.all_preloaded,
            is_preloading: self.is_preloading,
            loaded_count: self.loaded_count(),
            failed_count: self.failed_count(),
            total_count: self.total_count(),
            progress: self.progress(),
            preloaded_images: self.preloaded.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }
}
