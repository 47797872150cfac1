/// Visibility-triggered preloading
///
/// Hosts that can observe element intersection hand out a
/// `VisibilityObserver` per target. The controller waits for the first entry
/// that crosses the threshold, preloads once and disconnects.
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Intersection threshold and margin requested from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserverOptions {
    /// Fraction of the target that must be visible
    pub threshold: f32,
    /// Margin around the viewport that already counts as visible
    pub root_margin_px: u32,
}

impl Default for ObserverOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin_px: 50,
        }
    }
}

/// One intersection report from the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntersectionEntry {
    /// Whether the target overlaps the margin-expanded viewport
    pub is_intersecting: bool,
    pub intersection_ratio: f32,
}

impl IntersectionEntry {
    pub fn visible(ratio: f32) -> Self {
        Self {
            is_intersecting: true,
            intersection_ratio: ratio,
        }
    }

    pub fn hidden() -> Self {
        Self {
            is_intersecting: false,
            intersection_ratio: 0.0,
        }
    }

    pub fn crosses(&self, options: &ObserverOptions) -> bool {
        self.is_intersecting && self.intersection_ratio >= options.threshold
    }
}

#[async_trait]
pub trait VisibilityObserver: Send {
    /// Next intersection report; `None` once the observer is disconnected
    async fn next_entry(&mut self) -> Option<IntersectionEntry>;

    fn options(&self) -> ObserverOptions;

    fn disconnect(&mut self);
}

/// Observer fed through a channel by whoever tracks layout
#[derive(Debug)]
pub struct ChannelObserver {
    receiver: mpsc::Receiver<IntersectionEntry>,
    options: ObserverOptions,
}

impl ChannelObserver {
    pub fn with_options(mut self, options: ObserverOptions) -> Self {
        self.options = options;
        self
    }
}

#[async_trait]
impl VisibilityObserver for ChannelObserver {
    async fn next_entry(&mut self) -> Option<IntersectionEntry> {
        self.receiver.recv().await
    }

    fn options(&self) -> ObserverOptions {
        self.options
    }

    fn disconnect(&mut self) {
        self.receiver.close();
    }
}

/// Create a connected sender / observer pair
pub fn channel(capacity: usize) -> (mpsc::Sender<IntersectionEntry>, ChannelObserver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let observer = ChannelObserver {
        receiver,
        options: ObserverOptions::default(),
    };
    (sender, observer)
}

/// Wait for the first qualifying entry, then disconnect.
/// Returns `false` if the observer closed before the target became visible.
pub async fn wait_until_visible(observer: &mut dyn VisibilityObserver) -> bool {
    let options = observer.options();
    while let Some(entry) = observer.next_entry().await {
        if entry.crosses(&options) {
            observer.disconnect();
            return true;
        }
    }
    false
}

/// Handle to a pending visibility-triggered preload
#[derive(Debug)]
pub struct VisibilityWatch {
    handle: JoinHandle<()>,
    observed: bool,
}

impl VisibilityWatch {
    pub(crate) fn new(handle: JoinHandle<()>, observed: bool) -> Self {
        Self { handle, observed }
    }

    /// False when the host had no observer and preloading started right away
    pub fn is_observed(&self) -> bool {
        self.observed
    }

    /// Stop watching; a preload that already started keeps running until its
    /// session is aborted
    pub fn disconnect(self) {
        self.handle.abort();
    }

    /// Wait until the triggered preload (if any) has finished
    pub async fn finished(self) {
        let _ = self.handle.await;
    }
}
