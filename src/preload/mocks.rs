/// Mock loader for controller and executor tests
///
/// `MockLoader` records every call and can be told per URL whether to
/// succeed, fail, hang or panic. Clones share the same log, so a test keeps
/// one handle while the controller owns another.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::error::{PreloadError, PreloadResult};

use super::loader::{FetchPriority, ImageLoader};

/// Simulated network latency for URLs without an explicit behaviour
pub const DEFAULT_DELAY: Duration = Duration::from_millis(5);

/// What the mock does when asked to load a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    /// Resolve with a 404 after the default delay
    Fail,
    /// Never resolve
    Hang,
    Delay(Duration),
    Panic,
}

/// One recorded `load` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadCall {
    pub url: String,
    pub priority: FetchPriority,
    pub seq: usize,
    pub started: Instant,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<LoadCall>>,
    behaviours: Mutex<HashMap<String, Behaviour>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MockLoader {
    inner: Arc<Inner>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, behaviour: Behaviour) {
        self.inner
            .behaviours
            .lock()
            .unwrap()
            .insert(url.to_string(), behaviour);
    }

    /// All calls in the order they were made
    pub fn calls(&self) -> Vec<LoadCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.inner
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.url == url)
            .count()
    }

    pub fn urls_in_order(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.url).collect()
    }

    /// Highest number of loads that were pending at the same time
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn behaviour(&self, url: &str) -> Behaviour {
        self.inner
            .behaviours
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(Behaviour::Succeed)
    }

    fn record(&self, url: &str, priority: FetchPriority) {
        let mut calls = self.inner.calls.lock().unwrap();
        let seq = calls.len();
        calls.push(LoadCall {
            url: url.to_string(),
            priority,
            seq,
            started: Instant::now(),
        });
    }
}

/// Decrements the in-flight counter when the load ends or is dropped
struct InFlight<'a>(&'a Inner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a Inner) -> Self {
        let now = inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        inner.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageLoader for MockLoader {
    async fn load(&self, url: &str, priority: FetchPriority) -> PreloadResult<()> {
        self.record(url, priority);
        let behaviour = self.behaviour(url);
        let _guard = InFlight::enter(&self.inner);

        match behaviour {
            Behaviour::Succeed => {
                tokio::time::sleep(DEFAULT_DELAY).await;
                Ok(())
            }
            Behaviour::Fail => {
                tokio::time::sleep(DEFAULT_DELAY).await;
                Err(PreloadError::Status {
                    url: url.to_string(),
                    status_code: 404,
                })
            }
            Behaviour::Hang => std::future::pending().await,
            Behaviour::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behaviour::Panic => panic!("mock loader panicked on {url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_records_calls_in_order() {
        let loader = MockLoader::new();
        loader.set("/b.jpg", Behaviour::Fail);

        loader.load("/a.jpg", FetchPriority::High).await.unwrap();
        assert!(loader.load("/b.jpg", FetchPriority::Auto).await.is_err());

        assert_eq!(loader.urls_in_order(), vec!["/a.jpg", "/b.jpg"]);
        assert_eq!(loader.calls()[1].seq, 1);
        assert_eq!(loader.max_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_behaviour() {
        let loader = MockLoader::new();
        loader.set("/c.jpg", Behaviour::Delay(Duration::from_millis(20)));

        let started = Instant::now();
        loader.load("/c.jpg", FetchPriority::Auto).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
