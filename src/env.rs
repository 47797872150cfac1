/// Host environment capabilities
///
/// The preloader never inspects globals to learn whether it runs on the
/// server, in a production build, or on a slow connection. Everything it
/// needs from the host is asked through the `Environment` trait, which makes
/// the controller deterministic under test.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::preload::visibility::{ChannelObserver, ObserverOptions, VisibilityObserver};

/// Delay used between batches when no idle scheduling is available
pub const DEV_YIELD_DELAY: Duration = Duration::from_millis(10);

/// Effective connection type as reported by the network information facility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveConnectionType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
}

impl EffectiveConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow2g => "slow-2g",
            Self::TwoG => "2g",
            Self::ThreeG => "3g",
            Self::FourG => "4g",
        }
    }
}

impl fmt::Display for EffectiveConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectiveConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(Self::Slow2g),
            "2g" => Ok(Self::TwoG),
            "3g" => Ok(Self::ThreeG),
            "4g" => Ok(Self::FourG),
            other => Err(format!("unknown effective connection type: {other}")),
        }
    }
}

/// Snapshot of the host's network information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub effective_type: EffectiveConnectionType,
}

impl NetworkInfo {
    pub fn new(effective_type: EffectiveConnectionType) -> Self {
        Self { effective_type }
    }

    /// 2G and slow-2G connections get a single preload lane
    pub fn is_slow(&self) -> bool {
        matches!(
            self.effective_type,
            EffectiveConnectionType::Slow2g | EffectiveConnectionType::TwoG
        )
    }
}

/// Capabilities the preloader needs from its host
#[async_trait]
pub trait Environment: Send + Sync {
    /// True while rendering on the server (no network or image facilities)
    fn is_server_side(&self) -> bool;

    fn is_production(&self) -> bool;

    /// `None` when the host has no network information facility
    fn network_info(&self) -> Option<NetworkInfo>;

    /// Viewport width in CSS pixels, if known
    fn viewport_width(&self) -> Option<u32>;

    /// Hand control back to the host scheduler between batches.
    ///
    /// Production builds rely on a cooperative yield; everything else waits
    /// a short fixed delay.
    async fn yield_to_host(&self) {
        if self.is_production() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(DEV_YIELD_DELAY).await;
        }
    }

    /// Start observing the visibility of `target`.
    /// Returns `None` when the host has no intersection-observation facility.
    fn observe(
        &self,
        _target: &str,
        _options: ObserverOptions,
    ) -> Option<Box<dyn VisibilityObserver>> {
        None
    }
}

/// Environment described by plain values, used by the CLI and in tests
#[derive(Debug, Default)]
pub struct StaticEnvironment {
    pub server_side: bool,
    pub production: bool,
    pub network: Option<NetworkInfo>,
    pub viewport_width: Option<u32>,
    /// Observers handed out once per target by `observe`
    observers: Mutex<HashMap<String, ChannelObserver>>,
}

impl StaticEnvironment {
    /// Client-side development environment with no optional facilities
    pub fn new() -> Self {
        Self::default()
    }

    pub fn production() -> Self {
        Self {
            production: true,
            ..Self::default()
        }
    }

    pub fn with_server_side(mut self, server_side: bool) -> Self {
        self.server_side = server_side;
        self
    }

    pub fn with_network(mut self, network: NetworkInfo) -> Self {
        self.network = Some(network);
        self
    }

    pub fn with_viewport_width(mut self, width: u32) -> Self {
        self.viewport_width = Some(width);
        self
    }

    /// Register the observer `observe` returns for `target`
    pub fn with_observer(self, target: impl Into<String>, observer: ChannelObserver) -> Self {
        if let Ok(mut observers) = self.observers.lock() {
            observers.insert(target.into(), observer);
        }
        self
    }
}

#[async_trait]
impl Environment for StaticEnvironment {
    fn is_server_side(&self) -> bool {
        self.server_side
    }

    fn is_production(&self) -> bool {
        self.production
    }

    fn network_info(&self) -> Option<NetworkInfo> {
        self.network
    }

    fn viewport_width(&self) -> Option<u32> {
        self.viewport_width
    }

    fn observe(
        &self,
        target: &str,
        options: ObserverOptions,
    ) -> Option<Box<dyn VisibilityObserver>> {
        let mut observers = self.observers.lock().ok()?;
        let observer = observers.remove(target)?;
        Some(Box::new(observer.with_options(options)))
    }
}
