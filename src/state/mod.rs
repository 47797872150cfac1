/// State management module
///
/// This module holds the preloader's state, including:
/// - Shared data structures handed to the UI (data.rs)
/// - Per-controller session bookkeeping and abort signals (session.rs)

pub mod data;
pub mod session;
