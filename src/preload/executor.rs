/// Single-URL preload executor
///
/// Races the loader against the per-URL timeout and the session's abort
/// signal. Failures are logged and recorded, never propagated: one bad asset
/// must not hold up the rest of its batch.
use crate::error::{PreloadError, PreloadResult};
use crate::state::session::AbortSignal;

use super::controller::Shared;
use super::loader::FetchPriority;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Already in the preloaded set; no loader call was made
    Cached,
    Loaded,
}

pub(crate) async fn try_preload(
    shared: &Shared,
    url: &str,
    signal: &AbortSignal,
    priority: FetchPriority,
) -> PreloadResult<Outcome> {
    let cached = shared.lock_state().is_preloaded(url);
    if cached {
        return Ok(Outcome::Cached);
    }
    if signal.is_aborted() {
        return Err(PreloadError::Aborted);
    }

    let timeout = shared.options.timeout();
    // Dropping the load future on timeout or abort also cancels the request
    let load = tokio::time::timeout(timeout, shared.loader.load(url, priority));

    tokio::select! {
        biased;
        _ = signal.aborted() => Err(PreloadError::Aborted),
        result = load => match result {
            Ok(loaded) => loaded.map(|()| Outcome::Loaded),
            Err(_) => Err(PreloadError::Timeout(timeout)),
        },
    }
}

/// Preload `url` for the session identified by `generation`
pub(crate) async fn preload(
    shared: &Shared,
    url: &str,
    generation: u64,
    signal: &AbortSignal,
    priority: FetchPriority,
) {
    match try_preload(shared, url, signal, priority).await {
        Ok(Outcome::Cached) => {
            tracing::debug!(url, "image already preloaded");
        }
        Ok(Outcome::Loaded) => {
            if signal.is_aborted() {
                tracing::debug!(url, "discarding result of superseded session");
                return;
            }
            let recorded = shared.lock_state().record_success(url, generation);
            if recorded {
                tracing::debug!(url, ?priority, "preloaded image");
            }
        }
        Err(e) if e.is_abort() => {
            tracing::debug!(url, "preload superseded");
        }
        Err(e) => {
            tracing::warn!(url, error = %e, "failed to preload image");
            shared.lock_state().record_failure(url, generation);
        }
    }
}
