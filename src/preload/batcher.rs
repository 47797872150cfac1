/// Concurrency batcher
///
/// Splits a session's URLs into a small priority head and a normal tail.
/// The head is loaded all at once with a high-priority hint; the tail is
/// drained in fixed-size batches, handing control back to the host between
/// batches so preloading never starves rendering.
use std::sync::Arc;

use futures::future::join_all;

use crate::env::Environment;
use crate::error::{PreloadError, PreloadResult};
use crate::state::session::SessionTicket;

use super::controller::Shared;
use super::executor;
use super::loader::FetchPriority;

/// Number of leading URLs treated as above-the-fold content
pub const PRIORITY_COUNT: usize = 3;

/// Viewports narrower than this are treated as mobile
pub const MOBILE_VIEWPORT_MAX: u32 = 768;

/// Concurrency cap applied on mobile viewports
pub const MOBILE_CONCURRENCY: usize = 2;

/// Batch size after adjusting for connection speed and viewport
pub fn effective_concurrency(configured: usize, env: &dyn Environment) -> usize {
    let configured = configured.max(1);

    if env.network_info().is_some_and(|info| info.is_slow()) {
        return 1;
    }
    if env
        .viewport_width()
        .is_some_and(|width| width < MOBILE_VIEWPORT_MAX)
    {
        return configured.min(MOBILE_CONCURRENCY);
    }
    configured
}

/// Split into (priority, normal) tiers
pub fn partition(urls: &[String]) -> (&[String], &[String]) {
    urls.split_at(urls.len().min(PRIORITY_COUNT))
}

/// Run every batch of a session.
///
/// Returns `Ok(true)` once all URLs were processed, `Ok(false)` if the session
/// was aborted part-way, and `Err` if a preload task died unexpectedly.
pub(crate) async fn run_session(shared: Arc<Shared>, ticket: &SessionTicket) -> PreloadResult<bool> {
    let concurrency = effective_concurrency(shared.options.concurrent, shared.env.as_ref());
    let (priority, normal) = partition(&ticket.urls);

    tracing::debug!(
        priority = priority.len(),
        normal = normal.len(),
        concurrency,
        "dispatching preload batches"
    );

    run_batch(&shared, priority, ticket, FetchPriority::High).await?;

    let mut yielded_work = !priority.is_empty();
    for batch in normal.chunks(concurrency) {
        if ticket.signal.is_aborted() {
            return Ok(false);
        }
        if yielded_work {
            shared.env.yield_to_host().await;
            if ticket.signal.is_aborted() {
                return Ok(false);
            }
        }

        run_batch(&shared, batch, ticket, FetchPriority::Auto).await?;
        yielded_work = true;
    }

    Ok(!ticket.signal.is_aborted())
}

/// Preload every URL of one batch concurrently and wait for all of them
async fn run_batch(
    shared: &Arc<Shared>,
    urls: &[String],
    ticket: &SessionTicket,
    priority: FetchPriority,
) -> PreloadResult<()> {
    if urls.is_empty() {
        return Ok(());
    }

    let handles: Vec<_> = urls
        .iter()
        .map(|url| {
            let shared = Arc::clone(shared);
            let url = url.clone();
            let signal = ticket.signal.clone();
            let generation = ticket.generation;
            tokio::spawn(async move {
                executor::preload(&shared, &url, generation, &signal, priority).await;
            })
        })
        .collect();

    for result in join_all(handles).await {
        result.map_err(|e| PreloadError::Task(e.to_string()))?;
    }
    Ok(())
}
