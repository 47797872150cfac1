/// Image preloading module
///
/// This module handles:
/// - Resolving descriptors to the URLs actually requested (resolver.rs)
/// - Loading one image over HTTP or from disk (loader.rs)
/// - Building image lists from an asset folder (manifest.rs)
/// - Racing a single load against its timeout and abort signal (executor.rs)
/// - Splitting a session into priority and normal batches (batcher.rs)
/// - Triggering on visibility (visibility.rs)
/// - The controller UI sections talk to (controller.rs)

pub mod batcher;
pub mod controller;
pub(crate) mod executor;
pub mod loader;
pub mod manifest;
pub mod resolver;
pub mod visibility;

#[cfg(test)]
pub(crate) mod mocks;
