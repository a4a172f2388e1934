use tokio::sync::oneshot;

use crate::{cache::Cache, error::LoadError};

/// Set of possible requests that can be sent to the `LoaderWorker`.
///
/// Load ops carry the key context captured at the registration site; Prime and
/// Clear maintain the request-scoped value cache; Flush forces the worker to
/// dispatch whatever window it has accumulated, which gives tests and callers
/// a deterministic coalescing boundary.
#[derive(Debug)]
pub enum LoaderOp<K, V, C> {
    /// Fetch values through the batch function (or the cache).
    Load(LoadRequest<K, V, C>),
    /// Add values to the cache that were fetched elsewhere.
    Prime(K, V),
    PrimeMany(Vec<(K, V)>),
    /// Remove values from the cache so that they will be reloaded when they
    /// are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    /// Dispatch the pending batch window immediately.
    Flush,
}

#[derive(Debug)]
pub enum LoadRequest<K, V, C> {
    One(K, C, oneshot::Sender<Result<Option<V>, LoadError>>),
    Many(Vec<(K, C)>, oneshot::Sender<Result<Vec<Option<V>>, LoadError>>),
}

/// A load staged in the current batch window, waiting for dispatch.
///
/// Each pending load receives exactly one outcome: resolved from the cache
/// after a successful dispatch, or failed with the window's error.
#[derive(Debug)]
pub enum PendingLoad<K, V> {
    One(K, oneshot::Sender<Result<Option<V>, LoadError>>),
    Many(Vec<K>, oneshot::Sender<Result<Vec<Option<V>>, LoadError>>),
}

impl<K, V> PendingLoad<K, V>
where
    V: Send + Clone + std::fmt::Debug,
{
    /// Answers the waiting caller from the cache. Keys the batch function did
    /// not return stay absent from the cache and come back as `None`.
    pub fn resolve_from<CacheT: Cache<K = K, V = V>>(self, cache: &CacheT) {
        match self {
            PendingLoad::One(key, response_tx) => {
                let value = cache.lookup(std::slice::from_ref(&key)).pop().flatten().cloned();
                send_outcome(response_tx, Ok(value));
            }
            PendingLoad::Many(keys, response_tx) => {
                let values = cache.lookup(&keys).into_iter().map(|v| v.cloned()).collect();
                send_outcome(response_tx, Ok(values));
            }
        }
    }

    /// Fails the waiting caller with the window's error.
    pub fn fail(self, error: LoadError) {
        match self {
            PendingLoad::One(_, response_tx) => send_outcome(response_tx, Err(error)),
            PendingLoad::Many(_, response_tx) => send_outcome(response_tx, Err(error)),
        }
    }
}

fn send_outcome<T>(response_tx: oneshot::Sender<T>, outcome: T) {
    if response_tx.send(outcome).is_err() {
        // The caller stopped waiting (its future was dropped); nothing to do.
        tracing::debug!("load caller went away before delivery");
    }
}
