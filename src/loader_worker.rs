use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::slice;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;

use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp, PendingLoad},
    scope::ScopeIdentity,
};
#[cfg(feature = "stats")]
use crate::stats::WorkerStats;

/// A `LoaderWorker` is the "single-thread" worker task that actually does the
/// loading work for one request scope.
///
/// Once started, it runs in a loop until the parent `Loader` aborts its
/// `JoinHandle` or drops the request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests.
/// 2. Flushing the request queue and staging keys into the batch window.
/// 3. Dispatching the window through the batch function.
///
/// One cycle through this loop may be called an "execution frame".
///
/// In state (1), the worker awaits any message on the request queue channel,
/// idling until work arrives. If the channel closes instead, loads still
/// staged in the window are failed with [`LoadError::Cancelled`] and the
/// worker terminates.
///
/// In state (2), the worker synchronously pulls requests from the queue until
/// none are immediately available. Prime and Clear requests are applied to the
/// cache on the spot. Load requests whose keys are all cached are answered
/// immediately; otherwise the missing keys and their key contexts are staged
/// into the current window and the request waits for dispatch. **The
/// coalescing boundary is "the op queue is empty"**: every registration
/// enqueued before the worker drains the queue joins the same window. A Flush
/// op dispatches the accumulated window immediately, mid-drain.
///
/// In state (3), the worker invokes the batch function exactly once with the
/// sorted, deduplicated key set staged in (2), the key contexts, and the scope
/// identity. On success the returned values are inserted into the cache and
/// every waiting request is resolved from it; keys the batch function omitted
/// resolve to `None`. On failure every waiting request receives the same
/// [`LoadError::BatchFailed`], the cache is left untouched, and the next
/// registration starts a fresh window.
pub struct LoaderWorker<K, V, C, F, CacheT, ContextT>
where
    K: 'static + Eq + Debug + Ord + Copy + Send + Sync,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
    F: 'static + BatchFunction<K, V, KeyContext = C, Context = ContextT> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, C>>,
    keys_to_load: Vec<K>,
    key_contexts: HashMap<K, C>,
    pending: Vec<PendingLoad<K, V>>,
    context: ContextT,
    identity: Arc<ScopeIdentity>,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
    phantom_batch_function: PhantomData<F>,
}

impl<K, V, C, F, CacheT, ContextT> LoaderWorker<K, V, C, F, CacheT, ContextT>
where
    K: 'static + Eq + Debug + Ord + Copy + std::hash::Hash + Send + Sync,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
    F: 'static + BatchFunction<K, V, KeyContext = C, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = V>,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V, C>>,
        context: ContextT,
        identity: Arc<ScopeIdentity>,
    ) -> Self {
        Self {
            cache,
            request_rx,
            keys_to_load: Vec::new(),
            key_contexts: HashMap::new(),
            pending: Vec::new(),
            context,
            identity,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(std::any::type_name::<(K, V)>()),
            phantom_batch_function: PhantomData,
        }
    }

    pub async fn run(mut self) {
        loop {
            // Async await until the first op of the frame arrives.
            match self.request_rx.recv().await {
                None => {
                    tracing::debug!("request channel closed, terminating worker");
                    self.cancel_pending();
                    return;
                }
                Some(op) => {
                    if self.apply(op) {
                        self.dispatch().await;
                    }
                }
            }
            // Flush the remainder of the op queue; ops already enqueued at
            // this point coalesce into the same batch window.
            while let Some(Some(op)) = self.request_rx.recv().now_or_never() {
                if self.apply(op) {
                    self.dispatch().await;
                }
            }
            self.dispatch().await;
        }
    }

    /// Applies one op to the current frame. Returns true when the op asks for
    /// an immediate dispatch.
    #[tracing::instrument(skip(self))]
    fn apply(&mut self, op: LoaderOp<K, V, C>) -> bool {
        match op {
            LoaderOp::Load(request) => self.stage(request),
            LoaderOp::Prime(key, value) => self.cache.insert(key, value),
            LoaderOp::PrimeMany(key_vals) => self.cache.insert_many(key_vals),
            LoaderOp::Clear(key) => self.cache.remove(&key),
            LoaderOp::ClearMany(keys) => self.cache.remove_many(&keys),
            LoaderOp::Flush => return true,
        }
        false
    }

    fn stage(&mut self, request: LoadRequest<K, V, C>) {
        match request {
            LoadRequest::One(key, key_context, response_tx) => {
                let hit = self.cache.lookup(slice::from_ref(&key)).pop().flatten().is_some();
                tracing::debug!(?key, hit, "load requested");
                #[cfg(feature = "stats")]
                self.stats.record_request(1, hit as u32);
                if hit {
                    PendingLoad::One(key, response_tx).resolve_from(&self.cache);
                } else {
                    self.keys_to_load.push(key);
                    self.key_contexts.insert(key, key_context);
                    self.pending.push(PendingLoad::One(key, response_tx));
                }
            }
            LoadRequest::Many(pairs, response_tx) => {
                let keys = pairs.iter().map(|(key, _)| *key).collect::<Vec<_>>();
                let missing = self
                    .cache
                    .lookup(&keys)
                    .into_iter()
                    .map(|value| value.is_none())
                    .collect::<Vec<_>>();
                let misses = missing.iter().filter(|m| **m).count();
                tracing::debug!(requested = keys.len(), misses, "load_many requested");
                #[cfg(feature = "stats")]
                self.stats.record_request(keys.len() as u32, (keys.len() - misses) as u32);
                if misses == 0 {
                    PendingLoad::Many(keys, response_tx).resolve_from(&self.cache);
                } else {
                    for ((key, key_context), missing) in pairs.into_iter().zip(missing) {
                        if missing {
                            self.keys_to_load.push(key);
                            self.key_contexts.insert(key, key_context);
                        }
                    }
                    self.pending.push(PendingLoad::Many(keys, response_tx));
                }
            }
        }
    }

    /// Dispatches the current batch window, if any. The window storage is
    /// drained afterwards, so the next registration starts a fresh window.
    #[tracing::instrument(skip(self))]
    async fn dispatch(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        self.keys_to_load.sort_unstable();
        self.keys_to_load.dedup();
        let key_contexts = std::mem::take(&mut self.key_contexts);
        tracing::debug!(
            unique_keys = self.keys_to_load.len(),
            waiters = self.pending.len(),
            "dispatching batch window"
        );
        #[cfg(feature = "stats")]
        self.stats.record_dispatch(self.keys_to_load.len() as u32);
        let outcome = F::load(&self.keys_to_load, &key_contexts, &self.identity, &self.context).await;
        self.keys_to_load.clear();
        match outcome {
            Ok(loaded) => {
                tracing::debug!(loaded = loaded.len(), "batch window completed");
                self.cache.insert_many(loaded);
                for pending in self.pending.drain(..) {
                    pending.resolve_from(&self.cache);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "batch function failed, failing the whole window");
                for pending in self.pending.drain(..) {
                    pending.fail(LoadError::BatchFailed(error.clone()));
                }
            }
        }
    }

    fn cancel_pending(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        tracing::debug!(waiters = self.pending.len(), "cancelling loads pending at scope end");
        for pending in self.pending.drain(..) {
            pending.fail(LoadError::Cancelled);
        }
    }
}
