use std::ops::Drop;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{collections::HashMap, fmt::Debug};

use tokio::sync::{mpsc, oneshot};
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp},
    loader_worker::LoaderWorker,
    scope::ScopeIdentity,
};

/// Batch loads values from some expensive resource within one request scope,
/// primarily intended for mitigating GraphQL's N+1 problem.
///
/// Resolvers call [`Loader::load`] and [`Loader::load_many`] to fetch values
/// from the underlying resource or the request-scoped cache. The cache can be
/// cleared with [`Loader::clear`] and [`Loader::clear_many`], and values can
/// be added out-of-band through [`Loader::prime`] and [`Loader::prime_many`].
/// [`Loader::flush`] forces the accumulated batch window to dispatch without
/// waiting for the worker's queue to drain.
///
/// The `Loader` struct acts as an intermediary between the async domain in
/// which `load` calls are invoked and the pseudo-single-threaded domain of the
/// `LoaderWorker`. Callers can invoke the `Loader` from multiple parallel
/// tasks; requested operations are enqueued on the request queue and processed
/// sequentially by the worker, which delivers results back over per-request
/// oneshot channels. Every registration enqueued before the worker drains its
/// queue joins the same batch window.
///
/// A loader belongs to exactly one [`RequestScope`](crate::RequestScope).
/// [`Loader::shutdown`] (called when the scope ends) cancels loads still in
/// flight and makes later calls fail fast with [`LoadError::ScopeEnded`];
/// dropping the loader has the same effect.
pub struct Loader<K, V, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V, C>>,
    closed: Arc<AtomicBool>,
    load_task_handle: tokio::task::JoinHandle<()>,
}

impl<K, V, C> Drop for Loader<K, V, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<K, V, C> Loader<K, V, C>
where
    K: 'static + Eq + Debug + Ord + Copy + std::hash::Hash + Send + Sync,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    /// Creates a new Loader for the provided BatchFunction, shared context,
    /// and scope identity.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(_: F, context: ContextT, identity: Arc<ScopeIdentity>) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, KeyContext = C, Context = ContextT> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let span = tracing::trace_span!(
            "loader_worker",
            kv = std::any::type_name::<(K, V)>(),
            correlation_id = %identity.correlation_id(),
        );
        let worker =
            LoaderWorker::<K, V, C, F, HashMap<K, V>, ContextT>::new(HashMap::new(), rx, context, identity);
        Self {
            request_tx: tx,
            closed: Arc::new(AtomicBool::new(false)),
            load_task_handle: tokio::task::spawn(worker.run().instrument(span)),
        }
    }
}

// Bounds here must stay in sync with the struct declaration: `Drop` carries
// exactly the struct's bounds and calls `shutdown` below.
impl<K, V, C> Loader<K, V, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    /// Loads a value from the underlying resource.
    ///
    /// Returns `Ok(None)` if the batch function did not return a value for the
    /// key: an absence, distinct from the error cases.
    ///
    /// If the value is already in the request-scoped cache, it is returned as
    /// soon as the request is processed. Otherwise the key and its context are
    /// staged for batch loading in the worker's next execution frame.
    pub async fn load(&self, key: K, key_context: C) -> Result<Option<V>, LoadError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::One(key, key_context, response_tx)))?;
        response_rx.await.map_err(|_| LoadError::Cancelled)?
    }

    /// Loads many values at once, returning them in the order requested.
    ///
    /// Returns `Ok` with `None` holes for keys the batch function did not
    /// return. The whole call fails if the batch window it joined fails.
    pub async fn load_many(&self, keyed: Vec<(K, C)>) -> Result<Vec<Option<V>>, LoadError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(LoaderOp::Load(LoadRequest::Many(keyed, response_tx)))?;
        response_rx.await.map_err(|_| LoadError::Cancelled)?
    }

    /// Adds a value to the request-scoped cache.
    pub fn prime(&self, key: K, value: V) -> Result<(), LoadError> {
        self.send(LoaderOp::Prime(key, value))
    }

    /// Adds many values to the cache at once.
    pub fn prime_many(&self, key_vals: Vec<(K, V)>) -> Result<(), LoadError> {
        self.send(LoaderOp::PrimeMany(key_vals))
    }

    /// Removes a value from the cache.
    ///
    /// The key will be reloaded when it is next requested.
    pub fn clear(&self, key: K) -> Result<(), LoadError> {
        self.send(LoaderOp::Clear(key))
    }

    /// Removes multiple values from the cache at once.
    pub fn clear_many(&self, keys: Vec<K>) -> Result<(), LoadError> {
        self.send(LoaderOp::ClearMany(keys))
    }

    /// Forces the worker to dispatch whatever batch window it has accumulated
    /// instead of waiting for its op queue to drain. Harmless when the window
    /// is empty.
    pub fn flush(&self) -> Result<(), LoadError> {
        self.send(LoaderOp::Flush)
    }

    /// Ends this loader's life: loads still pending are failed with
    /// [`LoadError::Cancelled`] and any later call fails fast with
    /// [`LoadError::ScopeEnded`]. Idempotent.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.load_task_handle.abort();
    }

    fn send(&self, op: LoaderOp<K, V, C>) -> Result<(), LoadError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LoadError::ScopeEnded);
        }
        self.request_tx.send(op).map_err(|_| LoadError::ScopeEnded)
    }
}
