use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use uuid::Uuid;

use crate::{batch_function::BatchFunction, loader::Loader};

/// Identity of one request scope, carried explicitly into every batch
/// function invocation.
///
/// Worker tasks do not inherit anything ambient from the task that registered
/// a key, so the user id and correlation id travel as plain values instead of
/// thread-local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeIdentity {
    user_id: Option<String>,
    correlation_id: Uuid,
}

impl ScopeIdentity {
    /// Identity for an authenticated request. The correlation id is minted
    /// fresh for the scope.
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()), correlation_id: Uuid::new_v4() }
    }

    /// Identity for a request with no user attached.
    pub fn anonymous() -> Self {
        Self { user_id: None, correlation_id: Uuid::new_v4() }
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

type LoaderInit<K, V, C> = Box<dyn FnOnce(Arc<ScopeIdentity>) -> Loader<K, V, C> + Send>;

/// The unit of isolation: one `RequestScope` exists per logical request and
/// owns at most one [`Loader`].
///
/// The loader is constructed lazily on the first [`RequestScope::loader`] call
/// and every later call returns the same instance, so all registrations made
/// while resolving one request coalesce through one batch worker. Scopes never
/// share loaders, windows, or cached values with each other; concurrent
/// requests with identical keys each dispatch their own batches.
///
/// [`RequestScope::end`] tears the loader down: loads still pending fail with
/// [`LoadError::Cancelled`](crate::LoadError::Cancelled) and registrations
/// made afterwards fail fast with
/// [`LoadError::ScopeEnded`](crate::LoadError::ScopeEnded). Dropping the scope
/// has the same effect. The request-handling layer is expected to create
/// exactly one scope per operation and end it exactly once, on success, error,
/// and cancellation paths alike.
pub struct RequestScope<K, V, C>
where
    K: 'static + Eq + Debug + Ord + Copy + std::hash::Hash + Send + Sync,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    identity: Arc<ScopeIdentity>,
    loader: OnceLock<Loader<K, V, C>>,
    init: Mutex<Option<LoaderInit<K, V, C>>>,
    ended: AtomicBool,
}

impl<K, V, C> RequestScope<K, V, C>
where
    K: 'static + Eq + Debug + Ord + Copy + std::hash::Hash + Send + Sync,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    /// Opens a scope for one logical request.
    ///
    /// Note: as with [`Loader::new`], the batch function argument is a marker
    /// for type inference.
    pub fn new<F, ContextT>(batch_function: F, context: ContextT, identity: ScopeIdentity) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, KeyContext = C, Context = ContextT> + Send,
    {
        tracing::debug!(
            correlation_id = %identity.correlation_id(),
            user_id = identity.user_id().unwrap_or("<anonymous>"),
            "request scope opened"
        );
        Self {
            identity: Arc::new(identity),
            loader: OnceLock::new(),
            init: Mutex::new(Some(Box::new(move |identity| {
                Loader::new(batch_function, context, identity)
            }))),
            ended: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &ScopeIdentity {
        &self.identity
    }

    /// Returns this scope's loader, constructing it on first use.
    ///
    /// On an ended scope the returned loader is already shut down, so any load
    /// made through it fails fast with
    /// [`LoadError::ScopeEnded`](crate::LoadError::ScopeEnded).
    pub fn loader(&self) -> &Loader<K, V, C> {
        let loader = self.loader.get_or_init(|| {
            let init = self
                .init
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
                .expect("loader initializer present until first use");
            init(Arc::clone(&self.identity))
        });
        if self.ended.load(Ordering::SeqCst) {
            loader.shutdown();
        }
        loader
    }

    /// Ends the scope. Pending loads are cancelled and later registrations
    /// fail fast with
    /// [`LoadError::ScopeEnded`](crate::LoadError::ScopeEnded). Idempotent,
    /// and implied by dropping the scope.
    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
        if let Some(loader) = self.loader.get() {
            loader.shutdown();
        }
        tracing::debug!(correlation_id = %self.identity.correlation_id(), "request scope ended");
    }
}

impl<K, V, C> Drop for RequestScope<K, V, C>
where
    K: 'static + Eq + Debug + Ord + Copy + std::hash::Hash + Send + Sync,
    V: 'static + Send + Debug + Clone,
    C: 'static + Send + Sync + Debug,
{
    fn drop(&mut self) {
        self.end();
    }
}
