use std::collections::HashMap;

use async_trait::async_trait;

use crate::{error::BatchError, scope::ScopeIdentity};

/// A `BatchFunction` defines how a [`Loader`](crate::Loader) fetches batched
/// data from a downstream resource. It is invoked exactly once per batch
/// window with the deduplicated, sorted set of keys registered during that
/// window.
///
/// Alongside the bare keys, the function receives the key context attached to
/// each key at registration time (e.g. the full entity being resolved) and the
/// identity of the owning request scope. The identity is passed explicitly
/// because the function runs on the loader's worker task, not on the task that
/// registered the keys, and nothing ambient carries it across that boundary.
///
/// The returned map's keys must be a subset of the input keys; the function is
/// free to omit keys it could not resolve. Callers of omitted keys receive
/// `Ok(None)`. Returning `Err` instead fails every caller in the window with
/// the same [`BatchError`].
///
/// Multiple batch functions (and therefore loaders) can share the same context
/// (likely through an `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    /// Shared downstream collaborator, e.g. a service handle.
    type Context;
    /// Per-key payload captured at registration. When the same key is
    /// registered more than once in a window, the context of the latest
    /// registration wins.
    type KeyContext;

    async fn load(
        keys: &[K],
        key_contexts: &HashMap<K, Self::KeyContext>,
        identity: &ScopeIdentity,
        context: &Self::Context,
    ) -> Result<HashMap<K, V>, BatchError>;
}
