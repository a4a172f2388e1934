/// Counters describing how well one loader worker batched its traffic.
///
/// Recorded inside the worker and reported through `tracing` when the worker
/// is dropped at scope end.
#[derive(Debug)]
pub struct WorkerStats {
    /// Human readable name used to identify these stats when reported.
    tag: &'static str,
    /// Number of load ops received by the worker.
    load_requests: u32,
    /// Total number of keys requested (not necessarily unique).
    keys_requested: u32,
    /// Keys answered straight from the request-scoped cache.
    cache_hits: u32,
    /// Number of batch windows dispatched.
    dispatches: u32,
    /// Largest deduplicated key set handed to the batch function.
    max_batch_unique: u32,
    /// Smallest deduplicated key set handed to the batch function.
    min_batch_unique: u32,
}

impl WorkerStats {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            load_requests: 0,
            keys_requested: 0,
            cache_hits: 0,
            dispatches: 0,
            max_batch_unique: 0,
            min_batch_unique: u32::MAX,
        }
    }

    pub fn record_request(&mut self, keys_requested: u32, cache_hits: u32) {
        self.load_requests += 1;
        self.keys_requested += keys_requested;
        self.cache_hits += cache_hits;
    }

    pub fn record_dispatch(&mut self, unique_batch_size: u32) {
        self.dispatches += 1;
        self.max_batch_unique = self.max_batch_unique.max(unique_batch_size);
        self.min_batch_unique = self.min_batch_unique.min(unique_batch_size);
    }
}

impl Drop for WorkerStats {
    fn drop(&mut self) {
        tracing::debug!(worker_stats = ?self);
    }
}
