use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Request-scoped value cache used by the loader worker.
///
/// The cache lives inside the worker, which lives inside its request scope, so
/// entries never outlive the request that loaded them and are never visible to
/// another request.
pub trait Cache {
    type K;
    type V;

    /// Returns the cached value (if any) for each key, in key order.
    fn lookup(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>>;

    fn insert(&mut self, key: Self::K, value: Self::V);
    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I);

    fn remove(&mut self, key: &Self::K);
    fn remove_many(&mut self, keys: &[Self::K]);
    fn clear_all(&mut self);
}

impl<K, V, S: BuildHasher> Cache for HashMap<K, V, S>
where
    K: Eq + Hash,
{
    type K = K;
    type V = V;

    fn lookup(&self, keys: &[Self::K]) -> Vec<Option<&Self::V>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    fn insert(&mut self, key: Self::K, value: Self::V) {
        self.insert(key, value);
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Self::V)>>(&mut self, key_vals: I) {
        for (key, value) in key_vals {
            self.insert(key, value);
        }
    }

    fn remove(&mut self, key: &Self::K) {
        self.remove(key);
    }

    fn remove_many(&mut self, keys: &[Self::K]) {
        for key in keys {
            self.remove(key);
        }
    }

    fn clear_all(&mut self) {
        self.clear();
    }
}
