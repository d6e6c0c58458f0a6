//! # Record Store
//!
//! Thread-safe, cloneable in-memory map used as the persistence of record
//! for rulepacks and regression runs.
//!
//! All operations are synchronous (`parking_lot`, not `tokio::sync`): the
//! lock is never held across an `.await`. [`RecordStore::transact`] runs a
//! closure over the whole map under one write lock, which is how
//! multi-record transitions such as "deprecate siblings and activate target"
//! are made indivisible for every reader.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared keyed store of cloneable records.
#[derive(Debug)]
pub struct RecordStore<K, V> {
    data: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for RecordStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<K, V> Default for RecordStore<K, V> {
    fn default() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> RecordStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.data.write().insert(key, value)
    }

    /// Retrieve a record by key.
    pub fn get(&self, key: &K) -> Option<V> {
        self.data.read().get(key).cloned()
    }

    /// List all records that satisfy `pred`.
    pub fn filter(&self, pred: impl Fn(&V) -> bool) -> Vec<V> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// List all records.
    pub fn list(&self) -> Vec<V> {
        self.data.read().values().cloned().collect()
    }

    /// Update a record in place. Returns the updated record, or `None` if not found.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> Option<V> {
        let mut guard = self.data.write();
        let entry = guard.get_mut(key)?;
        f(entry);
        Some(entry.clone())
    }

    /// Atomically read-validate-update one record.
    ///
    /// Returns `None` if the record doesn't exist, otherwise the closure's
    /// result. The whole closure runs under a single write lock.
    pub fn try_update<R, E>(
        &self,
        key: &K,
        f: impl FnOnce(&mut V) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(key).map(f)
    }

    /// Run `f` over the whole map under a single write lock.
    pub fn transact<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        f(&mut self.data.write())
    }

    /// Run `f` over the whole map under a single read lock.
    pub fn read<R>(&self, f: impl FnOnce(&HashMap<K, V>) -> R) -> R {
        f(&self.data.read())
    }

    /// Remove a record by key.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.write().remove(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_data() {
        let a: RecordStore<u32, String> = RecordStore::new();
        let b = a.clone();
        a.insert(1, "one".into());
        assert_eq!(b.get(&1).as_deref(), Some("one"));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn try_update_missing_is_none() {
        let s: RecordStore<u32, u32> = RecordStore::new();
        assert!(s.try_update(&1, |v| Ok::<_, ()>(*v)).is_none());
    }

    #[test]
    fn try_update_error_leaves_value() {
        let s: RecordStore<u32, u32> = RecordStore::new();
        s.insert(1, 10);
        let r = s.try_update(&1, |v| if *v > 5 { Err("too big") } else { Ok(()) });
        assert_eq!(r, Some(Err("too big")));
        assert_eq!(s.get(&1), Some(10));
    }

    #[test]
    fn transact_sees_and_mutates_all() {
        let s: RecordStore<u32, u32> = RecordStore::new();
        s.insert(1, 1);
        s.insert(2, 2);
        let total = s.transact(|map| {
            for v in map.values_mut() {
                *v *= 10;
            }
            map.values().sum::<u32>()
        });
        assert_eq!(total, 30);
        assert_eq!(s.filter(|v| *v > 15), vec![20]);
    }

    #[test]
    fn remove_and_is_empty() {
        let s: RecordStore<u32, u32> = RecordStore::new();
        s.insert(7, 7);
        assert_eq!(s.remove(&7), Some(7));
        assert!(s.is_empty());
    }
}
