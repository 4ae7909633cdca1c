//! Thread-safe set used to track queued, resolved and mirrored packages.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

struct Inner<T> {
    items: HashSet<T>,
    /// Snapshot handed out by `flatten`. Cleared by every mutation.
    flattened: Option<Arc<Vec<T>>>,
}

/// A set that can be shared between workers.
///
/// All operations take `&self`; clone the surrounding `Arc` to share it.
pub struct ConcurrentSet<T> {
    inner: RwLock<Inner<T>>,
}

impl<T> Default for ConcurrentSet<T>
where
    T: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConcurrentSet<T>
where
    T: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                items: HashSet::new(),
                flattened: None,
            }),
        }
    }

    /// Create a set pre-filled with `items`.
    pub fn from_items<I: IntoIterator<Item = T>>(items: I) -> Self {
        let set = Self::new();
        set.add_all(items);
        set
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner<T>> {
        // A poisoned lock still holds a consistent HashSet; keep going.
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner<T>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Add `item`. Returns true if it was not present before.
    pub fn add(&self, item: T) -> bool {
        let mut inner = self.write();
        inner.flattened = None;
        inner.items.insert(item)
    }

    pub fn add_all<I: IntoIterator<Item = T>>(&self, items: I) {
        let mut inner = self.write();
        inner.flattened = None;
        inner.items.extend(items);
    }

    /// Remove `item`. Returns true if it was present.
    pub fn remove(&self, item: &T) -> bool {
        let mut inner = self.write();
        inner.flattened = None;
        inner.items.remove(item)
    }

    pub fn exists(&self, item: &T) -> bool {
        self.read().items.contains(item)
    }

    /// Snapshot of the current members in no particular order.
    ///
    /// The snapshot is cached and shared until the next `add`/`remove`/`clear`.
    pub fn flatten(&self) -> Arc<Vec<T>> {
        if let Some(cached) = self.read().flattened.as_ref() {
            return Arc::clone(cached);
        }

        let mut inner = self.write();
        // Another caller may have filled the cache between the two locks.
        if let Some(cached) = inner.flattened.as_ref() {
            return Arc::clone(cached);
        }
        let snapshot = Arc::new(inner.items.iter().cloned().collect::<Vec<_>>());
        inner.flattened = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.flattened = None;
        inner.items.clear();
    }
}
