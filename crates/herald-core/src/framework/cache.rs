//! Lazily populated adapter cache.
//!
//! [`WrapperCache`] maps a [`TypeKey`] to a shared value built on first use.
//! Lookups after the first are a read-locked hash probe. Construction is
//! serialized per cache through an upgradable read lock, so a key's factory
//! runs exactly once no matter how many callers race on first access, while
//! lookups of already built keys proceed in parallel.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::foundation::TypeKey;

/// A thread-safe, insert-only map from [`TypeKey`] to `Arc<V>`.
///
/// Entries are never evicted. A factory that fails leaves the cache
/// untouched, so a later caller retries construction.
pub struct WrapperCache<V: ?Sized> {
    entries: RwLock<HashMap<TypeKey, Arc<V>>>,
}

impl<V: ?Sized> WrapperCache<V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the entry for `key` if it has been built.
    pub fn get(&self, key: &TypeKey) -> Option<Arc<V>> {
        self.entries.read().get(key).cloned()
    }

    /// Returns `true` if `key` has been built.
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of built entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing has been built yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns the entry for `key`, building it with `factory` on first use.
    ///
    /// The factory runs while this cache's construction lock is held. It
    /// must not call back into the same cache.
    pub fn get_or_try_insert_with<E, F>(&self, key: TypeKey, factory: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<Arc<V>, E>,
    {
        if let Some(existing) = self.get(&key) {
            return Ok(existing);
        }

        let guard = self.entries.upgradable_read();
        if let Some(existing) = guard.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let value = factory()?;
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        guard.insert(key, Arc::clone(&value));
        Ok(value)
    }

    /// Infallible form of [`get_or_try_insert_with`](Self::get_or_try_insert_with).
    pub fn get_or_insert_with<F>(&self, key: TypeKey, factory: F) -> Arc<V>
    where
        F: FnOnce() -> Arc<V>,
    {
        match self.get_or_try_insert_with(key, || Ok::<_, std::convert::Infallible>(factory())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }
}

impl<V: ?Sized> Default for WrapperCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ?Sized> fmt::Debug for WrapperCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.read();
        f.debug_set().entries(entries.keys()).finish()
    }
}
