//! Versioned copy-on-write value holder.

use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// One immutable published state of a [`TrackedValue`].
#[derive(Debug)]
pub struct Snapshot<T> {
    value: T,
    version: u64,
    dirty: bool,
}

impl<T> Snapshot<T> {
    /// The value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Incremented by every publish. Starts at 0.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True until the snapshot is confirmed as persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl<T> Deref for Snapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Holder of the current snapshot of a shared value.
///
/// Readers clone an `Arc` to the current snapshot and never observe a
/// half-applied change. Writers are serialized by one update lock, so an
/// `update` closure always sees the latest published value.
#[derive(Debug)]
pub struct TrackedValue<T> {
    current: RwLock<Arc<Snapshot<T>>>,
    update_lock: Mutex<()>,
}

impl<T> TrackedValue<T> {
    /// Start at version 0, not dirty.
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot {
                value,
                version: 0,
                dirty: false,
            })),
            update_lock: Mutex::new(()),
        }
    }

    /// The latest published snapshot.
    pub fn current(&self) -> Arc<Snapshot<T>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the value. Returns the new version.
    pub fn publish(&self, value: T) -> u64 {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let version = self.current().version + 1;
        self.store(value, version, true);
        version
    }

    /// Derive the next value from the current one. Returns the new version.
    pub fn update<F>(&self, f: F) -> u64
    where
        F: FnOnce(&T) -> T,
    {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current();
        let version = current.version + 1;
        self.store(f(&current.value), version, true);
        version
    }

    fn store(&self, value: T, version: u64, dirty: bool) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(Snapshot {
            value,
            version,
            dirty,
        });
    }
}

impl<T: Clone> TrackedValue<T> {
    /// Clear the dirty flag of the current snapshot, keeping its version.
    ///
    /// Returns false if there was nothing to confirm.
    pub fn confirm(&self) -> bool {
        let _guard = self.update_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current();
        if !current.dirty {
            return false;
        }
        self.store(current.value.clone(), current.version, false);
        true
    }
}

impl<T: Default> Default for TrackedValue<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
