//! Bounded object pool.
//!
//! A fixed arena of pre-built objects plus a free-index stack. `acquire`
//! pops an index and moves the object out into a [`PoolSlot`] guard;
//! dropping (or releasing) the guard moves it back and pushes the index.
//! Objects are reused as-is, so a `Vec<u8>` keeps its capacity across uses.
//!
//! The lock is held only across the index-stack update, never while the
//! slot is in use.
//!
//! # Example
//!
//! ```
//! use btp_link::pool::ObjectPool;
//!
//! let pool: ObjectPool<Vec<u8>> = ObjectPool::new(2);
//!
//! let mut slot = pool.acquire().unwrap();
//! slot.extend_from_slice(b"frame");
//! assert_eq!(pool.available(), 1);
//!
//! slot.release();
//! assert_eq!(pool.available(), 2);
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct Arena<T> {
    items: Vec<Option<T>>,
    free: Vec<usize>,
}

/// Fixed-capacity pool handing out [`PoolSlot`] guards.
///
/// Cloning is cheap and shares the same arena.
pub struct ObjectPool<T> {
    arena: Arc<Mutex<Arena<T>>>,
    capacity: usize,
}

impl<T> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T: Default> ObjectPool<T> {
    /// Create a pool of `capacity` default-constructed objects.
    pub fn new(capacity: usize) -> Self {
        Self::with_init(capacity, T::default)
    }
}

impl<T> ObjectPool<T> {
    /// Create a pool of `capacity` objects built by `init`.
    pub fn with_init(capacity: usize, mut init: impl FnMut() -> T) -> Self {
        let items = (0..capacity).map(|_| Some(init())).collect();
        // popped from the back, so slot 0 goes out first
        let free = (0..capacity).rev().collect();

        Self {
            arena: Arc::new(Mutex::new(Arena { items, free })),
            capacity,
        }
    }

    /// Take a free slot, or `None` when every slot is in use.
    ///
    /// Never blocks beyond the index-stack update and never allocates.
    pub fn acquire(&self) -> Option<PoolSlot<T>> {
        let mut arena = self.lock();
        let index = arena.free.pop()?;
        let value = arena.items[index].take();

        Some(PoolSlot {
            arena: self.arena.clone(),
            index,
            value,
        })
    }

    /// Number of free slots.
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    /// Total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Arena<T>> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// Exclusive handle to one pool object. Returns to the pool on drop.
pub struct PoolSlot<T> {
    arena: Arc<Mutex<Arena<T>>>,
    index: usize,
    value: Option<T>,
}

impl<T> PoolSlot<T> {
    /// Arena index of this slot.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Return the slot to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for PoolSlot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => unreachable!("pool slot value is present until drop"),
        }
    }
}

impl<T> DerefMut for PoolSlot<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.value {
            Some(value) => value,
            None => unreachable!("pool slot value is present until drop"),
        }
    }
}

impl<T> Drop for PoolSlot<T> {
    fn drop(&mut self) {
        let mut arena = self.arena.lock().unwrap_or_else(PoisonError::into_inner);
        arena.items[self.index] = self.value.take();
        arena.free.push(self.index);
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSlot")
            .field("index", &self.index)
            .field("value", &self.value)
            .finish()
    }
}
