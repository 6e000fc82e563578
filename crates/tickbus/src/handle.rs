//! Intrusive reference-counted smart pointer into a [`Pool`](crate::pool::Pool) slot.
//!
//! A `Handle<T>` behaves like `Arc<T>` restricted to pool-owned storage:
//! cloning bumps the slot's refcount, dropping the last clone clears the
//! value and returns the slot to the free list. This is how `BookUpdate`
//! travels through the bus without copying its level arrays on every
//! publish (spec.md §9).

use std::ops::Deref;
use std::sync::Arc;

use tickbus_core::PooledEvent;

use crate::pool::PoolInner;

pub struct Handle<T: PooledEvent> {
    inner: Arc<PoolInner<T>>,
    index: usize,
}

impl<T: PooledEvent> Handle<T> {
    pub(crate) fn new(inner: Arc<PoolInner<T>>, index: usize) -> Self {
        Self { inner, index }
    }

    /// Mutable access, for the owner that just acquired the slot to
    /// fill it in before publishing. Safe to call even when other
    /// clones exist: callers publishing shared handles must finish
    /// writing before cloning for other consumers.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.value_mut(self.index)
    }
}

impl<T: PooledEvent> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner.value(self.index)
    }
}

impl<T: PooledEvent> Clone for Handle<T> {
    fn clone(&self) -> Self {
        self.inner.retain(self.index);
        Self {
            inner: self.inner.clone(),
            index: self.index,
        }
    }
}

impl<T: PooledEvent> Drop for Handle<T> {
    fn drop(&mut self) {
        self.inner.release(self.index);
    }
}
