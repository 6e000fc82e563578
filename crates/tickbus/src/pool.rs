//! Preallocated object pool feeding the bus with reusable event
//! payloads (spec.md §4.1).
//!
//! The free list is a lock-free stack of slot indices guarded by a
//! tagged `AtomicUsize` (generation counter in the upper 32 bits, slot
//! index in the lower 32 bits) to close the ABA window on the
//! compare-exchange loop — the same technique used by comparable
//! zero-allocation pools in this domain (see DESIGN.md).

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use tickbus_core::PooledEvent;

use crate::invariants::debug_assert_pool_bounded;
use crate::metrics::{PoolMetrics, PoolMetricsSnapshot};

const TAG_BITS: u32 = 32;
const INDEX_MASK: usize = 0xFFFF_FFFF;
const NIL: u32 = u32::MAX;

#[inline]
fn pack(generation: u32, index: u32) -> usize {
    ((generation as usize) << TAG_BITS) | (index as usize)
}

#[inline]
fn unpack_index(tagged: usize) -> u32 {
    (tagged & INDEX_MASK) as u32
}

#[inline]
fn unpack_generation(tagged: usize) -> u32 {
    (tagged >> TAG_BITS) as u32
}

struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
    refcount: AtomicU32,
    next_free: AtomicUsize,
}

// SAFETY: access to `value` is serialized by the free-list protocol:
// a slot is reachable from at most one of {free list, live handles} at
// a time, and live handles only ever hand out `&T`/`&mut T` consistent
// with the refcount.
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

/// A fixed-capacity pool of `T`, handed out as reference-counted
/// [`Handle`](crate::Handle)s.
pub struct Pool<T: PooledEvent> {
    inner: Arc<PoolInner<T>>,
}

pub(crate) struct PoolInner<T: PooledEvent> {
    slots: Box<[Slot<T>]>,
    free_head: AtomicUsize,
    metrics: PoolMetrics,
    on_exhausted: Option<Box<dyn Fn() + Send + Sync>>,
}

impl<T: PooledEvent + Default> Pool<T> {
    /// Preallocates `capacity` slots, each initialized with `T::default()`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_exhaustion_callback(capacity, None)
    }

    /// Like [`Self::new`], plus a callback invoked on every exhaustion
    /// (spec.md §4.1 "Failure": "Exhaustion is observable (callback +
    /// counter) but never blocks the producer").
    #[must_use]
    pub fn with_exhaustion_callback(
        capacity: usize,
        on_exhausted: Option<Box<dyn Fn() + Send + Sync>>,
    ) -> Self {
        assert!(capacity > 0, "pool capacity must be at least 1");
        assert!(capacity < NIL as usize, "pool capacity too large for tagged free list");

        let mut slots = Vec::with_capacity(capacity);
        for i in 0..capacity {
            let next = if i + 1 < capacity { i + 1 } else { usize::MAX };
            slots.push(Slot {
                value: UnsafeCell::new(MaybeUninit::new(T::default())),
                refcount: AtomicU32::new(0),
                next_free: AtomicUsize::new(next),
            });
        }

        Self {
            inner: Arc::new(PoolInner {
                slots: slots.into_boxed_slice(),
                free_head: AtomicUsize::new(pack(0, 0)),
                metrics: PoolMetrics::default(),
                on_exhausted,
            }),
        }
    }
}

impl<T: PooledEvent> Pool<T> {
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.slots.len()
    }

    #[must_use]
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        self.inner.metrics.snapshot(self.capacity())
    }

    /// Pops a free slot, calls `T::clear()`, and returns a [`Handle`]
    /// with refcount 1. Returns `None` on exhaustion without blocking
    /// the caller (spec.md §4.1).
    pub fn acquire(&self) -> Option<crate::handle::Handle<T>> {
        loop {
            let head_tagged = self.inner.free_head.load(Ordering::Acquire);
            let head_index = unpack_index(head_tagged);
            if head_index == NIL {
                self.inner.metrics.record_exhaustion();
                if let Some(cb) = &self.inner.on_exhausted {
                    cb();
                }
                tracing::warn!(target: "tickbus::pool", capacity = self.capacity(), "pool exhausted");
                return None;
            }

            let slot = &self.inner.slots[head_index as usize];
            let next = slot.next_free.load(Ordering::Relaxed);
            let new_generation = unpack_generation(head_tagged).wrapping_add(1);
            let new_tagged = pack(new_generation, unpack_index(next));

            if self
                .inner
                .free_head
                .compare_exchange_weak(head_tagged, new_tagged, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // SAFETY: this slot was just removed from the free list
                // under the CAS above, so no other thread can be
                // concurrently writing or reading it.
                unsafe {
                    (*slot.value.get()).assume_init_mut().clear();
                }
                slot.refcount.store(1, Ordering::Release);
                self.inner.metrics.record_acquire();

                let in_use = self.inner.metrics.snapshot(self.capacity()).in_use;
                debug_assert_pool_bounded!(in_use, self.capacity() as u64);

                return Some(crate::handle::Handle::new(self.inner.clone(), head_index as usize));
            }
        }
    }
}

impl<T: PooledEvent> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: PooledEvent> PoolInner<T> {
    pub(crate) fn value(&self, index: usize) -> &T {
        // SAFETY: caller (Handle) only calls this while holding a live
        // reference-counted claim on `index`.
        unsafe { (*self.slots[index].value.get()).assume_init_ref() }
    }

    pub(crate) fn value_mut(&self, index: usize) -> &mut T {
        // SAFETY: see `value`; exclusive access is the caller's
        // contract (only valid through `Handle::get_mut`, itself only
        // reachable when the handle is the sole owner).
        unsafe { (*self.slots[index].value.get()).assume_init_mut() }
    }

    pub(crate) fn retain(&self, index: usize) {
        self.slots[index].refcount.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn release(&self, index: usize) {
        let slot = &self.slots[index];
        if slot.refcount.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }

        // We brought the count to zero: run clear() and push the slot
        // back onto the free list.
        unsafe {
            (*slot.value.get()).assume_init_mut().clear();
        }
        self.metrics.record_release();

        loop {
            let head_tagged = self.free_head.load(Ordering::Acquire);
            slot.next_free.store(head_tagged, Ordering::Relaxed);
            let new_generation = unpack_generation(head_tagged).wrapping_add(1);
            let new_tagged = pack(new_generation, index as u32);
            if self
                .free_head
                .compare_exchange_weak(head_tagged, new_tagged, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        value: u64,
        clears: u64,
    }

    impl PooledEvent for Counter {
        fn clear(&mut self) {
            self.clears += 1;
            self.value = 0;
        }
    }

    #[test]
    fn acquire_release_restores_in_use() {
        let pool: Pool<Counter> = Pool::new(4);
        assert_eq!(pool.metrics().in_use, 0);

        let h = pool.acquire().unwrap();
        assert_eq!(pool.metrics().in_use, 1);
        drop(h);
        assert_eq!(pool.metrics().in_use, 0);
    }

    #[test]
    fn exhaustion_returns_none_and_fires_callback() {
        use std::sync::atomic::AtomicUsize;
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        let pool: Pool<Counter> = Pool::with_exhaustion_callback(
            2,
            Some(Box::new(move || {
                fired2.fetch_add(1, Ordering::SeqCst);
            })),
        );

        let h1 = pool.acquire().unwrap();
        let h2 = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(h1);
        drop(h2);
        assert_eq!(pool.metrics().in_use, 0);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn clear_runs_on_acquire_not_just_release() {
        let pool: Pool<Counter> = Pool::new(1);
        {
            let mut h = pool.acquire().unwrap();
            h.get_mut().value = 42;
        }
        let h2 = pool.acquire().unwrap();
        assert_eq!(h2.value, 0);
    }

    #[test]
    fn clone_bumps_refcount_drop_decrements() {
        let pool: Pool<Counter> = Pool::new(2);
        let h1 = pool.acquire().unwrap();
        let h2 = h1.clone();
        assert_eq!(pool.metrics().in_use, 1);
        drop(h1);
        assert_eq!(pool.metrics().in_use, 1);
        drop(h2);
        assert_eq!(pool.metrics().in_use, 0);
    }
}
