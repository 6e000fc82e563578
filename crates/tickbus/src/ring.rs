//! Single-producer, multi-consumer ring buffer.
//!
//! This differs from the teacher's [`Ring`] (`ringmpsc::ring::Ring`) in one
//! essential way: `ringmpsc` is SPSC with destructive reads (the single
//! consumer moves each item out via `assume_init_read`). Here, every
//! registered consumer independently reads every published slot, so a
//! slot cannot be moved out — it is cloned out instead, and is only
//! eligible for overwrite once the slowest live consumer's cursor has
//! passed it. For `Copy` payloads the clone is a bitwise copy; for
//! [`crate::handle::Handle`] payloads it is a refcount bump, so this
//! stays allocation-free on the hot path either way.
//!
//! Sequence numbers are unbounded `u64`s, same rationale as the teacher
//! (wraparound is a non-issue at any realistic publish rate); the ring
//! index is `sequence & mask`.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::backoff::Backoff;
use crate::config::{BusConfig, OverflowPolicy};
use crate::invariants::{debug_assert_bus_bounded_lag, debug_assert_monotonic};
use crate::metrics::{BusMetrics, BusMetricsSnapshot};

#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}

struct Slot<T> {
    value: UnsafeCell<MaybeUninit<T>>,
}

// SAFETY: a slot is only ever touched by the producer (between the gate
// check and the tail store) or by a consumer that has observed the
// corresponding tail via an Acquire load — never both at once.
unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

struct ConsumerCursor {
    seq: CacheAligned<AtomicU64>,
    max_lag: Option<u64>,
    overflow_policy: OverflowPolicy,
    disconnected: AtomicBool,
}

/// A registration token returned by [`RingBus::subscribe`]. Dropping it
/// does not unsubscribe; call [`RingBus::unsubscribe`] explicitly (a
/// worker thread owns one of these for its lifetime).
pub struct Subscription {
    cursor: Arc<ConsumerCursor>,
    id: usize,
}

impl Subscription {
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.cursor.disconnected.load(Ordering::Acquire)
    }
}

struct RingInner<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    capacity: u64,
    tail: CacheAligned<AtomicU64>,
    cursors: RwLock<Vec<Option<Arc<ConsumerCursor>>>>,
    metrics: BusMetrics,
    config: BusConfig,
    closed: AtomicBool,
}

/// A bounded SPMC ring of `T`. Cheap to clone (shares the underlying
/// allocation); clone it to hand the producer side to one thread and
/// keep subscriber management on another.
pub struct RingBus<T: Clone + Send> {
    inner: Arc<RingInner<T>>,
}

impl<T: Clone + Send> RingBus<T> {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        let capacity = config.capacity;
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            value: UnsafeCell::new(MaybeUninit::uninit()),
        });

        Self {
            inner: Arc::new(RingInner {
                slots: slots.into_boxed_slice(),
                mask: config.mask(),
                capacity: capacity as u64,
                tail: CacheAligned::new(AtomicU64::new(0)),
                cursors: RwLock::new(Vec::new()),
                metrics: BusMetrics::default(),
                config,
                closed: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity as usize
    }

    #[must_use]
    pub fn config(&self) -> BusConfig {
        self.inner.config
    }

    #[must_use]
    pub fn metrics(&self) -> BusMetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Registers a new consumer starting from the current tail (it will
    /// not see events published before this call — spec.md §4.2
    /// "late-joining consumers start from the current tail, not from
    /// index 0").
    pub fn subscribe(&self, max_lag: Option<u64>, overflow_policy: OverflowPolicy) -> Subscription {
        let start = self.inner.tail.load(Ordering::Acquire);
        let cursor = Arc::new(ConsumerCursor {
            seq: CacheAligned::new(AtomicU64::new(start)),
            max_lag,
            overflow_policy,
            disconnected: AtomicBool::new(false),
        });

        let mut cursors = self.inner.cursors.write().expect("cursor lock poisoned");
        let id = if let Some(slot) = cursors.iter().position(Option::is_none) {
            cursors[slot] = Some(cursor.clone());
            slot
        } else {
            cursors.push(Some(cursor.clone()));
            cursors.len() - 1
        };

        Subscription { cursor, id }
    }

    /// Removes a consumer from gating; the producer stops waiting on it
    /// immediately.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        let mut cursors = self.inner.cursors.write().expect("cursor lock poisoned");
        if let Some(slot) = cursors.get_mut(subscription.id) {
            *slot = None;
        }
    }

    /// Publishes one value, blocking (per the bus's configured wait
    /// strategy) until the slowest live consumer has made room. Returns
    /// `false` only if the bus is closed while waiting.
    pub fn publish(&self, value: T) -> bool {
        let mut backoff = Backoff::for_strategy(self.inner.config.wait_strategy);
        let tail = self.inner.tail.load(Ordering::Relaxed);

        loop {
            let min_seq = self.gate_min_sequence(tail);
            let lag = tail.wrapping_sub(min_seq);
            debug_assert_bus_bounded_lag!(lag, self.inner.capacity);

            if lag < self.inner.capacity {
                break;
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return false;
            }
            self.inner.metrics.record_gate_spin();
            backoff.snooze();
        }

        let idx = (tail as usize) & self.inner.mask;
        let slot = &self.inner.slots[idx];

        if tail >= self.inner.capacity {
            // SAFETY: gating above guarantees every live consumer has
            // already advanced past this slot's previous occupant.
            unsafe {
                ptr::drop_in_place((*slot.value.get()).as_mut_ptr());
            }
        }
        // SAFETY: no consumer reads index `idx` until `tail` is published below.
        unsafe {
            (*slot.value.get()).write(value);
        }

        let new_tail = tail.wrapping_add(1);
        debug_assert_monotonic!("ring tail", tail, new_tail);
        self.inner.tail.store(new_tail, Ordering::Release);
        self.inner.metrics.record_publish();
        true
    }

    /// Computes the minimum sequence across live consumers, applying
    /// each consumer's overflow policy if it has fallen behind by more
    /// than its configured `max_lag` (spec.md §4.2 "Backpressure"). A
    /// consumer that gets dropped or disconnected here no longer gates
    /// the producer.
    fn gate_min_sequence(&self, tail: u64) -> u64 {
        let cursors = self.inner.cursors.read().expect("cursor lock poisoned");
        let mut min_seq = tail;
        let mut any_live = false;

        for cursor in cursors.iter().flatten() {
            if cursor.disconnected.load(Ordering::Acquire) {
                continue;
            }

            let mut seq = cursor.seq.load(Ordering::Acquire);
            if let Some(max_lag) = cursor.max_lag {
                let lag = tail.wrapping_sub(seq);
                if lag > max_lag {
                    match cursor.overflow_policy {
                        OverflowPolicy::DropOldest => {
                            let caught_up = tail.saturating_sub(self.inner.capacity - 1);
                            cursor.seq.store(caught_up, Ordering::Release);
                            self.inner.metrics.record_dropped_oldest();
                            seq = caught_up;
                        }
                        OverflowPolicy::Disconnect => {
                            cursor.disconnected.store(true, Ordering::Release);
                            self.inner.metrics.record_disconnect();
                            continue;
                        }
                        OverflowPolicy::Fatal => {
                            panic!("consumer exceeded max_lag {max_lag} with fatal overflow policy");
                        }
                    }
                }
            }

            any_live = true;
            min_seq = min_seq.min(seq);
        }

        if any_live {
            min_seq
        } else {
            tail
        }
    }

    /// Attempts to read the next event for `subscription`. Returns
    /// `None` if the consumer has caught up to the producer.
    pub fn poll(&self, subscription: &Subscription) -> Option<T> {
        let cursor = &subscription.cursor;
        let seq = cursor.seq.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if seq >= tail {
            return None;
        }

        let idx = (seq as usize) & self.inner.mask;
        let slot = &self.inner.slots[idx];
        // SAFETY: `seq < tail` means this slot's current occupant was
        // published via the Release store observed by the Acquire load
        // above, and producer gating guarantees it has not yet been
        // overwritten (we have not advanced past it ourselves, and the
        // producer will not race ahead of the capacity window).
        let value = unsafe { (*slot.value.get()).assume_init_ref().clone() };
        cursor.seq.store(seq.wrapping_add(1), Ordering::Release);
        self.inner.metrics.record_consume(1);
        Some(value)
    }

    /// Blocks (via the configured [`crate::config::WaitStrategy`],
    /// approximated here by escalating backoff) until an event is
    /// available or the bus closes.
    pub fn poll_blocking(&self, subscription: &Subscription) -> Option<T> {
        let mut backoff = Backoff::for_strategy(self.inner.config.wait_strategy);
        loop {
            if let Some(v) = self.poll(subscription) {
                return Some(v);
            }
            if self.inner.closed.load(Ordering::Acquire) {
                return self.poll(subscription);
            }
            if subscription.is_disconnected() {
                return None;
            }
            backoff.snooze();
        }
    }
}

impl<T: Clone + Send> Clone for RingBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Drop for RingInner<T> {
    fn drop(&mut self) {
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.min(self.capacity);
        let start = tail.saturating_sub(count);

        for offset in 0..count {
            let idx = ((start.wrapping_add(offset)) as usize) & self.mask;
            // SAFETY: every slot in `[start, tail)` was written by `publish`
            // and never moved out of (reads clone, they don't consume).
            unsafe {
                ptr::drop_in_place((*self.slots[idx].value.get()).as_mut_ptr());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;

    #[test]
    fn publish_then_poll_single_consumer() {
        let bus: RingBus<u64> = RingBus::new(BusConfig::new(8, 4));
        let sub = bus.subscribe(None, OverflowPolicy::Disconnect);

        assert!(bus.publish(42));
        assert_eq!(bus.poll(&sub), Some(42));
        assert_eq!(bus.poll(&sub), None);
    }

    #[test]
    fn two_consumers_each_see_every_event() {
        let bus: RingBus<u64> = RingBus::new(BusConfig::new(8, 4));
        let sub_a = bus.subscribe(None, OverflowPolicy::Disconnect);
        let sub_b = bus.subscribe(None, OverflowPolicy::Disconnect);

        for i in 0..5u64 {
            assert!(bus.publish(i));
        }

        let a: Vec<_> = std::iter::from_fn(|| bus.poll(&sub_a)).collect();
        let b: Vec<_> = std::iter::from_fn(|| bus.poll(&sub_b)).collect();
        assert_eq!(a, vec![0, 1, 2, 3, 4]);
        assert_eq!(b, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn late_subscriber_starts_from_current_tail() {
        let bus: RingBus<u64> = RingBus::new(BusConfig::new(8, 4));
        assert!(bus.publish(1));
        assert!(bus.publish(2));

        let late = bus.subscribe(None, OverflowPolicy::Disconnect);
        assert!(bus.publish(3));

        let seen: Vec<_> = std::iter::from_fn(|| bus.poll(&late)).collect();
        assert_eq!(seen, vec![3]);
    }

    #[test]
    fn drop_oldest_policy_catches_up_instead_of_gating_producer() {
        let bus: RingBus<u64> = RingBus::new(BusConfig::new(4, 4));
        let slow = bus.subscribe(Some(1), OverflowPolicy::DropOldest);

        for i in 0..10u64 {
            assert!(bus.publish(i));
        }

        // The slow consumer should have been fast-forwarded rather than
        // having blocked every publish above.
        let seen: Vec<_> = std::iter::from_fn(|| bus.poll(&slow)).collect();
        assert!(!seen.is_empty());
        assert_eq!(*seen.last().unwrap(), 9);
        assert!(bus.metrics().dropped_oldest > 0);
    }

    #[test]
    fn unsubscribed_consumer_no_longer_gates() {
        let bus: RingBus<u64> = RingBus::new(BusConfig::new(4, 4));
        let sub = bus.subscribe(None, OverflowPolicy::Disconnect);
        bus.unsubscribe(&sub);

        for i in 0..20u64 {
            assert!(bus.publish(i));
        }
    }
}
