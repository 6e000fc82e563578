//! The subscriber-facing bus: wraps a [`RingBus`] with worker-thread
//! management, mirroring the shape of `ringmpsc::Channel` (the teacher's
//! multi-ring front end) but SPMC instead of MPSC.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tickbus_core::{Lifecycle, Subscriber, WorkerAffinity};

use crate::affinity;
use crate::config::{BusConfig, OverflowPolicy};
use crate::dispatch::Dispatch;
use crate::metrics::BusMetricsSnapshot;
use crate::ring::RingBus;

/// A running worker: owns the join handle and a flag the bus flips to
/// ask it to stop after draining what's already published.
struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// A subscriber registered before [`Lifecycle::start`] has spawned its
/// worker yet. Held until `start()` turns every pending registration
/// into a running worker thread.
struct PendingSubscription {
    subscriber: Box<dyn Subscriber>,
    max_lag: Option<u64>,
    overflow_policy: OverflowPolicy,
    worker_affinity: Option<WorkerAffinity>,
}

/// A bus carrying one concrete event type `T` from a single producer to
/// any number of subscriber worker threads.
///
/// Subscribers register with [`Self::subscribe`] before [`Lifecycle::start`]
/// runs; `start()` spawns one worker thread per registered subscriber, and
/// any `subscribe()` call made afterward is rejected (spec.md §3/§4.2
/// "subscribers registered before start(); rejects registration after start()").
pub struct Bus<T: Dispatch + Clone + Send + 'static> {
    ring: RingBus<T>,
    workers: Mutex<Vec<Worker>>,
    pending: Mutex<Vec<PendingSubscription>>,
    started: AtomicBool,
}

impl<T: Dispatch + Clone + Send + 'static> Bus<T> {
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            ring: RingBus::new(config),
            workers: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> BusMetricsSnapshot {
        self.ring.metrics()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Publishes an event to every live subscriber. See
    /// [`RingBus::publish`] for the backpressure contract.
    pub fn publish(&self, value: T) -> bool {
        self.ring.publish(value)
    }

    /// Registers a subscriber. Before [`Lifecycle::start`] has run, this
    /// only records the registration; `start()` spawns the worker thread.
    /// Once the bus has started, registration is rejected (spec.md §7
    /// "LateSubscription").
    ///
    /// `max_lag`, `overflow_policy` and `worker_affinity` override the
    /// bus's [`BusConfig`] defaults for this one subscriber; pass `None`
    /// to fall back to whatever the bus was configured with.
    pub fn subscribe(
        &self,
        subscriber: Box<dyn Subscriber>,
        max_lag: Option<u64>,
        overflow_policy: Option<OverflowPolicy>,
        worker_affinity: Option<WorkerAffinity>,
    ) -> Result<(), tickbus_core::CoreError> {
        if self.started.load(Ordering::Acquire) {
            return Err(tickbus_core::CoreError::LateSubscription(subscriber.id()));
        }

        let config = self.ring.config();
        self.pending.lock().expect("pending lock poisoned").push(PendingSubscription {
            subscriber,
            max_lag: max_lag.or(config.max_lag),
            overflow_policy: overflow_policy.unwrap_or(config.overflow_policy),
            worker_affinity: worker_affinity.or(config.subscriber_affinity),
        });
        Ok(())
    }

    /// Drains using the bus's configured [`BusConfig::drain_timeout_ms`]
    /// rather than an explicit deadline. See [`Lifecycle::drain`].
    pub fn drain_default(&mut self) -> bool {
        let timeout_ms = self.ring.config().drain_timeout_ms;
        Lifecycle::drain(self, timeout_ms)
    }

    fn spawn_worker(&self, pending: PendingSubscription) {
        let PendingSubscription {
            mut subscriber,
            max_lag,
            overflow_policy,
            worker_affinity,
        } = pending;

        let subscription = self.ring.subscribe(max_lag, overflow_policy);
        let ring = self.ring.clone();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = stop.clone();
        let subscriber_id = subscriber.id();

        let handle = std::thread::Builder::new()
            .name(format!("tickbus-sub-{}", subscriber_id.0))
            .spawn(move || {
                if let Some(affinity) = worker_affinity {
                    affinity::apply(affinity);
                }
                loop {
                    match ring.poll(&subscription) {
                        Some(event) => event.dispatch_to(subscriber.as_mut()),
                        None => {
                            if stop_for_thread.load(Ordering::Acquire) || subscription.is_disconnected() {
                                break;
                            }
                            std::thread::yield_now();
                        }
                    }
                }
            })
            .expect("failed to spawn subscriber worker thread");

        self.workers.lock().expect("workers lock poisoned").push(Worker { stop, handle });
    }
}

impl<T: Dispatch + Clone + Send + 'static> Lifecycle for Bus<T> {
    /// Spawns one worker thread per subscriber registered so far via
    /// [`Bus::subscribe`] and closes registration (spec.md §3 "After
    /// start(), the bus spawns one worker per subscriber"). Idempotent:
    /// calling it again spawns no new workers.
    fn start(&mut self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }
        let pending = std::mem::take(&mut *self.pending.lock().expect("pending lock poisoned"));
        for p in pending {
            self.spawn_worker(p);
        }
    }

    fn stop(&mut self) {
        self.ring.close();
        let workers = self.workers.lock().expect("workers lock poisoned");
        for worker in workers.iter() {
            worker.stop.store(true, Ordering::Release);
        }
    }

    fn drain(&mut self, timeout_ms: u64) -> bool {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut workers = self.workers.lock().expect("workers lock poisoned");
        let mut clean = true;

        for worker in workers.drain(..) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                clean = false;
                // Can't forcibly kill a thread; detach it and move on.
                drop(worker.handle);
                continue;
            }
            // `JoinHandle` has no timed join; poll the stop-completion by
            // joining directly since workers are expected to be cooperative.
            if worker.handle.join().is_err() {
                clean = false;
            }
        }

        clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use tickbus_core::{OrderEvent, OrderEventKind, Price, Quantity, SubscriberId, SymbolId};

    struct CountingSubscriber {
        count: Arc<AtomicU32>,
    }

    impl Subscriber for CountingSubscriber {
        fn id(&self) -> SubscriberId {
            SubscriberId(1)
        }

        fn on_order_event(&mut self, _event: &OrderEvent) {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn published_events_reach_subscriber_thread() {
        let mut bus: Bus<OrderEvent> = Bus::new(BusConfig::new(64, 4));
        let count = Arc::new(AtomicU32::new(0));

        bus.subscribe(
            Box::new(CountingSubscriber { count: count.clone() }),
            None,
            Some(OverflowPolicy::Disconnect),
            None,
        )
        .unwrap();
        bus.start();

        let event = OrderEvent {
            kind: OrderEventKind::Accepted,
            symbol: SymbolId::placeholder(),
            order_id: 1,
            price: Price::ZERO,
            qty: Quantity::ZERO,
            filled_qty: Quantity::ZERO,
            ts_ns: 0,
        };

        for _ in 0..10 {
            bus.publish(event);
        }

        let deadline = Instant::now() + Duration::from_secs(1);
        while count.load(Ordering::Relaxed) < 10 && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_eq!(count.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn subscribe_after_start_is_rejected() {
        let mut bus: Bus<OrderEvent> = Bus::new(BusConfig::new(64, 4));
        bus.start();

        let count = Arc::new(AtomicU32::new(0));
        let err = bus
            .subscribe(
                Box::new(CountingSubscriber { count }),
                None,
                Some(OverflowPolicy::Disconnect),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, tickbus_core::CoreError::LateSubscription(_)));
    }

    #[test]
    fn start_is_idempotent_and_does_not_respawn_workers() {
        let mut bus: Bus<OrderEvent> = Bus::new(BusConfig::new(64, 4));
        bus.subscribe(
            Box::new(CountingSubscriber { count: Arc::new(AtomicU32::new(0)) }),
            None,
            Some(OverflowPolicy::Disconnect),
            None,
        )
        .unwrap();
        bus.start();
        bus.start();
        assert_eq!(bus.workers.lock().unwrap().len(), 1);
    }

    /// spec.md §8 scenario 4 ("Pool + bus backpressure"): a pool-backed
    /// bus whose one consumer stops consuming after its 2nd event must
    /// stall the producer once the ring fills, and release it once the
    /// consumer resumes. `EVENTS` is chosen well above the ring's
    /// capacity so the stall is observed regardless of exactly which
    /// publish call the ring gate catches it on.
    #[test]
    fn slow_consumer_stalls_pool_backed_publisher_until_released() {
        use crate::handle::Handle;
        use crate::pool::Pool;
        use std::sync::Condvar;
        use tickbus_core::BookUpdate;

        const EVENTS: u32 = 10;

        struct SlowSubscriber {
            processed: Arc<AtomicU32>,
            release: Arc<(Mutex<bool>, Condvar)>,
        }

        impl Subscriber for SlowSubscriber {
            fn id(&self) -> SubscriberId {
                SubscriberId(9)
            }

            fn on_book_update(&mut self, _update: &BookUpdate) {
                let n = self.processed.fetch_add(1, Ordering::AcqRel) + 1;
                if n == 2 {
                    let (lock, cvar) = &*self.release;
                    let mut released = lock.lock().expect("release lock poisoned");
                    while !*released {
                        released = cvar.wait(released).expect("release lock poisoned");
                    }
                }
            }
        }

        let pool: Pool<BookUpdate> = Pool::new(8);
        let mut bus: Bus<Handle<BookUpdate>> = Bus::new(BusConfig::new(4, 4));

        let processed = Arc::new(AtomicU32::new(0));
        let release = Arc::new((Mutex::new(false), Condvar::new()));

        bus.subscribe(
            Box::new(SlowSubscriber {
                processed: processed.clone(),
                release: release.clone(),
            }),
            None,
            Some(OverflowPolicy::Disconnect),
            None,
        )
        .unwrap();
        bus.start();

        let published = Arc::new(AtomicU32::new(0));
        let producer_bus = Arc::new(bus);
        let producer_pool = pool.clone();
        let producer_published = published.clone();
        let producer = std::thread::spawn(move || {
            for _ in 0..EVENTS {
                let handle = producer_pool.acquire().expect("pool exhausted");
                producer_bus.publish(handle);
                producer_published.fetch_add(1, Ordering::Release);
            }
        });

        // Give the producer ample time to publish everything it can
        // without the slow consumer ever unblocking it.
        std::thread::sleep(Duration::from_millis(200));
        assert!(
            published.load(Ordering::Acquire) < EVENTS,
            "producer should have stalled on the full ring before publishing all {EVENTS} events"
        );
        assert_eq!(processed.load(Ordering::Acquire), 2);

        {
            let (lock, cvar) = &*release;
            *lock.lock().expect("release lock poisoned") = true;
            cvar.notify_all();
        }

        producer.join().expect("producer thread panicked");
        assert_eq!(published.load(Ordering::Acquire), EVENTS);
    }
}
