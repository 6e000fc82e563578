//! Configuration for the pool and the ring bus, in the teacher's style
//! (`ringmpsc::Config`: plain data, `const fn new()` with `assert!`
//! guards, a `Default` impl, and named presets).
//!
//! Field defaults mirror the recognized options table in spec.md §6.

use tickbus_core::WorkerAffinity;

/// What a consumer does when its configured maximum lag is exceeded
/// (spec.md §4.2 "Backpressure", §7 "SubscriberOverflow").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the oldest unconsumed event and keep going.
    DropOldest,
    /// Unsubscribe the consumer; its worker thread exits.
    Disconnect,
    /// Treat as unrecoverable: the worker thread panics.
    Fatal,
}

/// Busy-spin vs. yield vs. park vs. the escalating hybrid of all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    BusySpin,
    Yield,
    Park,
    Hybrid,
}

/// Ring bus configuration.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Ring capacity; must be a power of two (spec.md §4.2).
    pub capacity: usize,
    pub max_consumers: usize,
    pub wait_strategy: WaitStrategy,
    pub drain_timeout_ms: u64,
    /// Per-consumer overflow policy applied when `max_lag` is set and
    /// exceeded. `None` disables the lag check entirely (only global
    /// ring gating applies).
    pub max_lag: Option<u64>,
    pub overflow_policy: OverflowPolicy,
    pub subscriber_affinity: Option<WorkerAffinity>,
}

impl BusConfig {
    /// # Panics
    /// Panics if `capacity` is zero or not a power of two, or if
    /// `max_consumers` is zero.
    #[must_use]
    pub const fn new(capacity: usize, max_consumers: usize) -> Self {
        assert!(capacity > 0 && capacity.is_power_of_two(), "capacity must be a power of two");
        assert!(max_consumers > 0, "max_consumers must be at least 1");
        Self {
            capacity,
            max_consumers,
            wait_strategy: WaitStrategy::Hybrid,
            drain_timeout_ms: 5_000,
            max_lag: None,
            overflow_policy: OverflowPolicy::Disconnect,
            subscriber_affinity: None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn mask(&self) -> usize {
        self.capacity - 1
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(4096, 128)
    }
}

/// Low-latency preset: small ring that stays resident in L1/L2, busy-spin only.
pub const LOW_LATENCY_BUS_CONFIG: BusConfig = {
    let mut cfg = BusConfig::new(1024, 32);
    cfg.wait_strategy = WaitStrategy::BusySpin;
    cfg
};

/// High-throughput preset: large ring, hybrid wait strategy, many consumers.
pub const HIGH_THROUGHPUT_BUS_CONFIG: BusConfig = BusConfig::new(1 << 16, 128);

/// Object pool configuration.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub capacity: usize,
}

impl PoolConfig {
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub const fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pool capacity must be at least 1");
        Self { capacity }
    }

    /// Sizes a pool for the bus it feeds, per the sizing rule in spec.md
    /// §4.1: "the pool feeding a ring bus of capacity C MUST be sized >
    /// C", since every one of the bus's `C` positions can hold a live
    /// handle simultaneously.
    #[must_use]
    pub const fn for_bus(bus_capacity: usize) -> Self {
        Self::new(bus_capacity + (bus_capacity / 4) + 1)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(8191)
    }
}
