use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic pool counters (spec.md §4.1 "Statistics counters"). Only
/// `in_use` is allowed to go down.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    acquires: AtomicU64,
    releases: AtomicU64,
    exhaustions: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn record_acquire(&self) {
        self.acquires.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_release(&self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exhaustion(&self) {
        self.exhaustions.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, capacity: usize) -> PoolMetricsSnapshot {
        let acquires = self.acquires.load(Ordering::Relaxed);
        let releases = self.releases.load(Ordering::Relaxed);
        PoolMetricsSnapshot {
            acquires,
            releases,
            exhaustions: self.exhaustions.load(Ordering::Relaxed),
            in_use: acquires.saturating_sub(releases),
            capacity: capacity as u64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolMetricsSnapshot {
    pub acquires: u64,
    pub releases: u64,
    pub exhaustions: u64,
    pub in_use: u64,
    pub capacity: u64,
}

/// Per-bus counters, aggregated across all consumers.
#[derive(Debug, Default)]
pub struct BusMetrics {
    published: AtomicU64,
    consumed: AtomicU64,
    gate_spins: AtomicU64,
    dropped_oldest: AtomicU64,
    disconnected_consumers: AtomicU64,
}

impl BusMetrics {
    pub(crate) fn record_publish(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consume(&self, n: u64) {
        self.consumed.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn record_gate_spin(&self) {
        self.gate_spins.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_oldest(&self) {
        self.dropped_oldest.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnect(&self) {
        self.disconnected_consumers.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> BusMetricsSnapshot {
        BusMetricsSnapshot {
            published: self.published.load(Ordering::Relaxed),
            consumed: self.consumed.load(Ordering::Relaxed),
            gate_spins: self.gate_spins.load(Ordering::Relaxed),
            dropped_oldest: self.dropped_oldest.load(Ordering::Relaxed),
            disconnected_consumers: self.disconnected_consumers.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusMetricsSnapshot {
    pub published: u64,
    pub consumed: u64,
    pub gate_spins: u64,
    pub dropped_oldest: u64,
    pub disconnected_consumers: u64,
}
