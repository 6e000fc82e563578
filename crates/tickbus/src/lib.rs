//! Lock-free SPMC event bus and object pool: the core runtime described
//! in spec.md §4.1–§4.3. Built on top of the shared wire types in
//! `tickbus-core`.

mod affinity;
mod backoff;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod handle;
mod invariants;
pub mod metrics;
pub mod pool;
pub mod ring;

pub use backoff::Backoff;
pub use bus::Bus;
pub use config::{BusConfig, OverflowPolicy, PoolConfig, WaitStrategy, HIGH_THROUGHPUT_BUS_CONFIG, LOW_LATENCY_BUS_CONFIG};
pub use dispatch::Dispatch;
pub use handle::Handle;
pub use metrics::{BusMetrics, BusMetricsSnapshot, PoolMetrics, PoolMetricsSnapshot};
pub use pool::Pool;
pub use ring::{RingBus, Subscription};
