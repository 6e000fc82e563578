//! Multi-timeframe bar aggregator and its pluggable closing policies
//! (spec.md §4.4).

pub mod aggregator;
pub mod policies;

pub use aggregator::BarAggregator;
pub use policies::{BarKind, BarPolicy, PolicyState};
