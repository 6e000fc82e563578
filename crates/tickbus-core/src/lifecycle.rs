//! Lifecycle and subscriber capability traits (spec.md §6 "External
//! Interfaces"). These are thin abstract interfaces — the actual ring
//! bus, worker threads and dispatch live in the `tickbus` crate; this
//! crate only defines the shapes collaborators implement against.

use crate::events::{Bar, BookUpdate, OrderEvent, Trade};
use crate::symbol::SymbolId;

/// Stable identifier a subscriber presents when registering with a bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub u32);

/// The full capability set a bus subscriber may implement. Every method
/// has a no-op default so a subscriber only overrides the handlers that
/// apply to the event kinds it actually subscribed to (spec.md §9
/// "virtual subscriber interface is acceptable").
pub trait Subscriber: Send {
    fn id(&self) -> SubscriberId;

    fn on_book_update(&mut self, _update: &BookUpdate) {}
    fn on_trade(&mut self, _trade: &Trade) {}
    fn on_bar(&mut self, _bar: &Bar) {}
    fn on_order_event(&mut self, _event: &OrderEvent) {}

    fn on_market_data_error(
        &mut self,
        _code: MarketDataErrorCode,
        _symbol: Option<SymbolId>,
        _message: &str,
        _ts_ns: u64,
    ) {
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketDataErrorCode {
    SequenceGap,
    StaleData,
    Disconnect,
    MalformedPayload,
    Other,
}

/// Per-worker CPU-affinity and scheduling hints (spec.md §5). Applied
/// once, at thread spawn, by whichever component owns the thread (the
/// ring bus's per-consumer worker, or the aggregator's single worker).
/// Optional and best-effort: a failure to apply a hint is logged, never
/// fatal.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerAffinity {
    pub pin_core: Option<usize>,
    pub realtime_priority: Option<i32>,
}

/// Start/stop/drain lifecycle shared by bus producers, buses, and the
/// bar aggregator. Defaults are no-ops so simple collaborators need not
/// implement anything.
pub trait Lifecycle {
    fn start(&mut self) {}
    fn stop(&mut self) {}

    /// Blocks until pending async work has drained, or `timeout_ms`
    /// elapses, whichever comes first. Returns `true` if it drained
    /// cleanly, `false` on a timeout (spec.md §7 "ShutdownTimeout").
    fn drain(&mut self, _timeout_ms: u64) -> bool {
        true
    }
}
