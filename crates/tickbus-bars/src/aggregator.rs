//! Multi-timeframe bar aggregator (spec.md §4.4).
//!
//! Per-symbol state is a dense array keyed by `SymbolId - 1` (spec.md
//! §9), grown lazily as new symbols are seen rather than hash-mapped.
//! Each row holds one [`TimeframeState`] per configured [`BarPolicy`],
//! in the order `add_timeframe` was called.

use tickbus::Bus;
use tickbus_core::{Bar, CloseReason, Lifecycle, Subscriber, SubscriberId, Trade};

use crate::policies::{BarPolicy, PolicyState};

#[derive(Debug, Clone, Copy, Default)]
struct TimeframeState {
    bar: Bar,
    has_bar: bool,
    is_first_bar: bool,
    policy_state: PolicyState,
}

/// Drives one or more [`BarPolicy`]s over an incoming trade stream,
/// publishing closed bars onto an output [`Bus`].
///
/// Implements [`Subscriber`] so it can be registered directly on a
/// `Bus<Trade>` (spec.md §2: "a Trade event is fanned out to the
/// aggregator"), delivering trades through the ring bus's own
/// worker-thread dispatch rather than requiring callers to invoke
/// [`Self::on_trade`] by hand.
pub struct BarAggregator {
    id: SubscriberId,
    policies: Vec<BarPolicy>,
    state: Vec<Vec<TimeframeState>>,
    output: Bus<Bar>,
}

impl BarAggregator {
    #[must_use]
    pub fn new(id: SubscriberId, output: Bus<Bar>) -> Self {
        Self {
            id,
            policies: Vec::new(),
            state: Vec::new(),
            output,
        }
    }

    /// Registers a timeframe. Must be called before any `on_trade`
    /// (spec.md §4.4 "addTimeframe(policy) before start").
    pub fn add_timeframe(&mut self, policy: BarPolicy) {
        self.policies.push(policy);
        for row in &mut self.state {
            row.push(TimeframeState::default());
        }
    }

    #[must_use]
    pub fn timeframe_count(&self) -> usize {
        self.policies.len()
    }

    fn ensure_row(&mut self, idx: usize) {
        if idx >= self.state.len() {
            let policies_len = self.policies.len();
            self.state.resize_with(idx + 1, || vec![TimeframeState::default(); policies_len]);
        }
    }

    /// Folds one trade into every configured timeframe for its symbol,
    /// closing and publishing a bar wherever the policy says to.
    pub fn on_trade(&mut self, trade: &Trade) {
        let idx = trade.symbol.index();
        self.ensure_row(idx);

        for tf_idx in 0..self.policies.len() {
            let policy = self.policies[tf_idx];
            let st = &mut self.state[idx][tf_idx];

            if !st.has_bar {
                policy.init_bar(trade, &mut st.bar, &mut st.policy_state);
                st.has_bar = true;
                st.is_first_bar = true;
                continue;
            }

            if policy.should_close(trade, &st.bar, &st.policy_state) {
                let is_gap = policy.is_gap(trade, &st.bar);
                st.bar.close_reason = if st.is_first_bar {
                    CloseReason::Warmup
                } else if is_gap {
                    CloseReason::Gap
                } else {
                    CloseReason::Threshold
                };

                self.output.publish(st.bar);
                st.is_first_bar = false;
                policy.init_bar(trade, &mut st.bar, &mut st.policy_state);
            } else {
                policy.update(trade, &mut st.bar, &mut st.policy_state);
            }
        }
    }
}

impl Subscriber for BarAggregator {
    fn id(&self) -> SubscriberId {
        self.id
    }

    fn on_trade(&mut self, trade: &Trade) {
        BarAggregator::on_trade(self, trade);
    }
}

impl Lifecycle for BarAggregator {
    /// Flushes every open bar with `closeReason = Forced` (spec.md
    /// §4.4 "stop(): flushes open bars").
    fn stop(&mut self) {
        for row in &mut self.state {
            for st in row.iter_mut() {
                if st.has_bar {
                    st.bar.close_reason = CloseReason::Forced;
                    self.output.publish(st.bar);
                    st.has_bar = false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tickbus::{BusConfig, OverflowPolicy};
    use tickbus_core::{InstrumentKind, Price, Quantity, SymbolId};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn trade(price: f64, ts_s: u64) -> Trade {
        Trade {
            symbol: SymbolId::placeholder(),
            instrument_kind: InstrumentKind::Spot,
            price: Price::from_parts(price as i64, 0),
            qty: Quantity::from_parts(1, 0),
            taker_is_buy: true,
            exchange_ts_ns: ts_s * 1_000_000_000,
            source_venue: 0,
        }
    }

    struct BarCounter {
        bars: Arc<AtomicU32>,
        last_reason: Arc<std::sync::Mutex<Option<CloseReason>>>,
    }

    impl Subscriber for BarCounter {
        fn id(&self) -> SubscriberId {
            SubscriberId(42)
        }
        fn on_bar(&mut self, bar: &Bar) {
            self.bars.fetch_add(1, Ordering::Relaxed);
            *self.last_reason.lock().unwrap() = Some(bar.close_reason);
        }
    }

    #[test]
    fn time_bars_from_spec_scenario() {
        let mut bus: Bus<Bar> = Bus::new(BusConfig::new(64, 4));
        let bars = Arc::new(AtomicU32::new(0));
        let last_reason = Arc::new(std::sync::Mutex::new(None));
        bus.subscribe(
            Box::new(BarCounter {
                bars: bars.clone(),
                last_reason: last_reason.clone(),
            }),
            None,
            Some(OverflowPolicy::Disconnect),
            None,
        )
        .unwrap();
        bus.start();

        let mut agg = BarAggregator::new(SubscriberId(1), bus);
        agg.add_timeframe(BarPolicy::Time { interval_ns: 60_000_000_000 });

        for (price, ts) in [(100.0, 0), (101.0, 30), (102.0, 59), (103.0, 60), (104.0, 61)] {
            agg.on_trade(&trade(price, ts));
        }

        let deadline = Instant::now() + Duration::from_millis(500);
        while bars.load(Ordering::Relaxed) < 1 && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_eq!(bars.load(Ordering::Relaxed), 1);
        assert_eq!(*last_reason.lock().unwrap(), Some(CloseReason::Warmup));
    }

    #[test]
    fn stop_flushes_open_bar_as_forced() {
        let mut bus: Bus<Bar> = Bus::new(BusConfig::new(64, 4));
        let bars = Arc::new(AtomicU32::new(0));
        let last_reason = Arc::new(std::sync::Mutex::new(None));
        bus.subscribe(
            Box::new(BarCounter {
                bars: bars.clone(),
                last_reason: last_reason.clone(),
            }),
            None,
            Some(OverflowPolicy::Disconnect),
            None,
        )
        .unwrap();
        bus.start();

        let mut agg = BarAggregator::new(SubscriberId(1), bus);
        agg.add_timeframe(BarPolicy::Tick { count: 100 });
        agg.on_trade(&trade(100.0, 0));
        agg.stop();

        let deadline = Instant::now() + Duration::from_millis(500);
        while bars.load(Ordering::Relaxed) < 1 && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_eq!(*last_reason.lock().unwrap(), Some(CloseReason::Forced));
    }

    #[test]
    fn aggregator_runs_as_a_subscriber_on_a_trade_bus() {
        let mut out_bus: Bus<Bar> = Bus::new(BusConfig::new(64, 4));
        let bars = Arc::new(AtomicU32::new(0));
        let last_reason = Arc::new(std::sync::Mutex::new(None));
        out_bus
            .subscribe(
                Box::new(BarCounter {
                    bars: bars.clone(),
                    last_reason: last_reason.clone(),
                }),
                None,
                Some(OverflowPolicy::Disconnect),
                None,
            )
            .unwrap();
        out_bus.start();

        let mut agg = BarAggregator::new(SubscriberId(7), out_bus);
        agg.add_timeframe(BarPolicy::Time { interval_ns: 60_000_000_000 });

        let mut trade_bus: Bus<Trade> = Bus::new(BusConfig::new(64, 4));
        trade_bus
            .subscribe(Box::new(agg), None, Some(OverflowPolicy::Disconnect), None)
            .unwrap();
        trade_bus.start();

        for (price, ts) in [(100.0, 0), (101.0, 30), (102.0, 59), (103.0, 60)] {
            trade_bus.publish(trade(price, ts));
        }

        let deadline = Instant::now() + Duration::from_millis(500);
        while bars.load(Ordering::Relaxed) < 1 && Instant::now() < deadline {
            std::thread::yield_now();
        }
        assert_eq!(bars.load(Ordering::Relaxed), 1);
        assert_eq!(*last_reason.lock().unwrap(), Some(CloseReason::Warmup));
    }
}
