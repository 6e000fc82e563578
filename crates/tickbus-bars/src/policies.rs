//! Bar-closing policies (spec.md §4.4).
//!
//! Realized as a small sum type rather than a trait object: the
//! interface is the same four operations for every variant, and a
//! closed `enum` keeps the per-`(symbol, timeframe)` state (below) out
//! of the policy value itself, so one `BarPolicy` can be shared (by
//! value, it's `Copy`) across every symbol on that timeframe.

use tickbus_core::{Bar, CloseReason, Price, Quantity, Trade};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarKind {
    Time,
    Tick,
    Volume,
    Range,
    Renko,
    HeikinAshi,
}

/// A bar-closing policy and its construction-time parameter.
#[derive(Debug, Clone, Copy)]
pub enum BarPolicy {
    Time { interval_ns: u64 },
    Tick { count: u32 },
    Volume { threshold: Quantity },
    Range { range: Price },
    Renko { brick: Price },
    HeikinAshi { interval_ns: u64 },
}

impl BarPolicy {
    #[must_use]
    pub fn kind(&self) -> BarKind {
        match self {
            BarPolicy::Time { .. } => BarKind::Time,
            BarPolicy::Tick { .. } => BarKind::Tick,
            BarPolicy::Volume { .. } => BarKind::Volume,
            BarPolicy::Range { .. } => BarKind::Range,
            BarPolicy::Renko { .. } => BarKind::Renko,
            BarPolicy::HeikinAshi { .. } => BarKind::HeikinAshi,
        }
    }
}

/// Per-`(symbol, timeframe)` private state a policy needs beyond the
/// `Bar` itself (spec.md §4.4 "policy-private state").
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyState {
    /// Renko: direction of the last brick, `true` = up. `None` before
    /// the first brick closes.
    renko_up: Option<bool>,
    /// HeikinAshi: previous bar's HA open/close, used to seed the next.
    prev_ha_open: Option<Price>,
    prev_ha_close: Option<Price>,
}

/// Aligns a nanosecond timestamp down to the start of its `interval_ns`
/// bucket.
fn align(ts_ns: u64, interval_ns: u64) -> u64 {
    (ts_ns / interval_ns) * interval_ns
}

impl BarPolicy {
    /// Whether `trade` closes `bar` (spec.md §4.4 closure table),
    /// evaluated *before* the trade is folded into `bar`.
    #[must_use]
    pub fn should_close(&self, trade: &Trade, bar: &Bar, state: &PolicyState) -> bool {
        match self {
            BarPolicy::Time { interval_ns } | BarPolicy::HeikinAshi { interval_ns } => {
                align(trade.exchange_ts_ns, *interval_ns) != bar.start_time_ns
            }
            BarPolicy::Tick { count } => bar.trade_count >= *count,
            BarPolicy::Volume { threshold } => bar.volume.raw() >= threshold.raw(),
            BarPolicy::Range { range } => {
                let new_high = bar.high.raw().max(trade.price.raw());
                let new_low = bar.low.raw().min(trade.price.raw());
                (new_high - new_low) >= range.raw()
            }
            BarPolicy::Renko { brick } => {
                let _ = state;
                (trade.price.raw() - bar.open.raw()).unsigned_abs() >= brick.raw() as u64
            }
        }
    }

    /// Whether the gap between `bar`'s start and `trade`'s aligned
    /// interval exceeds one interval — only meaningful for the two
    /// time-aligned policies (spec.md §4.4 "Gap handling").
    #[must_use]
    pub fn is_gap(&self, trade: &Trade, bar: &Bar) -> bool {
        let interval_ns = match self {
            BarPolicy::Time { interval_ns } | BarPolicy::HeikinAshi { interval_ns } => *interval_ns,
            _ => return false,
        };
        let aligned = align(trade.exchange_ts_ns, interval_ns);
        aligned > bar.start_time_ns && aligned - bar.start_time_ns > interval_ns
    }

    /// Initializes a freshly-opened bar with the trade that triggered it.
    pub fn init_bar(&self, trade: &Trade, bar: &mut Bar, state: &mut PolicyState) {
        let previous_open = bar.open;
        bar.symbol = trade.symbol;
        bar.open = trade.price;
        bar.high = trade.price;
        bar.low = trade.price;
        bar.close = trade.price;
        bar.volume = trade.qty;
        bar.buy_volume = if trade.taker_is_buy { trade.qty } else { Quantity::ZERO };
        bar.trade_count = 1;
        bar.end_time_ns = trade.exchange_ts_ns;
        bar.close_reason = CloseReason::Threshold;

        match self {
            BarPolicy::Time { interval_ns } => {
                bar.start_time_ns = align(trade.exchange_ts_ns, *interval_ns);
                bar.end_time_ns = bar.start_time_ns + interval_ns;
            }
            BarPolicy::HeikinAshi { interval_ns } => {
                bar.start_time_ns = align(trade.exchange_ts_ns, *interval_ns);
                bar.end_time_ns = bar.start_time_ns + interval_ns;

                let ha_close_raw = (trade.price.raw() + trade.price.raw() + trade.price.raw() + trade.price.raw()) / 4;
                let ha_open_raw = state.prev_ha_open.zip(state.prev_ha_close).map_or(trade.price.raw(), |(o, c)| {
                    (o.raw() + c.raw()) / 2
                });
                bar.open = Price::from_raw(ha_open_raw);
                bar.close = Price::from_raw(ha_close_raw);
                bar.high = Price::from_raw(ha_open_raw.max(ha_close_raw).max(trade.price.raw()));
                bar.low = Price::from_raw(ha_open_raw.min(ha_close_raw).min(trade.price.raw()));
                state.prev_ha_open = Some(bar.open);
                state.prev_ha_close = Some(bar.close);
            }
            BarPolicy::Renko { brick } => {
                // The triggering trade opens the new brick at the
                // rounded boundary in the direction it crossed, not at
                // its raw price (spec.md §4.4 "brick-direction chaining").
                if let Some(up) = state.renko_up {
                    let boundary = if up { brick.raw() } else { -brick.raw() };
                    bar.open = Price::from_raw(previous_open.raw() + boundary);
                    bar.high = bar.open;
                    bar.low = bar.open;
                    bar.close = bar.open;
                }
            }
            _ => {}
        }
        bar.trade_count = bar.trade_count.max(1);
        bar.start_time_ns = if matches!(self, BarPolicy::Time { .. } | BarPolicy::HeikinAshi { .. }) {
            bar.start_time_ns
        } else {
            trade.exchange_ts_ns
        };
    }

    /// Folds `trade` into the currently-open `bar`.
    pub fn update(&self, trade: &Trade, bar: &mut Bar, state: &mut PolicyState) {
        bar.high = Price::from_raw(bar.high.raw().max(trade.price.raw()));
        bar.low = Price::from_raw(bar.low.raw().min(trade.price.raw()));
        bar.close = trade.price;
        bar.volume = bar.volume.checked_add(trade.qty).unwrap_or(bar.volume);
        if trade.taker_is_buy {
            bar.buy_volume = bar.buy_volume.checked_add(trade.qty).unwrap_or(bar.buy_volume);
        }
        bar.trade_count += 1;
        bar.end_time_ns = trade.exchange_ts_ns;

        if let BarPolicy::Renko { brick } = self {
            let diff = trade.price.raw() - bar.open.raw();
            if diff != 0 {
                state.renko_up = Some(diff > 0);
            }
            let _ = brick;
        }

        if let BarPolicy::HeikinAshi { .. } = self {
            let ha_close_raw = (bar.open.raw() + bar.high.raw() + bar.low.raw() + trade.price.raw()) / 4;
            bar.close = Price::from_raw(ha_close_raw);
            bar.high = Price::from_raw(bar.high.raw().max(ha_close_raw));
            bar.low = Price::from_raw(bar.low.raw().min(ha_close_raw));
        }
    }
}
