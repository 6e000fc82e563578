//! Fixed-depth, tick-indexed order book (spec.md §4.3).
//!
//! Both sides are dense arrays of quantity indexed by `price / tick`, not
//! a sorted map: applying an update and querying best bid/ask are both
//! O(1) amortized, bounded by the tracked `[min_index, max_index]`
//! window rather than a full array scan.

use tickbus_core::{BookUpdate, Price, Quantity, UpdateKind};

/// Configuration for a [`TickBook`]: the number of price slots per side
/// and the tick size used to convert a price into an index.
#[derive(Debug, Clone, Copy)]
pub struct TickBookConfig {
    pub max_levels: usize,
    pub tick_size_raw: i64,
}

impl TickBookConfig {
    /// # Panics
    /// Panics if `max_levels` is zero or `tick_size_raw` is not positive.
    #[must_use]
    pub const fn new(max_levels: usize, tick_size_raw: i64) -> Self {
        assert!(max_levels > 0, "max_levels must be at least 1");
        assert!(tick_size_raw > 0, "tick_size_raw must be positive");
        Self {
            max_levels,
            tick_size_raw,
        }
    }
}

#[derive(Debug)]
struct Side {
    qty_raw: Box<[i64]>,
    min_index: Option<usize>,
    max_index: Option<usize>,
}

impl Side {
    fn new(max_levels: usize) -> Self {
        Self {
            qty_raw: vec![0i64; max_levels].into_boxed_slice(),
            min_index: None,
            max_index: None,
        }
    }

    fn clear(&mut self) {
        self.qty_raw.fill(0);
        self.min_index = None;
        self.max_index = None;
    }

    fn set(&mut self, idx: usize, qty_raw: i64) {
        self.qty_raw[idx] = qty_raw;
        if qty_raw == 0 {
            self.on_delete(idx);
            return;
        }
        self.min_index = Some(self.min_index.map_or(idx, |m| m.min(idx)));
        self.max_index = Some(self.max_index.map_or(idx, |m| m.max(idx)));
    }

    /// Contracts a bound inward after a deletion, scanning within the
    /// current window for the next nonzero level (spec.md §4.3 "on
    /// deletion at a boundary, contract the boundary by linear scan").
    fn on_delete(&mut self, idx: usize) {
        let (Some(min), Some(max)) = (self.min_index, self.max_index) else {
            return;
        };

        if idx == min && idx == max {
            self.min_index = None;
            self.max_index = None;
        } else if idx == min {
            let mut i = idx + 1;
            while i <= max && self.qty_raw[i] == 0 {
                i += 1;
            }
            self.min_index = if i > max { None } else { Some(i) };
            if i > max {
                self.max_index = None;
            }
        } else if idx == max {
            let mut i = idx;
            while i > min && self.qty_raw[i] == 0 {
                i -= 1;
            }
            self.max_index = Some(i);
        }
    }

    fn best(&self, scan_from_max: bool) -> Option<usize> {
        let (min, max) = (self.min_index?, self.max_index?);
        if scan_from_max {
            (min..=max).rev().find(|&i| self.qty_raw[i] != 0)
        } else {
            (min..=max).find(|&i| self.qty_raw[i] != 0)
        }
    }
}

/// Single-threaded, fixed-depth order book for one instrument. Not
/// `Sync` by design — hand it off via a bus or guard it externally
/// (spec.md §4.3 "Thread model").
#[derive(Debug)]
pub struct TickBook {
    config: TickBookConfig,
    bids: Side,
    asks: Side,
    exhaustion_count: u64,
}

impl TickBook {
    #[must_use]
    pub fn new(config: TickBookConfig) -> Self {
        Self {
            bids: Side::new(config.max_levels),
            asks: Side::new(config.max_levels),
            config,
            exhaustion_count: 0,
        }
    }

    /// Count of updates silently dropped for being outside
    /// `[0, MaxLevels * tick)` (spec.md §7 "BookOutOfRange").
    #[must_use]
    pub fn out_of_range_count(&self) -> u64 {
        self.exhaustion_count
    }

    fn index_of(&self, price: Price) -> Option<usize> {
        let raw = price.raw();
        if raw < 0 {
            return None;
        }
        let idx = (raw / self.config.tick_size_raw) as usize;
        if idx >= self.config.max_levels {
            return None;
        }
        Some(idx)
    }

    pub fn apply_update(&mut self, update: &BookUpdate) {
        match update.kind {
            UpdateKind::Snapshot => {
                self.bids.clear();
                self.asks.clear();
                for level in update.bids.as_slice() {
                    self.apply_level(true, level.price, level.qty, true);
                }
                for level in update.asks.as_slice() {
                    self.apply_level(false, level.price, level.qty, true);
                }
            }
            UpdateKind::Delta => {
                for level in update.bids.as_slice() {
                    self.apply_level(true, level.price, level.qty, false);
                }
                for level in update.asks.as_slice() {
                    self.apply_level(false, level.price, level.qty, false);
                }
            }
        }
    }

    fn apply_level(&mut self, is_bid: bool, price: Price, qty: Quantity, snapshot: bool) {
        let Some(idx) = self.index_of(price) else {
            self.exhaustion_count += 1;
            tracing::debug!(
                target: "tickbus_book::book",
                price_raw = price.raw(),
                "price outside book range, ignored"
            );
            return;
        };

        let qty_raw = qty.raw();
        if snapshot && qty_raw == 0 {
            return;
        }

        let side = if is_bid { &mut self.bids } else { &mut self.asks };
        side.set(idx, qty_raw);
    }

    #[must_use]
    pub fn qty_at(&self, is_bid: bool, price: Price) -> Quantity {
        match self.index_of(price) {
            Some(idx) => {
                let side = if is_bid { &self.bids } else { &self.asks };
                Quantity::from_raw(side.qty_raw[idx])
            }
            None => Quantity::ZERO,
        }
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        let idx = self.bids.best(true)?;
        Some(self.level_at(idx))
    }

    #[must_use]
    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        let idx = self.asks.best(false)?;
        Some(self.level_at_ask(idx))
    }

    fn level_at(&self, idx: usize) -> (Price, Quantity) {
        let raw_price = idx as i64 * self.config.tick_size_raw;
        (Price::from_raw(raw_price), Quantity::from_raw(self.bids.qty_raw[idx]))
    }

    fn level_at_ask(&self, idx: usize) -> (Price, Quantity) {
        let raw_price = idx as i64 * self.config.tick_size_raw;
        (Price::from_raw(raw_price), Quantity::from_raw(self.asks.qty_raw[idx]))
    }

    #[must_use]
    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => bid.raw() >= ask.raw(),
            _ => false,
        }
    }

    #[must_use]
    pub fn spread(&self) -> Option<Price> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        ask.checked_sub(bid)
    }

    #[must_use]
    pub fn mid(&self) -> Option<Price> {
        let (bid, _) = self.best_bid()?;
        let (ask, _) = self.best_ask()?;
        let sum = ask.checked_add(bid)?;
        Some(Price::from_raw(sum.raw() / 2))
    }
}
