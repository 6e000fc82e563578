//! Composite cross-venue top-of-book matrix (spec.md §4.5).
//!
//! Each `(symbol, venue)` cell is a set of atomics, safe for one writer
//! per venue and many concurrent readers. This type does not itself
//! process `BookUpdate` deltas — a collaborator owns one [`crate::book::TickBook`]
//! per `(symbol, venue)` and calls [`CompositeTopOfBook::update_top`] with
//! that book's current best bid/ask after every applied update. Keeping
//! the two separate means the hot per-update recomputation (bounded
//! scan over a tick-indexed array) stays where the full depth lives, and
//! this matrix only ever stores the four numbers readers actually need.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use tickbus_core::{Price, Quantity, SymbolId, VenueId};

const EMPTY_RAW: i64 = i64::MIN;

struct Cell {
    bid_raw: AtomicI64,
    bid_qty_raw: AtomicI64,
    ask_raw: AtomicI64,
    ask_qty_raw: AtomicI64,
    last_update_ns: AtomicU64,
    stale: AtomicBool,
}

impl Cell {
    fn empty() -> Self {
        Self {
            bid_raw: AtomicI64::new(EMPTY_RAW),
            bid_qty_raw: AtomicI64::new(0),
            ask_raw: AtomicI64::new(EMPTY_RAW),
            ask_qty_raw: AtomicI64::new(0),
            last_update_ns: AtomicU64::new(0),
            stale: AtomicBool::new(true),
        }
    }

    fn is_live(&self) -> bool {
        !self.stale.load(Ordering::Acquire)
    }

    fn bid(&self) -> Option<(Price, Quantity)> {
        if !self.is_live() {
            return None;
        }
        let raw = self.bid_raw.load(Ordering::Acquire);
        (raw != EMPTY_RAW).then(|| (Price::from_raw(raw), Quantity::from_raw(self.bid_qty_raw.load(Ordering::Acquire))))
    }

    fn ask(&self) -> Option<(Price, Quantity)> {
        if !self.is_live() {
            return None;
        }
        let raw = self.ask_raw.load(Ordering::Acquire);
        (raw != EMPTY_RAW).then(|| (Price::from_raw(raw), Quantity::from_raw(self.ask_qty_raw.load(Ordering::Acquire))))
    }
}

/// Dense `(symbol, venue)` matrix of top-of-book snapshots.
pub struct CompositeTopOfBook {
    num_venues: usize,
    cells: Vec<Cell>,
}

impl CompositeTopOfBook {
    /// Preallocates a `num_symbols x num_venues` matrix. Both dimensions
    /// are fixed at construction; growing either requires a new matrix
    /// (spec.md §9 "dense array... not a hash map").
    #[must_use]
    pub fn new(num_symbols: usize, num_venues: usize) -> Self {
        let mut cells = Vec::with_capacity(num_symbols * num_venues);
        cells.resize_with(num_symbols * num_venues, Cell::empty);
        Self { num_venues, cells }
    }

    fn index(&self, symbol: SymbolId, venue: VenueId) -> Option<usize> {
        let venue_idx = venue.0 as usize;
        if venue_idx >= self.num_venues {
            return None;
        }
        let idx = symbol.index() * self.num_venues + venue_idx;
        (idx < self.cells.len()).then_some(idx)
    }

    /// Updates the top-of-book for one `(symbol, venue)` pair. Called by
    /// a collaborator after applying a `BookUpdate` to its per-venue
    /// order book.
    pub fn update_top(
        &self,
        symbol: SymbolId,
        venue: VenueId,
        bid: Option<(Price, Quantity)>,
        ask: Option<(Price, Quantity)>,
        ts_ns: u64,
    ) {
        let Some(idx) = self.index(symbol, venue) else {
            tracing::warn!(target: "tickbus_book::composite", venue = venue.0, "venue id out of matrix bounds");
            return;
        };
        let cell = &self.cells[idx];

        let (bid_raw, bid_qty) = bid.map_or((EMPTY_RAW, 0), |(p, q)| (p.raw(), q.raw()));
        let (ask_raw, ask_qty) = ask.map_or((EMPTY_RAW, 0), |(p, q)| (p.raw(), q.raw()));

        cell.bid_raw.store(bid_raw, Ordering::Release);
        cell.bid_qty_raw.store(bid_qty, Ordering::Release);
        cell.ask_raw.store(ask_raw, Ordering::Release);
        cell.ask_qty_raw.store(ask_qty, Ordering::Release);
        cell.last_update_ns.store(ts_ns, Ordering::Release);
        cell.stale.store(false, Ordering::Release);
    }

    pub fn mark_stale(&self, symbol: SymbolId, venue: VenueId) {
        if let Some(idx) = self.index(symbol, venue) {
            self.cells[idx].stale.store(true, Ordering::Release);
        }
    }

    /// Marks every symbol on `venue` stale, e.g. on a venue disconnect.
    pub fn mark_venue_stale(&self, venue: VenueId) {
        let venue_idx = venue.0 as usize;
        if venue_idx >= self.num_venues {
            return;
        }
        let mut idx = venue_idx;
        while idx < self.cells.len() {
            self.cells[idx].stale.store(true, Ordering::Release);
            idx += self.num_venues;
        }
    }

    /// Marks any cell stale whose `last_update_ns` is older than
    /// `now_ns - threshold_ns`. Returns the number of cells newly marked.
    pub fn check_staleness(&self, now_ns: u64, threshold_ns: u64) -> usize {
        let mut newly_stale = 0;
        for cell in &self.cells {
            if cell.stale.load(Ordering::Acquire) {
                continue;
            }
            let last = cell.last_update_ns.load(Ordering::Acquire);
            if now_ns.saturating_sub(last) > threshold_ns {
                cell.stale.store(true, Ordering::Release);
                newly_stale += 1;
            }
        }
        newly_stale
    }

    fn venues_for(&self, symbol: SymbolId) -> &[Cell] {
        let start = symbol.index() * self.num_venues;
        &self.cells[start..start + self.num_venues]
    }

    /// The best (highest) bid for `symbol` across all non-stale venues.
    #[must_use]
    pub fn best_bid(&self, symbol: SymbolId) -> Option<(VenueId, Price, Quantity)> {
        self.venues_for(symbol)
            .iter()
            .enumerate()
            .filter_map(|(v, cell)| cell.bid().map(|(p, q)| (VenueId(v as u16), p, q)))
            .max_by_key(|(_, p, _)| p.raw())
    }

    /// The best (lowest) ask for `symbol` across all non-stale venues.
    #[must_use]
    pub fn best_ask(&self, symbol: SymbolId) -> Option<(VenueId, Price, Quantity)> {
        self.venues_for(symbol)
            .iter()
            .enumerate()
            .filter_map(|(v, cell)| cell.ask().map(|(p, q)| (VenueId(v as u16), p, q)))
            .min_by_key(|(_, p, _)| p.raw())
    }

    #[must_use]
    pub fn bid_for_venue(&self, symbol: SymbolId, venue: VenueId) -> Option<(Price, Quantity)> {
        self.index(symbol, venue).and_then(|idx| self.cells[idx].bid())
    }

    #[must_use]
    pub fn ask_for_venue(&self, symbol: SymbolId, venue: VenueId) -> Option<(Price, Quantity)> {
        self.index(symbol, venue).and_then(|idx| self.cells[idx].ask())
    }

    #[must_use]
    pub fn spread(&self, symbol: SymbolId) -> Option<Price> {
        let (_, bid, _) = self.best_bid(symbol)?;
        let (_, ask, _) = self.best_ask(symbol)?;
        ask.checked_sub(bid)
    }

    /// A cross-venue arbitrage exists when the best bid and best ask
    /// come from different venues and the bid is at or above the ask
    /// (spec.md §4.5).
    #[must_use]
    pub fn has_arbitrage_opportunity(&self, symbol: SymbolId) -> bool {
        match (self.best_bid(symbol), self.best_ask(symbol)) {
            (Some((bid_venue, bid, _)), Some((ask_venue, ask, _))) => {
                bid_venue != ask_venue && bid.raw() >= ask.raw()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> SymbolId {
        SymbolId::placeholder()
    }

    #[test]
    fn cross_venue_arb_scenario_from_spec() {
        let matrix = CompositeTopOfBook::new(1, 2);
        let venue_a = VenueId(0);
        let venue_b = VenueId(1);

        matrix.update_top(
            sym(),
            venue_a,
            Some((Price::from_parts(101, 0), Quantity::from_parts(1, 0))),
            Some((Price::from_parts(102, 0), Quantity::from_parts(1, 0))),
            1,
        );
        matrix.update_top(
            sym(),
            venue_b,
            Some((Price::from_parts(103, 0), Quantity::from_parts(1, 0))),
            Some((Price::from_parts(104, 0), Quantity::from_parts(1, 0))),
            1,
        );

        let (best_bid_venue, best_bid, _) = matrix.best_bid(sym()).unwrap();
        let (best_ask_venue, best_ask, _) = matrix.best_ask(sym()).unwrap();
        assert_eq!(best_bid_venue, venue_b);
        assert_eq!(best_bid.to_f64(), 103.0);
        assert_eq!(best_ask_venue, venue_a);
        assert_eq!(best_ask.to_f64(), 102.0);
        assert!(matrix.has_arbitrage_opportunity(sym()));
    }

    #[test]
    fn stale_entries_excluded_from_cross_venue_best() {
        let matrix = CompositeTopOfBook::new(1, 2);
        matrix.update_top(
            sym(),
            VenueId(0),
            Some((Price::from_parts(101, 0), Quantity::from_parts(1, 0))),
            Some((Price::from_parts(102, 0), Quantity::from_parts(1, 0))),
            1,
        );
        matrix.update_top(
            sym(),
            VenueId(1),
            Some((Price::from_parts(103, 0), Quantity::from_parts(1, 0))),
            Some((Price::from_parts(104, 0), Quantity::from_parts(1, 0))),
            1,
        );

        matrix.mark_stale(sym(), VenueId(1));
        let (venue, price, _) = matrix.best_bid(sym()).unwrap();
        assert_eq!(venue, VenueId(0));
        assert_eq!(price.to_f64(), 101.0);
    }

    #[test]
    fn check_staleness_marks_old_cells() {
        let matrix = CompositeTopOfBook::new(1, 1);
        matrix.update_top(
            sym(),
            VenueId(0),
            Some((Price::from_parts(100, 0), Quantity::from_parts(1, 0))),
            None,
            1_000,
        );
        let marked = matrix.check_staleness(2_000_000, 1_000);
        assert_eq!(marked, 1);
        assert!(matrix.bid_for_venue(sym(), VenueId(0)).is_none());
    }
}
