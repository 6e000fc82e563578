//! The contract an event payload must satisfy to live behind a pool
//! [`Handle`](../tickbus/struct.Handle.html) (spec.md §3 "PooledEvent").
//!
//! Defined here, rather than in the `tickbus` crate that owns the pool
//! and handle machinery, so that both `tickbus-core` (which defines the
//! event payload types) and `tickbus` (which defines `Pool`/`Handle`)
//! can depend on a single shared trait without a cycle.

/// An event payload that can be recycled by an object pool.
///
/// `clear()` runs exactly once per acquisition, right before the slot is
/// handed back to a caller via `Pool::acquire`, and is also where any
/// payload-owned resources (none, for the fixed-size events in this
/// workspace) would be released on final `Handle` drop.
pub trait PooledEvent: Send {
    fn clear(&mut self);
}
