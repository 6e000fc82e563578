//! Shared types for the tickbus workspace: tagged decimal scalars, the
//! symbol registry, event payload shapes, and the thin lifecycle /
//! subscriber traits that the ring bus and its collaborators implement
//! against.
//!
//! This crate has no hot-path code of its own; it exists so that
//! `tickbus`, `tickbus-book` and `tickbus-bars` can share one set of
//! wire types without depending on each other.

pub mod decimal;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod pooled;
pub mod symbol;

pub use decimal::{Decimal, Price, PriceTag, Quantity, QuantityTag, Volume, VolumeTag};
pub use error::CoreError;
pub use events::{
    Bar, BookUpdate, CloseReason, InstrumentKind, Level, LevelSet, OrderEvent, OrderEventKind,
    Trade, UpdateKind, MAX_UPDATE_LEVELS,
};
pub use lifecycle::{Lifecycle, MarketDataErrorCode, Subscriber, SubscriberId, WorkerAffinity};
pub use pooled::PooledEvent;
pub use symbol::{OptionMeta, RegistryError, SymbolId, SymbolInfo, SymbolRegistry, VenueId};
