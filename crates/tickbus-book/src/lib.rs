//! Fixed-depth tick-indexed order book and the cross-venue composite
//! top-of-book matrix (spec.md §4.3, §4.5).

pub mod book;
pub mod composite;

pub use book::{TickBook, TickBookConfig};
pub use composite::CompositeTopOfBook;
