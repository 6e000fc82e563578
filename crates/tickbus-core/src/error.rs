//! The non-hot-path error taxonomy from spec.md §7, expressed as a
//! `thiserror` enum in the teacher's style (`ringmpsc::ChannelError`).
//!
//! Hot-path operations (`Pool::acquire`, `Ring::publish`, `reserve`)
//! deliberately do **not** return this type — they return `Option`/`bool`
//! so no error-type branch sits in the hot path (spec.md §7 "Errors
//! never propagate across thread boundaries as exceptions").

use thiserror::Error;

/// Errors surfaced by collaborator-facing, non-hot-path operations
/// across the workspace (subscriber registration, drain, connectors).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("price {price_raw} is outside book range [0, {max_raw})")]
    BookOutOfRange { price_raw: i64, max_raw: i64 },

    #[error("subscriber {0:?} registered after start(); registration is rejected")]
    LateSubscription(crate::lifecycle::SubscriberId),

    #[error("per-subscriber lag exceeded configured maximum ({lag} > {max})")]
    SubscriberOverflow { lag: u64, max: u64 },

    #[error("drain did not complete within {timeout_ms}ms")]
    ShutdownTimeout { timeout_ms: u64 },
}
