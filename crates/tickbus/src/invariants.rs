//! Debug-only invariant assertions for the pool and bus, in the
//! teacher's style (`ringmpsc::invariants`): zero overhead in release
//! builds, active under `debug_assertions`.

/// INV-SEQ-01 (spec.md §8): `producerSeq(t) - cursor(c, t) <= capacity(B)`
/// for every consumer `c` at every instant `t`.
macro_rules! debug_assert_bus_bounded_lag {
    ($lag:expr, $capacity:expr) => {
        debug_assert!(
            $lag <= $capacity as u64,
            "INV-SEQ-01 violated: consumer lag {} exceeds bus capacity {}",
            $lag,
            $capacity
        )
    };
}

/// Sequence numbers only move forward.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "sequence invariant violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

/// INV-POOL-01 (spec.md §8): `acquires(t) - releases(t) == inUse(t) <= capacity(P)`.
macro_rules! debug_assert_pool_bounded {
    ($in_use:expr, $capacity:expr) => {
        debug_assert!(
            $in_use <= $capacity,
            "INV-POOL-01 violated: in_use {} exceeds pool capacity {}",
            $in_use,
            $capacity
        )
    };
}

pub(crate) use debug_assert_bus_bounded_lag;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_pool_bounded;
