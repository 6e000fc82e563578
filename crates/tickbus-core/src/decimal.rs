//! Tagged fixed-point scalars.
//!
//! `Decimal<Tag>` wraps a signed 64-bit integer interpreted as
//! `raw * SCALE_DENOM`. The tag type prevents mixing units at compile
//! time: `Price + Quantity` does not type-check. Conversions that cross
//! units (`Price * Quantity -> Volume`, `Volume / Price -> Quantity`) are
//! explicit inherent methods, not a blanket `Mul`/`Div` impl, so the
//! crossing is always visible at the call site.
//!
//! The source this crate is distilled from mixes a 1e6 and a 1e8 scale
//! across files; this build picks 1e6 uniformly (see DESIGN.md).

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Neg, Sub};

/// Fixed-point denominator shared by every `Decimal` in this workspace.
pub const SCALE_DENOM: i64 = 1_000_000;

mod sealed {
    pub trait Sealed {}
}

/// Marker trait for unit tags. Not implementable outside this crate.
pub trait Unit: sealed::Sealed + Copy + Clone + fmt::Debug + 'static {
    /// Short label used in `Display` impls, e.g. `"px"`.
    const LABEL: &'static str;
}

macro_rules! unit_tag {
    ($name:ident, $label:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name;
        impl sealed::Sealed for $name {}
        impl Unit for $name {
            const LABEL: &'static str = $label;
        }
    };
}

unit_tag!(PriceTag, "px");
unit_tag!(QuantityTag, "qty");
unit_tag!(VolumeTag, "vol");

/// A signed fixed-point scalar tagged with its unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decimal<Tag: Unit> {
    raw: i64,
    _tag: PhantomData<Tag>,
}

pub type Price = Decimal<PriceTag>;
pub type Quantity = Decimal<QuantityTag>;
pub type Volume = Decimal<VolumeTag>;

impl<Tag: Unit> Default for Decimal<Tag> {
    fn default() -> Self {
        Self::ZERO
    }
}

impl<Tag: Unit> Decimal<Tag> {
    pub const ZERO: Self = Self {
        raw: 0,
        _tag: PhantomData,
    };

    /// Wraps a raw `value * SCALE_DENOM` integer. Callers are responsible
    /// for any tick-alignment rounding (spec.md §3).
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: i64) -> Self {
        Self {
            raw,
            _tag: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> i64 {
        self.raw
    }

    /// Builds a `Decimal` from an integer and a fractional numerator over
    /// `SCALE_DENOM`, e.g. `Decimal::from_parts(100, 500_000)` == 100.5.
    #[inline]
    #[must_use]
    pub const fn from_parts(integer: i64, frac_numerator: i64) -> Self {
        Self::from_raw(integer * SCALE_DENOM + frac_numerator)
    }

    #[inline]
    #[must_use]
    pub fn to_f64(self) -> f64 {
        self.raw as f64 / SCALE_DENOM as f64
    }

    #[inline]
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.raw == 0
    }

    #[inline]
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.raw.checked_add(rhs.raw).map(Self::from_raw)
    }

    #[inline]
    #[must_use]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.raw.checked_sub(rhs.raw).map(Self::from_raw)
    }

    #[inline]
    #[must_use]
    pub fn abs_diff(self, rhs: Self) -> Self {
        Self::from_raw((self.raw - rhs.raw).abs())
    }
}

impl<Tag: Unit> Add for Decimal<Tag> {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::from_raw(self.raw + rhs.raw)
    }
}

impl<Tag: Unit> Sub for Decimal<Tag> {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::from_raw(self.raw - rhs.raw)
    }
}

impl<Tag: Unit> Neg for Decimal<Tag> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::from_raw(-self.raw)
    }
}

impl<Tag: Unit> fmt::Debug for Decimal<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", Tag::LABEL, self.to_f64())
    }
}

impl<Tag: Unit> fmt::Display for Decimal<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.to_f64())
    }
}

impl Price {
    /// `Price * Quantity -> Volume`, using an `i128` intermediate so the
    /// multiply cannot overflow for any pair of in-range `i64` operands.
    #[inline]
    #[must_use]
    pub fn checked_mul_qty(self, qty: Quantity) -> Option<Volume> {
        let product = i128::from(self.raw) * i128::from(qty.raw) / i128::from(SCALE_DENOM);
        i64::try_from(product).ok().map(Volume::from_raw)
    }
}

impl Volume {
    /// `Volume / Price -> Quantity`, via `i128` intermediate.
    #[inline]
    #[must_use]
    pub fn checked_div_price(self, price: Price) -> Option<Quantity> {
        if price.raw == 0 {
            return None;
        }
        let scaled = i128::from(self.raw) * i128::from(SCALE_DENOM) / i128::from(price.raw);
        i64::try_from(scaled).ok().map(Quantity::from_raw)
    }
}
