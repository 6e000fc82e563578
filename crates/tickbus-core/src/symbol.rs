//! Dense symbol identifiers and the process-scoped symbol registry.
//!
//! Per spec.md §9 design note, per-symbol state elsewhere in the
//! workspace is a dense array keyed by `SymbolId - 1`, not a hash map.
//! The registry itself is the one piece of global, mutable state in the
//! core: it is built at startup, frozen (by convention — callers stop
//! calling `register_symbol` after `start()`) before hot-path threads
//! run, and is safe for concurrent *lookups* thereafter via `RwLock`.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::InstrumentKind;

/// Dense, opaque identifier for a registered instrument, in `[1..N]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(NonZeroU32);

impl Default for SymbolId {
    fn default() -> Self {
        Self::placeholder()
    }
}

impl SymbolId {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Zero-based index into a dense `SymbolId`-keyed array.
    #[must_use]
    pub const fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }

    fn from_index(idx: usize) -> Self {
        // SAFETY-free: idx + 1 is always >= 1.
        Self(NonZeroU32::new((idx as u32) + 1).expect("index + 1 is never zero"))
    }

    /// A placeholder id used only to pre-fill pooled event storage before
    /// a connector overwrites it with the real symbol. Never a valid
    /// registry lookup result on its own.
    #[must_use]
    pub const fn placeholder() -> Self {
        // SAFETY: 1 is non-zero.
        Self(unsafe { NonZeroU32::new_unchecked(1) })
    }
}

/// Identifies an exchange or liquidity source (glossary: "Venue").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VenueId(pub u16);

/// Metadata stamped onto a registered symbol, used both as the key of
/// registration (`(venue, instrument)`) and as the looked-up payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub venue: VenueId,
    pub instrument: String,
    pub instrument_kind: InstrumentKind,
    pub tick_size_raw: i64,
    /// Option-only metadata; `None` for non-option instruments.
    pub option_meta: Option<OptionMeta>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionMeta {
    pub strike_raw: i64,
    pub expiry_ts_ns: u64,
    pub is_call: bool,
}

impl Serialize for InstrumentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tag: u8 = match self {
            InstrumentKind::Spot => 0,
            InstrumentKind::Future => 1,
            InstrumentKind::Option => 2,
            InstrumentKind::Perpetual => 3,
        };
        tag.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InstrumentKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = u8::deserialize(deserializer)?;
        match tag {
            0 => Ok(InstrumentKind::Spot),
            1 => Ok(InstrumentKind::Future),
            2 => Ok(InstrumentKind::Option),
            3 => Ok(InstrumentKind::Perpetual),
            other => Err(serde::de::Error::custom(format!(
                "unknown instrument kind tag {other}"
            ))),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("symbol already registered with different metadata; existing id {existing:?}")]
    Conflict { existing: SymbolId },
    #[error("registry exhausted: {0} symbols already assigned")]
    Exhausted(usize),
    #[error("unknown symbol id {0:?}")]
    UnknownId(SymbolId),
    #[error("unknown (venue, instrument) pair")]
    UnknownKey,
    #[error("deserialized registry version {found} is unsupported (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },
    #[error("deserialized registry payload is corrupt: {0}")]
    Corrupt(String),
}

const REGISTRY_VERSION: u8 = 1;
/// Fixed small fan-out per symbol for cross-venue equivalence sets.
const MAX_EQUIVALENTS: usize = 8;

#[derive(Default)]
struct RegistryInner {
    by_key: HashMap<(VenueId, String), SymbolId>,
    by_id: Vec<SymbolInfo>,
    /// `equivalents[idx]` holds the other `SymbolId`s considered the same
    /// underlying instrument across venues, e.g. BTC-USD on two exchanges.
    equivalents: Vec<Vec<SymbolId>>,
}

/// Thread-safe registry mapping `(venue, instrument)` to a dense
/// `SymbolId`. Registration is serialized behind a write lock; lookups
/// take a read lock and are safe to call concurrently from hot-path
/// threads (spec.md §3 "Lookups are `(venue, symbol) -> id`... concurrent-read").
pub struct SymbolRegistry {
    inner: RwLock<RegistryInner>,
}

impl SymbolRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Registers a symbol, or returns the existing id if the same
    /// `(venue, instrument)` key was already registered with identical
    /// metadata (idempotent). A key collision with *different* metadata
    /// is a [`RegistryError::Conflict`], surfaced via the returned error
    /// so callers can bump a counter (spec.md §7 "RegistryConflict").
    pub fn register_symbol(&self, info: SymbolInfo) -> Result<SymbolId, RegistryError> {
        let key = (info.venue, info.instrument.clone());
        let mut guard = self
            .inner
            .write()
            .expect("symbol registry lock poisoned");

        if let Some(&existing) = guard.by_key.get(&key) {
            if guard.by_id[existing.index()] == info {
                return Ok(existing);
            }
            tracing::warn!(
                target: "tickbus_core::registry",
                venue = info.venue.0,
                instrument = %info.instrument,
                "registry conflict: re-registration with different metadata"
            );
            return Err(RegistryError::Conflict { existing });
        }

        let next_index = guard.by_id.len();
        if next_index >= u32::MAX as usize - 1 {
            return Err(RegistryError::Exhausted(next_index));
        }
        let id = SymbolId::from_index(next_index);
        guard.by_id.push(info);
        guard.equivalents.push(Vec::new());
        guard.by_key.insert(key, id);

        tracing::debug!(target: "tickbus_core::registry", ?id, "symbol registered");
        Ok(id)
    }

    #[must_use]
    pub fn get_symbol_id(&self, venue: VenueId, instrument: &str) -> Option<SymbolId> {
        let guard = self.inner.read().expect("symbol registry lock poisoned");
        guard.by_key.get(&(venue, instrument.to_string())).copied()
    }

    #[must_use]
    pub fn get_symbol_info(&self, id: SymbolId) -> Option<SymbolInfo> {
        let guard = self.inner.read().expect("symbol registry lock poisoned");
        guard.by_id.get(id.index()).cloned()
    }

    #[must_use]
    pub fn get_symbol_name(&self, id: SymbolId) -> Option<String> {
        self.get_symbol_info(id).map(|info| info.instrument)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().expect("symbol registry lock poisoned").by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a cross-venue equivalence between two already-registered
    /// symbols (e.g. the same instrument quoted on two venues). Capped at
    /// `MAX_EQUIVALENTS` fan-out per symbol per spec.md §4.6.
    pub fn link_equivalent(&self, a: SymbolId, b: SymbolId) -> Result<(), RegistryError> {
        let mut guard = self.inner.write().expect("symbol registry lock poisoned");
        let len = guard.by_id.len();
        if a.index() >= len {
            return Err(RegistryError::UnknownId(a));
        }
        if b.index() >= len {
            return Err(RegistryError::UnknownId(b));
        }
        for (x, y) in [(a, b), (b, a)] {
            let list = &mut guard.equivalents[x.index()];
            if !list.contains(&y) && list.len() < MAX_EQUIVALENTS {
                list.push(y);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn equivalents(&self, id: SymbolId) -> Vec<SymbolId> {
        let guard = self.inner.read().expect("symbol registry lock poisoned");
        guard
            .equivalents
            .get(id.index())
            .cloned()
            .unwrap_or_default()
    }

    /// Serializes the registry as a single version byte followed by a
    /// length-prefixed array of bincode-encoded symbol records plus a
    /// CRC32 trailer (spec.md §6 "Persistence").
    pub fn serialize(&self) -> Result<Vec<u8>, RegistryError> {
        let guard = self.inner.read().expect("symbol registry lock poisoned");
        let mut out = Vec::with_capacity(16 + guard.by_id.len() * 64);
        out.push(REGISTRY_VERSION);
        let count = u32::try_from(guard.by_id.len())
            .map_err(|_| RegistryError::Corrupt("too many symbols to serialize".into()))?;
        out.extend_from_slice(&count.to_le_bytes());

        for info in &guard.by_id {
            let encoded = bincode::serialize(info)
                .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
            let len = u32::try_from(encoded.len())
                .map_err(|_| RegistryError::Corrupt("record too large".into()))?;
            out.extend_from_slice(&len.to_le_bytes());
            out.extend_from_slice(&encoded);
        }

        let checksum = crc32fast::hash(&out);
        out.extend_from_slice(&checksum.to_le_bytes());
        Ok(out)
    }

    /// Rebuilds a registry from bytes produced by [`Self::serialize`].
    /// `deserialize(serialize(r)) == r` is a tested property (spec.md §8).
    pub fn deserialize(bytes: &[u8]) -> Result<Self, RegistryError> {
        if bytes.len() < 1 + 4 + 4 {
            return Err(RegistryError::Corrupt("truncated registry blob".into()));
        }
        let (body, checksum_bytes) = bytes.split_at(bytes.len() - 4);
        let expected = u32::from_le_bytes(checksum_bytes.try_into().unwrap());
        if crc32fast::hash(body) != expected {
            return Err(RegistryError::Corrupt("checksum mismatch".into()));
        }

        let version = body[0];
        if version != REGISTRY_VERSION {
            return Err(RegistryError::UnsupportedVersion {
                found: version,
                expected: REGISTRY_VERSION,
            });
        }

        let count = u32::from_le_bytes(body[1..5].try_into().unwrap()) as usize;
        let mut cursor = 5usize;
        let registry = Self::new();
        {
            let mut guard = registry.inner.write().expect("lock poisoned");
            guard.by_id.reserve(count);
            guard.equivalents.reserve(count);
            for _ in 0..count {
                if cursor + 4 > body.len() {
                    return Err(RegistryError::Corrupt("truncated record length".into()));
                }
                let len = u32::from_le_bytes(body[cursor..cursor + 4].try_into().unwrap()) as usize;
                cursor += 4;
                if cursor + len > body.len() {
                    return Err(RegistryError::Corrupt("truncated record body".into()));
                }
                let info: SymbolInfo = bincode::deserialize(&body[cursor..cursor + len])
                    .map_err(|e| RegistryError::Corrupt(e.to_string()))?;
                cursor += len;

                let key = (info.venue, info.instrument.clone());
                let id = SymbolId::from_index(guard.by_id.len());
                guard.by_id.push(info);
                guard.equivalents.push(Vec::new());
                guard.by_key.insert(key, id);
            }
        }
        Ok(registry)
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
