//! Canonical id and interval types shared across the lodsum workspace.
//!
//! These live in `lodsum-core` and are re-exported at the crate root so other
//! crates can import via `lodsum_core::BlockRef`, `lodsum_core::Interval`, etc.
//!
//! The wire formats tag singleton blocks by sign (`-entity-1`); that encoding
//! is converted into [`BlockRef`] at the decode boundary and only reappears
//! when a caller explicitly asks for it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Graph vertex id, `0 <= id < vertex_count`.
pub type Entity = u64;

/// Refinement step. Stored on the wire as 2 unsigned bytes.
pub type Level = u16;

/// Block id that is only unique within one level. `0` is the singleton bucket.
pub type LocalBlockId = u32;

/// Local id reserved for the implicit singleton bucket.
pub const SINGLETON_BUCKET: LocalBlockId = 0;

/// Encode an entity as the negative block-or-singleton id `-entity-1`.
#[inline]
#[must_use]
pub const fn singleton_code(entity: Entity) -> i64 {
    -(entity as i64) - 1
}

/// Recover the entity from a negative block-or-singleton id.
///
/// Returns `None` for non-negative codes (real blocks).
#[inline]
#[must_use]
pub const fn entity_of_code(code: i64) -> Option<Entity> {
    if code < 0 {
        Some((-(code + 1)) as Entity)
    } else {
        None
    }
}

/// A block reference as it appears in block-or-singleton positions.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockRef {
    /// An explicitly persisted block (local id, never `0`).
    Real(LocalBlockId),
    /// An implicit block that wraps exactly one entity.
    Singleton(Entity),
}

impl BlockRef {
    /// Decode a signed block-or-singleton id.
    ///
    /// Returns `None` when a non-negative id does not fit a `LocalBlockId`.
    #[must_use]
    pub fn from_code(code: i64) -> Option<Self> {
        match entity_of_code(code) {
            Some(e) => Some(Self::Singleton(e)),
            None => LocalBlockId::try_from(code).ok().map(Self::Real),
        }
    }

    /// Signed wire encoding (`id` for real blocks, `-entity-1` for singletons).
    #[inline]
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Real(id) => id as i64,
            Self::Singleton(e) => singleton_code(e),
        }
    }

    /// `true` for [`BlockRef::Singleton`].
    #[inline]
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        matches!(self, Self::Singleton(_))
    }

    /// Local id of the bucket holding this reference (`0` for singletons).
    #[inline]
    #[must_use]
    pub const fn bucket(self) -> LocalBlockId {
        match self {
            Self::Real(id) => id,
            Self::Singleton(_) => SINGLETON_BUCKET,
        }
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real(id) => write!(f, "block {id}"),
            Self::Singleton(e) => write!(f, "singleton {{{e}}}"),
        }
    }
}

/// Level-independent block identity.
///
/// Negative values are singletons and carry their `-entity-1` encoding.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct GlobalBlockId(pub i64);

impl GlobalBlockId {
    /// Global identity of a singleton block.
    #[inline]
    #[must_use]
    pub const fn singleton(entity: Entity) -> Self {
        Self(singleton_code(entity))
    }

    /// The wrapped entity if this is a singleton id.
    #[inline]
    #[must_use]
    pub const fn singleton_entity(self) -> Option<Entity> {
        entity_of_code(self.0)
    }
}

impl fmt::Display for GlobalBlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed range of levels `[start, end]`, always with `start <= end`.
///
/// Deserialization goes through [`Interval::new`] and rejects reversed ranges.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "RawInterval")]
pub struct Interval {
    start: Level,
    end: Level,
}

/// Unchecked wire form of [`Interval`].
#[derive(Deserialize)]
struct RawInterval {
    start: Level,
    end: Level,
}

impl TryFrom<RawInterval> for Interval {
    type Error = String;

    fn try_from(raw: RawInterval) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
            .ok_or_else(|| format!("interval [{},{}] has start after end", raw.start, raw.end))
    }
}

impl Interval {
    /// Construct `[start, end]`; `None` if `start > end`.
    #[inline]
    #[must_use]
    pub const fn new(start: Level, end: Level) -> Option<Self> {
        if start <= end {
            Some(Self { start, end })
        } else {
            None
        }
    }

    /// First level (inclusive).
    #[inline]
    #[must_use]
    pub const fn start(&self) -> Level {
        self.start
    }

    /// Last level (inclusive); `depth + 1` marks an open end.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> Level {
        self.end
    }

    /// Number of levels covered.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        (self.end - self.start) as u32 + 1
    }

    /// Returns `true` if `level` lies within `[start, end]`.
    #[inline]
    #[must_use]
    pub const fn contains(&self, level: Level) -> bool {
        level >= self.start && level <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.start, self.end)
    }
}
