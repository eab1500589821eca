// crates/lodsum-trace/src/identifiers.rs

//! Local→global block identifier reconciliation.
//!
//! Local block ids are scoped to the level at which the block was created,
//! so the map is keyed by `(local, level)`. Two wire sub-formats carry the
//! same table:
//!
//! - [`MapFormat::Current`]: one `(level, local, global)` record per block.
//! - [`MapFormat::Legacy`]: `(level, count)` headers, each followed by
//!   `count` `(local, global)` pairs.
//!
//! The sub-format is always chosen by the caller; the bytes alone are
//! ambiguous.

use crate::format::{LEGACY_MAP_HEADER, LEGACY_MAP_PAIR, MAP_ENTRY};
use lodsum_core::{
    ensure_invariant, violation, BlockRef, GlobalBlockId, Level, RecordReader, RecordWriter,
    Result, TraceError,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::io::Read;
use tracing::debug;

/// Wire sub-format of the local→global map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapFormat {
    /// Flat `(level, local, global)` triples.
    #[default]
    Current,
    /// Per-level headers followed by `(local, global)` pairs.
    Legacy,
}

impl fmt::Display for MapFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Current => "current",
            Self::Legacy => "legacy",
        })
    }
}

/// `(local, level) → global` with an optional inverse multimap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IdentifierMap {
    forward: HashMap<(i64, Level), GlobalBlockId>,
    inverse: Option<BTreeMap<GlobalBlockId, BTreeSet<(i64, Level)>>>,
}

impl IdentifierMap {
    /// Empty map; `with_inverse` also maintains `global → {(local, level)}`.
    #[must_use]
    pub fn new(with_inverse: bool) -> Self {
        Self { forward: HashMap::new(), inverse: with_inverse.then(BTreeMap::new) }
    }

    /// Decode a map file written in `format`.
    pub fn decode<R: Read>(rdr: R, format: MapFormat, with_inverse: bool) -> Result<Self> {
        let mut map = Self::new(with_inverse);
        let mut rdr = RecordReader::new(rdr);
        match format {
            MapFormat::Current => {
                while let Some(rec) = rdr.next_record(&MAP_ENTRY)? {
                    map.insert(rec.get(1), rec.get(0) as Level, GlobalBlockId(rec.get(2)))?;
                }
            }
            MapFormat::Legacy => {
                while let Some(head) = rdr.next_record(&LEGACY_MAP_HEADER)? {
                    let level = head.get(0) as Level;
                    let count = head.get(1);
                    ensure_invariant!(
                        count >= 0,
                        "legacy map header for level {level} declares {count} pairs"
                    );
                    for _ in 0..count {
                        let pair = rdr.expect_record(&LEGACY_MAP_PAIR)?;
                        map.insert(pair.get(0), level, GlobalBlockId(pair.get(1)))?;
                    }
                }
            }
        }
        debug!(entries = map.len(), %format, "decoded local-global map");
        Ok(map)
    }

    /// Add one entry. Re-adding an identical entry is a no-op.
    pub fn insert(&mut self, local: i64, level: Level, global: GlobalBlockId) -> Result<()> {
        if let Some(&prev) = self.forward.get(&(local, level)) {
            ensure_invariant!(
                prev == global,
                "local block {local} at level {level} maps to both {prev} and {global}"
            );
            return Ok(());
        }
        self.forward.insert((local, level), global);
        if let Some(inv) = self.inverse.as_mut() {
            inv.entry(global).or_default().insert((local, level));
        }
        Ok(())
    }

    /// Global id of `local` at `level`.
    pub fn resolve(&self, local: i64, level: Level) -> Result<GlobalBlockId> {
        self.forward
            .get(&(local, level))
            .copied()
            .ok_or(TraceError::UnresolvedIdentifier { local, level })
    }

    /// Global id of a block reference; singletons are their own global id.
    pub fn resolve_ref(&self, block: BlockRef, level: Level) -> Result<GlobalBlockId> {
        match block {
            BlockRef::Singleton(e) => Ok(GlobalBlockId::singleton(e)),
            BlockRef::Real(id) => self.resolve(i64::from(id), level),
        }
    }

    /// Every `(local, level)` that maps to `global`.
    ///
    /// Fails if the map was decoded without its inverse.
    pub fn locals_of(&self, global: GlobalBlockId) -> Result<Vec<(i64, Level)>> {
        let inv = self
            .inverse
            .as_ref()
            .ok_or_else(|| violation!("identifier map was decoded without an inverse index"))?;
        Ok(inv.get(&global).map(|s| s.iter().copied().collect()).unwrap_or_default())
    }

    /// Number of `(local, level)` entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// `true` if the map has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Entries as `(level, local, global)`, ordered by level then local id.
    #[must_use]
    pub fn entries(&self) -> Vec<(Level, i64, GlobalBlockId)> {
        let mut out: Vec<_> = self.forward.iter().map(|(&(l, lv), &g)| (lv, l, g)).collect();
        out.sort_unstable();
        out
    }

    /// Encode in `format`.
    pub fn encode(&self, format: MapFormat) -> Result<Vec<u8>> {
        let entries = self.entries();
        let mut w = RecordWriter::new(Vec::new());
        match format {
            MapFormat::Current => {
                for (level, local, global) in entries {
                    w.write_record(&MAP_ENTRY, &[i64::from(level), local, global.0])?;
                }
            }
            MapFormat::Legacy => {
                let mut i = 0;
                while i < entries.len() {
                    let level = entries[i].0;
                    let run = entries[i..].iter().take_while(|e| e.0 == level).count();
                    w.write_record(&LEGACY_MAP_HEADER, &[i64::from(level), run as i64])?;
                    for &(_, local, global) in &entries[i..i + run] {
                        w.write_record(&LEGACY_MAP_PAIR, &[local, global.0])?;
                    }
                    i += run;
                }
            }
        }
        Ok(w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IdentifierMap {
        let mut m = IdentifierMap::new(true);
        m.insert(1, 1, GlobalBlockId(1)).unwrap();
        m.insert(2, 1, GlobalBlockId(2)).unwrap();
        m.insert(1, 2, GlobalBlockId(3)).unwrap();
        m.insert(4, 3, GlobalBlockId(2)).unwrap();
        m
    }

    #[test]
    fn both_formats_decode_to_the_same_map() {
        let m = sample();
        for format in [MapFormat::Current, MapFormat::Legacy] {
            let bytes = m.encode(format).unwrap();
            let got = IdentifierMap::decode(&bytes[..], format, true).unwrap();
            assert_eq!(got, m, "{format}");
        }
        assert_eq!(m.encode(MapFormat::Current).unwrap().len(), 4 * 12);
        assert_eq!(m.encode(MapFormat::Legacy).unwrap().len(), 3 * 7 + 4 * 10);
    }

    #[test]
    fn ids_are_level_scoped() {
        let m = sample();
        assert_eq!(m.resolve(1, 1).unwrap(), GlobalBlockId(1));
        assert_eq!(m.resolve(1, 2).unwrap(), GlobalBlockId(3));
        assert!(matches!(
            m.resolve(1, 3),
            Err(TraceError::UnresolvedIdentifier { local: 1, level: 3 })
        ));
        assert_eq!(m.resolve_ref(BlockRef::Singleton(6), 9).unwrap(), GlobalBlockId(-7));
        assert_eq!(m.locals_of(GlobalBlockId(2)).unwrap(), vec![(2, 1), (4, 3)]);
        assert!(IdentifierMap::new(false).locals_of(GlobalBlockId(2)).is_err());
    }

    #[test]
    fn conflicting_entry_is_violation() {
        let mut m = sample();
        m.insert(1, 1, GlobalBlockId(1)).unwrap();
        assert!(matches!(
            m.insert(1, 1, GlobalBlockId(8)),
            Err(TraceError::InvariantViolation(_))
        ));
    }

    #[test]
    fn legacy_negative_count_is_violation() {
        let mut w = RecordWriter::new(Vec::new());
        w.write_record(&LEGACY_MAP_HEADER, &[1, -1]).unwrap();
        let bytes = w.into_inner();
        assert!(matches!(
            IdentifierMap::decode(&bytes[..], MapFormat::Legacy, false),
            Err(TraceError::InvariantViolation(_))
        ));
    }

    #[test]
    fn reading_legacy_bytes_as_current_misparses() {
        let bytes = sample().encode(MapFormat::Legacy).unwrap();
        let got = IdentifierMap::decode(&bytes[..], MapFormat::Current, false);
        assert!(got.map_or(true, |m| m.entries() != sample().entries()));
    }
}
