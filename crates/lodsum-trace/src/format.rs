// crates/lodsum-trace/src/format.rs

//! Record shapes of every trace file role.
//!
//! All files are flat little-endian record streams without headers or
//! footers. Variable-length roles are a header shape followed by `count`
//! payload records.

use lodsum_core::record::{Field, RecordShape};

/// Bytes per entity id.
pub const BYTES_PER_ENTITY: u8 = 5;
/// Bytes per predicate id.
pub const BYTES_PER_PREDICATE: u8 = 4;
/// Bytes per (non-singleton) local block id.
pub const BYTES_PER_BLOCK: u8 = 4;
/// Bytes per signed block-or-singleton id.
pub const BYTES_PER_BLOCK_OR_SINGLETON: u8 = 5;
/// Bytes per level.
pub const BYTES_PER_LEVEL: u8 = 2;

/// `subject, predicate, object` of the condensed summary graph.
pub const SUMMARY_EDGE: RecordShape = RecordShape::new(
    "summary edge",
    &[
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
        Field::unsigned(BYTES_PER_PREDICATE),
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
    ],
);

/// `node, start, end` lifetime interval.
pub const BLOCK_INTERVAL: RecordShape = RecordShape::new(
    "block interval",
    &[
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
        Field::unsigned(BYTES_PER_LEVEL),
        Field::unsigned(BYTES_PER_LEVEL),
    ],
);

/// `level, local, global` (current map format).
pub const MAP_ENTRY: RecordShape = RecordShape::new(
    "local-global entry",
    &[
        Field::unsigned(BYTES_PER_LEVEL),
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
    ],
);

/// `level, pair_count` (legacy map format header).
pub const LEGACY_MAP_HEADER: RecordShape = RecordShape::new(
    "legacy local-global header",
    &[
        Field::unsigned(BYTES_PER_LEVEL),
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
    ],
);

/// `local, global` (legacy map format payload).
pub const LEGACY_MAP_PAIR: RecordShape = RecordShape::new(
    "legacy local-global pair",
    &[
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
    ],
);

/// `block, entity_count` (outcome header).
pub const OUTCOME_HEADER: RecordShape = RecordShape::new(
    "outcome header",
    &[Field::unsigned(BYTES_PER_BLOCK), Field::unsigned(BYTES_PER_ENTITY)],
);

/// `entity` (outcome payload).
pub const OUTCOME_ENTITY: RecordShape =
    RecordShape::new("outcome entity", &[Field::unsigned(BYTES_PER_ENTITY)]);

/// `parent, child_count` (split-mapping header).
pub const SPLIT_HEADER: RecordShape = RecordShape::new(
    "split header",
    &[Field::unsigned(BYTES_PER_BLOCK), Field::unsigned(BYTES_PER_BLOCK)],
);

/// `child` (split-mapping payload; `0` is the singleton bucket).
pub const SPLIT_CHILD: RecordShape =
    RecordShape::new("split child", &[Field::unsigned(BYTES_PER_BLOCK)]);

/// `parent, singleton_count` (singleton-migration header).
pub const MIGRATION_HEADER: RecordShape = RecordShape::new(
    "singleton migration header",
    &[
        Field::unsigned(BYTES_PER_BLOCK),
        Field::signed(BYTES_PER_BLOCK_OR_SINGLETON),
    ],
);

/// `singleton` as `-entity-1` (singleton-migration payload).
pub const MIGRATION_SINGLETON: RecordShape = RecordShape::new(
    "singleton migration entry",
    &[Field::signed(BYTES_PER_BLOCK_OR_SINGLETON)],
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_widths_match_wire_table() {
        assert_eq!(SUMMARY_EDGE.width(), 14);
        assert_eq!(BLOCK_INTERVAL.width(), 9);
        assert_eq!(MAP_ENTRY.width(), 12);
        assert_eq!(LEGACY_MAP_HEADER.width(), 7);
        assert_eq!(LEGACY_MAP_PAIR.width(), 10);
        assert_eq!(OUTCOME_HEADER.width(), 9);
        assert_eq!(SPLIT_HEADER.width(), 8);
        assert_eq!(MIGRATION_HEADER.width(), 9);
    }
}
