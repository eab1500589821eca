// crates/lodsum-trace/src/histogram.rs

//! Block-size histograms and split ledgers without materializing members.
//!
//! Only record headers are decoded; member payloads and child lists are
//! skipped. Singleton blocks are not sized (they are implicit), matching
//! [`Partition::size_distribution`](crate::partition::Partition::size_distribution).

use crate::delta::scan_split_parents;
use crate::snapshot::scan_snapshot_sizes;
use crate::store::{TraceFile, TraceStore};
use lodsum_core::{ensure_invariant, violation, Level, LocalBlockId, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Size statistics of one level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSizes {
    /// Level described.
    pub level: Level,
    /// `size → live real blocks of that size`.
    pub sizes: BTreeMap<u64, u64>,
    /// `size → blocks of that size created at any level so far`.
    pub accumulated: BTreeMap<u64, u64>,
    /// Parents retired by the transition into this level, with their size.
    pub split_ledger: BTreeMap<LocalBlockId, u64>,
}

/// Histogram every level in `first..=depth`.
pub fn size_histogram<S: TraceStore + ?Sized>(
    store: &S,
    first: Level,
    depth: Level,
) -> Result<Vec<LevelSizes>> {
    let mut live: BTreeMap<LocalBlockId, u64> = BTreeMap::new();
    let mut accumulated: BTreeMap<u64, u64> = BTreeMap::new();
    let mut out = Vec::with_capacity(usize::from(depth.saturating_sub(first)) + 1);

    for level in first..=depth {
        let mut split_ledger = BTreeMap::new();
        if level > first {
            let from = level - 1;
            let parents =
                scan_split_parents(store.open_required(&TraceFile::SplitMapping { from })?)?;
            for parent in parents {
                let size = live.remove(&parent).ok_or_else(|| {
                    violation!("split mapping {from}->{level} retires block {parent}, which is not live")
                })?;
                split_ledger.insert(parent, size);
            }
        }

        let created = scan_snapshot_sizes(store.open_required(&TraceFile::Outcome(level))?)?;
        for &(id, size) in &created {
            ensure_invariant!(
                live.insert(id, size).is_none(),
                "outcome of level {level} creates block {id}, which is still live"
            );
            *accumulated.entry(size).or_insert(0) += 1;
        }

        let mut sizes = BTreeMap::new();
        for &size in live.values() {
            *sizes.entry(size).or_insert(0) += 1;
        }
        debug!(
            level,
            live = live.len(),
            created = created.len(),
            split = split_ledger.len(),
            "sized level"
        );
        out.push(LevelSizes { level, sizes, accumulated: accumulated.clone(), split_ledger });
    }

    info!(levels = out.len(), "computed block-size histogram");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{encode_split_mapping, SplitRecord};
    use crate::snapshot::encode_snapshot;
    use crate::store::MemoryStore;
    use lodsum_core::TraceError;

    fn store() -> MemoryStore {
        let mut s = MemoryStore::new();
        s.insert(
            TraceFile::Outcome(1),
            encode_snapshot([(1, &[0u64, 1, 2][..]), (2, &[3, 4, 5][..]), (3, &[6, 7][..])])
                .unwrap(),
        );
        s.insert(
            TraceFile::SplitMapping { from: 1 },
            encode_split_mapping(&[SplitRecord { parent: 1, children: vec![1, 0] }]).unwrap(),
        );
        s.insert(TraceFile::Outcome(2), encode_snapshot([(1, &[0u64, 1][..])]).unwrap());
        s
    }

    #[test]
    fn ledger_records_pre_split_sizes() {
        let levels = size_histogram(&store(), 1, 2).unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[0].sizes, BTreeMap::from([(2, 1), (3, 2)]));
        assert!(levels[0].split_ledger.is_empty());
        assert_eq!(levels[1].sizes, BTreeMap::from([(2, 2), (3, 1)]));
        assert_eq!(levels[1].split_ledger, BTreeMap::from([(1, 3)]));
        assert_eq!(levels[1].accumulated, BTreeMap::from([(2, 2), (3, 2)]));
    }

    #[test]
    fn retiring_a_dead_block_is_violation() {
        let mut s = store();
        s.insert(
            TraceFile::SplitMapping { from: 1 },
            encode_split_mapping(&[SplitRecord { parent: 9, children: vec![9] }]).unwrap(),
        );
        assert!(matches!(size_histogram(&s, 1, 2), Err(TraceError::InvariantViolation(_))));
    }
}
