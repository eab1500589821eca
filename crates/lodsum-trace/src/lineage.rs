// crates/lodsum-trace/src/lineage.rs

//! Parent/child ("refines") edges between consecutive levels, in global id
//! space.

use crate::delta::{decode_singleton_migrations, decode_split_mapping};
use crate::identifiers::IdentifierMap;
use crate::snapshot::scan_snapshot_sizes;
use crate::store::{TraceFile, TraceStore};
use lodsum_core::{violation, GlobalBlockId, Level, LocalBlockId, Result, SINGLETON_BUCKET};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// `child` (a block at `level`) refines `parent` (a block at `level - 1`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefinesEdge {
    /// Level of the child.
    pub level: Level,
    /// Child block.
    pub child: GlobalBlockId,
    /// Parent block.
    pub parent: GlobalBlockId,
}

/// Every refines edge of the transitions `first+1..=depth`.
///
/// Migrated singletons come first within a transition, followed by the
/// non-singleton children of every split, in file order.
pub fn lineage<S: TraceStore + ?Sized>(
    store: &S,
    ids: &IdentifierMap,
    first: Level,
    depth: Level,
) -> Result<Vec<RefinesEdge>> {
    // Local id → level at which the live block with that id was created.
    let mut origins: HashMap<LocalBlockId, Level> = HashMap::new();
    for (id, _) in scan_snapshot_sizes(store.open_required(&TraceFile::Outcome(first))?)? {
        origins.insert(id, first);
    }

    let mut out = Vec::new();
    for level in first.saturating_add(1)..=depth {
        let from = level - 1;

        let migrations =
            decode_singleton_migrations(store.open(&TraceFile::SingletonMapping { from })?)?;
        for m in migrations.unwrap_or_default() {
            let parent = resolve_parent(ids, &origins, m.parent, from)?;
            out.extend(m.entities.into_iter().map(|e| RefinesEdge {
                level,
                child: GlobalBlockId::singleton(e),
                parent,
            }));
        }

        let splits = decode_split_mapping(store.open_required(&TraceFile::SplitMapping { from })?)?;
        let parents = splits
            .iter()
            .map(|s| resolve_parent(ids, &origins, s.parent, from))
            .collect::<Result<Vec<_>>>()?;
        for s in &splits {
            origins.remove(&s.parent);
        }
        for (s, parent) in splits.iter().zip(parents) {
            for &child in s.children.iter().filter(|&&c| c != SINGLETON_BUCKET) {
                out.push(RefinesEdge {
                    level,
                    child: ids.resolve(i64::from(child), level)?,
                    parent,
                });
                origins.insert(child, level);
            }
        }
    }

    info!(edges = out.len(), "extracted lineage");
    Ok(out)
}

fn resolve_parent(
    ids: &IdentifierMap,
    origins: &HashMap<LocalBlockId, Level>,
    parent: LocalBlockId,
    from: Level,
) -> Result<GlobalBlockId> {
    let origin = origins
        .get(&parent)
        .copied()
        .ok_or_else(|| violation!("block {parent} is not live at level {from}"))?;
    ids.resolve(i64::from(parent), origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{
        encode_singleton_migrations, encode_split_mapping, SingletonMigration, SplitRecord,
    };
    use crate::snapshot::encode_snapshot;
    use crate::store::MemoryStore;
    use lodsum_core::TraceError;

    #[test]
    fn reused_ids_resolve_at_their_own_level() {
        let mut s = MemoryStore::new();
        s.insert(TraceFile::Outcome(1), encode_snapshot([(1, &[0u64, 1, 2][..])]).unwrap());
        s.insert(
            TraceFile::SplitMapping { from: 1 },
            encode_split_mapping(&[SplitRecord { parent: 1, children: vec![1, 0, 2] }]).unwrap(),
        );
        s.insert(
            TraceFile::SingletonMapping { from: 1 },
            encode_singleton_migrations(&[SingletonMigration { parent: 1, entities: vec![2] }])
                .unwrap(),
        );
        s.insert(
            TraceFile::SplitMapping { from: 2 },
            encode_split_mapping(&[SplitRecord { parent: 1, children: vec![1, 3] }]).unwrap(),
        );

        let mut ids = IdentifierMap::new(false);
        ids.insert(1, 1, GlobalBlockId(10)).unwrap();
        ids.insert(1, 2, GlobalBlockId(11)).unwrap();
        ids.insert(2, 2, GlobalBlockId(12)).unwrap();
        ids.insert(1, 3, GlobalBlockId(13)).unwrap();
        ids.insert(3, 3, GlobalBlockId(14)).unwrap();

        let edges = lineage(&s, &ids, 1, 3).unwrap();
        let pairs: Vec<_> = edges.iter().map(|e| (e.level, e.child.0, e.parent.0)).collect();
        assert_eq!(
            pairs,
            vec![(2, -3, 10), (2, 11, 10), (2, 12, 10), (3, 13, 11), (3, 14, 11)]
        );
    }

    #[test]
    fn unmapped_child_is_unresolved() {
        let mut s = MemoryStore::new();
        s.insert(TraceFile::Outcome(1), encode_snapshot([(1, &[0u64, 1][..])]).unwrap());
        s.insert(
            TraceFile::SplitMapping { from: 1 },
            encode_split_mapping(&[SplitRecord { parent: 1, children: vec![4] }]).unwrap(),
        );
        let mut ids = IdentifierMap::new(false);
        ids.insert(1, 1, GlobalBlockId(1)).unwrap();
        assert!(matches!(
            lineage(&s, &ids, 1, 2),
            Err(TraceError::UnresolvedIdentifier { local: 4, level: 2 })
        ));
    }
}
