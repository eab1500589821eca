// crates/lodsum-trace/src/partition.rs

//! Entity→block assignment of one level.
//!
//! A [`Partition`] is a snapshot: it owns its data and is detached from the
//! reconstructor that produced it, so it can be shared or persisted freely.
//!
//! Real blocks are keyed by local id. Singletons are collected under the
//! reserved bucket `0`; every entity there is assigned
//! [`BlockRef::Singleton`].

use crate::identifiers::IdentifierMap;
use lodsum_core::{
    ensure_invariant, violation, BlockRef, Entity, GlobalBlockId, Level, LocalBlockId, Result,
    SINGLETON_BUCKET,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Complete partition of the entity universe at one level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Level this partition describes.
    pub level: Level,
    /// Block of every entity, indexed by entity id.
    pub entity_to_block: Vec<BlockRef>,
    /// Members of every live block; key `0` is the singleton bucket.
    pub blocks: BTreeMap<LocalBlockId, BTreeSet<Entity>>,
    /// Level at which each live real block's local id was created.
    pub origins: BTreeMap<LocalBlockId, Level>,
}

impl Partition {
    /// Every entity in its own singleton.
    pub(crate) fn all_singletons(level: Level, vertex_count: u64) -> Result<Self> {
        let n = usize::try_from(vertex_count)
            .map_err(|_| violation!("vertex count {vertex_count} exceeds addressable memory"))?;
        let mut entity_to_block = Vec::with_capacity(n);
        entity_to_block.extend((0..vertex_count).map(BlockRef::Singleton));
        let mut blocks = BTreeMap::new();
        if vertex_count > 0 {
            blocks.insert(SINGLETON_BUCKET, (0..vertex_count).collect());
        }
        Ok(Self { level, entity_to_block, blocks, origins: BTreeMap::new() })
    }

    /// Number of entities.
    #[must_use]
    pub fn vertex_count(&self) -> u64 {
        self.entity_to_block.len() as u64
    }

    /// Block of `entity`, if it is in range.
    #[must_use]
    pub fn block_of(&self, entity: Entity) -> Option<BlockRef> {
        usize::try_from(entity).ok().and_then(|i| self.entity_to_block.get(i).copied())
    }

    /// Members of the singleton bucket.
    pub fn singletons(&self) -> impl Iterator<Item = Entity> + '_ {
        self.blocks.get(&SINGLETON_BUCKET).into_iter().flatten().copied()
    }

    /// Real blocks with their members.
    pub fn real_blocks(&self) -> impl Iterator<Item = (LocalBlockId, &BTreeSet<Entity>)> + '_ {
        self.blocks.iter().filter(|&(&id, _)| id != SINGLETON_BUCKET).map(|(&id, s)| (id, s))
    }

    /// Live singletons.
    #[must_use]
    pub fn singleton_count(&self) -> u64 {
        self.blocks.get(&SINGLETON_BUCKET).map_or(0, |s| s.len() as u64)
    }

    /// Live blocks, singletons counted one each.
    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.real_blocks().count() as u64 + self.singleton_count()
    }

    /// `size → number of real blocks of that size`.
    #[must_use]
    pub fn size_distribution(&self) -> BTreeMap<u64, u64> {
        let mut out = BTreeMap::new();
        for (_, members) in self.real_blocks() {
            *out.entry(members.len() as u64).or_insert(0) += 1;
        }
        out
    }

    /// Assignment in wire encoding (`id`, or `-entity-1` for singletons).
    #[must_use]
    pub fn encoded_assignment(&self) -> Vec<i64> {
        self.entity_to_block.iter().map(|b| b.code()).collect()
    }

    /// Global id of every live block.
    ///
    /// Real blocks resolve at their origin level; singletons are their own
    /// global id.
    pub fn global_ids(&self, ids: &IdentifierMap) -> Result<BTreeMap<BlockRef, GlobalBlockId>> {
        let mut out = BTreeMap::new();
        for (id, _) in self.real_blocks() {
            let origin = self
                .origins
                .get(&id)
                .copied()
                .ok_or_else(|| violation!("live block {id} at level {} has no origin", self.level))?;
            out.insert(BlockRef::Real(id), ids.resolve(i64::from(id), origin)?);
        }
        for e in self.singletons() {
            out.insert(BlockRef::Singleton(e), GlobalBlockId::singleton(e));
        }
        Ok(out)
    }

    /// Check that blocks and assignment describe the same exact partition.
    ///
    /// Every entity must sit in exactly one block, the block it is assigned
    /// to, and no real block may be empty.
    pub fn verify(&self) -> Result<()> {
        let level = self.level;
        let mut seen = 0u64;
        for (&id, members) in &self.blocks {
            ensure_invariant!(
                id == SINGLETON_BUCKET || !members.is_empty(),
                "block {id} is empty at level {level}"
            );
            ensure_invariant!(
                id == SINGLETON_BUCKET || self.origins.contains_key(&id),
                "block {id} has no origin at level {level}"
            );
            for &e in members {
                let want = if id == SINGLETON_BUCKET {
                    BlockRef::Singleton(e)
                } else {
                    BlockRef::Real(id)
                };
                match self.block_of(e) {
                    Some(got) if got == want => {}
                    Some(got) => {
                        return Err(violation!(
                            "entity {e} listed in bucket {id} but assigned to {got} at level {level}"
                        ))
                    }
                    None => {
                        return Err(violation!(
                            "entity {e} in block {id} is outside 0..{} at level {level}",
                            self.vertex_count()
                        ))
                    }
                }
                seen += 1;
            }
        }
        ensure_invariant!(
            seen == self.vertex_count(),
            "blocks at level {level} cover {seen} memberships for {} entities",
            self.vertex_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Partition {
        let mut p = Partition::all_singletons(2, 5).unwrap();
        p.blocks.insert(SINGLETON_BUCKET, BTreeSet::from([4]));
        p.blocks.insert(3, BTreeSet::from([0, 2]));
        p.blocks.insert(8, BTreeSet::from([1, 3]));
        p.origins.insert(3, 1);
        p.origins.insert(8, 2);
        p.entity_to_block = vec![
            BlockRef::Real(3),
            BlockRef::Real(8),
            BlockRef::Real(3),
            BlockRef::Real(8),
            BlockRef::Singleton(4),
        ];
        p
    }

    #[test]
    fn counts_and_distribution() {
        let p = sample();
        p.verify().unwrap();
        assert_eq!(p.singleton_count(), 1);
        assert_eq!(p.block_count(), 3);
        assert_eq!(p.size_distribution(), BTreeMap::from([(2, 2)]));
        assert_eq!(p.encoded_assignment(), vec![3, 8, 3, 8, -5]);
    }

    #[test]
    fn verify_catches_double_membership() {
        let mut p = sample();
        p.blocks.get_mut(&8).unwrap().insert(0);
        assert!(p.verify().is_err());
    }

    #[test]
    fn verify_catches_missing_entity() {
        let mut p = sample();
        p.blocks.remove(&SINGLETON_BUCKET);
        assert!(p.verify().is_err());
    }

    #[test]
    fn global_ids_use_origin_levels() {
        let mut ids = IdentifierMap::new(false);
        ids.insert(3, 1, GlobalBlockId(10)).unwrap();
        ids.insert(8, 2, GlobalBlockId(11)).unwrap();
        ids.insert(8, 1, GlobalBlockId(12)).unwrap();
        let g = sample().global_ids(&ids).unwrap();
        assert_eq!(g[&BlockRef::Real(3)], GlobalBlockId(10));
        assert_eq!(g[&BlockRef::Real(8)], GlobalBlockId(11));
        assert_eq!(g[&BlockRef::Singleton(4)], GlobalBlockId(-5));
    }
}
