// crates/lodsum-trace/src/reconstruct.rs

//! Replay a compact trace into the exact partition of any level.
//!
//! Only the first level's outcome lists the full membership. Every later
//! outcome lists just the blocks created by that transition, so level `k`
//! is reached by applying transitions `first → first+1 → … → k` in order:
//!
//! 1. retire every split parent, releasing its members as *orphans*,
//! 2. mark the orphans that the transition turns into singletons as
//!    *pending*,
//! 3. apply the outcome, which reassigns orphans to the new child blocks,
//! 4. fold every orphan left over into the singleton bucket.
//!
//! An entity listed as a migrated singleton and then reclaimed by the same
//! transition's outcome is tolerated but counted and logged at `warn`.
//!
//! The reconstructor owns its accumulator. [`PartitionTraceReconstructor::reconstruct`]
//! returns a detached [`Partition`] copy; it never hands out the live state.

use crate::config::TraceConfig;
use crate::delta::{decode_singleton_migrations, decode_split_mapping};
use crate::metadata::{GraphStats, LevelStats};
use crate::partition::Partition;
use crate::snapshot::snapshot_blocks;
use crate::store::{TraceFile, TraceStore};
use lodsum_core::{
    ensure_invariant, violation, BlockRef, Entity, Level, LocalBlockId, Result, TraceError,
    SINGLETON_BUCKET,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Stateful replayer over one trace.
#[derive(Debug)]
pub struct PartitionTraceReconstructor<'t, S: ?Sized> {
    store: &'t S,
    config: TraceConfig,
    vertex_count: u64,
    depth: Level,
    state: Option<Partition>,
    reclaimed: u64,
}

impl<'t, S: TraceStore + ?Sized> PartitionTraceReconstructor<'t, S> {
    /// Reconstructor over `store`, sized by its run statistics.
    pub const fn new(store: &'t S, stats: &GraphStats, config: TraceConfig) -> Self {
        Self {
            store,
            config,
            vertex_count: stats.vertex_count,
            depth: stats.final_depth,
            state: None,
            reclaimed: 0,
        }
    }

    /// First reconstructible level.
    #[must_use]
    pub const fn first_level(&self) -> Level {
        self.config.first_level()
    }

    /// Last reconstructible level.
    #[must_use]
    pub const fn depth(&self) -> Level {
        self.depth
    }

    /// Level of the live accumulator, if any level has been replayed.
    #[must_use]
    pub fn level(&self) -> Option<Level> {
        self.state.as_ref().map(|p| p.level)
    }

    /// Migrated singletons reclaimed by an outcome since the last reset.
    #[must_use]
    pub const fn reclaimed_singletons(&self) -> u64 {
        self.reclaimed
    }

    /// Partition at level `k`.
    ///
    /// Continues from the live accumulator when it is at or below `k`,
    /// otherwise replays from the first level.
    pub fn reconstruct(&mut self, k: Level) -> Result<Partition> {
        let first = self.first_level();
        if k < first || k > self.depth {
            return Err(TraceError::LevelOutOfRange { level: k, first, depth: self.depth });
        }
        if self.level().map_or(true, |l| l > k) {
            self.reset()?;
        }
        while let Some(l) = self.level().filter(|&l| l < k) {
            self.advance(l + 1)?;
        }
        self.state
            .clone()
            .ok_or_else(|| violation!("no partition after replaying to level {k}"))
    }

    /// Drop the accumulator and load the first level's outcome.
    pub fn reset(&mut self) -> Result<()> {
        let level = self.first_level();
        self.state = None;
        self.reclaimed = 0;

        let mut p = Partition::all_singletons(level, self.vertex_count)?;
        let rdr = self.store.open_required(&TraceFile::Outcome(level))?;
        for block in snapshot_blocks(rdr) {
            let block = block?;
            let id = block.id;
            ensure_invariant!(
                !p.blocks.contains_key(&id),
                "outcome of level {level} lists block {id} twice"
            );
            let mut members = BTreeSet::new();
            for e in block.entities {
                let slot = slot_mut(&mut p.entity_to_block, e, level)?;
                ensure_invariant!(
                    slot.is_singleton(),
                    "entity {e} is listed in both {slot} and block {id} at level {level}"
                );
                *slot = BlockRef::Real(id);
                if let Some(bucket) = p.blocks.get_mut(&SINGLETON_BUCKET) {
                    bucket.remove(&e);
                }
                members.insert(e);
            }
            p.blocks.insert(id, members);
            p.origins.insert(id, level);
        }
        if p.blocks.get(&SINGLETON_BUCKET).is_some_and(BTreeSet::is_empty) {
            p.blocks.remove(&SINGLETON_BUCKET);
        }

        debug!(level, blocks = p.blocks.len(), "loaded first outcome");
        self.finish_level(&p)?;
        self.state = Some(p);
        Ok(())
    }

    /// Apply the transition `to - 1 → to` to the accumulator.
    ///
    /// The accumulator is taken for the duration of the step and put back
    /// only once the new level passes its checks. On error it stays empty, so
    /// the next call replays from the first level.
    fn advance(&mut self, to: Level) -> Result<()> {
        let Some(mut p) = self.state.take() else {
            return Err(violation!("transition to level {to} before any level was loaded"));
        };
        let from = p.level;
        ensure_invariant!(to == from + 1, "cannot jump from level {from} to {to}");

        let splits = decode_split_mapping(
            self.store.open_required(&TraceFile::SplitMapping { from })?,
        )?;
        let migrations =
            decode_singleton_migrations(self.store.open(&TraceFile::SingletonMapping { from })?)?;

        let mut orphans: HashMap<Entity, LocalBlockId> = HashMap::new();
        let mut shedding: HashSet<LocalBlockId> = HashSet::new();
        for split in &splits {
            let parent = split.parent;
            ensure_invariant!(
                parent != SINGLETON_BUCKET,
                "split mapping {from}->{to} splits the singleton bucket"
            );
            let members = p.blocks.remove(&parent).ok_or_else(|| {
                violation!("split mapping {from}->{to} retires block {parent}, which is not live")
            })?;
            p.origins.remove(&parent);
            orphans.extend(members.into_iter().map(|e| (e, parent)));
            if split.sheds_singletons() {
                shedding.insert(parent);
            }
        }

        let mut pending: HashSet<Entity> = HashSet::new();
        match &migrations {
            Some(migs) => {
                for m in migs {
                    let parent = m.parent;
                    ensure_invariant!(
                        shedding.contains(&parent),
                        "singleton migration {from}->{to} lists block {parent}, which sheds no singletons"
                    );
                    for &e in &m.entities {
                        ensure_invariant!(
                            orphans.get(&e) == Some(&parent),
                            "singleton migration {from}->{to} moves entity {e}, which was not in block {parent}"
                        );
                        pending.insert(e);
                    }
                }
            }
            None => {
                pending.extend(
                    orphans
                        .iter()
                        .filter(|&(_, &parent)| shedding.contains(&parent))
                        .map(|(&e, _)| e),
                );
            }
        }

        let mut reclaimed = 0u64;
        let mut created = 0usize;
        let rdr = self.store.open_required(&TraceFile::Outcome(to))?;
        for block in snapshot_blocks(rdr) {
            let block = block?;
            let id = block.id;
            ensure_invariant!(
                !p.blocks.contains_key(&id),
                "outcome of level {to} creates block {id}, which is still live"
            );
            let mut members = BTreeSet::new();
            for e in block.entities {
                ensure_invariant!(
                    orphans.remove(&e).is_some(),
                    "outcome of level {to} puts entity {e} in block {id} without a split releasing it"
                );
                if pending.remove(&e) && migrations.is_some() {
                    reclaimed += 1;
                }
                *slot_mut(&mut p.entity_to_block, e, to)? = BlockRef::Real(id);
                members.insert(e);
            }
            p.blocks.insert(id, members);
            p.origins.insert(id, to);
            created += 1;
        }

        let mut shed = 0usize;
        for (e, parent) in orphans {
            ensure_invariant!(
                pending.contains(&e),
                "entity {e} of split block {parent} is neither reassigned nor migrated at level {to}"
            );
            *slot_mut(&mut p.entity_to_block, e, to)? = BlockRef::Singleton(e);
            p.blocks.entry(SINGLETON_BUCKET).or_default().insert(e);
            shed += 1;
        }
        p.level = to;

        if reclaimed > 0 {
            warn!(
                level = to,
                reclaimed, "migrated singletons reclaimed by the same transition's outcome"
            );
        }
        debug!(level = to, splits = splits.len(), created, shed, "applied transition");

        self.finish_level(&p)?;
        self.reclaimed += reclaimed;
        self.state = Some(p);
        Ok(())
    }

    /// Postconditions and statistics cross-check for a freshly replayed level.
    fn finish_level(&self, p: &Partition) -> Result<()> {
        if self.config.verify_partition {
            p.verify()?;
        }
        if self.config.check_level_stats {
            if let Some(stats) = LevelStats::load(self.store, p.level)? {
                ensure_invariant!(
                    stats.block_count == p.block_count(),
                    "level {} has {} blocks but its statistics report {}",
                    p.level,
                    p.block_count(),
                    stats.block_count
                );
                ensure_invariant!(
                    stats.singleton_count == p.singleton_count(),
                    "level {} has {} singletons but its statistics report {}",
                    p.level,
                    p.singleton_count(),
                    stats.singleton_count
                );
            }
        }
        Ok(())
    }
}

fn slot_mut(assignment: &mut [BlockRef], entity: Entity, level: Level) -> Result<&mut BlockRef> {
    let n = assignment.len();
    usize::try_from(entity)
        .ok()
        .and_then(|i| assignment.get_mut(i))
        .ok_or_else(|| violation!("entity {entity} at level {level} is outside 0..{n}"))
}
