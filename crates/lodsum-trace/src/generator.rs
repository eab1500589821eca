// crates/lodsum-trace/src/generator.rs

//! Deterministic synthetic trace generator used by tests, benches and the
//! CLI `simulate` subcommand.
//!
//! The generated refinement is random but internally consistent: every
//! file a real engine run would write is present and agrees with the
//! others.

use crate::calculator::IntervalCalculator;
use crate::delta::{
    encode_singleton_migrations, encode_split_mapping, SingletonMigration, SplitRecord,
};
use crate::format::{BLOCK_INTERVAL, SUMMARY_EDGE};
use crate::graph::SummaryEdge;
use crate::identifiers::{IdentifierMap, MapFormat};
use crate::metadata::{to_json_bytes, GraphStats, LevelStats, StepStats, SummaryGraphStats};
use crate::snapshot::encode_snapshot;
use crate::store::{MemoryStore, TraceFile};
use lodsum_core::{
    Entity, GlobalBlockId, Interval, Level, LocalBlockId, RecordWriter, Result, TraceError,
    SINGLETON_BUCKET,
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng as _, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Shape of a synthetic trace.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyntheticParams {
    /// Entity universe size.
    pub vertices: u64,
    /// Final depth.
    pub depth: Level,
    /// Target number of summary edges.
    pub edges: usize,
    /// RNG seed.
    pub seed: u64,
    /// Sub-format of the written local→global map.
    pub map_format: MapFormat,
    /// Materialize a level-0 outcome.
    pub typed_start: bool,
    /// Probability that a live block splits at a transition.
    pub split_probability: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            vertices: 64,
            depth: 4,
            edges: 96,
            seed: 42,
            map_format: MapFormat::Current,
            typed_start: false,
            split_probability: 0.5,
        }
    }
}

/// Mutable bookkeeping while generating.
struct Run {
    rng: StdRng,
    live: BTreeMap<LocalBlockId, (GlobalBlockId, Vec<Entity>)>,
    singletons: BTreeSet<Entity>,
    ids: IdentifierMap,
    lifetimes: BTreeMap<GlobalBlockId, (Level, Option<Level>)>,
    next_local: LocalBlockId,
    next_global: i64,
    created: u64,
}

impl Run {
    fn create(&mut self, level: Level, local: LocalBlockId, members: Vec<Entity>) -> Result<()> {
        let global = GlobalBlockId(self.next_global);
        self.next_global += 1;
        self.ids.insert(i64::from(local), level, global)?;
        self.lifetimes.insert(global, (level, None));
        self.live.insert(local, (global, members));
        self.created += 1;
        Ok(())
    }

    fn make_singleton(&mut self, level: Level, e: Entity) {
        self.singletons.insert(e);
        self.lifetimes.insert(GlobalBlockId::singleton(e), (level, None));
    }

    fn fresh_local(&mut self) -> LocalBlockId {
        let id = self.next_local;
        self.next_local += 1;
        id
    }

    fn level_stats(&self) -> LevelStats {
        LevelStats {
            block_count: self.live.len() as u64 + self.singletons.len() as u64,
            singleton_count: self.singletons.len() as u64,
            accumulated_block_count: self.created,
            time_ms: Some(0),
            memory_kb: None,
        }
    }

    /// Cut `members` into `min_parts..=max_parts` random non-empty parts.
    fn cut(
        &mut self,
        mut members: Vec<Entity>,
        min_parts: usize,
        max_parts: usize,
    ) -> Vec<Vec<Entity>> {
        members.shuffle(&mut self.rng);
        let max_parts = members.len().min(max_parts).max(1);
        let parts = if max_parts <= min_parts {
            max_parts
        } else {
            self.rng.random_range(min_parts..=max_parts)
        };
        let mut cuts: BTreeSet<usize> = BTreeSet::new();
        while cuts.len() + 1 < parts {
            cuts.insert(self.rng.random_range(1..members.len()));
        }
        let mut out = Vec::with_capacity(parts);
        let mut prev = 0;
        for c in cuts.into_iter().chain(std::iter::once(members.len())) {
            out.push(members[prev..c].to_vec());
            prev = c;
        }
        out
    }
}

/// Generate a complete trace in memory.
pub fn generate_trace(params: &SyntheticParams) -> Result<MemoryStore> {
    if !(0.0..=1.0).contains(&params.split_probability) {
        return Err(TraceError::Config(format!(
            "split probability {} outside [0, 1]",
            params.split_probability
        )));
    }
    let first: Level = if params.typed_start { 0 } else { 1 };
    let depth = params.depth.max(first);
    let mut store = MemoryStore::new();
    let mut run = Run {
        rng: StdRng::seed_from_u64(params.seed),
        live: BTreeMap::new(),
        singletons: BTreeSet::new(),
        ids: IdentifierMap::new(false),
        lifetimes: BTreeMap::new(),
        next_local: 1,
        next_global: 1,
        created: 0,
    };

    // First level: random blocks, roughly one entity in ten left alone.
    let universe: Vec<Entity> = (0..params.vertices).collect();
    let mut grouped = Vec::new();
    for e in universe {
        if run.rng.random_bool(0.1) {
            run.make_singleton(first, e);
        } else {
            grouped.push(e);
        }
    }
    let initial = if grouped.is_empty() {
        Vec::new()
    } else {
        let max_parts = grouped.len() / 3;
        run.cut(grouped, 1, max_parts)
    };
    let mut outcome = Vec::new();
    for part in initial {
        if part.len() == 1 {
            run.make_singleton(first, part[0]);
        } else {
            let id = run.fresh_local();
            outcome.push((id, part.clone()));
            run.create(first, id, part)?;
        }
    }
    store.insert(
        TraceFile::Outcome(first),
        encode_snapshot(outcome.iter().map(|(id, m)| (*id, m.as_slice())))?,
    );
    store.insert(TraceFile::LevelStats(first), to_json_bytes(&run.level_stats())?);

    for level in first + 1..=depth {
        let from = level - 1;
        let candidates: Vec<LocalBlockId> = run
            .live
            .iter()
            .filter(|(_, (_, m))| m.len() >= 2)
            .map(|(&id, _)| id)
            .collect();

        let mut splits = Vec::new();
        let mut migrations = Vec::new();
        let mut outcome = Vec::new();
        for parent in candidates {
            if !run.rng.random_bool(params.split_probability) {
                continue;
            }
            let Some((global, members)) = run.live.remove(&parent) else {
                continue;
            };
            if let Some(life) = run.lifetimes.get_mut(&global) {
                life.1 = Some(from);
            }

            let mut children = Vec::new();
            let mut shed = Vec::new();
            for part in run.cut(members, 2, 4) {
                if part.len() == 1 {
                    shed.push(part[0]);
                    continue;
                }
                let id = if children.is_empty() { parent } else { run.fresh_local() };
                children.push(id);
                outcome.push((id, part.clone()));
                run.create(level, id, part)?;
            }
            if !shed.is_empty() {
                children.push(SINGLETON_BUCKET);
                for &e in &shed {
                    run.make_singleton(level, e);
                }
                migrations.push(SingletonMigration { parent, entities: shed });
            }
            splits.push(SplitRecord { parent, children });
        }

        debug!(level, splits = splits.len(), created = outcome.len(), "generated transition");
        store.insert(TraceFile::SplitMapping { from }, encode_split_mapping(&splits)?);
        if !migrations.is_empty() {
            store.insert(
                TraceFile::SingletonMapping { from },
                encode_singleton_migrations(&migrations)?,
            );
        }
        store.insert(
            TraceFile::Outcome(level),
            encode_snapshot(outcome.iter().map(|(id, m)| (*id, m.as_slice())))?,
        );
        store.insert(TraceFile::LevelStats(level), to_json_bytes(&run.level_stats())?);
    }

    // Lifetimes close at the final depth when nothing retired them.
    let nodes: BTreeMap<GlobalBlockId, Interval> = run
        .lifetimes
        .iter()
        .filter_map(|(&g, &(start, end))| {
            Interval::new(start, end.unwrap_or(depth)).map(|iv| (g, iv))
        })
        .collect();
    let mut w = RecordWriter::new(Vec::new());
    for (g, iv) in &nodes {
        w.write_record(&BLOCK_INTERVAL, &[g.0, i64::from(iv.start()), i64::from(iv.end())])?;
    }
    store.insert(TraceFile::Intervals, w.into_inner());
    store.insert(TraceFile::LocalGlobalMap, run.ids.encode(params.map_format)?);

    let edges = summary_edges(&mut run.rng, &nodes, depth, params.edges);
    let mut w = RecordWriter::new(Vec::new());
    for e in &edges {
        w.write_record(&SUMMARY_EDGE, &[e.subject.0, i64::from(e.predicate), e.object.0])?;
    }
    store.insert(TraceFile::SummaryGraph, w.into_inner());

    let stats = GraphStats {
        vertex_count: params.vertices,
        edge_count: edges.len() as u64,
        final_depth: depth,
        fixed_point: true,
        total_time_ms: Some(0),
        max_memory_kb: None,
        extra: BTreeMap::new(),
    };
    store.insert(TraceFile::GraphStats, to_json_bytes(&stats)?);

    let summary = SummaryGraphStats {
        vertex_count: nodes.len() as u64,
        edge_count: edges.len() as u64,
        total_time_ms: Some(0),
        max_memory_kb: None,
        extra: BTreeMap::new(),
    };
    store.insert(TraceFile::SummaryGraphStats, to_json_bytes(&summary)?);
    let step = to_json_bytes(&StepStats { time_ms: Some(0), memory_kb: None })?;
    for lower in first..depth {
        store.insert(TraceFile::DataEdgeStats { upper: lower + 1, lower }, step.clone());
    }
    store.insert(TraceFile::DataEdgeStats { upper: depth, lower: depth }, step);
    Ok(store)
}

/// Random distinct edges whose validity interval is non-empty.
fn summary_edges(
    rng: &mut StdRng,
    nodes: &BTreeMap<GlobalBlockId, Interval>,
    depth: Level,
    target: usize,
) -> Vec<SummaryEdge> {
    let ids: Vec<GlobalBlockId> = nodes.keys().copied().collect();
    let mut out = Vec::new();
    if ids.is_empty() {
        return out;
    }
    let calc = IntervalCalculator::new(nodes, Some(depth));
    let mut seen = BTreeSet::new();
    for _ in 0..target.saturating_mul(8) {
        if out.len() >= target {
            break;
        }
        let subject = ids[rng.random_range(0..ids.len())];
        let object = ids[rng.random_range(0..ids.len())];
        let predicate = rng.random_range(0u32..8);
        let valid = calc.edge_interval(subject, object).is_ok();
        if valid && seen.insert((subject, predicate, object)) {
            out.push(SummaryEdge { subject, predicate, object });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_bytes() {
        let p = SyntheticParams::default();
        assert_eq!(generate_trace(&p).unwrap(), generate_trace(&p).unwrap());
        let q = SyntheticParams { seed: 7, ..p };
        assert_ne!(generate_trace(&p).unwrap(), generate_trace(&q).unwrap());
    }

    #[test]
    fn writes_every_required_file() {
        let p = SyntheticParams { typed_start: true, ..SyntheticParams::default() };
        let store = generate_trace(&p).unwrap();
        for file in [
            TraceFile::GraphStats,
            TraceFile::SummaryGraph,
            TraceFile::Intervals,
            TraceFile::LocalGlobalMap,
            TraceFile::Outcome(0),
            TraceFile::SplitMapping { from: 0 },
            TraceFile::Outcome(p.depth),
            TraceFile::SplitMapping { from: p.depth - 1 },
            TraceFile::SummaryGraphStats,
            TraceFile::DataEdgeStats { upper: 1, lower: 0 },
            TraceFile::DataEdgeStats { upper: p.depth, lower: p.depth },
        ] {
            assert!(store.get(&file).is_some(), "{file} missing");
        }
        assert!(store.get(&TraceFile::SplitMapping { from: p.depth }).is_none());
    }

    #[test]
    fn bad_probability_is_config_error() {
        let p = SyntheticParams { split_probability: 1.5, ..SyntheticParams::default() };
        assert!(matches!(generate_trace(&p), Err(TraceError::Config(_))));
    }

    #[test]
    fn tiny_universes_are_all_singletons() {
        for vertices in [0, 1] {
            let p = SyntheticParams { vertices, ..SyntheticParams::default() };
            let store = generate_trace(&p).unwrap();
            assert_eq!(store.get(&TraceFile::Outcome(1)), Some(&[][..]));
        }
    }
}
