//! Decoders and partition reconstruction for compact bisimulation traces.
//!
//! A refinement engine persists full block membership only for its first
//! level, plus per-transition split and singleton-migration deltas, block
//! lifetime intervals, a local→global identifier table and a condensed
//! summary graph. This crate decodes every one of those files and replays
//! the deltas:
//!
//! - `store`: where trace files come from (`ExperimentDir`, `MemoryStore`).
//! - `graph`, `intervals`, `identifiers`, `snapshot`, `delta`: one decoder
//!   per file role, all built on `lodsum_core::RecordReader`.
//! - `reconstruct`: exact partition of any level (`Partition`).
//! - `histogram`: block-size histograms and split ledgers from headers only.
//! - `calculator`: edge validity intervals.
//! - `lineage`: refines edges in global id space.
//! - `generator`: deterministic synthetic traces for tests and benches.
//!
//! [`Trace`] ties these together for one experiment.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

/// Edge validity intervals.
pub mod calculator;
/// Reader configuration.
pub mod config;
/// Split-mapping and singleton-migration decoders.
pub mod delta;
/// Record shapes of every file role.
pub mod format;
/// Synthetic trace generator.
pub mod generator;
/// Summary graph decoder.
pub mod graph;
/// Size histograms and split ledgers.
pub mod histogram;
/// Local→global identifier map.
pub mod identifiers;
/// Block lifetime interval decoder.
pub mod intervals;
/// Refines edges between levels.
pub mod lineage;
/// Run and level statistics.
pub mod metadata;
/// Partition snapshot type.
pub mod partition;
/// Partition replay.
pub mod reconstruct;
/// Level outcome decoder.
pub mod snapshot;
/// Trace file roles and sources.
pub mod store;

use calculator::{EdgeWithInterval, IntervalCalculator};
use config::TraceConfig;
use graph::SummaryEdge;
use histogram::LevelSizes;
use identifiers::IdentifierMap;
use lineage::RefinesEdge;
use lodsum_core::{violation, GlobalBlockId, Interval, Level, Result};
use metadata::{DataEdgeStats, GraphStats, LevelStats, SummaryGraphStats};
use partition::Partition;
use reconstruct::PartitionTraceReconstructor;
use std::collections::BTreeMap;
use store::{TraceFile, TraceStore};
use tracing::info;

/// One experiment: a store, its configuration and its run statistics.
#[derive(Debug)]
pub struct Trace<S> {
    store: S,
    config: TraceConfig,
    stats: GraphStats,
}

impl<S: TraceStore> Trace<S> {
    /// Open a trace; run statistics are required.
    pub fn open(store: S, config: TraceConfig) -> Result<Self> {
        let stats = GraphStats::load(&store)?;
        info!(
            vertices = stats.vertex_count,
            depth = stats.final_depth,
            fixed_point = stats.fixed_point,
            map_format = %config.map_format,
            "opened trace"
        );
        Ok(Self { store, config, stats })
    }

    /// Underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Active configuration.
    pub const fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Run statistics.
    pub const fn stats(&self) -> &GraphStats {
        &self.stats
    }

    /// First reconstructible level.
    pub const fn first_level(&self) -> Level {
        self.config.first_level()
    }

    /// Final depth of the run.
    pub const fn depth(&self) -> Level {
        self.stats.final_depth
    }

    /// Final depth, or `None` if `require_fixed` and no fixed point was reached.
    pub const fn fixed_level(&self, require_fixed: bool) -> Option<Level> {
        self.stats.fixed_level(require_fixed)
    }

    /// Fixed level under the configured `require_fixed_point`.
    fn configured_fixed_level(&self) -> Result<Level> {
        self.fixed_level(self.config.require_fixed_point).ok_or_else(|| {
            violation!("run stopped at depth {} without reaching a fixed point", self.depth())
        })
    }

    /// Decode the summary graph.
    pub fn summary_graph(&self) -> Result<Vec<SummaryEdge>> {
        graph::decode_summary_graph(self.store.open_required(&TraceFile::SummaryGraph)?)
    }

    /// Decode the node lifetime intervals.
    pub fn intervals(&self) -> Result<BTreeMap<GlobalBlockId, Interval>> {
        intervals::decode_intervals(self.store.open_required(&TraceFile::Intervals)?)
    }

    /// Decode the local→global map in the configured sub-format.
    pub fn identifiers(&self, with_inverse: bool) -> Result<IdentifierMap> {
        IdentifierMap::decode(
            self.store.open_required(&TraceFile::LocalGlobalMap)?,
            self.config.map_format,
            with_inverse,
        )
    }

    /// Per-level statistics, if written.
    pub fn level_stats(&self, level: Level) -> Result<Option<LevelStats>> {
        LevelStats::load(&self.store, level)
    }

    /// Size and cost of the summary graph.
    pub fn summary_graph_stats(&self) -> Result<SummaryGraphStats> {
        SummaryGraphStats::load(&self.store)
    }

    /// Data-edge step costs, including the fixed-point step when written.
    pub fn data_edge_stats(&self) -> Result<DataEdgeStats> {
        DataEdgeStats::load(&self.store, self.first_level(), self.depth())
    }

    /// Fresh reconstructor over this trace.
    pub fn reconstructor(&self) -> PartitionTraceReconstructor<'_, S> {
        PartitionTraceReconstructor::new(&self.store, &self.stats, self.config)
    }

    /// Partition at level `k`, replayed from scratch.
    pub fn reconstruct(&self, k: Level) -> Result<Partition> {
        self.reconstructor().reconstruct(k)
    }

    /// Partition at the fixed level.
    pub fn reconstruct_fixed(&self) -> Result<Partition> {
        self.reconstruct(self.configured_fixed_level()?)
    }

    /// Size histogram and split ledger of every level.
    pub fn size_histogram(&self) -> Result<Vec<LevelSizes>> {
        histogram::size_histogram(&self.store, self.first_level(), self.depth())
    }

    /// Every summary edge with its validity interval.
    pub fn edge_intervals(&self) -> Result<Vec<EdgeWithInterval>> {
        let fixed = self.configured_fixed_level()?;
        let nodes = self.intervals()?;
        let calc = IntervalCalculator::new(&nodes, Some(fixed));
        let out = graph::summary_edges(self.store.open_required(&TraceFile::SummaryGraph)?)
            .map(|edge| calc.annotate(edge?))
            .collect::<Result<Vec<_>>>()?;
        info!(edges = out.len(), fixed, "computed edge intervals");
        Ok(out)
    }

    /// Refines edges of every transition.
    pub fn lineage(&self, ids: &IdentifierMap) -> Result<Vec<RefinesEdge>> {
        lineage::lineage(&self.store, ids, self.first_level(), self.depth())
    }
}
