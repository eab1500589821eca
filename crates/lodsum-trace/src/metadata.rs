// crates/lodsum-trace/src/metadata.rs

//! Side-channel run and level statistics written next to the binary trace.

use crate::store::{TraceFile, TraceStore};
use lodsum_core::{Level, Result, TraceError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;

/// Run-wide statistics (`graph_stats.json`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Number of entities; ids are `0..vertex_count`.
    #[serde(rename = "Vertex count")]
    pub vertex_count: u64,
    /// Number of input edges.
    #[serde(rename = "Edge count")]
    pub edge_count: u64,
    /// Last level the engine computed.
    #[serde(rename = "Final depth")]
    pub final_depth: Level,
    /// Whether `final_depth` is a true fixed point.
    #[serde(rename = "Fixed point")]
    pub fixed_point: bool,
    /// Wall time of the whole run.
    #[serde(rename = "Total time taken (ms)", default, skip_serializing_if = "Option::is_none")]
    pub total_time_ms: Option<u64>,
    /// Peak resident memory of the run.
    #[serde(
        rename = "Maximum memory footprint (kB)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_memory_kb: Option<u64>,
    /// Any further keys, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl GraphStats {
    /// Decode from `store`; the file is required.
    pub fn load<S: TraceStore + ?Sized>(store: &S) -> Result<Self> {
        load_json(store, &TraceFile::GraphStats)?
            .ok_or_else(|| TraceError::MissingFile(TraceFile::GraphStats.relative_path()))
    }

    /// `final_depth`, or `None` if a fixed point is required and was not reached.
    #[must_use]
    pub const fn fixed_level(&self, require_fixed: bool) -> Option<Level> {
        if require_fixed && !self.fixed_point {
            None
        } else {
            Some(self.final_depth)
        }
    }
}

/// Per-level statistics (`statistics_condensed-LLLL.json`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Live blocks at this level, singletons included.
    #[serde(rename = "Block count")]
    pub block_count: u64,
    /// Live singleton blocks at this level.
    #[serde(rename = "Singleton count")]
    pub singleton_count: u64,
    /// Blocks created so far, over all levels.
    #[serde(rename = "Accumulated block count")]
    pub accumulated_block_count: u64,
    /// Wall time of this level.
    #[serde(rename = "Time taken (ms)", default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    /// Memory footprint after this level.
    #[serde(rename = "Memory footprint (kB)", default, skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
}

impl LevelStats {
    /// Decode statistics of `level`; `None` if the run did not write them.
    pub fn load<S: TraceStore + ?Sized>(store: &S, level: Level) -> Result<Option<Self>> {
        load_json(store, &TraceFile::LevelStats(level))
    }
}

/// Size and cost of the condensed summary graph (`summary_graph_stats.json`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryGraphStats {
    /// Summary nodes, over all levels.
    #[serde(rename = "Vertex count")]
    pub vertex_count: u64,
    /// Summary edges.
    #[serde(rename = "Edge count")]
    pub edge_count: u64,
    /// Wall time of the summary graph construction.
    #[serde(rename = "Total time taken (ms)", default, skip_serializing_if = "Option::is_none")]
    pub total_time_ms: Option<u64>,
    /// Peak memory of the summary graph construction.
    #[serde(
        rename = "Maximum memory footprint (kB)",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub max_memory_kb: Option<u64>,
    /// Any further keys, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl SummaryGraphStats {
    /// Decode from `store`; the file is required.
    pub fn load<S: TraceStore + ?Sized>(store: &S) -> Result<Self> {
        load_json(store, &TraceFile::SummaryGraphStats)?
            .ok_or_else(|| TraceError::MissingFile(TraceFile::SummaryGraphStats.relative_path()))
    }
}

/// Cost of one data-edge step (`data_edges_statistics_condensed-UUUUtoLLLL.json`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStats {
    /// Wall time of the step.
    #[serde(rename = "Time taken (ms)", default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    /// Memory footprint after the step.
    #[serde(rename = "Memory footprint (kB)", default, skip_serializing_if = "Option::is_none")]
    pub memory_kb: Option<u64>,
}

/// Data-edge step costs of a whole run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEdgeStats {
    /// `(lower, stats)` of every step `lower + 1 → lower`, ascending.
    pub steps: Vec<(Level, StepStats)>,
    /// The `depth → depth` step, written only for runs that reached a fixed point.
    pub fixed_point: Option<StepStats>,
}

impl DataEdgeStats {
    /// Decode the steps `first..depth`, which are required, and the optional
    /// fixed-point step.
    pub fn load<S: TraceStore + ?Sized>(store: &S, first: Level, depth: Level) -> Result<Self> {
        let mut steps = Vec::with_capacity(usize::from(depth.saturating_sub(first)));
        for lower in first..depth {
            let file = TraceFile::DataEdgeStats { upper: lower + 1, lower };
            let stats = load_json(store, &file)?
                .ok_or_else(|| TraceError::MissingFile(file.relative_path()))?;
            steps.push((lower, stats));
        }
        let fixed_point = load_json(store, &TraceFile::DataEdgeStats { upper: depth, lower: depth })?;
        Ok(Self { steps, fixed_point })
    }
}

fn load_json<T, S>(store: &S, file: &TraceFile) -> Result<Option<T>>
where
    T: DeserializeOwned,
    S: TraceStore + ?Sized,
{
    let Some(rdr) = store.open(file)? else {
        return Ok(None);
    };
    serde_json::from_reader(rdr)
        .map(Some)
        .map_err(|source| TraceError::Metadata { path: file.relative_path(), source })
}

/// Serialize a metadata record the way the engine lays it out.
pub(crate) fn to_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    serde_json::to_writer_pretty(&mut out, value).map_err(std::io::Error::from)?;
    out.write_all(b"\n")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const STATS: &str = r#"{
        "Vertex count": 12,
        "Edge count": 40,
        "Final depth": 4,
        "Fixed point": false,
        "Total time taken (ms)": 7,
        "Engine": "condensed"
    }"#;

    #[test]
    fn graph_stats_keep_unknown_keys() {
        let mut store = MemoryStore::new();
        store.insert(TraceFile::GraphStats, STATS.as_bytes().to_vec());
        let stats = GraphStats::load(&store).unwrap();
        assert_eq!(stats.vertex_count, 12);
        assert_eq!(stats.final_depth, 4);
        assert_eq!(stats.total_time_ms, Some(7));
        assert_eq!(stats.max_memory_kb, None);
        assert_eq!(stats.extra["Engine"], "condensed");
        assert_eq!(stats.fixed_level(false), Some(4));
        assert_eq!(stats.fixed_level(true), None);
    }

    #[test]
    fn missing_key_is_metadata_error() {
        let mut store = MemoryStore::new();
        store.insert(TraceFile::GraphStats, br#"{"Vertex count": 1}"#.to_vec());
        assert!(matches!(GraphStats::load(&store), Err(TraceError::Metadata { .. })));
        assert!(matches!(
            GraphStats::load(&MemoryStore::new()),
            Err(TraceError::MissingFile(_))
        ));
    }

    #[test]
    fn data_edge_fixed_point_step_is_optional() {
        let mut store = MemoryStore::new();
        let step = StepStats { time_ms: Some(3), memory_kb: Some(64) };
        for lower in 1..3 {
            store.insert(
                TraceFile::DataEdgeStats { upper: lower + 1, lower },
                to_json_bytes(&step).unwrap(),
            );
        }
        let stats = DataEdgeStats::load(&store, 1, 3).unwrap();
        assert_eq!(stats.steps, vec![(1, step), (2, step)]);
        assert_eq!(stats.fixed_point, None);

        store.insert(
            TraceFile::DataEdgeStats { upper: 3, lower: 3 },
            br#"{"Time taken (ms)": 5}"#.to_vec(),
        );
        let stats = DataEdgeStats::load(&store, 1, 3).unwrap();
        assert_eq!(stats.fixed_point, Some(StepStats { time_ms: Some(5), memory_kb: None }));

        store.remove(&TraceFile::DataEdgeStats { upper: 2, lower: 1 });
        match DataEdgeStats::load(&store, 1, 3) {
            Err(TraceError::MissingFile(p)) => {
                assert_eq!(p, "ad_hoc_results/data_edges_statistics_condensed-0002to0001.json");
            }
            other => panic!("expected missing file, got {other:?}"),
        };
    }

    #[test]
    fn summary_graph_stats_are_required() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            SummaryGraphStats::load(&store),
            Err(TraceError::MissingFile(_))
        ));
        store.insert(
            TraceFile::SummaryGraphStats,
            br#"{"Vertex count": 30, "Edge count": 71, "Total time taken (ms)": 12}"#.to_vec(),
        );
        let stats = SummaryGraphStats::load(&store).unwrap();
        assert_eq!((stats.vertex_count, stats.edge_count), (30, 71));
        assert_eq!(stats.total_time_ms, Some(12));
        assert!(stats.extra.is_empty());
    }

    #[test]
    fn level_stats_are_optional() {
        let mut store = MemoryStore::new();
        let stats = LevelStats {
            block_count: 5,
            singleton_count: 2,
            accumulated_block_count: 9,
            time_ms: None,
            memory_kb: Some(1024),
        };
        store.insert(TraceFile::LevelStats(2), to_json_bytes(&stats).unwrap());
        assert_eq!(LevelStats::load(&store, 2).unwrap(), Some(stats));
        assert_eq!(LevelStats::load(&store, 3).unwrap(), None);
    }
}
