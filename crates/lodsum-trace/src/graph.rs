// crates/lodsum-trace/src/graph.rs

//! Condensed multi-level summary graph.

use crate::format::SUMMARY_EDGE;
use lodsum_core::{GlobalBlockId, RecordReader, Result};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// One `(subject, predicate, object)` edge between summary nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SummaryEdge {
    /// Source node (negative ids wrap a single entity).
    pub subject: GlobalBlockId,
    /// Predicate label id.
    pub predicate: u32,
    /// Target node.
    pub object: GlobalBlockId,
}

/// Lazily decode the edge stream.
pub fn summary_edges<R: Read>(rdr: R) -> impl Iterator<Item = Result<SummaryEdge>> {
    RecordReader::new(rdr).records(&SUMMARY_EDGE).map(|rec| {
        rec.map(|r| SummaryEdge {
            subject: GlobalBlockId(r.get(0)),
            predicate: r.get(1) as u32,
            object: GlobalBlockId(r.get(2)),
        })
    })
}

/// Decode every edge, in file order.
pub fn decode_summary_graph<R: Read>(rdr: R) -> Result<Vec<SummaryEdge>> {
    summary_edges(rdr).collect()
}
