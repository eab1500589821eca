// crates/lodsum-trace/src/calculator.rs

//! Edge validity intervals derived from node lifetimes.
//!
//! For an edge `(u, v)` with node intervals `[s_u, e_u]`, `[s_v, e_v]` and
//! fixed point `F`:
//!
//! - start is `max(s_u, s_v + 1)`,
//! - end is `F + 1` when `e_u = e_v = F` (open-ended), otherwise
//!   `min(e_u + 1, e_v + 1)`.

use crate::graph::SummaryEdge;
use lodsum_core::{violation, GlobalBlockId, Interval, Level, Result, TraceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A summary edge with its validity interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeWithInterval {
    /// The edge.
    #[serde(flatten)]
    pub edge: SummaryEdge,
    /// Levels at which the edge exists.
    pub interval: Interval,
}

/// Computes edge intervals over one node-interval map.
#[derive(Clone, Copy, Debug)]
pub struct IntervalCalculator<'a> {
    nodes: &'a BTreeMap<GlobalBlockId, Interval>,
    fixed_point: Option<Level>,
}

impl<'a> IntervalCalculator<'a> {
    /// `fixed_point = None` disables the open-ended rule.
    #[must_use]
    pub const fn new(nodes: &'a BTreeMap<GlobalBlockId, Interval>, fixed_point: Option<Level>) -> Self {
        Self { nodes, fixed_point }
    }

    fn node(&self, id: GlobalBlockId) -> Result<Interval> {
        self.nodes.get(&id).copied().ok_or(TraceError::MissingInterval(id.0))
    }

    /// Interval of the edge `u → v`.
    pub fn edge_interval(&self, u: GlobalBlockId, v: GlobalBlockId) -> Result<Interval> {
        let (iu, iv) = (self.node(u)?, self.node(v)?);
        let start = iu.start().max(iv.start().saturating_add(1));
        let end = match self.fixed_point {
            Some(f) if iu.end() == f && iv.end() == f => f.saturating_add(1),
            _ => iu.end().saturating_add(1).min(iv.end().saturating_add(1)),
        };
        Interval::new(start, end)
            .ok_or_else(|| violation!("edge {u} -> {v} has empty interval [{start},{end}]"))
    }

    /// Pair `edge` with its interval.
    pub fn annotate(&self, edge: SummaryEdge) -> Result<EdgeWithInterval> {
        Ok(EdgeWithInterval { edge, interval: self.edge_interval(edge.subject, edge.object)? })
    }
}
