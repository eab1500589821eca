// crates/lodsum-trace/src/intervals.rs

//! Block lifetime intervals keyed by summary node id.

use crate::format::BLOCK_INTERVAL;
use lodsum_core::{violation, GlobalBlockId, Interval, Level, RecordReader, Result};
use std::collections::BTreeMap;
use std::io::Read;

/// Decode `node → [start, end]`.
///
/// A node listed twice keeps its last interval. A record with
/// `start > end` is an invariant violation.
pub fn decode_intervals<R: Read>(rdr: R) -> Result<BTreeMap<GlobalBlockId, Interval>> {
    let mut out = BTreeMap::new();
    for rec in RecordReader::new(rdr).records(&BLOCK_INTERVAL) {
        let rec = rec?;
        let node = GlobalBlockId(rec.get(0));
        let (start, end) = (rec.get(1) as Level, rec.get(2) as Level);
        let iv = Interval::new(start, end)
            .ok_or_else(|| violation!("interval of node {node} starts at {start} after its end {end}"))?;
        out.insert(node, iv);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodsum_core::{RecordWriter, TraceError};

    fn encode(rows: &[[i64; 3]]) -> Vec<u8> {
        let mut w = RecordWriter::new(Vec::new());
        for r in rows {
            w.write_record(&BLOCK_INTERVAL, r).unwrap();
        }
        w.into_inner()
    }

    #[test]
    fn decodes_blocks_and_singletons() {
        let map = decode_intervals(&encode(&[[1, 1, 3], [-5, 2, 4], [1, 0, 2]])[..]).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&GlobalBlockId(1)], Interval::new(0, 2).unwrap());
        assert_eq!(map[&GlobalBlockId::singleton(4)], Interval::new(2, 4).unwrap());
    }

    #[test]
    fn reversed_interval_is_violation() {
        assert!(matches!(
            decode_intervals(&encode(&[[3, 5, 4]])[..]),
            Err(TraceError::InvariantViolation(_))
        ));
    }
}
