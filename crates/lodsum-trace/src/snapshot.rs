// crates/lodsum-trace/src/snapshot.rs

//! Level outcome files: blocks created at one level with their members.
//!
//! Block id `0` is the implicit singleton bucket and never appears in an
//! outcome file; an explicit `0` is rejected as a format error.

use crate::format::{OUTCOME_ENTITY, OUTCOME_HEADER};
use lodsum_core::{
    ensure_invariant, Entity, LocalBlockId, RecordReader, RecordWriter, Result, SINGLETON_BUCKET,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

/// Upper bound on speculative allocation for one block's members.
const PREALLOCATE_LIMIT: u64 = 1 << 16;

/// One block of an outcome file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotBlock {
    /// Local id, never `0`.
    pub id: LocalBlockId,
    /// Members in file order.
    pub entities: Vec<Entity>,
}

/// Lazy sequence of [`SnapshotBlock`]s; fuses after the first error.
#[derive(Debug)]
pub struct SnapshotBlocks<R> {
    rdr: RecordReader<R>,
    done: bool,
}

impl<R: Read> SnapshotBlocks<R> {
    fn read_block(&mut self) -> Result<Option<SnapshotBlock>> {
        let Some(head) = self.rdr.next_record(&OUTCOME_HEADER)? else {
            return Ok(None);
        };
        let id = head.get(0) as LocalBlockId;
        let count = head.get(1) as u64;
        ensure_block_id(id, self.rdr.offset())?;
        let mut entities = Vec::with_capacity(count.min(PREALLOCATE_LIMIT) as usize);
        for _ in 0..count {
            entities.push(self.rdr.expect_record(&OUTCOME_ENTITY)?.get(0) as Entity);
        }
        Ok(Some(SnapshotBlock { id, entities }))
    }
}

impl<R: Read> Iterator for SnapshotBlocks<R> {
    type Item = Result<SnapshotBlock>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_block().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

fn ensure_block_id(id: LocalBlockId, offset: u64) -> Result<()> {
    ensure_invariant!(
        id != SINGLETON_BUCKET,
        "outcome file lists the reserved singleton bucket explicitly (record ending at byte {offset})"
    );
    Ok(())
}

/// Stream the blocks of an outcome file.
pub const fn snapshot_blocks<R: Read>(rdr: R) -> SnapshotBlocks<R> {
    SnapshotBlocks { rdr: RecordReader::new(rdr), done: false }
}

/// Decode a whole outcome file into `block → members`.
///
/// A block id listed twice is an invariant violation.
pub fn decode_snapshot<R: Read>(rdr: R) -> Result<BTreeMap<LocalBlockId, BTreeSet<Entity>>> {
    let mut out = BTreeMap::new();
    for block in snapshot_blocks(rdr) {
        let block = block?;
        let id = block.id;
        let fresh = out.insert(id, block.entities.into_iter().collect()).is_none();
        ensure_invariant!(fresh, "outcome file lists block {id} twice");
    }
    Ok(out)
}

/// Read `(block, size)` pairs, skipping every member payload.
pub fn scan_snapshot_sizes<R: Read>(rdr: R) -> Result<Vec<(LocalBlockId, u64)>> {
    let mut rdr = RecordReader::new(rdr);
    let mut out = Vec::new();
    while let Some(head) = rdr.next_record(&OUTCOME_HEADER)? {
        let id = head.get(0) as LocalBlockId;
        let count = head.get(1) as u64;
        ensure_block_id(id, rdr.offset())?;
        rdr.skip_records(&OUTCOME_ENTITY, count)?;
        out.push((id, count));
    }
    Ok(out)
}

/// Encode blocks as an outcome file, in the given order.
pub fn encode_snapshot<'a, I>(blocks: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (LocalBlockId, &'a [Entity])>,
{
    let mut w = RecordWriter::new(Vec::new());
    for (id, members) in blocks {
        w.write_record(&OUTCOME_HEADER, &[i64::from(id), members.len() as i64])?;
        for &e in members {
            w.write_record(&OUTCOME_ENTITY, &[e as i64])?;
        }
    }
    Ok(w.into_inner())
}
