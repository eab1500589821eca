// crates/lodsum-trace/src/delta.rs

//! Transition files between level `i` and `i + 1`.
//!
//! The split mapping is always present. The singleton-migration file exists
//! only for transitions that created singletons; its absence is normal.

use crate::format::{MIGRATION_HEADER, MIGRATION_SINGLETON, SPLIT_CHILD, SPLIT_HEADER};
use lodsum_core::{
    ensure_invariant, entity_of_code, singleton_code, violation, Entity, LocalBlockId,
    RecordReader, RecordWriter, Result, SINGLETON_BUCKET,
};
use serde::{Deserialize, Serialize};
use std::io::Read;

/// A parent block of level `i` and the children it split into at `i + 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitRecord {
    /// Retired parent.
    pub parent: LocalBlockId,
    /// Children; `0` means some members became singletons.
    pub children: Vec<LocalBlockId>,
}

impl SplitRecord {
    /// `true` if part of the parent moved to the singleton bucket.
    #[must_use]
    pub fn sheds_singletons(&self) -> bool {
        self.children.contains(&SINGLETON_BUCKET)
    }
}

/// Entities that left `parent` to become singletons.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingletonMigration {
    /// Retired parent.
    pub parent: LocalBlockId,
    /// Entities, decoded from their `-entity-1` encoding.
    pub entities: Vec<Entity>,
}

/// Decode a split-mapping file.
pub fn decode_split_mapping<R: Read>(rdr: R) -> Result<Vec<SplitRecord>> {
    let mut rdr = RecordReader::new(rdr);
    let mut out = Vec::new();
    while let Some(head) = rdr.next_record(&SPLIT_HEADER)? {
        let parent = head.get(0) as LocalBlockId;
        let count = head.get(1) as u64;
        let mut children = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            children.push(rdr.expect_record(&SPLIT_CHILD)?.get(0) as LocalBlockId);
        }
        out.push(SplitRecord { parent, children });
    }
    Ok(out)
}

/// Read only the parents of a split-mapping file, skipping child lists.
pub fn scan_split_parents<R: Read>(rdr: R) -> Result<Vec<LocalBlockId>> {
    let mut rdr = RecordReader::new(rdr);
    let mut out = Vec::new();
    while let Some(head) = rdr.next_record(&SPLIT_HEADER)? {
        rdr.skip_records(&SPLIT_CHILD, head.get(1) as u64)?;
        out.push(head.get(0) as LocalBlockId);
    }
    Ok(out)
}

/// Decode a singleton-migration file if the transition has one.
///
/// `None` input (file absent) yields `None`: no singletons were created.
pub fn decode_singleton_migrations<R: Read>(
    rdr: Option<R>,
) -> Result<Option<Vec<SingletonMigration>>> {
    let Some(rdr) = rdr else {
        return Ok(None);
    };
    let mut rdr = RecordReader::new(rdr);
    let mut out = Vec::new();
    while let Some(head) = rdr.next_record(&MIGRATION_HEADER)? {
        let parent = head.get(0) as LocalBlockId;
        let count = head.get(1);
        ensure_invariant!(
            count >= 0,
            "singleton migration of block {parent} declares {count} singletons"
        );
        let mut entities = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let code = rdr.expect_record(&MIGRATION_SINGLETON)?.get(0);
            let e = entity_of_code(code).ok_or_else(|| {
                violation!("singleton migration of block {parent} lists non-singleton id {code}")
            })?;
            entities.push(e);
        }
        out.push(SingletonMigration { parent, entities });
    }
    Ok(Some(out))
}

/// Encode split records.
pub fn encode_split_mapping(records: &[SplitRecord]) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new(Vec::new());
    for r in records {
        w.write_record(&SPLIT_HEADER, &[i64::from(r.parent), r.children.len() as i64])?;
        for &c in &r.children {
            w.write_record(&SPLIT_CHILD, &[i64::from(c)])?;
        }
    }
    Ok(w.into_inner())
}

/// Encode singleton migrations.
pub fn encode_singleton_migrations(records: &[SingletonMigration]) -> Result<Vec<u8>> {
    let mut w = RecordWriter::new(Vec::new());
    for r in records {
        w.write_record(&MIGRATION_HEADER, &[i64::from(r.parent), r.entities.len() as i64])?;
        for &e in &r.entities {
            w.write_record(&MIGRATION_SINGLETON, &[singleton_code(e)])?;
        }
    }
    Ok(w.into_inner())
}
