//! lodsum-core: wire primitives and shared vocabulary for bisimulation traces.
//!
//! This crate defines the **stable boundary** used across lodsum crates:
//! - the fixed-width little-endian record codec every trace decoder is built on,
//! - canonical id types (`BlockRef`, `GlobalBlockId`, `Interval`, …),
//! - the typed error taxonomy shared by decoders and the reconstructor, and
//! - JSON/CBOR/JSONL helpers for persisting decoded results.
//!
//! ```
//! use lodsum_core::record::{Field, RecordReader, RecordShape};
//!
//! const EDGE: RecordShape = RecordShape::new(
//!     "edge",
//!     &[Field::signed(5), Field::unsigned(4), Field::signed(5)],
//! );
//! let bytes = [0xFEu8, 0xFF, 0xFF, 0xFF, 0xFF, 3, 0, 0, 0, 7, 0, 0, 0, 0];
//! let rec = RecordReader::new(&bytes[..]).next_record(&EDGE)?.unwrap();
//! assert_eq!(rec.as_slice(), &[-2, 3, 7]);
//! # Ok::<(), lodsum_core::TraceError>(())
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Small, explicit allowlist to keep docs readable and APIs ergonomic.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]

/// Error taxonomy and the workspace `Result` alias.
pub mod error;
/// JSON/CBOR helpers and auto-detecting read/write APIs.
pub mod io;
/// Fixed-width record reader/writer.
pub mod record;
/// Canonical id and interval types shared across the workspace.
pub mod types;

// ---- Re-exports for workspace compatibility ----
pub use error::{Result, TraceError};
pub use record::{Field, Record, RecordReader, RecordShape, RecordWriter};
pub use types::*;
