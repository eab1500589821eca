//! Error taxonomy for trace decoding and reconstruction.
//!
//! Every variant is fatal for the operation that raised it. Inputs are static
//! artifacts, so nothing here is retried.

use crate::types::Level;

/// Failure raised while decoding or replaying a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// A required trace file or metadata record is absent.
    #[error("missing required trace input: {0}")]
    MissingFile(String),

    /// A record ended before all of its declared fields could be read.
    #[error(
        "truncated {shape} record at byte {offset}: field {field} needs {needed} bytes, {available} available"
    )]
    TruncatedRecord {
        /// Record shape name.
        shape: &'static str,
        /// Index of the field that could not be filled.
        field: usize,
        /// Stream offset at which the record started.
        offset: u64,
        /// Declared width of the field.
        needed: usize,
        /// Bytes that were left.
        available: usize,
    },

    /// A well-formed record breaks a semantic invariant of the trace.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// `(local, level)` has no entry in the local→global map.
    #[error("unresolved identifier: local block {local} at level {level}")]
    UnresolvedIdentifier {
        /// Local block-or-singleton id.
        local: i64,
        /// Level the id is scoped to.
        level: Level,
    },

    /// A block id has no lifetime interval.
    #[error("missing interval for block {0}")]
    MissingInterval(i64),

    /// A level outside the reconstructible range was requested.
    #[error("level {level} outside reconstructible range {first}..={depth}")]
    LevelOutOfRange {
        /// Requested level.
        level: Level,
        /// First materialized level.
        first: Level,
        /// Final depth of the trace.
        depth: Level,
    },

    /// A metadata record exists but cannot be decoded.
    #[error("malformed metadata {path}: {source}")]
    Metadata {
        /// Trace-relative path of the record.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A configuration file cannot be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Underlying read/write failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used by every fallible API in the workspace.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Build an [`TraceError::InvariantViolation`] from format arguments.
#[macro_export]
macro_rules! violation {
    ($($arg:tt)*) => {
        $crate::error::TraceError::InvariantViolation(format!($($arg)*))
    };
}

/// Return early with an [`TraceError::InvariantViolation`] unless `cond` holds.
#[macro_export]
macro_rules! ensure_invariant {
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::violation!($($arg)*));
        }
    };
}
