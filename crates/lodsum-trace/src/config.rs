// crates/lodsum-trace/src/config.rs

//! Reader configuration, loadable from TOML.
//!
//! ```toml
//! typed_start = true
//! map_format = "legacy"
//! require_fixed_point = false
//! verify_partition = true
//! check_level_stats = true
//! ```
//!
//! Every key is optional.

use crate::identifiers::MapFormat;
use lodsum_core::{Level, Result, TraceError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// How a trace is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// A level-0 outcome file is materialized (typed initial partition).
    pub typed_start: bool,
    /// Sub-format of the local→global map.
    pub map_format: MapFormat,
    /// Fixed-level operations fail unless the run reached a fixed point.
    pub require_fixed_point: bool,
    /// Check partition postconditions after every replayed level.
    pub verify_partition: bool,
    /// Cross-check replayed levels against per-level statistics when present.
    pub check_level_stats: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            typed_start: false,
            map_format: MapFormat::Current,
            require_fixed_point: false,
            verify_partition: true,
            check_level_stats: true,
        }
    }
}

impl TraceConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| TraceError::Config(e.to_string()))
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        toml::from_str(&text)
            .map_err(|e| TraceError::Config(format!("{}: {e}", path.display())))
    }

    /// First materialized level: `0` with a typed start, `1` otherwise.
    #[must_use]
    pub const fn first_level(&self) -> Level {
        if self.typed_start {
            0
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(TraceConfig::from_toml_str("").unwrap(), TraceConfig::default());
        assert_eq!(TraceConfig::default().first_level(), 1);
    }

    #[test]
    fn partial_document_overrides_only_given_keys() {
        let cfg = TraceConfig::from_toml_str("typed_start = true\nmap_format = \"legacy\"\n")
            .unwrap();
        assert!(cfg.typed_start);
        assert_eq!(cfg.map_format, MapFormat::Legacy);
        assert!(cfg.verify_partition);
        assert_eq!(cfg.first_level(), 0);
    }

    #[test]
    fn unknown_key_is_config_error() {
        let err = TraceConfig::from_toml_str("map_fromat = \"legacy\"").unwrap_err();
        assert!(matches!(err, TraceError::Config(_)));
        let err = TraceConfig::from_toml_str("map_format = \"sniffed\"").unwrap_err();
        assert!(matches!(err, TraceError::Config(_)));
    }
}
