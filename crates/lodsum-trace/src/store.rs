// crates/lodsum-trace/src/store.rs

//! Where trace files come from.
//!
//! Every decoder reads through a [`TraceStore`], which hands out a fresh
//! forward-only byte stream per [`TraceFile`]. The stream is dropped when
//! the decoder returns, on success and on failure alike.
//!
//! - [`ExperimentDir`] reads an experiment directory on disk.
//! - [`MemoryStore`] keeps files in memory (synthetic traces, tests) and can
//!   be persisted into an experiment directory layout.

use lodsum_core::io::ensure_parent_dir;
use lodsum_core::{Level, Result, TraceError};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

const BISIMULATION_DIR: &str = "bisimulation";
const RESULTS_DIR: &str = "ad_hoc_results";

/// One file role of a trace, with its level coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TraceFile {
    /// Blocks created at `level` with their full membership.
    Outcome(Level),
    /// Split records of the transition `from → from + 1`.
    SplitMapping {
        /// Source level of the transition.
        from: Level,
    },
    /// Singleton migrations of the transition `from → from + 1` (optional).
    SingletonMapping {
        /// Source level of the transition.
        from: Level,
    },
    /// Condensed multi-level summary graph.
    SummaryGraph,
    /// Block lifetime intervals.
    Intervals,
    /// Local→global identifier map.
    LocalGlobalMap,
    /// Run-wide statistics (`graph_stats.json`).
    GraphStats,
    /// Per-level statistics (optional).
    LevelStats(Level),
    /// Size and cost of the condensed summary graph.
    SummaryGraphStats,
    /// Cost of creating the data edges between `upper` and `lower`.
    ///
    /// The engine writes one per transition with `upper = lower + 1`, plus
    /// `upper = lower = depth` when it ran to the fixed point.
    DataEdgeStats {
        /// Level of the edge subjects.
        upper: Level,
        /// Level of the edge objects.
        lower: Level,
    },
}

impl TraceFile {
    /// Path relative to the experiment directory, `/`-separated.
    #[must_use]
    pub fn relative_path(&self) -> String {
        match *self {
            Self::Outcome(l) => format!("{BISIMULATION_DIR}/outcome_condensed-{l:04}.bin"),
            Self::SplitMapping { from } => {
                format!("{BISIMULATION_DIR}/mapping-{from:04}to{:04}.bin", u32::from(from) + 1)
            }
            Self::SingletonMapping { from } => format!(
                "{BISIMULATION_DIR}/singleton_mapping-{from:04}to{:04}.bin",
                u32::from(from) + 1
            ),
            Self::SummaryGraph => {
                format!("{BISIMULATION_DIR}/condensed_multi_summary_graph.bin")
            }
            Self::Intervals => {
                format!("{BISIMULATION_DIR}/condensed_multi_summary_intervals.bin")
            }
            Self::LocalGlobalMap => {
                format!("{BISIMULATION_DIR}/condensed_multi_summary_local_global_map.bin")
            }
            Self::GraphStats => format!("{RESULTS_DIR}/graph_stats.json"),
            Self::LevelStats(l) => format!("{RESULTS_DIR}/statistics_condensed-{l:04}.json"),
            Self::SummaryGraphStats => format!("{RESULTS_DIR}/summary_graph_stats.json"),
            Self::DataEdgeStats { upper, lower } => {
                format!("{RESULTS_DIR}/data_edges_statistics_condensed-{upper:04}to{lower:04}.json")
            }
        }
    }
}

impl fmt::Display for TraceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_path())
    }
}

/// Source of trace byte streams.
pub trait TraceStore {
    /// Open `file` for reading; `None` if it does not exist.
    fn open(&self, file: &TraceFile) -> Result<Option<Box<dyn Read + '_>>>;

    /// Open `file`, treating absence as [`TraceError::MissingFile`].
    fn open_required(&self, file: &TraceFile) -> Result<Box<dyn Read + '_>> {
        self.open(file)?
            .ok_or_else(|| TraceError::MissingFile(file.relative_path()))
    }
}

impl<T: TraceStore + ?Sized> TraceStore for &T {
    fn open(&self, file: &TraceFile) -> Result<Option<Box<dyn Read + '_>>> {
        (**self).open(file)
    }
}

/// Experiment directory on disk.
#[derive(Clone, Debug)]
pub struct ExperimentDir {
    root: PathBuf,
}

impl ExperimentDir {
    /// Use `root` as the experiment directory.
    ///
    /// Fails with [`TraceError::MissingFile`] if `root` is not a directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(TraceError::MissingFile(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// Experiment root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `file`.
    #[must_use]
    pub fn path_of(&self, file: &TraceFile) -> PathBuf {
        self.root.join(file.relative_path())
    }
}

impl TraceStore for ExperimentDir {
    fn open(&self, file: &TraceFile) -> Result<Option<Box<dyn Read + '_>>> {
        match File::open(self.path_of(file)) {
            Ok(f) => Ok(Some(Box::new(BufReader::new(f)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory trace keyed by file role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStore {
    files: BTreeMap<TraceFile, Vec<u8>>,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the contents of `file`.
    pub fn insert(&mut self, file: TraceFile, bytes: Vec<u8>) {
        self.files.insert(file, bytes);
    }

    /// Drop `file`, returning its contents if it existed.
    pub fn remove(&mut self, file: &TraceFile) -> Option<Vec<u8>> {
        self.files.remove(file)
    }

    /// Contents of `file`.
    #[must_use]
    pub fn get(&self, file: &TraceFile) -> Option<&[u8]> {
        self.files.get(file).map(Vec::as_slice)
    }

    /// Every stored file role, in order.
    pub fn files(&self) -> impl Iterator<Item = &TraceFile> {
        self.files.keys()
    }

    /// Write every file under `root` using the experiment directory layout.
    pub fn persist(&self, root: &Path) -> Result<ExperimentDir> {
        fs::create_dir_all(root)?;
        for (file, bytes) in &self.files {
            let path = root.join(file.relative_path());
            ensure_parent_dir(&path)?;
            fs::write(&path, bytes)?;
        }
        ExperimentDir::new(root)
    }
}

impl TraceStore for MemoryStore {
    fn open(&self, file: &TraceFile) -> Result<Option<Box<dyn Read + '_>>> {
        Ok(self.get(file).map(|b| Box::new(b) as Box<dyn Read + '_>))
    }
}
