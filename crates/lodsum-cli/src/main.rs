// crates/lodsum-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(
    rust_2018_idioms,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lodsum_core::{
    io::{read_auto, write_auto, write_jsonl},
    BlockRef, GlobalBlockId, Interval, Level,
};
use lodsum_trace::{
    config::TraceConfig,
    generator::{generate_trace, SyntheticParams},
    identifiers::MapFormat,
    store::ExperimentDir,
    Trace,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "lodsum-cli",
    about = "Bisimulation trace reader",
    long_about = "Bisimulation trace reader.\n\nUse this tool to decode the compact trace of a partition-refinement run, replay the partition of any level, and derive size histograms, edge intervals and lineage.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Experiment directory (holds `bisimulation/` and `ad_hoc_results/`)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// TOML reader configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// The run materialized a level-0 outcome (overrides the config file)
    #[arg(long, global = true, default_value_t = false)]
    typed_start: bool,

    /// Sub-format of the local→global map (overrides the config file)
    #[arg(long, global = true, value_enum)]
    map_format: Option<MapFormatOpt>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write a synthetic, internally consistent trace into an experiment directory.
    Simulate {
        /// Output experiment directory
        #[arg(long)]
        out: PathBuf,

        /// Generator parameters (JSON/CBOR); flags below are ignored when given
        #[arg(long)]
        params: Option<PathBuf>,

        /// Number of entities (vertices)
        #[arg(long, default_value_t = 1024)]
        vertices: u64,

        /// Final depth
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u16).range(1..))]
        depth: u16,

        /// Target number of summary edges
        #[arg(long, default_value_t = 2048)]
        edges: usize,

        /// RNG seed
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Probability that a live block splits at each transition
        #[arg(long, default_value_t = 0.5)]
        split_probability: f64,
    },

    /// Replay the partition of one level.
    Reconstruct {
        /// Level to reconstruct; defaults to the fixed level
        #[arg(long)]
        level: Option<Level>,

        /// Write the partition (JSON/CBOR)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Block-size histograms of every level, from outcome headers only.
    Sizes {
        /// Write the per-level histograms (JSON/CBOR)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Validity interval of every summary-graph edge.
    EdgeIntervals {
        /// Output JSON Lines path
        #[arg(long, default_value = "edge_intervals.jsonl")]
        out: PathBuf,
    },

    /// Map a level-scoped block id to its global id.
    Resolve {
        /// Local block id (`-e-1` for the singleton of entity `e`)
        #[arg(long, allow_hyphen_values = true)]
        local: i64,

        /// Level the local id belongs to
        #[arg(long)]
        level: Level,
    },

    /// Refines edges between consecutive levels.
    Lineage {
        /// Output JSON Lines path
        #[arg(long, default_value = "lineage.jsonl")]
        out: PathBuf,
    },
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum MapFormatOpt {
    /// `(level, local, global)` triples
    Current,
    /// Per-level header plus `(local, global)` pairs
    Legacy,
}

impl From<MapFormatOpt> for MapFormat {
    fn from(opt: MapFormatOpt) -> Self {
        match opt {
            MapFormatOpt::Current => Self::Current,
            MapFormatOpt::Legacy => Self::Legacy,
        }
    }
}

/// Printed by `resolve`.
#[derive(Serialize)]
struct Resolution {
    local: i64,
    level: Level,
    block: String,
    global: GlobalBlockId,
    interval: Option<Interval>,
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    match cli.cmd {
        Cmd::Simulate { out, params, vertices, depth, edges, seed, split_probability } => {
            let params = match params {
                Some(path) => read_auto(&path)
                    .with_context(|| format!("reading generator parameters from {}", path.display()))?,
                None => SyntheticParams {
                    vertices,
                    depth,
                    edges,
                    seed,
                    map_format: config.map_format,
                    typed_start: config.typed_start,
                    split_probability,
                },
            };
            simulate(&params, &out)
        }
        Cmd::Reconstruct { level, out } => {
            reconstruct(&open_trace(cli.dir.as_deref(), config)?, level, out.as_deref())
        }
        Cmd::Sizes { out } => sizes(&open_trace(cli.dir.as_deref(), config)?, out.as_deref()),
        Cmd::EdgeIntervals { out } => {
            edge_intervals(&open_trace(cli.dir.as_deref(), config)?, &out)
        }
        Cmd::Resolve { local, level } => {
            resolve(&open_trace(cli.dir.as_deref(), config)?, local, level)
        }
        Cmd::Lineage { out } => lineage(&open_trace(cli.dir.as_deref(), config)?, &out),
    }
}

/// Initialize tracing with an env-driven filter (default INFO).
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Config file (or defaults), then command-line overrides.
fn load_config(cli: &Cli) -> Result<TraceConfig> {
    let mut config = match &cli.config {
        Some(path) => TraceConfig::load(path)
            .with_context(|| format!("loading reader configuration {}", path.display()))?,
        None => TraceConfig::default(),
    };
    if cli.typed_start {
        config.typed_start = true;
    }
    if let Some(fmt) = cli.map_format {
        config.map_format = fmt.into();
    }
    Ok(config)
}

fn open_trace(dir: Option<&Path>, config: TraceConfig) -> Result<Trace<ExperimentDir>> {
    let Some(dir) = dir else {
        bail!("--dir is required for this command");
    };
    let store = ExperimentDir::new(dir)
        .with_context(|| format!("opening experiment directory {}", dir.display()))?;
    Trace::open(store, config).with_context(|| format!("reading run statistics in {}", dir.display()))
}

fn simulate(params: &SyntheticParams, out: &Path) -> Result<()> {
    info!(
        vertices = params.vertices,
        depth = params.depth,
        seed = params.seed,
        map_format = %params.map_format,
        "generating synthetic trace"
    );
    let store = generate_trace(params).context("generating synthetic trace")?;
    store
        .persist(out)
        .with_context(|| format!("writing experiment directory {}", out.display()))?;

    println!(
        "Simulated trace: {} entities, depth {} → {} files → {}",
        params.vertices,
        params.depth,
        store.files().count(),
        out.display()
    );
    Ok(())
}

fn reconstruct(trace: &Trace<ExperimentDir>, level: Option<Level>, out: Option<&Path>) -> Result<()> {
    let partition = match level {
        Some(k) => trace.reconstruct(k),
        None => trace.reconstruct_fixed(),
    }
    .context("reconstructing partition")?;

    if let Some(out) = out {
        write_auto(out, &partition)
            .with_context(|| format!("writing partition to {}", out.display()))?;
    }

    println!(
        "Level {}: {} entities in {} blocks ({} singletons)",
        partition.level,
        partition.vertex_count(),
        partition.block_count(),
        partition.singleton_count()
    );
    Ok(())
}

fn sizes(trace: &Trace<ExperimentDir>, out: Option<&Path>) -> Result<()> {
    let levels = trace.size_histogram().context("computing block-size histogram")?;
    if let Some(out) = out {
        write_auto(out, &levels)
            .with_context(|| format!("writing histograms to {}", out.display()))?;
    }

    for l in &levels {
        let live: u64 = l.sizes.values().sum();
        let created: u64 = l.accumulated.values().sum();
        let largest = l.sizes.keys().next_back().copied().unwrap_or(0);
        println!(
            "level {:>4}: {live:>8} blocks, largest {largest:>8}, {created:>8} created so far, {:>6} split",
            l.level,
            l.split_ledger.len()
        );
    }
    Ok(())
}

fn edge_intervals(trace: &Trace<ExperimentDir>, out: &Path) -> Result<()> {
    let edges = trace.edge_intervals().context("computing edge intervals")?;
    let n = write_jsonl(out, &edges)
        .with_context(|| format!("writing edge intervals to {}", out.display()))?;
    println!("Wrote {n} edge intervals → {}", out.display());
    Ok(())
}

fn resolve(trace: &Trace<ExperimentDir>, local: i64, level: Level) -> Result<()> {
    let block = BlockRef::from_code(local)
        .with_context(|| format!("{local} is neither a block id nor a singleton code"))?;
    let ids = trace.identifiers(false).context("reading local→global map")?;
    let global = ids
        .resolve_ref(block, level)
        .with_context(|| format!("resolving {block} at level {level}"))?;
    let interval = trace.intervals().context("reading block intervals")?.get(&global).copied();

    let report = Resolution { local, level, block: block.to_string(), global, interval };
    println!("{}", serde_json::to_string_pretty(&report).context("formatting resolution")?);
    Ok(())
}

fn lineage(trace: &Trace<ExperimentDir>, out: &Path) -> Result<()> {
    let ids = trace.identifiers(false).context("reading local→global map")?;
    let edges = trace.lineage(&ids).context("extracting lineage")?;
    let n = write_jsonl(out, &edges)
        .with_context(|| format!("writing lineage to {}", out.display()))?;
    println!("Wrote {n} refines edges → {}", out.display());
    Ok(())
}
