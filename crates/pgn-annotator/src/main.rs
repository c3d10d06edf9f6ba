//! PGN Annotator - annotates chess games with engine analysis.
//!
//! Evaluates every position of every game in the input file and appends
//! annotated copies to the output file.

use anyhow::Context;
use clap::Parser;
use pgn_annotator::{
    annotate, start_engine, AnnotatorConfig, ConfigOverrides, RunSummary, Shutdown,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// PGN Annotator - classifies every move of a PGN file with a UCI engine.
#[derive(Parser)]
#[command(name = "pgn-annotator")]
#[command(version, about = "Annotates PGN games with engine evaluations and move quality labels")]
struct Args {
    /// Input PGN file
    input_pgn: PathBuf,

    /// Output PGN file (appended to; already annotated games are skipped)
    output_pgn: PathBuf,

    /// Configuration file (defaults to annotator.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Engine executable
    #[arg(long, alias = "stockfish-path")]
    engine: Option<String>,

    /// Search depth per position
    #[arg(long)]
    depth: Option<u32>,

    /// Engine search threads
    #[arg(long)]
    threads: Option<u32>,

    /// Engine hash size in MB
    #[arg(long)]
    hash: Option<u32>,

    /// Centipawn loss for an inaccuracy
    #[arg(long)]
    cpl_inaccuracy: Option<u32>,

    /// Centipawn loss for a mistake
    #[arg(long)]
    cpl_mistake: Option<u32>,

    /// Centipawn loss for a blunder
    #[arg(long)]
    cpl_blunder: Option<u32>,

    /// Only add quality comments to this player's moves
    #[arg(long)]
    player: Option<String>,

    /// Movetext line width
    #[arg(long)]
    wrap: Option<usize>,

    /// Evaluation cache database
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Per-position evaluation timeout in seconds
    #[arg(long)]
    eval_timeout: Option<u64>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            engine_path: self.engine.clone(),
            depth: self.depth,
            threads: self.threads,
            hash_mb: self.hash,
            cpl_inaccuracy: self.cpl_inaccuracy,
            cpl_mistake: self.cpl_mistake,
            cpl_blunder: self.cpl_blunder,
            player: self.player.clone(),
            output_wrap_width: self.wrap,
            cache_path: self.cache.clone(),
            eval_timeout_secs: self.eval_timeout,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let mut config =
        AnnotatorConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    config.apply(args.overrides());
    config.validate()?;

    tracing::info!("Input: {}", args.input_pgn.display());
    tracing::info!("Output: {}", args.output_pgn.display());
    tracing::info!(
        "Depth: {}, threads: {}, hash: {} MB",
        config.depth,
        config.threads,
        config.hash_mb
    );
    tracing::info!(
        "CPL thresholds: {} / {} / {}",
        config.cpl_inaccuracy,
        config.cpl_mistake,
        config.cpl_blunder
    );
    if let Some(player) = &config.player {
        tracing::info!("Annotating moves by: {}", player);
    }

    let shutdown = Shutdown::new();
    shutdown
        .install()
        .context("Failed to install signal handler")?;

    let mut summary = RunSummary {
        output_path: args.output_pgn.clone(),
        cache_path: config.cache_path.clone(),
        ..RunSummary::default()
    };
    let result = run(&args, &config, &shutdown, &mut summary);
    println!("{}", summary);
    result
}

/// Starts the engine and annotates the input; `summary` is filled in
/// whichever way this ends.
fn run(
    args: &Args,
    config: &AnnotatorConfig,
    shutdown: &Shutdown,
    summary: &mut RunSummary,
) -> anyhow::Result<()> {
    let mut engine = start_engine(config, summary)
        .with_context(|| format!("Failed to start engine '{}'", config.engine_path))?;
    tracing::info!("Engine: {}", engine.name());

    annotate(
        &mut engine,
        config,
        &args.input_pgn,
        &args.output_pgn,
        shutdown,
        summary,
    )?;
    Ok(())
}
