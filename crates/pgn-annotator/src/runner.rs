//! Batch runner - annotates every game of an input PGN file.
//!
//! Games are processed one at a time. Problems confined to one game
//! (unparsable moves, missing identifier, engine failure) skip that game
//! and are counted; only an unreadable input or unwritable output stops
//! the run.

use crate::config::AnnotatorConfig;
use crate::game_id::GameIdMatcher;
use crate::pgn::{format_game, PgnGames, WriteOptions};
use crate::shutdown::Shutdown;
use crate::summary::RunSummary;
use chess_analysis::{
    AnalysisError, EngineError, EngineTimeouts, Evaluator, GameAnalyzer, PositionCache, UciEngine,
};
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

/// Failures that end the whole run.
#[derive(Error, Debug)]
pub enum RunError {
    /// The input PGN could not be opened or read.
    #[error("Cannot read input {path}: {source}")]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The output PGN could not be read, opened or written.
    #[error("Cannot write output {path}: {source}")]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Internal setup failed.
    #[error("Invalid identifier pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Starts and configures the configured engine.
///
/// A failure is recorded in `summary` so the end-of-run report shows why
/// nothing was analyzed.
pub fn start_engine(
    config: &AnnotatorConfig,
    summary: &mut RunSummary,
) -> Result<UciEngine, EngineError> {
    let timeouts = EngineTimeouts {
        evaluation: config.eval_timeout(),
        ..EngineTimeouts::default()
    };
    let started = UciEngine::spawn(&config.engine_path, timeouts).and_then(|mut engine| {
        engine.configure(config.threads, config.hash_mb)?;
        Ok(engine)
    });
    if let Err(e) = &started {
        error!(engine = %config.engine_path, error = %e, "engine unavailable");
        summary.engine_unavailable = true;
    }
    started
}

/// Annotates `input` into `output` using `engine` and the configured cache.
///
/// The cache is opened here and always closed before returning, whether the
/// run finished, was interrupted or failed. If it cannot be opened the run
/// continues without it.
///
/// # Errors
///
/// Returns [`RunError`] only for failures that affect every game. Counts
/// gathered up to that point remain in `summary`.
pub fn annotate<E: Evaluator>(
    engine: &mut E,
    config: &AnnotatorConfig,
    input: &Path,
    output: &Path,
    shutdown: &Shutdown,
    summary: &mut RunSummary,
) -> Result<(), RunError> {
    summary.output_path = output.to_path_buf();
    summary.cache_path = config.cache_path.clone();

    let cache = match PositionCache::open(&config.cache_path) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(path = %config.cache_path.display(), error = %e, "evaluation cache unavailable, continuing without it");
            summary.cache_degraded = true;
            None
        }
    };

    let result = process_games(engine, cache.as_ref(), config, input, output, shutdown, summary);

    if let Some(cache) = cache {
        match cache.close() {
            Ok(()) => info!(path = %config.cache_path.display(), "evaluation cache closed"),
            Err(e) => error!(error = %e, "failed to close evaluation cache"),
        }
    }
    result
}

fn process_games<E: Evaluator>(
    engine: &mut E,
    cache: Option<&PositionCache>,
    config: &AnnotatorConfig,
    input: &Path,
    output: &Path,
    shutdown: &Shutdown,
    summary: &mut RunSummary,
) -> Result<(), RunError> {
    let ids = GameIdMatcher::new()?;
    let processed = processed_ids(&ids, output)?;
    if !processed.is_empty() {
        info!(count = processed.len(), "found previously annotated games");
    }

    let input_file = File::open(input).map_err(|source| RunError::Input {
        path: input.to_path_buf(),
        source,
    })?;
    let out = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .map_err(|source| RunError::Output {
            path: output.to_path_buf(),
            source,
        })?;

    let mut batch = Batch {
        ids,
        processed,
        out,
        input,
        output,
        write_options: WriteOptions {
            wrap_width: config.output_wrap_width,
            player: config.player.clone(),
            annotator: format!(
                "{} {} ({})",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION"),
                engine.identity().version
            ),
        },
    };

    let mut analyzer = GameAnalyzer::new(
        engine,
        cache,
        shutdown.flag(),
        config.depth,
        config.thresholds(),
    );
    let result = batch.run(
        &mut analyzer,
        PgnGames::new(BufReader::new(input_file)),
        shutdown,
        summary,
    );

    let stats = analyzer.stats();
    summary.cache_hits += stats.cache_hits;
    summary.engine_evaluations += stats.engine_evaluations;
    summary.timeouts += stats.timeouts;
    if stats.cache_errors > 0 {
        summary.cache_degraded = true;
    }
    result
}

/// Output side of a run.
struct Batch<'a> {
    ids: GameIdMatcher,
    /// Identifiers already in the output, including games written this run.
    processed: HashSet<String>,
    out: File,
    input: &'a Path,
    output: &'a Path,
    write_options: WriteOptions,
}

impl Batch<'_> {
    /// Annotates each game in turn, appending finished games to the output.
    fn run<E: Evaluator, R: Read>(
        &mut self,
        analyzer: &mut GameAnalyzer<'_, E>,
        games: PgnGames<R>,
        shutdown: &Shutdown,
        summary: &mut RunSummary,
    ) -> Result<(), RunError> {
        for next in games {
            if shutdown.is_requested() {
                info!("shutdown requested, stopping before the next game");
                summary.interrupted = true;
                break;
            }

            let parsed = next.map_err(|source| RunError::Input {
                path: self.input.to_path_buf(),
                source,
            })?;
            summary.games_read += 1;

            let mut game = match parsed {
                Ok(game) => game,
                Err(e) => {
                    warn!(game = summary.games_read, error = %e, "skipping malformed game");
                    summary.malformed += 1;
                    continue;
                }
            };

            let Some(id) = self.ids.identify(game.tags()) else {
                warn!(game = summary.games_read, "skipping game without identifier");
                summary.skipped_no_id += 1;
                continue;
            };
            if self.processed.contains(&id) {
                info!(id = %id, "skipping already annotated game");
                summary.skipped_processed += 1;
                continue;
            }

            info!(
                id = %id,
                white = game.tag("White").unwrap_or("?"),
                black = game.tag("Black").unwrap_or("?"),
                moves = game.moves().len(),
                "analyzing game"
            );

            let analysis = match analyzer.analyze(&game) {
                Ok(analysis) => analysis,
                Err(AnalysisError::Cancelled) => {
                    info!(id = %id, "shutdown requested, game not written");
                    summary.interrupted = true;
                    break;
                }
                // The signal may have reached the engine as well.
                Err(e) if shutdown.is_requested() => {
                    info!(id = %id, error = %e, "engine stopped during shutdown, game not written");
                    summary.interrupted = true;
                    break;
                }
                Err(e) => {
                    error!(id = %id, error = %e, "engine failed, skipping game");
                    summary.failed += 1;
                    continue;
                }
            };

            game.add_tag("GameId", &id);
            let text = format_game(&game, &analysis, &self.write_options);
            self.write(&text)?;

            summary.games_annotated += 1;
            summary.moves_unevaluated += u64::from(analysis.unevaluated);
            info!(
                id = %id,
                white_acpl = ?analysis.white.acpl(),
                black_acpl = ?analysis.black.acpl(),
                "game annotated"
            );
            self.processed.insert(id);
        }
        Ok(())
    }

    /// Appends one complete game and flushes it.
    fn write(&mut self, text: &str) -> Result<(), RunError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|source| RunError::Output {
                path: self.output.to_path_buf(),
                source,
            })
    }
}

/// Identifiers of games already present in the output file.
fn processed_ids(ids: &GameIdMatcher, output: &Path) -> Result<HashSet<String>, RunError> {
    match std::fs::read(output) {
        Ok(bytes) => Ok(ids.scan(&String::from_utf8_lossy(&bytes))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(source) => Err(RunError::Output {
            path: output.to_path_buf(),
            source,
        }),
    }
}
