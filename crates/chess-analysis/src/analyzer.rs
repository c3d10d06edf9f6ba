//! Game analysis with move quality classification.
//!
//! This module provides the [`GameAnalyzer`] for analyzing complete chess games
//! and classifying each move's quality.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use shakmaty::{Chess, Color, Position};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, PositionCache};
use crate::engine::{EngineError, Evaluator};
use crate::evaluation::Evaluation;
use crate::game::{full_fen, position_key, uci_line_to_san, GameRecord};
use crate::quality::{classify_move, MoveClassification, MoveEvaluation, PlayerStats, Thresholds};

/// Number of principal variation moves reported per classified move.
pub const PV_DISPLAY_MOVES: usize = 3;

/// Errors that abort the analysis of one game.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The engine failed in a way other than a per-position timeout.
    #[error("Engine unavailable: {0}")]
    EngineUnavailable(#[from] EngineError),
    /// Shutdown was requested before the game was complete.
    #[error("Analysis cancelled")]
    Cancelled,
}

/// Engine output for one position, from the side to move's perspective.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionEval {
    pub evaluation: Evaluation,
    /// Principal variation in UCI notation.
    pub pv: Vec<String>,
}

/// Everything known about one half-move after analysis.
#[derive(Debug, Clone)]
pub struct MoveAnalysis {
    pub san: String,
    pub mover: Color,
    /// Evaluation after the move, from White's perspective.
    pub eval_after_white: Option<Evaluation>,
    /// `None` when either surrounding position could not be evaluated.
    pub classification: Option<MoveClassification>,
    /// The engine's preferred move in the position before, in SAN.
    pub best_move_san: Option<String>,
    /// Start of the engine's principal variation, in SAN.
    pub pv_san: Vec<String>,
}

/// Complete analysis of a game.
#[derive(Debug, Clone)]
pub struct GameAnalysis {
    pub moves: Vec<MoveAnalysis>,
    pub white: PlayerStats,
    pub black: PlayerStats,
    /// Moves left unclassified because an evaluation timed out.
    pub unevaluated: u32,
    /// Search depth used for every evaluation.
    pub depth: u32,
}

impl GameAnalysis {
    pub fn stats_for(&self, color: Color) -> &PlayerStats {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }
}

/// Running counters across all games analyzed by one analyzer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisStats {
    pub cache_hits: u64,
    pub engine_evaluations: u64,
    pub timeouts: u64,
    pub cache_errors: u64,
}

/// Analyzes chess games to classify move quality.
///
/// Positions are evaluated strictly in move order, each at most once per
/// game. A position is looked up in the cache before the engine is asked,
/// and every fresh engine result is written back immediately.
pub struct GameAnalyzer<'a, E: Evaluator> {
    engine: &'a mut E,
    cache: Option<&'a PositionCache>,
    cancel: &'a AtomicBool,
    depth: u32,
    thresholds: Thresholds,
    stats: AnalysisStats,
}

impl<'a, E: Evaluator> GameAnalyzer<'a, E> {
    /// Creates an analyzer.
    ///
    /// # Arguments
    ///
    /// * `engine` - The evaluator used on cache misses.
    /// * `cache` - Evaluation cache, or `None` to run without one.
    /// * `cancel` - Checked before every engine request.
    /// * `depth` - Search depth for every position.
    /// * `thresholds` - CPL thresholds for classification.
    pub fn new(
        engine: &'a mut E,
        cache: Option<&'a PositionCache>,
        cancel: &'a AtomicBool,
        depth: u32,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            engine,
            cache,
            cancel,
            depth,
            thresholds,
            stats: AnalysisStats::default(),
        }
    }

    pub fn stats(&self) -> AnalysisStats {
        self.stats
    }

    /// Analyzes a complete chess game.
    ///
    /// For each move in the game:
    /// 1. Evaluates the positions before and after the move (the "after" of
    ///    one move is the "before" of the next).
    /// 2. Classifies the move from the pair of evaluations.
    /// 3. Adds the result to the mover's statistics.
    ///
    /// A position whose evaluation times out leaves the moves around it
    /// unclassified; the rest of the game is still analyzed.
    ///
    /// # Errors
    ///
    /// - `AnalysisError::Cancelled` if shutdown was requested
    /// - `AnalysisError::EngineUnavailable` if the engine failed
    pub fn analyze(&mut self, game: &GameRecord) -> Result<GameAnalysis, AnalysisError> {
        let mut seen: HashMap<String, Option<PositionEval>> = HashMap::new();
        let mut evals: Vec<Option<PositionEval>> = Vec::with_capacity(game.positions().len());

        for pos in game.positions() {
            let key = position_key(pos);
            let eval = match seen.get(&key) {
                Some(eval) => eval.clone(),
                None => {
                    let eval = self.evaluate_position(pos, &key)?;
                    seen.insert(key, eval.clone());
                    eval
                }
            };
            evals.push(eval);
        }

        let mut analysis = GameAnalysis {
            moves: Vec::with_capacity(game.moves().len()),
            white: PlayerStats::default(),
            black: PlayerStats::default(),
            unevaluated: 0,
            depth: self.depth,
        };

        for (i, played) in game.moves().iter().enumerate() {
            let before_pos = &game.positions()[i];
            let before = evals[i].as_ref();
            let after = evals[i + 1].as_ref();

            let eval_after_white = after.map(|a| match played.mover {
                // After White's move it is Black to move.
                Color::White => a.evaluation.flip(),
                Color::Black => a.evaluation,
            });

            let (best_move_san, pv_san) = match before {
                Some(b) => {
                    let pv_san = uci_line_to_san(before_pos, &b.pv, PV_DISPLAY_MOVES);
                    (pv_san.first().cloned(), pv_san)
                }
                None => (None, Vec::new()),
            };

            let classification = match (before, after) {
                (Some(b), Some(a)) => {
                    let played_best = b.pv.first() == Some(&played.uci);
                    let eval = MoveEvaluation::from_engine(b.evaluation, a.evaluation, played_best);
                    let classification = classify_move(&eval, &self.thresholds);
                    match played.mover {
                        Color::White => analysis.white.record(&classification),
                        Color::Black => analysis.black.record(&classification),
                    }
                    Some(classification)
                }
                _ => {
                    analysis.unevaluated += 1;
                    None
                }
            };

            analysis.moves.push(MoveAnalysis {
                san: played.san.clone(),
                mover: played.mover,
                eval_after_white,
                classification,
                best_move_san,
                pv_san,
            });
        }

        Ok(analysis)
    }

    /// Evaluates a single position, consulting the cache first.
    ///
    /// Returns `Ok(None)` when the engine timed out on this position.
    fn evaluate_position(
        &mut self,
        pos: &Chess,
        key: &str,
    ) -> Result<Option<PositionEval>, AnalysisError> {
        if let Some(eval) = terminal_evaluation(pos) {
            return Ok(Some(eval));
        }

        if let Some(entry) = self.cached(key) {
            self.stats.cache_hits += 1;
            return Ok(Some(PositionEval {
                evaluation: entry.evaluation,
                pv: entry.best_line,
            }));
        }

        if self.cancel.load(Ordering::SeqCst) {
            return Err(AnalysisError::Cancelled);
        }

        let fen = full_fen(pos);
        let analysis = match self.engine.evaluate(&fen, self.depth) {
            Ok(analysis) => analysis,
            Err(e) if e.is_timeout() => {
                self.stats.timeouts += 1;
                warn!(fen = %fen, error = %e, "evaluation timed out, position left unevaluated");
                return Ok(None);
            }
            Err(e) => return Err(AnalysisError::EngineUnavailable(e)),
        };
        self.stats.engine_evaluations += 1;
        debug!(fen = %fen, eval = %analysis.evaluation, "engine evaluation");

        let entry = CacheEntry {
            evaluation: analysis.evaluation,
            best_line: analysis.pv,
        };
        self.remember(key, &entry);

        Ok(Some(PositionEval {
            evaluation: entry.evaluation,
            pv: entry.best_line,
        }))
    }

    fn cached(&mut self, key: &str) -> Option<CacheEntry> {
        let cache = self.cache?;
        match cache.lookup(key, self.engine.identity(), self.depth) {
            Ok(entry) => entry,
            Err(e) => {
                self.stats.cache_errors += 1;
                warn!(error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    fn remember(&mut self, key: &str, entry: &CacheEntry) {
        let Some(cache) = self.cache else { return };
        if let Err(e) = cache.store(key, self.engine.identity(), self.depth, entry) {
            self.stats.cache_errors += 1;
            warn!(error = %e, "cache store failed");
        }
    }
}

/// Evaluation of a position the engine is never asked about.
fn terminal_evaluation(pos: &Chess) -> Option<PositionEval> {
    let evaluation = if pos.is_checkmate() {
        Evaluation::Mated
    } else if pos.is_stalemate() {
        Evaluation::Centipawns(0)
    } else {
        return None;
    };
    Some(PositionEval {
        evaluation,
        pv: Vec::new(),
    })
}
