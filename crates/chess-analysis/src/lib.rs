//! Engine-backed move classification with a persistent evaluation cache.
//!
//! This crate turns a game into per-move quality labels by comparing engine
//! evaluations before and after every move, reusing evaluations stored in a
//! SQLite cache across runs.
//!
//! # Overview
//!
//! - [`Evaluation`] - Position evaluation (centipawn or mate score)
//! - [`win_chance`] - Logistic win-probability model
//! - [`MoveQuality`] / [`classify_move`] - Inaccuracy, Mistake, Blunder, Missed Mate
//! - [`UciEngine`] - Wrapper for UCI analysis engines like Stockfish
//! - [`PositionCache`] - Evaluations keyed by position, engine and depth
//! - [`GameAnalyzer`] - Analyzes complete games with move quality classification
//!
//! # Example
//!
//! ```ignore
//! use std::sync::atomic::AtomicBool;
//! use chess_analysis::{EngineTimeouts, GameAnalyzer, PositionCache, Thresholds, UciEngine};
//!
//! let mut engine = UciEngine::spawn("stockfish", EngineTimeouts::default())?;
//! let cache = PositionCache::open("chess_analyzer_cache.db")?;
//! let cancel = AtomicBool::new(false);
//! let mut analyzer = GameAnalyzer::new(&mut engine, Some(&cache), &cancel, 18, Thresholds::default());
//! let analysis = analyzer.analyze(&game)?;
//! println!("White ACPL: {:?}", analysis.white.acpl());
//! ```

pub mod analyzer;
pub mod cache;
pub mod engine;
pub mod evaluation;
pub mod game;
pub mod quality;
pub mod win_chance;

pub use analyzer::{
    AnalysisError, AnalysisStats, GameAnalysis, GameAnalyzer, MoveAnalysis, PositionEval,
};
pub use cache::{CacheEntry, CacheError, PositionCache, DEFAULT_CACHE_FILE};
pub use engine::{
    EngineError, EngineIdentity, EngineTimeouts, Evaluator, PositionAnalysis, UciEngine,
};
pub use evaluation::Evaluation;
pub use game::{GameError, GameRecord, PlayedMove};
pub use quality::{
    classify_move, MoveClassification, MoveEvaluation, MoveQuality, PlayerStats, Thresholds,
};
pub use win_chance::{evaluation_win_chance, win_chance};

pub use shakmaty;
pub use shakmaty::Color;
