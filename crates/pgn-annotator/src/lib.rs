//! Annotates PGN files with engine evaluations and move quality labels.
//!
//! Reads every game of an input PGN, evaluates each position with a UCI
//! engine (reusing a persistent evaluation cache), and appends the games
//! to an output PGN with `[%eval]` tags, quality comments and per-side
//! ACPL headers. Games already present in the output are skipped, so an
//! interrupted run can simply be restarted.

pub mod config;
pub mod game_id;
pub mod pgn;
pub mod runner;
pub mod shutdown;
pub mod summary;

pub use config::{AnnotatorConfig, ConfigError, ConfigOverrides};
pub use runner::{annotate, start_engine, RunError};
pub use shutdown::Shutdown;
pub use summary::RunSummary;
