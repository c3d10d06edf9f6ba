//! UCI engine wrapper for position evaluation.
//!
//! [`Evaluator`] is the narrow capability the rest of the crate depends on:
//! "evaluate this position at this depth". [`UciEngine`] implements it on
//! top of an external engine process such as Stockfish.

use crate::Evaluation;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Maximum number of lines to read before giving up on a UCI response.
pub const MAX_UCI_LINES: usize = 100_000;

/// Errors that can occur when working with chess engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Failed to spawn the engine process or talk to it.
    #[error("Failed to spawn engine: {0}")]
    SpawnError(#[from] std::io::Error),
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// Engine failed to initialize properly (UCI handshake failed).
    #[error("Engine initialization failed")]
    InitFailed,
    /// Engine returned an invalid or unexpected response.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
    /// Engine process exited or closed its output.
    #[error("Engine closed unexpectedly")]
    Closed,
    /// A single evaluation exceeded its time bound.
    #[error("Evaluation timed out after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    /// Returns true for a per-position timeout, after which the engine is
    /// still usable for other positions.
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout(_))
    }
}

/// Identifies the engine build that produced an evaluation.
///
/// Evaluations from different engines or versions are not comparable, so
/// this is part of every cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EngineIdentity {
    /// Absolute path of the engine executable.
    pub path: String,
    /// Version string reported by the engine (`id name`).
    pub version: String,
}

/// Result of analyzing a chess position.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionAnalysis {
    /// The position evaluation, from the side to move's perspective.
    pub evaluation: Evaluation,
    /// The principal variation in UCI notation; the first move is the best move.
    pub pv: Vec<String>,
}

impl PositionAnalysis {
    /// The best move in UCI notation, if the engine found one.
    pub fn best_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }
}

/// Something that can evaluate chess positions.
pub trait Evaluator {
    /// Identity used to partition cached evaluations.
    fn identity(&self) -> &EngineIdentity;

    /// Evaluates the position given in FEN at a fixed search depth.
    fn evaluate(&mut self, fen: &str, depth: u32) -> Result<PositionAnalysis, EngineError>;
}

/// Time bounds for talking to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    /// Bound on the `uci` / `isready` handshakes.
    pub handshake: Duration,
    /// Bound on a single `go depth` search.
    pub evaluation: Duration,
    /// How long to wait for `bestmove` after sending `stop`.
    pub stop_grace: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            evaluation: Duration::from_secs(120),
            stop_grace: Duration::from_secs(5),
        }
    }
}

/// Engine options applied after every (re)start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EngineOptions {
    threads: u32,
    hash_mb: u32,
}

/// A running engine process.
struct Process {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
}

impl Process {
    fn spawn(path: &Path) -> Result<Self, EngineError> {
        let mut command = Command::new(path);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // Own process group, so a terminal interrupt reaches the caller only.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);
        let mut child = command.spawn()?;

        let stdin = child.stdin.take().ok_or(EngineError::InitFailed)?;
        let stdout = child.stdout.take().ok_or(EngineError::InitFailed)?;

        // Lines are pumped through a channel so reads can time out.
        let (tx, lines) = mpsc::channel();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line.trim().to_string()).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            lines,
        })
    }

    fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!(command, "engine <");
        writeln!(self.stdin, "{}", command)?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Reads a line, failing with `Timeout` once `deadline` passes.
    fn read_line(&mut self, deadline: Instant, bound: Duration) -> Result<String, EngineError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.lines.recv_timeout(remaining) {
            Ok(line) => Ok(line),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(bound)),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Closed),
        }
    }

    /// Reads until a line equal to `expected`, within `bound`.
    fn wait_for(&mut self, expected: &str, bound: Duration) -> Result<Vec<String>, EngineError> {
        let deadline = Instant::now() + bound;
        let mut seen = Vec::new();
        for _ in 0..MAX_UCI_LINES {
            let line = self.read_line(deadline, bound)?;
            if line == expected {
                return Ok(seen);
            }
            seen.push(line);
        }
        Err(EngineError::InvalidResponse(format!(
            "Too many lines without {}",
            expected
        )))
    }

    fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Wrapper for UCI-compatible analysis engines like Stockfish.
///
/// Searches that exceed [`EngineTimeouts::evaluation`] are stopped and
/// reported as [`EngineError::Timeout`]. If the engine does not respond to
/// `stop` it is killed and restarted before the next request.
pub struct UciEngine {
    path: PathBuf,
    identity: EngineIdentity,
    timeouts: EngineTimeouts,
    options: Option<EngineOptions>,
    process: Option<Process>,
}

impl UciEngine {
    /// Spawns the engine and performs the UCI handshake.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound` if the engine cannot be located
    /// - `EngineError::SpawnError` if the engine process fails to start
    /// - `EngineError::InitFailed` or `Timeout` if the handshake fails
    pub fn spawn(engine_path: &str, timeouts: EngineTimeouts) -> Result<Self, EngineError> {
        let path = resolve_engine_path(engine_path)
            .ok_or_else(|| EngineError::NotFound(engine_path.to_string()))?;

        let mut process = Process::spawn(&path)?;
        let name = handshake(&mut process, timeouts.handshake)?;

        Ok(Self {
            identity: EngineIdentity {
                path: path.display().to_string(),
                version: name,
            },
            path,
            timeouts,
            options: None,
            process: Some(process),
        })
    }

    /// Sets the search thread count and hash size.
    ///
    /// The options are remembered and re-applied if the engine is restarted.
    pub fn configure(&mut self, threads: u32, hash_mb: u32) -> Result<(), EngineError> {
        let options = EngineOptions { threads, hash_mb };
        let handshake_bound = self.timeouts.handshake;
        let process = self.running()?;
        apply_options(process, options, handshake_bound)?;
        self.options = Some(options);
        Ok(())
    }

    /// Returns the engine's name as reported via UCI protocol.
    pub fn name(&self) -> &str {
        &self.identity.version
    }

    /// Returns the running process, restarting the engine if the previous
    /// one had to be abandoned.
    fn running(&mut self) -> Result<&mut Process, EngineError> {
        if self.process.is_none() {
            warn!(engine = %self.path.display(), "restarting engine");
            let mut process = Process::spawn(&self.path)?;
            let name = handshake(&mut process, self.timeouts.handshake)?;
            if name != self.identity.version {
                return Err(EngineError::InvalidResponse(format!(
                    "engine reported {} after restart, expected {}",
                    name, self.identity.version
                )));
            }
            if let Some(options) = self.options {
                apply_options(&mut process, options, self.timeouts.handshake)?;
            }
            self.process = Some(process);
        }
        self.process.as_mut().ok_or(EngineError::Closed)
    }

    fn search(&mut self, fen: &str, depth: u32) -> Result<PositionAnalysis, EngineError> {
        let timeouts = self.timeouts;
        let process = self.running()?;
        process.send(&format!("position fen {}", fen))?;
        process.send(&format!("go depth {}", depth))?;

        let deadline = Instant::now() + timeouts.evaluation;
        let mut last: Option<PositionAnalysis> = None;

        for _ in 0..MAX_UCI_LINES {
            let line = match process.read_line(deadline, timeouts.evaluation) {
                Ok(line) => line,
                Err(EngineError::Timeout(bound)) => {
                    let stopped = process.send("stop").is_ok()
                        && process.wait_for_bestmove(timeouts.stop_grace).is_ok();
                    if !stopped {
                        warn!("engine ignored stop, killing it");
                        process.kill();
                        self.process = None;
                    }
                    return Err(EngineError::Timeout(bound));
                }
                Err(e) => return Err(e),
            };

            if line.starts_with("info ") {
                if let Some(analysis) = parse_info_line(&line) {
                    last = Some(analysis);
                }
            } else if let Some(rest) = line.strip_prefix("bestmove") {
                let best = rest.split_whitespace().next().unwrap_or("");
                return finish_search(last, best);
            }
        }

        Err(EngineError::InvalidResponse(
            "Too many lines without bestmove".to_string(),
        ))
    }
}

impl Evaluator for UciEngine {
    fn identity(&self) -> &EngineIdentity {
        &self.identity
    }

    fn evaluate(&mut self, fen: &str, depth: u32) -> Result<PositionAnalysis, EngineError> {
        let result = self.search(fen, depth);
        if let Err(e) = &result {
            // Any failure other than a timeout leaves the process in an
            // unknown state; the next request starts a fresh one.
            if !e.is_timeout() {
                if let Some(mut process) = self.process.take() {
                    process.kill();
                }
            }
        }
        result
    }
}

impl Process {
    fn wait_for_bestmove(&mut self, grace: Duration) -> Result<(), EngineError> {
        let deadline = Instant::now() + grace;
        loop {
            match self.read_line(deadline, grace) {
                Ok(line) if line.starts_with("bestmove") => return Ok(()),
                Ok(_) => continue,
                // Stuck engine; the caller discards this process.
                Err(_) => return Err(EngineError::Closed),
            }
        }
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            // Try to send quit command to gracefully terminate the engine
            if process.send("quit").is_err() {
                process.kill();
                return;
            }
            let _ = process.child.wait();
        }
    }
}

/// Performs the `uci` and `isready` handshakes, returning the engine name.
fn handshake(process: &mut Process, bound: Duration) -> Result<String, EngineError> {
    process.send("uci")?;
    let lines = process.wait_for("uciok", bound).map_err(init_failure)?;
    let name = lines
        .iter()
        .find_map(|line| line.strip_prefix("id name "))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown Engine")
        .to_string();

    process.send("isready")?;
    process.wait_for("readyok", bound).map_err(init_failure)?;
    Ok(name)
}

fn init_failure(e: EngineError) -> EngineError {
    match e {
        EngineError::Timeout(_) | EngineError::Closed => EngineError::InitFailed,
        other => other,
    }
}

fn apply_options(
    process: &mut Process,
    options: EngineOptions,
    bound: Duration,
) -> Result<(), EngineError> {
    process.send(&format!("setoption name Threads value {}", options.threads))?;
    process.send(&format!("setoption name Hash value {}", options.hash_mb))?;
    process.send("isready")?;
    process.wait_for("readyok", bound)?;
    Ok(())
}

/// Combines the last scored info line with the `bestmove` reply.
fn finish_search(
    last: Option<PositionAnalysis>,
    best_move: &str,
) -> Result<PositionAnalysis, EngineError> {
    let mut analysis = last.ok_or_else(|| {
        EngineError::InvalidResponse("No score received before bestmove".to_string())
    })?;

    let has_move = !best_move.is_empty() && best_move != "(none)" && best_move != "0000";
    if !has_move {
        analysis.pv.clear();
    } else if analysis.best_move() != Some(best_move) {
        analysis.pv = vec![best_move.to_string()];
    }
    Ok(analysis)
}

/// Parse a UCI info line to extract the score and PV.
///
/// Format: "info depth X score cp Y nodes Z pv move1 move2 ..."
/// or: "info depth X score mate Y nodes Z pv move1 move2 ..."
///
/// Lines without a score, bound-only scores, secondary `multipv` lines and
/// `info string` lines yield `None`.
fn parse_info_line(line: &str) -> Option<PositionAnalysis> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.get(1) == Some(&"string") {
        return None;
    }

    let mut cp: Option<i32> = None;
    let mut mate: Option<i32> = None;
    let mut pv: Vec<String> = Vec::new();

    let mut i = 1;
    while i < parts.len() {
        match parts[i] {
            "score" => {
                if i + 2 < parts.len() {
                    match parts[i + 1] {
                        "cp" => cp = parts[i + 2].parse().ok(),
                        "mate" => mate = parts[i + 2].parse().ok(),
                        _ => {}
                    }
                    i += 2;
                }
            }
            "lowerbound" | "upperbound" => return None,
            "multipv" => {
                if parts.get(i + 1).is_some_and(|n| *n != "1") {
                    return None;
                }
                i += 1;
            }
            "pv" => {
                pv = parts[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            _ => {}
        }
        i += 1;
    }

    let evaluation = Evaluation::from_uci_score(cp, mate)?;
    Some(PositionAnalysis { evaluation, pv })
}

/// Resolves the engine to an absolute path.
///
/// Bare names (no path separator) are searched for in `PATH`.
fn resolve_engine_path(engine_path: &str) -> Option<PathBuf> {
    let candidate = Path::new(engine_path);
    if candidate.components().count() > 1 || candidate.is_absolute() {
        return candidate.canonicalize().ok().filter(|p| p.is_file());
    }

    if candidate.is_file() {
        return candidate.canonicalize().ok();
    }

    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths)
            .map(|dir| dir.join(engine_path))
            .find(|p| p.is_file())
            .and_then(|p| p.canonicalize().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_not_found() {
        let result = UciEngine::spawn("/nonexistent/path/to/stockfish", EngineTimeouts::default());
        match result {
            Err(EngineError::NotFound(path)) => {
                assert_eq!(path, "/nonexistent/path/to/stockfish");
            }
            Err(other) => panic!("Expected NotFound error, got {other}"),
            Ok(_) => panic!("Expected NotFound error"),
        }
    }

    #[test]
    fn test_bare_name_not_on_path() {
        assert!(resolve_engine_path("definitely-not-an-engine-3f9a").is_none());
    }

    #[test]
    fn test_engine_error_display() {
        let spawn_err = EngineError::SpawnError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "file not found",
        ));
        assert!(spawn_err.to_string().contains("Failed to spawn engine"));

        let not_found = EngineError::NotFound("/path/to/engine".to_string());
        assert!(not_found.to_string().contains("/path/to/engine"));

        assert_eq!(
            EngineError::InitFailed.to_string(),
            "Engine initialization failed"
        );

        let timeout = EngineError::Timeout(Duration::from_secs(3));
        assert!(timeout.to_string().contains("timed out"));
        assert!(timeout.is_timeout());
        assert!(!EngineError::Closed.is_timeout());
    }

    #[test]
    fn test_parse_info_line_centipawn() {
        let line = "info depth 15 seldepth 20 score cp 35 nodes 50000 pv e2e4 e7e5 g1f3";
        let analysis = parse_info_line(line).unwrap();
        assert_eq!(analysis.evaluation, Evaluation::Centipawns(35));
        assert_eq!(analysis.pv, vec!["e2e4", "e7e5", "g1f3"]);
        assert_eq!(analysis.best_move(), Some("e2e4"));
    }

    #[test]
    fn test_parse_info_line_mate() {
        let line = "info depth 12 score mate 3 nodes 10000 pv d1h5 g6h5";
        let analysis = parse_info_line(line).unwrap();
        assert_eq!(analysis.evaluation, Evaluation::Mate(3));
        assert_eq!(analysis.pv.len(), 2);
    }

    #[test]
    fn test_parse_info_line_mated() {
        let line = "info depth 0 score mate 0";
        let analysis = parse_info_line(line).unwrap();
        assert_eq!(analysis.evaluation, Evaluation::Mated);
        assert!(analysis.pv.is_empty());
    }

    #[test]
    fn test_parse_info_line_negative_score() {
        let line = "info depth 10 score cp -150 nodes 25000 pv e7e5";
        let analysis = parse_info_line(line).unwrap();
        assert_eq!(analysis.evaluation, Evaluation::Centipawns(-150));
    }

    #[test]
    fn test_parse_info_line_skips_bounds_and_strings() {
        assert!(parse_info_line("info depth 20 score cp 40 lowerbound nodes 1 pv e2e4").is_none());
        assert!(parse_info_line("info depth 20 score cp 40 upperbound").is_none());
        assert!(parse_info_line("info string NNUE evaluation using nn-1.nnue").is_none());
        assert!(parse_info_line("info depth 15 nodes 50000 pv e2e4").is_none());
        assert!(parse_info_line("info currmove e2e4 currmovenumber 1").is_none());
    }

    #[test]
    fn test_parse_info_line_multipv() {
        assert!(parse_info_line("info depth 9 multipv 2 score cp 10 pv d2d4").is_none());
        let first = parse_info_line("info depth 9 multipv 1 score cp 25 pv e2e4").unwrap();
        assert_eq!(first.evaluation, Evaluation::Centipawns(25));
    }

    #[test]
    fn test_finish_search_uses_bestmove() {
        let last = PositionAnalysis {
            evaluation: Evaluation::Centipawns(12),
            pv: vec!["g1f3".to_string(), "d7d5".to_string()],
        };
        let same = finish_search(Some(last.clone()), "g1f3").unwrap();
        assert_eq!(same.pv.len(), 2);

        let different = finish_search(Some(last.clone()), "e2e4").unwrap();
        assert_eq!(different.pv, vec!["e2e4"]);

        let none = finish_search(Some(last), "(none)").unwrap();
        assert!(none.pv.is_empty());

        assert!(matches!(
            finish_search(None, "e2e4"),
            Err(EngineError::InvalidResponse(_))
        ));
    }
}
