//! Integration tests for chess-analysis crate.
//!
//! The engine tests require Stockfish to be installed and available in PATH.
//! Run with: `cargo test -p chess-analysis --test integration -- --ignored`

use std::sync::atomic::AtomicBool;

use chess_analysis::{
    EngineTimeouts, Evaluation, Evaluator, GameAnalyzer, GameRecord, MoveQuality, PositionCache,
    Thresholds, UciEngine,
};

/// Check if Stockfish is available in PATH.
fn stockfish_available() -> bool {
    std::process::Command::new("stockfish")
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map(|mut child| {
            let _ = child.kill();
            let _ = child.wait();
        })
        .is_ok()
}

fn scholars_mate() -> GameRecord {
    let mut game = GameRecord::new(vec![
        ("White".to_string(), "alice".to_string()),
        ("Black".to_string(), "bob".to_string()),
        ("Result".to_string(), "1-0".to_string()),
    ])
    .unwrap();
    for san in ["e4", "e5", "Qh5", "Nc6", "Bc4", "Nf6", "Qxf7#"] {
        game.play_san(san).unwrap();
    }
    game
}

#[test]
#[ignore = "requires Stockfish"]
fn test_engine_basic_analysis() {
    if !stockfish_available() {
        eprintln!("Skipping test: Stockfish not available");
        return;
    }

    let mut engine =
        UciEngine::spawn("stockfish", EngineTimeouts::default()).expect("Failed to spawn engine");
    engine.configure(1, 16).expect("Failed to configure engine");

    let name = engine.name().to_string();
    assert!(
        name.to_lowercase().contains("stockfish"),
        "Engine name should contain 'Stockfish', got: {}",
        name
    );
    assert!(engine.identity().path.starts_with('/'));

    let starting_fen = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    let analysis = engine
        .evaluate(starting_fen, 10)
        .expect("Failed to analyze starting position");
    assert!(analysis.best_move().is_some(), "Best move should not be empty");
    match analysis.evaluation {
        Evaluation::Centipawns(cp) => assert!(cp.abs() < 150, "start eval {cp}"),
        other => panic!("unexpected evaluation {other}"),
    }
}

#[test]
#[ignore = "requires Stockfish"]
fn test_scholars_mate_game_analysis() {
    if !stockfish_available() {
        eprintln!("Skipping test: Stockfish not available");
        return;
    }

    let mut engine =
        UciEngine::spawn("stockfish", EngineTimeouts::default()).expect("Failed to spawn engine");
    let cache = PositionCache::open_in_memory().unwrap();
    let cancel = AtomicBool::new(false);
    let mut analyzer =
        GameAnalyzer::new(&mut engine, Some(&cache), &cancel, 12, Thresholds::default());

    let game = scholars_mate();
    let analysis = analyzer.analyze(&game).expect("analysis failed");

    assert_eq!(analysis.moves.len(), 7);
    let nf6 = &analysis.moves[5];
    assert_eq!(nf6.san, "Nf6");
    assert_eq!(
        nf6.classification.as_ref().and_then(|c| c.quality),
        Some(MoveQuality::Blunder),
        "3...Nf6 allows mate in one"
    );
    assert!(nf6.best_move_san.is_some());
    assert_eq!(analysis.unevaluated, 0);

    // A second pass is served entirely from the cache.
    let first = analyzer.stats();
    analyzer.analyze(&game).expect("second analysis failed");
    let second = analyzer.stats();
    assert_eq!(second.engine_evaluations, first.engine_evaluations);
    assert!(second.cache_hits > first.cache_hits);
}

#[test]
fn test_missing_engine_reports_not_found() {
    let result = UciEngine::spawn("/nonexistent/engine/binary", EngineTimeouts::default());
    assert!(result.is_err());
}
