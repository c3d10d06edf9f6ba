//! Win-probability model.
//!
//! Maps an evaluation to the percentage chance that the perspective side
//! wins, using the logistic curve popularised by Lichess.

use crate::Evaluation;

/// Slope of the logistic curve.
pub const WIN_CHANCE_K: f64 = 0.003_682_08;

/// Centipawn scores beyond this are treated as this value.
pub const WIN_CHANCE_CLAMP_CP: i32 = 1500;

/// Win-chance lost per move of mate distance.
const MATE_DISTANCE_STEP: f64 = 0.03;

/// Mate distances beyond this all map to the same value.
const MATE_DISTANCE_CAP: i32 = 10;

/// Win chance (0..=100) for a centipawn score.
///
/// `win_chance(0) == 50` and `win_chance(-x) == 100 - win_chance(x)`.
pub fn win_chance(cp: i32) -> f64 {
    let clamped = cp.clamp(-WIN_CHANCE_CLAMP_CP, WIN_CHANCE_CLAMP_CP) as f64;
    100.0 / (1.0 + (-WIN_CHANCE_K * clamped).exp())
}

/// Win chance (0..=100) for any evaluation.
///
/// Mate scores sit beyond the centipawn range: a nearer mate is closer to
/// 100 (or 0 when it is against the perspective side).
pub fn evaluation_win_chance(eval: Evaluation) -> f64 {
    match eval {
        Evaluation::Centipawns(cp) => win_chance(cp),
        Evaluation::Mate(n) if n > 0 => mate_win_chance(n),
        Evaluation::Mate(n) => 100.0 - mate_win_chance(-n),
        Evaluation::MateDelivered => 100.0,
        Evaluation::Mated => 0.0,
    }
}

fn mate_win_chance(distance: i32) -> f64 {
    100.0 - MATE_DISTANCE_STEP * distance.clamp(1, MATE_DISTANCE_CAP) as f64
}
