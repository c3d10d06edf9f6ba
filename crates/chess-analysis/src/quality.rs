//! Move quality classification.
//!
//! A move is judged on two criteria: the centipawn loss (CPL) it causes and
//! the drop in the mover's modeled win chance. The more severe of the two
//! wins. In decided positions CPL is ignored and win-chance labels are
//! softened, since large swings there rarely change the result.

use crate::win_chance::evaluation_win_chance;
use crate::Evaluation;
use std::fmt;

/// Default CPL threshold for an inaccuracy.
pub const DEFAULT_CPL_INACCURACY: u32 = 100;
/// Default CPL threshold for a mistake.
pub const DEFAULT_CPL_MISTAKE: u32 = 250;
/// Default CPL threshold for a blunder.
pub const DEFAULT_CPL_BLUNDER: u32 = 400;

/// Win-chance drop (percentage points) for an inaccuracy.
pub const WIN_CHANCE_DROP_INACCURACY: f64 = 10.0;
/// Win-chance drop (percentage points) for a mistake.
pub const WIN_CHANCE_DROP_MISTAKE: f64 = 20.0;
/// Win-chance drop (percentage points) for a blunder.
pub const WIN_CHANCE_DROP_BLUNDER: f64 = 30.0;

/// A position is decided when the mover's win chance is at least this
/// (or at most `100 - DECIDED_WIN_CHANCE`). Roughly ±800cp.
pub const DECIDED_WIN_CHANCE: f64 = 95.0;

/// In a decided position, win-chance labels are downgraded one step while
/// the mover keeps at least this win chance after the move.
pub const LENIENT_RETAINED_WIN_CHANCE: f64 = 85.0;

/// CPL ceiling applied when either evaluation is a mate score.
pub const MATE_CPL_CEILING: u32 = 1000;

/// Classification of a questionable move, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MoveQuality {
    /// Noticeable loss
    Inaccuracy,
    /// Significant loss
    Mistake,
    /// Major loss
    Blunder,
    /// A forced mate was available and the move let it go
    MissedMate,
}

impl MoveQuality {
    /// Label used in annotations.
    pub fn label(&self) -> &'static str {
        match self {
            MoveQuality::Inaccuracy => "Inaccuracy",
            MoveQuality::Mistake => "Mistake",
            MoveQuality::Blunder => "Blunder",
            MoveQuality::MissedMate => "Missed Mate",
        }
    }

    /// One step less severe, or `None` below an inaccuracy. A missed mate
    /// stays a missed mate.
    fn downgrade(self) -> Option<Self> {
        match self {
            MoveQuality::MissedMate => Some(MoveQuality::MissedMate),
            MoveQuality::Blunder => Some(MoveQuality::Mistake),
            MoveQuality::Mistake => Some(MoveQuality::Inaccuracy),
            MoveQuality::Inaccuracy => None,
        }
    }
}

impl fmt::Display for MoveQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Centipawn-loss thresholds.
///
/// Invariant: `0 < inaccuracy < mistake < blunder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub inaccuracy: u32,
    pub mistake: u32,
    pub blunder: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            inaccuracy: DEFAULT_CPL_INACCURACY,
            mistake: DEFAULT_CPL_MISTAKE,
            blunder: DEFAULT_CPL_BLUNDER,
        }
    }
}

impl Thresholds {
    /// Returns true if the thresholds are positive and strictly increasing.
    pub fn is_valid(&self) -> bool {
        self.inaccuracy > 0 && self.inaccuracy < self.mistake && self.mistake < self.blunder
    }

    fn by_cpl(&self, cpl: u32) -> Option<MoveQuality> {
        if cpl >= self.blunder {
            Some(MoveQuality::Blunder)
        } else if cpl >= self.mistake {
            Some(MoveQuality::Mistake)
        } else if cpl >= self.inaccuracy {
            Some(MoveQuality::Inaccuracy)
        } else {
            None
        }
    }
}

fn by_win_chance_drop(drop: f64) -> Option<MoveQuality> {
    if drop >= WIN_CHANCE_DROP_BLUNDER {
        Some(MoveQuality::Blunder)
    } else if drop >= WIN_CHANCE_DROP_MISTAKE {
        Some(MoveQuality::Mistake)
    } else if drop >= WIN_CHANCE_DROP_INACCURACY {
        Some(MoveQuality::Inaccuracy)
    } else {
        None
    }
}

/// Engine evaluations around one half-move, both from the mover's perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveEvaluation {
    /// Evaluation of the position before the move.
    pub before: Evaluation,
    /// Evaluation of the position after the move.
    pub after: Evaluation,
    /// Whether the played move is the engine's best move.
    pub played_best: bool,
}

impl MoveEvaluation {
    /// Builds the record from raw engine output.
    ///
    /// `after_for_opponent` is the evaluation of the resulting position as
    /// the engine reports it, i.e. from the opponent's perspective.
    pub fn from_engine(before: Evaluation, after_for_opponent: Evaluation, played_best: bool) -> Self {
        Self {
            before,
            after: after_for_opponent.flip(),
            played_best,
        }
    }
}

/// Result of classifying one half-move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveClassification {
    /// `None` when the move is fine.
    pub quality: Option<MoveQuality>,
    /// Centipawn loss, never negative.
    pub cpl: u32,
    /// Mover's win chance before the move.
    pub win_chance_before: f64,
    /// Mover's win chance after the move.
    pub win_chance_after: f64,
}

impl MoveClassification {
    /// Signed change in percentage points (positive = the move lost win chance).
    pub fn win_chance_delta(&self) -> f64 {
        self.win_chance_before - self.win_chance_after
    }
}

/// Centipawn loss for a before/after pair, both from the mover's perspective.
pub fn centipawn_loss(before: Evaluation, after: Evaluation) -> u32 {
    let loss = (before.to_centipawns() as i64 - after.to_centipawns() as i64).max(0);
    let loss = u32::try_from(loss).unwrap_or(u32::MAX);
    if before.is_mate() || after.is_mate() {
        loss.min(MATE_CPL_CEILING)
    } else {
        loss
    }
}

/// Returns true if the mover had a forced mate and the move gave it up
/// (or made it longer).
pub fn is_missed_mate(before: Evaluation, after: Evaluation) -> bool {
    match before.winning_mate_distance() {
        Some(n) if n > 0 => match after.winning_mate_distance() {
            Some(m) => m > n,
            None => true,
        },
        _ => false,
    }
}

/// Classifies a single half-move.
pub fn classify_move(eval: &MoveEvaluation, thresholds: &Thresholds) -> MoveClassification {
    let cpl = centipawn_loss(eval.before, eval.after);
    let win_chance_before = evaluation_win_chance(eval.before);
    let win_chance_after = evaluation_win_chance(eval.after);

    let quality = if is_missed_mate(eval.before, eval.after) {
        Some(MoveQuality::MissedMate)
    } else if eval.played_best {
        None
    } else {
        let drop = win_chance_before - win_chance_after;
        let decided = win_chance_before >= DECIDED_WIN_CHANCE
            || win_chance_before <= 100.0 - DECIDED_WIN_CHANCE;

        if decided {
            let by_drop = by_win_chance_drop(drop);
            if win_chance_after >= LENIENT_RETAINED_WIN_CHANCE {
                by_drop.and_then(MoveQuality::downgrade)
            } else {
                by_drop
            }
        } else {
            by_win_chance_drop(drop).max(thresholds.by_cpl(cpl))
        }
    };

    MoveClassification {
        quality,
        cpl,
        win_chance_before,
        win_chance_after,
    }
}

/// Centipawn-loss statistics for one side of a game.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerStats {
    /// Moves that were classified
    pub total_moves: u32,
    /// Sum of centipawn loss over those moves
    pub total_cpl: u64,
    /// Number of inaccuracies
    pub inaccuracies: u32,
    /// Number of mistakes
    pub mistakes: u32,
    /// Number of blunders
    pub blunders: u32,
    /// Number of missed mates
    pub missed_mates: u32,
}

impl PlayerStats {
    /// Adds one classified move.
    pub fn record(&mut self, classification: &MoveClassification) {
        self.total_moves += 1;
        self.total_cpl += u64::from(classification.cpl);
        match classification.quality {
            Some(MoveQuality::Inaccuracy) => self.inaccuracies += 1,
            Some(MoveQuality::Mistake) => self.mistakes += 1,
            Some(MoveQuality::Blunder) => self.blunders += 1,
            Some(MoveQuality::MissedMate) => self.missed_mates += 1,
            None => {}
        }
    }

    /// Average centipawn loss, or `None` if no move was classified.
    pub fn acpl(&self) -> Option<f64> {
        if self.total_moves == 0 {
            None
        } else {
            Some(self.total_cpl as f64 / self.total_moves as f64)
        }
    }
}
