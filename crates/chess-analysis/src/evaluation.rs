//! Chess position evaluation types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Centipawn value a forced mate is worth when computing centipawn loss.
pub const MATE_SCORE_CP: i32 = 1000;

/// Represents a chess position evaluation.
///
/// An evaluation is always relative to one side, normally the side to move
/// in the evaluated position (that is how UCI engines report scores).
/// Use [`Evaluation::flip`] to look at the same position from the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Evaluation {
    /// Centipawn evaluation (positive = good for the perspective side)
    Centipawns(i32),
    /// Forced mate in N moves (positive = perspective side mates, negative = gets mated).
    /// Never zero; see [`Evaluation::Mated`] and [`Evaluation::MateDelivered`].
    Mate(i32),
    /// The perspective side is checkmated on the board.
    Mated,
    /// The perspective side has already delivered checkmate.
    MateDelivered,
}

impl Evaluation {
    /// Builds an evaluation from the `score cp` / `score mate` fields of a UCI info line.
    ///
    /// `score mate 0` means the side to move is checkmated. Returns `None`
    /// when neither field is present.
    pub fn from_uci_score(cp: Option<i32>, mate: Option<i32>) -> Option<Self> {
        match (mate, cp) {
            (Some(0), _) => Some(Evaluation::Mated),
            (Some(n), _) => Some(Evaluation::Mate(n)),
            (None, Some(cp)) => Some(Evaluation::Centipawns(cp)),
            (None, None) => None,
        }
    }

    /// The same evaluation seen from the opponent's side.
    pub fn flip(self) -> Self {
        match self {
            Evaluation::Centipawns(cp) => Evaluation::Centipawns(-cp),
            Evaluation::Mate(n) => Evaluation::Mate(-n),
            Evaluation::Mated => Evaluation::MateDelivered,
            Evaluation::MateDelivered => Evaluation::Mated,
        }
    }

    /// Returns true if this is any kind of mate score.
    pub fn is_mate(&self) -> bool {
        !matches!(self, Evaluation::Centipawns(_))
    }

    /// Distance of a forced mate in favour of the perspective side, if any.
    ///
    /// A mate that has already been delivered has distance zero.
    pub fn winning_mate_distance(&self) -> Option<i32> {
        match *self {
            Evaluation::Mate(n) if n > 0 => Some(n),
            Evaluation::MateDelivered => Some(0),
            _ => None,
        }
    }

    /// Converts to centipawns for loss calculations.
    ///
    /// Mate scores collapse to [`MATE_SCORE_CP`] with the matching sign.
    pub fn to_centipawns(&self) -> i32 {
        match *self {
            Evaluation::Centipawns(cp) => cp,
            Evaluation::Mate(n) if n > 0 => MATE_SCORE_CP,
            Evaluation::Mate(_) => -MATE_SCORE_CP,
            Evaluation::MateDelivered => MATE_SCORE_CP,
            Evaluation::Mated => -MATE_SCORE_CP,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Centipawns(cp) => write!(f, "{:.2}", *cp as f64 / 100.0),
            Evaluation::Mate(n) => write!(f, "#{}", n),
            Evaluation::Mated => write!(f, "#-0"),
            Evaluation::MateDelivered => write!(f, "#0"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_uci_score() {
        assert_eq!(
            Evaluation::from_uci_score(Some(35), None),
            Some(Evaluation::Centipawns(35))
        );
        assert_eq!(
            Evaluation::from_uci_score(None, Some(-3)),
            Some(Evaluation::Mate(-3))
        );
        assert_eq!(
            Evaluation::from_uci_score(None, Some(0)),
            Some(Evaluation::Mated)
        );
        assert_eq!(Evaluation::from_uci_score(None, None), None);
    }

    #[test]
    fn test_mate_takes_precedence_over_cp() {
        assert_eq!(
            Evaluation::from_uci_score(Some(500), Some(2)),
            Some(Evaluation::Mate(2))
        );
    }

    #[test]
    fn test_flip() {
        assert_eq!(Evaluation::Centipawns(120).flip(), Evaluation::Centipawns(-120));
        assert_eq!(Evaluation::Mate(4).flip(), Evaluation::Mate(-4));
        assert_eq!(Evaluation::Mated.flip(), Evaluation::MateDelivered);
        assert_eq!(Evaluation::MateDelivered.flip(), Evaluation::Mated);
        assert_eq!(Evaluation::Mate(-2).flip().flip(), Evaluation::Mate(-2));
    }

    #[test]
    fn test_winning_mate_distance() {
        assert_eq!(Evaluation::Mate(3).winning_mate_distance(), Some(3));
        assert_eq!(Evaluation::MateDelivered.winning_mate_distance(), Some(0));
        assert_eq!(Evaluation::Mate(-3).winning_mate_distance(), None);
        assert_eq!(Evaluation::Mated.winning_mate_distance(), None);
        assert_eq!(Evaluation::Centipawns(900).winning_mate_distance(), None);
    }

    #[test]
    fn test_to_centipawns() {
        assert_eq!(Evaluation::Centipawns(-45).to_centipawns(), -45);
        assert_eq!(Evaluation::Centipawns(2500).to_centipawns(), 2500);
        assert_eq!(Evaluation::Mate(7).to_centipawns(), MATE_SCORE_CP);
        assert_eq!(Evaluation::Mate(-1).to_centipawns(), -MATE_SCORE_CP);
        assert_eq!(Evaluation::Mated.to_centipawns(), -MATE_SCORE_CP);
        assert_eq!(Evaluation::MateDelivered.to_centipawns(), MATE_SCORE_CP);
    }

    #[test]
    fn test_display() {
        assert_eq!(Evaluation::Centipawns(35).to_string(), "0.35");
        assert_eq!(Evaluation::Centipawns(-150).to_string(), "-1.50");
        assert_eq!(Evaluation::Mate(-2).to_string(), "#-2");
    }

    #[test]
    fn test_serde_roundtrip_shape() {
        let json = serde_json::to_string(&Evaluation::Mate(3)).unwrap();
        assert_eq!(json, r#"{"kind":"mate","value":3}"#);
        let back: Evaluation = serde_json::from_str(r#"{"kind":"mated"}"#).unwrap();
        assert_eq!(back, Evaluation::Mated);
    }
}
