//! A game as a validated sequence of moves from a starting position.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};
use thiserror::Error;

/// A game that cannot be replayed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    /// The `FEN` tag does not describe a legal starting position.
    #[error("Invalid starting position {fen}: {reason}")]
    InvalidFen { fen: String, reason: String },
    /// A move could not be parsed or is illegal in its position.
    #[error("Illegal move {san} at ply {ply}")]
    IllegalMove { san: String, ply: usize },
}

/// A move as played in the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    /// SAN including check suffix, as it will be written back out.
    pub san: String,
    /// The same move in UCI notation, for comparison with engine output.
    pub uci: String,
    /// Side that played the move.
    pub mover: Color,
}

/// PGN headers plus a replayed mainline.
///
/// `positions()[i]` is the position before `moves()[i]`; the final entry is
/// the position after the last move.
#[derive(Debug, Clone)]
pub struct GameRecord {
    tags: Vec<(String, String)>,
    positions: Vec<Chess>,
    moves: Vec<PlayedMove>,
}

impl GameRecord {
    /// Creates a game from its headers.
    ///
    /// A `FEN` tag sets the starting position; otherwise the standard one
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns `GameError::InvalidFen` if the `FEN` tag cannot be set up.
    pub fn new(tags: Vec<(String, String)>) -> Result<Self, GameError> {
        let start = match tags.iter().find(|(name, _)| name == "FEN") {
            Some((_, fen)) => parse_fen(fen)?,
            None => Chess::default(),
        };
        Ok(Self {
            tags,
            positions: vec![start],
            moves: Vec::new(),
        })
    }

    /// Plays the next mainline move given in SAN.
    pub fn play_san(&mut self, san: &str) -> Result<(), GameError> {
        let ply = self.moves.len();
        let illegal = || GameError::IllegalMove {
            san: san.to_string(),
            ply: ply + 1,
        };

        let parsed: San = san
            .trim_end_matches(['+', '#', '!', '?'])
            .parse()
            .map_err(|_| illegal())?;
        let pos = self.current();
        let mv = parsed.to_move(pos).map_err(|_| illegal())?;
        let mover = pos.turn();
        let uci = mv.to_uci(CastlingMode::Standard).to_string();
        let (san_text, next) = san_and_play(pos, mv).ok_or_else(illegal)?;

        self.moves.push(PlayedMove {
            san: san_text,
            uci,
            mover,
        });
        self.positions.push(next);
        Ok(())
    }

    /// Headers in their original order.
    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    /// Value of the first header with this name.
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Adds a header unless one with the same name exists.
    pub fn add_tag(&mut self, name: &str, value: &str) {
        if self.tag(name).is_none() {
            self.tags.push((name.to_string(), value.to_string()));
        }
    }

    pub fn positions(&self) -> &[Chess] {
        &self.positions
    }

    pub fn moves(&self) -> &[PlayedMove] {
        &self.moves
    }

    /// Position before the first move.
    pub fn start(&self) -> &Chess {
        &self.positions[0]
    }

    /// Position after the last move played so far.
    pub fn current(&self) -> &Chess {
        &self.positions[self.positions.len() - 1]
    }

    /// The `Result` header, or `*` when unknown.
    pub fn result(&self) -> &str {
        self.tag("Result").unwrap_or("*")
    }
}

/// Cache identity of a position: the first four FEN fields.
///
/// Move counters are left out so transpositions share an entry.
pub fn position_key(pos: &Chess) -> String {
    full_fen(pos)
        .split_whitespace()
        .take(4)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Complete FEN, as sent to the engine.
pub fn full_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

/// Parses a FEN into a playable position.
pub fn parse_fen(fen: &str) -> Result<Chess, GameError> {
    let invalid = |reason: String| GameError::InvalidFen {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{e}")))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{e}")))
}

/// Converts a UCI line into SAN, stopping at the first move that does not
/// apply.
pub fn uci_line_to_san(pos: &Chess, line: &[String], limit: usize) -> Vec<String> {
    let mut pos = pos.clone();
    let mut sans = Vec::new();
    for uci in line.iter().take(limit) {
        let Ok(parsed) = uci.parse::<UciMove>() else {
            break;
        };
        let Ok(mv) = parsed.to_move(&pos) else {
            break;
        };
        let Some((san, next)) = san_and_play(&pos, mv) else {
            break;
        };
        sans.push(san);
        pos = next;
    }
    sans
}

/// SAN with check suffix, plus the resulting position.
fn san_and_play(pos: &Chess, mv: Move) -> Option<(String, Chess)> {
    let san = San::from_move(pos, mv.clone());
    let next = pos.clone().play(mv).ok()?;
    let suffix = if next.is_checkmate() {
        "#"
    } else if next.is_check() {
        "+"
    } else {
        ""
    };
    Some((format!("{san}{suffix}"), next))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(sans: &[&str]) -> GameRecord {
        let mut record = GameRecord::new(vec![("White".into(), "alice".into())]).unwrap();
        for san in sans {
            record.play_san(san).unwrap();
        }
        record
    }

    #[test]
    fn test_replay_tracks_positions() {
        let record = game(&["e4", "e5", "Nf3"]);
        assert_eq!(record.moves().len(), 3);
        assert_eq!(record.positions().len(), 4);
        assert_eq!(record.moves()[0].uci, "e2e4");
        assert_eq!(record.moves()[1].mover, Color::Black);
        assert_eq!(record.current().turn(), Color::Black);
    }

    #[test]
    fn test_check_suffix_normalised() {
        let record = game(&["f3", "e5", "g4", "Qh4"]);
        assert_eq!(record.moves()[3].san, "Qh4#");
        assert!(record.current().is_checkmate());
    }

    #[test]
    fn test_illegal_move_rejected() {
        let mut record = game(&["e4"]);
        let err = record.play_san("Ke3").unwrap_err();
        assert_eq!(
            err,
            GameError::IllegalMove {
                san: "Ke3".to_string(),
                ply: 2
            }
        );
        assert_eq!(record.moves().len(), 1);
        assert!(record.play_san("xyz").is_err());
    }

    #[test]
    fn test_fen_tag_sets_start() {
        let fen = "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1";
        let mut record = GameRecord::new(vec![("FEN".into(), fen.into())]).unwrap();
        record.play_san("e4").unwrap();
        assert_eq!(position_key(record.start()), "4k3/8/8/8/8/8/4P3/4K3 w - -");
    }

    #[test]
    fn test_bad_fen_tag() {
        let result = GameRecord::new(vec![("FEN".into(), "not a fen".into())]);
        assert!(matches!(result, Err(GameError::InvalidFen { .. })));
    }

    #[test]
    fn test_position_key_ignores_move_counters() {
        let a = parse_fen("8/8/8/4k3/8/8/8/4K2R w K - 0 1").unwrap();
        let b = parse_fen("8/8/8/4k3/8/8/8/4K2R w K - 37 80").unwrap();
        assert_eq!(position_key(&a), position_key(&b));
        assert_ne!(full_fen(&a), full_fen(&b));
    }

    #[test]
    fn test_uci_line_to_san() {
        let start = Chess::default();
        let line: Vec<String> = ["e2e4", "e7e5", "d1h5", "b8c6"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(uci_line_to_san(&start, &line, 3), vec!["e4", "e5", "Qh5"]);

        let broken: Vec<String> = vec!["e2e4".into(), "e2e4".into()];
        assert_eq!(uci_line_to_san(&start, &broken, 3), vec!["e4"]);
    }

    #[test]
    fn test_tags() {
        let mut record = game(&[]);
        assert_eq!(record.tag("White"), Some("alice"));
        assert_eq!(record.result(), "*");
        record.add_tag("GameId", "abc12345");
        record.add_tag("GameId", "other");
        assert_eq!(record.tag("GameId"), Some("abc12345"));
    }
}
