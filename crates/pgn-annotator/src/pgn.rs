//! PGN reading and annotated PGN writing.

use chess_analysis::shakmaty::Position;
use chess_analysis::{Color, Evaluation, GameAnalysis, GameError, GameRecord, MoveAnalysis};
use pgn_reader::{RawTag, Reader, SanPlus, Skip, Visitor};
use std::io::{self, Read};
use std::ops::ControlFlow;

/// Headers this writer sets itself; input values are replaced.
const GENERATED_TAGS: [&str; 3] = ["WhiteACPL", "BlackACPL", "Annotator"];

/// Builds a [`GameRecord`] from each game in a PGN stream.
///
/// Only the mainline is kept; variations and comments are dropped. The
/// first illegal move makes the whole game an error.
struct GameCollector;

impl Visitor for GameCollector {
    type Tags = Vec<(String, String)>;
    type Movetext = Result<GameRecord, GameError>;
    type Output = Result<GameRecord, GameError>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, Self::Tags> {
        ControlFlow::Continue(Vec::new())
    }

    fn tag(
        &mut self,
        tags: &mut Self::Tags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        tags.push((
            String::from_utf8_lossy(name).into_owned(),
            value.decode_utf8_lossy().into_owned(),
        ));
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: Self::Tags) -> ControlFlow<Self::Output, Self::Movetext> {
        ControlFlow::Continue(GameRecord::new(tags))
    }

    fn san(&mut self, movetext: &mut Self::Movetext, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        if let Ok(game) = movetext {
            if let Err(e) = game.play_san(&san_plus.to_string()) {
                *movetext = Err(e);
            }
        }
        ControlFlow::Continue(())
    }

    fn begin_variation(
        &mut self,
        _movetext: &mut Self::Movetext,
    ) -> ControlFlow<Self::Output, Skip> {
        ControlFlow::Continue(Skip(true))
    }

    fn end_game(&mut self, movetext: Self::Movetext) -> Self::Output {
        movetext
    }
}

/// Iterator over the games of a PGN stream.
///
/// Yields `Err` only for I/O failures; a game that cannot be replayed is
/// `Ok(Err(GameError))` so the caller can skip it and keep reading.
pub struct PgnGames<R: Read> {
    reader: Reader<R>,
    collector: GameCollector,
}

impl<R: Read> PgnGames<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::new(input),
            collector: GameCollector,
        }
    }
}

impl<R: Read> Iterator for PgnGames<R> {
    type Item = io::Result<Result<GameRecord, GameError>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_game(&mut self.collector).transpose()
    }
}

/// Formatting choices for annotated output.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Maximum movetext line length.
    pub wrap_width: usize,
    /// Only this player's moves get quality comments.
    pub player: Option<String>,
    /// Value of the `Annotator` header.
    pub annotator: String,
}

/// Renders an analyzed game as PGN text, ending with a blank line.
///
/// Every move gets an `[%eval]` comment when its resulting position was
/// evaluated. Moves with a quality label get a second comment, unless a
/// player filter is set and someone else made the move.
pub fn format_game(game: &GameRecord, analysis: &GameAnalysis, options: &WriteOptions) -> String {
    let mut out = String::new();

    for (name, value) in game.tags() {
        if !GENERATED_TAGS.contains(&name.as_str()) {
            push_tag(&mut out, name, value);
        }
    }
    push_tag(&mut out, "WhiteACPL", &acpl_text(analysis, Color::White));
    push_tag(&mut out, "BlackACPL", &acpl_text(analysis, Color::Black));
    push_tag(&mut out, "Annotator", &options.annotator);
    out.push('\n');

    let tokens = movetext_tokens(game, analysis, options);
    for line in wrap(&tokens, options.wrap_width) {
        out.push_str(&line);
        out.push('\n');
    }
    out.push('\n');
    out
}

fn push_tag(out: &mut String, name: &str, value: &str) {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    out.push_str(&format!("[{} \"{}\"]\n", name, escaped));
}

/// ACPL with one decimal, or `N/A` when no move was classified.
pub fn acpl_text(analysis: &GameAnalysis, color: Color) -> String {
    match analysis.stats_for(color).acpl() {
        Some(acpl) => format!("{:.1}", acpl),
        None => "N/A".to_string(),
    }
}

fn movetext_tokens(game: &GameRecord, analysis: &GameAnalysis, options: &WriteOptions) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut fullmove = u32::from(game.start().fullmoves());
    // A move number is needed for White's moves and after any comment.
    let mut need_number = true;

    for mv in &analysis.moves {
        match mv.mover {
            Color::White => tokens.push(format!("{}.", fullmove)),
            Color::Black if need_number => tokens.push(format!("{}...", fullmove)),
            Color::Black => {}
        }
        tokens.push(mv.san.clone());
        need_number = false;

        if let Some(eval) = eval_comment(mv.eval_after_white, analysis.depth) {
            tokens.extend(eval.split(' ').map(str::to_string));
            need_number = true;
        }

        let mover_name = game.tag(match mv.mover {
            Color::White => "White",
            Color::Black => "Black",
        });
        if player_matches(options.player.as_deref(), mover_name) {
            if let Some(comment) = quality_comment(mv) {
                tokens.extend(format!("{{ {} }}", comment).split(' ').map(str::to_string));
                need_number = true;
            }
        }

        if mv.mover == Color::Black {
            fullmove += 1;
        }
    }

    tokens.push(game.result().to_string());
    tokens
}

/// `{[%eval 0.35,18]}` from White's perspective; omitted once mate is on
/// the board.
fn eval_comment(eval: Option<Evaluation>, depth: u32) -> Option<String> {
    match eval? {
        Evaluation::Mated | Evaluation::MateDelivered => None,
        e => Some(format!("{{[%eval {},{}]}}", e, depth)),
    }
}

fn player_matches(filter: Option<&str>, mover: Option<&str>) -> bool {
    match (filter, mover) {
        (None, _) => true,
        (Some(want), Some(name)) => want.to_lowercase() == name.to_lowercase(),
        (Some(_), None) => false,
    }
}

/// `Blunder (-470cp, WC 48%→16% [-32%]). Best: Nf3 (PV: Nf3 Nc6 d4...)`
fn quality_comment(mv: &MoveAnalysis) -> Option<String> {
    let classification = mv.classification.as_ref()?;
    let quality = classification.quality?;

    let mut details = Vec::new();
    if classification.cpl >= 1 {
        details.push(format!("-{}cp", classification.cpl));
    }
    let drop = classification.win_chance_delta();
    if quality != chess_analysis::MoveQuality::MissedMate && drop >= 1.0 {
        details.push(format!(
            "WC {:.0}%→{:.0}% [-{:.0}%]",
            classification.win_chance_before, classification.win_chance_after, drop
        ));
    }

    let mut comment = quality.label().to_string();
    if !details.is_empty() {
        comment.push_str(&format!(" ({})", details.join(", ")));
    }
    comment.push('.');
    if let Some(best) = &mv.best_move_san {
        comment.push_str(&format!(" Best: {}", best));
        if !mv.pv_san.is_empty() {
            comment.push_str(&format!(" (PV: {}...)", mv.pv_san.join(" ")));
        }
    }
    Some(comment)
}

/// Greedy word wrap. A token longer than `width` gets a line of its own.
pub fn wrap(tokens: &[String], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.chars().count() + 1 + token.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(token);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
