//! Stable game identifiers, used to skip games that are already annotated.

use regex::Regex;
use std::collections::HashSet;

/// Extracts game identifiers from PGN headers.
///
/// Sources, first match wins:
/// 1. a lichess game URL in `Site`
/// 2. a chess.com live game URL in `Site`
/// 3. the `GameId` header
/// 4. a lichess game URL in `LichessURL`
pub struct GameIdMatcher {
    lichess: Regex,
    chess_com: Regex,
    header: Regex,
}

impl GameIdMatcher {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            lichess: Regex::new(r"lichess\.org/([a-zA-Z0-9]{8,12})")?,
            chess_com: Regex::new(r"chess\.com/game/live/([0-9]+)")?,
            header: Regex::new(r#"(?m)^\s*\[(\w+)\s+"((?:[^"\\]|\\.)*)"\s*\]"#)?,
        })
    }

    /// Identifier of a game given its headers.
    pub fn identify(&self, tags: &[(String, String)]) -> Option<String> {
        let tag = |name: &str| {
            tags.iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str())
        };

        if let Some(site) = tag("Site") {
            if let Some(id) = self.capture(&self.lichess, site) {
                return Some(id);
            }
            if let Some(id) = self.capture(&self.chess_com, site) {
                return Some(id);
            }
        }
        if let Some(id) = tag("GameId").map(str::trim).filter(|id| !id.is_empty()) {
            return Some(id.to_string());
        }
        tag("LichessURL").and_then(|url| self.capture(&self.lichess, url))
    }

    /// Every identifier mentioned in the headers of a PGN text.
    ///
    /// Each header that could identify a game contributes, so a game whose
    /// `Site` and `GameId` differ is recognised by either.
    pub fn scan(&self, pgn: &str) -> HashSet<String> {
        let mut ids = HashSet::new();
        for caps in self.header.captures_iter(pgn) {
            let value = unescape(&caps[2]);
            let found = match &caps[1] {
                "Site" => self
                    .capture(&self.lichess, &value)
                    .or_else(|| self.capture(&self.chess_com, &value)),
                "GameId" => Some(value.trim().to_string()).filter(|id| !id.is_empty()),
                "LichessURL" => self.capture(&self.lichess, &value),
                _ => None,
            };
            ids.extend(found);
        }
        ids
    }

    fn capture(&self, re: &Regex, text: &str) -> Option<String> {
        re.captures(text).map(|c| c[1].to_string())
    }
}

fn unescape(value: &str) -> String {
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lichess_site() {
        let m = GameIdMatcher::new().unwrap();
        let id = m.identify(&tags(&[("Site", "https://lichess.org/AbCd1234")]));
        assert_eq!(id.as_deref(), Some("AbCd1234"));

        let with_color = m.identify(&tags(&[("Site", "https://lichess.org/AbCd1234/black")]));
        assert_eq!(with_color.as_deref(), Some("AbCd1234"));
    }

    #[test]
    fn test_chess_com_site() {
        let m = GameIdMatcher::new().unwrap();
        let id = m.identify(&tags(&[("Site", "https://www.chess.com/game/live/98765432101")]));
        assert_eq!(id.as_deref(), Some("98765432101"));
    }

    #[test]
    fn test_precedence() {
        let m = GameIdMatcher::new().unwrap();
        let id = m.identify(&tags(&[
            ("GameId", "custom-1"),
            ("Site", "https://lichess.org/zzzz9999"),
        ]));
        assert_eq!(id.as_deref(), Some("zzzz9999"));

        let id = m.identify(&tags(&[
            ("Site", "Local club"),
            ("GameId", "custom-1"),
            ("LichessURL", "https://lichess.org/zzzz9999"),
        ]));
        assert_eq!(id.as_deref(), Some("custom-1"));

        let id = m.identify(&tags(&[("LichessURL", "https://lichess.org/zzzz9999")]));
        assert_eq!(id.as_deref(), Some("zzzz9999"));
    }

    #[test]
    fn test_no_identifier() {
        let m = GameIdMatcher::new().unwrap();
        assert_eq!(m.identify(&tags(&[("Site", "?"), ("GameId", "  ")])), None);
        assert_eq!(m.identify(&[]), None);
    }

    #[test]
    fn test_scan_output() {
        let m = GameIdMatcher::new().unwrap();
        let pgn = r#"[Event "Rated Blitz game"]
[Site "https://lichess.org/AbCd1234"]
[GameId "AbCd1234"]

1. e4 { [%eval 0.30,18] } e5 1-0

[Event "Casual"]
[Site "https://www.chess.com/game/live/5551234"]

1. d4 d5 0-1

[Event "Club"]
[GameId "club-\"7\""]

1. c4 *
"#;
        let ids = m.scan(pgn);
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("AbCd1234"));
        assert!(ids.contains("5551234"));
        assert!(ids.contains("club-\"7\""));
    }

    #[test]
    fn test_scan_ignores_comments() {
        let m = GameIdMatcher::new().unwrap();
        let ids = m.scan("1. e4 { see [GameId \"fake\"] } e5 *\n");
        assert!(ids.is_empty());
    }
}
