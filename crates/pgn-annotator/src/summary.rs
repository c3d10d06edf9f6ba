//! End-of-run report.

use std::fmt;
use std::path::PathBuf;

/// Counters for one run, printed when the run ends for any reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub games_read: u64,
    pub games_annotated: u64,
    pub skipped_processed: u64,
    pub skipped_no_id: u64,
    pub malformed: u64,
    /// Games abandoned because the engine failed.
    pub failed: u64,
    pub moves_unevaluated: u64,
    pub timeouts: u64,
    pub cache_hits: u64,
    pub engine_evaluations: u64,
    /// The cache could not be used; every position went to the engine.
    pub cache_degraded: bool,
    /// The run stopped early on a shutdown request.
    pub interrupted: bool,
    /// The engine could not be started; no game was analyzed.
    pub engine_unavailable: bool,
    pub output_path: PathBuf,
    pub cache_path: PathBuf,
}

impl RunSummary {
    /// Games that were read but not written.
    pub fn skipped(&self) -> u64 {
        self.skipped_processed + self.skipped_no_id + self.malformed + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Analysis Summary ---")?;
        if self.engine_unavailable {
            writeln!(f, "Engine unavailable, no games were analyzed")?;
        }
        if self.interrupted {
            writeln!(f, "Run interrupted before all games were processed")?;
        }
        writeln!(f, "Games read:                  {}", self.games_read)?;
        writeln!(f, "Games annotated:             {}", self.games_annotated)?;
        writeln!(f, "Skipped (already processed): {}", self.skipped_processed)?;
        writeln!(f, "Skipped (no game id):        {}", self.skipped_no_id)?;
        writeln!(f, "Malformed games:             {}", self.malformed)?;
        writeln!(f, "Failed (engine errors):      {}", self.failed)?;
        writeln!(f, "Moves left unevaluated:      {}", self.moves_unevaluated)?;
        writeln!(f, "Evaluation timeouts:         {}", self.timeouts)?;
        writeln!(f, "Cache hits:                  {}", self.cache_hits)?;
        writeln!(f, "Engine evaluations:          {}", self.engine_evaluations)?;
        writeln!(f, "Output PGN:                  {}", self.output_path.display())?;
        if self.cache_degraded {
            write!(f, "Cache:                       unavailable ({})", self.cache_path.display())
        } else {
            write!(f, "Cache:                       {}", self.cache_path.display())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_counts() {
        let summary = RunSummary {
            games_read: 5,
            games_annotated: 2,
            skipped_processed: 1,
            skipped_no_id: 1,
            malformed: 1,
            output_path: PathBuf::from("out.pgn"),
            cache_path: PathBuf::from("cache.db"),
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.contains("Games read:                  5"));
        assert!(text.contains("Games annotated:             2"));
        assert!(text.contains("out.pgn"));
        assert!(!text.contains("interrupted"));
        assert!(!text.contains("unavailable"));
        assert_eq!(summary.skipped(), 3);
    }

    #[test]
    fn test_display_flags() {
        let summary = RunSummary {
            interrupted: true,
            cache_degraded: true,
            ..RunSummary::default()
        };
        let text = summary.to_string();
        assert!(text.contains("interrupted"));
        assert!(text.contains("unavailable"));
        assert!(!text.contains("Engine unavailable"));

        let no_engine = RunSummary {
            engine_unavailable: true,
            ..RunSummary::default()
        };
        assert!(no_engine.to_string().contains("Engine unavailable"));
    }
}
