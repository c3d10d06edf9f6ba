//! Configuration file loading for the annotator.
//!
//! Settings come from an optional TOML file (`annotator.toml` in the
//! working directory unless another path is given) and are then overridden
//! by command-line flags.

use chess_analysis::quality::{DEFAULT_CPL_BLUNDER, DEFAULT_CPL_INACCURACY, DEFAULT_CPL_MISTAKE};
use chess_analysis::{Thresholds, DEFAULT_CACHE_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Annotator settings.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// Engine executable, a path or a name looked up in `PATH`.
    pub engine_path: String,
    /// Search depth for every position.
    pub depth: u32,
    /// Engine search threads.
    pub threads: u32,
    /// Engine hash table size in MB.
    pub hash_mb: u32,
    pub cpl_inaccuracy: u32,
    pub cpl_mistake: u32,
    pub cpl_blunder: u32,
    /// Only annotate moves by this player (case-insensitive).
    pub player: Option<String>,
    /// Maximum line length of written movetext.
    pub output_wrap_width: usize,
    /// Location of the evaluation cache database.
    pub cache_path: PathBuf,
    /// Upper bound on a single position's evaluation.
    pub eval_timeout_secs: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            engine_path: "stockfish".to_string(),
            depth: 18,
            threads: default_threads(),
            hash_mb: 128,
            cpl_inaccuracy: DEFAULT_CPL_INACCURACY,
            cpl_mistake: DEFAULT_CPL_MISTAKE,
            cpl_blunder: DEFAULT_CPL_BLUNDER,
            player: None,
            output_wrap_width: 80,
            cache_path: PathBuf::from(DEFAULT_CACHE_FILE),
            eval_timeout_secs: 120,
        }
    }
}

/// Half the logical CPUs, at least one.
fn default_threads() -> u32 {
    (num_cpus::get() / 2).max(1) as u32
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub engine_path: Option<String>,
    pub depth: Option<u32>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
    pub cpl_inaccuracy: Option<u32>,
    pub cpl_mistake: Option<u32>,
    pub cpl_blunder: Option<u32>,
    pub player: Option<String>,
    pub output_wrap_width: Option<usize>,
    pub cache_path: Option<PathBuf>,
    pub eval_timeout_secs: Option<u64>,
}

impl AnnotatorConfig {
    /// Loads the configuration from disk.
    ///
    /// With `path` set, that file must exist. Without it, [`Self::config_path()`]
    /// is used if present and defaults otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = Self::config_path();
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let content =
            std::fs::read_to_string(&config_path).map_err(|source| ConfigError::ReadError {
                path: config_path.clone(),
                source,
            })?;
        Ok(toml::from_str(&content)?)
    }

    /// Returns the path to the default configuration file.
    pub fn config_path() -> PathBuf {
        PathBuf::from("annotator.toml")
    }

    /// Applies command-line overrides.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = overrides.$field { self.$field = v; })*
            };
        }
        set!(
            engine_path,
            depth,
            threads,
            hash_mb,
            cpl_inaccuracy,
            cpl_mistake,
            cpl_blunder,
            output_wrap_width,
            cache_path,
            eval_timeout_secs
        );
        if overrides.player.is_some() {
            self.player = overrides.player;
        }
    }

    /// Checks ranges and threshold ordering.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.depth == 0 {
            return Err(ConfigError::Invalid("depth must be positive".into()));
        }
        if self.output_wrap_width == 0 {
            return Err(ConfigError::Invalid("output_wrap_width must be positive".into()));
        }
        if self.threads == 0 || self.hash_mb == 0 {
            return Err(ConfigError::Invalid(
                "threads and hash_mb must be positive".into(),
            ));
        }
        if self.eval_timeout_secs == 0 {
            return Err(ConfigError::Invalid("eval_timeout_secs must be positive".into()));
        }
        if !self.thresholds().is_valid() {
            return Err(ConfigError::Invalid(format!(
                "CPL thresholds must be positive and increasing, got {} / {} / {}",
                self.cpl_inaccuracy, self.cpl_mistake, self.cpl_blunder
            )));
        }
        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            inaccuracy: self.cpl_inaccuracy,
            mistake: self.cpl_mistake,
            blunder: self.cpl_blunder,
        }
    }

    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }
}
