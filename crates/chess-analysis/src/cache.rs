//! Persistent SQLite cache of engine evaluations.
//!
//! Entries are keyed by position, engine path, engine version and search
//! depth. Changing any of those partitions the cache: old entries are never
//! returned and never deleted.

use crate::engine::EngineIdentity;
use crate::Evaluation;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use thiserror::Error;

/// Default cache file name, relative to the working directory.
pub const DEFAULT_CACHE_FILE: &str = "chess_analyzer_cache.db";

/// Errors raised by the evaluation cache.
///
/// Callers are expected to fall back to evaluating without the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The storage could not be opened, read or written.
    #[error("Evaluation cache unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),
    /// A stored entry could not be decoded.
    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A cached evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Score from the side to move's perspective.
    pub evaluation: Evaluation,
    /// Principal variation in UCI notation, possibly empty.
    pub best_line: Vec<String>,
}

/// SQLite-backed evaluation cache.
///
/// Every [`store`](PositionCache::store) is committed immediately, so an
/// entry survives the process being killed right after the call returns.
///
/// # Example
///
/// ```ignore
/// let cache = PositionCache::open("chess_analyzer_cache.db")?;
/// if cache.lookup(&key, engine.identity(), 18)?.is_none() {
///     cache.store(&key, engine.identity(), 18, &entry)?;
/// }
/// cache.close()?;
/// ```
pub struct PositionCache {
    conn: Connection,
}

impl PositionCache {
    /// Opens or creates the cache database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Unavailable` if the file cannot be opened or is
    /// not a SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    /// Opens a cache that lives only as long as the handle.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> Result<(), CacheError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS evaluations (
                position_key TEXT NOT NULL,
                engine_path TEXT NOT NULL,
                engine_version TEXT NOT NULL,
                depth INTEGER NOT NULL,
                score TEXT NOT NULL,
                best_line TEXT NOT NULL,
                PRIMARY KEY (position_key, engine_path, engine_version, depth)
            );
            ",
        )?;
        Ok(())
    }

    /// Looks up an entry for the exact `(position, engine, depth)` key.
    ///
    /// Returns `Ok(None)` on a miss, including when the position was cached
    /// for a different engine build or depth.
    pub fn lookup(
        &self,
        position_key: &str,
        engine: &EngineIdentity,
        depth: u32,
    ) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT score, best_line FROM evaluations
                 WHERE position_key = ?1 AND engine_path = ?2
                   AND engine_version = ?3 AND depth = ?4",
                (position_key, &engine.path, &engine.version, depth),
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((score, best_line)) = row else {
            return Ok(None);
        };
        Ok(Some(CacheEntry {
            evaluation: serde_json::from_str(&score)?,
            best_line: serde_json::from_str(&best_line)?,
        }))
    }

    /// Stores an entry, replacing any existing one with the same key.
    pub fn store(
        &self,
        position_key: &str,
        engine: &EngineIdentity,
        depth: u32,
        entry: &CacheEntry,
    ) -> Result<(), CacheError> {
        let score = serde_json::to_string(&entry.evaluation)?;
        let best_line = serde_json::to_string(&entry.best_line)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO evaluations
                (position_key, engine_path, engine_version, depth, score, best_line)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                position_key,
                &engine.path,
                &engine.version,
                depth,
                score,
                best_line,
            ),
        )?;
        Ok(())
    }

    /// Number of stored entries across all engines and depths.
    pub fn len(&self) -> Result<u64, CacheError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM evaluations", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// Closes the database, surfacing any error from the final flush.
    pub fn close(self) -> Result<(), CacheError> {
        self.conn.close().map_err(|(_, e)| CacheError::Unavailable(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stockfish() -> EngineIdentity {
        EngineIdentity {
            path: "/usr/bin/stockfish".to_string(),
            version: "Stockfish 16.1".to_string(),
        }
    }

    fn entry() -> CacheEntry {
        CacheEntry {
            evaluation: Evaluation::Centipawns(34),
            best_line: vec!["e2e4".to_string(), "e7e5".to_string()],
        }
    }

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -";

    #[test]
    fn test_roundtrip_in_memory() {
        let cache = PositionCache::open_in_memory().unwrap();
        assert!(cache.is_empty().unwrap());
        cache.store(START, &stockfish(), 18, &entry()).unwrap();
        assert_eq!(cache.lookup(START, &stockfish(), 18).unwrap(), Some(entry()));
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");

        let cache = PositionCache::open(&path).unwrap();
        let mate = CacheEntry {
            evaluation: Evaluation::Mate(-2),
            best_line: vec![],
        };
        cache.store(START, &stockfish(), 18, &entry()).unwrap();
        cache.store("8/8/8/8/8/5k2/8/5K1q w - -", &stockfish(), 18, &mate).unwrap();
        cache.close().unwrap();

        let reopened = PositionCache::open(&path).unwrap();
        assert_eq!(reopened.lookup(START, &stockfish(), 18).unwrap(), Some(entry()));
        assert_eq!(
            reopened
                .lookup("8/8/8/8/8/5k2/8/5K1q w - -", &stockfish(), 18)
                .unwrap(),
            Some(mate)
        );
    }

    #[test]
    fn test_depth_is_part_of_key() {
        let cache = PositionCache::open_in_memory().unwrap();
        cache.store(START, &stockfish(), 18, &entry()).unwrap();
        assert_eq!(cache.lookup(START, &stockfish(), 20).unwrap(), None);
    }

    #[test]
    fn test_engine_identity_is_part_of_key() {
        let cache = PositionCache::open_in_memory().unwrap();
        cache.store(START, &stockfish(), 18, &entry()).unwrap();

        let newer = EngineIdentity {
            version: "Stockfish 17".to_string(),
            ..stockfish()
        };
        assert_eq!(cache.lookup(START, &newer, 18).unwrap(), None);

        let elsewhere = EngineIdentity {
            path: "/opt/stockfish".to_string(),
            ..stockfish()
        };
        assert_eq!(cache.lookup(START, &elsewhere, 18).unwrap(), None);
    }

    #[test]
    fn test_store_overwrites() {
        let cache = PositionCache::open_in_memory().unwrap();
        cache.store(START, &stockfish(), 18, &entry()).unwrap();
        let replacement = CacheEntry {
            evaluation: Evaluation::Centipawns(20),
            best_line: vec!["d2d4".to_string()],
        };
        cache.store(START, &stockfish(), 18, &replacement).unwrap();
        assert_eq!(
            cache.lookup(START, &stockfish(), 18).unwrap(),
            Some(replacement)
        );
        assert_eq!(cache.len().unwrap(), 1);
    }

    #[test]
    fn test_garbage_file_is_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();
        assert!(matches!(
            PositionCache::open(&path),
            Err(CacheError::Unavailable(_))
        ));
    }

    #[test]
    fn test_corrupt_entry_is_reported() {
        let cache = PositionCache::open_in_memory().unwrap();
        cache
            .conn
            .execute(
                "INSERT INTO evaluations VALUES (?1, ?2, ?3, 18, 'not json', '[]')",
                (START, "/usr/bin/stockfish", "Stockfish 16.1"),
            )
            .unwrap();
        assert!(matches!(
            cache.lookup(START, &stockfish(), 18),
            Err(CacheError::Corrupt(_))
        ));
    }
}
