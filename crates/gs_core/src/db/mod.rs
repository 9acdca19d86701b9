//! Persistence layer.
//!
//! A single SQLite database holds every durable row the engine owns. The
//! connection is shared between the stores through [`DatabaseConnection`];
//! all stores accept an externally-owned connection reference so a caller
//! can span several store operations with one transaction.

pub mod dynasty_state;
pub mod event_store;
pub mod schema;
pub mod standings;
pub mod sync;
pub mod transaction;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::Result;

/// Shared handle to the engine's SQLite connection.
///
/// Cloning is cheap; every clone refers to the same underlying connection.
/// The stores lock it per operation, and the season controller locks it
/// once around a whole day's writes.
#[derive(Clone)]
pub struct DatabaseConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Open (or create) the database file, apply connection pragmas, and
    /// initialize the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        conn.execute_batch(schema::DDL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database for tests and throwaway simulations.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(schema::DDL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the connection for a sequence of statements. Stores lock per
    /// call; hold this across calls to make them one atomic unit.
    pub fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DatabaseConnection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_initializes_in_memory() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        let conn = db.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('dynasties', 'dynasty_state', 'events', 'games', 'player_game_stats', 'standings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 6);
    }

    #[test]
    fn schema_initializes_on_disk_with_wal() {
        let dir = tempfile::tempdir().unwrap();
        let db = DatabaseConnection::open(dir.path().join("season.db")).unwrap();
        let conn = db.lock();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("season.db");
        drop(DatabaseConnection::open(&path).unwrap());
        // Second open re-runs the DDL without error
        let db = DatabaseConnection::open(&path).unwrap();
        drop(db.lock());
    }
}
