//! Scoped multi-statement transactions.
//!
//! Wraps `BEGIN <mode>` / `COMMIT` / `ROLLBACK` with an explicit state
//! machine, and transparently degrades to a uniquely-named savepoint when
//! a transaction is already open on the connection.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;

use crate::error::{Result, SyncError};

static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SQLite locking mode for the transaction.
///
/// `Deferred` acquires locks lazily (read-heavy default), `Immediate`
/// takes the write lock up front, `Exclusive` blocks all other
/// connections and is reserved for destructive operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionMode {
    fn as_sql(&self) -> &'static str {
        match self {
            TransactionMode::Deferred => "DEFERRED",
            TransactionMode::Immediate => "IMMEDIATE",
            TransactionMode::Exclusive => "EXCLUSIVE",
        }
    }
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Transaction lifecycle: `Inactive -> Active -> (Committed | RolledBack)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Inactive,
    Active,
    Committed,
    RolledBack,
}

/// A transaction (or nested savepoint) scoped to a borrowed connection.
///
/// Dropping an active context rolls it back; commit must be explicit or go
/// through [`TransactionContext::run`].
pub struct TransactionContext<'c> {
    conn: &'c Connection,
    mode: TransactionMode,
    state: TransactionState,
    savepoint: Option<String>,
}

impl<'c> TransactionContext<'c> {
    /// Begin a transaction with the given mode. If the connection already
    /// has an open transaction, a savepoint is created instead and the
    /// mode is ignored (SQLite savepoints have no mode).
    pub fn begin(conn: &'c Connection, mode: TransactionMode) -> Result<Self> {
        let savepoint = if conn.is_autocommit() {
            conn.execute_batch(&format!("BEGIN {}", mode.as_sql()))?;
            None
        } else {
            let name = format!(
                "sp_{}",
                SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed)
            );
            conn.execute_batch(&format!("SAVEPOINT {name}"))?;
            log::debug!("nested transaction, using savepoint {name}");
            Some(name)
        };
        Ok(Self {
            conn,
            mode,
            state: TransactionState::Active,
            savepoint,
        })
    }

    /// Run `f` inside a transaction: commit on `Ok`, roll back on `Err`.
    /// A rollback failure after the inner error is logged, not raised.
    pub fn run<T>(
        conn: &Connection,
        mode: TransactionMode,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let mut tx = TransactionContext::begin(conn, mode)?;
        match f(conn) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback() {
                    log::error!("rollback after failed transaction also failed: {rb}");
                }
                Err(err)
            }
        }
    }

    /// Commit the transaction (release the savepoint when nested).
    /// Idempotent when already committed.
    pub fn commit(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Committed => {
                log::warn!("transaction already committed, skipping");
                Ok(())
            }
            TransactionState::Active => {
                match &self.savepoint {
                    Some(name) => self.conn.execute_batch(&format!("RELEASE {name}"))?,
                    None => self.conn.execute_batch("COMMIT")?,
                }
                self.state = TransactionState::Committed;
                Ok(())
            }
            other => Err(SyncError::State(format!(
                "cannot commit transaction in state {other:?}"
            ))),
        }
    }

    /// Roll the transaction back (rollback-to-and-release when nested).
    /// Idempotent when already rolled back.
    pub fn rollback(&mut self) -> Result<()> {
        match self.state {
            TransactionState::RolledBack => {
                log::warn!("transaction already rolled back, skipping");
                Ok(())
            }
            TransactionState::Active => {
                match &self.savepoint {
                    Some(name) => {
                        // ROLLBACK TO keeps the savepoint open, so release it too
                        self.conn
                            .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name}"))?;
                    }
                    None => self.conn.execute_batch("ROLLBACK")?,
                }
                self.state = TransactionState::RolledBack;
                Ok(())
            }
            other => Err(SyncError::State(format!(
                "cannot rollback transaction in state {other:?}"
            ))),
        }
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub fn is_nested(&self) -> bool {
        self.savepoint.is_some()
    }
}

impl Drop for TransactionContext<'_> {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            if let Err(e) = self.rollback() {
                log::error!("implicit rollback on drop failed: {e}");
            }
        }
    }
}
