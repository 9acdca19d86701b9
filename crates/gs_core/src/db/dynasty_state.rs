//! Dynasty simulation state.
//!
//! The durable counterpart to the in-memory phase state: one row per
//! `(dynasty, season)` recording the current date, phase, week, and draft
//! progress. Controllers restore from the latest row by season, which
//! makes the persisted season year the single source of truth.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::error::{Result, SyncError};

use super::DatabaseConnection;

/// Highest pick number in a seven-round draft (including compensatory
/// selections).
pub const MAX_DRAFT_PICK: u32 = 262;

/// One dynasty_state row.
#[derive(Debug, Clone, PartialEq)]
pub struct DynastyState {
    pub dynasty_id: String,
    pub season: i32,
    pub current_date: Date,
    pub current_phase: SeasonPhase,
    pub current_week: Option<u32>,
    pub last_simulated_game_id: Option<String>,
    pub current_draft_pick: u32,
    pub draft_in_progress: bool,
}

/// Store for the dynasty_state table (plus the dynasties registry it
/// references).
#[derive(Clone)]
pub struct DynastyStateStore {
    db: DatabaseConnection,
}

const SELECT_COLUMNS: &str = "dynasty_id, season, \"current_date\", current_phase, current_week,
     last_simulated_game_id, current_draft_pick, draft_in_progress";

impl DynastyStateStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// NFL season year for a date: August 1 starts a new season year.
    pub fn derive_season_from_date(date: Date) -> i32 {
        date.season_year()
    }

    fn row_to_state(row: &Row<'_>) -> rusqlite::Result<(DynastyState, Option<String>)> {
        let date_raw: String = row.get(2)?;
        let phase_raw: String = row.get(3)?;
        let week: Option<i64> = row.get(4)?;
        let pick: i64 = row.get(6)?;
        let in_progress: i64 = row.get(7)?;

        let mut problem = None;
        let current_date = match Date::parse(&date_raw) {
            Ok(d) => d,
            Err(e) => {
                problem = Some(format!("bad current_date '{date_raw}': {e}"));
                Date::new(1970, 1, 1).unwrap()
            }
        };
        let current_phase = match SeasonPhase::parse(&phase_raw) {
            Ok(p) => p,
            Err(e) => {
                problem = Some(format!("bad current_phase '{phase_raw}': {e}"));
                SeasonPhase::Offseason
            }
        };

        Ok((
            DynastyState {
                dynasty_id: row.get(0)?,
                season: row.get(1)?,
                current_date,
                current_phase,
                current_week: week.map(|w| w as u32),
                last_simulated_game_id: row.get(5)?,
                current_draft_pick: pick as u32,
                draft_in_progress: in_progress != 0,
            },
            problem,
        ))
    }

    fn check_row(parsed: (DynastyState, Option<String>)) -> Result<DynastyState> {
        match parsed {
            (state, None) => Ok(state),
            (state, Some(problem)) => Err(SyncError::Initialization {
                sync_point: "dynasty_state_load",
                reason: format!("dynasty '{}': {problem}", state.dynasty_id),
            }),
        }
    }

    /// Register a dynasty if it does not exist yet. Every other table keys
    /// off this row through foreign keys.
    pub fn ensure_dynasty(&self, dynasty_id: &str, dynasty_name: &str, owner_name: Option<&str>) -> Result<()> {
        if dynasty_id.is_empty() {
            return Err(SyncError::State("dynasty_id cannot be empty".into()));
        }
        let conn = self.db.lock();
        conn.execute(
            "INSERT OR IGNORE INTO dynasties (dynasty_id, dynasty_name, owner_name)
             VALUES (?1, ?2, ?3)",
            params![dynasty_id, dynasty_name, owner_name],
        )?;
        Ok(())
    }

    pub fn get_current(&self, dynasty_id: &str, season: i32) -> Result<Option<DynastyState>> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM dynasty_state
                     WHERE dynasty_id = ?1 AND season = ?2"
                ),
                params![dynasty_id, season],
                Self::row_to_state,
            )
            .optional()?;
        row.map(Self::check_row).transpose()
    }

    /// Latest row by season for a dynasty. Used at controller construction
    /// to discover the current season.
    pub fn get_latest(&self, dynasty_id: &str) -> Result<Option<DynastyState>> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM dynasty_state
                     WHERE dynasty_id = ?1 ORDER BY season DESC LIMIT 1"
                ),
                params![dynasty_id],
                Self::row_to_state,
            )
            .optional()?;
        row.map(Self::check_row).transpose()
    }

    /// Create fresh state for `(dynasty, season)`, deleting any stale row
    /// first. A read-back verifies the write landed; a mismatch is a
    /// persistence fault.
    pub fn initialize(
        &self,
        dynasty_id: &str,
        season: i32,
        start_date: Date,
        start_week: u32,
        start_phase: SeasonPhase,
    ) -> Result<()> {
        let corrected = Self::corrected_season(dynasty_id, season, start_date);
        self.delete(dynasty_id, season)?;
        if corrected != season {
            self.delete(dynasty_id, corrected)?;
        }
        let season = corrected;

        {
            let conn = self.db.lock();
            conn.execute(
                "INSERT INTO dynasty_state
                 (dynasty_id, season, \"current_date\", current_week, current_phase)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    dynasty_id,
                    season,
                    start_date.to_string(),
                    start_week,
                    start_phase.as_str()
                ],
            )?;
        }

        let written = self.get_current(dynasty_id, season)?;
        match written {
            Some(state) if state.current_date == start_date => Ok(()),
            other => Err(SyncError::Persistence {
                operation: "dynasty_state_initialize",
                reason: format!(
                    "read-back verification failed: expected date {start_date}, found {:?}",
                    other.map(|s| s.current_date.to_string())
                ),
            }),
        }
    }

    // Prefers the year derived from the date when the caller's season
    // disagrees, logging the correction.
    fn corrected_season(dynasty_id: &str, season: i32, date: Date) -> i32 {
        let derived = Self::derive_season_from_date(date);
        if season != derived {
            log::warn!(
                "season/date mismatch for dynasty '{dynasty_id}': provided season {season}, \
                 date {date} derives {derived}; using derived value"
            );
        }
        derived
    }

    /// Upsert state for `(dynasty, season)` using an externally-owned
    /// connection. Fails loud when no row is affected.
    pub fn update_on(&self, conn: &Connection, state: &DynastyState) -> Result<()> {
        let season = Self::corrected_season(&state.dynasty_id, state.season, state.current_date);

        let affected = conn
            .execute(
                "INSERT OR REPLACE INTO dynasty_state
                 (dynasty_id, season, \"current_date\", current_phase, current_week,
                  last_simulated_game_id, current_draft_pick, draft_in_progress, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CURRENT_TIMESTAMP)",
                params![
                    state.dynasty_id,
                    season,
                    state.current_date.to_string(),
                    state.current_phase.as_str(),
                    state.current_week,
                    state.last_simulated_game_id,
                    state.current_draft_pick,
                    state.draft_in_progress,
                ],
            )
            .map_err(|e| SyncError::Persistence {
                operation: "dynasty_state_update",
                reason: format!(
                    "write failed for dynasty '{}' season {}: {e}",
                    state.dynasty_id, season
                ),
            })?;

        if affected == 0 {
            return Err(SyncError::Persistence {
                operation: "dynasty_state_update",
                reason: format!(
                    "no rows affected for dynasty '{}' season {}",
                    state.dynasty_id, season
                ),
            });
        }
        Ok(())
    }

    pub fn update(&self, state: &DynastyState) -> Result<()> {
        let conn = self.db.lock();
        self.update_on(&conn, state)
    }

    /// Re-key the most recent row to a new season year. Used only by the
    /// season-year synchronizer.
    pub fn update_season(&self, dynasty_id: &str, new_season: i32) -> Result<()> {
        let latest = self.get_latest(dynasty_id)?.ok_or(SyncError::Persistence {
            operation: "dynasty_state_update_season",
            reason: format!("no state rows exist for dynasty '{dynasty_id}'"),
        })?;
        if latest.season == new_season {
            return Ok(());
        }
        let conn = self.db.lock();
        let affected = conn.execute(
            "UPDATE dynasty_state SET season = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE dynasty_id = ?2 AND season = ?3",
            params![new_season, dynasty_id, latest.season],
        )?;
        if affected == 0 {
            return Err(SyncError::Persistence {
                operation: "dynasty_state_update_season",
                reason: format!(
                    "no rows affected re-keying dynasty '{dynasty_id}' {} -> {new_season}",
                    latest.season
                ),
            });
        }
        log::info!("dynasty '{dynasty_id}' season re-keyed {} -> {new_season}", latest.season);
        Ok(())
    }

    /// Record draft progress. `current_pick` is bounded to
    /// `[0, MAX_DRAFT_PICK]`; 0 means the draft has not started.
    pub fn update_draft_progress(
        &self,
        dynasty_id: &str,
        season: i32,
        current_pick: u32,
        in_progress: bool,
    ) -> Result<bool> {
        if current_pick > MAX_DRAFT_PICK {
            return Err(SyncError::State(format!(
                "invalid draft pick {current_pick}: must be 0-{MAX_DRAFT_PICK}"
            )));
        }
        let conn = self.db.lock();
        let affected = conn.execute(
            "UPDATE dynasty_state
             SET current_draft_pick = ?1, draft_in_progress = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE dynasty_id = ?3 AND season = ?4",
            params![current_pick, in_progress, dynasty_id, season],
        )?;
        if affected == 0 {
            log::warn!(
                "draft progress update affected no rows (dynasty '{dynasty_id}', season {season})"
            );
        }
        Ok(affected > 0)
    }

    /// Delete the row for `(dynasty, season)`; returns the row count.
    pub fn delete(&self, dynasty_id: &str, season: i32) -> Result<usize> {
        let conn = self.db.lock();
        let affected = conn.execute(
            "DELETE FROM dynasty_state WHERE dynasty_id = ?1 AND season = ?2",
            params![dynasty_id, season],
        )?;
        Ok(affected)
    }

    /// Update only the persisted phase for `(dynasty, season)`. Fails loud
    /// when the row is missing.
    pub fn update_phase(&self, dynasty_id: &str, season: i32, phase: SeasonPhase) -> Result<()> {
        let conn = self.db.lock();
        let affected = conn.execute(
            "UPDATE dynasty_state SET current_phase = ?1, updated_at = CURRENT_TIMESTAMP
             WHERE dynasty_id = ?2 AND season = ?3",
            params![phase.as_str(), dynasty_id, season],
        )?;
        if affected == 0 {
            return Err(SyncError::Persistence {
                operation: "dynasty_state_update_phase",
                reason: format!(
                    "no rows affected setting phase '{phase}' for dynasty '{dynasty_id}' season {season}"
                ),
            });
        }
        Ok(())
    }
}
