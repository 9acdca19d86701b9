//! Polymorphic event persistence.
//!
//! One append-mostly table holds every scheduled and completed event, keyed
//! by event id with dynasty isolation on every row. The store does not
//! interpret date semantics: timestamps are opaque Unix-ms integers, and
//! the JSON payload round-trips losslessly.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::calendar::date::Date;
use crate::error::{Result, SyncError};
use crate::events::{EventPayload, EventType, GameType, SeasonType};

use super::transaction::{TransactionContext, TransactionMode};
use super::DatabaseConnection;

/// A row of the events table with its payload parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub timestamp_ms: i64,
    pub game_id: String,
    pub dynasty_id: String,
    pub data: EventPayload,
}

/// Store for the polymorphic events table.
#[derive(Clone)]
pub struct EventStore {
    db: DatabaseConnection,
}

const SELECT_COLUMNS: &str = "event_id, event_type, timestamp, game_id, dynasty_id, data";

// Matches the canonical season_type value and, for the regular season, the
// legacy 'regular' spelling still present in older rows.
const SEASON_TYPE_MATCH: &str = "(json_extract(data, '$.parameters.season_type') = ?
     OR (? = 'regular_season' AND json_extract(data, '$.parameters.season_type') = 'regular'))";

impl EventStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<(StoredEvent, Option<serde_json::Error>)> {
        let event_type_raw: String = row.get(1)?;
        let event_type = EventType::parse(&event_type_raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let data_raw: String = row.get(5)?;
        let parsed: std::result::Result<EventPayload, _> = serde_json::from_str(&data_raw);
        let (data, parse_err) = match parsed {
            Ok(p) => (p, None),
            Err(e) => (
                EventPayload::scheduled(serde_json::Value::Null),
                Some(e),
            ),
        };
        Ok((
            StoredEvent {
                event_id: row.get(0)?,
                event_type,
                timestamp_ms: row.get(2)?,
                game_id: row.get(3)?,
                dynasty_id: row.get(4)?,
                data,
            },
            parse_err,
        ))
    }

    fn collect_events(
        conn: &Connection,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> Result<Vec<StoredEvent>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params), Self::row_to_event)?;
        let mut events = Vec::new();
        for row in rows {
            let (event, parse_err) = row?;
            if let Some(err) = parse_err {
                return Err(SyncError::State(format!(
                    "event '{}' has a corrupt payload: {err}",
                    event.event_id
                )));
            }
            events.push(event);
        }
        Ok(events)
    }

    fn validate(event: &StoredEvent) -> Result<()> {
        if event.dynasty_id.is_empty() {
            return Err(SyncError::State(format!(
                "event '{}' is missing a dynasty_id",
                event.event_id
            )));
        }
        if event.event_id.is_empty() {
            return Err(SyncError::State("event is missing an event_id".into()));
        }
        Ok(())
    }

    /// Insert one event using an externally-owned connection.
    pub fn insert_on(&self, conn: &Connection, event: &StoredEvent) -> Result<()> {
        Self::validate(event)?;
        conn.execute(
            "INSERT INTO events (event_id, event_type, timestamp, game_id, dynasty_id, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.event_id,
                event.event_type.as_str(),
                event.timestamp_ms,
                event.game_id,
                event.dynasty_id,
                serde_json::to_string(&event.data)?,
            ],
        )?;
        Ok(())
    }

    pub fn insert(&self, event: &StoredEvent) -> Result<()> {
        let conn = self.db.lock();
        self.insert_on(&conn, event)
    }

    /// Insert a batch atomically: all rows are written or none are.
    pub fn insert_batch(&self, events: &[StoredEvent]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let conn = self.db.lock();
        TransactionContext::run(&conn, TransactionMode::Immediate, |c| {
            for event in events {
                self.insert_on(c, event)?;
            }
            Ok(events.len())
        })
    }

    pub fn get_by_id(&self, event_id: &str) -> Result<Option<StoredEvent>> {
        let conn = self.db.lock();
        let row = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM events WHERE event_id = ?1"),
                params![event_id],
                Self::row_to_event,
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((event, Some(err))) => Err(SyncError::State(format!(
                "event '{}' has a corrupt payload: {err}",
                event.event_id
            ))),
            Some((event, None)) => Ok(Some(event)),
        }
    }

    /// All events for a game id, chronologically ascending.
    pub fn get_by_game_id(&self, game_id: &str) -> Result<Vec<StoredEvent>> {
        let conn = self.db.lock();
        Self::collect_events(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM events WHERE game_id = ?1 ORDER BY timestamp ASC"
            ),
            vec![SqlValue::from(game_id.to_string())],
        )
    }

    pub fn get_by_game_id_and_dynasty(
        &self,
        game_id: &str,
        dynasty_id: &str,
    ) -> Result<Vec<StoredEvent>> {
        let conn = self.db.lock();
        Self::collect_events(
            &conn,
            &format!(
                "SELECT {SELECT_COLUMNS} FROM events
                 WHERE game_id = ?1 AND dynasty_id = ?2 ORDER BY timestamp ASC"
            ),
            vec![
                SqlValue::from(game_id.to_string()),
                SqlValue::from(dynasty_id.to_string()),
            ],
        )
    }

    /// Events for a dynasty, newest first, optionally filtered by type and
    /// capped by `limit`.
    pub fn get_by_dynasty(
        &self,
        dynasty_id: &str,
        event_type: Option<EventType>,
        limit: Option<usize>,
    ) -> Result<Vec<StoredEvent>> {
        let mut sql = format!("SELECT {SELECT_COLUMNS} FROM events WHERE dynasty_id = ?");
        let mut params: Vec<SqlValue> = vec![SqlValue::from(dynasty_id.to_string())];
        if let Some(et) = event_type {
            sql.push_str(" AND event_type = ?");
            params.push(SqlValue::from(et.as_str().to_string()));
        }
        sql.push_str(" ORDER BY timestamp DESC");
        if let Some(n) = limit {
            sql.push_str(" LIMIT ?");
            params.push(SqlValue::from(n as i64));
        }
        let conn = self.db.lock();
        Self::collect_events(&conn, &sql, params)
    }

    /// Events for a dynasty inside `[start_ms, end_ms]`, ascending. This is
    /// the per-day query used by the simulation executor.
    pub fn get_by_dynasty_and_timestamp(
        &self,
        dynasty_id: &str,
        start_ms: i64,
        end_ms: i64,
        event_type: Option<EventType>,
    ) -> Result<Vec<StoredEvent>> {
        let mut sql = format!(
            "SELECT {SELECT_COLUMNS} FROM events
             WHERE dynasty_id = ? AND timestamp >= ? AND timestamp <= ?"
        );
        let mut params: Vec<SqlValue> = vec![
            SqlValue::from(dynasty_id.to_string()),
            SqlValue::from(start_ms),
            SqlValue::from(end_ms),
        ];
        if let Some(et) = event_type {
            sql.push_str(" AND event_type = ?");
            params.push(SqlValue::from(et.as_str().to_string()));
        }
        sql.push_str(" ORDER BY timestamp ASC");
        let conn = self.db.lock();
        Self::collect_events(&conn, &sql, params)
    }

    /// Overwrite an event's payload (used to append results after
    /// simulation). Returns whether a row was affected.
    pub fn update_on(&self, conn: &Connection, event: &StoredEvent) -> Result<bool> {
        Self::validate(event)?;
        let affected = conn.execute(
            "UPDATE events SET event_type = ?2, timestamp = ?3, game_id = ?4,
                               dynasty_id = ?5, data = ?6
             WHERE event_id = ?1",
            params![
                event.event_id,
                event.event_type.as_str(),
                event.timestamp_ms,
                event.game_id,
                event.dynasty_id,
                serde_json::to_string(&event.data)?,
            ],
        )?;
        Ok(affected > 0)
    }

    pub fn update(&self, event: &StoredEvent) -> Result<bool> {
        let conn = self.db.lock();
        self.update_on(&conn, event)
    }

    /// Delete a single event row. Returns whether a row was removed.
    pub fn delete_by_id(&self, event_id: &str) -> Result<bool> {
        let conn = self.db.lock();
        let affected = conn.execute("DELETE FROM events WHERE event_id = ?1", params![event_id])?;
        Ok(affected > 0)
    }

    /// Remove every playoff game event for `(dynasty, season)`. Used by the
    /// playoff-reset path.
    pub fn delete_playoff_events(&self, dynasty_id: &str, season: i32) -> Result<usize> {
        let conn = self.db.lock();
        let affected = conn.execute(
            "DELETE FROM events
             WHERE dynasty_id = ?1 AND event_type = 'GAME'
               AND game_id LIKE 'playoff_%'
               AND json_extract(data, '$.parameters.season') = ?2",
            params![dynasty_id, season],
        )?;
        Ok(affected)
    }

    /// Number of completed games for `(dynasty, season, season_type)`.
    pub fn count_completed_games(
        &self,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
    ) -> Result<u32> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM events
                 WHERE dynasty_id = ?1 AND event_type = 'GAME'
                   AND json_extract(data, '$.parameters.season') = ?2
                   AND {SEASON_TYPE_MATCH}
                   AND json_extract(data, '$.results') IS NOT NULL"
            ),
            params![dynasty_id, season, season_type.as_str(), season_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Number of scheduled game events (completed or not) for
    /// `(dynasty, season, season_type)`. Drives schedule idempotence.
    pub fn count_scheduled_games(
        &self,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
    ) -> Result<u32> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM events
                 WHERE dynasty_id = ?1 AND event_type = 'GAME'
                   AND json_extract(data, '$.parameters.season') = ?2
                   AND {SEASON_TYPE_MATCH}"
            ),
            params![dynasty_id, season, season_type.as_str(), season_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Number of completed games of a specific game type (e.g. conference
    /// championships) for `(dynasty, season)`.
    pub fn count_completed_by_game_type(
        &self,
        dynasty_id: &str,
        season: i32,
        game_type: GameType,
    ) -> Result<u32> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events
             WHERE dynasty_id = ?1 AND event_type = 'GAME'
               AND json_extract(data, '$.parameters.season') = ?2
               AND json_extract(data, '$.parameters.game_type') = ?3
               AND json_extract(data, '$.results') IS NOT NULL",
            params![dynasty_id, season, game_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }

    /// Earliest and latest scheduled game dates for a season segment, or
    /// `None` when nothing is scheduled.
    pub fn game_date_bounds(
        &self,
        dynasty_id: &str,
        season_type: SeasonType,
        season: Option<i32>,
    ) -> Result<Option<(Date, Date)>> {
        let mut sql = format!(
            "SELECT MIN(timestamp), MAX(timestamp) FROM events
             WHERE dynasty_id = ? AND event_type = 'GAME' AND {SEASON_TYPE_MATCH}"
        );
        let mut params: Vec<SqlValue> = vec![
            SqlValue::from(dynasty_id.to_string()),
            SqlValue::from(season_type.as_str().to_string()),
            SqlValue::from(season_type.as_str().to_string()),
        ];
        if let Some(year) = season {
            sql.push_str(" AND json_extract(data, '$.parameters.season') = ?");
            params.push(SqlValue::from(i64::from(year)));
        }
        let conn = self.db.lock();
        let bounds: (Option<i64>, Option<i64>) =
            conn.query_row(&sql, params_from_iter(params), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
        match bounds {
            (Some(min), Some(max)) => Ok(Some((Date::from_millis(min)?, Date::from_millis(max)?))),
            _ => Ok(None),
        }
    }

    /// Highest week number among completed games of a season segment.
    pub fn max_completed_week(
        &self,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
    ) -> Result<Option<u32>> {
        let conn = self.db.lock();
        let week: Option<i64> = conn.query_row(
            &format!(
                "SELECT MAX(json_extract(data, '$.parameters.week')) FROM events
                 WHERE dynasty_id = ?1 AND event_type = 'GAME'
                   AND json_extract(data, '$.parameters.season') = ?2
                   AND {SEASON_TYPE_MATCH}
                   AND json_extract(data, '$.results') IS NOT NULL"
            ),
            params![dynasty_id, season, season_type.as_str(), season_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(week.map(|w| w as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::date::Date;
    use crate::events::{GameEvent, GameParameters, GameResultData};

    fn setup() -> (DatabaseConnection, EventStore) {
        let db = DatabaseConnection::open_in_memory().unwrap();
        {
            let conn = db.lock();
            conn.execute(
                "INSERT INTO dynasties (dynasty_id, dynasty_name) VALUES ('d1', 'Test')",
                [],
            )
            .unwrap();
        }
        let store = EventStore::new(db.clone());
        (db, store)
    }

    fn game(game_id: &str, date: Date, week: u32, season_type: SeasonType, game_type: GameType) -> StoredEvent {
        GameEvent::scheduled(
            game_id,
            "d1",
            date,
            GameParameters {
                season: 2024,
                season_type,
                week,
                home_team_id: 1,
                away_team_id: 2,
                game_type,
            },
        )
        .to_stored()
        .unwrap()
    }

    #[test]
    fn insert_and_query_round_trip() {
        let (_db, store) = setup();
        let date = Date::new(2024, 9, 8).unwrap();
        let event = game("2024_w1_1_2", date, 1, SeasonType::RegularSeason, GameType::Regular);
        store.insert(&event).unwrap();

        let loaded = store.get_by_id(&event.event_id).unwrap().unwrap();
        assert_eq!(loaded, event);

        let by_game = store.get_by_game_id("2024_w1_1_2").unwrap();
        assert_eq!(by_game.len(), 1);
        assert_eq!(by_game[0].data, event.data);
    }

    #[test]
    fn insert_requires_dynasty_id() {
        let (_db, store) = setup();
        let mut event = game(
            "g1",
            Date::new(2024, 9, 8).unwrap(),
            1,
            SeasonType::RegularSeason,
            GameType::Regular,
        );
        event.dynasty_id = String::new();
        assert!(store.insert(&event).is_err());
    }

    #[test]
    fn duplicate_game_id_within_dynasty_is_rejected() {
        let (_db, store) = setup();
        let date = Date::new(2024, 9, 8).unwrap();
        let a = game("dup", date, 1, SeasonType::RegularSeason, GameType::Regular);
        let b = game("dup", date, 1, SeasonType::RegularSeason, GameType::Regular);
        store.insert(&a).unwrap();
        assert!(store.insert(&b).is_err());
    }

    #[test]
    fn batch_insert_is_atomic() {
        let (_db, store) = setup();
        let date = Date::new(2024, 9, 8).unwrap();
        let good = game("a", date, 1, SeasonType::RegularSeason, GameType::Regular);
        let dup = game("a", date, 1, SeasonType::RegularSeason, GameType::Regular);

        let result = store.insert_batch(&[good, dup]);
        assert!(result.is_err());
        assert!(store.get_by_game_id("a").unwrap().is_empty());
    }

    #[test]
    fn timestamp_range_query_is_ascending() {
        let (_db, store) = setup();
        let d1 = Date::new(2024, 9, 8).unwrap();
        let d2 = Date::new(2024, 9, 9).unwrap();
        store
            .insert_batch(&[
                game("late", d2, 2, SeasonType::RegularSeason, GameType::Regular),
                game("early", d1, 1, SeasonType::RegularSeason, GameType::Regular),
            ])
            .unwrap();

        let day1 = store
            .get_by_dynasty_and_timestamp("d1", d1.start_of_day_ms(), d1.end_of_day_ms(), None)
            .unwrap();
        assert_eq!(day1.len(), 1);
        assert_eq!(day1[0].game_id, "early");

        let both = store
            .get_by_dynasty_and_timestamp("d1", d1.start_of_day_ms(), d2.end_of_day_ms(), None)
            .unwrap();
        assert_eq!(both.len(), 2);
        assert_eq!(both[0].game_id, "early");
        assert_eq!(both[1].game_id, "late");
    }

    #[test]
    fn dynasty_query_is_descending_with_limit() {
        let (_db, store) = setup();
        let d1 = Date::new(2024, 9, 8).unwrap();
        store
            .insert_batch(&[
                game("w1", d1, 1, SeasonType::RegularSeason, GameType::Regular),
                game("w2", d1.add_days(7), 2, SeasonType::RegularSeason, GameType::Regular),
                game("w3", d1.add_days(14), 3, SeasonType::RegularSeason, GameType::Regular),
            ])
            .unwrap();

        let latest = store
            .get_by_dynasty("d1", Some(EventType::Game), Some(2))
            .unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].game_id, "w3");
        assert_eq!(latest[1].game_id, "w2");
    }

    #[test]
    fn update_appends_results() {
        let (_db, store) = setup();
        let date = Date::new(2024, 9, 8).unwrap();
        let mut event = game("g1", date, 1, SeasonType::RegularSeason, GameType::Regular);
        store.insert(&event).unwrap();

        event.data.results =
            Some(serde_json::to_value(GameResultData::new(1, 2, 27, 24, false)).unwrap());
        assert!(store.update(&event).unwrap());

        let loaded = store.get_by_id(&event.event_id).unwrap().unwrap();
        assert!(loaded.data.is_completed());
        assert_eq!(store.count_completed_games("d1", 2024, SeasonType::RegularSeason).unwrap(), 1);

        // Updating a missing event affects nothing
        let mut ghost = event.clone();
        ghost.event_id = "missing".into();
        assert!(!store.update(&ghost).unwrap());
    }

    #[test]
    fn completed_count_accepts_legacy_season_type() {
        let (_db, store) = setup();
        let date = Date::new(2024, 9, 8).unwrap();
        let mut event = game("legacy", date, 1, SeasonType::RegularSeason, GameType::Regular);
        // Simulate an old row written with the legacy spelling
        event.data.parameters["season_type"] = serde_json::Value::String("regular".into());
        event.data.results =
            Some(serde_json::to_value(GameResultData::new(1, 2, 20, 10, false)).unwrap());
        store.insert(&event).unwrap();

        assert_eq!(
            store
                .count_completed_games("d1", 2024, SeasonType::RegularSeason)
                .unwrap(),
            1
        );
    }

    #[test]
    fn playoff_event_cleanup() {
        let (_db, store) = setup();
        let date = Date::new(2025, 1, 12).unwrap();
        store
            .insert_batch(&[
                game("playoff_wc_1", date, 1, SeasonType::Playoffs, GameType::Wildcard),
                game("playoff_wc_2", date, 1, SeasonType::Playoffs, GameType::Wildcard),
                game("2024_w18", date, 18, SeasonType::RegularSeason, GameType::Regular),
            ])
            .unwrap();

        let deleted = store.delete_playoff_events("d1", 2024).unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.get_by_dynasty("d1", Some(EventType::Game), None).unwrap().len(), 1);
    }

    #[test]
    fn date_bounds_and_weeks() {
        let (_db, store) = setup();
        let first = Date::new(2024, 9, 5).unwrap();
        let last = Date::new(2024, 12, 28).unwrap();
        let mut w1 = game("b1", first, 1, SeasonType::RegularSeason, GameType::Regular);
        w1.data.results =
            Some(serde_json::to_value(GameResultData::new(1, 2, 13, 10, false)).unwrap());
        store
            .insert_batch(&[
                w1,
                game("b2", last, 17, SeasonType::RegularSeason, GameType::Regular),
            ])
            .unwrap();

        let (min, max) = store
            .game_date_bounds("d1", SeasonType::RegularSeason, Some(2024))
            .unwrap()
            .unwrap();
        assert_eq!(min, first);
        assert_eq!(max, last);

        assert!(store
            .game_date_bounds("d1", SeasonType::Preseason, Some(2024))
            .unwrap()
            .is_none());

        assert_eq!(
            store.max_completed_week("d1", 2024, SeasonType::RegularSeason).unwrap(),
            Some(1)
        );
    }
}
