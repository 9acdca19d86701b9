//! Per-day simulation fan-out.
//!
//! Loads the games due on a date, runs each through the simulator (or the
//! deterministic fast path), and writes results, the game log, player
//! stats, and standings inside one IMMEDIATE transaction. A failure rolls
//! the whole day back.

use crate::calendar::date::Date;
use crate::config::SimulationSettings;
use crate::db::event_store::{EventStore, StoredEvent};
use crate::db::standings::StandingsStore;
use crate::db::transaction::{TransactionContext, TransactionMode};
use crate::db::DatabaseConnection;
use crate::error::{Result, SyncError};
use crate::events::{EventType, GameResultData, SeasonType};
use crate::season::completion::{
    PLAYOFF_GAME_COUNT, PRESEASON_GAME_COUNT, REGULAR_SEASON_GAME_COUNT,
};
use crate::services::{FastGameSimulator, GameResult, GameSimulator};

/// What one day of simulation produced.
#[derive(Debug, Default)]
pub struct ExecutorDayOutcome {
    pub games_played: u32,
    pub results: Vec<GameResult>,
    pub max_completed_week: Option<u32>,
    pub last_game_id: Option<String>,
}

/// Runs the games due on a date and persists everything they produce.
pub struct SimulationExecutor {
    db: DatabaseConnection,
    events: EventStore,
    standings: StandingsStore,
    dynasty_id: String,
    season_year: i32,
    settings: SimulationSettings,
    fast: FastGameSimulator,
}

impl SimulationExecutor {
    pub fn new(
        db: DatabaseConnection,
        events: EventStore,
        standings: StandingsStore,
        dynasty_id: impl Into<String>,
        season_year: i32,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            db,
            events,
            standings,
            dynasty_id: dynasty_id.into(),
            season_year,
            settings,
            fast: FastGameSimulator,
        }
    }

    pub fn season_year(&self) -> i32 {
        self.season_year
    }

    /// Cached-year setter, registered with the season year synchronizer.
    pub fn set_season_year(&mut self, year: i32) {
        if self.season_year != year {
            log::debug!("simulation executor season year {} -> {year}", self.season_year);
            self.season_year = year;
        }
    }

    fn season_type_limit(season_type: SeasonType) -> u32 {
        match season_type {
            SeasonType::Preseason => PRESEASON_GAME_COUNT,
            SeasonType::RegularSeason => REGULAR_SEASON_GAME_COUNT,
            SeasonType::Playoffs => PLAYOFF_GAME_COUNT,
        }
    }

    /// Simulate every pending game scheduled on `date` and commit the
    /// results atomically. Already-completed games are left untouched.
    pub fn simulate_games_for(
        &mut self,
        date: Date,
        simulator: &dyn GameSimulator,
    ) -> Result<ExecutorDayOutcome> {
        let due = self.events.get_by_dynasty_and_timestamp(
            &self.dynasty_id,
            date.start_of_day_ms(),
            date.end_of_day_ms(),
            Some(EventType::Game),
        )?;
        let pending: Vec<StoredEvent> =
            due.into_iter().filter(|e| !e.data.is_completed()).collect();
        if pending.is_empty() {
            return Ok(ExecutorDayOutcome::default());
        }

        let conn = self.db.lock();
        let outcome = TransactionContext::run(&conn, TransactionMode::Immediate, |c| {
            let mut outcome = ExecutorDayOutcome::default();
            let mut touched_types: Vec<SeasonType> = Vec::new();
            for mut event in pending {
                let params = event.data.game_parameters()?;

                let simulated = if self.settings.skip_game_simulation {
                    self.fast
                        .simulate_one_game(params.home_team_id, params.away_team_id)
                        .map_err(SyncError::from)?
                } else {
                    simulator
                        .simulate_one_game(params.home_team_id, params.away_team_id)
                        .map_err(SyncError::from)?
                };

                let result = GameResultData::new(
                    params.home_team_id,
                    params.away_team_id,
                    simulated.home_score,
                    simulated.away_score,
                    simulated.overtime,
                );
                event.data.results = Some(serde_json::to_value(result)?);

                if !self.events.update_on(c, &event)? {
                    return Err(SyncError::Persistence {
                        operation: "event_result_update",
                        reason: format!("event '{}' vanished mid-simulation", event.event_id),
                    });
                }
                self.standings.log_game_on(
                    c,
                    &self.dynasty_id,
                    &event.game_id,
                    event.timestamp_ms,
                    &params,
                    &result,
                )?;
                self.standings.record_player_stats_on(
                    c,
                    &self.dynasty_id,
                    &event.game_id,
                    &simulated.player_stats,
                )?;
                self.standings
                    .apply_game_result_on(c, &self.dynasty_id, &params, &result)?;

                if !touched_types.contains(&params.season_type) {
                    touched_types.push(params.season_type);
                }
                outcome.max_completed_week = Some(
                    outcome
                        .max_completed_week
                        .map_or(params.week, |w| w.max(params.week)),
                );
                outcome.last_game_id = Some(event.game_id.clone());
                outcome.results.push(GameResult {
                    game_id: event.game_id.clone(),
                    home_team_id: params.home_team_id,
                    away_team_id: params.away_team_id,
                    week: params.week,
                    season_type: params.season_type,
                    data: result,
                });
                outcome.games_played += 1;
            }

            // Game-count bounds are a consistency invariant; exceeding one
            // aborts (and rolls back) the day.
            for season_type in &touched_types {
                let completed = Self::count_completed_on(
                    c,
                    &self.dynasty_id,
                    self.season_year,
                    *season_type,
                )?;
                let limit = Self::season_type_limit(*season_type);
                if completed > limit {
                    return Err(SyncError::State(format!(
                        "consistency violation: {completed} completed {season_type} games \
                         exceed the {limit}-game bound for season {}",
                        self.season_year
                    )));
                }
            }
            Ok(outcome)
        })?;

        log::debug!(
            "simulated {} game(s) on {date} for dynasty '{}'",
            outcome.games_played,
            self.dynasty_id
        );
        Ok(outcome)
    }

    // Count inside the open transaction so the bound check sees this day's
    // writes before they commit.
    fn count_completed_on(
        conn: &rusqlite::Connection,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
    ) -> Result<u32> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM events
             WHERE dynasty_id = ?1 AND event_type = 'GAME'
               AND json_extract(data, '$.parameters.season') = ?2
               AND (json_extract(data, '$.parameters.season_type') = ?3
                    OR (?3 = 'regular_season'
                        AND json_extract(data, '$.parameters.season_type') = 'regular'))
               AND json_extract(data, '$.results') IS NOT NULL",
            rusqlite::params![dynasty_id, season, season_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u32)
    }
}
