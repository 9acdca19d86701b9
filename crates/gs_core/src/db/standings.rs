//! Standings and per-game stat persistence.
//!
//! One standings row per `(dynasty, season, season_type, team)`, updated
//! incrementally as the simulation executor completes games. The executor
//! also writes a row to the game log and the per-player stat lines here,
//! always on a caller-owned connection so a whole day commits atomically.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::events::{GameParameters, GameResultData, SeasonType};

use super::DatabaseConnection;

/// Number of league teams; team ids are 1-32.
pub const TEAM_COUNT: u32 = 32;

/// Conference for a team id: 1-16 are AFC, 17-32 are NFC.
pub fn conference_of(team_id: u32) -> u32 {
    if team_id <= 16 {
        0
    } else {
        1
    }
}

/// Division index (0-7) for a team id: four teams per division.
pub fn division_of(team_id: u32) -> u32 {
    (team_id - 1) / 4
}

/// A single standings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TeamStanding {
    pub team_id: u32,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub division_wins: u32,
    pub division_losses: u32,
    pub conference_wins: u32,
    pub conference_losses: u32,
    pub home_wins: u32,
    pub home_losses: u32,
    pub away_wins: u32,
    pub away_losses: u32,
    pub points_for: u32,
    pub points_against: u32,
}

impl TeamStanding {
    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }
}

/// One player's line for one game.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGameStats {
    pub player_id: u32,
    pub team_id: u32,
    pub position: String,
    pub pass_attempts: u32,
    pub pass_completions: u32,
    pub pass_yards: u32,
    pub pass_tds: u32,
    pub interceptions_thrown: u32,
    pub rush_attempts: u32,
    pub rush_yards: u32,
    pub rush_tds: u32,
    pub receptions: u32,
    pub receiving_yards: u32,
    pub receiving_tds: u32,
    pub tackles: u32,
    pub sacks: u32,
    pub interceptions: u32,
    pub fumbles: u32,
    pub field_goals_made: u32,
    pub field_goals_attempted: u32,
}

/// Store for standings, the game log, and player game stats.
#[derive(Clone)]
pub struct StandingsStore {
    db: DatabaseConnection,
}

impl StandingsStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn row_to_standing(row: &Row<'_>) -> rusqlite::Result<TeamStanding> {
        Ok(TeamStanding {
            team_id: row.get::<_, i64>(0)? as u32,
            wins: row.get::<_, i64>(1)? as u32,
            losses: row.get::<_, i64>(2)? as u32,
            ties: row.get::<_, i64>(3)? as u32,
            division_wins: row.get::<_, i64>(4)? as u32,
            division_losses: row.get::<_, i64>(5)? as u32,
            conference_wins: row.get::<_, i64>(6)? as u32,
            conference_losses: row.get::<_, i64>(7)? as u32,
            home_wins: row.get::<_, i64>(8)? as u32,
            home_losses: row.get::<_, i64>(9)? as u32,
            away_wins: row.get::<_, i64>(10)? as u32,
            away_losses: row.get::<_, i64>(11)? as u32,
            points_for: row.get::<_, i64>(12)? as u32,
            points_against: row.get::<_, i64>(13)? as u32,
        })
    }

    /// Create (or zero out) standings rows for all 32 teams.
    pub fn reset_for_season(
        &self,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
    ) -> Result<usize> {
        let conn = self.db.lock();
        for team_id in 1..=TEAM_COUNT {
            conn.execute(
                "INSERT INTO standings (dynasty_id, team_id, season, season_type)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (dynasty_id, team_id, season, season_type) DO UPDATE SET
                     wins = 0, losses = 0, ties = 0,
                     division_wins = 0, division_losses = 0,
                     conference_wins = 0, conference_losses = 0,
                     home_wins = 0, home_losses = 0, away_wins = 0, away_losses = 0,
                     points_for = 0, points_against = 0",
                params![dynasty_id, team_id, season, season_type.as_str()],
            )?;
        }
        Ok(TEAM_COUNT as usize)
    }

    /// All standings rows for `(dynasty, season, season_type)`, ordered by
    /// team id. Reads accept rows written under the legacy `regular`
    /// season-type spelling.
    pub fn get(
        &self,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
    ) -> Result<Vec<TeamStanding>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare(
            "SELECT team_id, wins, losses, ties,
                    division_wins, division_losses, conference_wins, conference_losses,
                    home_wins, home_losses, away_wins, away_losses,
                    points_for, points_against
             FROM standings
             WHERE dynasty_id = ?1 AND season = ?2
               AND (season_type = ?3 OR (?3 = 'regular_season' AND season_type = 'regular'))
             ORDER BY team_id ASC",
        )?;
        let rows = stmt.query_map(
            params![dynasty_id, season, season_type.as_str()],
            Self::row_to_standing,
        )?;
        let mut standings = Vec::new();
        for row in rows {
            standings.push(row?);
        }
        Ok(standings)
    }

    // Applies one team's deltas. The row is created on demand so a game can
    // land before the season's reset ran (first season of a new dynasty).
    #[allow(clippy::too_many_arguments)]
    fn apply_team_delta(
        conn: &Connection,
        dynasty_id: &str,
        season: i32,
        season_type: SeasonType,
        team_id: u32,
        outcome: i8, // 1 win, -1 loss, 0 tie
        is_home: bool,
        divisional: bool,
        conference_game: bool,
        points_for: u32,
        points_against: u32,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO standings (dynasty_id, team_id, season, season_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![dynasty_id, team_id, season, season_type.as_str()],
        )?;

        let (w, l, t) = match outcome {
            1 => (1, 0, 0),
            -1 => (0, 1, 0),
            _ => (0, 0, 1),
        };
        let (dw, dl) = if divisional { (w, l) } else { (0, 0) };
        let (cw, cl) = if conference_game { (w, l) } else { (0, 0) };
        let (hw, hl) = if is_home { (w, l) } else { (0, 0) };
        let (aw, al) = if is_home { (0, 0) } else { (w, l) };

        let affected = conn.execute(
            "UPDATE standings SET
                 wins = wins + ?5, losses = losses + ?6, ties = ties + ?7,
                 division_wins = division_wins + ?8, division_losses = division_losses + ?9,
                 conference_wins = conference_wins + ?10, conference_losses = conference_losses + ?11,
                 home_wins = home_wins + ?12, home_losses = home_losses + ?13,
                 away_wins = away_wins + ?14, away_losses = away_losses + ?15,
                 points_for = points_for + ?16, points_against = points_against + ?17
             WHERE dynasty_id = ?1 AND team_id = ?2 AND season = ?3 AND season_type = ?4",
            params![
                dynasty_id,
                team_id,
                season,
                season_type.as_str(),
                w,
                l,
                t,
                dw,
                dl,
                cw,
                cl,
                hw,
                hl,
                aw,
                al,
                points_for,
                points_against,
            ],
        )?;
        if affected == 0 {
            return Err(SyncError::Persistence {
                operation: "standings_update",
                reason: format!(
                    "no standings row for dynasty '{dynasty_id}' team {team_id} season {season}"
                ),
            });
        }
        Ok(())
    }

    /// Update both teams' standings for a completed game, atomically with
    /// the rest of the day when run on the day's transaction connection.
    pub fn apply_game_result_on(
        &self,
        conn: &Connection,
        dynasty_id: &str,
        params_: &GameParameters,
        result: &GameResultData,
    ) -> Result<()> {
        let home = params_.home_team_id;
        let away = params_.away_team_id;
        let divisional = division_of(home) == division_of(away);
        let conference_game = conference_of(home) == conference_of(away);

        let (home_outcome, away_outcome): (i8, i8) = match result.winner_team_id {
            Some(w) if w == home => (1, -1),
            Some(_) => (-1, 1),
            None => (0, 0),
        };

        Self::apply_team_delta(
            conn,
            dynasty_id,
            params_.season,
            params_.season_type,
            home,
            home_outcome,
            true,
            divisional,
            conference_game,
            result.home_score,
            result.away_score,
        )?;
        Self::apply_team_delta(
            conn,
            dynasty_id,
            params_.season,
            params_.season_type,
            away,
            away_outcome,
            false,
            divisional,
            conference_game,
            result.away_score,
            result.home_score,
        )?;
        Ok(())
    }

    /// Append one completed game to the game log.
    pub fn log_game_on(
        &self,
        conn: &Connection,
        dynasty_id: &str,
        game_id: &str,
        game_date_ms: i64,
        params_: &GameParameters,
        result: &GameResultData,
    ) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO games
             (game_id, dynasty_id, season, week, season_type, game_type,
              home_team_id, away_team_id, home_score, away_score, overtime, game_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                game_id,
                dynasty_id,
                params_.season,
                params_.week,
                params_.season_type.as_str(),
                params_.game_type.as_str(),
                params_.home_team_id,
                params_.away_team_id,
                result.home_score,
                result.away_score,
                result.overtime,
                game_date_ms,
            ],
        )?;
        Ok(())
    }

    /// Insert per-player stat lines for one game.
    pub fn record_player_stats_on(
        &self,
        conn: &Connection,
        dynasty_id: &str,
        game_id: &str,
        stats: &[PlayerGameStats],
    ) -> Result<usize> {
        for line in stats {
            conn.execute(
                "INSERT INTO player_game_stats
                 (dynasty_id, game_id, player_id, team_id, position,
                  pass_attempts, pass_completions, pass_yards, pass_tds, interceptions_thrown,
                  rush_attempts, rush_yards, rush_tds,
                  receptions, receiving_yards, receiving_tds,
                  tackles, sacks, interceptions, fumbles,
                  field_goals_made, field_goals_attempted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21, ?22)",
                params![
                    dynasty_id,
                    game_id,
                    line.player_id,
                    line.team_id,
                    line.position,
                    line.pass_attempts,
                    line.pass_completions,
                    line.pass_yards,
                    line.pass_tds,
                    line.interceptions_thrown,
                    line.rush_attempts,
                    line.rush_yards,
                    line.rush_tds,
                    line.receptions,
                    line.receiving_yards,
                    line.receiving_tds,
                    line.tackles,
                    line.sacks,
                    line.interceptions,
                    line.fumbles,
                    line.field_goals_made,
                    line.field_goals_attempted,
                ],
            )?;
        }
        Ok(stats.len())
    }
}
