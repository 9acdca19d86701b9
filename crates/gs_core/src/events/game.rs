//! Game events: scheduled and completed games.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::calendar::date::Date;
use crate::db::event_store::StoredEvent;
use crate::error::{Result, SyncError};

use super::{EventPayload, EventType, SeasonType};

/// Kind of game, matching the bracket structure of an NFL season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    Preseason,
    Regular,
    Wildcard,
    Divisional,
    Conference,
    SuperBowl,
}

impl GameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::Preseason => "preseason",
            GameType::Regular => "regular",
            GameType::Wildcard => "wildcard",
            GameType::Divisional => "divisional",
            GameType::Conference => "conference",
            GameType::SuperBowl => "super_bowl",
        }
    }

    /// The season segment this kind of game belongs to.
    pub fn season_type(&self) -> SeasonType {
        match self {
            GameType::Preseason => SeasonType::Preseason,
            GameType::Regular => SeasonType::RegularSeason,
            GameType::Wildcard
            | GameType::Divisional
            | GameType::Conference
            | GameType::SuperBowl => SeasonType::Playoffs,
        }
    }
}

impl fmt::Display for GameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling parameters of a game, stored under `data.parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameParameters {
    pub season: i32,
    pub season_type: SeasonType,
    pub week: u32,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub game_type: GameType,
}

/// Outcome of a simulated game, stored under `data.results`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameResultData {
    pub home_score: u32,
    pub away_score: u32,
    /// `None` for a tie.
    pub winner_team_id: Option<u32>,
    pub overtime: bool,
}

impl GameResultData {
    pub fn new(home_team_id: u32, away_team_id: u32, home_score: u32, away_score: u32, overtime: bool) -> Self {
        let winner_team_id = match home_score.cmp(&away_score) {
            std::cmp::Ordering::Greater => Some(home_team_id),
            std::cmp::Ordering::Less => Some(away_team_id),
            std::cmp::Ordering::Equal => None,
        };
        Self {
            home_score,
            away_score,
            winner_team_id,
            overtime,
        }
    }
}

/// A game on the calendar, scheduled or completed.
///
/// Game-id prefixes are significant: `preseason_...` and `playoff_...` mark
/// their segments; anything else is a regular-season game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameEvent {
    pub game_id: String,
    pub dynasty_id: String,
    pub date: Date,
    pub timestamp_ms: i64,
    pub params: GameParameters,
    pub result: Option<GameResultData>,
}

impl GameEvent {
    /// A scheduled (not yet simulated) game with a kickoff timestamp at the
    /// start of its calendar day.
    pub fn scheduled(game_id: impl Into<String>, dynasty_id: impl Into<String>, date: Date, params: GameParameters) -> Self {
        Self {
            game_id: game_id.into(),
            dynasty_id: dynasty_id.into(),
            timestamp_ms: date.start_of_day_ms(),
            date,
            params,
            result: None,
        }
    }

    /// Validate domain preconditions before the event reaches the store.
    pub fn validate(&self) -> Result<()> {
        if self.game_id.is_empty() {
            return Err(SyncError::State("game event must have a game_id".into()));
        }
        if self.dynasty_id.is_empty() {
            return Err(SyncError::State("game event must have a dynasty_id".into()));
        }
        if self.params.home_team_id == self.params.away_team_id {
            return Err(SyncError::State(format!(
                "game '{}' has identical home and away teams ({})",
                self.game_id, self.params.home_team_id
            )));
        }
        Ok(())
    }

    /// Convert into a storable record. A fresh event id is minted; the
    /// `(dynasty_id, game_id)` pair remains the uniqueness key.
    pub fn to_stored(&self) -> Result<StoredEvent> {
        self.validate()?;
        let mut payload = EventPayload::scheduled(serde_json::to_value(&self.params)?);
        if let Some(result) = &self.result {
            payload.results = Some(serde_json::to_value(result)?);
        }
        Ok(StoredEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: EventType::Game,
            timestamp_ms: self.timestamp_ms,
            game_id: self.game_id.clone(),
            dynasty_id: self.dynasty_id.clone(),
            data: payload,
        })
    }

    /// Rebuild the typed view from a stored record.
    pub fn from_stored(stored: &StoredEvent) -> Result<Self> {
        if stored.event_type != EventType::Game {
            return Err(SyncError::State(format!(
                "event '{}' is a {} record, not a game",
                stored.event_id, stored.event_type
            )));
        }
        Ok(Self {
            game_id: stored.game_id.clone(),
            dynasty_id: stored.dynasty_id.clone(),
            date: Date::from_millis(stored.timestamp_ms)?,
            timestamp_ms: stored.timestamp_ms,
            params: stored.data.game_parameters()?,
            result: stored.data.game_result()?,
        })
    }
}
