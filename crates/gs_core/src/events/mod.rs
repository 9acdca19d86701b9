//! Event payloads.
//!
//! Every durable happening, whether a scheduled or completed game or an
//! offseason milestone, is stored as one polymorphic event record whose `data`
//! column is a JSON object of the shape
//! `{ "parameters": {...}, "results": null | {...}, "metadata": {...} }`.
//! A `null` (or absent) `results` object means "scheduled, not yet fired".

pub mod game;
pub mod milestone;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SyncError};

pub use game::{GameEvent, GameParameters, GameResultData, GameType};
pub use milestone::{MilestoneEvent, MilestoneKind, MilestoneParameters};

/// Closed set of event categories stored in the events table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Game,
    Milestone,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Game => "GAME",
            EventType::Milestone => "MILESTONE",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "GAME" => Ok(EventType::Game),
            "MILESTONE" => Ok(EventType::Milestone),
            other => Err(SyncError::State(format!("unknown event type '{other}'"))),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Season segment a game belongs to. The canonical persisted value for the
/// regular season is `"regular_season"`; the legacy `"regular"` spelling is
/// accepted on read and normalized on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonType {
    #[serde(rename = "preseason")]
    Preseason,
    #[serde(rename = "regular_season", alias = "regular")]
    RegularSeason,
    #[serde(rename = "playoffs")]
    Playoffs,
}

impl SeasonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonType::Preseason => "preseason",
            SeasonType::RegularSeason => "regular_season",
            SeasonType::Playoffs => "playoffs",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "preseason" => Ok(SeasonType::Preseason),
            "regular_season" | "regular" => Ok(SeasonType::RegularSeason),
            "playoffs" => Ok(SeasonType::Playoffs),
            other => Err(SyncError::State(format!("unknown season type '{other}'"))),
        }
    }
}

impl fmt::Display for SeasonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The JSON body of an event record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    pub parameters: Value,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl EventPayload {
    pub fn scheduled(parameters: Value) -> Self {
        Self {
            parameters,
            results: None,
            metadata: Map::new(),
        }
    }

    /// Whether this event has fired (a non-null `results` object).
    pub fn is_completed(&self) -> bool {
        matches!(&self.results, Some(v) if !v.is_null())
    }

    /// Typed view of the parameters for a game event.
    pub fn game_parameters(&self) -> Result<GameParameters> {
        Ok(serde_json::from_value(self.parameters.clone())?)
    }

    /// Typed view of the results for a completed game event.
    pub fn game_result(&self) -> Result<Option<GameResultData>> {
        match &self.results {
            Some(v) if !v.is_null() => Ok(Some(serde_json::from_value(v.clone())?)),
            _ => Ok(None),
        }
    }

    /// Typed view of the parameters for a milestone event.
    pub fn milestone_parameters(&self) -> Result<MilestoneParameters> {
        Ok(serde_json::from_value(self.parameters.clone())?)
    }
}
