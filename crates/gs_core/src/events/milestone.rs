//! Offseason milestone events.
//!
//! Non-game dated events that drive the offseason: free-agency window,
//! draft day, roster deadlines. Once fired, the results object records
//! what the milestone handler produced.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calendar::date::Date;
use crate::db::event_store::StoredEvent;
use crate::error::{Result, SyncError};

use super::{EventPayload, EventType};

/// The offseason milestones the engine knows how to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    FranchiseTagDeadline,
    FreeAgencyOpen,
    DraftDay,
    RookieMinicamp,
    TrainingCampOpen,
    RosterCuts,
}

impl MilestoneKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneKind::FranchiseTagDeadline => "franchise_tag_deadline",
            MilestoneKind::FreeAgencyOpen => "free_agency_open",
            MilestoneKind::DraftDay => "draft_day",
            MilestoneKind::RookieMinicamp => "rookie_minicamp",
            MilestoneKind::TrainingCampOpen => "training_camp_open",
            MilestoneKind::RosterCuts => "roster_cuts",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MilestoneKind::FranchiseTagDeadline => "Franchise Tag Deadline",
            MilestoneKind::FreeAgencyOpen => "Free Agency Opens",
            MilestoneKind::DraftDay => "Draft Day",
            MilestoneKind::RookieMinicamp => "Rookie Minicamp",
            MilestoneKind::TrainingCampOpen => "Training Camp Opens",
            MilestoneKind::RosterCuts => "Roster Cuts",
        }
    }
}

impl fmt::Display for MilestoneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a milestone event, stored under `data.parameters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneParameters {
    pub season: i32,
    pub milestone: MilestoneKind,
}

/// A dated offseason milestone, scheduled or fired.
#[derive(Debug, Clone, PartialEq)]
pub struct MilestoneEvent {
    pub dynasty_id: String,
    pub date: Date,
    pub params: MilestoneParameters,
    pub result: Option<Value>,
}

impl MilestoneEvent {
    pub fn scheduled(dynasty_id: impl Into<String>, date: Date, season: i32, milestone: MilestoneKind) -> Self {
        Self {
            dynasty_id: dynasty_id.into(),
            date,
            params: MilestoneParameters { season, milestone },
            result: None,
        }
    }

    /// Storage key in the `game_id` column; unique per (dynasty, milestone,
    /// season).
    pub fn storage_key(&self) -> String {
        format!("milestone_{}_{}", self.params.milestone, self.params.season)
    }

    pub fn to_stored(&self) -> Result<StoredEvent> {
        if self.dynasty_id.is_empty() {
            return Err(SyncError::State("milestone event must have a dynasty_id".into()));
        }
        let mut payload = EventPayload::scheduled(serde_json::to_value(&self.params)?);
        payload.results = self.result.clone();
        Ok(StoredEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_type: EventType::Milestone,
            timestamp_ms: self.date.start_of_day_ms(),
            game_id: self.storage_key(),
            dynasty_id: self.dynasty_id.clone(),
            data: payload,
        })
    }

    pub fn from_stored(stored: &StoredEvent) -> Result<Self> {
        if stored.event_type != EventType::Milestone {
            return Err(SyncError::State(format!(
                "event '{}' is a {} record, not a milestone",
                stored.event_id, stored.event_type
            )));
        }
        Ok(Self {
            dynasty_id: stored.dynasty_id.clone(),
            date: Date::from_millis(stored.timestamp_ms)?,
            params: stored.data.milestone_parameters()?,
            result: stored.data.results.clone().filter(|v| !v.is_null()),
        })
    }
}
