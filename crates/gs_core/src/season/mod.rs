//! Season cycle machinery.
//!
//! The controller advances simulated time one day at a time, routing each
//! day through a phase-specific handler and the phase transition manager,
//! and committing the resulting state atomically.

pub mod completion;
pub mod controller;
pub mod executor;
pub mod handlers;
pub mod service;
pub mod transition;
pub mod year_sync;

use std::cell::RefCell;
use std::rc::Rc;

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::db::event_store::StoredEvent;
use crate::services::{GameResult, PlayoffController, TradeRecord};

pub use controller::{ControllerConfig, SeasonCycleController};

/// Shared slot for the active playoff controller. Filled by the
/// regular-season-to-playoffs transition, drained at season rollover.
pub type PlayoffSlot = Rc<RefCell<Option<Box<dyn PlayoffController>>>>;

/// A transition that actually executed during an `advance_day` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedTransition {
    pub from_phase: SeasonPhase,
    pub to_phase: SeasonPhase,
    pub trigger: String,
    /// Set when the transition started a new season.
    pub new_season_year: Option<i32>,
}

/// Structured result of one simulated day.
#[derive(Debug)]
pub struct DayResult {
    pub date: Date,
    pub current_phase: SeasonPhase,
    pub games_played: u32,
    pub results: Vec<GameResult>,
    pub events_triggered: Vec<StoredEvent>,
    pub transactions_executed: Vec<TradeRecord>,
    pub phase_transition: Option<ExecutedTransition>,
    pub current_week: Option<u32>,
    pub success: bool,
    pub message: Option<String>,
}

/// Aggregate result of a multi-day advancement loop.
#[derive(Debug, Default)]
pub struct AdvanceSummary {
    pub days_simulated: u32,
    pub total_games_played: u32,
    pub daily_results: Vec<DayResult>,
    pub ended_by_transition: bool,
    pub checkpoint_aborted: bool,
    pub success: bool,
    pub message: Option<String>,
}

impl AdvanceSummary {
    pub(crate) fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Minimal record of a finished season.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonSummary {
    pub season_year: i32,
    pub dynasty_id: String,
    pub champion_team_id: Option<u32>,
    pub total_games: u32,
    pub final_date: Date,
}

/// Introspection snapshot of where the season stands.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseInfo {
    pub current_phase: SeasonPhase,
    pub season_year: i32,
    pub current_date: Date,
    pub completed_preseason_games: u32,
    pub completed_regular_season_games: u32,
    pub completed_playoff_games: u32,
    pub regular_season_completion_pct: f64,
    pub next_transition_trigger: String,
}
