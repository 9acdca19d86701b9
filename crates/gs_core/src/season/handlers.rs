//! Per-phase daily work.
//!
//! Strategy pattern: the controller selects one handler per phase and asks
//! it to simulate a single date. Handlers never advance the calendar; the
//! controller owns that.

use std::cell::RefCell;
use std::rc::Rc;

use crate::calendar::date::Date;
use crate::config::SimulationSettings;
use crate::db::event_store::{EventStore, StoredEvent};
use crate::error::{Result, SyncError};
use crate::events::EventType;
use crate::services::{GameResult, SeasonServices};

use super::executor::SimulationExecutor;
use super::PlayoffSlot;

/// What one phase handler produced for one date.
#[derive(Debug, Default)]
pub struct DayOutcome {
    pub games_played: u32,
    pub results: Vec<GameResult>,
    pub events_triggered: Vec<StoredEvent>,
    pub max_completed_week: Option<u32>,
    pub last_game_id: Option<String>,
}

/// A single simulated day while in one phase.
pub trait PhaseDayHandler {
    fn simulate_day(&mut self, date: Date) -> Result<DayOutcome>;
}

/// Preseason and regular season: run the games due today through the
/// simulation executor.
pub struct GameDayHandler {
    executor: Rc<RefCell<SimulationExecutor>>,
    services: Rc<SeasonServices>,
}

impl GameDayHandler {
    pub fn new(executor: Rc<RefCell<SimulationExecutor>>, services: Rc<SeasonServices>) -> Self {
        Self { executor, services }
    }
}

impl PhaseDayHandler for GameDayHandler {
    fn simulate_day(&mut self, date: Date) -> Result<DayOutcome> {
        let outcome = self
            .executor
            .borrow_mut()
            .simulate_games_for(date, self.services.simulator.as_ref())?;
        Ok(DayOutcome {
            games_played: outcome.games_played,
            results: outcome.results,
            events_triggered: Vec::new(),
            max_completed_week: outcome.max_completed_week,
            last_game_id: outcome.last_game_id,
        })
    }
}

/// Playoffs: delegate to the active playoff controller, which owns bracket
/// progression.
pub struct PlayoffDayHandler {
    slot: PlayoffSlot,
}

impl PlayoffDayHandler {
    pub fn new(slot: PlayoffSlot) -> Self {
        Self { slot }
    }
}

impl PhaseDayHandler for PlayoffDayHandler {
    fn simulate_day(&mut self, date: Date) -> Result<DayOutcome> {
        let mut slot = self.slot.borrow_mut();
        let controller = slot.as_mut().ok_or_else(|| {
            SyncError::State("no active playoff controller for the playoffs phase".into())
        })?;
        let outcome = controller.simulate_day(date).map_err(SyncError::from)?;
        let last_game_id = outcome.results.last().map(|r| r.game_id.clone());
        let max_completed_week = outcome.results.iter().map(|r| r.week).max();
        Ok(DayOutcome {
            games_played: outcome.games_played,
            results: outcome.results,
            events_triggered: Vec::new(),
            max_completed_week,
            last_game_id,
        })
    }
}

/// Offseason: no games; fire the milestone events due today.
pub struct OffseasonDayHandler {
    events: EventStore,
    services: Rc<SeasonServices>,
    dynasty_id: String,
    settings: SimulationSettings,
}

impl OffseasonDayHandler {
    pub fn new(
        events: EventStore,
        services: Rc<SeasonServices>,
        dynasty_id: impl Into<String>,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            events,
            services,
            dynasty_id: dynasty_id.into(),
            settings,
        }
    }
}

impl PhaseDayHandler for OffseasonDayHandler {
    fn simulate_day(&mut self, date: Date) -> Result<DayOutcome> {
        let due = self.events.get_by_dynasty_and_timestamp(
            &self.dynasty_id,
            date.start_of_day_ms(),
            date.end_of_day_ms(),
            Some(EventType::Milestone),
        )?;

        let mut triggered = Vec::new();
        for mut event in due.into_iter().filter(|e| !e.data.is_completed()) {
            let results = if self.settings.skip_offseason_events {
                log::debug!(
                    "skipping offseason milestone '{}' on {date} (processing disabled)",
                    event.game_id
                );
                serde_json::json!({ "skipped": true })
            } else {
                self.services
                    .milestones
                    .execute_milestone(&event)
                    .map_err(SyncError::from)?
            };

            event.data.results = Some(results);
            if !self.events.update(&event)? {
                return Err(SyncError::Persistence {
                    operation: "milestone_result_update",
                    reason: format!("milestone event '{}' vanished mid-execution", event.event_id),
                });
            }
            log::info!("offseason milestone '{}' fired on {date}", event.game_id);
            triggered.push(event);
        }

        Ok(DayOutcome {
            events_triggered: triggered,
            ..Default::default()
        })
    }
}
