//! External collaborator interfaces.
//!
//! The season cycle treats the play-by-play simulator, schedule
//! generators, playoff bracket logic, trade AI, salary-cap service, draft
//! service, and offseason milestone scheduler as external collaborators.
//! Each is reached through a narrow trait defined here and injected at
//! controller construction; implementations may fail with arbitrary
//! causes, so they return `anyhow::Result`.

pub mod fast;

use serde::{Deserialize, Serialize};

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::db::event_store::EventStore;
use crate::db::standings::{PlayerGameStats, TeamStanding};
use crate::events::{GameEvent, GameResultData, SeasonType};

pub use fast::FastGameSimulator;

/// Raw output of one simulated game, before it is attached to its event.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedGame {
    pub home_score: u32,
    pub away_score: u32,
    pub overtime: bool,
    pub player_stats: Vec<PlayerGameStats>,
}

/// A completed game with its schedule context, as reported in day results.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResult {
    pub game_id: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub week: u32,
    pub season_type: SeasonType,
    pub data: GameResultData,
}

/// The play-by-play game simulator.
pub trait GameSimulator {
    fn simulate_one_game(&self, home_id: u32, away_id: u32) -> anyhow::Result<SimulatedGame>;
}

/// Regular-season and preseason schedule generation.
///
/// Generators are idempotent: asked for a season whose schedule already
/// exists, they return the same event set rather than a new one.
pub trait ScheduleGenerator {
    /// Exactly 48 games across three preseason weeks.
    fn generate_preseason(&self, season: i32) -> anyhow::Result<Vec<GameEvent>>;

    /// Exactly 272 games across the regular season, beginning after
    /// `preseason_start`.
    fn generate_regular_season(&self, season: i32, preseason_start: Date)
        -> anyhow::Result<Vec<GameEvent>>;
}

/// Playoff seeding, one slot per conference, best seed first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayoffSeeding {
    pub afc: Vec<u32>,
    pub nfc: Vec<u32>,
}

impl PlayoffSeeding {
    pub fn is_empty(&self) -> bool {
        self.afc.is_empty() && self.nfc.is_empty()
    }
}

/// Outcome of one playoff day.
#[derive(Debug, Clone, Default)]
pub struct PlayoffDayOutcome {
    pub games_played: u32,
    pub results: Vec<GameResult>,
}

/// The observable surface of the playoff bracket controller.
pub trait PlayoffController {
    /// Simulate all playoff games due on `date`, progressing the bracket.
    fn simulate_day(&mut self, date: Date) -> anyhow::Result<PlayoffDayOutcome>;

    fn is_super_bowl_complete(&self) -> bool;

    fn super_bowl_winner(&self) -> Option<u32>;

    fn super_bowl_date(&self) -> Option<Date>;
}

/// Builds (and rebuilds) playoff controllers.
pub trait PlayoffFactory {
    /// Seed the bracket from final regular-season standings.
    fn seed_playoffs(&self, standings: &[TeamStanding]) -> anyhow::Result<PlayoffSeeding>;

    /// Construct a controller for a freshly seeded bracket.
    fn create_controller(
        &self,
        seeding: &PlayoffSeeding,
    ) -> anyhow::Result<Box<dyn PlayoffController>>;

    /// Reconstruct a controller from existing bracket events after a
    /// process restart. Returns `None` when no bracket exists. Must not
    /// reschedule any games.
    fn restore_controller(&self) -> anyhow::Result<Option<Box<dyn PlayoffController>>>;
}

/// One executed trade, as reported in day results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub teams: (u32, u32),
    pub description: String,
}

/// League-wide daily trade evaluation.
pub trait TradeAi {
    fn evaluate_daily_for_all_teams(
        &self,
        phase: SeasonPhase,
        week: u32,
    ) -> anyhow::Result<Vec<TradeRecord>>;
}

/// Decides whether trades are legal on a given day.
pub trait TradeWindowValidator {
    /// Returns `(allowed, reason)`; the reason explains a closed window.
    fn is_trade_allowed(&self, date: Date, phase: SeasonPhase, week: u32) -> (bool, String);
}

/// Counts returned by the league-wide contract rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractRollover {
    pub total: u32,
    pub active: u32,
    pub expired: u32,
}

/// Salary-cap/contract service.
pub trait ContractService {
    /// Advance every contract one league year, expiring terminated deals.
    fn increment_all_contracts(&self, new_season: i32) -> anyhow::Result<ContractRollover>;
}

/// Summary of a generated draft class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftClassSummary {
    pub class_id: String,
    pub total_players: u32,
    pub elapsed_ms: u64,
}

/// Draft-class generation and draft-order persistence.
pub trait DraftService {
    fn has_class(&self, season: i32) -> anyhow::Result<bool>;

    /// Generate a class of `size` prospects for `season`. Synchronous.
    fn prepare_class(&self, season: i32, size: u32) -> anyhow::Result<DraftClassSummary>;

    /// Persist the first-round pick order for next season's draft.
    fn store_draft_order(&self, season: i32, order: &[u32]) -> anyhow::Result<()>;
}

/// Schedules and fires offseason milestone events.
pub trait MilestoneScheduler {
    /// Insert the offseason milestones keyed to the Super Bowl date.
    /// Returns the ids of the inserted event rows.
    fn schedule_offseason_events(
        &self,
        super_bowl_date: Date,
        season: i32,
        dynasty_id: &str,
        events: &EventStore,
    ) -> anyhow::Result<Vec<String>>;

    /// Execute one due milestone, returning its results object.
    fn execute_milestone(
        &self,
        event: &crate::db::event_store::StoredEvent,
    ) -> anyhow::Result<serde_json::Value>;
}

/// The full set of collaborators the season controller is constructed with.
pub struct SeasonServices {
    pub simulator: Box<dyn GameSimulator>,
    pub schedule: Box<dyn ScheduleGenerator>,
    pub playoffs: Box<dyn PlayoffFactory>,
    pub trade_ai: Box<dyn TradeAi>,
    pub trade_window: Box<dyn TradeWindowValidator>,
    pub contracts: Box<dyn ContractService>,
    pub draft: Box<dyn DraftService>,
    pub milestones: Box<dyn MilestoneScheduler>,
}

#[cfg(test)]
pub(crate) mod stubs;
