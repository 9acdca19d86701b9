//! The four edge handlers of the phase state machine.
//!
//! Every handler records the substeps it completed so rollback can undo
//! exactly those, in reverse, best-effort. Rollback never raises past the
//! transition manager.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, bail, ensure, Context};

use crate::calendar::boundary::PhaseBoundaryDetector;
use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::calendar::phase_state::PhaseState;
use crate::db::dynasty_state::DynastyStateStore;
use crate::db::event_store::EventStore;
use crate::db::standings::{StandingsStore, TeamStanding};
use crate::events::{GameEvent, SeasonType};
use crate::season::completion::{PRESEASON_GAME_COUNT, REGULAR_SEASON_GAME_COUNT};
use crate::season::service::SeasonTransitionService;
use crate::season::year_sync::SeasonYearSynchronizer;
use crate::season::{PlayoffSlot, SeasonSummary};
use crate::services::SeasonServices;

use super::{PhaseTransition, TransitionHandler, TransitionOutcome};

/// Make sure exactly `expected` games exist for a season segment,
/// generating and inserting them when missing. Returns the event ids this
/// call inserted (empty when the schedule already existed: regeneration is
/// a no-op).
pub(crate) fn ensure_games_scheduled(
    events: &EventStore,
    dynasty_id: &str,
    season: i32,
    season_type: SeasonType,
    expected: u32,
    generate: impl FnOnce() -> anyhow::Result<Vec<GameEvent>>,
) -> anyhow::Result<Vec<String>> {
    let existing = events.count_scheduled_games(dynasty_id, season, season_type)?;
    if existing == expected {
        log::debug!(
            "{season_type} schedule for season {season} already complete ({expected} games)"
        );
        return Ok(Vec::new());
    }

    let games = generate().with_context(|| {
        format!("{season_type} schedule generation failed for season {season}")
    })?;
    ensure!(
        games.len() as u32 == expected,
        "{season_type} schedule generation returned {} games, expected {expected}",
        games.len()
    );

    let mut batch = Vec::new();
    let mut inserted_ids = Vec::new();
    for game in &games {
        ensure!(
            game.dynasty_id == dynasty_id,
            "generated game '{}' belongs to dynasty '{}', expected '{dynasty_id}'",
            game.game_id,
            game.dynasty_id
        );
        if events
            .get_by_game_id_and_dynasty(&game.game_id, dynasty_id)?
            .is_empty()
        {
            let stored = game.to_stored()?;
            inserted_ids.push(stored.event_id.clone());
            batch.push(stored);
        }
    }
    events.insert_batch(&batch)?;

    let total = events.count_scheduled_games(dynasty_id, season, season_type)?;
    ensure!(
        total == expected,
        "{season_type} schedule for season {season} has {total} games after generation, \
         expected {expected}"
    );
    log::info!(
        "{season_type} schedule for season {season}: {} game(s) inserted, {total} total",
        inserted_ids.len()
    );
    Ok(inserted_ids)
}

/// First-round draft order: worst record first (fewest wins, then worst
/// point differential); the champion always picks last.
pub(crate) fn draft_order_from(standings: &[TeamStanding], champion: Option<u32>) -> Vec<u32> {
    let mut order: Vec<&TeamStanding> = standings.iter().collect();
    order.sort_by_key(|s| {
        (
            s.wins,
            s.points_for as i64 - s.points_against as i64,
            s.team_id,
        )
    });
    let mut picks: Vec<u32> = order.iter().map(|s| s.team_id).collect();
    if let Some(champ) = champion {
        if let Some(pos) = picks.iter().position(|&t| t == champ) {
            picks.remove(pos);
            picks.push(champ);
        }
    }
    picks
}

// ---------------------------------------------------------------------------
// Preseason -> Regular Season
// ---------------------------------------------------------------------------

/// The simplest edge: schedules already exist, only the persisted phase
/// string moves forward.
pub struct PreseasonToRegularSeasonHandler {
    state: DynastyStateStore,
    phase_state: Arc<PhaseState>,
    dynasty_id: String,
    phase_updated: bool,
}

impl PreseasonToRegularSeasonHandler {
    pub fn new(
        state: DynastyStateStore,
        phase_state: Arc<PhaseState>,
        dynasty_id: impl Into<String>,
    ) -> Self {
        Self {
            state,
            phase_state,
            dynasty_id: dynasty_id.into(),
            phase_updated: false,
        }
    }
}

impl TransitionHandler for PreseasonToRegularSeasonHandler {
    fn execute(&mut self, transition: &PhaseTransition) -> anyhow::Result<TransitionOutcome> {
        ensure!(
            transition.from_phase == SeasonPhase::Preseason
                && transition.to_phase == SeasonPhase::RegularSeason,
            "handler received wrong edge: {transition}"
        );
        self.phase_updated = false;
        let season = self.phase_state.season_year();
        self.state
            .update_phase(&self.dynasty_id, season, SeasonPhase::RegularSeason)?;
        self.phase_updated = true;
        Ok(TransitionOutcome::default())
    }

    fn rollback(&mut self, transition: &PhaseTransition) {
        if !self.phase_updated {
            return;
        }
        let season = self.phase_state.season_year();
        if let Err(e) = self
            .state
            .update_phase(&self.dynasty_id, season, transition.from_phase)
        {
            log::error!("failed to restore phase during rollback: {e}");
        }
        self.phase_updated = false;
    }
}

// ---------------------------------------------------------------------------
// Regular Season -> Playoffs
// ---------------------------------------------------------------------------

enum PlayoffStep {
    ControllerCreated,
    PhaseUpdated,
}

/// Seeds the playoff bracket from final standings and installs the playoff
/// controller.
pub struct RegularToPlayoffsHandler {
    standings: StandingsStore,
    state: DynastyStateStore,
    phase_state: Arc<PhaseState>,
    services: Rc<SeasonServices>,
    slot: PlayoffSlot,
    dynasty_id: String,
    completed: Vec<PlayoffStep>,
}

impl RegularToPlayoffsHandler {
    pub fn new(
        standings: StandingsStore,
        state: DynastyStateStore,
        phase_state: Arc<PhaseState>,
        services: Rc<SeasonServices>,
        slot: PlayoffSlot,
        dynasty_id: impl Into<String>,
    ) -> Self {
        Self {
            standings,
            state,
            phase_state,
            services,
            slot,
            dynasty_id: dynasty_id.into(),
            completed: Vec::new(),
        }
    }
}

impl TransitionHandler for RegularToPlayoffsHandler {
    fn execute(&mut self, transition: &PhaseTransition) -> anyhow::Result<TransitionOutcome> {
        ensure!(
            transition.from_phase == SeasonPhase::RegularSeason
                && transition.to_phase == SeasonPhase::Playoffs,
            "handler received wrong edge: {transition}"
        );
        self.completed.clear();
        let season = self.phase_state.season_year();

        let standings = self
            .standings
            .get(&self.dynasty_id, season, SeasonType::RegularSeason)?;
        if standings.is_empty() {
            bail!(
                "no regular-season standings for dynasty '{}' season {season}",
                self.dynasty_id
            );
        }

        let seeding = self.services.playoffs.seed_playoffs(&standings)?;
        if seeding.is_empty() {
            bail!("playoff seeding produced no seeds");
        }

        let controller = self.services.playoffs.create_controller(&seeding)?;
        *self.slot.borrow_mut() = Some(controller);
        self.completed.push(PlayoffStep::ControllerCreated);

        self.state
            .update_phase(&self.dynasty_id, season, SeasonPhase::Playoffs)?;
        self.completed.push(PlayoffStep::PhaseUpdated);

        Ok(TransitionOutcome::default())
    }

    fn rollback(&mut self, transition: &PhaseTransition) {
        let season = self.phase_state.season_year();
        for step in self.completed.drain(..).rev() {
            match step {
                PlayoffStep::PhaseUpdated => {
                    if let Err(e) =
                        self.state
                            .update_phase(&self.dynasty_id, season, transition.from_phase)
                    {
                        log::error!("failed to restore phase during rollback: {e}");
                    }
                }
                PlayoffStep::ControllerCreated => {
                    // Bracket rows are the playoff controller's own
                    // responsibility; dropping the instance is enough here.
                    *self.slot.borrow_mut() = None;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Playoffs -> Offseason
// ---------------------------------------------------------------------------

enum OffseasonStep {
    MilestonesScheduled(Vec<String>),
    SummaryStored,
    DraftOrderStored,
    PhaseUpdated,
}

/// Closes out the season: reads the Super Bowl winner, schedules the
/// offseason milestones, produces the season summary, and persists next
/// season's draft order.
pub struct PlayoffsToOffseasonHandler {
    events: EventStore,
    standings: StandingsStore,
    state: DynastyStateStore,
    phase_state: Arc<PhaseState>,
    services: Rc<SeasonServices>,
    slot: PlayoffSlot,
    summary_slot: Rc<RefCell<Option<SeasonSummary>>>,
    dynasty_id: String,
    completed: Vec<OffseasonStep>,
}

impl PlayoffsToOffseasonHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: EventStore,
        standings: StandingsStore,
        state: DynastyStateStore,
        phase_state: Arc<PhaseState>,
        services: Rc<SeasonServices>,
        slot: PlayoffSlot,
        summary_slot: Rc<RefCell<Option<SeasonSummary>>>,
        dynasty_id: impl Into<String>,
    ) -> Self {
        Self {
            events,
            standings,
            state,
            phase_state,
            services,
            slot,
            summary_slot,
            dynasty_id: dynasty_id.into(),
            completed: Vec::new(),
        }
    }

    fn total_completed_games(&self, season: i32) -> crate::error::Result<u32> {
        let mut total = 0;
        for st in [
            SeasonType::Preseason,
            SeasonType::RegularSeason,
            SeasonType::Playoffs,
        ] {
            total += self
                .events
                .count_completed_games(&self.dynasty_id, season, st)?;
        }
        Ok(total)
    }
}

impl TransitionHandler for PlayoffsToOffseasonHandler {
    fn execute(&mut self, transition: &PhaseTransition) -> anyhow::Result<TransitionOutcome> {
        ensure!(
            transition.from_phase == SeasonPhase::Playoffs
                && transition.to_phase == SeasonPhase::Offseason,
            "handler received wrong edge: {transition}"
        );
        self.completed.clear();
        let season = self.phase_state.season_year();

        let (champion, super_bowl_date) = {
            let slot = self.slot.borrow();
            let controller = slot
                .as_ref()
                .ok_or_else(|| anyhow!("no playoff controller to read the Super Bowl from"))?;
            let champion = controller
                .super_bowl_winner()
                .ok_or_else(|| anyhow!("Super Bowl has no winner yet"))?;
            let date = controller
                .super_bowl_date()
                .ok_or_else(|| anyhow!("Super Bowl date unknown"))?;
            (champion, date)
        };

        let inserted = self.services.milestones.schedule_offseason_events(
            super_bowl_date,
            season,
            &self.dynasty_id,
            &self.events,
        )?;
        log::info!(
            "scheduled {} offseason milestone(s) for season {season}",
            inserted.len()
        );
        self.completed.push(OffseasonStep::MilestonesScheduled(inserted));

        let summary = SeasonSummary {
            season_year: season,
            dynasty_id: self.dynasty_id.clone(),
            champion_team_id: Some(champion),
            total_games: self.total_completed_games(season)?,
            final_date: super_bowl_date,
        };
        *self.summary_slot.borrow_mut() = Some(summary.clone());
        self.completed.push(OffseasonStep::SummaryStored);

        let standings = self
            .standings
            .get(&self.dynasty_id, season, SeasonType::RegularSeason)?;
        let order = draft_order_from(&standings, Some(champion));
        self.services.draft.store_draft_order(season + 1, &order)?;
        self.completed.push(OffseasonStep::DraftOrderStored);

        self.state
            .update_phase(&self.dynasty_id, season, SeasonPhase::Offseason)?;
        self.completed.push(OffseasonStep::PhaseUpdated);

        Ok(TransitionOutcome {
            season_summary: Some(summary),
            ..Default::default()
        })
    }

    fn rollback(&mut self, transition: &PhaseTransition) {
        let season = self.phase_state.season_year();
        for step in self.completed.drain(..).rev() {
            match step {
                OffseasonStep::PhaseUpdated => {
                    if let Err(e) =
                        self.state
                            .update_phase(&self.dynasty_id, season, transition.from_phase)
                    {
                        log::error!("failed to restore phase during rollback: {e}");
                    }
                }
                OffseasonStep::DraftOrderStored => {
                    // Draft order is an overwrite-on-retry record; nothing
                    // to undo.
                }
                OffseasonStep::SummaryStored => {
                    *self.summary_slot.borrow_mut() = None;
                }
                OffseasonStep::MilestonesScheduled(ids) => {
                    for event_id in ids {
                        if let Err(e) = self.events.delete_by_id(&event_id) {
                            log::error!("failed to cancel milestone '{event_id}': {e}");
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Offseason -> Preseason (new season)
// ---------------------------------------------------------------------------

enum RolloverStep {
    PreseasonScheduled(Vec<String>),
    RegularSeasonScheduled(Vec<String>),
    StandingsReset,
    StateInitialized {
        new_year: i32,
        prior_year: i32,
        prior_phase: SeasonPhase,
    },
    YearTransitionExecuted,
}

/// The most complex edge: generates both schedules for the new year,
/// resets standings, creates the new season's state row, and runs the year
/// transition service (contracts + draft class).
pub struct OffseasonToPreseasonHandler {
    events: EventStore,
    standings: StandingsStore,
    state: DynastyStateStore,
    phase_state: Arc<PhaseState>,
    boundary: Rc<PhaseBoundaryDetector>,
    services: Rc<SeasonServices>,
    transition_service: Rc<SeasonTransitionService>,
    synchronizer: Rc<SeasonYearSynchronizer>,
    calendar: Rc<Cell<Date>>,
    dynasty_id: String,
    completed: Vec<RolloverStep>,
}

impl OffseasonToPreseasonHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: EventStore,
        standings: StandingsStore,
        state: DynastyStateStore,
        phase_state: Arc<PhaseState>,
        boundary: Rc<PhaseBoundaryDetector>,
        services: Rc<SeasonServices>,
        transition_service: Rc<SeasonTransitionService>,
        synchronizer: Rc<SeasonYearSynchronizer>,
        calendar: Rc<Cell<Date>>,
        dynasty_id: impl Into<String>,
    ) -> Self {
        Self {
            events,
            standings,
            state,
            phase_state,
            boundary,
            services,
            transition_service,
            synchronizer,
            calendar,
            dynasty_id: dynasty_id.into(),
            completed: Vec::new(),
        }
    }
}

impl TransitionHandler for OffseasonToPreseasonHandler {
    fn execute(&mut self, transition: &PhaseTransition) -> anyhow::Result<TransitionOutcome> {
        ensure!(
            transition.from_phase == SeasonPhase::Offseason
                && transition.to_phase == SeasonPhase::Preseason,
            "handler received wrong edge: {transition}"
        );
        self.completed.clear();

        // The edge fires when the calendar reaches the new preseason, so
        // the transition date's season year IS the new year.
        let today = self.calendar.get();
        let new_year = today.season_year();
        let prior_year = new_year - 1;
        let prior_phase = transition.from_phase;
        log::info!(
            "starting season rollover {prior_year} -> {new_year} for dynasty '{}'",
            self.dynasty_id
        );

        let preseason_start = self
            .boundary
            .phase_start_date(SeasonPhase::Preseason, Some(new_year))?
            .unwrap_or_else(|| Date::first_thursday_of_august(new_year));

        let preseason_ids = ensure_games_scheduled(
            &self.events,
            &self.dynasty_id,
            new_year,
            SeasonType::Preseason,
            PRESEASON_GAME_COUNT,
            || self.services.schedule.generate_preseason(new_year),
        )?;
        self.boundary.invalidate_cache();
        self.completed
            .push(RolloverStep::PreseasonScheduled(preseason_ids));

        let regular_ids = ensure_games_scheduled(
            &self.events,
            &self.dynasty_id,
            new_year,
            SeasonType::RegularSeason,
            REGULAR_SEASON_GAME_COUNT,
            || {
                self.services
                    .schedule
                    .generate_regular_season(new_year, preseason_start)
            },
        )?;
        self.boundary.invalidate_cache();
        self.completed
            .push(RolloverStep::RegularSeasonScheduled(regular_ids));

        self.standings
            .reset_for_season(&self.dynasty_id, new_year, SeasonType::Preseason)?;
        self.standings
            .reset_for_season(&self.dynasty_id, new_year, SeasonType::RegularSeason)?;
        self.completed.push(RolloverStep::StandingsReset);

        self.state
            .initialize(&self.dynasty_id, new_year, today, 1, SeasonPhase::Preseason)?;
        self.completed.push(RolloverStep::StateInitialized {
            new_year,
            prior_year,
            prior_phase,
        });

        let report = self.transition_service.execute_year_transition(new_year)?;
        self.completed.push(RolloverStep::YearTransitionExecuted);
        log::info!(
            "season {new_year} initialized: {} preseason + {} regular-season games, \
             {} contracts rolled, draft class '{}'",
            PRESEASON_GAME_COUNT,
            REGULAR_SEASON_GAME_COUNT,
            report.contracts.total,
            report.draft.class_id
        );

        Ok(TransitionOutcome {
            new_season_year: Some(new_year),
            ..Default::default()
        })
    }

    fn rollback(&mut self, _transition: &PhaseTransition) {
        let had_steps = !self.completed.is_empty();
        for step in self.completed.drain(..).rev() {
            match step {
                RolloverStep::YearTransitionExecuted => {
                    // Contract and draft services own their retry
                    // idempotency; the year itself is re-adopted below.
                    log::warn!("year transition ran before rollback; services keep their state");
                }
                RolloverStep::StateInitialized {
                    new_year,
                    prior_year,
                    prior_phase,
                } => {
                    if let Err(e) = self.state.delete(&self.dynasty_id, new_year) {
                        log::error!("failed to remove season {new_year} state row: {e}");
                    }
                    if let Err(e) =
                        self.state
                            .update_phase(&self.dynasty_id, prior_year, prior_phase)
                    {
                        log::error!("failed to restore phase during rollback: {e}");
                    }
                }
                RolloverStep::StandingsReset => {
                    // Prior-year standings rows were never touched; the new
                    // year's zero rows are harmless.
                }
                RolloverStep::PreseasonScheduled(ids)
                | RolloverStep::RegularSeasonScheduled(ids) => {
                    for event_id in ids {
                        if let Err(e) = self.events.delete_by_id(&event_id) {
                            log::error!("failed to delete scheduled game '{event_id}': {e}");
                        }
                    }
                    self.boundary.invalidate_cache();
                }
            }
        }
        if had_steps {
            // Memory and registered components re-adopt whatever year the
            // database now carries.
            if let Err(e) = self.synchronizer.adopt_database_year("rollover rollback") {
                log::error!("failed to re-adopt database year during rollback: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConnection;

    fn standing(team_id: u32, wins: u32, diff: i64) -> TeamStanding {
        TeamStanding {
            team_id,
            wins,
            losses: 17 - wins,
            points_for: (400 + diff.max(0)) as u32,
            points_against: (400 - diff.min(0)) as u32,
            ..Default::default()
        }
    }

    #[test]
    fn draft_order_puts_worst_first_and_champion_last() {
        let standings = vec![
            standing(1, 14, 120),
            standing(2, 3, -100),
            standing(3, 3, -150),
            standing(4, 10, 40),
        ];
        // Team 1 won the title despite the best record already being last
        let order = draft_order_from(&standings, Some(1));
        assert_eq!(order, vec![3, 2, 4, 1]);

        // Without a champion the sort alone decides
        let order = draft_order_from(&standings, None);
        assert_eq!(order, vec![3, 2, 4, 1]);

        // A mid-pack champion is moved to the end
        let order = draft_order_from(&standings, Some(4));
        assert_eq!(order, vec![3, 2, 1, 4]);
    }

    fn setup_store() -> (DatabaseConnection, EventStore) {
        let db = DatabaseConnection::open_in_memory().unwrap();
        {
            let conn = db.lock();
            conn.execute(
                "INSERT INTO dynasties (dynasty_id, dynasty_name) VALUES ('d1', 'Test')",
                [],
            )
            .unwrap();
        }
        let events = EventStore::new(db.clone());
        (db, events)
    }

    fn tiny_schedule(season: i32, count: u32) -> Vec<GameEvent> {
        use crate::events::{GameParameters, GameType};
        (0..count)
            .map(|i| {
                GameEvent::scheduled(
                    format!("preseason_{season}_{i}"),
                    "d1",
                    Date::new(season, 8, 8).unwrap().add_days((i / 16) as i64 * 7),
                    GameParameters {
                        season,
                        season_type: SeasonType::Preseason,
                        week: i / 16 + 1,
                        home_team_id: (i % 16) * 2 + 1,
                        away_team_id: (i % 16) * 2 + 2,
                        game_type: GameType::Preseason,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn schedule_generation_is_idempotent() {
        let (_db, events) = setup_store();

        let first = ensure_games_scheduled(&events, "d1", 2025, SeasonType::Preseason, 48, || {
            Ok(tiny_schedule(2025, 48))
        })
        .unwrap();
        assert_eq!(first.len(), 48);

        // Second run short-circuits without calling the generator
        let second = ensure_games_scheduled(&events, "d1", 2025, SeasonType::Preseason, 48, || {
            panic!("generator must not run when the schedule exists")
        })
        .unwrap();
        assert!(second.is_empty());
        assert_eq!(
            events.count_scheduled_games("d1", 2025, SeasonType::Preseason).unwrap(),
            48
        );
    }

    #[test]
    fn wrong_game_count_is_rejected() {
        let (_db, events) = setup_store();
        let err = ensure_games_scheduled(&events, "d1", 2025, SeasonType::Preseason, 48, || {
            Ok(tiny_schedule(2025, 40))
        })
        .unwrap_err();
        assert!(err.to_string().contains("expected 48"));
        assert_eq!(
            events.count_scheduled_games("d1", 2025, SeasonType::Preseason).unwrap(),
            0
        );
    }

    #[test]
    fn preseason_to_regular_updates_and_rolls_back_phase() {
        let (db, _events) = setup_store();
        let state = DynastyStateStore::new(db);
        state
            .initialize(
                "d1",
                2024,
                Date::new(2024, 9, 4).unwrap(),
                4,
                SeasonPhase::Preseason,
            )
            .unwrap();
        let phase_state = Arc::new(PhaseState::new(SeasonPhase::Preseason, 2024));
        let mut handler =
            PreseasonToRegularSeasonHandler::new(state.clone(), Arc::clone(&phase_state), "d1");

        let transition = PhaseTransition::new(
            SeasonPhase::Preseason,
            SeasonPhase::RegularSeason,
            "preseason_complete",
        );
        handler.execute(&transition).unwrap();
        assert_eq!(
            state.get_current("d1", 2024).unwrap().unwrap().current_phase,
            SeasonPhase::RegularSeason
        );

        handler.rollback(&transition);
        assert_eq!(
            state.get_current("d1", 2024).unwrap().unwrap().current_phase,
            SeasonPhase::Preseason
        );
    }

    #[test]
    fn preseason_to_regular_rejects_wrong_edge() {
        let (db, _events) = setup_store();
        let state = DynastyStateStore::new(db);
        let phase_state = Arc::new(PhaseState::new(SeasonPhase::Playoffs, 2024));
        let mut handler = PreseasonToRegularSeasonHandler::new(state, phase_state, "d1");

        let wrong = PhaseTransition::new(
            SeasonPhase::Playoffs,
            SeasonPhase::Offseason,
            "playoffs_complete",
        );
        assert!(handler.execute(&wrong).is_err());
    }
}
