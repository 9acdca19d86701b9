//! Season cycle orchestration.
//!
//! The controller owns the in-memory calendar and every dependency of the
//! daily loop. One `advance_day` call advances the calendar exactly one
//! day, runs any due phase transition, hands the date to the phase's day
//! handler, evaluates trades, and commits the dynasty state through the
//! sync validator. Structural failures (persistence, drift) raise; semantic
//! refusals come back as results with `success = false`.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::calendar::boundary::PhaseBoundaryDetector;
use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::calendar::phase_state::PhaseState;
use crate::config::SimulationSettings;
use crate::db::dynasty_state::{DynastyState, DynastyStateStore};
use crate::db::event_store::EventStore;
use crate::db::standings::{StandingsStore, TeamStanding};
use crate::db::sync::{DriftSeverity, SyncValidator};
use crate::db::transaction::{TransactionContext, TransactionMode};
use crate::db::DatabaseConnection;
use crate::error::{Result, SyncError};
use crate::events::{GameType, MilestoneEvent, SeasonType};
use crate::season::completion::{
    PhaseCompletionChecker, PRESEASON_GAME_COUNT, REGULAR_SEASON_GAME_COUNT,
};
use crate::season::executor::SimulationExecutor;
use crate::season::handlers::{
    GameDayHandler, OffseasonDayHandler, PhaseDayHandler, PlayoffDayHandler,
};
use crate::season::service::{SeasonTransitionService, DRAFT_CLASS_SIZE};
use crate::season::transition::handlers::{
    ensure_games_scheduled, OffseasonToPreseasonHandler, PlayoffsToOffseasonHandler,
    PreseasonToRegularSeasonHandler, RegularToPlayoffsHandler,
};
use crate::season::transition::{PhaseTransitionManager, TransitionKey};
use crate::season::year_sync::SeasonYearSynchronizer;
use crate::season::{
    AdvanceSummary, DayResult, ExecutedTransition, PhaseInfo, PlayoffSlot, SeasonSummary,
};
use crate::services::SeasonServices;

/// Upper bound on days simulated by a single "until something happens"
/// loop. A phase is never this long; hitting the cap means the schedule is
/// broken.
const MAX_LOOP_DAYS: u32 = 450;

/// Construction parameters for [`SeasonCycleController`].
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub dynasty_id: String,
    pub dynasty_name: String,
    pub owner_name: Option<String>,
    /// Starting season year for a new dynasty. When a persisted state
    /// exists, the persisted year wins and a mismatch is only logged.
    pub season_year: i32,
    /// Starting date for a new dynasty; defaults to August 1 of
    /// `season_year`.
    pub start_date: Option<Date>,
    pub settings: SimulationSettings,
}

impl ControllerConfig {
    pub fn new(dynasty_id: impl Into<String>, season_year: i32) -> Self {
        let dynasty_id = dynasty_id.into();
        Self {
            dynasty_name: dynasty_id.clone(),
            dynasty_id,
            owner_name: None,
            season_year,
            start_date: None,
            settings: SimulationSettings::fast(),
        }
    }
}

/// Top-level orchestrator of the season cycle.
pub struct SeasonCycleController {
    db: DatabaseConnection,
    dynasty_id: String,
    settings: SimulationSettings,
    events: EventStore,
    state: DynastyStateStore,
    standings: StandingsStore,
    validator: SyncValidator,
    boundary: Rc<PhaseBoundaryDetector>,
    phase_state: Arc<PhaseState>,
    calendar: Rc<Cell<Date>>,
    services: Rc<SeasonServices>,
    day_handlers: HashMap<SeasonPhase, Box<dyn PhaseDayHandler>>,
    transition_manager: PhaseTransitionManager,
    synchronizer: Rc<SeasonYearSynchronizer>,
    summary_slot: Rc<RefCell<Option<SeasonSummary>>>,
    transition_history: Vec<ExecutedTransition>,
    total_games_played: u64,
    total_days_simulated: u64,
}

impl SeasonCycleController {
    /// Build a controller for a new or existing dynasty. A persisted state
    /// row is adopted as truth; otherwise a fresh dynasty is initialized in
    /// the preseason at August 1 of the configured year.
    pub fn new(
        db: DatabaseConnection,
        config: ControllerConfig,
        services: SeasonServices,
    ) -> Result<Self> {
        let events = EventStore::new(db.clone());
        let state = DynastyStateStore::new(db.clone());
        let standings = StandingsStore::new(db.clone());

        state.ensure_dynasty(
            &config.dynasty_id,
            &config.dynasty_name,
            config.owner_name.as_deref(),
        )?;

        let (season_year, phase, date) = match state.get_latest(&config.dynasty_id)? {
            Some(restored) => {
                if restored.season != config.season_year {
                    log::warn!(
                        "dynasty '{}' restoring persisted season {} (caller supplied {})",
                        config.dynasty_id,
                        restored.season,
                        config.season_year
                    );
                }
                log::info!(
                    "dynasty '{}' restored: season {}, phase {}, date {}",
                    config.dynasty_id,
                    restored.season,
                    restored.current_phase,
                    restored.current_date
                );
                (restored.season, restored.current_phase, restored.current_date)
            }
            None => {
                let start = match config.start_date {
                    Some(d) => d,
                    None => Date::new(config.season_year, 8, 1).ok_or_else(|| {
                        SyncError::State(format!("invalid start year {}", config.season_year))
                    })?,
                };
                state.initialize(
                    &config.dynasty_id,
                    config.season_year,
                    start,
                    1,
                    SeasonPhase::Preseason,
                )?;
                log::info!(
                    "dynasty '{}' created: season {}, starting {}",
                    config.dynasty_id,
                    start.season_year(),
                    start
                );
                (start.season_year(), SeasonPhase::Preseason, start)
            }
        };

        if !services.draft.has_class(season_year).map_err(SyncError::from)? {
            let class = services
                .draft
                .prepare_class(season_year, DRAFT_CLASS_SIZE)
                .map_err(SyncError::from)?;
            log::info!(
                "draft class '{}' generated for season {season_year} ({} prospects)",
                class.class_id,
                class.total_players
            );
        }

        let boundary = Rc::new(PhaseBoundaryDetector::new(events.clone(), config.dynasty_id.clone()));
        match boundary.phase_for_date(date, Some(season_year)) {
            Ok(computed) if computed != phase => log::warn!(
                "stored phase '{phase}' differs from schedule-derived '{computed}' for {date}"
            ),
            Ok(_) => {}
            Err(e) => log::warn!("phase parity check skipped: {e}"),
        }

        let phase_state = Arc::new(PhaseState::new(phase, season_year));
        let calendar = Rc::new(Cell::new(date));
        let services = Rc::new(services);
        let executor = Rc::new(RefCell::new(SimulationExecutor::new(
            db.clone(),
            events.clone(),
            standings.clone(),
            config.dynasty_id.clone(),
            season_year,
            config.settings,
        )));

        let playoff_slot: PlayoffSlot = Rc::new(RefCell::new(None));
        if matches!(phase, SeasonPhase::Playoffs | SeasonPhase::Offseason) {
            if let Some(restored) = services
                .playoffs
                .restore_controller()
                .map_err(SyncError::from)?
            {
                log::info!("playoff controller reconstructed from existing bracket events");
                *playoff_slot.borrow_mut() = Some(restored);
            }
        }
        let summary_slot: Rc<RefCell<Option<SeasonSummary>>> = Rc::new(RefCell::new(None));

        let mut synchronizer =
            SeasonYearSynchronizer::new(state.clone(), Arc::clone(&phase_state), config.dynasty_id.clone());
        {
            let executor = Rc::clone(&executor);
            synchronizer.register_component("simulation_executor", move |year| {
                executor.borrow_mut().set_season_year(year)
            });
        }
        let synchronizer = Rc::new(synchronizer);
        let transition_service = Rc::new(SeasonTransitionService::new(
            Rc::clone(&synchronizer),
            Rc::clone(&services),
        ));

        let checker = Self::build_checker(
            events.clone(),
            Rc::clone(&boundary),
            Arc::clone(&phase_state),
            Rc::clone(&calendar),
            Rc::clone(&playoff_slot),
            config.dynasty_id.clone(),
        );

        let mut transition_manager =
            PhaseTransitionManager::new(Arc::clone(&phase_state), checker);
        transition_manager.register_handler(
            TransitionKey::PreseasonToRegularSeason,
            Box::new(PreseasonToRegularSeasonHandler::new(
                state.clone(),
                Arc::clone(&phase_state),
                config.dynasty_id.clone(),
            )),
        );
        transition_manager.register_handler(
            TransitionKey::RegularSeasonToPlayoffs,
            Box::new(RegularToPlayoffsHandler::new(
                standings.clone(),
                state.clone(),
                Arc::clone(&phase_state),
                Rc::clone(&services),
                Rc::clone(&playoff_slot),
                config.dynasty_id.clone(),
            )),
        );
        transition_manager.register_handler(
            TransitionKey::PlayoffsToOffseason,
            Box::new(PlayoffsToOffseasonHandler::new(
                events.clone(),
                standings.clone(),
                state.clone(),
                Arc::clone(&phase_state),
                Rc::clone(&services),
                Rc::clone(&playoff_slot),
                Rc::clone(&summary_slot),
                config.dynasty_id.clone(),
            )),
        );
        transition_manager.register_handler(
            TransitionKey::OffseasonToPreseason,
            Box::new(OffseasonToPreseasonHandler::new(
                events.clone(),
                standings.clone(),
                state.clone(),
                Arc::clone(&phase_state),
                Rc::clone(&boundary),
                Rc::clone(&services),
                transition_service,
                Rc::clone(&synchronizer),
                Rc::clone(&calendar),
                config.dynasty_id.clone(),
            )),
        );
        transition_manager
            .validate_complete()
            .map_err(SyncError::from)?;

        let mut day_handlers: HashMap<SeasonPhase, Box<dyn PhaseDayHandler>> = HashMap::new();
        day_handlers.insert(
            SeasonPhase::Preseason,
            Box::new(GameDayHandler::new(Rc::clone(&executor), Rc::clone(&services))),
        );
        day_handlers.insert(
            SeasonPhase::RegularSeason,
            Box::new(GameDayHandler::new(Rc::clone(&executor), Rc::clone(&services))),
        );
        day_handlers.insert(
            SeasonPhase::Playoffs,
            Box::new(PlayoffDayHandler::new(Rc::clone(&playoff_slot))),
        );
        day_handlers.insert(
            SeasonPhase::Offseason,
            Box::new(OffseasonDayHandler::new(
                events.clone(),
                Rc::clone(&services),
                config.dynasty_id.clone(),
                config.settings,
            )),
        );

        let validator = SyncValidator::new(state.clone(), config.dynasty_id.clone());

        Ok(Self {
            db,
            dynasty_id: config.dynasty_id,
            settings: config.settings,
            events,
            state,
            standings,
            validator,
            boundary,
            phase_state,
            calendar,
            services,
            day_handlers,
            transition_manager,
            synchronizer,
            summary_slot,
            transition_history: Vec::new(),
            total_games_played: 0,
            total_days_simulated: 0,
        })
    }

    // The completion checker reads everything lazily through these
    // closures so it always sees current state.
    fn build_checker(
        events: EventStore,
        boundary: Rc<PhaseBoundaryDetector>,
        phase_state: Arc<PhaseState>,
        calendar: Rc<Cell<Date>>,
        playoff_slot: PlayoffSlot,
        dynasty_id: String,
    ) -> PhaseCompletionChecker {
        let games_played = {
            let events = events.clone();
            let phase_state = Arc::clone(&phase_state);
            let dynasty_id = dynasty_id.clone();
            Box::new(move || {
                let (phase, year) = phase_state.snapshot();
                match phase {
                    SeasonPhase::Preseason => {
                        events.count_completed_games(&dynasty_id, year, SeasonType::Preseason)
                    }
                    SeasonPhase::RegularSeason => {
                        events.count_completed_games(&dynasty_id, year, SeasonType::RegularSeason)
                    }
                    _ => Ok(0),
                }
            })
        };
        let current_date = {
            let calendar = Rc::clone(&calendar);
            Box::new(move || calendar.get())
        };
        let last_regular = {
            let boundary = Rc::clone(&boundary);
            let phase_state = Arc::clone(&phase_state);
            Box::new(move || {
                boundary.last_game_date(
                    SeasonPhase::RegularSeason,
                    Some(phase_state.season_year()),
                )
            })
        };
        let last_preseason = {
            let boundary = Rc::clone(&boundary);
            let phase_state = Arc::clone(&phase_state);
            Box::new(move || {
                boundary.last_game_date(SeasonPhase::Preseason, Some(phase_state.season_year()))
            })
        };
        let super_bowl_complete = {
            Box::new(move || {
                playoff_slot
                    .borrow()
                    .as_ref()
                    .map(|pc| pc.is_super_bowl_complete())
                    .unwrap_or(false)
            })
        };
        let preseason_start = {
            Box::new(move || {
                // The next first-Thursday-of-August on or after today names
                // the upcoming season; its schedule (or the fallback date)
                // is the offseason's finish line.
                let today = calendar.get();
                let anchor = Date::first_thursday_of_august(today.year());
                let upcoming_year = if today <= anchor {
                    today.year()
                } else {
                    today.year() + 1
                };
                boundary.phase_start_date(SeasonPhase::Preseason, Some(upcoming_year))
            })
        };

        PhaseCompletionChecker::new(
            games_played,
            current_date,
            last_regular,
            last_preseason,
            super_bowl_complete,
            preseason_start,
        )
    }

    /// Advance the simulation by exactly one day.
    pub fn advance_day(&mut self) -> Result<DayResult> {
        let before = self.calendar.get();
        let result = self.advance_day_inner();
        if result.is_err() {
            // The day did not commit; keep the in-memory calendar on the
            // durable date so a retry re-simulates the same day.
            self.calendar.set(before);
        }
        result
    }

    fn advance_day_inner(&mut self) -> Result<DayResult> {
        self.synchronizer.adopt_database_year("before daily simulation")?;

        let current_date = self.calendar.get().next_day();
        self.calendar.set(current_date);

        // A date-based transition can fire before today's games (the new
        // phase's handler then simulates this date).
        let mut executed = self.run_transition_if_needed()?;

        let phase = self.phase_state.phase();
        let handler = self.day_handlers.get_mut(&phase).ok_or_else(|| {
            SyncError::State(format!("no day handler registered for phase '{phase}'"))
        })?;
        let outcome = handler.simulate_day(current_date)?;
        self.total_games_played += u64::from(outcome.games_played);
        self.total_days_simulated += 1;

        let week_for_trades = self
            .compute_week(phase, self.phase_state.season_year())?
            .unwrap_or(0);
        let mut trades = Vec::new();
        if !self.settings.skip_transaction_ai {
            let (allowed, reason) =
                self.services
                    .trade_window
                    .is_trade_allowed(current_date, phase, week_for_trades);
            if allowed {
                trades = self
                    .services
                    .trade_ai
                    .evaluate_daily_for_all_teams(phase, week_for_trades)
                    .map_err(SyncError::from)?;
                if !trades.is_empty() {
                    log::info!("{} trade(s) executed on {current_date}", trades.len());
                }
            } else {
                log::debug!("trade window closed on {current_date}: {reason}");
            }
        }

        // Count-based transitions become true only after today's games.
        if executed.is_none() {
            executed = self.run_transition_if_needed()?;
        }

        let phase = self.phase_state.phase();
        let season = self.phase_state.season_year();
        let week = self.compute_week(phase, season)?;

        let pre = self.validator.validate_pre_sync(current_date, phase)?;
        if !pre.valid() {
            return Err(self.validator.pre_sync_error(&pre));
        }

        let prior = self.state.get_current(&self.dynasty_id, season)?;
        let record = DynastyState {
            dynasty_id: self.dynasty_id.clone(),
            season,
            current_date,
            current_phase: phase,
            current_week: week,
            last_simulated_game_id: outcome
                .last_game_id
                .clone()
                .or_else(|| prior.as_ref().and_then(|p| p.last_simulated_game_id.clone())),
            current_draft_pick: prior.as_ref().map_or(0, |p| p.current_draft_pick),
            draft_in_progress: prior.as_ref().is_some_and(|p| p.draft_in_progress),
        };
        {
            let conn = self.db.lock();
            TransactionContext::run(&conn, TransactionMode::Immediate, |c| {
                self.state.update_on(c, &record)
            })?;
        }

        let post = self.validator.verify_post_sync(current_date, phase)?;
        if !post.valid {
            if post.drift_days != 0 {
                return Err(SyncError::Drift {
                    drift_days: post.drift_days,
                    severity: DriftSeverity::classify(post.drift_days),
                    calendar_date: current_date.to_string(),
                    db_date: post
                        .actual_db_date
                        .map(|d| d.to_string())
                        .unwrap_or_else(|| "unknown".into()),
                });
            }
            return Err(SyncError::Persistence {
                operation: "advance_day_post_sync",
                reason: post.issues.join("; "),
            });
        }

        if let Some(transition) = &executed {
            self.transition_history.push(transition.clone());
        }

        Ok(DayResult {
            date: current_date,
            current_phase: phase,
            games_played: outcome.games_played,
            results: outcome.results,
            events_triggered: outcome.events_triggered,
            transactions_executed: trades,
            phase_transition: executed,
            current_week: week,
            success: true,
            message: None,
        })
    }

    fn run_transition_if_needed(&mut self) -> Result<Option<ExecutedTransition>> {
        let Some(transition) = self.transition_manager.check_transition_needed()? else {
            return Ok(None);
        };
        let outcome = self
            .transition_manager
            .execute_transition(&transition)
            .map_err(SyncError::from)?;
        log::info!("phase transition completed: {transition}");
        Ok(Some(ExecutedTransition {
            from_phase: transition.from_phase,
            to_phase: transition.to_phase,
            trigger: transition.trigger.to_string(),
            new_season_year: outcome.new_season_year,
        }))
    }

    fn compute_week(&self, phase: SeasonPhase, season: i32) -> Result<Option<u32>> {
        let season_type = match phase {
            SeasonPhase::Preseason => SeasonType::Preseason,
            SeasonPhase::RegularSeason => SeasonType::RegularSeason,
            SeasonPhase::Playoffs => SeasonType::Playoffs,
            SeasonPhase::Offseason => return Ok(None),
        };
        let week = self
            .events
            .max_completed_week(&self.dynasty_id, season, season_type)?
            .unwrap_or(1)
            .max(1);
        Ok(Some(week))
    }

    fn advance_loop(
        &mut self,
        max_days: u32,
        mut checkpoint: Option<&mut dyn FnMut(&DayResult) -> bool>,
    ) -> Result<AdvanceSummary> {
        let mut summary = AdvanceSummary {
            success: true,
            ..Default::default()
        };
        for _ in 0..max_days {
            let day = self.advance_day()?;
            summary.days_simulated += 1;
            summary.total_games_played += day.games_played;
            let transitioned = day.phase_transition.is_some();
            let keep_going = checkpoint.as_mut().map_or(true, |cb| cb(&day));
            summary.daily_results.push(day);
            if transitioned {
                summary.ended_by_transition = true;
                break;
            }
            if !keep_going {
                summary.checkpoint_aborted = true;
                summary.message = Some("advancement aborted by checkpoint".into());
                break;
            }
        }
        Ok(summary)
    }

    /// Up to seven days, stopping early on a phase transition or when the
    /// checkpoint returns `false`. The current day is already committed
    /// when the checkpoint aborts.
    pub fn advance_week(
        &mut self,
        checkpoint: Option<&mut dyn FnMut(&DayResult) -> bool>,
    ) -> Result<AdvanceSummary> {
        self.advance_loop(7, checkpoint)
    }

    /// Exactly `num_days` days, stopping early only on a phase transition
    /// (or a checkpoint abort).
    pub fn advance_days(
        &mut self,
        num_days: u32,
        checkpoint: Option<&mut dyn FnMut(&DayResult) -> bool>,
    ) -> Result<AdvanceSummary> {
        self.advance_loop(num_days, checkpoint)
    }

    /// Advance until the phase changes.
    pub fn simulate_to_phase_end(&mut self) -> Result<AdvanceSummary> {
        let starting = self.phase_state.phase();
        let mut summary = AdvanceSummary {
            success: true,
            ..Default::default()
        };
        for _ in 0..MAX_LOOP_DAYS {
            let day = self.advance_day()?;
            summary.days_simulated += 1;
            summary.total_games_played += day.games_played;
            let transitioned = day.phase_transition.is_some();
            summary.daily_results.push(day);
            if transitioned && self.phase_state.phase() != starting {
                summary.ended_by_transition = true;
                return Ok(summary);
            }
        }
        summary.success = false;
        summary.message = Some(format!(
            "phase '{starting}' did not end within {MAX_LOOP_DAYS} simulated days"
        ));
        Ok(summary)
    }

    /// Advance day-by-day until the calendar reaches `target`. Refuses
    /// (without raising) when `target` is not after the current date.
    pub fn simulate_to_date(&mut self, target: Date) -> Result<AdvanceSummary> {
        if target <= self.calendar.get() {
            return Ok(AdvanceSummary::failure(format!(
                "target date {target} is not after current date {}",
                self.calendar.get()
            )));
        }
        let mut summary = AdvanceSummary {
            success: true,
            ..Default::default()
        };
        while self.calendar.get() < target {
            let day = self.advance_day()?;
            summary.days_simulated += 1;
            summary.total_games_played += day.games_played;
            if day.phase_transition.is_some() {
                summary.ended_by_transition = true;
            }
            summary.daily_results.push(day);
        }
        Ok(summary)
    }

    /// Advance until the next due offseason milestone fires (or the season
    /// rolls over into the new preseason). Only meaningful in the
    /// offseason.
    pub fn simulate_to_next_offseason_milestone(&mut self) -> Result<AdvanceSummary> {
        if self.phase_state.phase() != SeasonPhase::Offseason {
            return Ok(AdvanceSummary::failure(format!(
                "Cannot simulate to next milestone from {}",
                self.phase_state.phase().display_name()
            )));
        }
        let mut summary = AdvanceSummary {
            success: true,
            ..Default::default()
        };
        for _ in 0..MAX_LOOP_DAYS {
            let day = self.advance_day()?;
            summary.days_simulated += 1;
            summary.total_games_played += day.games_played;
            let hit = !day.events_triggered.is_empty() || day.phase_transition.is_some();
            if day.phase_transition.is_some() {
                summary.ended_by_transition = true;
            }
            summary.daily_results.push(day);
            if hit {
                return Ok(summary);
            }
        }
        summary.success = false;
        summary.message = Some(format!(
            "no offseason milestone fired within {MAX_LOOP_DAYS} simulated days"
        ));
        Ok(summary)
    }

    /// Advance until the new-season edge fires. Only meaningful in the
    /// offseason.
    pub fn simulate_to_new_season(&mut self) -> Result<AdvanceSummary> {
        if self.phase_state.phase() != SeasonPhase::Offseason {
            return Ok(AdvanceSummary::failure(format!(
                "Cannot simulate to new season from {}",
                self.phase_state.phase().display_name()
            )));
        }
        let mut summary = AdvanceSummary {
            success: true,
            ..Default::default()
        };
        for _ in 0..MAX_LOOP_DAYS {
            let day = self.advance_day()?;
            summary.days_simulated += 1;
            summary.total_games_played += day.games_played;
            let rolled_over = day
                .phase_transition
                .as_ref()
                .is_some_and(|t| t.to_phase == SeasonPhase::Preseason);
            if day.phase_transition.is_some() {
                summary.ended_by_transition = true;
            }
            summary.daily_results.push(day);
            if rolled_over {
                return Ok(summary);
            }
        }
        summary.success = false;
        summary.message = Some(format!(
            "new season did not start within {MAX_LOOP_DAYS} simulated days"
        ));
        Ok(summary)
    }

    /// Generate the current season's schedules when they do not exist yet.
    /// Idempotent; returns `(preseason_inserted, regular_inserted)`.
    pub fn generate_initial_schedules(&mut self) -> Result<(u32, u32)> {
        let season = self.phase_state.season_year();
        let preseason_start = self
            .boundary
            .phase_start_date(SeasonPhase::Preseason, Some(season))?
            .unwrap_or_else(|| Date::first_thursday_of_august(season));

        let preseason = ensure_games_scheduled(
            &self.events,
            &self.dynasty_id,
            season,
            SeasonType::Preseason,
            PRESEASON_GAME_COUNT,
            || self.services.schedule.generate_preseason(season),
        )
        .map_err(SyncError::from)?;
        self.boundary.invalidate_cache();

        let regular = ensure_games_scheduled(
            &self.events,
            &self.dynasty_id,
            season,
            SeasonType::RegularSeason,
            REGULAR_SEASON_GAME_COUNT,
            || {
                self.services
                    .schedule
                    .generate_regular_season(season, preseason_start)
            },
        )
        .map_err(SyncError::from)?;
        self.boundary.invalidate_cache();

        self.standings
            .reset_for_season(&self.dynasty_id, season, SeasonType::Preseason)?;
        self.standings
            .reset_for_season(&self.dynasty_id, season, SeasonType::RegularSeason)?;

        Ok((preseason.len() as u32, regular.len() as u32))
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    pub fn current_date(&self) -> Date {
        self.calendar.get()
    }

    pub fn current_phase(&self) -> SeasonPhase {
        self.phase_state.phase()
    }

    pub fn season_year(&self) -> i32 {
        self.phase_state.season_year()
    }

    pub fn dynasty_id(&self) -> &str {
        &self.dynasty_id
    }

    pub fn transition_history(&self) -> &[ExecutedTransition] {
        &self.transition_history
    }

    pub fn total_games_played(&self) -> u64 {
        self.total_games_played
    }

    pub fn total_days_simulated(&self) -> u64 {
        self.total_days_simulated
    }

    /// The latest finished season's summary, when one exists.
    pub fn season_summary(&self) -> Option<SeasonSummary> {
        self.summary_slot.borrow().clone()
    }

    /// Standings for the current season; the offseason reports the just
    /// finished regular season.
    pub fn current_standings(&self) -> Result<Vec<TeamStanding>> {
        let (phase, season) = self.phase_state.snapshot();
        let season_type = match phase {
            SeasonPhase::Preseason => SeasonType::Preseason,
            SeasonPhase::Playoffs => SeasonType::Playoffs,
            _ => SeasonType::RegularSeason,
        };
        self.standings.get(&self.dynasty_id, season, season_type)
    }

    /// Snapshot of where the season stands.
    pub fn phase_info(&self) -> Result<PhaseInfo> {
        let (phase, season) = self.phase_state.snapshot();
        let preseason =
            self.events
                .count_completed_games(&self.dynasty_id, season, SeasonType::Preseason)?;
        let regular = self.events.count_completed_games(
            &self.dynasty_id,
            season,
            SeasonType::RegularSeason,
        )?;
        let playoffs =
            self.events
                .count_completed_games(&self.dynasty_id, season, SeasonType::Playoffs)?;
        let next_transition_trigger = match phase {
            SeasonPhase::Preseason => format!(
                "completion of the preseason ({preseason} of {PRESEASON_GAME_COUNT} games)"
            ),
            SeasonPhase::RegularSeason => format!(
                "completion of the remaining {} regular season games",
                REGULAR_SEASON_GAME_COUNT.saturating_sub(regular)
            ),
            SeasonPhase::Playoffs => "Super Bowl completion".to_string(),
            SeasonPhase::Offseason => "arrival of the next preseason start date".to_string(),
        };
        Ok(PhaseInfo {
            current_phase: phase,
            season_year: season,
            current_date: self.calendar.get(),
            completed_preseason_games: preseason,
            completed_regular_season_games: regular,
            completed_playoff_games: playoffs,
            regular_season_completion_pct: f64::from(regular)
                / f64::from(REGULAR_SEASON_GAME_COUNT)
                * 100.0,
            next_transition_trigger,
        })
    }

    /// Whether the next phase transition is likely close: 95% of the
    /// regular season done, or the conference championships both played.
    pub fn is_phase_transition_pending(&self) -> Result<bool> {
        let (phase, season) = self.phase_state.snapshot();
        match phase {
            SeasonPhase::RegularSeason => {
                let completed = self.events.count_completed_games(
                    &self.dynasty_id,
                    season,
                    SeasonType::RegularSeason,
                )?;
                Ok(f64::from(completed) >= f64::from(REGULAR_SEASON_GAME_COUNT) * 0.95)
            }
            SeasonPhase::Playoffs => Ok(self.events.count_completed_by_game_type(
                &self.dynasty_id,
                season,
                GameType::Conference,
            )? == 2),
            _ => Ok(false),
        }
    }

    /// The next scheduled offseason milestone after today, if any.
    pub fn next_offseason_milestone(&self) -> Result<Option<(String, Date)>> {
        let start = self.calendar.get().next_day();
        let horizon = start.add_days(i64::from(MAX_LOOP_DAYS));
        let upcoming = self.events.get_by_dynasty_and_timestamp(
            &self.dynasty_id,
            start.start_of_day_ms(),
            horizon.end_of_day_ms(),
            Some(crate::events::EventType::Milestone),
        )?;
        for event in upcoming {
            if !event.data.is_completed() {
                let milestone = MilestoneEvent::from_stored(&event)?;
                return Ok(Some((
                    milestone.params.milestone.display_name().to_string(),
                    milestone.date,
                )));
            }
        }
        Ok(None)
    }

    /// Record draft progress on the current season's state row.
    pub fn update_draft_progress(&self, current_pick: u32, in_progress: bool) -> Result<bool> {
        self.state.update_draft_progress(
            &self.dynasty_id,
            self.phase_state.season_year(),
            current_pick,
            in_progress,
        )
    }

    /// Test-only escape hatch: jump the phase without running a handler.
    #[cfg(test)]
    pub(crate) fn force_phase_transition(&mut self, to: SeasonPhase) -> Result<()> {
        let season = self.phase_state.season_year();
        self.state.update_phase(&self.dynasty_id, season, to)?;
        self.phase_state.set_phase(to);
        Ok(())
    }
}

impl std::fmt::Debug for SeasonCycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (phase, year) = self.phase_state.snapshot();
        f.debug_struct("SeasonCycleController")
            .field("dynasty_id", &self.dynasty_id)
            .field("phase", &phase)
            .field("season_year", &year)
            .field("current_date", &self.calendar.get())
            .finish()
    }
}
