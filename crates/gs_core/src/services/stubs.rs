//! In-crate service fakes for tests.
//!
//! Deterministic, database-backed implementations of every collaborator
//! trait, complete enough to drive a whole season cycle end-to-end: the
//! schedule generator emits exactly 48/272 games, and the playoff stub
//! seeds a real bracket and progresses it round by round.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use anyhow::{bail, ensure};
use serde_json::json;

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::config::SimulationSettings;
use crate::db::dynasty_state::DynastyStateStore;
use crate::db::event_store::{EventStore, StoredEvent};
use crate::db::standings::{conference_of, StandingsStore, TeamStanding};
use crate::db::DatabaseConnection;
use crate::events::{
    GameEvent, GameParameters, GameType, MilestoneEvent, MilestoneKind, SeasonType,
};
use crate::season::executor::SimulationExecutor;

use super::{
    ContractRollover, ContractService, DraftClassSummary, DraftService, FastGameSimulator,
    MilestoneScheduler, PlayoffController, PlayoffDayOutcome, PlayoffFactory, PlayoffSeeding,
    ScheduleGenerator, SeasonServices, TradeAi, TradeRecord, TradeWindowValidator,
};

pub(crate) fn stub_services(dynasty_id: &str, db: DatabaseConnection) -> SeasonServices {
    SeasonServices {
        simulator: Box::new(FastGameSimulator),
        schedule: Box::new(StubScheduleGenerator {
            dynasty_id: dynasty_id.to_string(),
        }),
        playoffs: Box::new(StubPlayoffFactory {
            dynasty_id: dynasty_id.to_string(),
            db: db.clone(),
            events: EventStore::new(db.clone()),
            standings: StandingsStore::new(db.clone()),
            state: DynastyStateStore::new(db),
        }),
        trade_ai: Box::new(StubTradeAi),
        trade_window: Box::new(StubTradeWindow),
        contracts: Box::new(StubContractService),
        draft: Box::new(StubDraftService::default()),
        milestones: Box::new(StubMilestoneScheduler),
    }
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

pub(crate) struct StubScheduleGenerator {
    dynasty_id: String,
}

impl StubScheduleGenerator {
    fn game(
        &self,
        game_id: String,
        date: Date,
        season: i32,
        season_type: SeasonType,
        game_type: GameType,
        week: u32,
        home: u32,
        away: u32,
    ) -> GameEvent {
        GameEvent::scheduled(
            game_id,
            self.dynasty_id.clone(),
            date,
            GameParameters {
                season,
                season_type,
                week,
                home_team_id: home,
                away_team_id: away,
                game_type,
            },
        )
    }
}

impl ScheduleGenerator for StubScheduleGenerator {
    fn generate_preseason(&self, season: i32) -> anyhow::Result<Vec<GameEvent>> {
        let anchor = Date::first_thursday_of_august(season);
        let mut games = Vec::with_capacity(48);
        for week in 1..=3u32 {
            let date = anchor.add_days(i64::from(week) * 7);
            for slot in 0..16u32 {
                games.push(self.game(
                    format!("preseason_{season}_w{week}_g{slot:02}"),
                    date,
                    season,
                    SeasonType::Preseason,
                    GameType::Preseason,
                    week,
                    slot * 2 + 1,
                    slot * 2 + 2,
                ));
            }
        }
        Ok(games)
    }

    fn generate_regular_season(
        &self,
        season: i32,
        preseason_start: Date,
    ) -> anyhow::Result<Vec<GameEvent>> {
        let start = preseason_start.add_days(35);
        let mut games = Vec::with_capacity(272);
        for week in 1..=17u32 {
            let date = start.add_days(i64::from(week - 1) * 7);
            for slot in 0..16u32 {
                let (mut home, mut away) = (slot * 2 + 1, slot * 2 + 2);
                if week % 2 == 0 {
                    std::mem::swap(&mut home, &mut away);
                }
                games.push(self.game(
                    format!("{season}_w{week:02}_g{slot:02}"),
                    date,
                    season,
                    SeasonType::RegularSeason,
                    GameType::Regular,
                    week,
                    home,
                    away,
                ));
            }
        }
        Ok(games)
    }
}

// ---------------------------------------------------------------------------
// Playoffs
// ---------------------------------------------------------------------------

pub(crate) struct StubPlayoffFactory {
    dynasty_id: String,
    db: DatabaseConnection,
    events: EventStore,
    standings: StandingsStore,
    state: DynastyStateStore,
}

impl StubPlayoffFactory {
    fn current_season(&self) -> anyhow::Result<i32> {
        match self.state.get_latest(&self.dynasty_id)? {
            Some(state) => Ok(state.season),
            None => bail!("no dynasty state to derive the playoff season from"),
        }
    }

    fn build(&self, seeding: PlayoffSeeding, season: i32) -> StubPlayoffController {
        StubPlayoffController {
            dynasty_id: self.dynasty_id.clone(),
            season,
            events: self.events.clone(),
            seeding,
            executor: SimulationExecutor::new(
                self.db.clone(),
                self.events.clone(),
                self.standings.clone(),
                self.dynasty_id.clone(),
                season,
                SimulationSettings::fast(),
            ),
        }
    }
}

impl PlayoffFactory for StubPlayoffFactory {
    fn seed_playoffs(&self, standings: &[TeamStanding]) -> anyhow::Result<PlayoffSeeding> {
        let mut afc: Vec<&TeamStanding> = standings
            .iter()
            .filter(|s| conference_of(s.team_id) == 0)
            .collect();
        let mut nfc: Vec<&TeamStanding> = standings
            .iter()
            .filter(|s| conference_of(s.team_id) == 1)
            .collect();
        let by_record = |s: &&TeamStanding| {
            (
                std::cmp::Reverse(s.wins),
                std::cmp::Reverse(s.points_for as i64 - s.points_against as i64),
                s.team_id,
            )
        };
        afc.sort_by_key(by_record);
        nfc.sort_by_key(by_record);
        Ok(PlayoffSeeding {
            afc: afc.iter().take(7).map(|s| s.team_id).collect(),
            nfc: nfc.iter().take(7).map(|s| s.team_id).collect(),
        })
    }

    fn create_controller(
        &self,
        seeding: &PlayoffSeeding,
    ) -> anyhow::Result<Box<dyn PlayoffController>> {
        ensure!(
            seeding.afc.len() == 7 && seeding.nfc.len() == 7,
            "seeding must carry 7 teams per conference"
        );
        let season = self.current_season()?;
        let controller = self.build(seeding.clone(), season);
        controller.schedule_wildcard_round()?;
        Ok(Box::new(controller))
    }

    fn restore_controller(&self) -> anyhow::Result<Option<Box<dyn PlayoffController>>> {
        let season = self.current_season()?;
        let scheduled = self
            .events
            .count_scheduled_games(&self.dynasty_id, season, SeasonType::Playoffs)?;
        if scheduled == 0 {
            return Ok(None);
        }
        let standings = self
            .standings
            .get(&self.dynasty_id, season, SeasonType::RegularSeason)?;
        let seeding = self.seed_playoffs(&standings)?;
        Ok(Some(Box::new(self.build(seeding, season))))
    }
}

pub(crate) struct StubPlayoffController {
    dynasty_id: String,
    season: i32,
    events: EventStore,
    seeding: PlayoffSeeding,
    executor: SimulationExecutor,
}

impl StubPlayoffController {
    fn playoff_games(&self) -> anyhow::Result<Vec<GameEvent>> {
        let all = self
            .events
            .get_by_dynasty(&self.dynasty_id, Some(crate::events::EventType::Game), None)?;
        let mut games = Vec::new();
        for stored in &all {
            let game = GameEvent::from_stored(stored)?;
            if game.params.season == self.season
                && game.params.season_type == SeasonType::Playoffs
            {
                games.push(game);
            }
        }
        Ok(games)
    }

    fn round_games<'a>(games: &'a [GameEvent], round: GameType) -> Vec<&'a GameEvent> {
        games.iter().filter(|g| g.params.game_type == round).collect()
    }

    fn round_winners(&self, games: &[GameEvent], round: GameType) -> Vec<u32> {
        let mut winners: Vec<(usize, u32)> = Vec::new();
        for game in Self::round_games(games, round) {
            if let Some(result) = &game.result {
                if let Some(winner) = result.winner_team_id {
                    winners.push((self.seed_index(winner), winner));
                }
            }
        }
        winners.sort();
        winners.into_iter().map(|(_, team)| team).collect()
    }

    fn seed_index(&self, team: u32) -> usize {
        self.seeding
            .afc
            .iter()
            .chain(self.seeding.nfc.iter())
            .position(|&t| t == team)
            .unwrap_or(usize::MAX)
    }

    fn conference_winners(&self, games: &[GameEvent], round: GameType, conference: u32) -> Vec<u32> {
        self.round_winners(games, round)
            .into_iter()
            .filter(|&t| conference_of(t) == conference)
            .collect()
    }

    fn schedule_round(&self, matchups: &[(u32, u32)], round: GameType, week: u32, date: Date) -> anyhow::Result<()> {
        let mut batch: Vec<StoredEvent> = Vec::new();
        for (i, &(home, away)) in matchups.iter().enumerate() {
            let game = GameEvent::scheduled(
                format!("playoff_{}_{}_{i}", round, self.season),
                self.dynasty_id.clone(),
                date,
                GameParameters {
                    season: self.season,
                    season_type: SeasonType::Playoffs,
                    week,
                    home_team_id: home,
                    away_team_id: away,
                    game_type: round,
                },
            );
            batch.push(game.to_stored()?);
        }
        self.events.insert_batch(&batch)?;
        Ok(())
    }

    fn schedule_wildcard_round(&self) -> anyhow::Result<()> {
        let last_regular = self
            .events
            .game_date_bounds(&self.dynasty_id, SeasonType::RegularSeason, Some(self.season))?
            .map(|(_, last)| last);
        let Some(last) = last_regular else {
            bail!("no regular-season games to anchor the playoff start");
        };
        let date = last.add_days(7);
        let mut matchups = Vec::new();
        for conference in [&self.seeding.afc, &self.seeding.nfc] {
            // Seeds 2v7, 3v6, 4v5; the top seed rests
            matchups.push((conference[1], conference[6]));
            matchups.push((conference[2], conference[5]));
            matchups.push((conference[3], conference[4]));
        }
        self.schedule_round(&matchups, GameType::Wildcard, 1, date)
    }

    fn round_date(games: &[GameEvent], round: GameType) -> Option<Date> {
        Self::round_games(games, round).iter().map(|g| g.date).max()
    }

    fn advance_bracket(&self) -> anyhow::Result<()> {
        let games = self.playoff_games()?;

        let wildcard_done = self.round_winners(&games, GameType::Wildcard).len() == 6;
        if wildcard_done && Self::round_games(&games, GameType::Divisional).is_empty() {
            let date = Self::round_date(&games, GameType::Wildcard)
                .map(|d| d.add_days(7))
                .expect("wildcard round has games");
            let mut matchups = Vec::new();
            for (conference, seeds) in [(0u32, &self.seeding.afc), (1u32, &self.seeding.nfc)] {
                let mut advancing = self.conference_winners(&games, GameType::Wildcard, conference);
                // Top seed hosts the worst surviving seed
                let worst = advancing.pop().expect("three wildcard winners");
                matchups.push((seeds[0], worst));
                matchups.push((advancing[0], advancing[1]));
            }
            self.schedule_round(&matchups, GameType::Divisional, 2, date)?;
        }

        let games = self.playoff_games()?;
        let divisional_done = self.round_winners(&games, GameType::Divisional).len() == 4;
        if divisional_done && Self::round_games(&games, GameType::Conference).is_empty() {
            let date = Self::round_date(&games, GameType::Divisional)
                .map(|d| d.add_days(7))
                .expect("divisional round has games");
            let mut matchups = Vec::new();
            for conference in [0u32, 1u32] {
                let survivors = self.conference_winners(&games, GameType::Divisional, conference);
                matchups.push((survivors[0], survivors[1]));
            }
            self.schedule_round(&matchups, GameType::Conference, 3, date)?;
        }

        let games = self.playoff_games()?;
        let conference_done = self.round_winners(&games, GameType::Conference).len() == 2;
        if conference_done && Self::round_games(&games, GameType::SuperBowl).is_empty() {
            let date = Self::round_date(&games, GameType::Conference)
                .map(|d| d.add_days(7))
                .expect("conference round has games");
            let afc_champ = self.conference_winners(&games, GameType::Conference, 0)[0];
            let nfc_champ = self.conference_winners(&games, GameType::Conference, 1)[0];
            self.schedule_round(&[(afc_champ, nfc_champ)], GameType::SuperBowl, 4, date)?;
        }

        Ok(())
    }
}

impl PlayoffController for StubPlayoffController {
    fn simulate_day(&mut self, date: Date) -> anyhow::Result<PlayoffDayOutcome> {
        let outcome = self.executor.simulate_games_for(date, &FastGameSimulator)?;
        self.advance_bracket()?;
        Ok(PlayoffDayOutcome {
            games_played: outcome.games_played,
            results: outcome.results,
        })
    }

    fn is_super_bowl_complete(&self) -> bool {
        self.events
            .count_completed_by_game_type(&self.dynasty_id, self.season, GameType::SuperBowl)
            .map(|n| n >= 1)
            .unwrap_or(false)
    }

    fn super_bowl_winner(&self) -> Option<u32> {
        let games = self.playoff_games().ok()?;
        Self::round_games(&games, GameType::SuperBowl)
            .first()
            .and_then(|g| g.result.as_ref())
            .and_then(|r| r.winner_team_id)
    }

    fn super_bowl_date(&self) -> Option<Date> {
        let games = self.playoff_games().ok()?;
        Self::round_games(&games, GameType::SuperBowl)
            .first()
            .map(|g| g.date)
    }
}

// ---------------------------------------------------------------------------
// Trades, contracts, draft, milestones
// ---------------------------------------------------------------------------

pub(crate) struct StubTradeWindow;

impl TradeWindowValidator for StubTradeWindow {
    fn is_trade_allowed(&self, _date: Date, phase: SeasonPhase, week: u32) -> (bool, String) {
        match phase {
            SeasonPhase::RegularSeason if week <= 8 => (true, String::new()),
            SeasonPhase::RegularSeason => (false, "past the trade deadline".into()),
            SeasonPhase::Playoffs => (false, "no trades during the playoffs".into()),
            _ => (false, "league year not open for trades".into()),
        }
    }
}

pub(crate) struct StubTradeAi;

impl TradeAi for StubTradeAi {
    fn evaluate_daily_for_all_teams(
        &self,
        phase: SeasonPhase,
        week: u32,
    ) -> anyhow::Result<Vec<TradeRecord>> {
        if phase == SeasonPhase::RegularSeason && week <= 8 {
            Ok(vec![TradeRecord {
                teams: (1, 2),
                description: "conditional late-round pick swap".into(),
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

pub(crate) struct StubContractService;

impl ContractService for StubContractService {
    fn increment_all_contracts(&self, _new_season: i32) -> anyhow::Result<ContractRollover> {
        Ok(ContractRollover {
            total: 2100,
            active: 1800,
            expired: 300,
        })
    }
}

#[derive(Default)]
pub(crate) struct StubDraftService {
    classes: RefCell<HashSet<i32>>,
    orders: RefCell<HashMap<i32, Vec<u32>>>,
}

impl DraftService for StubDraftService {
    fn has_class(&self, season: i32) -> anyhow::Result<bool> {
        Ok(self.classes.borrow().contains(&season))
    }

    fn prepare_class(&self, season: i32, size: u32) -> anyhow::Result<DraftClassSummary> {
        self.classes.borrow_mut().insert(season);
        Ok(DraftClassSummary {
            class_id: format!("class_{season}"),
            total_players: size,
            elapsed_ms: 42,
        })
    }

    fn store_draft_order(&self, season: i32, order: &[u32]) -> anyhow::Result<()> {
        ensure!(order.len() == 32, "draft order must cover 32 teams");
        self.orders.borrow_mut().insert(season, order.to_vec());
        Ok(())
    }
}

pub(crate) struct StubMilestoneScheduler;

const MILESTONE_OFFSETS: [(MilestoneKind, i64); 6] = [
    (MilestoneKind::FranchiseTagDeadline, 22),
    (MilestoneKind::FreeAgencyOpen, 32),
    (MilestoneKind::DraftDay, 80),
    (MilestoneKind::RookieMinicamp, 95),
    (MilestoneKind::TrainingCampOpen, 150),
    (MilestoneKind::RosterCuts, 165),
];

impl MilestoneScheduler for StubMilestoneScheduler {
    fn schedule_offseason_events(
        &self,
        super_bowl_date: Date,
        season: i32,
        dynasty_id: &str,
        events: &EventStore,
    ) -> anyhow::Result<Vec<String>> {
        let mut inserted = Vec::new();
        for (kind, offset) in MILESTONE_OFFSETS {
            let milestone = MilestoneEvent::scheduled(
                dynasty_id,
                super_bowl_date.add_days(offset),
                season,
                kind,
            );
            if events
                .get_by_game_id_and_dynasty(&milestone.storage_key(), dynasty_id)?
                .is_empty()
            {
                let stored = milestone.to_stored()?;
                events.insert(&stored)?;
                inserted.push(stored.event_id);
            }
        }
        Ok(inserted)
    }

    fn execute_milestone(&self, event: &StoredEvent) -> anyhow::Result<serde_json::Value> {
        Ok(json!({ "executed": true, "milestone": event.game_id }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_stub_emits_exact_counts() {
        let generator = StubScheduleGenerator {
            dynasty_id: "d1".into(),
        };
        let preseason = generator.generate_preseason(2024).unwrap();
        assert_eq!(preseason.len(), 48);
        assert!(preseason.iter().all(|g| g.game_id.starts_with("preseason_")));

        let regular = generator
            .generate_regular_season(2024, Date::first_thursday_of_august(2024))
            .unwrap();
        assert_eq!(regular.len(), 272);
        let weeks: HashSet<u32> = regular.iter().map(|g| g.params.week).collect();
        assert_eq!(weeks.len(), 17);
    }

    #[test]
    fn wildcard_pairings_follow_the_seeds() {
        let standings: Vec<TeamStanding> = (1..=32)
            .map(|team_id| TeamStanding {
                team_id,
                wins: team_id % 17,
                losses: 17 - team_id % 17,
                ..Default::default()
            })
            .collect();
        let db = DatabaseConnection::open_in_memory().unwrap();
        let factory = StubPlayoffFactory {
            dynasty_id: "d1".into(),
            db: db.clone(),
            events: EventStore::new(db.clone()),
            standings: StandingsStore::new(db.clone()),
            state: DynastyStateStore::new(db),
        };
        let seeding = factory.seed_playoffs(&standings).unwrap();
        assert_eq!(seeding.afc.len(), 7);
        assert_eq!(seeding.nfc.len(), 7);
        assert!(seeding.afc.iter().all(|&t| t <= 16));
        assert!(seeding.nfc.iter().all(|&t| t > 16));
        // Team 16 has 16 wins and tops the AFC
        assert_eq!(seeding.afc[0], 16);
    }
}
