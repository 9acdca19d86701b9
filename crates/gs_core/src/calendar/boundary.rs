//! Phase boundary derivation.
//!
//! Season boundaries are derived from the scheduled events rather than
//! hard-coded calendar dates, so the phase machine follows whatever
//! schedule was actually generated. Results are memoized until the next
//! schedule generation invalidates the cache.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::db::event_store::EventStore;
use crate::error::Result;
use crate::events::SeasonType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BoundsKey {
    season_type: SeasonType,
    season: Option<i32>,
}

/// Derives phase boundary dates from the event schedule for one dynasty.
pub struct PhaseBoundaryDetector {
    events: EventStore,
    dynasty_id: String,
    cache: Mutex<HashMap<BoundsKey, Option<(Date, Date)>>>,
}

impl PhaseBoundaryDetector {
    pub fn new(events: EventStore, dynasty_id: impl Into<String>) -> Self {
        Self {
            events,
            dynasty_id: dynasty_id.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Drop memoized boundaries. Call after any schedule generation.
    pub fn invalidate_cache(&self) {
        self.cache.lock().unwrap().clear();
    }

    fn bounds(&self, season_type: SeasonType, season: Option<i32>) -> Result<Option<(Date, Date)>> {
        let key = BoundsKey {
            season_type,
            season,
        };
        if let Some(cached) = self.cache.lock().unwrap().get(&key) {
            return Ok(*cached);
        }
        let bounds = self
            .events
            .game_date_bounds(&self.dynasty_id, season_type, season)?;
        self.cache.lock().unwrap().insert(key, bounds);
        Ok(bounds)
    }

    fn season_type_of(phase: SeasonPhase) -> Option<SeasonType> {
        match phase {
            SeasonPhase::Preseason => Some(SeasonType::Preseason),
            SeasonPhase::RegularSeason => Some(SeasonType::RegularSeason),
            SeasonPhase::Playoffs => Some(SeasonType::Playoffs),
            SeasonPhase::Offseason => None,
        }
    }

    /// Earliest scheduled game date in the given phase.
    pub fn first_game_date(&self, phase: SeasonPhase, season: Option<i32>) -> Result<Option<Date>> {
        match Self::season_type_of(phase) {
            Some(st) => Ok(self.bounds(st, season)?.map(|(first, _)| first)),
            None => Ok(None),
        }
    }

    /// Latest scheduled game date in the given phase.
    pub fn last_game_date(&self, phase: SeasonPhase, season: Option<i32>) -> Result<Option<Date>> {
        match Self::season_type_of(phase) {
            Some(st) => Ok(self.bounds(st, season)?.map(|(_, last)| last)),
            None => Ok(None),
        }
    }

    /// Start date of a phase: its first game. For the preseason, falls back
    /// to the first Thursday of August when no games are scheduled yet.
    pub fn phase_start_date(&self, phase: SeasonPhase, season: Option<i32>) -> Result<Option<Date>> {
        if let Some(date) = self.first_game_date(phase, season)? {
            return Ok(Some(date));
        }
        if phase == SeasonPhase::Preseason {
            if let Some(year) = season {
                return Ok(Some(Date::first_thursday_of_august(year)));
            }
        }
        Ok(None)
    }

    /// The week after the last regular-season game.
    pub fn playoff_start_date(&self, season: Option<i32>) -> Result<Option<Date>> {
        Ok(self
            .last_game_date(SeasonPhase::RegularSeason, season)?
            .map(|d| d.add_days(7)))
    }

    /// Season year for a date; August 1 starts a new season year.
    pub fn derive_season_year(&self, date: Date) -> i32 {
        date.season_year()
    }

    /// The phase a date falls in, based on the scheduled games:
    /// before the first preseason game is offseason, then each segment runs
    /// from its first game until the next segment begins.
    pub fn phase_for_date(&self, date: Date, season: Option<i32>) -> Result<SeasonPhase> {
        let first_preseason = self.first_game_date(SeasonPhase::Preseason, season)?;
        let first_regular = self.first_game_date(SeasonPhase::RegularSeason, season)?;
        let last_regular = self.last_game_date(SeasonPhase::RegularSeason, season)?;
        let first_playoff = self.first_game_date(SeasonPhase::Playoffs, season)?;
        let last_playoff = self.last_game_date(SeasonPhase::Playoffs, season)?;

        if let Some(first_rs) = first_regular {
            if date >= first_rs {
                if let Some(last_rs) = last_regular {
                    if date <= last_rs {
                        return Ok(SeasonPhase::RegularSeason);
                    }
                }
                if let Some(last_po) = last_playoff {
                    if date > last_po {
                        return Ok(SeasonPhase::Offseason);
                    }
                }
                if let Some(first_po) = first_playoff {
                    if date >= first_po {
                        return Ok(SeasonPhase::Playoffs);
                    }
                }
                // Between the last regular-season game and the first playoff
                // game: still the regular season's transition window.
                return Ok(SeasonPhase::RegularSeason);
            }
        }
        if let Some(first_ps) = first_preseason {
            if date >= first_ps {
                return Ok(SeasonPhase::Preseason);
            }
        }
        Ok(SeasonPhase::Offseason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConnection;
    use crate::events::{GameEvent, GameParameters, GameType};

    fn insert_game(events: &EventStore, game_id: &str, date: Date, game_type: GameType) {
        let stored = GameEvent::scheduled(
            game_id,
            "d1",
            date,
            GameParameters {
                season: 2024,
                season_type: game_type.season_type(),
                week: 1,
                home_team_id: 1,
                away_team_id: 2,
                game_type,
            },
        )
        .to_stored()
        .unwrap();
        events.insert(&stored).unwrap();
    }

    fn setup() -> (EventStore, PhaseBoundaryDetector) {
        let db = DatabaseConnection::open_in_memory().unwrap();
        {
            let conn = db.lock();
            conn.execute(
                "INSERT INTO dynasties (dynasty_id, dynasty_name) VALUES ('d1', 'Test')",
                [],
            )
            .unwrap();
        }
        let events = EventStore::new(db);
        let detector = PhaseBoundaryDetector::new(events.clone(), "d1");
        (events, detector)
    }

    fn date(s: &str) -> Date {
        Date::parse(s).unwrap()
    }

    #[test]
    fn boundaries_follow_the_schedule() {
        let (events, detector) = setup();
        insert_game(&events, "preseason_1", date("2024-08-08"), GameType::Preseason);
        insert_game(&events, "preseason_2", date("2024-08-22"), GameType::Preseason);
        insert_game(&events, "rs_1", date("2024-09-05"), GameType::Regular);
        insert_game(&events, "rs_2", date("2025-01-05"), GameType::Regular);
        insert_game(&events, "playoff_wc_1", date("2025-01-12"), GameType::Wildcard);

        assert_eq!(
            detector.first_game_date(SeasonPhase::Preseason, Some(2024)).unwrap(),
            Some(date("2024-08-08"))
        );
        assert_eq!(
            detector.last_game_date(SeasonPhase::Preseason, Some(2024)).unwrap(),
            Some(date("2024-08-22"))
        );
        assert_eq!(
            detector.last_game_date(SeasonPhase::RegularSeason, Some(2024)).unwrap(),
            Some(date("2025-01-05"))
        );
        assert_eq!(
            detector.playoff_start_date(Some(2024)).unwrap(),
            Some(date("2025-01-12"))
        );
    }

    #[test]
    fn preseason_start_falls_back_to_first_thursday() {
        let (_events, detector) = setup();
        assert_eq!(
            detector.phase_start_date(SeasonPhase::Preseason, Some(2025)).unwrap(),
            Some(date("2025-08-07"))
        );
        assert_eq!(
            detector.phase_start_date(SeasonPhase::Playoffs, Some(2025)).unwrap(),
            None
        );
    }

    #[test]
    fn phase_for_date_walks_the_season() {
        let (events, detector) = setup();
        insert_game(&events, "preseason_1", date("2024-08-08"), GameType::Preseason);
        insert_game(&events, "rs_first", date("2024-09-05"), GameType::Regular);
        insert_game(&events, "rs_last", date("2025-01-05"), GameType::Regular);
        insert_game(&events, "playoff_sb", date("2025-02-09"), GameType::SuperBowl);
        detector.invalidate_cache();

        assert_eq!(
            detector.phase_for_date(date("2024-07-15"), Some(2024)).unwrap(),
            SeasonPhase::Offseason
        );
        assert_eq!(
            detector.phase_for_date(date("2024-08-20"), Some(2024)).unwrap(),
            SeasonPhase::Preseason
        );
        assert_eq!(
            detector.phase_for_date(date("2024-11-01"), Some(2024)).unwrap(),
            SeasonPhase::RegularSeason
        );
        assert_eq!(
            detector.phase_for_date(date("2025-02-09"), Some(2024)).unwrap(),
            SeasonPhase::Playoffs
        );
        assert_eq!(
            detector.phase_for_date(date("2025-03-01"), Some(2024)).unwrap(),
            SeasonPhase::Offseason
        );
    }

    #[test]
    fn cache_invalidation_sees_new_schedule() {
        let (events, detector) = setup();
        assert_eq!(detector.first_game_date(SeasonPhase::Preseason, Some(2024)).unwrap(), None);

        insert_game(&events, "preseason_1", date("2024-08-08"), GameType::Preseason);
        // Memoized miss until invalidated
        assert_eq!(detector.first_game_date(SeasonPhase::Preseason, Some(2024)).unwrap(), None);
        detector.invalidate_cache();
        assert_eq!(
            detector.first_game_date(SeasonPhase::Preseason, Some(2024)).unwrap(),
            Some(date("2024-08-08"))
        );
    }

    #[test]
    fn year_derivation_delegates_to_the_boundary_rule() {
        let (_events, detector) = setup();
        assert_eq!(detector.derive_season_year(date("2024-08-01")), 2024);
        assert_eq!(detector.derive_season_year(date("2025-02-09")), 2024);
    }
}
