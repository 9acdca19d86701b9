//! Phase completion predicates.
//!
//! Pure logic over injected data functions, so the predicates are testable
//! without a database. Game phases complete on a count primary check with a
//! date fallback; playoffs complete with the Super Bowl; the offseason
//! completes when the calendar reaches the next preseason start.

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::error::Result;

/// 32 teams x 17 games / 2.
pub const REGULAR_SEASON_GAME_COUNT: u32 = 272;
/// 32 teams x 3 games / 2.
pub const PRESEASON_GAME_COUNT: u32 = 48;
/// 6 wildcard + 4 divisional + 2 conference + 1 Super Bowl.
pub const PLAYOFF_GAME_COUNT: u32 = 13;

pub type CountFn = Box<dyn Fn() -> Result<u32>>;
pub type DateFn = Box<dyn Fn() -> Date>;
pub type OptionalDateFn = Box<dyn Fn() -> Result<Option<Date>>>;
pub type FlagFn = Box<dyn Fn() -> bool>;

/// Decides whether the current phase is complete.
///
/// All state is supplied by the injected functions at call time; the
/// checker itself holds nothing mutable.
pub struct PhaseCompletionChecker {
    games_played: CountFn,
    current_date: DateFn,
    last_regular_season_game_date: OptionalDateFn,
    last_preseason_game_date: OptionalDateFn,
    super_bowl_complete: FlagFn,
    preseason_start_date: OptionalDateFn,
}

impl PhaseCompletionChecker {
    /// `games_played` must report the completed-game count for the phase
    /// currently being checked (and 0 for phases without games).
    pub fn new(
        games_played: CountFn,
        current_date: DateFn,
        last_regular_season_game_date: OptionalDateFn,
        last_preseason_game_date: OptionalDateFn,
        super_bowl_complete: FlagFn,
        preseason_start_date: OptionalDateFn,
    ) -> Self {
        Self {
            games_played,
            current_date,
            last_regular_season_game_date,
            last_preseason_game_date,
            super_bowl_complete,
            preseason_start_date,
        }
    }

    // Count is the primary check; the date fallback handles schedules where
    // counting is off. A missing last-game date means the phase cannot
    // complete by date.
    fn count_or_date_complete(
        &self,
        required: u32,
        last_game_date: &OptionalDateFn,
    ) -> Result<bool> {
        if (self.games_played)()? >= required {
            return Ok(true);
        }
        match last_game_date()? {
            Some(last) => Ok((self.current_date)() > last),
            None => Ok(false),
        }
    }

    /// 48 games played, or the calendar has passed the last preseason game.
    pub fn is_preseason_complete(&self) -> Result<bool> {
        self.count_or_date_complete(PRESEASON_GAME_COUNT, &self.last_preseason_game_date)
    }

    /// 272 games played, or the calendar has passed the last scheduled
    /// regular-season game.
    pub fn is_regular_season_complete(&self) -> Result<bool> {
        self.count_or_date_complete(
            REGULAR_SEASON_GAME_COUNT,
            &self.last_regular_season_game_date,
        )
    }

    /// The Super Bowl is the definitive end of the playoffs.
    pub fn is_playoffs_complete(&self) -> Result<bool> {
        Ok((self.super_bowl_complete)())
    }

    /// The offseason ends when the calendar reaches the next preseason
    /// start (no games to count).
    pub fn is_offseason_complete(&self) -> Result<bool> {
        match (self.preseason_start_date)()? {
            Some(start) => Ok((self.current_date)() >= start),
            None => Ok(false),
        }
    }

    /// Completion of the given phase.
    pub fn is_phase_complete(&self, phase: SeasonPhase) -> Result<bool> {
        match phase {
            SeasonPhase::Preseason => self.is_preseason_complete(),
            SeasonPhase::RegularSeason => self.is_regular_season_complete(),
            SeasonPhase::Playoffs => self.is_playoffs_complete(),
            SeasonPhase::Offseason => self.is_offseason_complete(),
        }
    }
}
