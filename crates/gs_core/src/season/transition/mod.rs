//! Phase transition model.
//!
//! The four legal edges of the phase state machine, each keyed by a closed
//! enum so missing handlers are caught at construction rather than at
//! transition time.

pub mod handlers;
pub mod manager;

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::calendar::phase::SeasonPhase;
use crate::season::SeasonSummary;

pub use manager::PhaseTransitionManager;

/// The four legal edges of the phase state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKey {
    PreseasonToRegularSeason,
    RegularSeasonToPlayoffs,
    PlayoffsToOffseason,
    OffseasonToPreseason,
}

impl TransitionKey {
    pub const ALL: [TransitionKey; 4] = [
        TransitionKey::PreseasonToRegularSeason,
        TransitionKey::RegularSeasonToPlayoffs,
        TransitionKey::PlayoffsToOffseason,
        TransitionKey::OffseasonToPreseason,
    ];

    /// The key for a `(from, to)` pair, or `None` for an illegal edge.
    pub fn from_phases(from: SeasonPhase, to: SeasonPhase) -> Option<Self> {
        match (from, to) {
            (SeasonPhase::Preseason, SeasonPhase::RegularSeason) => {
                Some(TransitionKey::PreseasonToRegularSeason)
            }
            (SeasonPhase::RegularSeason, SeasonPhase::Playoffs) => {
                Some(TransitionKey::RegularSeasonToPlayoffs)
            }
            (SeasonPhase::Playoffs, SeasonPhase::Offseason) => {
                Some(TransitionKey::PlayoffsToOffseason)
            }
            (SeasonPhase::Offseason, SeasonPhase::Preseason) => {
                Some(TransitionKey::OffseasonToPreseason)
            }
            _ => None,
        }
    }

    pub fn from_phase(&self) -> SeasonPhase {
        match self {
            TransitionKey::PreseasonToRegularSeason => SeasonPhase::Preseason,
            TransitionKey::RegularSeasonToPlayoffs => SeasonPhase::RegularSeason,
            TransitionKey::PlayoffsToOffseason => SeasonPhase::Playoffs,
            TransitionKey::OffseasonToPreseason => SeasonPhase::Offseason,
        }
    }

    pub fn to_phase(&self) -> SeasonPhase {
        self.from_phase().next()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKey::PreseasonToRegularSeason => "preseason_to_regular_season",
            TransitionKey::RegularSeasonToPlayoffs => "regular_season_to_playoffs",
            TransitionKey::PlayoffsToOffseason => "playoffs_to_offseason",
            TransitionKey::OffseasonToPreseason => "offseason_to_preseason",
        }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected phase transition, ready for execution.
#[derive(Debug, Clone)]
pub struct PhaseTransition {
    pub from_phase: SeasonPhase,
    pub to_phase: SeasonPhase,
    pub trigger: &'static str,
    pub metadata: Map<String, Value>,
}

impl PhaseTransition {
    pub fn new(from_phase: SeasonPhase, to_phase: SeasonPhase, trigger: &'static str) -> Self {
        Self {
            from_phase,
            to_phase,
            trigger,
            metadata: Map::new(),
        }
    }
}

impl fmt::Display for PhaseTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} (trigger: {})",
            self.from_phase, self.to_phase, self.trigger
        )
    }
}

/// What a transition handler hands back on success.
#[derive(Debug, Default)]
pub struct TransitionOutcome {
    /// Set by the season-rollover edge.
    pub new_season_year: Option<i32>,
    /// Set by the playoffs-to-offseason edge.
    pub season_summary: Option<SeasonSummary>,
}

/// One edge of the phase state machine.
///
/// `execute` performs the edge's side effects; `rollback` undoes exactly
/// the substeps that succeeded, best-effort, and never panics past the
/// caller.
pub trait TransitionHandler {
    fn execute(&mut self, transition: &PhaseTransition) -> anyhow::Result<TransitionOutcome>;

    fn rollback(&mut self, transition: &PhaseTransition);
}

/// Transition failures. `Failed` wraps the handler's original cause.
#[derive(Error, Debug)]
pub enum TransitionError {
    #[error("transition from '{from}' does not match current phase '{current}'")]
    PhaseMismatch {
        from: SeasonPhase,
        current: SeasonPhase,
    },

    #[error("unsupported phase transition: {from} -> {to}")]
    UnsupportedEdge { from: SeasonPhase, to: SeasonPhase },

    #[error("no handler registered for transition '{0}'")]
    MissingHandler(TransitionKey),

    #[error("another phase transition is already in progress")]
    AlreadyInProgress,

    #[error("transition '{key}' failed: {source:#}")]
    Failed {
        key: TransitionKey,
        source: anyhow::Error,
    },
}
