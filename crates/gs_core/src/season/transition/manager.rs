//! Phase transition detection and execution.
//!
//! Detection is pure: `check_transition_needed` only reads state. Execution
//! owns the phase book-keeping; the handler owns all other side effects.
//! On handler failure the phase is rolled back and the original cause is
//! re-raised wrapped in a typed failure.

use std::collections::HashMap;
use std::sync::Arc;

use crate::calendar::phase::SeasonPhase;
use crate::calendar::phase_state::PhaseState;
use crate::error::Result;
use crate::season::completion::PhaseCompletionChecker;

use super::{
    PhaseTransition, TransitionError, TransitionHandler, TransitionKey, TransitionOutcome,
};

/// Drives the four legal edges of the phase state machine.
pub struct PhaseTransitionManager {
    phase_state: Arc<PhaseState>,
    checker: PhaseCompletionChecker,
    handlers: HashMap<TransitionKey, Box<dyn TransitionHandler>>,
    in_progress: bool,
    previous_phase: Option<SeasonPhase>,
}

impl PhaseTransitionManager {
    pub fn new(phase_state: Arc<PhaseState>, checker: PhaseCompletionChecker) -> Self {
        Self {
            phase_state,
            checker,
            handlers: HashMap::new(),
            in_progress: false,
            previous_phase: None,
        }
    }

    pub fn register_handler(&mut self, key: TransitionKey, handler: Box<dyn TransitionHandler>) {
        self.handlers.insert(key, handler);
    }

    pub fn has_handler(&self, key: TransitionKey) -> bool {
        self.handlers.contains_key(&key)
    }

    pub fn registered_keys(&self) -> Vec<TransitionKey> {
        TransitionKey::ALL
            .into_iter()
            .filter(|k| self.handlers.contains_key(k))
            .collect()
    }

    /// All four edges must have a handler before the manager is usable.
    pub fn validate_complete(&self) -> std::result::Result<(), TransitionError> {
        for key in TransitionKey::ALL {
            if !self.handlers.contains_key(&key) {
                return Err(TransitionError::MissingHandler(key));
            }
        }
        Ok(())
    }

    /// Detect whether the current phase is complete. Pure: reads state and
    /// the completion checker, mutates nothing.
    pub fn check_transition_needed(&self) -> Result<Option<PhaseTransition>> {
        let current = self.phase_state.phase();
        if !self.checker.is_phase_complete(current)? {
            return Ok(None);
        }
        let trigger = match current {
            SeasonPhase::Preseason => "preseason_complete",
            SeasonPhase::RegularSeason => "regular_season_complete",
            SeasonPhase::Playoffs => "playoffs_complete",
            SeasonPhase::Offseason => "offseason_complete",
        };
        Ok(Some(PhaseTransition::new(current, current.next(), trigger)))
    }

    /// Execute a transition through its registered handler. On success the
    /// shared phase state moves to the target phase (notifying listeners);
    /// on failure the handler's rollback runs, the phase is restored, and
    /// the original cause is wrapped.
    pub fn execute_transition(
        &mut self,
        transition: &PhaseTransition,
    ) -> std::result::Result<TransitionOutcome, TransitionError> {
        if self.in_progress {
            return Err(TransitionError::AlreadyInProgress);
        }
        let current = self.phase_state.phase();
        if transition.from_phase != current {
            return Err(TransitionError::PhaseMismatch {
                from: transition.from_phase,
                current,
            });
        }
        let key = TransitionKey::from_phases(transition.from_phase, transition.to_phase).ok_or(
            TransitionError::UnsupportedEdge {
                from: transition.from_phase,
                to: transition.to_phase,
            },
        )?;
        if !self.handlers.contains_key(&key) {
            return Err(TransitionError::MissingHandler(key));
        }

        self.in_progress = true;
        self.previous_phase = Some(current);
        log::info!("executing phase transition {transition}");

        let handler = self.handlers.get_mut(&key).expect("handler presence checked above");
        let result = handler.execute(transition);

        let outcome = match result {
            Ok(outcome) => {
                self.phase_state.set_phase(transition.to_phase);
                self.previous_phase = None;
                Ok(outcome)
            }
            Err(source) => {
                log::error!("transition '{key}' failed: {source:#}; rolling back");
                handler.rollback(transition);
                if let Some(previous) = self.previous_phase.take() {
                    self.phase_state.set_phase(previous);
                }
                Err(TransitionError::Failed { key, source })
            }
        };
        self.in_progress = false;
        outcome
    }
}
