//! Season-year synchronization.
//!
//! The season year lives in three places: the shared phase state, the
//! persisted dynasty state, and any component that caches it (the
//! simulation executor). This synchronizer changes all of them as one
//! ordered operation: database first, then registered components, then the
//! in-memory value. A database failure leaves memory untouched.

use std::sync::Arc;

use crate::calendar::phase_state::PhaseState;
use crate::db::dynasty_state::DynastyStateStore;
use crate::error::{Result, SyncError};

type YearSetter = Box<dyn Fn(i32)>;

pub struct SeasonYearSynchronizer {
    state: DynastyStateStore,
    phase_state: Arc<PhaseState>,
    dynasty_id: String,
    components: Vec<(String, YearSetter)>,
}

impl SeasonYearSynchronizer {
    pub fn new(
        state: DynastyStateStore,
        phase_state: Arc<PhaseState>,
        dynasty_id: impl Into<String>,
    ) -> Self {
        Self {
            state,
            phase_state,
            dynasty_id: dynasty_id.into(),
            components: Vec::new(),
        }
    }

    /// Register a subcomponent that caches the year. Setters are invoked in
    /// registration order on every change.
    pub fn register_component(&mut self, key: impl Into<String>, setter: impl Fn(i32) + 'static) {
        self.components.push((key.into(), Box::new(setter)));
    }

    /// Keys of the registered subcomponents, in call order.
    pub fn registry_status(&self) -> Vec<&str> {
        self.components.iter().map(|(k, _)| k.as_str()).collect()
    }

    fn update_components(&self, new_year: i32) {
        for (key, setter) in &self.components {
            setter(new_year);
            log::debug!("season year pushed to component '{key}': {new_year}");
        }
    }

    // Database write first. The latest row may already carry the new year
    // (the rollover handler creates it); otherwise the row is re-keyed.
    fn update_database_year(&self, new_year: i32) -> Result<()> {
        match self.state.get_latest(&self.dynasty_id)? {
            Some(latest) if latest.season == new_year => Ok(()),
            Some(_) => self.state.update_season(&self.dynasty_id, new_year),
            None => Err(SyncError::Persistence {
                operation: "season_year_update",
                reason: format!(
                    "no dynasty state exists for '{}' to carry season year {new_year}",
                    self.dynasty_id
                ),
            }),
        }
    }

    /// Atomically move the year everywhere. Ordered: database, registered
    /// components, in-memory value. On database failure nothing in memory
    /// changes.
    pub fn synchronize_year(&self, new_year: i32, reason: &str) -> Result<()> {
        let old_year = self.phase_state.season_year();
        self.update_database_year(new_year)?;
        self.update_components(new_year);
        self.phase_state.set_season_year(new_year);
        log::info!(
            "season year synchronized {old_year} -> {new_year} for dynasty '{}' ({reason})",
            self.dynasty_id
        );
        Ok(())
    }

    /// Convenience for `current + 1`.
    pub fn increment_year(&self, reason: &str) -> Result<i32> {
        let next = self.phase_state.season_year() + 1;
        self.synchronize_year(next, reason)?;
        Ok(next)
    }

    /// Drift recovery: when the database's latest year disagrees with the
    /// in-memory year, adopt the database value (without writing the
    /// database). Returns the adopted year when a correction happened.
    pub fn adopt_database_year(&self, context: &str) -> Result<Option<i32>> {
        let Some(latest) = self.state.get_latest(&self.dynasty_id)? else {
            return Ok(None);
        };
        let memory_year = self.phase_state.season_year();
        if latest.season == memory_year {
            return Ok(None);
        }
        log::warn!(
            "season year drift detected ({context}): memory {memory_year}, database {}; \
             adopting database value",
            latest.season
        );
        self.update_components(latest.season);
        self.phase_state.set_season_year(latest.season);
        Ok(Some(latest.season))
    }
}
