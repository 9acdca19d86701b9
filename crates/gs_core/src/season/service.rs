//! Season rollover service.
//!
//! Orchestrates the three steps of crossing into a new league year: the
//! year synchronization itself, the league-wide contract rollover, and
//! draft-class preparation. Each step surfaces its own typed failure; the
//! rollover handler decides whether to unwind the whole edge.

use std::rc::Rc;

use crate::error::{Result, SyncError};
use crate::services::{ContractRollover, DraftClassSummary, SeasonServices};

use super::year_sync::SeasonYearSynchronizer;

/// Prospects generated per draft class.
pub const DRAFT_CLASS_SIZE: u32 = 300;

/// What a completed year transition produced.
#[derive(Debug, Clone, PartialEq)]
pub struct YearTransitionReport {
    pub new_year: i32,
    pub contracts: ContractRollover,
    pub draft: DraftClassSummary,
}

pub struct SeasonTransitionService {
    synchronizer: Rc<SeasonYearSynchronizer>,
    services: Rc<SeasonServices>,
}

impl SeasonTransitionService {
    pub fn new(synchronizer: Rc<SeasonYearSynchronizer>, services: Rc<SeasonServices>) -> Self {
        Self {
            synchronizer,
            services,
        }
    }

    /// Run the full year transition, ordered: year sync, contract
    /// increment, draft-class generation (synchronous, seconds-scale).
    pub fn execute_year_transition(&self, new_year: i32) -> Result<YearTransitionReport> {
        self.synchronizer
            .synchronize_year(new_year, "season rollover")?;

        let contracts = self
            .services
            .contracts
            .increment_all_contracts(new_year)
            .map_err(SyncError::from)?;
        log::info!(
            "contract rollover for {new_year}: {} total, {} active, {} expired",
            contracts.total,
            contracts.active,
            contracts.expired
        );

        let draft = self
            .services
            .draft
            .prepare_class(new_year, DRAFT_CLASS_SIZE)
            .map_err(SyncError::from)?;
        log::info!(
            "draft class '{}' prepared for {new_year}: {} prospects in {}ms",
            draft.class_id,
            draft.total_players,
            draft.elapsed_ms
        );

        Ok(YearTransitionReport {
            new_year,
            contracts,
            draft,
        })
    }
}
