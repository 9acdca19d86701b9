//! # gs_core - NFL Franchise Season Cycle Engine
//!
//! This library drives the season cycle of a franchise-mode simulation:
//! it advances simulated time day by day, moves through the four season
//! phases (Preseason, Regular Season, Playoffs, Offseason) on event-based
//! completion conditions, executes the games and milestones due on each
//! date, and keeps a SQLite database in atomic agreement with in-memory
//! state across restarts and partial failures.
//!
//! ## Features
//! - Event-sourced calendar: one polymorphic event table drives all
//!   phase boundaries and daily work
//! - Fail-loud persistence with pre-write validation and post-write
//!   verification (drift detection and recovery)
//! - Explicit phase transition handlers with substep rollback
//! - Deterministic fast mode for full-season throughput testing

// Handler and store constructors wire many injected collaborators
#![allow(clippy::too_many_arguments)]

pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod season;
pub mod services;

// Re-export the main API surface
pub use calendar::{Date, PhaseBoundaryDetector, PhaseState, SeasonPhase};
pub use config::SimulationSettings;
pub use db::dynasty_state::{DynastyState, DynastyStateStore};
pub use db::event_store::{EventStore, StoredEvent};
pub use db::standings::{PlayerGameStats, StandingsStore, TeamStanding};
pub use db::sync::{DriftInfo, DriftSeverity, SyncValidator};
pub use db::transaction::{TransactionContext, TransactionMode, TransactionState};
pub use db::DatabaseConnection;
pub use error::{Result, SyncError};
pub use events::{EventPayload, EventType, GameEvent, MilestoneEvent, SeasonType};
pub use season::transition::{PhaseTransition, TransitionError, TransitionKey};
pub use season::{
    AdvanceSummary, ControllerConfig, DayResult, ExecutedTransition, PhaseInfo,
    SeasonCycleController, SeasonSummary,
};
pub use services::{GameResult, SeasonServices};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
