//! Calendar primitives: dates, season phases, shared phase state, and
//! event-derived phase boundaries.

pub mod boundary;
pub mod date;
pub mod phase;
pub mod phase_state;

pub use boundary::PhaseBoundaryDetector;
pub use date::Date;
pub use phase::SeasonPhase;
pub use phase_state::{ListenerId, PhaseState};
