//! Simulation speed settings.
//!
//! Simple toggles that skip expensive operations. `true` skips the
//! operation (fast, for testing); `false` runs it normally.

use serde::{Deserialize, Serialize};

/// Controls which expensive subsystems run during daily advancement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Use deterministic placeholder scores instead of the play-by-play
    /// simulator (~0.001s per game instead of ~2-5s).
    pub skip_game_simulation: bool,

    /// Skip AI trade evaluation for all 32 teams.
    pub skip_transaction_ai: bool,

    /// Skip offseason milestone processing (franchise tags, free agency, ...).
    pub skip_offseason_events: bool,
}

impl SimulationSettings {
    /// Everything skipped: maximum throughput for batch simulation.
    pub fn fast() -> Self {
        Self {
            skip_game_simulation: true,
            skip_transaction_ai: true,
            skip_offseason_events: true,
        }
    }

    /// Everything enabled: realistic gameplay behavior.
    pub fn realistic() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_skips_everything() {
        let settings = SimulationSettings::fast();
        assert!(settings.skip_game_simulation);
        assert!(settings.skip_transaction_ai);
        assert!(settings.skip_offseason_events);
    }

    #[test]
    fn realistic_runs_everything() {
        assert_eq!(SimulationSettings::realistic(), SimulationSettings::default());
        assert!(!SimulationSettings::default().skip_game_simulation);
    }
}
