//! Season phase tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// The four NFL season phases. The canonical serialization is the lowercase
/// snake form (`"regular_season"`); parsing additionally accepts display
/// forms and is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonPhase {
    Preseason,
    RegularSeason,
    Playoffs,
    Offseason,
}

impl SeasonPhase {
    pub const ALL: [SeasonPhase; 4] = [
        SeasonPhase::Preseason,
        SeasonPhase::RegularSeason,
        SeasonPhase::Playoffs,
        SeasonPhase::Offseason,
    ];

    /// Canonical persistence form.
    pub fn as_str(&self) -> &'static str {
        match self {
            SeasonPhase::Preseason => "preseason",
            SeasonPhase::RegularSeason => "regular_season",
            SeasonPhase::Playoffs => "playoffs",
            SeasonPhase::Offseason => "offseason",
        }
    }

    /// Human-readable display form.
    pub fn display_name(&self) -> &'static str {
        match self {
            SeasonPhase::Preseason => "Preseason",
            SeasonPhase::RegularSeason => "Regular Season",
            SeasonPhase::Playoffs => "Playoffs",
            SeasonPhase::Offseason => "Offseason",
        }
    }

    /// Parse either the canonical lowercase form or a display form,
    /// case-insensitively.
    pub fn parse(value: &str) -> Result<Self, SyncError> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "preseason" => Ok(SeasonPhase::Preseason),
            "regular_season" => Ok(SeasonPhase::RegularSeason),
            "playoffs" => Ok(SeasonPhase::Playoffs),
            "offseason" => Ok(SeasonPhase::Offseason),
            _ => Err(SyncError::State(format!(
                "invalid season phase '{value}' (expected one of: preseason, \
                 regular_season, playoffs, offseason)"
            ))),
        }
    }

    /// The phase that follows this one in the season cycle.
    pub fn next(&self) -> SeasonPhase {
        match self {
            SeasonPhase::Preseason => SeasonPhase::RegularSeason,
            SeasonPhase::RegularSeason => SeasonPhase::Playoffs,
            SeasonPhase::Playoffs => SeasonPhase::Offseason,
            SeasonPhase::Offseason => SeasonPhase::Preseason,
        }
    }
}

impl fmt::Display for SeasonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonPhase {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeasonPhase::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_all_spellings() {
        assert_eq!(SeasonPhase::parse("preseason").unwrap(), SeasonPhase::Preseason);
        assert_eq!(SeasonPhase::parse("PRESEASON").unwrap(), SeasonPhase::Preseason);
        assert_eq!(
            SeasonPhase::parse("Regular Season").unwrap(),
            SeasonPhase::RegularSeason
        );
        assert_eq!(
            SeasonPhase::parse("regular-season").unwrap(),
            SeasonPhase::RegularSeason
        );
        assert!(SeasonPhase::parse("postseason").is_err());
    }

    #[test]
    fn canonical_forms_round_trip() {
        for phase in SeasonPhase::ALL {
            assert_eq!(SeasonPhase::parse(phase.as_str()).unwrap(), phase);
            assert_eq!(SeasonPhase::parse(phase.display_name()).unwrap(), phase);
        }
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&SeasonPhase::RegularSeason).unwrap();
        assert_eq!(json, "\"regular_season\"");
        let back: SeasonPhase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SeasonPhase::RegularSeason);
    }

    #[test]
    fn cycle_order() {
        assert_eq!(SeasonPhase::Preseason.next(), SeasonPhase::RegularSeason);
        assert_eq!(SeasonPhase::RegularSeason.next(), SeasonPhase::Playoffs);
        assert_eq!(SeasonPhase::Playoffs.next(), SeasonPhase::Offseason);
        assert_eq!(SeasonPhase::Offseason.next(), SeasonPhase::Preseason);
    }
}
