//! Calendar/database drift detection.
//!
//! Before the engine writes a day's state it validates that the in-memory
//! calendar and the persisted dynasty state still agree; after the write it
//! reads the state back and verifies the write landed. The validator only
//! observes and classifies; recovery decisions belong to the caller.

use std::fmt;

use crate::calendar::date::Date;
use crate::calendar::phase::SeasonPhase;
use crate::error::{Result, SyncError};

use super::dynasty_state::DynastyStateStore;

/// Default maximum drift (in days) tolerated by pre-sync validation.
pub const DEFAULT_MAX_ACCEPTABLE_DRIFT: i64 = 3;

/// Classified magnitude of calendar/database drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftSeverity {
    None,
    Minor,
    Major,
    Severe,
}

impl DriftSeverity {
    /// Classify a signed drift (calendar minus database, in days).
    /// Backwards drift (database ahead of the calendar) is always severe.
    pub fn classify(drift_days: i64) -> Self {
        match drift_days {
            0 => DriftSeverity::None,
            1..=3 => DriftSeverity::Minor,
            4..=20 => DriftSeverity::Major,
            _ => DriftSeverity::Severe,
        }
    }
}

impl fmt::Display for DriftSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftSeverity::None => "none",
            DriftSeverity::Minor => "minor",
            DriftSeverity::Major => "major",
            DriftSeverity::Severe => "severe",
        };
        f.write_str(s)
    }
}

/// Drift measurement between the in-memory calendar and the stored state.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftInfo {
    /// `calendar_date - db_date` in days.
    pub drift_days: i64,
    pub calendar_date: Date,
    pub db_date: Date,
    pub severity: DriftSeverity,
    pub description: String,
    pub recovery_recommendation: &'static str,
}

impl DriftInfo {
    pub fn from_dates(calendar_date: Date, db_date: Date) -> Self {
        let drift_days = calendar_date.days_since(db_date);
        let severity = DriftSeverity::classify(drift_days);
        let (description, recovery_recommendation) = match severity {
            DriftSeverity::None => (
                "calendar and database are synchronized".to_string(),
                "no action needed",
            ),
            DriftSeverity::Minor => (
                format!("minor drift detected: calendar {drift_days} day(s) ahead"),
                "auto-correct to calendar state",
            ),
            DriftSeverity::Major => (
                format!("major drift detected: calendar {drift_days} day(s) ahead"),
                "reload from database or restore from backup",
            ),
            DriftSeverity::Severe => (
                format!("severe drift detected: {drift_days} day(s)"),
                "abort; database may be corrupted",
            ),
        };
        Self {
            drift_days,
            calendar_date,
            db_date,
            severity,
            description,
            recovery_recommendation,
        }
    }
}

/// The first problem found by pre-sync validation.
#[derive(Debug, Clone, PartialEq)]
pub enum PreSyncIssue {
    /// No dynasty state row exists, or it could not be loaded.
    MissingState(String),
    /// Drift beyond the acceptable threshold (or backwards).
    ExcessiveDrift(DriftInfo),
    /// Stored phase disagrees with the in-memory phase.
    PhaseMismatch {
        calendar: SeasonPhase,
        db: SeasonPhase,
    },
}

impl fmt::Display for PreSyncIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreSyncIssue::MissingState(reason) => write!(f, "{reason}"),
            PreSyncIssue::ExcessiveDrift(info) => write!(f, "{}", info.description),
            PreSyncIssue::PhaseMismatch { calendar, db } => {
                write!(f, "phase mismatch: calendar '{calendar}' vs database '{db}'")
            }
        }
    }
}

/// Outcome of pre-sync validation: the first issue found, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct PreSyncValidation {
    pub drift_days: i64,
    pub issue: Option<PreSyncIssue>,
}

impl PreSyncValidation {
    fn ok(drift_days: i64) -> Self {
        Self {
            drift_days,
            issue: None,
        }
    }

    fn failed(drift_days: i64, issue: PreSyncIssue) -> Self {
        Self {
            drift_days,
            issue: Some(issue),
        }
    }

    pub fn valid(&self) -> bool {
        self.issue.is_none()
    }
}

/// Outcome of post-sync verification: every mismatch is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct PostSyncVerification {
    pub valid: bool,
    pub actual_db_date: Option<Date>,
    pub actual_db_phase: Option<SeasonPhase>,
    pub drift_days: i64,
    pub issues: Vec<String>,
}

/// Compares in-memory calendar state against the persisted dynasty state.
pub struct SyncValidator {
    state: DynastyStateStore,
    dynasty_id: String,
    max_acceptable_drift: i64,
}

impl SyncValidator {
    pub fn new(state: DynastyStateStore, dynasty_id: impl Into<String>) -> Self {
        Self {
            state,
            dynasty_id: dynasty_id.into(),
            max_acceptable_drift: DEFAULT_MAX_ACCEPTABLE_DRIFT,
        }
    }

    pub fn with_max_drift(mut self, max_acceptable_drift: i64) -> Self {
        self.max_acceptable_drift = max_acceptable_drift;
        self
    }

    /// Ordered checks before a state write: state row exists, drift within
    /// threshold, best-effort phase parity. Returns on the first issue.
    pub fn validate_pre_sync(
        &self,
        calendar_date: Date,
        calendar_phase: SeasonPhase,
    ) -> Result<PreSyncValidation> {
        let db_state = match self.state.get_latest(&self.dynasty_id) {
            Ok(Some(state)) => state,
            Ok(None) => {
                return Ok(PreSyncValidation::failed(
                    0,
                    PreSyncIssue::MissingState(format!(
                        "no dynasty state found for '{}'",
                        self.dynasty_id
                    )),
                ))
            }
            Err(e) => {
                return Ok(PreSyncValidation::failed(
                    0,
                    PreSyncIssue::MissingState(format!("failed to load dynasty state: {e}")),
                ))
            }
        };

        let drift = DriftInfo::from_dates(calendar_date, db_state.current_date);
        if drift.drift_days > self.max_acceptable_drift
            || drift.severity == DriftSeverity::Severe
        {
            log::warn!(
                "pre-sync validation failed for '{}': {} (calendar {}, database {}); {}",
                self.dynasty_id,
                drift.description,
                calendar_date,
                db_state.current_date,
                drift.recovery_recommendation
            );
            return Ok(PreSyncValidation::failed(
                drift.drift_days,
                PreSyncIssue::ExcessiveDrift(drift),
            ));
        }

        if db_state.current_phase != calendar_phase {
            return Ok(PreSyncValidation::failed(
                drift.drift_days,
                PreSyncIssue::PhaseMismatch {
                    calendar: calendar_phase,
                    db: db_state.current_phase,
                },
            ));
        }

        log::debug!(
            "pre-sync validation passed for '{}' (drift {} day(s), threshold {})",
            self.dynasty_id,
            drift.drift_days,
            self.max_acceptable_drift
        );
        Ok(PreSyncValidation::ok(drift.drift_days))
    }

    /// After a write: read the state back and compare everything against
    /// the expected values. Any non-zero drift is an issue.
    pub fn verify_post_sync(
        &self,
        expected_date: Date,
        expected_phase: SeasonPhase,
    ) -> Result<PostSyncVerification> {
        let db_state = match self.state.get_latest(&self.dynasty_id) {
            Ok(Some(state)) => state,
            Ok(None) => {
                return Ok(PostSyncVerification {
                    valid: false,
                    actual_db_date: None,
                    actual_db_phase: None,
                    drift_days: 0,
                    issues: vec!["no dynasty state found after save".into()],
                })
            }
            Err(e) => {
                return Ok(PostSyncVerification {
                    valid: false,
                    actual_db_date: None,
                    actual_db_phase: None,
                    drift_days: 0,
                    issues: vec![format!("failed to load dynasty state: {e}")],
                })
            }
        };

        let mut issues = Vec::new();
        if db_state.current_date != expected_date {
            issues.push(format!(
                "database date {} != expected {expected_date}",
                db_state.current_date
            ));
        }
        if db_state.current_phase != expected_phase {
            issues.push(format!(
                "database phase '{}' != expected '{expected_phase}'",
                db_state.current_phase
            ));
        }

        let drift = DriftInfo::from_dates(expected_date, db_state.current_date);
        if drift.drift_days != 0 {
            issues.push(drift.description.clone());
        }

        let valid = issues.is_empty();
        if !valid {
            log::error!(
                "post-sync verification failed for '{}': expected {expected_date}/{expected_phase}, \
                 database {}/{}; issues: {:?}",
                self.dynasty_id,
                db_state.current_date,
                db_state.current_phase,
                issues
            );
        }

        Ok(PostSyncVerification {
            valid,
            actual_db_date: Some(db_state.current_date),
            actual_db_phase: Some(db_state.current_phase),
            drift_days: drift.drift_days,
            issues,
        })
    }

    /// Current drift measurement, when a state row exists.
    pub fn calculate_drift(&self, calendar_date: Date) -> Result<Option<DriftInfo>> {
        Ok(self
            .state
            .get_latest(&self.dynasty_id)?
            .map(|s| DriftInfo::from_dates(calendar_date, s.current_date)))
    }

    /// The typed fault for a failed pre-sync validation.
    pub fn pre_sync_error(&self, validation: &PreSyncValidation) -> SyncError {
        match &validation.issue {
            Some(PreSyncIssue::ExcessiveDrift(info)) => SyncError::Drift {
                drift_days: info.drift_days,
                severity: info.severity,
                calendar_date: info.calendar_date.to_string(),
                db_date: info.db_date.to_string(),
            },
            Some(PreSyncIssue::PhaseMismatch { calendar, db }) => SyncError::PhaseMismatch {
                calendar_phase: calendar.to_string(),
                db_phase: db.to_string(),
            },
            Some(PreSyncIssue::MissingState(reason)) => SyncError::Initialization {
                sync_point: "pre_sync_validation",
                reason: reason.clone(),
            },
            None => SyncError::Initialization {
                sync_point: "pre_sync_validation",
                reason: "pre-sync validation reported no issue".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseConnection;

    fn setup(date: &str, phase: SeasonPhase) -> SyncValidator {
        let db = DatabaseConnection::open_in_memory().unwrap();
        let store = DynastyStateStore::new(db);
        store.ensure_dynasty("d1", "Test", None).unwrap();
        let d = Date::parse(date).unwrap();
        store
            .initialize("d1", d.season_year(), d, 1, phase)
            .unwrap();
        SyncValidator::new(store, "d1")
    }

    #[test]
    fn severity_classification_boundaries() {
        assert_eq!(DriftSeverity::classify(0), DriftSeverity::None);
        assert_eq!(DriftSeverity::classify(1), DriftSeverity::Minor);
        assert_eq!(DriftSeverity::classify(3), DriftSeverity::Minor);
        assert_eq!(DriftSeverity::classify(4), DriftSeverity::Major);
        assert_eq!(DriftSeverity::classify(20), DriftSeverity::Major);
        assert_eq!(DriftSeverity::classify(21), DriftSeverity::Severe);
        assert_eq!(DriftSeverity::classify(-1), DriftSeverity::Severe);
    }

    #[test]
    fn perfect_sync_passes() {
        let validator = setup("2024-09-15", SeasonPhase::RegularSeason);
        let result = validator
            .validate_pre_sync(Date::parse("2024-09-15").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(result.valid());
        assert_eq!(result.drift_days, 0);
    }

    #[test]
    fn minor_drift_within_threshold_passes() {
        let validator = setup("2024-09-12", SeasonPhase::RegularSeason);
        let result = validator
            .validate_pre_sync(Date::parse("2024-09-15").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(result.valid());
        assert_eq!(result.drift_days, 3);
    }

    #[test]
    fn drift_beyond_threshold_fails() {
        let validator = setup("2024-09-01", SeasonPhase::RegularSeason);
        let result = validator
            .validate_pre_sync(Date::parse("2024-09-15").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(!result.valid());
        assert_eq!(result.drift_days, 14);
        assert!(matches!(result.issue, Some(PreSyncIssue::ExcessiveDrift(_))));

        let err = validator.pre_sync_error(&result);
        assert!(matches!(err, SyncError::Drift { drift_days: 14, .. }));
    }

    #[test]
    fn threshold_is_configurable() {
        let validator =
            setup("2024-09-01", SeasonPhase::RegularSeason).with_max_drift(20);
        let result = validator
            .validate_pre_sync(Date::parse("2024-09-15").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(result.valid());
        assert_eq!(result.drift_days, 14);
    }

    #[test]
    fn missing_state_fails() {
        let db = DatabaseConnection::open_in_memory().unwrap();
        let validator = SyncValidator::new(DynastyStateStore::new(db), "ghost");
        let result = validator
            .validate_pre_sync(Date::parse("2024-09-15").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(matches!(result.issue, Some(PreSyncIssue::MissingState(_))));

        let err = validator.pre_sync_error(&result);
        assert!(matches!(err, SyncError::Initialization { .. }));
    }

    #[test]
    fn phase_mismatch_fails() {
        let validator = setup("2024-09-15", SeasonPhase::Preseason);
        let result = validator
            .validate_pre_sync(Date::parse("2024-09-15").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(matches!(
            result.issue,
            Some(PreSyncIssue::PhaseMismatch {
                calendar: SeasonPhase::RegularSeason,
                db: SeasonPhase::Preseason,
            })
        ));

        let err = validator.pre_sync_error(&result);
        assert!(matches!(err, SyncError::PhaseMismatch { .. }));
    }

    #[test]
    fn post_sync_detects_stale_write() {
        let validator = setup("2024-09-15", SeasonPhase::RegularSeason);
        // Expecting the 16th, but the database still says the 15th
        let result = validator
            .verify_post_sync(Date::parse("2024-09-16").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(!result.valid);
        assert_eq!(result.drift_days, 1);
        assert!(result.issues.iter().any(|i| i.contains("database date")));
    }

    #[test]
    fn post_sync_passes_after_matching_write() {
        let validator = setup("2024-09-16", SeasonPhase::RegularSeason);
        let result = validator
            .verify_post_sync(Date::parse("2024-09-16").unwrap(), SeasonPhase::RegularSeason)
            .unwrap();
        assert!(result.valid);
        assert_eq!(result.drift_days, 0);
        assert_eq!(result.actual_db_phase, Some(SeasonPhase::RegularSeason));
    }

    #[test]
    fn drift_info_severe_when_database_ahead() {
        let info = DriftInfo::from_dates(
            Date::parse("2024-09-10").unwrap(),
            Date::parse("2024-09-15").unwrap(),
        );
        assert_eq!(info.drift_days, -5);
        assert_eq!(info.severity, DriftSeverity::Severe);
    }
}
