//! Temporal engagement states
//!
//! Dates are compared as `YYYY-MM-DD` strings, which orders correctly
//! because every stored date is zero-padded.

use std::fmt;

use crate::db::search::predicate::{Comparison, Predicate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngagementState {
    /// Not launched yet
    Upcoming,
    /// Launched and not past its end date
    Active,
    /// Launched and past its end date
    Past,
    /// Past, but not yet archived
    Terminating,
}

impl EngagementState {
    /// Parse a state name, case-insensitively. Unknown names map to
    /// [`EngagementState::Upcoming`] with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "UPCOMING" => EngagementState::Upcoming,
            "ACTIVE" => EngagementState::Active,
            "PAST" => EngagementState::Past,
            "TERMINATING" => EngagementState::Terminating,
            _ => {
                tracing::warn!(state = %name, "Unknown engagement state, defaulting to UPCOMING");
                EngagementState::Upcoming
            }
        }
    }

    /// Predicate selecting engagements in this state as of `today`.
    pub fn predicate(self, today: &str) -> Predicate {
        let launched = Predicate::exists("launch");
        match self {
            EngagementState::Upcoming => Predicate::not_exists("launch"),
            EngagementState::Active => {
                launched.and(Predicate::compare("endDate", Comparison::Gte, today))
            }
            EngagementState::Past => {
                launched.and(Predicate::compare("endDate", Comparison::Lt, today))
            }
            EngagementState::Terminating => launched
                .and(Predicate::compare("endDate", Comparison::Lt, today))
                .and(Predicate::compare("archiveDate", Comparison::Gt, today)),
        }
    }
}

impl fmt::Display for EngagementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngagementState::Upcoming => "UPCOMING",
            EngagementState::Active => "ACTIVE",
            EngagementState::Past => "PAST",
            EngagementState::Terminating => "TERMINATING",
        };
        f.write_str(name)
    }
}
