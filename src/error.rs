//! Error taxonomy for the rostering pipeline.
//!
//! Construction errors abort before any solve attempt. Infeasibility and
//! timeouts are recoverable outcomes; the caller decides whether to relax
//! the configuration or retry with a larger budget.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::domain::{Day, EmployeeId, PeriodId};

/// Malformed catalog or model input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("catalog has no employees")]
    NoEmployees,

    #[error("catalog has no periods")]
    NoPeriods,

    #[error("planning horizon is empty")]
    EmptyHorizon,

    #[error("period {period} has non-positive duration {hours}h")]
    NonPositiveDuration { period: PeriodId, hours: i64 },

    #[error("duplicate employee id {0}")]
    DuplicateEmployee(EmployeeId),

    #[error("duplicate period id {0}")]
    DuplicatePeriod(PeriodId),

    #[error("periods {first} and {second} share the code {code:?}; give them distinct codes")]
    DuplicatePeriodCode {
        code: String,
        first: PeriodId,
        second: PeriodId,
    },

    #[error("day {day} overrides with unknown period {period}")]
    UnknownPeriodOverride { day: Day, period: PeriodId },

    #[error("day {0} has more than one period override")]
    DuplicateDayOverride(Day),

    #[error("day {0} is outside the planning horizon")]
    DayOutOfHorizon(Day),

    #[error("horizon of {days} days is not a whole number of weeks")]
    PartialWeek { days: u32 },

    #[error("no assignment variable for employee {employee} on day {day} period {period}")]
    UnknownVariable {
        employee: EmployeeId,
        day: Day,
        period: PeriodId,
    },

    #[error("unknown employee {0}")]
    UnknownEmployee(EmployeeId),

    #[error("rest-day policy is invalid: {0}")]
    InvalidRestDayPolicy(String),

    #[error("minimum staffing per shift must be at least 1")]
    InvalidStaffingFloor,

    #[error("weight table covers {actual} variables, model declares {expected}")]
    WeightTableMismatch { expected: usize, actual: usize },
}

/// Counts attached to an infeasible solve to help manual diagnosis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfeasibilityReport {
    pub employee_count: usize,
    pub shift_count: usize,
    pub min_per_shift: u32,
    pub weekly_cap_hours: Option<i64>,
    pub monthly_cap_hours: Option<i64>,
}

impl std::fmt::Display for InfeasibilityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} employees, {} shifts, min {} per shift",
            self.employee_count, self.shift_count, self.min_per_shift
        )?;
        if let Some(cap) = self.weekly_cap_hours {
            write!(f, ", weekly cap {}h", cap)?;
        }
        if let Some(cap) = self.monthly_cap_hours {
            write!(f, ", horizon cap {}h", cap)?;
        }
        Ok(())
    }
}

/// Outcome of the end-to-end pipeline when no roster is produced.
#[derive(Error, Debug, Clone)]
pub enum RosterError {
    #[error("model construction failed: {0}")]
    Model(#[from] ModelError),

    #[error("no feasible schedule under current constraints ({0})")]
    Infeasible(InfeasibilityReport),

    #[error("solver gave up after {elapsed:?} without finding a schedule")]
    SolverTimeout { elapsed: Duration },

    #[error("solver failed: {0}")]
    Solver(String),

    #[error("employee {employee} has {} periods on day {day}: {periods:?}", .periods.len())]
    InvariantViolation {
        employee: EmployeeId,
        day: Day,
        periods: Vec<PeriodId>,
    },
}

impl RosterError {
    /// Infeasibility and timeouts can be retried with a relaxed configuration.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RosterError::Infeasible(_) | RosterError::SolverTimeout { .. })
    }
}

/// Failures writing a report. A computed roster is never affected.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures loading configuration or catalog files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}
