//! DTOs for REST API requests/responses and JSON input files.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::RosterConfig;
use crate::domain::{Catalog, CatalogSource, Day, EmployeeId, Period, PeriodId};
use crate::error::{ConfigError, InfeasibilityReport, ModelError, RosterError};
use crate::export::RosterReport;
use crate::preferences::{Presence, PreferenceSource, PreferenceStore};
use crate::solver::SolveStatus;

/// Restriction of one day to a subset of the periods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPeriodsDto {
    pub day: Day,
    pub periods: Vec<PeriodId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDto {
    pub employees: Vec<EmployeeId>,
    pub periods: Vec<Period>,
    pub horizon_days: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub day_periods: Vec<DayPeriodsDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

impl CatalogSource for CatalogDto {
    fn employees(&self) -> Vec<EmployeeId> {
        self.employees.clone()
    }

    /// Periods without a code get the default one.
    fn periods(&self) -> Vec<Period> {
        self.periods
            .iter()
            .cloned()
            .map(|mut p| {
                if p.code.is_empty() {
                    p.code = Period::new(p.id.as_str(), p.duration_hours).code;
                }
                p
            })
            .collect()
    }

    fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    fn day_periods(&self, day: Day) -> Option<Vec<PeriodId>> {
        self.day_periods
            .iter()
            .find(|d| d.day == day)
            .map(|d| d.periods.clone())
    }

    fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }
}

impl CatalogDto {
    pub fn to_catalog(&self) -> Result<Catalog, ModelError> {
        let mut seen = HashSet::new();
        for entry in &self.day_periods {
            if entry.day.number() == 0 || entry.day.number() > self.horizon_days {
                return Err(ModelError::DayOutOfHorizon(entry.day));
            }
            if !seen.insert(entry.day) {
                return Err(ModelError::DuplicateDayOverride(entry.day));
            }
        }
        Catalog::from_source(self)
    }
}

impl From<&Catalog> for CatalogDto {
    fn from(catalog: &Catalog) -> Self {
        Self {
            employees: catalog.employees().to_vec(),
            periods: catalog.periods().to_vec(),
            horizon_days: catalog.horizon_days(),
            day_periods: catalog
                .days()
                .filter_map(|day| {
                    CatalogSource::day_periods(catalog, day).map(|periods| DayPeriodsDto { day, periods })
                })
                .collect(),
            start_date: catalog.start_date(),
        }
    }
}

/// Explicit weight; `period == None` weighs the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightDto {
    pub employee: EmployeeId,
    pub day: Day,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<PeriodId>,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceDto {
    pub employee: EmployeeId,
    pub day: Day,
    pub presence: Presence,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferencesDto {
    pub weights: Vec<WeightDto>,
    pub presence: Vec<PresenceDto>,
}

impl PreferencesDto {
    pub fn to_store(&self) -> PreferenceStore {
        let mut store = PreferenceStore::new();
        for w in &self.weights {
            match &w.period {
                Some(period) => store.set_shift_weight(w.employee.clone(), w.day, period.clone(), w.weight),
                None => store.set_day_weight(w.employee.clone(), w.day, w.weight),
            }
        }
        for p in &self.presence {
            store.set_presence(p.employee.clone(), p.day, p.presence);
        }
        store
    }

    pub fn from_source(source: &dyn PreferenceSource) -> Self {
        let weights = source
            .weighted_keys()
            .into_iter()
            .filter_map(|(employee, day, period)| {
                let weight = source.weight(&employee, day, period.as_ref())?;
                Some(WeightDto {
                    employee,
                    day,
                    period,
                    weight,
                })
            })
            .collect();
        let presence = source
            .presence_flags()
            .into_iter()
            .map(|(employee, day, presence)| PresenceDto {
                employee,
                day,
                presence,
            })
            .collect();
        Self { weights, presence }
    }
}

/// Everything one planning run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRequestDto {
    pub catalog: CatalogDto,
    #[serde(default)]
    pub preferences: PreferencesDto,
    #[serde(default)]
    pub config: RosterConfig,
}

impl RosterRequestDto {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            what: "roster request",
            source,
        })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = crate::config::read_file(path.as_ref())?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub solver_engine: &'static str,
}

/// Lifecycle of a background roster job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Solving,
    Solved,
    Failed,
}

/// Typed failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDto {
    pub kind: &'static str,
    pub message: String,
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<InfeasibilityReport>,
}

impl From<&RosterError> for ErrorDto {
    fn from(err: &RosterError) -> Self {
        let (kind, report) = match err {
            RosterError::Model(_) => ("MODEL_ERROR", None),
            RosterError::Infeasible(report) => ("INFEASIBLE", Some(report.clone())),
            RosterError::SolverTimeout { .. } => ("SOLVER_TIMEOUT", None),
            RosterError::Solver(_) => ("SOLVER_ERROR", None),
            RosterError::InvariantViolation { .. } => ("INVARIANT_VIOLATION", None),
        };
        Self {
            kind,
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            report,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solve_status: Option<SolveStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_preference_cost: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterJobDto {
    pub id: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RosterReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDto>,
}
