//! Run configuration: labor-law caps, staffing floor, rest policy and
//! solver budget.
//!
//! Every field has a default so a partial JSON document is enough:
//!
//! ```
//! use shift_rostering::config::RosterConfig;
//!
//! let config = RosterConfig::from_json_str(r#"{ "minPerShift": 2, "monthlyCapHours": 192 }"#).unwrap();
//! assert_eq!(config.min_per_shift, 2);
//! assert_eq!(config.weekly_cap_hours, Some(48));
//! assert_eq!(config.monthly_cap_hours, Some(192));
//! ```

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{Catalog, Day};
use crate::error::{ConfigError, ModelError};
use crate::solver::SolverConfig;

pub const DEFAULT_MIN_PER_SHIFT: u32 = 1;
pub const DEFAULT_WEEKLY_CAP_HOURS: i64 = 48;
pub const DEFAULT_MONTHLY_CAP_HOURS: i64 = 174;
pub const DEFAULT_REST_BLOCK_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RosterConfig {
    pub min_per_shift: u32,
    pub weekly_cap_hours: Option<i64>,
    /// Cap over the whole horizon, per employee.
    pub monthly_cap_hours: Option<i64>,
    pub rest_day: Option<RestDayPolicy>,
    /// Forbid two periods on the same day for the same employee.
    pub intra_day_rest: bool,
    /// Minimum clock gap between a shift and the next day's shift.
    pub min_rest_hours: Option<u32>,
    /// Reject horizons that are not a whole number of weeks.
    pub strict_weeks: bool,
    /// Seed for default preference weights.
    pub preference_seed: u64,
    pub solver: SolverConfig,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            min_per_shift: DEFAULT_MIN_PER_SHIFT,
            weekly_cap_hours: Some(DEFAULT_WEEKLY_CAP_HOURS),
            monthly_cap_hours: Some(DEFAULT_MONTHLY_CAP_HOURS),
            rest_day: Some(RestDayPolicy::default()),
            intra_day_rest: true,
            min_rest_hours: None,
            strict_weeks: false,
            preference_seed: 0,
            solver: SolverConfig::default_config(),
        }
    }
}

impl RosterConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            what: "roster config",
            source,
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = read_file(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Horizon-level checks that do not depend on the model.
    pub fn check_catalog(&self, catalog: &Catalog) -> Result<(), ModelError> {
        if self.strict_weeks && !catalog.is_whole_weeks() {
            return Err(ModelError::PartialWeek {
                days: catalog.horizon_days(),
            });
        }
        Ok(())
    }
}

pub(crate) fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// At most one worked rest day per block of `block_size_days`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestDayPolicy {
    pub block_size_days: u32,
    pub selector: RestDaySelector,
}

impl Default for RestDayPolicy {
    fn default() -> Self {
        Self {
            block_size_days: DEFAULT_REST_BLOCK_DAYS,
            selector: RestDaySelector::LastDayOfWeek,
        }
    }
}

impl RestDayPolicy {
    pub fn new(block_size_days: u32, selector: RestDaySelector) -> Self {
        Self {
            block_size_days,
            selector,
        }
    }

    /// Non-overlapping blocks of designated rest days. A trailing partial
    /// block is included.
    pub fn blocks(&self, catalog: &Catalog) -> Result<Vec<Vec<Day>>, ModelError> {
        if self.block_size_days == 0 {
            return Err(ModelError::InvalidRestDayPolicy(
                "block size must be at least one day".into(),
            ));
        }
        let mut blocks = Vec::new();
        let mut first = 1;
        while first <= catalog.horizon_days() {
            let last = first
                .saturating_add(self.block_size_days - 1)
                .min(catalog.horizon_days());
            let mut days = Vec::new();
            for n in first..=last {
                let day = Day::new(n);
                if self.selector.selects(catalog, day)? {
                    days.push(day);
                }
            }
            blocks.push(days);
            first = last + 1;
        }
        Ok(blocks)
    }
}

/// Which days count as designated rest days.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RestDaySelector {
    /// Day 7 of every week (days 7, 14, 21, ...).
    LastDayOfWeek,
    /// Position 1..=7 within every week.
    DayOfWeek { day: u32 },
    /// Calendar weekday; the catalog must carry a start date.
    Weekday { weekday: Weekday },
    /// Explicit list of days.
    Days { days: Vec<Day> },
}

impl RestDaySelector {
    pub fn selects(&self, catalog: &Catalog, day: Day) -> Result<bool, ModelError> {
        match self {
            RestDaySelector::LastDayOfWeek => Ok(day.day_of_week() == 7),
            RestDaySelector::DayOfWeek { day: position } => {
                if !(1..=7).contains(position) {
                    return Err(ModelError::InvalidRestDayPolicy(format!(
                        "day of week {} is not in 1..=7",
                        position
                    )));
                }
                Ok(day.day_of_week() == *position)
            }
            RestDaySelector::Weekday { weekday } => {
                let date = catalog.date_of(day).ok_or_else(|| {
                    ModelError::InvalidRestDayPolicy(
                        "weekday selector needs a catalog start date".into(),
                    )
                })?;
                Ok(date.weekday() == *weekday)
            }
            RestDaySelector::Days { days } => {
                if let Some(bad) = days
                    .iter()
                    .find(|d| d.number() == 0 || d.number() > catalog.horizon_days())
                {
                    return Err(ModelError::DayOutOfHorizon(*bad));
                }
                Ok(days.contains(&day))
            }
        }
    }
}
