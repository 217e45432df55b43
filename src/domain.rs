//! Domain catalog for the rostering problem.
//!
//! The catalog is the static planning universe: who can work, which periods
//! a day is split into, and how long the horizon is. It is validated once at
//! construction and is immutable for the rest of a planning run.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::ModelError;

/// Opaque employee identifier, unique within a planning run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmployeeId(String);

impl EmployeeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmployeeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque period identifier (e.g. "Morning", "Night").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodId(String);

impl PeriodId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeriodId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A 1-based position in the planning horizon.
///
/// ```
/// use shift_rostering::domain::Day;
///
/// let day = Day::new(9);
/// assert_eq!(day.index(), 8);
/// assert_eq!(day.week(), 1);
/// assert_eq!(day.day_of_week(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Day(u32);

impl Day {
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(self) -> u32 {
        self.0
    }

    /// Zero-based offset into per-day storage.
    pub fn index(self) -> usize {
        self.0.saturating_sub(1) as usize
    }

    /// Zero-based week this day belongs to.
    pub fn week(self) -> u32 {
        self.0.saturating_sub(1) / 7
    }

    /// Position within its week, 1..=7.
    pub fn day_of_week(self) -> u32 {
        self.0.saturating_sub(1) % 7 + 1
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, fixed-duration subdivision of a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: PeriodId,
    /// Short code shown in roster cells ("M", "N", ...).
    #[serde(default)]
    pub code: String,
    pub duration_hours: i64,
    /// Clock hour the period starts at. Needed only for cross-day rest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_hour: Option<u32>,
    /// Hex fill color ("FFCCFF") for report rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl Period {
    pub fn new(id: impl Into<String>, duration_hours: i64) -> Self {
        let id = PeriodId::new(id);
        let code = id
            .as_str()
            .chars()
            .next()
            .map(|c| c.to_uppercase().to_string())
            .unwrap_or_default();
        Self {
            id,
            code,
            duration_hours,
            start_hour: None,
            color: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_start_hour(mut self, hour: u32) -> Self {
        self.start_hour = Some(hour);
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    /// Clock hour the period ends at, counted from the start of its day
    /// (may exceed 24 for overnight periods).
    pub fn end_hour(&self) -> Option<i64> {
        self.start_hour.map(|h| i64::from(h) + self.duration_hours)
    }
}

/// A schedulable work slot: a period on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Shift {
    pub day: Day,
    /// Index into `Catalog::periods`.
    pub period: usize,
}

/// Read interface for whatever layer owns the master data.
pub trait CatalogSource {
    fn employees(&self) -> Vec<EmployeeId>;

    fn periods(&self) -> Vec<Period>;

    fn horizon_days(&self) -> u32;

    /// Periods active on `day`, when it differs from the full period set.
    fn day_periods(&self, _day: Day) -> Option<Vec<PeriodId>> {
        None
    }

    /// Calendar date of day 1, if the horizon is anchored to a calendar.
    fn start_date(&self) -> Option<NaiveDate> {
        None
    }
}

/// The validated planning universe of a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    employees: Vec<EmployeeId>,
    periods: Vec<Period>,
    horizon_days: u32,
    start_date: Option<NaiveDate>,
    /// Active period indices per day, in catalog order.
    day_periods: Vec<Vec<usize>>,
}

impl Catalog {
    pub fn new(
        employees: Vec<EmployeeId>,
        periods: Vec<Period>,
        horizon_days: u32,
    ) -> Result<Self, ModelError> {
        if employees.is_empty() {
            return Err(ModelError::NoEmployees);
        }
        if periods.is_empty() {
            return Err(ModelError::NoPeriods);
        }
        if horizon_days == 0 {
            return Err(ModelError::EmptyHorizon);
        }

        let mut seen = HashSet::new();
        for employee in &employees {
            if !seen.insert(employee.as_str()) {
                return Err(ModelError::DuplicateEmployee(employee.clone()));
            }
        }

        let mut seen = HashSet::new();
        let mut codes: HashMap<&str, &PeriodId> = HashMap::new();
        for period in &periods {
            if !seen.insert(period.id.as_str()) {
                return Err(ModelError::DuplicatePeriod(period.id.clone()));
            }
            // Report cells show the code, so it must identify the period.
            if let Some(first) = codes.insert(period.code.as_str(), &period.id) {
                return Err(ModelError::DuplicatePeriodCode {
                    code: period.code.clone(),
                    first: first.clone(),
                    second: period.id.clone(),
                });
            }
            if period.duration_hours <= 0 {
                return Err(ModelError::NonPositiveDuration {
                    period: period.id.clone(),
                    hours: period.duration_hours,
                });
            }
        }

        let all: Vec<usize> = (0..periods.len()).collect();
        Ok(Self {
            employees,
            periods,
            horizon_days,
            start_date: None,
            day_periods: vec![all; horizon_days as usize],
        })
    }

    /// Builds and validates a catalog from an external source.
    pub fn from_source(source: &dyn CatalogSource) -> Result<Self, ModelError> {
        let mut catalog = Self::new(source.employees(), source.periods(), source.horizon_days())?;
        for day in catalog.days().collect::<Vec<_>>() {
            if let Some(ids) = source.day_periods(day) {
                catalog = catalog.with_day_periods(day, &ids)?;
            }
        }
        if let Some(date) = source.start_date() {
            catalog = catalog.with_start_date(date);
        }
        Ok(catalog)
    }

    /// Restricts `day` to the given periods.
    pub fn with_day_periods(mut self, day: Day, ids: &[PeriodId]) -> Result<Self, ModelError> {
        if day.number() == 0 || day.number() > self.horizon_days {
            return Err(ModelError::DayOutOfHorizon(day));
        }
        let mut active = Vec::with_capacity(ids.len());
        for id in ids {
            let idx = self
                .period_index(id)
                .ok_or_else(|| ModelError::UnknownPeriodOverride {
                    day,
                    period: id.clone(),
                })?;
            active.push(idx);
        }
        active.sort_unstable();
        active.dedup();
        self.day_periods[day.index()] = active;
        Ok(self)
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    pub fn employees(&self) -> &[EmployeeId] {
        &self.employees
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn period(&self, idx: usize) -> &Period {
        &self.periods[idx]
    }

    pub fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn days(&self) -> impl Iterator<Item = Day> {
        (1..=self.horizon_days).map(Day::new)
    }

    /// Period indices active on `day`.
    pub fn periods_on(&self, day: Day) -> &[usize] {
        self.day_periods
            .get(day.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn employee_index(&self, id: &EmployeeId) -> Option<usize> {
        self.employees.iter().position(|e| e == id)
    }

    pub fn period_index(&self, id: &PeriodId) -> Option<usize> {
        self.periods.iter().position(|p| &p.id == id)
    }

    /// All shifts, day-major then period order.
    pub fn shifts(&self) -> Vec<Shift> {
        self.days()
            .flat_map(|day| {
                self.periods_on(day)
                    .iter()
                    .map(move |&period| Shift { day, period })
            })
            .collect()
    }

    pub fn shift_count(&self) -> usize {
        self.day_periods.iter().map(Vec::len).sum()
    }

    pub fn is_whole_weeks(&self) -> bool {
        self.horizon_days % 7 == 0
    }

    /// Number of (possibly partial) weeks in the horizon.
    pub fn week_count(&self) -> u32 {
        self.horizon_days.div_ceil(7)
    }

    pub fn date_of(&self, day: Day) -> Option<NaiveDate> {
        self.start_date
            .map(|start| start + Duration::days(i64::from(day.number()) - 1))
    }

    /// Column label for reports: the calendar date when anchored.
    pub fn day_label(&self, day: Day) -> String {
        match self.date_of(day) {
            Some(date) => date.format("%a %Y-%m-%d").to_string(),
            None => format!("Day {}", day),
        }
    }
}

impl CatalogSource for Catalog {
    fn employees(&self) -> Vec<EmployeeId> {
        self.employees.clone()
    }

    fn periods(&self) -> Vec<Period> {
        self.periods.clone()
    }

    fn horizon_days(&self) -> u32 {
        self.horizon_days
    }

    fn day_periods(&self, day: Day) -> Option<Vec<PeriodId>> {
        let active = self.periods_on(day);
        if active.len() == self.periods.len() {
            None
        } else {
            Some(active.iter().map(|&i| self.periods[i].id.clone()).collect())
        }
    }

    fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employees(n: usize) -> Vec<EmployeeId> {
        (0..n).map(|i| EmployeeId::new(format!("E{}", i))).collect()
    }

    #[test]
    fn test_catalog_rejects_empty_inputs() {
        let periods = vec![Period::new("Morning", 8)];
        assert_eq!(
            Catalog::new(vec![], periods.clone(), 7),
            Err(ModelError::NoEmployees)
        );
        assert_eq!(Catalog::new(employees(1), vec![], 7), Err(ModelError::NoPeriods));
        assert_eq!(
            Catalog::new(employees(1), periods, 0),
            Err(ModelError::EmptyHorizon)
        );
    }

    #[test]
    fn test_catalog_rejects_bad_duration() {
        let err = Catalog::new(employees(2), vec![Period::new("Night", -10)], 7).unwrap_err();
        assert!(matches!(err, ModelError::NonPositiveDuration { hours: -10, .. }));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let dup = vec![EmployeeId::new("A"), EmployeeId::new("A")];
        assert_eq!(
            Catalog::new(dup, vec![Period::new("Morning", 8)], 7),
            Err(ModelError::DuplicateEmployee(EmployeeId::new("A")))
        );
        let periods = vec![Period::new("Morning", 8), Period::new("Morning", 6)];
        assert!(matches!(
            Catalog::new(employees(1), periods, 7),
            Err(ModelError::DuplicatePeriod(_))
        ));
    }

    #[test]
    fn test_catalog_rejects_shared_period_code() {
        let periods = vec![Period::new("Morning", 8), Period::new("Midday", 6)];
        assert_eq!(
            Catalog::new(employees(1), periods, 7),
            Err(ModelError::DuplicatePeriodCode {
                code: "M".into(),
                first: PeriodId::new("Morning"),
                second: PeriodId::new("Midday"),
            })
        );

        let periods = vec![Period::new("Morning", 8), Period::new("Midday", 6).with_code("D")];
        assert!(Catalog::new(employees(1), periods, 7).is_ok());
    }

    #[test]
    fn test_shifts_follow_day_overrides() {
        let periods = vec![Period::new("Morning", 8), Period::new("Evening", 8)];
        let catalog = Catalog::new(employees(2), periods, 3)
            .unwrap()
            .with_day_periods(Day::new(2), &[PeriodId::new("Evening")])
            .unwrap();

        assert_eq!(catalog.shift_count(), 5);
        assert_eq!(catalog.periods_on(Day::new(2)), &[1]);
        let shifts = catalog.shifts();
        assert_eq!(shifts.len(), 5);
        assert_eq!(shifts[2], Shift { day: Day::new(2), period: 1 });
    }

    #[test]
    fn test_override_with_unknown_period() {
        let catalog = Catalog::new(employees(1), vec![Period::new("Morning", 8)], 7).unwrap();
        let err = catalog
            .with_day_periods(Day::new(3), &[PeriodId::new("Night")])
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownPeriodOverride { .. }));
    }

    #[test]
    fn test_round_trip_through_source() {
        let catalog = Catalog::new(employees(2), vec![Period::new("Morning", 8), Period::new("Night", 10)], 14)
            .unwrap()
            .with_day_periods(Day::new(7), &[PeriodId::new("Morning")])
            .unwrap()
            .with_start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        let rebuilt = Catalog::from_source(&catalog).unwrap();
        assert_eq!(rebuilt, catalog);
    }

    #[test]
    fn test_day_labels() {
        let catalog = Catalog::new(employees(1), vec![Period::new("Morning", 8)], 7).unwrap();
        assert_eq!(catalog.day_label(Day::new(3)), "Day 3");

        let anchored = catalog.with_start_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(anchored.day_label(Day::new(1)), "Mon 2024-01-01");
        assert_eq!(anchored.day_label(Day::new(7)), "Sun 2024-01-07");
    }

    #[test]
    fn test_default_period_code() {
        assert_eq!(Period::new("matin", 8).code, "M");
        assert_eq!(Period::new("Night", 10).with_code("N*").code, "N*");
    }
}
