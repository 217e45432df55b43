//! Preference store: dissatisfaction weights and hard presence flags.
//!
//! Weights are integer costs, lower is preferred. A per-shift weight wins
//! over a per-day weight; anything not supplied falls back to a default drawn
//! from a generator seeded per build, never from process-wide state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;

use crate::domain::{Catalog, Day, EmployeeId, PeriodId};
use crate::error::ModelError;
use crate::model::{VarId, VariableKey, VariableSet};

/// Range default weights are drawn from.
pub const DEFAULT_WEIGHT_RANGE: Range<i64> = 1..50;

/// Hard presence flag for an (employee, day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Presence {
    /// Must work some period that day.
    Required,
    /// Must not work that day.
    Absent,
}

/// Read interface for externally supplied preferences.
pub trait PreferenceSource {
    /// Explicit weight. `period == None` asks for the whole-day weight; a
    /// `Some` query must not fall back to the day weight.
    fn weight(&self, employee: &EmployeeId, day: Day, period: Option<&PeriodId>) -> Option<i64>;

    /// Every explicit presence flag.
    fn presence_flags(&self) -> Vec<(EmployeeId, Day, Presence)> {
        Vec::new()
    }

    /// Every (employee, day, period) an explicit weight was given for.
    fn weighted_keys(&self) -> Vec<(EmployeeId, Day, Option<PeriodId>)> {
        Vec::new()
    }
}

/// No explicit preferences: every weight is a seeded default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreferences;

impl PreferenceSource for NoPreferences {
    fn weight(&self, _employee: &EmployeeId, _day: Day, _period: Option<&PeriodId>) -> Option<i64> {
        None
    }
}

/// In-memory preference store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreferenceStore {
    day_weights: HashMap<(EmployeeId, Day), i64>,
    shift_weights: HashMap<(EmployeeId, Day, PeriodId), i64>,
    presence: HashMap<(EmployeeId, Day), Presence>,
}

impl PreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_day_weight(&mut self, employee: EmployeeId, day: Day, weight: i64) {
        self.day_weights.insert((employee, day), weight);
    }

    pub fn set_shift_weight(&mut self, employee: EmployeeId, day: Day, period: PeriodId, weight: i64) {
        self.shift_weights.insert((employee, day, period), weight);
    }

    pub fn set_presence(&mut self, employee: EmployeeId, day: Day, presence: Presence) {
        self.presence.insert((employee, day), presence);
    }

    pub fn with_day_weight(mut self, employee: impl Into<EmployeeId>, day: u32, weight: i64) -> Self {
        self.set_day_weight(employee.into(), Day::new(day), weight);
        self
    }

    pub fn with_shift_weight(
        mut self,
        employee: impl Into<EmployeeId>,
        day: u32,
        period: impl Into<PeriodId>,
        weight: i64,
    ) -> Self {
        self.set_shift_weight(employee.into(), Day::new(day), period.into(), weight);
        self
    }

    pub fn with_presence(mut self, employee: impl Into<EmployeeId>, day: u32, presence: Presence) -> Self {
        self.set_presence(employee.into(), Day::new(day), presence);
        self
    }

    pub fn presence(&self, employee: &EmployeeId, day: Day) -> Option<Presence> {
        self.presence.get(&(employee.clone(), day)).copied()
    }

    pub fn weight_count(&self) -> usize {
        self.day_weights.len() + self.shift_weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weight_count() == 0 && self.presence.is_empty()
    }
}

impl PreferenceSource for PreferenceStore {
    fn weight(&self, employee: &EmployeeId, day: Day, period: Option<&PeriodId>) -> Option<i64> {
        match period {
            Some(period) => self
                .shift_weights
                .get(&(employee.clone(), day, period.clone()))
                .copied(),
            None => self.day_weights.get(&(employee.clone(), day)).copied(),
        }
    }

    fn presence_flags(&self) -> Vec<(EmployeeId, Day, Presence)> {
        let mut flags: Vec<_> = self
            .presence
            .iter()
            .map(|((e, d), p)| (e.clone(), *d, *p))
            .collect();
        flags.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        flags
    }

    fn weighted_keys(&self) -> Vec<(EmployeeId, Day, Option<PeriodId>)> {
        let mut keys: Vec<_> = self
            .day_weights
            .keys()
            .map(|(e, d)| (e.clone(), *d, None))
            .chain(
                self.shift_weights
                    .keys()
                    .map(|(e, d, p)| (e.clone(), *d, Some(p.clone()))),
            )
            .collect();
        keys.sort();
        keys
    }
}

/// Resolved weight of every declared variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    weights: Vec<i64>,
}

impl WeightTable {
    /// Resolves explicit weights and fills the rest with seeded defaults.
    ///
    /// One default is drawn per (employee, day) in employee-then-day order,
    /// whether or not it ends up used, so supplying some weights never
    /// shifts the defaults of others.
    pub fn resolve(
        catalog: &Catalog,
        variables: &VariableSet,
        prefs: &dyn PreferenceSource,
        seed: u64,
    ) -> Result<Self, ModelError> {
        for (employee, day, period) in prefs.weighted_keys() {
            check_key(catalog, variables, &employee, day, period.as_ref())?;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = vec![0; variables.len()];
        for (e_idx, employee) in catalog.employees().iter().enumerate() {
            for day in catalog.days() {
                let default = rng.gen_range(DEFAULT_WEIGHT_RANGE);
                let day_weight = prefs.weight(employee, day, None).unwrap_or(default);
                for &p_idx in catalog.periods_on(day) {
                    let period = &catalog.period(p_idx).id;
                    let weight = prefs.weight(employee, day, Some(period)).unwrap_or(day_weight);
                    if let Some(var) = variables.var(e_idx, day, p_idx) {
                        weights[var.index()] = weight;
                    }
                }
            }
        }
        Ok(Self { weights })
    }

    /// Same weight for every variable.
    pub fn uniform(variables: &VariableSet, weight: i64) -> Self {
        Self {
            weights: vec![weight; variables.len()],
        }
    }

    pub fn get(&self, var: VarId) -> i64 {
        self.weights[var.index()]
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.weights
    }
}

/// Maps an externally keyed entry onto the declared variables.
pub(crate) fn check_key(
    catalog: &Catalog,
    variables: &VariableSet,
    employee: &EmployeeId,
    day: Day,
    period: Option<&PeriodId>,
) -> Result<(), ModelError> {
    let e_idx = catalog
        .employee_index(employee)
        .ok_or_else(|| ModelError::UnknownEmployee(employee.clone()))?;
    if day.number() == 0 || day.number() > catalog.horizon_days() {
        return Err(ModelError::DayOutOfHorizon(day));
    }
    if let Some(period) = period {
        let unknown = || ModelError::UnknownVariable {
            employee: employee.clone(),
            day,
            period: period.clone(),
        };
        let p_idx = catalog.period_index(period).ok_or_else(unknown)?;
        variables
            .get(VariableKey {
                employee: e_idx,
                day,
                period: p_idx,
            })
            .ok_or_else(unknown)?;
    }
    Ok(())
}
