//! Solver-independent constraint model.
//!
//! One boolean assignment variable per (employee, shift), stored densely:
//! variable `e * shift_count + s` is employee `e` working shift `s`. The
//! index is a pure function of the catalog, so any component can re-derive
//! a variable's identity without a separate mapping.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{Catalog, Day, Shift};

/// Dense handle of an assignment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Composite key of an assignment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableKey {
    /// Index into `Catalog::employees`.
    pub employee: usize,
    pub day: Day,
    /// Index into `Catalog::periods`.
    pub period: usize,
}

/// The declared assignment variables of one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSet {
    employee_count: usize,
    shifts: Vec<Shift>,
    /// `[day index][period index]` to shift index.
    shift_lookup: Vec<Vec<Option<usize>>>,
}

/// Declares one variable per (employee, shift) of the catalog.
///
/// Deterministic: identical catalogs always yield identical sets.
pub fn declare_variables(catalog: &Catalog) -> VariableSet {
    let shifts = catalog.shifts();
    let mut shift_lookup = vec![vec![None; catalog.periods().len()]; catalog.horizon_days() as usize];
    for (idx, shift) in shifts.iter().enumerate() {
        shift_lookup[shift.day.index()][shift.period] = Some(idx);
    }
    VariableSet {
        employee_count: catalog.employees().len(),
        shifts,
        shift_lookup,
    }
}

impl VariableSet {
    pub fn len(&self) -> usize {
        self.employee_count * self.shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn employee_count(&self) -> usize {
        self.employee_count
    }

    pub fn shift_count(&self) -> usize {
        self.shifts.len()
    }

    pub fn shifts(&self) -> &[Shift] {
        &self.shifts
    }

    pub fn shift_index(&self, day: Day, period: usize) -> Option<usize> {
        self.shift_lookup
            .get(day.index())
            .and_then(|periods| periods.get(period))
            .copied()
            .flatten()
    }

    /// Looks up the variable for a key, `None` if it was never declared.
    pub fn get(&self, key: VariableKey) -> Option<VarId> {
        if key.employee >= self.employee_count {
            return None;
        }
        self.shift_index(key.day, key.period)
            .map(|s| VarId(key.employee * self.shifts.len() + s))
    }

    pub fn var(&self, employee: usize, day: Day, period: usize) -> Option<VarId> {
        self.get(VariableKey {
            employee,
            day,
            period,
        })
    }

    pub fn key(&self, var: VarId) -> VariableKey {
        let shift = self.shifts[var.0 % self.shifts.len()];
        VariableKey {
            employee: var.0 / self.shifts.len(),
            day: shift.day,
            period: shift.period,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, VariableKey)> + '_ {
        (0..self.len()).map(move |i| (VarId(i), self.key(VarId(i))))
    }

    /// Variables of one employee on one day, in period order.
    pub fn day_vars(&self, employee: usize, day: Day) -> Vec<VarId> {
        match self.shift_lookup.get(day.index()) {
            Some(periods) => periods
                .iter()
                .flatten()
                .map(|&s| VarId(employee * self.shifts.len() + s))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Variables of every employee for one shift.
    pub fn shift_vars(&self, shift: usize) -> Vec<VarId> {
        (0..self.employee_count)
            .map(|e| VarId(e * self.shifts.len() + shift))
            .collect()
    }

    /// Stable human-readable variable name, e.g. `Alice_d3_Morning`.
    pub fn name(&self, catalog: &Catalog, var: VarId) -> String {
        let key = self.key(var);
        format!(
            "{}_d{}_{}",
            catalog.employees()[key.employee],
            key.day,
            catalog.period(key.period).id
        )
    }
}

/// A value for every declared variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Valuation(Vec<bool>);

impl Valuation {
    pub fn new(values: Vec<bool>) -> Self {
        Self(values)
    }

    pub fn all_false(len: usize) -> Self {
        Self(vec![false; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, var: VarId) -> bool {
        self.0.get(var.0).copied().unwrap_or(false)
    }

    pub fn set(&mut self, var: VarId, value: bool) {
        self.0[var.0] = value;
    }

    pub fn true_vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| VarId(i))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparison {
    LessOrEqual,
    GreaterOrEqual,
    Equal,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparison::LessOrEqual => "<=",
            Comparison::GreaterOrEqual => ">=",
            Comparison::Equal => "==",
        })
    }
}

/// `Σ coefficient × var  (<=|>=|==)  bound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub label: String,
    pub terms: Vec<(VarId, i64)>,
    pub comparison: Comparison,
    pub bound: i64,
}

impl LinearConstraint {
    pub fn new(
        label: impl Into<String>,
        terms: Vec<(VarId, i64)>,
        comparison: Comparison,
        bound: i64,
    ) -> Self {
        Self {
            label: label.into(),
            terms,
            comparison,
            bound,
        }
    }

    /// Unit-coefficient sum of `vars`.
    pub fn sum(label: impl Into<String>, vars: &[VarId], comparison: Comparison, bound: i64) -> Self {
        Self::new(label, vars.iter().map(|&v| (v, 1)).collect(), comparison, bound)
    }

    pub fn lhs(&self, valuation: &Valuation) -> i64 {
        self.terms
            .iter()
            .filter(|(var, _)| valuation.get(*var))
            .fold(0i64, |acc, (_, coef)| acc.saturating_add(*coef))
    }

    pub fn is_satisfied_by(&self, valuation: &Valuation) -> bool {
        let lhs = self.lhs(valuation);
        match self.comparison {
            Comparison::LessOrEqual => lhs <= self.bound,
            Comparison::GreaterOrEqual => lhs >= self.bound,
            Comparison::Equal => lhs == self.bound,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub var: VarId,
    pub negated: bool,
}

impl Literal {
    pub fn positive(var: VarId) -> Self {
        Self { var, negated: false }
    }

    pub fn negative(var: VarId) -> Self {
        Self { var, negated: true }
    }

    pub fn holds(&self, valuation: &Valuation) -> bool {
        valuation.get(self.var) != self.negated
    }
}

/// At least one literal must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disjunction {
    pub label: String,
    pub literals: Vec<Literal>,
}

impl Disjunction {
    /// `¬a ∨ ¬b`: not both.
    pub fn not_both(label: impl Into<String>, a: VarId, b: VarId) -> Self {
        Self {
            label: label.into(),
            literals: vec![Literal::negative(a), Literal::negative(b)],
        }
    }

    pub fn is_satisfied_by(&self, valuation: &Valuation) -> bool {
        self.literals.iter().any(|l| l.holds(valuation))
    }
}

/// Kinds of hard constraints. Each kind is installed at most once per model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintFamily {
    DailyExclusivity,
    MinimumStaffing,
    WeeklyHours,
    HorizonHours,
    RestDay,
    IntraDayRest,
    CrossDayRest,
    Presence,
}

impl fmt::Display for ConstraintFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConstraintFamily::DailyExclusivity => "daily-exclusivity",
            ConstraintFamily::MinimumStaffing => "minimum-staffing",
            ConstraintFamily::WeeklyHours => "weekly-hours",
            ConstraintFamily::HorizonHours => "horizon-hours",
            ConstraintFamily::RestDay => "rest-day",
            ConstraintFamily::IntraDayRest => "intra-day-rest",
            ConstraintFamily::CrossDayRest => "cross-day-rest",
            ConstraintFamily::Presence => "presence",
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstraintGroup {
    pub linear: Vec<LinearConstraint>,
    pub disjunctions: Vec<Disjunction>,
}

impl ConstraintGroup {
    pub fn len(&self) -> usize {
        self.linear.len() + self.disjunctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Linear objective to minimize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Objective {
    pub terms: Vec<(VarId, i64)>,
}

impl Objective {
    pub fn value(&self, valuation: &Valuation) -> i64 {
        self.terms
            .iter()
            .filter(|(var, _)| valuation.get(*var))
            .fold(0i64, |acc, (_, w)| acc.saturating_add(*w))
    }
}

/// Bounds the model was built with, kept for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelParameters {
    pub min_per_shift: Option<u32>,
    pub weekly_cap_hours: Option<i64>,
    pub horizon_cap_hours: Option<i64>,
}

/// Variables, hard constraints and an optional objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintModel {
    variables: VariableSet,
    groups: BTreeMap<ConstraintFamily, ConstraintGroup>,
    objective: Option<Objective>,
    parameters: ModelParameters,
}

impl ConstraintModel {
    pub(crate) fn from_parts(
        variables: VariableSet,
        groups: BTreeMap<ConstraintFamily, ConstraintGroup>,
        objective: Option<Objective>,
        parameters: ModelParameters,
    ) -> Self {
        Self {
            variables,
            groups,
            objective,
            parameters,
        }
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.parameters
    }

    pub fn group(&self, family: ConstraintFamily) -> Option<&ConstraintGroup> {
        self.groups.get(&family)
    }

    pub fn families(&self) -> impl Iterator<Item = ConstraintFamily> + '_ {
        self.groups.keys().copied()
    }

    pub fn linear_constraints(&self) -> impl Iterator<Item = &LinearConstraint> {
        self.groups.values().flat_map(|g| g.linear.iter())
    }

    pub fn disjunctions(&self) -> impl Iterator<Item = &Disjunction> {
        self.groups.values().flat_map(|g| g.disjunctions.iter())
    }

    pub fn constraint_count(&self) -> usize {
        self.groups.values().map(ConstraintGroup::len).sum()
    }

    /// Labels of every hard constraint `valuation` breaks.
    pub fn violations(&self, valuation: &Valuation) -> Vec<String> {
        let mut out = Vec::new();
        if valuation.len() != self.variables.len() {
            out.push(format!(
                "valuation has {} values for {} variables",
                valuation.len(),
                self.variables.len()
            ));
            return out;
        }
        for c in self.linear_constraints() {
            if !c.is_satisfied_by(valuation) {
                out.push(format!("{}: {} {} {}", c.label, c.lhs(valuation), c.comparison, c.bound));
            }
        }
        for d in self.disjunctions() {
            if !d.is_satisfied_by(valuation) {
                out.push(d.label.clone());
            }
        }
        out
    }
}
