//! Assignment materializer and end-to-end planning pipeline.
//!
//! `materialize` is a pure function of the solver output: it never searches
//! and never fills in a partial roster when the solver found nothing.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RosterConfig;
use crate::constraints::ModelBuilder;
use crate::domain::{Catalog, Day, EmployeeId, Period, PeriodId};
use crate::error::{InfeasibilityReport, RosterError};
use crate::model::ConstraintModel;
use crate::preferences::{PreferenceSource, WeightTable};
use crate::solver::{ConstraintSolver, SolveOutcome, SolveStatus};

/// Solved schedule: one optional period per (employee, day).
#[derive(Debug, Clone, PartialEq)]
pub struct Roster {
    catalog: Catalog,
    /// `[employee][day index]` to period index.
    cells: Vec<Vec<Option<usize>>>,
    hours: Vec<i64>,
    total_preference_cost: i64,
    objective_value: Option<i64>,
    status: SolveStatus,
    elapsed: Duration,
}

/// Hours worked by one employee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeHours {
    pub employee: EmployeeId,
    pub hours: i64,
    pub assigned_days: usize,
}

/// Summary statistics of a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSummary {
    pub status: SolveStatus,
    pub total_preference_cost: i64,
    pub objective_value: Option<i64>,
    pub assigned_shifts: usize,
    pub solve_time_ms: u64,
    pub employee_hours: Vec<EmployeeHours>,
}

impl Roster {
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn status(&self) -> SolveStatus {
        self.status
    }

    /// Period worked by `employee` (catalog index) on `day`, if any.
    pub fn assignment(&self, employee: usize, day: Day) -> Option<&Period> {
        self.cells
            .get(employee)
            .and_then(|row| row.get(day.index()))
            .copied()
            .flatten()
            .map(|p| self.catalog.period(p))
    }

    /// Same as `assignment`, keyed by id.
    pub fn period_of(&self, employee: &EmployeeId, day: Day) -> Option<&PeriodId> {
        let e_idx = self.catalog.employee_index(employee)?;
        self.assignment(e_idx, day).map(|p| &p.id)
    }

    pub fn hours_worked(&self, employee: usize) -> i64 {
        self.hours.get(employee).copied().unwrap_or(0)
    }

    /// Hours of `employee` in zero-based `week` (days `7w+1 ..= 7w+7`).
    pub fn weekly_hours(&self, employee: usize, week: u32) -> i64 {
        let first = week.saturating_mul(7).saturating_add(1);
        let last = first.saturating_add(6).min(self.catalog.horizon_days());
        (first..=last)
            .filter_map(|n| self.assignment(employee, Day::new(n)))
            .fold(0i64, |acc, p| acc.saturating_add(p.duration_hours))
    }

    /// Employees assigned to `period` on `day`.
    pub fn headcount(&self, day: Day, period: usize) -> usize {
        self.cells
            .iter()
            .filter(|row| row.get(day.index()).copied().flatten() == Some(period))
            .count()
    }

    pub fn total_preference_cost(&self) -> i64 {
        self.total_preference_cost
    }

    pub fn objective_value(&self) -> Option<i64> {
        self.objective_value
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn assigned_shifts(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    pub fn summary(&self) -> RosterSummary {
        RosterSummary {
            status: self.status,
            total_preference_cost: self.total_preference_cost,
            objective_value: self.objective_value,
            assigned_shifts: self.assigned_shifts(),
            solve_time_ms: self.elapsed.as_millis() as u64,
            employee_hours: self
                .catalog
                .employees()
                .iter()
                .enumerate()
                .map(|(e_idx, employee)| EmployeeHours {
                    employee: employee.clone(),
                    hours: self.hours[e_idx],
                    assigned_days: self.cells[e_idx].iter().filter(|c| c.is_some()).count(),
                })
                .collect(),
        }
    }
}

/// Turns a solver outcome into a roster, or into the typed reason there is
/// none.
pub fn materialize(
    catalog: &Catalog,
    model: &ConstraintModel,
    weights: &WeightTable,
    outcome: &SolveOutcome,
) -> Result<Roster, RosterError> {
    let valuation = match outcome.status {
        SolveStatus::Optimal | SolveStatus::Feasible => outcome
            .valuation
            .as_ref()
            .ok_or_else(|| RosterError::Solver("solver reported a solution without values".into()))?,
        SolveStatus::Infeasible => {
            return Err(RosterError::Infeasible(infeasibility_report(catalog, model)));
        }
        SolveStatus::Unknown => {
            return Err(RosterError::SolverTimeout {
                elapsed: outcome.elapsed,
            });
        }
        SolveStatus::Error => {
            return Err(RosterError::Solver(
                outcome.message.clone().unwrap_or_else(|| "unknown solver error".into()),
            ));
        }
    };

    let variables = model.variables();
    if valuation.len() != variables.len() || weights.len() != variables.len() {
        return Err(RosterError::Solver(format!(
            "valuation covers {} variables, weights {}, model declares {}",
            valuation.len(),
            weights.len(),
            variables.len()
        )));
    }

    let employee_count = catalog.employees().len();
    let mut cells = vec![vec![None; catalog.horizon_days() as usize]; employee_count];
    let mut hours = vec![0i64; employee_count];
    let mut total_preference_cost = 0i64;

    for (e_idx, employee) in catalog.employees().iter().enumerate() {
        for day in catalog.days() {
            let worked: Vec<usize> = catalog
                .periods_on(day)
                .iter()
                .copied()
                .filter(|&p| {
                    variables
                        .var(e_idx, day, p)
                        .is_some_and(|var| valuation.get(var))
                })
                .collect();
            match worked.as_slice() {
                [] => {}
                [p] => {
                    cells[e_idx][day.index()] = Some(*p);
                    hours[e_idx] = hours[e_idx].saturating_add(catalog.period(*p).duration_hours);
                }
                _ => {
                    return Err(RosterError::InvariantViolation {
                        employee: employee.clone(),
                        day,
                        periods: worked.iter().map(|&p| catalog.period(p).id.clone()).collect(),
                    });
                }
            }
        }
    }

    for var in valuation.true_vars() {
        total_preference_cost = total_preference_cost.saturating_add(weights.get(var));
    }

    debug!(
        cost = total_preference_cost,
        assigned = cells.iter().flatten().filter(|c| c.is_some()).count(),
        "Roster materialized"
    );

    Ok(Roster {
        catalog: catalog.clone(),
        cells,
        hours,
        total_preference_cost,
        objective_value: outcome.objective_value,
        status: outcome.status,
        elapsed: outcome.elapsed,
    })
}

fn infeasibility_report(catalog: &Catalog, model: &ConstraintModel) -> InfeasibilityReport {
    let parameters = model.parameters();
    InfeasibilityReport {
        employee_count: catalog.employees().len(),
        shift_count: catalog.shift_count(),
        min_per_shift: parameters.min_per_shift.unwrap_or(0),
        weekly_cap_hours: parameters.weekly_cap_hours,
        monthly_cap_hours: parameters.horizon_cap_hours,
    }
}

/// Builds the model for `catalog`, solves it and materializes the result.
///
/// Every call owns its model and variable set.
pub fn plan_roster(
    catalog: &Catalog,
    prefs: &dyn PreferenceSource,
    config: &RosterConfig,
    solver: &dyn ConstraintSolver,
) -> Result<Roster, RosterError> {
    let (model, weights) = build_model(catalog, prefs, config)?;
    let outcome = solver.solve(&model, &config.solver);

    info!(
        backend = solver.name(),
        status = outcome.status.as_str(),
        objective = outcome.objective_value,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "Solve ended"
    );

    if let Some(valuation) = &outcome.valuation {
        debug_assert!(model.violations(valuation).is_empty());
    }
    materialize(catalog, &model, &weights, &outcome)
}

/// Model and resolved weights for one planning run.
pub fn build_model(
    catalog: &Catalog,
    prefs: &dyn PreferenceSource,
    config: &RosterConfig,
) -> Result<(ConstraintModel, WeightTable), RosterError> {
    info!(
        employees = catalog.employees().len(),
        periods = catalog.periods().len(),
        days = catalog.horizon_days(),
        shifts = catalog.shift_count(),
        "Building roster model"
    );
    let mut builder = ModelBuilder::new(catalog);
    builder.apply_config(config, prefs)?;
    let weights = WeightTable::resolve(catalog, builder.variables(), prefs, config.preference_seed)?;
    builder.set_objective(&weights)?;
    Ok((builder.build(), weights))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RestDayPolicy, RestDaySelector};
    use crate::model::{declare_variables, Valuation};
    use crate::preferences::{NoPreferences, Presence, PreferenceStore};
    use crate::solver::MicroLpSolver;

    fn catalog(employees: usize, periods: Vec<Period>, days: u32) -> Catalog {
        Catalog::new(
            (0..employees).map(|i| EmployeeId::new(format!("E{}", i))).collect(),
            periods,
            days,
        )
        .unwrap()
    }

    fn empty_model(catalog: &Catalog) -> ConstraintModel {
        ModelBuilder::new(catalog).build()
    }

    #[test]
    fn test_materialize_synthetic_valuation() {
        let catalog = catalog(2, vec![Period::new("Morning", 8), Period::new("Night", 10)], 3);
        let model = empty_model(&catalog);
        let vars = model.variables();
        let weights = WeightTable::uniform(vars, 5);

        let mut valuation = Valuation::all_false(vars.len());
        valuation.set(vars.var(0, Day::new(1), 0).unwrap(), true);
        valuation.set(vars.var(0, Day::new(3), 1).unwrap(), true);
        valuation.set(vars.var(1, Day::new(2), 1).unwrap(), true);
        let outcome = SolveOutcome::solved(SolveStatus::Feasible, valuation, Some(15), Duration::from_millis(3));

        let roster = materialize(&catalog, &model, &weights, &outcome).unwrap();
        assert_eq!(roster.assignment(0, Day::new(1)).map(|p| p.id.as_str()), Some("Morning"));
        assert_eq!(roster.assignment(0, Day::new(2)), None);
        assert_eq!(
            roster.period_of(&EmployeeId::new("E1"), Day::new(2)),
            Some(&PeriodId::new("Night"))
        );
        assert_eq!(roster.hours_worked(0), 18);
        assert_eq!(roster.hours_worked(1), 10);
        assert_eq!(roster.total_preference_cost(), 15);
        assert_eq!(roster.headcount(Day::new(2), 1), 1);
        assert_eq!(roster.status(), SolveStatus::Feasible);

        let summary = roster.summary();
        assert_eq!(summary.assigned_shifts, 3);
        assert_eq!(summary.employee_hours[0].assigned_days, 2);
    }

    #[test]
    fn test_extreme_durations_and_weights_saturate() {
        let catalog = catalog(1, vec![Period::new("Forever", i64::MAX)], 3);
        let model = empty_model(&catalog);
        let vars = model.variables();
        let weights = WeightTable::uniform(vars, i64::MAX);
        let outcome = SolveOutcome::solved(
            SolveStatus::Optimal,
            Valuation::new(vec![true; vars.len()]),
            None,
            Duration::ZERO,
        );

        let roster = materialize(&catalog, &model, &weights, &outcome).unwrap();
        assert_eq!(roster.hours_worked(0), i64::MAX);
        assert_eq!(roster.weekly_hours(0, 0), i64::MAX);
        assert_eq!(roster.weekly_hours(0, u32::MAX), 0);
        assert_eq!(roster.total_preference_cost(), i64::MAX);
    }

    #[test]
    fn test_two_periods_same_day_fail_loudly() {
        let catalog = catalog(1, vec![Period::new("Morning", 8), Period::new("Night", 10)], 1);
        let model = empty_model(&catalog);
        let vars = model.variables();
        let weights = WeightTable::uniform(vars, 1);
        let outcome = SolveOutcome::solved(
            SolveStatus::Optimal,
            Valuation::new(vec![true; vars.len()]),
            None,
            Duration::ZERO,
        );

        match materialize(&catalog, &model, &weights, &outcome) {
            Err(RosterError::InvariantViolation { employee, day, periods }) => {
                assert_eq!(employee, EmployeeId::new("E0"));
                assert_eq!(day, Day::new(1));
                assert_eq!(periods.len(), 2);
            }
            other => panic!("expected invariant violation, got {:?}", other),
        }
    }

    #[test]
    fn test_no_roster_without_solution() {
        let catalog = catalog(1, vec![Period::new("Day", 8)], 7);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_minimum_staffing(2).unwrap();
        let model = builder.build();
        let weights = WeightTable::uniform(model.variables(), 1);

        match materialize(&catalog, &model, &weights, &SolveOutcome::infeasible(Duration::ZERO)) {
            Err(RosterError::Infeasible(report)) => {
                assert_eq!(report.employee_count, 1);
                assert_eq!(report.shift_count, 7);
                assert_eq!(report.min_per_shift, 2);
            }
            other => panic!("expected infeasible, got {:?}", other),
        }

        let timeout = SolveOutcome::unknown(Duration::from_secs(2));
        assert!(matches!(
            materialize(&catalog, &model, &weights, &timeout),
            Err(RosterError::SolverTimeout { .. })
        ));

        let failed = SolveOutcome::error("backend crashed", Duration::ZERO);
        assert!(matches!(
            materialize(&catalog, &model, &weights, &failed),
            Err(RosterError::Solver(msg)) if msg == "backend crashed"
        ));
    }

    #[test]
    fn test_short_valuation_is_rejected() {
        let catalog = catalog(1, vec![Period::new("Day", 8)], 2);
        let model = empty_model(&catalog);
        let weights = WeightTable::uniform(&declare_variables(&catalog), 1);
        let outcome = SolveOutcome::solved(SolveStatus::Optimal, Valuation::new(vec![true]), None, Duration::ZERO);
        assert!(matches!(
            materialize(&catalog, &model, &weights, &outcome),
            Err(RosterError::Solver(_))
        ));
    }

    fn uniform_prefs(catalog: &Catalog, weight: i64) -> PreferenceStore {
        let mut prefs = PreferenceStore::new();
        for employee in catalog.employees() {
            for day in catalog.days() {
                prefs.set_day_weight(employee.clone(), day, weight);
            }
        }
        prefs
    }

    #[test]
    fn test_three_employees_two_days() {
        let catalog = catalog(3, vec![Period::new("Day", 8)], 2);
        let config = RosterConfig {
            monthly_cap_hours: None,
            rest_day: None,
            ..Default::default()
        };
        let roster = plan_roster(&catalog, &uniform_prefs(&catalog, 1), &config, &MicroLpSolver).unwrap();

        for day in catalog.days() {
            assert!(roster.headcount(day, 0) >= 1);
        }
        for e_idx in 0..3 {
            assert!(roster.hours_worked(e_idx) <= 16);
        }
        assert_eq!(roster.total_preference_cost(), 2);
        assert_eq!(roster.objective_value(), Some(2));
    }

    #[test]
    fn test_fifty_hours_over_weekly_cap() {
        let catalog = catalog(1, vec![Period::new("Long", 25)], 2);
        let config = RosterConfig {
            monthly_cap_hours: None,
            rest_day: None,
            ..Default::default()
        };
        let err = plan_roster(&catalog, &NoPreferences, &config, &MicroLpSolver).unwrap_err();
        assert!(matches!(err, RosterError::Infeasible(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_staffing_floor_above_headcount() {
        let catalog = catalog(2, vec![Period::new("Day", 8)], 7);
        let config = RosterConfig {
            min_per_shift: 3,
            ..Default::default()
        };
        let err = plan_roster(&catalog, &NoPreferences, &config, &MicroLpSolver).unwrap_err();
        match err {
            RosterError::Infeasible(report) => {
                assert_eq!(report.min_per_shift, 3);
                assert_eq!(report.employee_count, 2);
            }
            other => panic!("expected infeasible, got {:?}", other),
        }
    }

    #[test]
    fn test_rest_days_never_both_worked() {
        let catalog = catalog(2, vec![Period::new("Day", 8)], 14);
        let config = RosterConfig {
            rest_day: Some(RestDayPolicy::new(
                14,
                RestDaySelector::Days {
                    days: vec![Day::new(7), Day::new(14)],
                },
            )),
            ..Default::default()
        };
        let roster = plan_roster(&catalog, &NoPreferences, &config, &MicroLpSolver).unwrap();
        for e_idx in 0..2 {
            let both = roster.assignment(e_idx, Day::new(7)).is_some()
                && roster.assignment(e_idx, Day::new(14)).is_some();
            assert!(!both);
            assert!(roster.weekly_hours(e_idx, 0) <= 48);
            assert!(roster.weekly_hours(e_idx, 1) <= 48);
        }
        for day in catalog.days() {
            assert!(roster.headcount(day, 0) >= 1);
        }
    }

    #[test]
    fn test_presence_is_honored() {
        let catalog = catalog(2, vec![Period::new("Day", 8)], 3);
        let prefs = PreferenceStore::new()
            .with_presence("E0", 2, Presence::Absent)
            .with_presence("E0", 3, Presence::Required)
            .with_day_weight("E0", 3, 40);
        let config = RosterConfig {
            rest_day: None,
            ..Default::default()
        };
        let roster = plan_roster(&catalog, &prefs, &config, &MicroLpSolver).unwrap();
        assert!(roster.assignment(0, Day::new(2)).is_none());
        assert!(roster.assignment(0, Day::new(3)).is_some());
        assert!(roster.assignment(1, Day::new(2)).is_some());
    }

    #[test]
    fn test_same_inputs_same_cost() {
        let periods = vec![Period::new("Morning", 8), Period::new("Evening", 8)];
        let catalog = catalog(3, periods, 7);
        let config = RosterConfig {
            preference_seed: 11,
            ..Default::default()
        };
        let first = plan_roster(&catalog, &NoPreferences, &config, &MicroLpSolver).unwrap();
        let second = plan_roster(&catalog, &NoPreferences, &config, &MicroLpSolver).unwrap();
        assert_eq!(first.total_preference_cost(), second.total_preference_cost());
        assert_eq!(first.objective_value(), Some(first.total_preference_cost()));
    }

    #[test]
    fn test_construction_errors_abort_before_solving() {
        let catalog = catalog(1, vec![Period::new("Day", 8)], 10);
        let config = RosterConfig {
            strict_weeks: true,
            ..Default::default()
        };
        let err = plan_roster(&catalog, &NoPreferences, &config, &MicroLpSolver).unwrap_err();
        assert!(matches!(err, RosterError::Model(_)));
        assert!(!err.is_recoverable());
    }
}
