//! Hard constraints and objective for the rostering model.
//!
//! `ModelBuilder` declares the assignment variables up front and then adds
//! constraint families on request. Each family is stored under its own key,
//! so adding a family twice replaces it instead of stacking a second copy,
//! and the final constraint set does not depend on the order families were
//! added in.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{RestDayPolicy, RosterConfig};
use crate::domain::{Catalog, Day};
use crate::error::ModelError;
use crate::model::{
    declare_variables, Comparison, ConstraintFamily, ConstraintGroup, ConstraintModel,
    Disjunction, LinearConstraint, ModelParameters, Objective, VarId, VariableSet,
};
use crate::preferences::{check_key, Presence, PreferenceSource, WeightTable};

pub struct ModelBuilder<'a> {
    catalog: &'a Catalog,
    variables: VariableSet,
    groups: BTreeMap<ConstraintFamily, ConstraintGroup>,
    objective: Option<Objective>,
    parameters: ModelParameters,
}

impl<'a> ModelBuilder<'a> {
    /// Declares one variable per (employee, shift); no constraints yet.
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            variables: declare_variables(catalog),
            groups: BTreeMap::new(),
            objective: None,
            parameters: ModelParameters::default(),
        }
    }

    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Adds every family `config` enables plus the presence flags of `prefs`.
    pub fn apply_config(
        &mut self,
        config: &RosterConfig,
        prefs: &dyn PreferenceSource,
    ) -> Result<&mut Self, ModelError> {
        config.check_catalog(self.catalog)?;
        self.add_daily_exclusivity();
        self.add_minimum_staffing(config.min_per_shift)?;
        self.add_hour_caps(config.weekly_cap_hours, config.monthly_cap_hours)?;
        match &config.rest_day {
            Some(policy) => {
                self.add_rest_day_policy(policy)?;
            }
            None => self.remove(ConstraintFamily::RestDay),
        }
        if config.intra_day_rest {
            self.add_intra_day_rest();
        } else {
            self.remove(ConstraintFamily::IntraDayRest);
        }
        match config.min_rest_hours {
            Some(hours) => {
                self.add_cross_day_rest(hours);
            }
            None => self.remove(ConstraintFamily::CrossDayRest),
        }
        self.add_presence_constraints(prefs)?;
        Ok(self)
    }

    // =========================================================================
    // HARD: One Period Per Day
    // =========================================================================

    /// For every (employee, day): the day's period variables sum to at most 1.
    pub fn add_daily_exclusivity(&mut self) -> &mut Self {
        let mut group = ConstraintGroup::default();
        for (e_idx, employee) in self.catalog.employees().iter().enumerate() {
            for day in self.catalog.days() {
                let vars = self.variables.day_vars(e_idx, day);
                if vars.len() > 1 {
                    group.linear.push(LinearConstraint::sum(
                        format!("one-period-per-day[{},d{}]", employee, day),
                        &vars,
                        Comparison::LessOrEqual,
                        1,
                    ));
                }
            }
        }
        self.install(ConstraintFamily::DailyExclusivity, group);
        self
    }

    // =========================================================================
    // HARD: Minimum Staffing
    // =========================================================================

    /// For every shift: at least `min_per_shift` employees assigned.
    pub fn add_minimum_staffing(&mut self, min_per_shift: u32) -> Result<&mut Self, ModelError> {
        if min_per_shift == 0 {
            return Err(ModelError::InvalidStaffingFloor);
        }
        let mut group = ConstraintGroup::default();
        for (s_idx, shift) in self.variables.shifts().iter().enumerate() {
            group.linear.push(LinearConstraint::sum(
                format!(
                    "staffing[d{},{}]",
                    shift.day,
                    self.catalog.period(shift.period).id
                ),
                &self.variables.shift_vars(s_idx),
                Comparison::GreaterOrEqual,
                i64::from(min_per_shift),
            ));
        }
        self.parameters.min_per_shift = Some(min_per_shift);
        self.install(ConstraintFamily::MinimumStaffing, group);
        Ok(self)
    }

    // =========================================================================
    // HARD: Working Hour Caps
    // =========================================================================

    /// Per employee: hours in every 7-day week at most `weekly_cap`, hours
    /// over the whole horizon at most `horizon_cap`. `None` drops the cap.
    ///
    /// A trailing partial week is capped like a full one.
    pub fn add_hour_caps(
        &mut self,
        weekly_cap: Option<i64>,
        horizon_cap: Option<i64>,
    ) -> Result<&mut Self, ModelError> {
        match weekly_cap {
            Some(cap) => {
                let mut group = ConstraintGroup::default();
                for e_idx in 0..self.catalog.employees().len() {
                    for week in 0..self.catalog.week_count() {
                        let first = week * 7 + 1;
                        let last = (first + 6).min(self.catalog.horizon_days());
                        let terms = self.hour_terms(e_idx, first..=last);
                        group.linear.push(LinearConstraint::new(
                            format!(
                                "weekly-hours[{},w{}]",
                                self.catalog.employees()[e_idx],
                                week + 1
                            ),
                            terms,
                            Comparison::LessOrEqual,
                            cap,
                        ));
                    }
                }
                self.install(ConstraintFamily::WeeklyHours, group);
            }
            None => self.remove(ConstraintFamily::WeeklyHours),
        }
        self.parameters.weekly_cap_hours = weekly_cap;

        match horizon_cap {
            Some(cap) => {
                let mut group = ConstraintGroup::default();
                for e_idx in 0..self.catalog.employees().len() {
                    // One expression per employee, never a shared aggregate.
                    let terms = self.hour_terms(e_idx, 1..=self.catalog.horizon_days());
                    group.linear.push(LinearConstraint::new(
                        format!("horizon-hours[{}]", self.catalog.employees()[e_idx]),
                        terms,
                        Comparison::LessOrEqual,
                        cap,
                    ));
                }
                self.install(ConstraintFamily::HorizonHours, group);
            }
            None => self.remove(ConstraintFamily::HorizonHours),
        }
        self.parameters.horizon_cap_hours = horizon_cap;
        Ok(self)
    }

    /// `(variable, period duration)` for one employee over a day range.
    fn hour_terms(&self, e_idx: usize, days: std::ops::RangeInclusive<u32>) -> Vec<(VarId, i64)> {
        let mut terms = Vec::new();
        for n in days {
            let day = Day::new(n);
            for &p_idx in self.catalog.periods_on(day) {
                if let Some(var) = self.variables.var(e_idx, day, p_idx) {
                    terms.push((var, self.catalog.period(p_idx).duration_hours));
                }
            }
        }
        terms
    }

    // =========================================================================
    // HARD: Rest Day Every Block
    // =========================================================================

    /// Per employee and block: the designated rest days are worked at most
    /// once, so at least one of them stays free.
    pub fn add_rest_day_policy(&mut self, policy: &RestDayPolicy) -> Result<&mut Self, ModelError> {
        let blocks = policy.blocks(self.catalog)?;
        let mut group = ConstraintGroup::default();
        for (e_idx, employee) in self.catalog.employees().iter().enumerate() {
            for (b_idx, days) in blocks.iter().enumerate() {
                if days.is_empty() {
                    continue;
                }
                let vars: Vec<VarId> = days
                    .iter()
                    .flat_map(|&day| self.variables.day_vars(e_idx, day))
                    .collect();
                group.linear.push(LinearConstraint::sum(
                    format!("rest-day[{},b{}]", employee, b_idx + 1),
                    &vars,
                    Comparison::LessOrEqual,
                    1,
                ));
            }
        }
        self.install(ConstraintFamily::RestDay, group);
        Ok(self)
    }

    // =========================================================================
    // HARD: Rest Between Periods
    // =========================================================================

    /// Per employee and day: no two distinct periods both worked.
    pub fn add_intra_day_rest(&mut self) -> &mut Self {
        let mut group = ConstraintGroup::default();
        for (e_idx, employee) in self.catalog.employees().iter().enumerate() {
            for day in self.catalog.days() {
                let vars = self.variables.day_vars(e_idx, day);
                for i in 0..vars.len() {
                    for j in (i + 1)..vars.len() {
                        group.disjunctions.push(Disjunction::not_both(
                            format!("intra-day-rest[{},d{},{}|{}]", employee, day, i, j),
                            vars[i],
                            vars[j],
                        ));
                    }
                }
            }
        }
        self.install(ConstraintFamily::IntraDayRest, group);
        self
    }

    /// Per employee: a period on day d and one on day d+1 whose clock gap is
    /// below `min_rest_hours` are not both worked. Periods without a start
    /// hour are exempt.
    pub fn add_cross_day_rest(&mut self, min_rest_hours: u32) -> &mut Self {
        let mut group = ConstraintGroup::default();
        let min_rest = i64::from(min_rest_hours);
        for (e_idx, employee) in self.catalog.employees().iter().enumerate() {
            for day in self.catalog.days().take_while(|d| d.number() < self.catalog.horizon_days()) {
                let next = day.next();
                for &p in self.catalog.periods_on(day) {
                    let Some(end) = self.catalog.period(p).end_hour() else {
                        continue;
                    };
                    for &q in self.catalog.periods_on(next) {
                        let Some(start) = self.catalog.period(q).start_hour else {
                            continue;
                        };
                        if 24 + i64::from(start) - end >= min_rest {
                            continue;
                        }
                        if let (Some(a), Some(b)) = (
                            self.variables.var(e_idx, day, p),
                            self.variables.var(e_idx, next, q),
                        ) {
                            group.disjunctions.push(Disjunction::not_both(
                                format!(
                                    "cross-day-rest[{},d{}:{}|d{}:{}]",
                                    employee,
                                    day,
                                    self.catalog.period(p).id,
                                    next,
                                    self.catalog.period(q).id
                                ),
                                a,
                                b,
                            ));
                        }
                    }
                }
            }
        }
        self.install(ConstraintFamily::CrossDayRest, group);
        self
    }

    // =========================================================================
    // HARD: Presence Flags
    // =========================================================================

    /// `Required` days are worked, `Absent` days are not.
    pub fn add_presence_constraints(
        &mut self,
        prefs: &dyn PreferenceSource,
    ) -> Result<&mut Self, ModelError> {
        let mut group = ConstraintGroup::default();
        for (employee, day, presence) in prefs.presence_flags() {
            check_key(self.catalog, &self.variables, &employee, day, None)?;
            let e_idx = self
                .catalog
                .employee_index(&employee)
                .ok_or_else(|| ModelError::UnknownEmployee(employee.clone()))?;
            let vars = self.variables.day_vars(e_idx, day);
            let (label, comparison, bound) = match presence {
                Presence::Required => ("required", Comparison::GreaterOrEqual, 1),
                Presence::Absent => ("absent", Comparison::LessOrEqual, 0),
            };
            group.linear.push(LinearConstraint::sum(
                format!("{}[{},d{}]", label, employee, day),
                &vars,
                comparison,
                bound,
            ));
        }
        if group.is_empty() {
            self.remove(ConstraintFamily::Presence);
        } else {
            self.install(ConstraintFamily::Presence, group);
        }
        Ok(self)
    }

    // =========================================================================
    // SOFT: Preference Cost
    // =========================================================================

    /// Minimize `Σ weight × variable`. Without an objective the model is a
    /// pure feasibility problem.
    pub fn set_objective(&mut self, weights: &WeightTable) -> Result<&mut Self, ModelError> {
        if weights.len() != self.variables.len() {
            return Err(ModelError::WeightTableMismatch {
                expected: self.variables.len(),
                actual: weights.len(),
            });
        }
        let terms = self
            .variables
            .iter()
            .map(|(var, _)| (var, weights.get(var)))
            .filter(|(_, w)| *w != 0)
            .collect();
        self.objective = Some(Objective { terms });
        Ok(self)
    }

    pub fn clear_objective(&mut self) -> &mut Self {
        self.objective = None;
        self
    }

    pub fn build(self) -> ConstraintModel {
        debug!(
            variables = self.variables.len(),
            constraints = self.groups.values().map(ConstraintGroup::len).sum::<usize>(),
            has_objective = self.objective.is_some(),
            "Constraint model built"
        );
        ConstraintModel::from_parts(self.variables, self.groups, self.objective, self.parameters)
    }

    fn install(&mut self, family: ConstraintFamily, group: ConstraintGroup) {
        let count = group.len();
        if self.groups.insert(family, group).is_some() {
            debug!(%family, constraints = count, "Constraint family replaced");
        } else {
            debug!(%family, constraints = count, "Constraint family added");
        }
    }

    fn remove(&mut self, family: ConstraintFamily) {
        if self.groups.remove(&family).is_some() {
            debug!(%family, "Constraint family removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestDaySelector;
    use crate::domain::{EmployeeId, Period, PeriodId};
    use crate::model::Valuation;
    use crate::preferences::{NoPreferences, PreferenceStore};

    fn catalog(employees: usize, periods: Vec<Period>, days: u32) -> Catalog {
        Catalog::new(
            (0..employees).map(|i| EmployeeId::new(format!("E{}", i))).collect(),
            periods,
            days,
        )
        .unwrap()
    }

    fn three_periods() -> Vec<Period> {
        vec![
            Period::new("Morning", 8).with_start_hour(6),
            Period::new("Day", 8).with_start_hour(9),
            Period::new("Evening", 8).with_start_hour(14),
        ]
    }

    #[test]
    fn test_daily_exclusivity_counts() {
        let catalog = catalog(2, three_periods(), 7);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_daily_exclusivity();
        let model = builder.build();
        let group = model.group(ConstraintFamily::DailyExclusivity).unwrap();
        assert_eq!(group.linear.len(), 2 * 7);
        assert!(group.linear.iter().all(|c| c.terms.len() == 3 && c.bound == 1));
    }

    #[test]
    fn test_repeated_families_do_not_stack() {
        let catalog = catalog(3, three_periods(), 14);
        let mut once = ModelBuilder::new(&catalog);
        once.add_minimum_staffing(1).unwrap().add_daily_exclusivity();

        let mut twice = ModelBuilder::new(&catalog);
        twice
            .add_daily_exclusivity()
            .add_minimum_staffing(2)
            .unwrap()
            .add_minimum_staffing(1)
            .unwrap()
            .add_daily_exclusivity();

        assert_eq!(once.build(), twice.build());
    }

    #[test]
    fn test_construction_order_does_not_matter() {
        let catalog = catalog(3, three_periods(), 14);
        let mut a = ModelBuilder::new(&catalog);
        a.add_intra_day_rest()
            .add_hour_caps(Some(48), Some(174))
            .unwrap()
            .add_daily_exclusivity();
        let mut b = ModelBuilder::new(&catalog);
        b.add_daily_exclusivity()
            .add_hour_caps(Some(48), Some(174))
            .unwrap()
            .add_intra_day_rest();
        assert_eq!(a.build(), b.build());
    }

    #[test]
    fn test_zero_staffing_floor_rejected() {
        let catalog = catalog(1, three_periods(), 7);
        let mut builder = ModelBuilder::new(&catalog);
        assert!(matches!(
            builder.add_minimum_staffing(0),
            Err(ModelError::InvalidStaffingFloor)
        ));
    }

    #[test]
    fn test_hour_caps_use_period_durations() {
        let periods = vec![Period::new("Day", 8), Period::new("Night", 10)];
        let catalog = catalog(2, periods, 10);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_hour_caps(Some(48), Some(174)).unwrap();
        let model = builder.build();

        let weekly = model.group(ConstraintFamily::WeeklyHours).unwrap();
        // Two weeks per employee, the second one partial.
        assert_eq!(weekly.linear.len(), 4);
        assert_eq!(weekly.linear[0].terms.len(), 14);
        assert_eq!(weekly.linear[1].terms.len(), 6);
        let coefficients: Vec<i64> = weekly.linear[0].terms.iter().map(|(_, c)| *c).take(2).collect();
        assert_eq!(coefficients, vec![8, 10]);

        let horizon = model.group(ConstraintFamily::HorizonHours).unwrap();
        // Per employee, never one shared expression.
        assert_eq!(horizon.linear.len(), 2);
        let first: Vec<VarId> = horizon.linear[0].terms.iter().map(|(v, _)| *v).collect();
        let second: Vec<VarId> = horizon.linear[1].terms.iter().map(|(v, _)| *v).collect();
        assert!(first.iter().all(|v| !second.contains(v)));
        assert_eq!(model.parameters().weekly_cap_hours, Some(48));
    }

    #[test]
    fn test_dropping_a_cap_removes_the_family() {
        let catalog = catalog(1, three_periods(), 7);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_hour_caps(Some(48), Some(174)).unwrap();
        builder.add_hour_caps(None, Some(174)).unwrap();
        let model = builder.build();
        assert!(model.group(ConstraintFamily::WeeklyHours).is_none());
        assert!(model.group(ConstraintFamily::HorizonHours).is_some());
    }

    #[test]
    fn test_rest_day_forbids_working_both_rest_days() {
        let catalog = catalog(1, vec![Period::new("Day", 8)], 14);
        let mut builder = ModelBuilder::new(&catalog);
        builder
            .add_rest_day_policy(&RestDayPolicy::new(14, RestDaySelector::LastDayOfWeek))
            .unwrap();
        let model = builder.build();
        let vars = model.variables().clone();

        let mut both = Valuation::all_false(vars.len());
        both.set(vars.var(0, Day::new(7), 0).unwrap(), true);
        both.set(vars.var(0, Day::new(14), 0).unwrap(), true);
        assert_eq!(model.violations(&both).len(), 1);

        let mut one = Valuation::all_false(vars.len());
        one.set(vars.var(0, Day::new(14), 0).unwrap(), true);
        assert!(model.violations(&one).is_empty());
    }

    #[test]
    fn test_intra_day_rest_pairs() {
        let catalog = catalog(2, three_periods(), 2);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_intra_day_rest();
        let model = builder.build();
        // 3 unordered pairs per (employee, day).
        assert_eq!(model.disjunctions().count(), 3 * 2 * 2);
    }

    #[test]
    fn test_cross_day_rest() {
        let periods = vec![
            Period::new("Morning", 8).with_start_hour(6),
            Period::new("Evening", 8).with_start_hour(14),
            Period::new("Night", 10).with_start_hour(21),
            Period::new("Floating", 4),
        ];
        let catalog = catalog(1, periods, 2);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_cross_day_rest(11);
        let model = builder.build();
        let labels: Vec<&str> = model.disjunctions().map(|d| d.label.as_str()).collect();
        // Evening -> Morning (8h), Night -> Morning (-1h), Night -> Evening (7h).
        assert_eq!(labels.len(), 3);
        assert!(labels.contains(&"cross-day-rest[E0,d1:Evening|d2:Morning]"));
        assert!(labels.contains(&"cross-day-rest[E0,d1:Night|d2:Morning]"));
        assert!(labels.contains(&"cross-day-rest[E0,d1:Night|d2:Evening]"));
    }

    #[test]
    fn test_presence_constraints() {
        let catalog = catalog(2, three_periods(), 7);
        let prefs = PreferenceStore::new()
            .with_presence("E0", 2, Presence::Absent)
            .with_presence("E1", 3, Presence::Required);
        let mut builder = ModelBuilder::new(&catalog);
        builder.add_presence_constraints(&prefs).unwrap();
        let model = builder.build();
        let group = model.group(ConstraintFamily::Presence).unwrap();
        assert_eq!(group.linear.len(), 2);
        assert_eq!(group.linear[0].comparison, Comparison::LessOrEqual);
        assert_eq!(group.linear[0].bound, 0);
        assert_eq!(group.linear[1].comparison, Comparison::GreaterOrEqual);

        let unknown = PreferenceStore::new().with_presence("Nobody", 1, Presence::Absent);
        let mut builder = ModelBuilder::new(&catalog);
        assert!(matches!(
            builder.add_presence_constraints(&unknown),
            Err(ModelError::UnknownEmployee(_))
        ));
    }

    #[test]
    fn test_objective() {
        let catalog = catalog(2, three_periods(), 1);
        let mut builder = ModelBuilder::new(&catalog);
        let weights = WeightTable::resolve(&catalog, builder.variables(), &NoPreferences, 7).unwrap();
        builder.set_objective(&weights).unwrap();
        let model = builder.build();
        let objective = model.objective().unwrap();
        assert_eq!(objective.terms.len(), 6);

        let other = catalog.clone();
        let small = Catalog::new(vec![EmployeeId::new("x")], vec![Period::new("p", 1)], 1).unwrap();
        let mismatched = WeightTable::uniform(&declare_variables(&small), 1);
        let mut builder = ModelBuilder::new(&other);
        assert!(matches!(
            builder.set_objective(&mismatched),
            Err(ModelError::WeightTableMismatch { expected: 6, actual: 1 })
        ));
    }

    #[test]
    fn test_apply_config_strict_weeks() {
        let catalog = catalog(2, three_periods(), 10);
        let config = RosterConfig {
            strict_weeks: true,
            ..Default::default()
        };
        let mut builder = ModelBuilder::new(&catalog);
        assert!(matches!(
            builder.apply_config(&config, &NoPreferences),
            Err(ModelError::PartialWeek { days: 10 })
        ));
    }

    #[test]
    fn test_apply_config_families() {
        let catalog = catalog(3, three_periods(), 14)
            .with_day_periods(Day::new(14), &[PeriodId::new("Day")])
            .unwrap();
        let config = RosterConfig {
            min_rest_hours: Some(11),
            ..Default::default()
        };
        let mut builder = ModelBuilder::new(&catalog);
        builder.apply_config(&config, &NoPreferences).unwrap();
        let model = builder.build();
        let families: Vec<ConstraintFamily> = model.families().collect();
        assert_eq!(
            families,
            vec![
                ConstraintFamily::DailyExclusivity,
                ConstraintFamily::MinimumStaffing,
                ConstraintFamily::WeeklyHours,
                ConstraintFamily::HorizonHours,
                ConstraintFamily::RestDay,
                ConstraintFamily::IntraDayRest,
                ConstraintFamily::CrossDayRest,
            ]
        );
    }
}
