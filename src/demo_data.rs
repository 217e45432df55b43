//! Demo data generators for shift rostering.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::RosterConfig;
use crate::domain::{Catalog, Day, EmployeeId, Period};
use crate::error::ModelError;
use crate::preferences::{Presence, PreferenceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoData {
    Small,
    Large,
}

impl std::str::FromStr for DemoData {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SMALL" => Ok(DemoData::Small),
            "LARGE" => Ok(DemoData::Large),
            _ => Err(()),
        }
    }
}

impl DemoData {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoData::Small => "SMALL",
            DemoData::Large => "LARGE",
        }
    }

    fn parameters(&self) -> DemoDataParameters {
        match self {
            DemoData::Small => DemoDataParameters {
                employees: &EMPLOYEE_NAMES[..7],
                periods: vec![matin(), journee(), soir()],
                days_in_schedule: 14,
                absence_count_distribution: vec![(0, 4.0), (1, 2.0), (2, 1.0)],
                wish_count_distribution: vec![(0, 2.0), (1, 2.0), (2, 1.0)],
                config: RosterConfig::default(),
            },
            DemoData::Large => DemoDataParameters {
                employees: &EMPLOYEE_NAMES[..10],
                periods: vec![matin(), journee(), soir(), nuit()],
                days_in_schedule: 28,
                absence_count_distribution: vec![(0, 3.0), (1, 3.0), (2, 1.0)],
                wish_count_distribution: vec![(1, 2.0), (2, 2.0), (3, 1.0)],
                config: RosterConfig {
                    monthly_cap_hours: Some(192),
                    min_rest_hours: Some(11),
                    ..RosterConfig::default()
                },
            },
        }
    }
}

struct DemoDataParameters {
    employees: &'static [&'static str],
    periods: Vec<Period>,
    days_in_schedule: u32,
    /// Employees absent per day.
    absence_count_distribution: Vec<(usize, f64)>,
    /// Favoured (employee, shift) pairs per day.
    wish_count_distribution: Vec<(usize, f64)>,
    config: RosterConfig,
}

/// A complete planning problem.
#[derive(Debug, Clone)]
pub struct DemoInstance {
    pub catalog: Catalog,
    pub preferences: PreferenceStore,
    pub config: RosterConfig,
}

/// List of available demo data sets.
pub fn list_demo_data() -> Vec<&'static str> {
    vec!["SMALL", "LARGE"]
}

const EMPLOYEE_NAMES: [&str; 10] = [
    "Alice", "Bob", "Charlie", "Illyes", "Jimmy", "Donatien", "Fanny", "Gaspard", "Hugo", "Ines",
];

/// Weight given to a wished-for shift.
const WISH_WEIGHT: i64 = 0;

fn matin() -> Period {
    Period::new("Matin", 8).with_code("M").with_start_hour(6).with_color("FFCCFF")
}

fn journee() -> Period {
    Period::new("Journee", 8).with_code("J").with_start_hour(9).with_color("CCFFCC")
}

fn soir() -> Period {
    Period::new("Soir", 8).with_code("S").with_start_hour(14).with_color("CCCCFF")
}

fn nuit() -> Period {
    Period::new("Nuit", 10).with_code("N").with_start_hour(21).with_color("FFE5CC")
}

/// Generates a demo instance for the given size.
pub fn generate(demo: DemoData) -> Result<DemoInstance, ModelError> {
    let params = demo.parameters();
    let mut rng = StdRng::seed_from_u64(0);

    let start_date = find_next_monday(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default());
    let employees: Vec<EmployeeId> = params.employees.iter().map(|&name| EmployeeId::new(name)).collect();
    let catalog = Catalog::new(employees.clone(), params.periods.clone(), params.days_in_schedule)?
        .with_start_date(start_date);

    let mut preferences = PreferenceStore::new();
    for n in 1..=params.days_in_schedule {
        let day = Day::new(n);

        let absences = pick_count(&mut rng, &params.absence_count_distribution);
        let absent: Vec<&EmployeeId> = employees.choose_multiple(&mut rng, absences).collect();
        for employee in &absent {
            preferences.set_presence((*employee).clone(), day, Presence::Absent);
        }

        let wishes = pick_count(&mut rng, &params.wish_count_distribution);
        for _ in 0..wishes {
            let (Some(employee), Some(period)) =
                (employees.choose(&mut rng), params.periods.choose(&mut rng))
            else {
                continue;
            };
            if absent.contains(&employee) {
                continue;
            }
            preferences.set_shift_weight(employee.clone(), day, period.id.clone(), WISH_WEIGHT);
        }
    }

    Ok(DemoInstance {
        catalog,
        preferences,
        config: params.config,
    })
}

fn find_next_monday(date: NaiveDate) -> NaiveDate {
    let days_until_monday = match date.weekday() {
        Weekday::Mon => 0,
        Weekday::Tue => 6,
        Weekday::Wed => 5,
        Weekday::Thu => 4,
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        Weekday::Sun => 1,
    };
    date + Duration::days(days_until_monday)
}

/// Pick a count based on weighted distribution.
fn pick_count(rng: &mut StdRng, distribution: &[(usize, f64)]) -> usize {
    let total_weight: f64 = distribution.iter().map(|(_, w)| w).sum();
    let mut choice = rng.gen::<f64>() * total_weight;

    for (count, weight) in distribution {
        if choice < *weight {
            return *count;
        }
        choice -= weight;
    }
    distribution.last().map(|(c, _)| *c).unwrap_or(0)
}
