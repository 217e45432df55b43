//! Colorful console output for the rostering pipeline.

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::time::Duration;

use crate::domain::{Catalog, Day};
use crate::model::ConstraintModel;
use crate::roster::Roster;
use crate::solver::SolveStatus;

/// ASCII art banner for startup.
pub fn print_banner() {
    let banner = r#"
  ____  _     _  __ _     ____           _
 / ___|| |__ (_)/ _| |_  |  _ \ ___  ___| |_ ___ _ __
 \___ \| '_ \| | |_| __| | |_) / _ \/ __| __/ _ \ '__|
  ___) | | | | |  _| |_  |  _ < (_) \__ \ ||  __/ |
 |____/|_| |_|_|_|  \__| |_| \_\___/|___/\__\___|_|
"#;
    println!("{}", banner.cyan().bold());
    println!(
        "  {} {}\n",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black(),
        "Shift Rostering".bright_cyan()
    );
}

/// Prints catalog dimensions.
pub fn print_catalog(catalog: &Catalog) {
    println!(
        "{} {} {} Problem: employees ({}), periods ({}), days ({}), shifts ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Catalog]".bright_cyan(),
        catalog.employees().len().to_formatted_string(&Locale::en).bright_yellow(),
        catalog.periods().len().to_formatted_string(&Locale::en).bright_yellow(),
        catalog.horizon_days().to_formatted_string(&Locale::en).bright_yellow(),
        catalog.shift_count().to_formatted_string(&Locale::en).bright_yellow()
    );
}

/// Prints model size, broken down by constraint family.
pub fn print_model(model: &ConstraintModel) {
    println!(
        "{} {} {} variables ({}), constraints ({}), objective terms ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Model]".bright_cyan(),
        model.variables().len().to_formatted_string(&Locale::en).bright_yellow(),
        model.constraint_count().to_formatted_string(&Locale::en).bright_yellow(),
        model
            .objective()
            .map(|o| o.terms.len())
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_yellow()
    );
    for family in model.families() {
        let count = model.group(family).map(|g| g.len()).unwrap_or(0);
        println!(
            "    {} {:<20} {}",
            "→".bright_blue(),
            family.to_string().white(),
            count.to_formatted_string(&Locale::en).bright_magenta()
        );
    }
}

/// Prints solve summary box.
pub fn print_solving_ended(
    total_duration: Duration,
    status: SolveStatus,
    objective: Option<i64>,
    preference_cost: Option<i64>,
) {
    println!(
        "{} {} {} Solving ended: time spent ({}), status ({})",
        timestamp().bright_black(),
        "INFO".bright_green(),
        "[Solver]".bright_cyan(),
        format_duration(total_duration).yellow(),
        format_status(status)
    );

    // Pretty summary box (60 chars wide, 56 char content area)
    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════╗".bright_cyan());

    let status_text = match status {
        SolveStatus::Optimal => "✓ OPTIMAL ROSTER FOUND",
        SolveStatus::Feasible => "✓ FEASIBLE ROSTER FOUND",
        SolveStatus::Infeasible => "✗ NO FEASIBLE ROSTER",
        SolveStatus::Unknown => "✗ TIME LIMIT REACHED",
        SolveStatus::Error => "✗ SOLVER ERROR",
    };
    let status_colored = if status.has_solution() {
        status_text.bright_green().bold().to_string()
    } else {
        status_text.bright_red().bold().to_string()
    };
    let status_padding = 56 - status_text.chars().count();
    let left_pad = status_padding / 2;
    let right_pad = status_padding - left_pad;
    println!(
        "{}{}{}{}{}",
        "║".bright_cyan(),
        " ".repeat(left_pad),
        status_colored,
        " ".repeat(right_pad),
        "║".bright_cyan()
    );

    println!("{}", "╠══════════════════════════════════════════════════════════╣".bright_cyan());

    let dash = || "-".to_string();
    print_box_line("Objective:", &objective.map(|v| v.to_formatted_string(&Locale::en)).unwrap_or_else(dash));
    print_box_line(
        "Preference Cost:",
        &preference_cost.map(|v| v.to_formatted_string(&Locale::en)).unwrap_or_else(dash),
    );
    print_box_line("Solving Time:", &format!("{:.2}s", total_duration.as_secs_f64()));

    println!("{}", "╚══════════════════════════════════════════════════════════╝".bright_cyan());
    println!();
}

fn print_box_line(label: &str, value: &str) {
    println!(
        "{}  {:<18}{:>36}  {}",
        "║".bright_cyan(),
        label,
        value,
        "║".bright_cyan()
    );
}

/// Prints the roster grid; cells are filled with their period color.
pub fn print_roster(roster: &Roster) {
    let catalog = roster.catalog();
    let name_width = catalog
        .employees()
        .iter()
        .map(|e| e.as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max("Employee".len());
    let cell_width = catalog
        .periods()
        .iter()
        .map(|p| p.code.chars().count())
        .max()
        .unwrap_or(1)
        .max(2);

    print!("{:<width$} ", "Employee".bold(), width = name_width);
    for day in catalog.days() {
        print!("{:>width$}", day.number().to_string().bright_black(), width = cell_width + 1);
    }
    println!("  {}", "Hours".bold());

    for (e_idx, employee) in catalog.employees().iter().enumerate() {
        print!("{:<width$} ", employee.as_str(), width = name_width);
        for day in catalog.days() {
            print!(" {}", roster_cell(roster, e_idx, day, cell_width));
        }
        println!("  {:>5}", roster.hours_worked(e_idx).to_string().bright_yellow());
    }

    println!();
    for period in catalog.periods() {
        println!(
            "  {} {} ({}h)",
            paint(&format!("{:^width$}", period.code, width = cell_width), period.color.as_deref()),
            period.id,
            period.duration_hours
        );
    }
    println!();
}

fn roster_cell(roster: &Roster, employee: usize, day: Day, width: usize) -> String {
    match roster.assignment(employee, day) {
        Some(period) => paint(
            &format!("{:^width$}", period.code, width = width),
            period.color.as_deref(),
        ),
        None => format!("{:^width$}", "·", width = width).bright_black().to_string(),
    }
}

fn paint(text: &str, color: Option<&str>) -> String {
    match color.and_then(parse_hex_color) {
        Some((r, g, b)) => text.black().on_truecolor(r, g, b).to_string(),
        None => text.white().bold().to_string(),
    }
}

/// Parses `RRGGBB` (optionally `#`-prefixed) into its channels.
///
/// ```
/// use shift_rostering::console::parse_hex_color;
///
/// assert_eq!(parse_hex_color("FFCCFF"), Some((255, 204, 255)));
/// assert_eq!(parse_hex_color("#ccffcc"), Some((204, 255, 204)));
/// assert_eq!(parse_hex_color("nope"), None);
/// ```
pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn format_status(status: SolveStatus) -> String {
    if status.has_solution() {
        status.as_str().bright_green().to_string()
    } else {
        status.as_str().bright_red().to_string()
    }
}

/// Formats a duration nicely.
fn format_duration(d: Duration) -> String {
    let total_ms = d.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.2}s", d.as_secs_f64())
    } else {
        let mins = total_ms / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

/// Returns a timestamp string.
fn timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
        .unwrap_or_else(|_| "0.000".to_string())
}
