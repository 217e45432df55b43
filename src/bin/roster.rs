//! Command-line roster planner.
//!
//! Run with: cargo run --bin roster -- --demo SMALL --csv roster.csv

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use shift_rostering::config::RosterConfig;
use shift_rostering::console;
use shift_rostering::demo_data::{self, DemoData};
use shift_rostering::domain::Catalog;
use shift_rostering::dto::RosterRequestDto;
use shift_rostering::export::{self, RosterReport};
use shift_rostering::preferences::PreferenceStore;
use shift_rostering::roster::{build_model, materialize};
use shift_rostering::solver::{ConstraintSolver, MicroLpSolver};

#[derive(Parser)]
#[command(name = "roster")]
#[command(version)]
#[command(about = "Builds, solves and exports an employee shift roster", long_about = None)]
struct Cli {
    /// Roster request file (catalog, preferences and optional config)
    #[arg(short, long, required_unless_present = "demo", conflicts_with = "demo")]
    request: Option<PathBuf>,

    /// Built-in demo data set (SMALL or LARGE)
    #[arg(short, long)]
    demo: Option<String>,

    /// Config file, replaces the request's config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Solver time limit in milliseconds
    #[arg(long)]
    time_limit_ms: Option<u64>,

    /// Seed for default preference weights
    #[arg(long)]
    seed: Option<u64>,

    /// Write the roster as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the roster as JSON
    #[arg(long)]
    json: Option<PathBuf>,
}

fn load(cli: &Cli) -> Result<(Catalog, PreferenceStore, RosterConfig), Box<dyn std::error::Error>> {
    if let Some(path) = &cli.request {
        let request = RosterRequestDto::from_file(path)?;
        let catalog = request.catalog.to_catalog()?;
        return Ok((catalog, request.preferences.to_store(), request.config));
    }
    let name = cli.demo.as_deref().unwrap_or("SMALL");
    let demo = name
        .parse::<DemoData>()
        .map_err(|_| format!("unknown demo data set {}", name))?;
    let instance = demo_data::generate(demo)?;
    Ok((instance.catalog, instance.preferences, instance.config))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (catalog, preferences, mut config) = load(&cli)?;
    if let Some(path) = &cli.config {
        config = RosterConfig::from_file(path)?;
    }
    if let Some(ms) = cli.time_limit_ms {
        config.solver.time_limit_ms = Some(ms);
    }
    if let Some(seed) = cli.seed {
        config.preference_seed = seed;
    }

    console::print_catalog(&catalog);
    let (model, weights) = build_model(&catalog, &preferences, &config)?;
    console::print_model(&model);

    let solver = MicroLpSolver;
    let outcome = solver.solve(&model, &config.solver);
    console::print_solving_ended(outcome.elapsed, outcome.status, outcome.objective_value, None);

    let roster = materialize(&catalog, &model, &weights, &outcome)?;
    console::print_roster(&roster);

    let report = RosterReport::from_roster(&roster);
    if let Some(path) = &cli.csv {
        export::write_csv_file(path, &report)?;
        println!("Roster written to {}", path.display());
    }
    if let Some(path) = &cli.json {
        export::write_json_file(path, &report)?;
        println!("Roster written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    console::print_banner();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
