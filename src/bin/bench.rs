//! Benchmark for model construction and solving.
//!
//! Run with: cargo run --release --bin bench

use shift_rostering::demo_data::{self, DemoData};
use shift_rostering::roster::{build_model, materialize};
use shift_rostering::solver::{ConstraintSolver, MicroLpSolver};
use std::time::Instant;

const BUILD_ROUNDS: u32 = 20;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let instance = demo_data::generate(DemoData::Large)?;
    let catalog = &instance.catalog;

    println!("Benchmark: Model Construction");
    println!("  Employees: {}", catalog.employees().len());
    println!("  Shifts: {}", catalog.shift_count());
    println!();

    let build_start = Instant::now();
    let mut last = None;
    for _ in 0..BUILD_ROUNDS {
        last = Some(build_model(catalog, &instance.preferences, &instance.config)?);
    }
    let build_elapsed = build_start.elapsed();
    let (model, weights) = last.ok_or("no model built")?;

    println!("Results:");
    println!("  Rounds: {}", BUILD_ROUNDS);
    println!("  Time/build: {:.2?}", build_elapsed / BUILD_ROUNDS);
    println!("  Variables: {}", model.variables().len());
    println!("  Constraints: {}", model.constraint_count());
    for family in model.families() {
        if let Some(group) = model.group(family) {
            println!("    {}: {}", family, group.len());
        }
    }
    println!();

    // Solving is only attempted when a time limit keeps it bounded.
    if instance.config.solver.time_limit().is_some() {
        let solver = MicroLpSolver;
        let outcome = solver.solve(&model, &instance.config.solver);
        println!("Solve:");
        println!("  Status: {}", outcome.status.as_str());
        println!("  Time: {:.2?}", outcome.elapsed);
        match materialize(catalog, &model, &weights, &outcome) {
            Ok(roster) => {
                println!("  Preference cost: {}", roster.total_preference_cost());
                println!("  Assigned shifts: {}", roster.assigned_shifts());
            }
            Err(e) => println!("  {}", e),
        }
    }
    Ok(())
}
