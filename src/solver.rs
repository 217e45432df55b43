//! Solver adapter.
//!
//! The model is handed to a backend through the `ConstraintSolver` trait.
//! The bundled backend translates it into a 0/1 integer program for the
//! pure-Rust `microlp` solver via `good_lp`.

use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::model::{Comparison, ConstraintModel, Valuation};

/// Default solving time: 30 seconds.
const DEFAULT_TIME_LIMIT_MS: u64 = 30_000;

/// Solver configuration with termination criteria.
///
/// A missing `timeLimitMs` gets the default budget; only an explicit `null`
/// removes the limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    /// Stop after this many milliseconds. `None` waits for the solver.
    pub time_limit_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl SolverConfig {
    /// Creates a config with default 30-second time limit.
    pub fn default_config() -> Self {
        Self {
            time_limit_ms: Some(DEFAULT_TIME_LIMIT_MS),
        }
    }

    /// No time limit: the solve runs until the backend concludes.
    pub fn unbounded() -> Self {
        Self { time_limit_ms: None }
    }

    pub fn with_time_limit(limit: Duration) -> Self {
        Self {
            time_limit_ms: Some(limit.as_millis() as u64),
        }
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time_limit_ms.map(Duration::from_millis)
    }
}

/// Terminal status of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolveStatus {
    /// Proven optimal, or any solution of a pure feasibility model.
    Optimal,
    /// A solution without an optimality proof.
    Feasible,
    /// Proven to have no solution.
    Infeasible,
    /// Budget exhausted before any conclusion.
    Unknown,
    /// Backend failure.
    Error,
}

impl SolveStatus {
    /// Returns the status as a SCREAMING_SNAKE_CASE string for API responses.
    ///
    /// ```
    /// use shift_rostering::solver::SolveStatus;
    ///
    /// assert_eq!(SolveStatus::Optimal.as_str(), "OPTIMAL");
    /// assert_eq!(SolveStatus::Unknown.as_str(), "UNKNOWN");
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            SolveStatus::Optimal => "OPTIMAL",
            SolveStatus::Feasible => "FEASIBLE",
            SolveStatus::Infeasible => "INFEASIBLE",
            SolveStatus::Unknown => "UNKNOWN",
            SolveStatus::Error => "ERROR",
        }
    }

    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

/// Result of handing a model to a backend.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Present iff `status.has_solution()`.
    pub valuation: Option<Valuation>,
    pub objective_value: Option<i64>,
    pub elapsed: Duration,
    pub message: Option<String>,
}

impl SolveOutcome {
    pub fn solved(status: SolveStatus, valuation: Valuation, objective_value: Option<i64>, elapsed: Duration) -> Self {
        Self {
            status,
            valuation: Some(valuation),
            objective_value,
            elapsed,
            message: None,
        }
    }

    pub fn infeasible(elapsed: Duration) -> Self {
        Self::without_solution(SolveStatus::Infeasible, elapsed, None)
    }

    pub fn unknown(elapsed: Duration) -> Self {
        Self::without_solution(SolveStatus::Unknown, elapsed, None)
    }

    pub fn error(message: impl Into<String>, elapsed: Duration) -> Self {
        Self::without_solution(SolveStatus::Error, elapsed, Some(message.into()))
    }

    fn without_solution(status: SolveStatus, elapsed: Duration, message: Option<String>) -> Self {
        Self {
            status,
            valuation: None,
            objective_value: None,
            elapsed,
            message,
        }
    }
}

/// A backend able to decide a `ConstraintModel`.
pub trait ConstraintSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solves `model` within the configured budget. Never panics on
    /// infeasible input; failures come back as `SolveStatus::Error`.
    fn solve(&self, model: &ConstraintModel, config: &SolverConfig) -> SolveOutcome;
}

/// Solver threads allowed to exist at once, abandoned ones included.
pub const MAX_SOLVER_WORKERS: usize = 4;

static SOLVER_WORKERS: WorkerPool = WorkerPool::new(MAX_SOLVER_WORKERS);

/// Counting semaphore over solver threads.
///
/// A permit lives inside its thread, so a solve abandoned at its deadline
/// keeps its slot until `microlp` actually returns.
pub(crate) struct WorkerPool {
    busy: Mutex<usize>,
    freed: Condvar,
    capacity: usize,
}

impl WorkerPool {
    pub(crate) const fn new(capacity: usize) -> Self {
        Self {
            busy: parking_lot::const_mutex(0),
            freed: Condvar::new(),
            capacity,
        }
    }

    /// Threads currently holding a permit.
    pub(crate) fn busy(&self) -> usize {
        *self.busy.lock()
    }

    /// Waits until `deadline` for a free slot.
    fn acquire(&'static self, deadline: Instant) -> Option<WorkerPermit> {
        let mut busy = self.busy.lock();
        while *busy >= self.capacity {
            if self.freed.wait_until(&mut busy, deadline).timed_out() && *busy >= self.capacity {
                return None;
            }
        }
        *busy += 1;
        Some(WorkerPermit { pool: self })
    }
}

struct WorkerPermit {
    pool: &'static WorkerPool,
}

impl Drop for WorkerPermit {
    fn drop(&mut self) {
        *self.pool.busy.lock() -= 1;
        self.pool.freed.notify_one();
    }
}

/// Branch-and-bound over `microlp`.
///
/// `microlp` cannot be interrupted. When the time limit passes first, the
/// outcome is `Unknown` and the worker thread is left to finish on its own;
/// its result is dropped. At most `MAX_SOLVER_WORKERS` such threads run at
/// once; a solve that cannot get a slot before its deadline is `Unknown`
/// without starting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpSolver;

impl ConstraintSolver for MicroLpSolver {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn solve(&self, model: &ConstraintModel, config: &SolverConfig) -> SolveOutcome {
        let start = Instant::now();
        let time_limit = config.time_limit();

        if time_limit == Some(Duration::ZERO) {
            warn!("Zero time limit, skipping search");
            return SolveOutcome::unknown(start.elapsed());
        }

        info!(
            backend = self.name(),
            variables = model.variables().len(),
            constraints = model.constraint_count(),
            time_limit_ms = config.time_limit_ms,
            "Starting solver"
        );

        let Some(limit) = time_limit else {
            return solve_with_microlp(model, start);
        };

        let model = model.clone();
        run_with_deadline(&SOLVER_WORKERS, start, limit, move || solve_with_microlp(&model, start))
    }
}

/// Runs `job` on a pooled thread and waits at most `limit` from `start`.
fn run_with_deadline<F>(pool: &'static WorkerPool, start: Instant, limit: Duration, job: F) -> SolveOutcome
where
    F: FnOnce() -> SolveOutcome + Send + 'static,
{
    let deadline = start + limit;
    let Some(permit) = pool.acquire(deadline) else {
        warn!(workers = pool.capacity, "No solver worker freed up before the time limit");
        return SolveOutcome::unknown(start.elapsed());
    };

    let (tx, rx) = mpsc::channel();
    let spawned = std::thread::Builder::new()
        .name("microlp-solver".into())
        .spawn(move || {
            let _permit = permit;
            // Receiver is gone after a timeout.
            let _ = tx.send(job());
        });
    if let Err(e) = spawned {
        return SolveOutcome::error(format!("cannot start solver thread: {}", e), start.elapsed());
    }

    match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(outcome) => outcome,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(elapsed_ms = start.elapsed().as_millis() as u64, "Solver time limit reached");
            SolveOutcome::unknown(start.elapsed())
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            SolveOutcome::error("solver worker exited without a result", start.elapsed())
        }
    }
}

fn solve_with_microlp(model: &ConstraintModel, start: Instant) -> SolveOutcome {
    let mut problem = ProblemVariables::new();
    let vars: Vec<Variable> = (0..model.variables().len())
        .map(|_| problem.add(variable().binary()))
        .collect();

    let mut objective = Expression::with_capacity(vars.len());
    if let Some(obj) = model.objective() {
        for &(var, weight) in &obj.terms {
            objective.add_mul(weight as f64, vars[var.index()]);
        }
    }

    let mut constraints = Vec::new();
    for c in model.linear_constraints() {
        if c.terms.is_empty() {
            // Constant side: decide it here instead of handing 0 <= b to the backend.
            if !constant_holds(c.comparison, c.bound) {
                debug!(label = %c.label, "Constant constraint violated");
                return SolveOutcome::infeasible(start.elapsed());
            }
            continue;
        }
        let mut lhs = Expression::with_capacity(c.terms.len());
        for &(var, coef) in &c.terms {
            lhs.add_mul(coef as f64, vars[var.index()]);
        }
        let rhs = c.bound as f64;
        constraints.push(match c.comparison {
            Comparison::LessOrEqual => constraint::leq(lhs, rhs),
            Comparison::GreaterOrEqual => constraint::geq(lhs, rhs),
            Comparison::Equal => constraint::eq(lhs, rhs),
        });
    }

    // Σ positive − Σ negated ≥ 1 − #negated.
    for d in model.disjunctions() {
        if d.literals.is_empty() {
            return SolveOutcome::infeasible(start.elapsed());
        }
        let mut lhs = Expression::with_capacity(d.literals.len());
        let mut negated = 0.0;
        for literal in &d.literals {
            if literal.negated {
                lhs.add_mul(-1.0, vars[literal.var.index()]);
                negated += 1.0;
            } else {
                lhs.add_mul(1.0, vars[literal.var.index()]);
            }
        }
        constraints.push(constraint::geq(lhs, 1.0 - negated));
    }

    let mut program = problem.minimise(objective).using(microlp);
    for c in constraints {
        program = program.with(c);
    }

    match program.solve() {
        Ok(solution) => {
            let valuation = Valuation::new(vars.iter().map(|&v| solution.value(v) > 0.5).collect());
            let objective_value = model.objective().map(|obj| obj.value(&valuation));
            let elapsed = start.elapsed();
            info!(
                elapsed_ms = elapsed.as_millis() as u64,
                objective = objective_value,
                "Solver finished"
            );
            SolveOutcome::solved(SolveStatus::Optimal, valuation, objective_value, elapsed)
        }
        Err(ResolutionError::Infeasible) => {
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "Model is infeasible");
            SolveOutcome::infeasible(start.elapsed())
        }
        Err(e) => {
            warn!(error = %e, "Solver backend failed");
            SolveOutcome::error(e.to_string(), start.elapsed())
        }
    }
}

fn constant_holds(comparison: Comparison, bound: i64) -> bool {
    match comparison {
        Comparison::LessOrEqual => 0 <= bound,
        Comparison::GreaterOrEqual => 0 >= bound,
        Comparison::Equal => bound == 0,
    }
}
