//! REST API handlers for shift rostering.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::demo_data::{self, DemoData};
use crate::dto::{
    CatalogDto, ErrorDto, HealthResponse, InfoResponse, JobCreatedResponse, JobState,
    JobStatusResponse, PreferencesDto, RosterJobDto, RosterRequestDto,
};
use crate::error::RosterError;
use crate::export::RosterReport;
use crate::roster::{plan_roster, Roster};
use crate::solver::{ConstraintSolver, MicroLpSolver};

/// A background planning run.
struct RosterJob {
    state: JobState,
    result: Option<Result<Roster, RosterError>>,
}

/// Application state shared across handlers.
///
/// Each job builds and owns its own model; only finished results are stored.
pub struct AppState {
    jobs: RwLock<HashMap<String, RosterJob>>,
    solver: Arc<dyn ConstraintSolver>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_solver(Arc::new(MicroLpSolver))
    }

    pub fn with_solver(solver: Arc<dyn ConstraintSolver>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            solver,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

type ApiError = (StatusCode, Json<ErrorDto>);

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorDto {
            kind: "NOT_FOUND",
            message: format!("no roster job {}", id),
            recoverable: false,
            report: None,
        }),
    )
}

fn roster_error(err: &RosterError) -> ApiError {
    let status = match err {
        RosterError::Model(_) => StatusCode::BAD_REQUEST,
        RosterError::Infeasible(_) | RosterError::SolverTimeout { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RosterError::Solver(_) | RosterError::InvariantViolation { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(ErrorDto::from(err)))
}

/// Creates the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{id}", get(get_demo_data))
        // Rosters
        .route("/rosters", post(create_roster).get(list_rosters))
        .route("/rosters/solve", post(solve_roster))
        .route("/rosters/{id}", get(get_roster).delete(delete_roster))
        .route("/rosters/{id}/status", get(get_roster_status))
        .route("/rosters/{id}/csv", get(get_roster_csv))
        .with_state(state)
}

// ============================================================================
// Health & Info
// ============================================================================

/// GET /health - Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

/// GET /info - Application info endpoint.
async fn info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Shift Rostering",
        version: env!("CARGO_PKG_VERSION"),
        solver_engine: state.solver.name(),
    })
}

/// GET /demo-data - List available demo data sets.
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// GET /demo-data/{id} - Get a specific demo data set as a request body.
async fn get_demo_data(Path(id): Path<String>) -> Result<Json<RosterRequestDto>, ApiError> {
    let demo = id.parse::<DemoData>().map_err(|_| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorDto {
                kind: "NOT_FOUND",
                message: format!("no demo data set {}", id),
                recoverable: false,
                report: None,
            }),
        )
    })?;
    let instance = demo_data::generate(demo).map_err(|e| roster_error(&RosterError::Model(e)))?;
    Ok(Json(RosterRequestDto {
        catalog: CatalogDto::from(&instance.catalog),
        preferences: PreferencesDto::from_source(&instance.preferences),
        config: instance.config,
    }))
}

// ============================================================================
// Rosters
// ============================================================================

fn run_request(request: &RosterRequestDto, solver: &dyn ConstraintSolver) -> Result<Roster, RosterError> {
    let catalog = request.catalog.to_catalog()?;
    let preferences = request.preferences.to_store();
    plan_roster(&catalog, &preferences, &request.config, solver)
}

/// POST /rosters - Start solving in the background. Returns the job ID.
///
/// The catalog is validated before the job is created.
async fn create_roster(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RosterRequestDto>,
) -> Result<(StatusCode, Json<JobCreatedResponse>), ApiError> {
    request
        .catalog
        .to_catalog()
        .map_err(|e| roster_error(&RosterError::Model(e)))?;

    let id = uuid::Uuid::new_v4().to_string();
    state.jobs.write().insert(
        id.clone(),
        RosterJob {
            state: JobState::Solving,
            result: None,
        },
    );
    info!(job_id = %id, "Roster job started");

    let state_clone = state.clone();
    let id_clone = id.clone();
    tokio::task::spawn_blocking(move || {
        let result = run_request(&request, state_clone.solver.as_ref());

        #[cfg(feature = "console")]
        match &result {
            Ok(roster) => crate::console::print_solving_ended(
                roster.elapsed(),
                roster.status(),
                roster.objective_value(),
                Some(roster.total_preference_cost()),
            ),
            Err(e) => warn!(job_id = %id_clone, error = %e, "Roster job failed"),
        }
        #[cfg(not(feature = "console"))]
        if let Err(e) = &result {
            warn!(job_id = %id_clone, error = %e, "Roster job failed");
        }

        let mut jobs = state_clone.jobs.write();
        match jobs.get_mut(&id_clone) {
            Some(job) => {
                job.state = if result.is_ok() {
                    JobState::Solved
                } else {
                    JobState::Failed
                };
                job.result = Some(result);
            }
            // Deleted while solving.
            None => info!(job_id = %id_clone, "Dropping result of removed job"),
        }
    });

    Ok((StatusCode::ACCEPTED, Json(JobCreatedResponse { id })))
}

/// POST /rosters/solve - Solve synchronously and return the report.
async fn solve_roster(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RosterRequestDto>,
) -> Result<Json<RosterReport>, ApiError> {
    let solver = state.solver.clone();
    let result = tokio::task::spawn_blocking(move || run_request(&request, solver.as_ref()))
        .await
        .map_err(|e| roster_error(&RosterError::Solver(format!("solver task failed: {}", e))))?;
    match result {
        Ok(roster) => Ok(Json(RosterReport::from_roster(&roster))),
        Err(e) => Err(roster_error(&e)),
    }
}

/// GET /rosters - List all roster job IDs.
async fn list_rosters(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let mut ids: Vec<String> = state.jobs.read().keys().cloned().collect();
    ids.sort();
    Json(ids)
}

/// GET /rosters/{id} - Report of a finished job, or its error.
async fn get_roster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RosterJobDto>, ApiError> {
    let jobs = state.jobs.read();
    let job = jobs.get(&id).ok_or_else(|| not_found(&id))?;
    let (report, error) = match &job.result {
        Some(Ok(roster)) => (Some(RosterReport::from_roster(roster)), None),
        Some(Err(e)) => (None, Some(ErrorDto::from(e))),
        None => (None, None),
    };
    Ok(Json(RosterJobDto {
        id,
        state: job.state,
        report,
        error,
    }))
}

/// GET /rosters/{id}/status - Job state without the roster table.
async fn get_roster_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let jobs = state.jobs.read();
    let job = jobs.get(&id).ok_or_else(|| not_found(&id))?;
    let roster = job.result.as_ref().and_then(|r| r.as_ref().ok());
    let error = job.result.as_ref().and_then(|r| r.as_ref().err()).map(ErrorDto::from);
    Ok(Json(JobStatusResponse {
        id: id.clone(),
        state: job.state,
        solve_status: roster.map(Roster::status),
        total_preference_cost: roster.map(Roster::total_preference_cost),
        error,
    }))
}

/// GET /rosters/{id}/csv - Download a solved roster as CSV.
async fn get_roster_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let jobs = state.jobs.read();
    let job = jobs.get(&id).ok_or_else(|| not_found(&id))?;
    let roster = match &job.result {
        Some(Ok(roster)) => roster,
        Some(Err(e)) => return Err(roster_error(e)),
        None => {
            return Err((
                StatusCode::CONFLICT,
                Json(ErrorDto {
                    kind: "NOT_SOLVED",
                    message: format!("roster job {} is still solving", id),
                    recoverable: true,
                    report: None,
                }),
            ))
        }
    };
    let csv = RosterReport::from_roster(roster).to_csv_string().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorDto {
                kind: "EXPORT_ERROR",
                message: e.to_string(),
                recoverable: false,
                report: None,
            }),
        )
    })?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"roster-{}.csv\"", id),
            ),
        ],
        csv,
    )
        .into_response())
}

/// DELETE /rosters/{id} - Remove a job. A running solve finishes unobserved.
async fn delete_roster(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    match state.jobs.write().remove(&id) {
        Some(_) => {
            info!(job_id = %id, "Roster job removed");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
