use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use shift_rostering::api::{router, AppState};

fn app() -> Router {
    router(Arc::new(AppState::new()))
}

fn small_request(employees: &[&str], min_per_shift: u32) -> Value {
    json!({
        "catalog": {
            "employees": employees,
            "periods": [{ "id": "Day", "code": "D", "durationHours": 8 }],
            "horizonDays": 2,
            "startDate": "2024-01-01"
        },
        "config": {
            "minPerShift": min_per_shift,
            "solver": { "timeLimitMs": 10000 }
        }
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_and_info() {
    let app = app();
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "UP");

    let (_, body) = get(&app, "/info").await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["name"], "Shift Rostering");
    assert_eq!(body["solverEngine"], "microlp");
}

#[tokio::test]
async fn test_demo_data() {
    let app = app();
    let (_, body) = get(&app, "/demo-data").await;
    let list: Vec<String> = serde_json::from_slice(&body).unwrap();
    assert_eq!(list, vec!["SMALL", "LARGE"]);

    let (status, body) = get(&app, "/demo-data/SMALL").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["catalog"]["employees"].as_array().unwrap().len(), 7);
    assert_eq!(body["catalog"]["horizonDays"], 14);

    let (status, _) = get(&app, "/demo-data/HUGE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_synchronous_solve() {
    let app = app();
    let request = small_request(&["Alice", "Bob", "Carol"], 1);
    let (status, report) = post_json(&app, "/rosters/solve", &request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["summary"]["status"], "OPTIMAL");
    assert_eq!(report["columns"], json!(["Mon 2024-01-01", "Tue 2024-01-02"]));

    let rows = report["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    for day in 0..2 {
        let worked = rows.iter().filter(|row| row["cells"][day] == "D").count();
        assert!(worked >= 1);
    }
}

#[tokio::test]
async fn test_infeasible_solve() {
    let app = app();
    let request = small_request(&["Alice"], 2);
    let (status, body) = post_json(&app, "/rosters/solve", &request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "INFEASIBLE");
    assert_eq!(body["recoverable"], true);
    assert_eq!(body["report"]["employeeCount"], 1);
    assert_eq!(body["report"]["minPerShift"], 2);
}

#[tokio::test]
async fn test_invalid_catalog_rejected() {
    let app = app();
    let request = small_request(&[], 1);
    let (status, body) = post_json(&app, "/rosters", &request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "MODEL_ERROR");
    assert_eq!(body["recoverable"], false);
}

#[tokio::test]
async fn test_ambiguous_period_codes_rejected() {
    let app = app();
    let mut request = small_request(&["Alice", "Bob"], 1);
    request["catalog"]["periods"] = json!([
        { "id": "Morning", "durationHours": 8 },
        { "id": "Midday", "durationHours": 6 }
    ]);
    let (status, body) = post_json(&app, "/rosters/solve", &request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "MODEL_ERROR");
    assert!(body["message"].as_str().unwrap().contains("Midday"));
}

#[tokio::test]
async fn test_background_job_lifecycle() {
    let app = app();
    let request = small_request(&["Alice", "Bob", "Carol"], 1);
    let (status, created) = post_json(&app, "/rosters", &request).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = created["id"].as_str().unwrap().to_string();

    let mut state = Value::Null;
    for _ in 0..200 {
        let (_, body) = get(&app, &format!("/rosters/{}/status", id)).await;
        let body: Value = serde_json::from_slice(&body).unwrap();
        state = body["state"].clone();
        if state != "SOLVING" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(state, "SOLVED");

    let (_, list) = get(&app, "/rosters").await;
    let list: Vec<String> = serde_json::from_slice(&list).unwrap();
    assert_eq!(list, vec![id.clone()]);

    let (status, csv) = get(&app, &format!("/rosters/{}/csv", id)).await;
    assert_eq!(status, StatusCode::OK);
    let csv = String::from_utf8(csv).unwrap();
    assert!(csv.starts_with("Employee,Mon 2024-01-01,Tue 2024-01-02,Hours"));

    let (status, body) = get(&app, &format!("/rosters/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["report"]["rows"].as_array().unwrap().len(), 3);

    let delete = Request::delete(format!("/rosters/{}", id)).body(Body::empty()).unwrap();
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = get(&app, &format!("/rosters/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
