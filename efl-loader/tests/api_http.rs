//! HTTP surface tests: routing, status codes, and one full run driven
//! entirely through the API.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use efl_common::config::TomlConfig;
use efl_common::events::EventBus;
use efl_loader::config::{Args, LoaderConfig};
use efl_loader::models::{ImportRow, ImportRun, RunPhase};
use efl_loader::services::esploro_client::EsploroClient;
use efl_loader::{build_router, AppState};

fn test_state(server: &MockServer) -> AppState {
    let args = Args {
        api_key: Some("test-key".to_string()),
        gateway_url: Some(server.uri()),
        inter_asset_delay_ms: Some(0),
        poll_interval_secs: Some(0),
        poll_timeout_secs: Some(2),
        ..Default::default()
    };
    let config = LoaderConfig::resolve(&args, &TomlConfig::default()).expect("config");
    let client = std::sync::Arc::new(
        EsploroClient::new(
            &config.gateway_url,
            &config.api_key,
            config.inter_asset_delay_ms,
        )
        .expect("client"),
    );
    AppState::new(config, client, EventBus::new(64))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn post_json(app: &Router, uri: &str, payload: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Polls run status until the run reaches a terminal phase.
async fn wait_for_terminal(app: &Router, run_id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = get(app, &format!("/imports/{}", run_id)).await;
        assert_eq!(status, StatusCode::OK);
        let phase = body["phase"].as_str().unwrap_or_default().to_string();
        if phase == "DONE" || phase == "ABORTED" {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run {} never reached a terminal phase", run_id);
}

#[tokio::test]
async fn health_reports_service_identity() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "efl-loader");
    assert_eq!(body["gateway_url"], server.uri());
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn preview_suggests_mappings_with_fallback_vocabulary() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));

    // No mapping-table mock: the vocabulary fetch fails and the
    // built-in fallback kicks in with a warning
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("upload.csv");
    std::fs::write(
        &csv_path,
        "MMS ID,File URL,File Type\n\
         991001,https://files.example.edu/a.pdf,accepted\n\
         991002,https://files.example.edu/b.pdf,accepted\n",
    )
    .unwrap();

    let (status, body) = post_json(
        &app,
        "/imports/preview",
        json!({"csv_path": csv_path}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["row_count"], 2);
    assert_eq!(
        body["headers"],
        json!(["MMS ID", "File URL", "File Type"])
    );
    assert_eq!(body["mapping_errors"], json!([]));
    assert_eq!(body["value_errors"], json!([]));
    assert_eq!(body["type_conversions"].as_array().unwrap().len(), 1);
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().contains("fallback"));
}

#[tokio::test]
async fn preview_rejects_non_csv_path() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));

    let (status, body) = post_json(
        &app,
        "/imports/preview",
        json!({"csv_path": "/tmp/upload.txt"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains(".csv"));
}

#[tokio::test]
async fn start_import_requires_exactly_one_source() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));

    let (status, body) = post_json(&app, "/imports", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("exactly one"));
}

#[tokio::test]
async fn start_import_rejects_duplicate_entries() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));

    let entry = json!({
        "asset_id": "991001",
        "remote_url": "https://files.example.edu/a.pdf"
    });
    let (status, body) = post_json(
        &app,
        "/imports",
        json!({"entries": [entry.clone(), entry]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("duplicate"));
}

#[tokio::test]
async fn start_import_rejects_malformed_url() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));

    let (status, body) = post_json(
        &app,
        "/imports",
        json!({"entries": [{
            "asset_id": "991001",
            "remote_url": "ftp://files.example.edu/a.pdf"
        }]}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("ftp://files.example.edu/a.pdf"));
}

#[tokio::test]
async fn unknown_run_returns_404() {
    let server = MockServer::start().await;
    let app = build_router(test_state(&server));
    let missing = Uuid::new_v4();

    let (status, body) = get(&app, &format!("/imports/{}", missing)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _) = post_json(&app, &format!("/imports/{}/cancel", missing), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn report_conflicts_while_run_active() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let app = build_router(state.clone());

    let run = ImportRun::new(vec![ImportRow::new(
        "991001",
        "https://files.example.edu/a.pdf",
    )]);
    let run_id = run.run_id;
    state.runs.write().await.insert(run_id, run);

    let (status, body) = get(&app, &format!("/imports/{}/report", run_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    // The verification export is gated the same way
    let (status, _) = get(&app, &format!("/imports/{}/export/report", run_id)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_finished_run_is_rejected() {
    let server = MockServer::start().await;
    let state = test_state(&server);
    let app = build_router(state.clone());

    let mut run = ImportRun::new(Vec::new());
    run.transition_to(RunPhase::Done);
    let run_id = run.run_id;
    state.runs.write().await.insert(run_id, run);

    let (status, body) = post_json(&app, &format!("/imports/{}/cancel", run_id), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("already finished"));
}

#[tokio::test]
async fn manual_entries_run_to_completion_with_exports() {
    let server = MockServer::start().await;

    // The submitted URL is already visible on the asset in both the
    // pre- and post-count, which verifies as an exact pre-existing match
    Mock::given(method("GET"))
        .and(path("/esploro/v1/assets/991001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "records": [{
                "title": "Test Asset",
                "resourcetype.esploro": "publication.journalArticle",
                "files": [{"url": "https://files.example.edu/a.pdf"}]
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/esploro/v1/assets/991001/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conf/sets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "S1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conf/sets/S1"))
        .and(query_param("op", "add_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "members": {"member": [{"id": "991001"}]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conf/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_record_count": 1,
            "job": [{"id": "M50762", "name": "Import Research Assets Files"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/conf/jobs/M50762/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "INST1"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conf/jobs/M50762/instances/INST1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "INST1",
            "progress": 100.0,
            "status": {"value": "COMPLETED_SUCCESS"},
            "counter": [{"type": {"value": "file_uploaded"}, "value": "1"}]
        })))
        .mount(&server)
        .await;

    let app = build_router(test_state(&server));

    let (status, body) = post_json(
        &app,
        "/imports",
        json!({"entries": [{
            "asset_id": "991001",
            "remote_url": "https://files.example.edu/a.pdf",
            "file_title": "Preprint",
            "file_type": "accepted"
        }]}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["phase"], "GROUPING");
    let run_id = body["run_id"].as_str().unwrap().to_string();

    let final_status = wait_for_terminal(&app, &run_id).await;
    assert_eq!(final_status["phase"], "DONE");
    assert_eq!(final_status["row_counts"]["success"], 1);
    assert_eq!(final_status["set_id"], "S1");
    assert_eq!(final_status["job_status"], "COMPLETED_SUCCESS");

    let (status, report) = get(&app, &format!("/imports/{}/report", run_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["row_counts"]["success"], 1);
    assert_eq!(report["job_counters"]["file_uploaded"], 1);
    assert_eq!(report["verification"]["verified_success"], 1);
    assert!(report["duration_seconds"].is_u64());

    for (route, needle) in [
        ("export/mms-ids", "\"991001\""),
        ("export/entries", "\"Preprint\""),
        ("export/report", "\"verified_success\""),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/imports/{}/{}", run_id, route))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        assert!(response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment;"));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(needle), "{} missing from {}", needle, route);
    }
}

#[tokio::test]
async fn cancel_stops_an_active_run() {
    let server = MockServer::start().await;

    // A slow asset lookup keeps the run in Phase 1 long enough to cancel
    Mock::given(method("GET"))
        .and(path("/esploro/v1/assets/991001"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(500))
                .set_body_json(json!({
                    "records": [{
                        "title": "Test Asset",
                        "resourcetype.esploro": "publication.journalArticle",
                        "files": []
                    }]
                })),
        )
        .mount(&server)
        .await;

    let app = build_router(test_state(&server));

    let (status, body) = post_json(
        &app,
        "/imports",
        json!({"entries": [{
            "asset_id": "991001",
            "remote_url": "https://files.example.edu/a.pdf"
        }]}),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = body["run_id"].as_str().unwrap().to_string();

    let (status, body) = post_json(&app, &format!("/imports/{}/cancel", run_id), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancellation_requested"], true);

    let final_status = wait_for_terminal(&app, &run_id).await;
    assert_eq!(final_status["phase"], "ABORTED");
    assert_eq!(final_status["error_message"], "Cancelled by user");

    // Nothing was submitted after the cancel landed
    let submits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/files"))
        .count();
    assert_eq!(submits, 0);
}
