// tests/api_tests.rs

use std::sync::Arc;

use exam_proctor::{
    config::Config,
    engine::{DetectionThresholds, PolicyTable},
    routes,
    services::ProctoringService,
    state::AppState,
    store::MemoryStore,
};
use serde_json::{Value, json};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // 1. In-memory store; no database needed
    let service = ProctoringService::new(
        Arc::new(MemoryStore::new()),
        PolicyTable::builtin(),
        DetectionThresholds::default(),
    );

    // 2. Create test configuration and state
    let config = Config {
        rust_log: "error".to_string(),
        ..Config::default()
    };
    let state = AppState {
        service: Arc::new(service),
        config,
    };

    // 3. Create the router with the app state
    let app = routes::create_router(state);

    // 4. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 5. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4())
}

async fn initialize(client: &reqwest::Client, address: &str, config: Value) -> (String, String) {
    let assignment_id = unique_id("asg");
    let response = client
        .post(format!("{}/api/proctoring/sessions/initialize", address))
        .json(&json!({
            "assignmentId": assignment_id,
            "studentId": unique_id("stu"),
            "proctorConfig": config,
            "browserInfo": { "name": "firefox", "version": "128" },
            "deviceInfo": { "os": "linux" }
        }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status().as_u16(), 201);

    let body: Value = response.json().await.unwrap();
    (body["sessionId"].as_str().unwrap().to_string(), assignment_id)
}

async fn start(client: &reqwest::Client, address: &str, session_id: &str) -> reqwest::Response {
    client
        .put(format!("{}/api/proctoring/sessions/{}/start", address, session_id))
        .json(&json!({
            "systemCheck": { "camera": true, "microphone": true, "screen": true, "browser": true }
        }))
        .send()
        .await
        .expect("Failed to execute request")
}

async fn report(client: &reqwest::Client, address: &str, session_id: &str, activity: &str) -> reqwest::Response {
    client
        .post(format!(
            "{}/api/proctoring/sessions/{}/suspicious-activity",
            address, session_id
        ))
        .json(&json!({ "type": activity, "details": "detected by client" }))
        .send()
        .await
        .expect("Failed to execute request")
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn health_and_openapi_are_served() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let doc: Value = client
        .get(format!("{}/api/openapi.json", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(doc["paths"]["/api/proctoring/sessions/{id}/suspicious-activity"].is_object());
}

#[tokio::test]
async fn initialize_rejects_duplicate_attempt() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let body = json!({ "assignmentId": "asg-dup", "studentId": "stu-dup" });

    let first = client
        .post(format!("{}/api/proctoring/sessions/initialize", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(first.status().as_u16(), 201);

    let second = client
        .post(format!("{}/api/proctoring/sessions/initialize", address))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(second.status().as_u16(), 409);
    let error: Value = second.json().await.unwrap();
    assert_eq!(error["code"], "duplicate_session");
}

#[tokio::test]
async fn initialize_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/proctoring/sessions/initialize", address))
        .json(&json!({ "assignmentId": "", "studentId": "stu" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn start_requires_configured_capabilities() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({ "webcamRequired": true })).await;

    let response = client
        .put(format!("{}/api/proctoring/sessions/{}/start", address, session_id))
        .json(&json!({
            "systemCheck": { "camera": false, "microphone": true, "screen": true, "browser": true }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "system_requirements_not_met");
}

#[tokio::test]
async fn state_machine_rejects_illegal_transitions() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({})).await;

    // Signals before start
    let early = report(&client, &address, &session_id, "tab_switch").await;
    assert_eq!(early.status().as_u16(), 409);
    let error: Value = early.json().await.unwrap();
    assert_eq!(error["code"], "invalid_session_state");

    assert_eq!(start(&client, &address, &session_id).await.status().as_u16(), 200);

    // Second start
    let again = start(&client, &address, &session_id).await;
    assert_eq!(again.status().as_u16(), 409);
    let error: Value = again.json().await.unwrap();
    assert_eq!(error["code"], "invalid_session_state");

    // Review while active
    let review = client
        .post(format!("{}/api/proctoring/sessions/{}/review", address, session_id))
        .json(&json!({
            "reviewerId": "faculty-1",
            "decision": "approved",
            "notes": "",
            "overallRating": 8
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(review.status().as_u16(), 409);
}

#[tokio::test]
async fn closed_session_rejects_signals() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({})).await;
    start(&client, &address, &session_id).await;

    let end = client
        .put(format!("{}/api/proctoring/sessions/{}/end", address, session_id))
        .json(&json!({ "reason": "time_expired" }))
        .send()
        .await
        .unwrap();
    assert_eq!(end.status().as_u16(), 200);

    let late = report(&client, &address, &session_id, "tab_switch").await;
    assert_eq!(late.status().as_u16(), 409);
    let error: Value = late.json().await.unwrap();
    assert_eq!(error["code"], "session_closed");
}

#[tokio::test]
async fn unknown_session_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!(
            "{}/api/proctoring/sessions/{}",
            address,
            uuid::Uuid::new_v4()
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    let error: Value = response.json().await.unwrap();
    assert_eq!(error["code"], "session_not_found");
}

#[tokio::test]
async fn client_severity_hint_does_not_lower_severity() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({ "maxSuspiciousActivities": 10 })).await;
    start(&client, &address, &session_id).await;

    let decision: Value = client
        .post(format!(
            "{}/api/proctoring/sessions/{}/suspicious-activity",
            address, session_id
        ))
        .json(&json!({ "type": "copy_paste", "details": "ctrl+v", "severity": "low" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(decision["events"][0]["severity"], "high");
    assert_eq!(decision["action"], "flag");
    assert_eq!(decision["securityScore"], 85);
}

#[tokio::test]
async fn unknown_activity_type_is_recorded_without_penalty() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({})).await;
    start(&client, &address, &session_id).await;

    let decision: Value = report(&client, &address, &session_id, "glanced_at_window")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(decision["action"], "none");
    assert_eq!(decision["shouldTerminate"], false);
    assert_eq!(decision["securityScore"], 100);
    assert_eq!(decision["events"][0]["severity"], "low");
}

#[tokio::test]
async fn invalid_activity_type_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({})).await;
    start(&client, &address, &session_id).await;

    let response = report(&client, &address, &session_id, "Tab Switch!").await;
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn biometric_samples_raise_multiple_faces() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({ "maxSuspiciousActivities": 10 })).await;
    start(&client, &address, &session_id).await;

    let single: Value = client
        .post(format!("{}/api/proctoring/sessions/{}/biometric-data", address, session_id))
        .json(&json!({ "faceDetection": { "faceCount": 1, "confidence": 0.97 } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(single["events"].as_array().unwrap().len(), 0);

    let crowd: Value = client
        .post(format!("{}/api/proctoring/sessions/{}/biometric-data", address, session_id))
        .json(&json!({
            "faceDetection": { "faceCount": 2, "confidence": 0.91 },
            "environmentAudio": { "levelDb": 42.0 }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(crowd["events"][0]["type"], "multiple_faces");
    assert_eq!(crowd["events"][0]["source"], "biometric");
    assert_eq!(crowd["securityScore"], 80);

    let session: Value = client
        .get(format!("{}/api/proctoring/sessions/{}", address, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["biometricSamples"].as_array().unwrap().len(), 2);
    assert_eq!(session["suspiciousActivities"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn screen_activity_over_threshold_raises_event() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({ "maxSuspiciousActivities": 10 })).await;
    start(&client, &address, &session_id).await;

    let brief: Value = client
        .post(format!("{}/api/proctoring/sessions/{}/screen-activity", address, session_id))
        .json(&json!({ "action": "fullscreen_exit", "details": "esc pressed", "duration": 300 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(brief["events"].as_array().unwrap().len(), 0);
    assert_eq!(brief["securityScore"], 100);

    let long: Value = client
        .post(format!("{}/api/proctoring/sessions/{}/screen-activity", address, session_id))
        .json(&json!({ "action": "fullscreen_exit", "details": "left fullscreen", "duration": 8000 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(long["events"][0]["type"], "fullscreen_exit");
    assert_eq!(long["action"], "flag");
    assert_eq!(long["securityScore"], 85);
}

#[tokio::test]
async fn system_check_reports_missing_capabilities() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({ "audioMonitoring": true })).await;

    let result: Value = client
        .post(format!("{}/api/proctoring/sessions/{}/system-check", address, session_id))
        .json(&json!({ "camera": true, "microphone": false, "screen": false, "browser": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(result["requirementsMet"], false);
    assert_eq!(result["missing"], json!(["microphone"]));
}

#[tokio::test]
async fn recording_chunks_are_registered() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let (session_id, _) = initialize(&client, &address, json!({ "webcamRequired": true })).await;
    start(&client, &address, &session_id).await;

    let url = format!("{}/api/proctoring/sessions/{}/recordings/chunks", address, session_id);
    let chunk = |sequence: u64| {
        json!({
            "recordingType": "webcam",
            "sequence": sequence,
            "byteSize": 4096,
            "startedAt": chrono::Utc::now(),
            "durationMs": 5000,
            "storageUrl": format!("https://media.example.com/chunks/{}", sequence)
        })
    };

    let first = client.post(&url).json(&chunk(1)).send().await.unwrap();
    assert_eq!(first.status().as_u16(), 201);
    let second: Value = client
        .post(&url)
        .json(&chunk(2))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["track"]["chunkCount"], 2);
    assert_eq!(second["track"]["totalBytes"], 8192);

    let replay = client.post(&url).json(&chunk(2)).send().await.unwrap();
    assert_eq!(replay.status().as_u16(), 400);

    let mut oversized = chunk(3);
    oversized["byteSize"] = json!(u64::MAX);
    let rejected = client.post(&url).json(&oversized).send().await.unwrap();
    assert_eq!(rejected.status().as_u16(), 400);

    let session: Value = client
        .get(format!("{}/api/proctoring/sessions/{}", address, session_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["recordings"]["tracks"]["webcam"]["totalBytes"], 8192);
}
