use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use futures_util::StreamExt;
use quill_ai_adapters::RetryPolicy;
use quill_core::infrastructure::auth::StaticCredentials;
use quill_core::infrastructure::config::AppConfig;
use quill_core::infrastructure::storage::SessionStorage;
use quill_core::QuillWorkflow;
use quill_server::{build_router, AppState};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const ANSWER_TEXT: &str = "A single detailed answer.";

fn is_numbered(id: &str) -> bool {
    !id.is_empty() && id.split('.').all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

/// Answers each `<number>: question` line of a topic prompt, or replies with
/// a fixed sentence.
fn reply_for(prompt: &str) -> String {
    let numbered: Vec<String> = prompt
        .lines()
        .filter_map(|line| line.split_once(": "))
        .filter(|(id, _)| is_numbered(id))
        .map(|(id, _)| format!("{}: Answer for {}", id, id))
        .collect();
    if numbered.is_empty() {
        ANSWER_TEXT.to_string()
    } else {
        numbered.join("\n\n")
    }
}

async fn completions(
    State(calls): State<Arc<AtomicUsize>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    calls.fetch_add(1, Ordering::SeqCst);
    let prompt = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or("");
    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": reply_for(prompt) },
            "finish_reason": "stop"
        }]
    }))
}

async fn spawn_endpoint() -> (String, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/serving-endpoints/:model/invocations", post(completions))
        .with_state(calls.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), calls)
}

async fn spawn_server(endpoint: &str, scratch: &Path, volume: Option<&Path>) -> String {
    let mut config = AppConfig::default();
    config.databricks.host = endpoint.to_string();
    config.databricks.token = Some("test-token".to_string());
    config.databricks.volume_path = volume.map(Path::to_path_buf);
    config.api.timeout_secs = 10;
    config.api.generation_retry = RetryPolicy::generation().without_delay();

    let workflow = QuillWorkflow::new(
        config,
        Arc::new(StaticCredentials::bearer("test-token")),
        SessionStorage::new(scratch),
    )
    .unwrap();
    let app = build_router(Arc::new(AppState::new(workflow)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/v1")
}

async fn create_session(client: &reqwest::Client, base: &str) -> String {
    let response = client
        .post(format!("{base}/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: Value = response.json().await.unwrap();
    body["data"]["sessionId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn sample_questions_run_through_generation_and_export() {
    let (endpoint, calls) = spawn_endpoint().await;
    let scratch = tempfile::tempdir().unwrap();
    let volume = tempfile::tempdir().unwrap();
    let base = spawn_server(&endpoint, scratch.path(), Some(volume.path())).await;
    let client = reqwest::Client::new();

    let ping: Value = client
        .get(format!("{base}/ping"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ping["status"], 200);
    assert_eq!(ping["data"], "pong");

    let id = create_session(&client, &base).await;

    let sample = client
        .post(format!("{base}/sessions/{id}/sample"))
        .send()
        .await
        .unwrap();
    assert_eq!(sample.status(), StatusCode::CREATED);

    let extracted: Value = client
        .post(format!("{base}/sessions/{id}/extract"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(extracted["data"]["info"]["method"], "csv_direct");
    assert_eq!(extracted["data"]["questions"].as_array().unwrap().len(), 8);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let events = client
        .get(format!("{base}/sessions/{id}/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(events.status(), StatusCode::OK);
    let mut stream = events.bytes_stream();

    let started = client
        .post(format!("{base}/sessions/{id}/generate"))
        .json(&json!({ "limit": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(started.status(), StatusCode::ACCEPTED);
    let ticket: Value = started.json().await.unwrap();
    assert_eq!(ticket["data"]["totalQuestions"], 3);

    let mut received = String::new();
    while !received.contains("event: completed") {
        let chunk = tokio::time::timeout(Duration::from_secs(10), stream.next())
            .await
            .expect("progress arrived in time")
            .expect("stream open")
            .unwrap();
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: started"));
    assert!(received.contains("event: progress"));
    // The sample questions share one topic and are answered in one call.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let summary: Value = client
        .get(format!("{base}/sessions/{id}/summary"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["data"]["totalQuestions"], 3);
    assert_eq!(summary["data"]["failedAnswers"], 0);

    let edited: Value = client
        .put(format!("{base}/sessions/{id}/answers/1.1"))
        .json(&json!({ "answer": "Edited answer", "topic": "Security" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(edited["data"]["answer"], "Edited answer");

    let export = client
        .get(format!("{base}/sessions/{id}/export?format=html&filename=review"))
        .header("X-Forwarded-Email", "analyst@example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(export.status(), StatusCode::OK);
    let content_type = export.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let disposition = export.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(disposition, "attachment; filename=\"review.html\"");
    let html = export.text().await.unwrap();
    assert!(html.contains("Edited answer"));
    assert!(volume.path().join("exports").join("review.html").exists());

    let session: Value = client
        .get(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session["data"]["currentStep"], "download");
    assert_eq!(session["data"]["exportFileName"], "review.html");
}

#[tokio::test]
async fn invalid_requests_use_the_error_envelope() {
    let (endpoint, _calls) = spawn_endpoint().await;
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_server(&endpoint, scratch.path(), None).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("{base}/sessions/session-missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["status"], 404);
    assert!(body["data"].is_null());
    assert!(body["message"].as_str().unwrap().contains("session-missing"));

    let id = create_session(&client, &base).await;

    let form = Form::new().text("name", "Notes").part(
        "file",
        Part::bytes(b"plain text".to_vec()).file_name("notes.txt"),
    );
    let rejected = client
        .post(format!("{base}/sessions/{id}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    let skipped = client
        .post(format!("{base}/sessions/{id}/step"))
        .json(&json!({ "step": "generate" }))
        .send()
        .await
        .unwrap();
    assert_eq!(skipped.status(), StatusCode::BAD_REQUEST);

    let not_running = client
        .post(format!("{base}/sessions/{id}/generate/cancel"))
        .send()
        .await
        .unwrap();
    assert_eq!(not_running.status(), StatusCode::NOT_FOUND);

    let no_answers = client
        .get(format!("{base}/sessions/{id}/export"))
        .send()
        .await
        .unwrap();
    assert_eq!(no_answers.status(), StatusCode::BAD_REQUEST);

    let deleted = client
        .delete(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::OK);
    let gone = client
        .get(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploaded_csv_is_previewed() {
    let (endpoint, _calls) = spawn_endpoint().await;
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_server(&endpoint, scratch.path(), None).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let csv = "ID,Question\n1,Do you support SSO?\n2,Where is data stored?\n";
    let form = Form::new().text("name", "Vendor RFI").part(
        "file",
        Part::bytes(csv.as_bytes().to_vec()).file_name("vendor.csv"),
    );
    let uploaded: Value = client
        .post(format!("{base}/sessions/{id}/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(uploaded["status"], 201);
    assert_eq!(uploaded["data"]["name"], "Vendor RFI");

    let preview: Value = client
        .get(format!("{base}/sessions/{id}/preview"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(preview["data"]["content"]["kind"], "csv");
    assert_eq!(preview["data"]["content"]["total_rows"], 2);
}

#[tokio::test]
async fn chat_history_is_kept_per_session() {
    let (endpoint, calls) = spawn_endpoint().await;
    let scratch = tempfile::tempdir().unwrap();
    let base = spawn_server(&endpoint, scratch.path(), None).await;
    let client = reqwest::Client::new();
    let id = create_session(&client, &base).await;

    let asked: Value = client
        .post(format!("{base}/sessions/{id}/chat"))
        .json(&json!({ "question": "Which regions are available?" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(asked["data"]["answer"], ANSWER_TEXT);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let blank = client
        .post(format!("{base}/sessions/{id}/chat"))
        .json(&json!({ "question": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

    let recent: Value = client
        .get(format!("{base}/sessions/{id}/chat?limit=5"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = recent["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["label"], "✅ Which regions are available?");

    let transcript: Value = client
        .get(format!("{base}/sessions/{id}/chat/transcript"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let text = transcript["data"]["transcript"].as_str().unwrap();
    assert!(text.contains("Q1: Which regions are available?"));
    assert!(text.contains(&format!("A1: {}", ANSWER_TEXT)));

    let cleared = client
        .delete(format!("{base}/sessions/{id}/chat"))
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status(), StatusCode::OK);
    let session: Value = client
        .get(format!("{base}/sessions/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(session["data"]["chatHistory"].as_array().unwrap().is_empty());
}
