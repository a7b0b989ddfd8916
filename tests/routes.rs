use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use rstest::rstest;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use bytebeam_tools::config::{GatewayConfig, DEFAULT_MODEL};
use bytebeam_tools::gateway::{ChatBackend, ChatMessage, Completion, CompletionOptions};
use bytebeam_tools::http::{router, AppState};
use bytebeam_tools::GatewayError;
use test_support::upstream::{TEST_API_KEY, TEST_MODEL};
use test_support::FakeOpenRouter;

fn app_for(fake: &FakeOpenRouter) -> Router {
    let config = GatewayConfig::with_endpoint(fake.base_url(), Some(TEST_API_KEY));
    router(AppState::from_config(&config).unwrap())
}

fn unconfigured_app() -> Router {
    let config = GatewayConfig::with_endpoint("http://127.0.0.1:9", None);
    router(AppState::from_config(&config).unwrap())
}

async fn call(app: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(path);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn status_reports_availability() {
    let (status, body) = call(&unconfigured_app(), "GET", "/api/tools/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["aiAvailable"], false);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    let fake = FakeOpenRouter::start().await;
    let (_, body) = call(&app_for(&fake), "GET", "/api/tools/status", None).await;
    assert_eq!(body["aiAvailable"], true);
    assert_eq!(body["model"], DEFAULT_MODEL);
}

#[test_log::test(tokio::test)]
async fn translate_returns_content_and_model() {
    let fake = FakeOpenRouter::replying("Hello").await;
    let app = app_for(&fake);

    let (status, body) = call(
        &app,
        "POST",
        "/api/tools/translate",
        Some(json!({ "text": "Hola", "targetLanguage": "English" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "Hello");
    assert_eq!(body["model"], TEST_MODEL);
    assert_eq!(body["usage"]["totalTokens"], 168);
    assert!(body.get("parsedData").is_none());

    let sent = fake.request_bodies().await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0]["messages"][0]["content"].as_str().unwrap().contains("into English"));
    assert_eq!(sent[0]["messages"][1]["content"], "Hola");
}

#[tokio::test]
async fn missing_key_fails_with_server_error() {
    let (status, body) = call(
        &unconfigured_app(),
        "POST",
        "/api/tools/summarize",
        Some(json!({ "text": "Quarterly report" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("configured"));
}

#[rstest]
#[case("/api/tools/summarize", json!({ "text": "x".repeat(50_001) }), "text exceeds maximum length of 50000 characters")]
#[case("/api/tools/translate", json!({ "text": "x".repeat(30_001), "targetLanguage": "fr" }), "text exceeds maximum length of 30000 characters")]
#[case("/api/tools/translate", json!({ "text": "bonjour" }), "targetLanguage is required")]
#[case("/api/tools/chat", json!({ "documentText": "doc" }), "question is required")]
#[case("/api/tools/extract-invoice", json!({ "text": "" }), "text is required")]
#[case("/api/tools/summarize", json!({ "text": "ok", "length": "epic" }), "length must be one of short, medium, long")]
#[case("/api/tools/analyze-contract", json!({ "text": "x".repeat(100_001) }), "text exceeds maximum length of 100000 characters")]
#[case("/api/tools/analyze-policy", json!({ "text": "x".repeat(100_001) }), "text exceeds maximum length of 100000 characters")]
#[case("/api/tools/find-clauses", json!({ "text": "x".repeat(100_001) }), "text exceeds maximum length of 100000 characters")]
#[case("/api/tools/chat", json!({ "documentText": "x".repeat(50_001), "question": "q" }), "documentText exceeds maximum length of 50000 characters")]
#[case("/api/tools/compare", json!({ "document1": "v1", "document2": "x".repeat(50_001) }), "document2 exceeds maximum length of 50000 characters")]
#[case("/api/tools/find-clauses", json!({ "text": "c", "clauseTypes": "Termination" }), "clauseTypes must be an array of strings")]
#[tokio::test]
async fn invalid_input_is_rejected_before_upstream(
    #[case] path: &str,
    #[case] body: Value,
    #[case] message: &str,
) {
    let fake = FakeOpenRouter::replying("unused").await;
    let (status, response) = call(&app_for(&fake), "POST", path, Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], message);
    assert!(fake.requests().await.is_empty());
}

async fn send_raw(app: &Router, content_type: Option<&str>, body: &'static str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("POST").uri("/api/tools/summarize");
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let response = app.clone().oneshot(builder.body(Body::from(body)).unwrap()).await.unwrap();
    let status = response.status();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[rstest]
#[case(None, "", "Content-Type")]
#[case(Some("text/plain"), r#"{"text":"hi"}"#, "Content-Type")]
#[case(Some("application/json"), "{not json", "parse")]
#[case(Some("application/json"), "", "parse")]
#[tokio::test]
async fn unreadable_bodies_get_the_error_envelope(
    #[case] content_type: Option<&str>,
    #[case] body: &'static str,
    #[case] mentions: &str,
) {
    let fake = FakeOpenRouter::replying("unused").await;
    let (status, response) = send_raw(&app_for(&fake), content_type, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = response["error"].as_str().unwrap();
    assert!(message.contains(mentions), "{message}");
    assert!(fake.requests().await.is_empty());
}

#[tokio::test]
async fn text_at_the_cap_is_accepted() {
    let fake = FakeOpenRouter::replying("short summary").await;
    let (status, _) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/summarize",
        Some(json!({ "text": "é".repeat(50_000) })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[rstest]
#[case("/api/tools/extract-invoice", r#"{"invoiceNumber":"INV-7","total":120,"currency":"AED","lineItems":[]}"#)]
#[case("/api/tools/extract-receipt", r#"{"merchant":{"name":"Cafe"},"total":18.5,"items":[]}"#)]
#[case("/api/tools/parse-resume", r#"{"name":"Sam Lee","skills":["Rust"],"experience":[]}"#)]
#[case("/api/tools/scan-card", r#"{"name":"Sam Lee","company":"Acme","email":"sam@acme.io"}"#)]
#[case("/api/tools/extract-bank-statement", r#"{"bankName":"Emirates NBD","closingBalance":1000,"transactions":[]}"#)]
#[tokio::test]
async fn json_output_is_parsed(#[case] path: &str, #[case] content: &str) {
    let fake = FakeOpenRouter::replying(content).await;
    let (status, body) = call(&app_for(&fake), "POST", path, Some(json!({ "text": "scanned text" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], content);
    assert_eq!(body["parsedData"], serde_json::from_str::<Value>(content).unwrap());
    assert_eq!(body["extraction"]["status"], "structured");
}

#[tokio::test]
async fn prose_output_has_no_parsed_data() {
    let fake = FakeOpenRouter::replying("I could not find an invoice in this text.").await;
    let (status, body) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/extract-invoice",
        Some(json!({ "text": "grocery list" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("parsedData").is_none());
    assert_eq!(body["extraction"]["status"], "unstructured");
}

#[tokio::test]
async fn schema_mismatch_keeps_parsed_data() {
    let fake = FakeOpenRouter::replying(r#"{"total":"one hundred"}"#).await;
    let (_, body) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/extract-invoice",
        Some(json!({ "text": "invoice" })),
    )
    .await;

    assert_eq!(body["parsedData"]["total"], "one hundred");
    assert_eq!(body["extraction"]["status"], "schema_mismatch");
    assert!(!body["extraction"]["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn chat_forwards_history_and_question() {
    let fake = FakeOpenRouter::replying("The term is 12 months.").await;
    let (status, body) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/chat",
        Some(json!({
            "documentText": "This lease runs for 12 months.",
            "question": "How long is the term?",
            "conversationHistory": [
                { "role": "user", "content": "Who is the landlord?" },
                { "role": "assistant", "content": "Not stated." }
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "The term is 12 months.");

    let sent = fake.request_bodies().await;
    let messages = sent[0]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].as_str().unwrap().contains("12 months"));
    assert_eq!(messages[1]["content"], "Who is the landlord?");
    assert_eq!(messages[3]["content"], "How long is the term?");
}

#[tokio::test]
async fn malformed_history_is_rejected() {
    let fake = FakeOpenRouter::replying("unused").await;
    let (status, body) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/chat",
        Some(json!({ "documentText": "doc", "question": "q", "conversationHistory": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("conversationHistory"));
}

#[tokio::test]
async fn find_clauses_uses_requested_types() {
    let fake = FakeOpenRouter::replying(
        r#"{"clauses":[{"type":"Exclusivity","found":false,"text":null,"summary":null}]}"#,
    )
    .await;
    let (status, body) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/find-clauses",
        Some(json!({ "text": "Supply agreement", "clauseTypes": ["Exclusivity", "Audit Rights"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parsedData"]["clauses"][0]["type"], "Exclusivity");
    assert_eq!(body["extraction"]["status"], "structured");

    let sent = fake.request_bodies().await;
    let prompt = sent[0]["messages"][0]["content"].as_str().unwrap();
    assert!(prompt.contains("Exclusivity, Audit Rights"));
    assert!(!prompt.contains("Force Majeure"));
}

#[tokio::test]
async fn compare_sends_both_documents() {
    let fake = FakeOpenRouter::replying("Clause 4 differs.").await;
    let (status, _) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/compare",
        Some(json!({ "document1": "version one", "document2": "version two" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let sent = fake.request_bodies().await;
    let prompt = sent[0]["messages"][1]["content"].as_str().unwrap();
    assert!(prompt.contains("DOCUMENT 1:\nversion one"));
    assert!(prompt.contains("DOCUMENT 2:\nversion two"));
}

#[tokio::test]
async fn upstream_error_message_is_surfaced() {
    let fake = FakeOpenRouter::failing(402, "Insufficient credits").await;
    let (status, body) = call(
        &app_for(&fake),
        "POST",
        "/api/tools/analyze-contract",
        Some(json!({ "text": "This agreement..." })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Insufficient credits");
}

/// Backend that parks until its token is cancelled, keeping the token for inspection.
#[derive(Default)]
struct ParkedBackend {
    token: Mutex<Option<CancellationToken>>,
}

#[async_trait]
impl ChatBackend for ParkedBackend {
    fn is_configured(&self) -> bool {
        true
    }

    fn default_model(&self) -> String {
        DEFAULT_MODEL.to_string()
    }

    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _options: CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<Completion, GatewayError> {
        *self.token.lock().unwrap() = Some(cancel.clone());
        cancel.cancelled().await;
        Err(GatewayError::Cancelled)
    }
}

#[tokio::test]
async fn dropped_request_cancels_the_gateway_token() {
    let backend = Arc::new(ParkedBackend::default());
    let app = router(AppState::new(backend.clone()));

    let request = Request::builder()
        .method("POST")
        .uri("/api/tools/summarize")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "text": "minutes" }).to_string()))
        .unwrap();
    let in_flight = tokio::spawn(app.oneshot(request));

    let token = loop {
        if let Some(token) = backend.token.lock().unwrap().clone() {
            break token;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert!(!token.is_cancelled());

    in_flight.abort();
    assert!(in_flight.await.unwrap_err().is_cancelled());
    assert!(token.is_cancelled());
}
