use axum::{
    extract::{Request, State},
    http::StatusCode,
    Json,
};
use chrono::{SecondsFormat, Utc};
use log::info;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::{
    CHAT_MAX_CHARS, COMPARE_MAX_CHARS, CONTRACT_MAX_CHARS, POLICY_MAX_CHARS, SUMMARIZE_MAX_CHARS,
    TRANSLATE_MAX_CHARS,
};
use crate::error::ToolError;
use crate::gateway::{ChatMessage, Completion, SummaryLength};
use crate::leads::{Lead, NewLead};
use crate::limiter::RateLimitInfo;
use crate::structured::{Extraction, ExtractionKind, ExtractionReport};

use super::state::AppState;
use super::validation::{optional_field, optional_text, required_text, JsonBody};

/// Body of every AI tool response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    #[serde(flatten)]
    pub completion: Completion,
    /// The parsed model output, when the tool expects JSON and got valid JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionReport>,
}

impl ToolResponse {
    fn text(completion: Completion) -> Json<ToolResponse> {
        Json(ToolResponse {
            completion,
            parsed_data: None,
            extraction: None,
        })
    }

    fn structured(kind: ExtractionKind, completion: Completion) -> Json<ToolResponse> {
        let (parsed_data, report) = Extraction::classify(kind, &completion.content).into_parts();
        Json(ToolResponse {
            completion,
            parsed_data,
            extraction: Some(report),
        })
    }
}

type ToolResult = Result<Json<ToolResponse>, ToolError>;

/// Token for the gateway call, cancelled by the guard when the handler future
/// is dropped. Dropping the handler already drops the in-flight request; the
/// token only reaches work a backend has spawned outside that future.
fn request_scope() -> (CancellationToken, DropGuard) {
    let token = CancellationToken::new();
    let guard = token.clone().drop_guard();
    (token, guard)
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "aiAvailable": state.ai.is_configured(),
        "model": state.ai.default_model(),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

pub async fn rate_limit_status(State(state): State<AppState>, request: Request) -> Json<RateLimitInfo> {
    let (parts, _body) = request.into_parts();
    Json(state.ai_limiter.rate_limit_info(&parts).await)
}

pub async fn summarize(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let text = required_text(&body, "text", Some(SUMMARIZE_MAX_CHARS))?;
    let length = match optional_text(&body, "length")? {
        Some(value) => SummaryLength::parse(value)
            .ok_or_else(|| ToolError::bad_request("length must be one of short, medium, long"))?,
        None => SummaryLength::default(),
    };
    let language = optional_text(&body, "language")?;

    info!("summarize: {} chars, {:?}", text.chars().count(), length);
    let (cancel, _scope) = request_scope();
    let completion = state
        .ai
        .summarize_document(text, length, language, &cancel)
        .await?;
    Ok(ToolResponse::text(completion))
}

pub async fn translate(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let text = required_text(&body, "text", Some(TRANSLATE_MAX_CHARS))?;
    let target_language = required_text(&body, "targetLanguage", None)?;
    let source_language = optional_text(&body, "sourceLanguage")?;

    info!("translate: {} chars into {}", text.chars().count(), target_language);
    let (cancel, _scope) = request_scope();
    let completion = state
        .ai
        .translate_document(text, target_language, source_language, &cancel)
        .await?;
    Ok(ToolResponse::text(completion))
}

async fn extraction_route(state: &AppState, body: &Value, kind: ExtractionKind) -> ToolResult {
    let text = required_text(body, "text", None)?;
    info!("{}: {} chars", kind.name(), text.chars().count());
    let (cancel, _scope) = request_scope();
    let completion = state.ai.extract(kind, text, &cancel).await?;
    Ok(ToolResponse::structured(kind, completion))
}

pub async fn extract_invoice(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    extraction_route(&state, &body, ExtractionKind::Invoice).await
}

pub async fn extract_receipt(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    extraction_route(&state, &body, ExtractionKind::Receipt).await
}

pub async fn parse_resume(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    extraction_route(&state, &body, ExtractionKind::Resume).await
}

pub async fn scan_card(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    extraction_route(&state, &body, ExtractionKind::BusinessCard).await
}

pub async fn extract_bank_statement(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    extraction_route(&state, &body, ExtractionKind::BankStatement).await
}

pub async fn analyze_contract(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let text = required_text(&body, "text", Some(CONTRACT_MAX_CHARS))?;
    let (cancel, _scope) = request_scope();
    let completion = state.ai.analyze_contract(text, &cancel).await?;
    Ok(ToolResponse::text(completion))
}

pub async fn analyze_policy(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let text = required_text(&body, "text", Some(POLICY_MAX_CHARS))?;
    let (cancel, _scope) = request_scope();
    let completion = state.ai.analyze_policy(text, &cancel).await?;
    Ok(ToolResponse::text(completion))
}

pub async fn find_clauses(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let text = required_text(&body, "text", Some(CONTRACT_MAX_CHARS))?;
    let clause_types: Option<Vec<String>> = optional_field(&body, "clauseTypes", "an array of strings")?;

    let (cancel, _scope) = request_scope();
    let completion = state
        .ai
        .find_contract_clauses(text, clause_types.as_deref(), &cancel)
        .await?;
    Ok(ToolResponse::structured(ExtractionKind::ContractClauses, completion))
}

pub async fn compare(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let first = required_text(&body, "document1", Some(COMPARE_MAX_CHARS))?;
    let second = required_text(&body, "document2", Some(COMPARE_MAX_CHARS))?;

    let (cancel, _scope) = request_scope();
    let completion = state.ai.compare_documents(first, second, &cancel).await?;
    Ok(ToolResponse::text(completion))
}

pub async fn chat(State(state): State<AppState>, JsonBody(body): JsonBody) -> ToolResult {
    let document_text = required_text(&body, "documentText", Some(CHAT_MAX_CHARS))?;
    let question = required_text(&body, "question", None)?;
    let history: Vec<ChatMessage> = optional_field(
        &body,
        "conversationHistory",
        "an array of {role, content} messages",
    )?
    .unwrap_or_default();

    info!("chat: {} history turns", history.len());
    let (cancel, _scope) = request_scope();
    let completion = state
        .ai
        .chat_with_document(document_text, question, &history, &cancel)
        .await?;
    Ok(ToolResponse::text(completion))
}

pub async fn create_lead(
    State(state): State<AppState>,
    JsonBody(body): JsonBody,
) -> Result<(StatusCode, Json<Lead>), ToolError> {
    let new_lead: NewLead =
        serde_json::from_value(body).map_err(|e| ToolError::bad_request(format!("Invalid lead: {e}")))?;
    new_lead.validate().map_err(ToolError::BadRequest)?;

    let lead = state.leads.create_lead(new_lead).await?;
    info!("Stored lead {}", lead.id);
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn list_leads(State(state): State<AppState>) -> Result<Json<Vec<Lead>>, ToolError> {
    Ok(Json(state.leads.get_leads().await?))
}
