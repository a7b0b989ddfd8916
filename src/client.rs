//! Command-line counterpart of a tool page: extract text locally, submit it
//! to a tool route, and track the round trip as a small state machine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use log::{debug, info};
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::extract;

/// Tool routes reachable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Tool {
    Summarize,
    Translate,
    Invoice,
    Receipt,
    Resume,
    Contract,
    Card,
    Chat,
    BankStatement,
    Policy,
    Clauses,
}

impl Tool {
    pub fn path(self) -> &'static str {
        match self {
            Tool::Summarize => "/api/tools/summarize",
            Tool::Translate => "/api/tools/translate",
            Tool::Invoice => "/api/tools/extract-invoice",
            Tool::Receipt => "/api/tools/extract-receipt",
            Tool::Resume => "/api/tools/parse-resume",
            Tool::Contract => "/api/tools/analyze-contract",
            Tool::Card => "/api/tools/scan-card",
            Tool::Chat => "/api/tools/chat",
            Tool::BankStatement => "/api/tools/extract-bank-statement",
            Tool::Policy => "/api/tools/analyze-policy",
            Tool::Clauses => "/api/tools/find-clauses",
        }
    }

    /// Request body for `text`, or an error if a tool-specific option is missing.
    pub fn body(self, text: &str, options: &ToolOptions) -> Result<Value> {
        let body = match self {
            Tool::Summarize => {
                let mut body = json!({ "text": text });
                if let Some(language) = &options.language {
                    body["language"] = json!(language);
                }
                if let Some(length) = &options.length {
                    body["length"] = json!(length);
                }
                body
            }
            Tool::Translate => {
                let target = options
                    .target_language
                    .as_deref()
                    .ok_or_else(|| anyhow!("--target-language is required for translate"))?;
                let mut body = json!({ "text": text, "targetLanguage": target });
                if let Some(language) = &options.language {
                    body["sourceLanguage"] = json!(language);
                }
                body
            }
            Tool::Chat => {
                let question = options
                    .question
                    .as_deref()
                    .ok_or_else(|| anyhow!("--question is required for chat"))?;
                json!({ "documentText": text, "question": question })
            }
            Tool::Clauses if !options.clause_types.is_empty() => {
                json!({ "text": text, "clauseTypes": options.clause_types })
            }
            _ => json!({ "text": text }),
        };
        Ok(body)
    }
}

/// Tool-specific knobs from the command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOptions {
    /// Summary language, or translation source language.
    pub language: Option<String>,
    pub length: Option<String>,
    pub target_language: Option<String>,
    pub question: Option<String>,
    pub clause_types: Vec<String>,
}

/// HTTP client for the tool routes.
#[derive(Debug, Clone)]
pub struct ToolClient {
    http: reqwest::Client,
    base_url: String,
}

impl ToolClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Posts `body` to `path`, returning the JSON body of a 2xx answer or
    /// the server's `error` message otherwise.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        if status.is_success() {
            return Ok(body);
        }

        let message = body["error"].as_str().unwrap_or("unknown error");
        match body["retryAfter"].as_u64() {
            Some(retry_after) => Err(anyhow!("{} (retry after {}s)", message, retry_after)),
            None => Err(anyhow!("{} (HTTP {})", message, status.as_u16())),
        }
    }

    pub async fn submit(&self, tool: Tool, text: &str, options: &ToolOptions) -> Result<Value> {
        let body = tool.body(text, options)?;
        self.post(tool.path(), &body).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ExtractingText,
    CallingAi,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Processing(Stage),
    Completed(Value),
    Error(String),
}

/// One file's trip through a tool: `Idle → Processing(ExtractingText) →
/// Processing(CallingAi) → Completed | Error`.
pub struct ToolSession {
    client: ToolClient,
    tool: Tool,
    options: ToolOptions,
    ocr_lang: String,
    file: Option<PathBuf>,
    state: watch::Sender<SessionState>,
}

impl ToolSession {
    pub fn new(client: ToolClient, tool: Tool, options: ToolOptions, ocr_lang: impl Into<String>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            client,
            tool,
            options,
            ocr_lang: ocr_lang.into(),
            file: None,
            state,
        }
    }

    /// Chooses the file to process, discarding any previous result.
    pub fn select(&mut self, file: impl Into<PathBuf>) {
        self.file = Some(file.into());
        self.set(SessionState::Idle);
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn set(&self, state: SessionState) {
        debug!("session -> {:?}", state);
        self.state.send_replace(state);
    }

    /// Runs extraction and the tool call in sequence. Cancelling `cancel`
    /// drops whichever step is in flight and ends in `Error("cancelled")`.
    pub async fn run(&mut self, cancel: &CancellationToken) -> SessionState {
        let Some(file) = self.file.clone() else {
            self.set(SessionState::Error("no file selected".to_string()));
            return self.state();
        };

        self.set(SessionState::Processing(Stage::ExtractingText));
        let extraction = tokio::select! {
            _ = cancel.cancelled() => None,
            result = extract::extract_text(&file, &self.ocr_lang, |p| {
                info!("OCR {}: {:.0}%", p.status, p.progress * 100.0)
            }) => Some(result),
        };
        let text = match extraction {
            None => return self.cancelled(),
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                self.set(SessionState::Error(e.to_string()));
                return self.state();
            }
        };
        info!("Extracted {} chars from {}", text.chars().count(), file.display());

        self.set(SessionState::Processing(Stage::CallingAi));
        let response = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.client.submit(self.tool, &text, &self.options) => Some(result),
        };
        match response {
            None => self.cancelled(),
            Some(Ok(value)) => {
                self.set(SessionState::Completed(value));
                self.state()
            }
            Some(Err(e)) => {
                self.set(SessionState::Error(e.to_string()));
                self.state()
            }
        }
    }

    fn cancelled(&self) -> SessionState {
        self.set(SessionState::Error("cancelled".to_string()));
        self.state()
    }
}
