use std::sync::Arc;

use log::info;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;
use crate::structured::ExtractionKind;

use super::prompts::{self, SummaryLength, ToolPrompt};
use super::types::{ChatMessage, Completion};
use super::ChatBackend;

/// The document tasks offered by the tool pages, each a fixed prompt over
/// one [`ChatBackend`] call.
#[derive(Clone)]
pub struct DocumentAi {
    backend: Arc<dyn ChatBackend>,
}

impl DocumentAi {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    pub fn default_model(&self) -> String {
        self.backend.default_model()
    }

    async fn run(
        &self,
        task: &str,
        prompt: ToolPrompt,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        info!("{}: sending {} messages", task, prompt.messages.len());
        let completion = self
            .backend
            .complete(prompt.messages, prompt.options, cancel.clone())
            .await?;
        if let Some(usage) = &completion.usage {
            info!("{}: {} tokens via {}", task, usage.total_tokens, completion.model);
        }
        Ok(completion)
    }

    pub async fn summarize_document(
        &self,
        text: &str,
        length: SummaryLength,
        language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        self.run("summarize", prompts::summarize(text, length, language), cancel)
            .await
    }

    pub async fn translate_document(
        &self,
        text: &str,
        target_language: &str,
        source_language: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        let prompt = prompts::translate(text, target_language, source_language);
        self.run("translate", prompt, cancel).await
    }

    pub async fn extract_invoice_data(&self, text: &str, cancel: &CancellationToken) -> Result<Completion, GatewayError> {
        self.run("extract-invoice", prompts::extract_invoice(text), cancel).await
    }

    pub async fn extract_receipt_data(&self, text: &str, cancel: &CancellationToken) -> Result<Completion, GatewayError> {
        self.run("extract-receipt", prompts::extract_receipt(text), cancel).await
    }

    pub async fn parse_resume(&self, text: &str, cancel: &CancellationToken) -> Result<Completion, GatewayError> {
        self.run("parse-resume", prompts::parse_resume(text), cancel).await
    }

    pub async fn scan_business_card(&self, text: &str, cancel: &CancellationToken) -> Result<Completion, GatewayError> {
        self.run("scan-card", prompts::scan_business_card(text), cancel).await
    }

    pub async fn extract_bank_statement_data(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        self.run("extract-bank-statement", prompts::extract_bank_statement(text), cancel)
            .await
    }

    pub async fn analyze_contract(&self, text: &str, cancel: &CancellationToken) -> Result<Completion, GatewayError> {
        self.run("analyze-contract", prompts::analyze_contract(text), cancel).await
    }

    pub async fn analyze_policy(&self, text: &str, cancel: &CancellationToken) -> Result<Completion, GatewayError> {
        self.run("analyze-policy", prompts::analyze_policy(text), cancel).await
    }

    /// Searches for `clause_types`, or the ten default clause types when `None`.
    pub async fn find_contract_clauses(
        &self,
        text: &str,
        clause_types: Option<&[String]>,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        let prompt = prompts::find_contract_clauses(text, clause_types);
        self.run("find-clauses", prompt, cancel).await
    }

    pub async fn compare_documents(
        &self,
        first: &str,
        second: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        self.run("compare", prompts::compare_documents(first, second), cancel)
            .await
    }

    pub async fn chat_with_document(
        &self,
        document_text: &str,
        question: &str,
        history: &[ChatMessage],
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        let prompt = prompts::chat_with_document(document_text, question, history);
        self.run("chat", prompt, cancel).await
    }

    /// Runs the extraction task for `kind` over a single text.
    pub async fn extract(
        &self,
        kind: ExtractionKind,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        match kind {
            ExtractionKind::Invoice => self.extract_invoice_data(text, cancel).await,
            ExtractionKind::Receipt => self.extract_receipt_data(text, cancel).await,
            ExtractionKind::Resume => self.parse_resume(text, cancel).await,
            ExtractionKind::BusinessCard => self.scan_business_card(text, cancel).await,
            ExtractionKind::BankStatement => self.extract_bank_statement_data(text, cancel).await,
            ExtractionKind::ContractClauses => self.find_contract_clauses(text, None, cancel).await,
        }
    }
}
