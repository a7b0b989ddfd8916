//! LLM gateway: one chat-completion call per document task.

mod client;
mod document_ai;
pub mod prompts;
pub mod types;

pub use client::OpenRouterClient;
pub use document_ai::DocumentAi;
pub use prompts::{SummaryLength, ToolPrompt, DEFAULT_CLAUSE_TYPES};
pub use types::{ChatMessage, Completion, CompletionOptions, Role, Usage};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::GatewayError;

/// Anything that can answer a chat completion. [`OpenRouterClient`] in
/// production; tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn is_configured(&self) -> bool;

    fn default_model(&self) -> String;

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<Completion, GatewayError>;
}
