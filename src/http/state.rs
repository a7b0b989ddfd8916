use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::gateway::{ChatBackend, DocumentAi, OpenRouterClient};
use crate::leads::{LeadStore, MemoryLeadStore};
use crate::limiter::FixedWindowLimiter;

#[derive(Clone)]
pub struct AppState {
    pub ai: DocumentAi,
    pub ai_limiter: FixedWindowLimiter,
    pub general_limiter: FixedWindowLimiter,
    pub leads: Arc<dyn LeadStore>,
}

impl AppState {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            ai: DocumentAi::new(backend),
            ai_limiter: FixedWindowLimiter::ai_tools(),
            general_limiter: FixedWindowLimiter::general_tools(),
            leads: Arc::new(MemoryLeadStore::new()),
        }
    }

    /// State backed by a real OpenRouter client.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self::new(Arc::new(OpenRouterClient::new(config)?)))
    }

    pub fn with_leads(mut self, leads: Arc<dyn LeadStore>) -> Self {
        self.leads = leads;
        self
    }
}
