use clap::Args;
use std::time::Duration;

/// Window of the limiter guarding the AI tool routes.
pub const AI_TOOLS_WINDOW_MS: u64 = 3_600_000;
pub const AI_TOOLS_MAX_REQUESTS: u32 = 10;

/// Window of the limiter guarding general endpoints (leads).
pub const GENERAL_TOOLS_WINDOW_MS: u64 = 900_000;
pub const GENERAL_TOOLS_MAX_REQUESTS: u32 = 100;

/// How often expired limiter windows are dropped from the counter store.
pub const LIMITER_SWEEP_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_SITE_URL: &str = "https://bytebeam.co";
pub const APP_TITLE: &str = "ByteBeam AI Document Tools";

pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Used by the structured extraction prompts to keep JSON output stable.
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;

/// Per-route character caps.
pub const SUMMARIZE_MAX_CHARS: usize = 50_000;
pub const TRANSLATE_MAX_CHARS: usize = 30_000;
pub const CONTRACT_MAX_CHARS: usize = 100_000;
pub const CHAT_MAX_CHARS: usize = 50_000;
pub const POLICY_MAX_CHARS: usize = 100_000;
pub const COMPARE_MAX_CHARS: usize = 50_000;

/// Settings for the OpenRouter gateway.
#[derive(Debug, Clone, Args)]
pub struct GatewayConfig {
    /// OpenRouter API key; AI routes fail with a configuration error without it
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub openrouter_api_key: Option<String>,

    /// OpenRouter API base URL
    #[arg(long, env = "OPENROUTER_BASE_URL", default_value = DEFAULT_OPENROUTER_BASE_URL)]
    pub openrouter_base_url: String,

    /// Model used when a request does not name one
    #[arg(long, env = "OPENROUTER_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sent as the HTTP-Referer attribution header
    #[arg(long, env = "SITE_URL", default_value = DEFAULT_SITE_URL)]
    pub site_url: String,

    /// Upper bound on a single upstream call
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = DEFAULT_UPSTREAM_TIMEOUT_SECS)]
    pub upstream_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            upstream_timeout_secs: DEFAULT_UPSTREAM_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// Config pointing at `base_url` with the given key, defaults elsewhere.
    pub fn with_endpoint(base_url: impl Into<String>, api_key: Option<&str>) -> Self {
        Self {
            openrouter_api_key: api_key.map(str::to_string),
            openrouter_base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// The API key, treating an empty or blank value as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.openrouter_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = GatewayConfig::with_endpoint("http://localhost", Some("   "));
        assert_eq!(config.api_key(), None);

        let config = GatewayConfig::with_endpoint("http://localhost", Some("sk-or-1"));
        assert_eq!(config.api_key(), Some("sk-or-1"));
    }
}
