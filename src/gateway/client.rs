use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{GatewayConfig, APP_TITLE};
use crate::error::GatewayError;

use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Completion, CompletionOptions};
use super::ChatBackend;

/// Thin client for OpenRouter's chat-completions endpoint.
///
/// One request per call: no retries, no streaming. The configured timeout and
/// the caller's cancellation token bound how long a call can hang.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
    site_url: String,
}

impl OpenRouterClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .build()?;

        Ok(Self {
            http,
            api_key: config.api_key().map(str::to_string),
            base_url: config.openrouter_base_url.trim_end_matches('/').to_string(),
            default_model: config.model.clone(),
            site_url: config.site_url.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub async fn call(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        cancel: &CancellationToken,
    ) -> Result<Completion, GatewayError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GatewayError::NotConfigured);
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("OpenRouter call cancelled by caller");
                Err(GatewayError::Cancelled)
            }
            result = self.send(api_key, messages, options) => result,
        }
    }

    async fn send(
        &self,
        api_key: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<Completion, GatewayError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "POST {} model={} messages={} max_tokens={} temperature={}",
            url,
            model,
            messages.len(),
            options.max_tokens,
            options.temperature
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", APP_TITLE)
            .json(&ChatCompletionRequest {
                model,
                messages,
                max_tokens: options.max_tokens,
                temperature: options.temperature,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            let message = body
                .as_ref()
                .and_then(|b| b["error"]["message"].as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("OpenRouter request failed with status {}", status.as_u16()));
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        // OpenRouter may answer with a dated slug; callers see the model they asked for.
        if let Some(served) = body.model.as_deref().filter(|served| *served != model) {
            debug!("requested {} was served by {}", model, served);
        }

        Ok(Completion {
            content,
            model: model.to_string(),
            usage: body.usage,
        })
    }
}

#[async_trait]
impl ChatBackend for OpenRouterClient {
    fn is_configured(&self) -> bool {
        OpenRouterClient::is_configured(self)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        options: CompletionOptions,
        cancel: CancellationToken,
    ) -> Result<Completion, GatewayError> {
        self.call(&messages, &options, &cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::types::Usage;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, key: Option<&str>) -> OpenRouterClient {
        OpenRouterClient::new(&GatewayConfig::with_endpoint(server.uri(), key)).unwrap()
    }

    #[tokio::test]
    async fn sends_defaults_and_reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("x-title", APP_TITLE))
            .and(body_partial_json(json!({
                "model": "openai/gpt-4o-mini",
                "max_tokens": 2000,
                "temperature": 0.3,
                "messages": [{ "role": "user", "content": "ping" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "openai/gpt-4o-mini",
                "choices": [{ "message": { "role": "assistant", "content": "pong" } }],
                "usage": { "prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = client_for(&server, Some("sk-test"))
            .call(&[ChatMessage::user("ping")], &CompletionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(completion.content, "pong");
        assert_eq!(completion.model, "openai/gpt-4o-mini");
        assert_eq!(
            completion.usage,
            Some(Usage {
                prompt_tokens: 3,
                completion_tokens: 1,
                total_tokens: 4
            })
        );
    }

    #[tokio::test]
    async fn missing_content_becomes_empty_string() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let options = CompletionOptions {
            model: Some("anthropic/claude-3.5-haiku".to_string()),
            ..CompletionOptions::default()
        };
        let completion = client_for(&server, Some("sk-test"))
            .call(&[ChatMessage::user("ping")], &options, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.content, "");
        assert_eq!(completion.model, "anthropic/claude-3.5-haiku");
        assert!(completion.usage.is_none());
    }

    #[tokio::test]
    async fn requested_model_is_reported_over_served_slug() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "openai/gpt-4o-mini-2024-07-18",
                "choices": [{ "message": { "role": "assistant", "content": "ok" } }]
            })))
            .mount(&server)
            .await;

        let completion = client_for(&server, Some("sk-test"))
            .call(&[ChatMessage::user("ping")], &CompletionOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(completion.model, "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn upstream_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({ "error": { "message": "No auth credentials found", "code": 401 } })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server, Some("sk-bad"))
            .call(&[ChatMessage::user("ping")], &CompletionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { status: 401, .. }));
        assert_eq!(err.to_string(), "No auth credentials found");
    }

    #[tokio::test]
    async fn status_is_used_when_error_body_is_opaque() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("sk-test"))
            .call(&[ChatMessage::user("ping")], &CompletionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "OpenRouter request failed with status 503");
    }

    #[tokio::test]
    async fn unconfigured_client_never_touches_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        assert!(!client.is_configured());
        let err = client
            .call(&[ChatMessage::user("ping")], &CompletionOptions::default(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured));
        assert!(err.to_string().contains("not configured"));
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "choices": [] }))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Some("sk-test"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client
            .call(&[ChatMessage::user("ping")], &CompletionOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Cancelled));
    }
}
