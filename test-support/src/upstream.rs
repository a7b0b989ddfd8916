use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const TEST_API_KEY: &str = "sk-or-test";
pub const TEST_MODEL: &str = "openai/gpt-4o-mini";

/// An OpenRouter chat-completions body whose first choice says `content`.
pub fn completion_body(content: &str) -> Value {
    json!({
        "id": "gen-test",
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": { "role": "assistant", "content": content }
        }],
        "usage": { "prompt_tokens": 120, "completion_tokens": 48, "total_tokens": 168 }
    })
}

/// Stand-in for OpenRouter's `/chat/completions`.
pub struct FakeOpenRouter {
    server: MockServer,
}

impl FakeOpenRouter {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Answers every completion request with `content`.
    pub async fn replying(content: &str) -> Self {
        let fake = Self::start().await;
        fake.reply_with(ResponseTemplate::new(200).set_body_json(completion_body(content)))
            .await;
        fake
    }

    /// Answers every completion request with an OpenRouter-style error.
    pub async fn failing(status: u16, message: &str) -> Self {
        let fake = Self::start().await;
        fake.reply_with(
            ResponseTemplate::new(status).set_body_json(json!({ "error": { "message": message, "code": status } })),
        )
        .await;
        fake
    }

    pub async fn reply_with(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Base URL to hand to the gateway as the OpenRouter endpoint.
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// JSON bodies of all completion requests received so far.
    pub async fn request_bodies(&self) -> Vec<Value> {
        self.requests()
            .await
            .iter()
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}
