//! Fixed-window, per-client rate limiting for the tool routes.

mod store;

pub use store::{MemoryStore, RateLimitStore, WindowCount};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{request::Parts, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use crate::config::{
    AI_TOOLS_MAX_REQUESTS, AI_TOOLS_WINDOW_MS, GENERAL_TOOLS_MAX_REQUESTS, GENERAL_TOOLS_WINDOW_MS,
};
use crate::error::ToolError;

/// Paths the AI limiter never counts.
pub const STATUS_PATHS: &[&str] = &["/api/tools/status", "/api/tools/rate-limit-status"];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Static parameters of one limiter tier.
#[derive(Debug, Clone)]
pub struct LimiterPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u32,
    pub message: &'static str,
    pub skip_paths: &'static [&'static str],
}

impl LimiterPolicy {
    /// 10 requests per hour per client, status routes exempt.
    pub fn ai_tools() -> Self {
        Self {
            name: "ai-tools",
            window: Duration::from_millis(AI_TOOLS_WINDOW_MS),
            max_requests: AI_TOOLS_MAX_REQUESTS,
            message: "Too many AI tool requests from this IP. Please try again in an hour.",
            skip_paths: STATUS_PATHS,
        }
    }

    /// 100 requests per 15 minutes per client.
    pub fn general_tools() -> Self {
        Self {
            name: "general-tools",
            window: Duration::from_millis(GENERAL_TOOLS_WINDOW_MS),
            max_requests: GENERAL_TOOLS_MAX_REQUESTS,
            message: "Too many requests from this IP. Please try again in 15 minutes.",
            skip_paths: &[],
        }
    }

    /// The static retry hint returned with a 429, in seconds.
    pub fn retry_after_secs(&self) -> u64 {
        self.window.as_secs()
    }

    fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

/// Limiter state as seen by one request; mirrors what the status route reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitInfo {
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
    pub limit: u32,
    pub window_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allowed(RateLimitInfo),
    Limited(RateLimitInfo),
}

#[derive(Debug, Clone)]
pub struct FixedWindowLimiter {
    policy: LimiterPolicy,
    store: Arc<dyn RateLimitStore>,
}

impl FixedWindowLimiter {
    pub fn new(policy: LimiterPolicy) -> Self {
        Self::with_store(policy, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(policy: LimiterPolicy, store: Arc<dyn RateLimitStore>) -> Self {
        Self { policy, store }
    }

    pub fn ai_tools() -> Self {
        Self::new(LimiterPolicy::ai_tools())
    }

    pub fn general_tools() -> Self {
        Self::new(LimiterPolicy::general_tools())
    }

    pub fn policy(&self) -> &LimiterPolicy {
        &self.policy
    }

    pub async fn hit(&self, key: &str) -> Decision {
        self.hit_at(key, Instant::now()).await
    }

    pub async fn hit_at(&self, key: &str, now: Instant) -> Decision {
        let count = self.store.increment(key, self.policy.window, now).await;
        let info = self.info(Some(count), now);
        if count.hits > self.policy.max_requests {
            Decision::Limited(info)
        } else {
            Decision::Allowed(info)
        }
    }

    /// Live state for `key` without consuming a request.
    pub async fn status(&self, key: &str) -> RateLimitInfo {
        self.status_at(key, Instant::now()).await
    }

    pub async fn status_at(&self, key: &str, now: Instant) -> RateLimitInfo {
        let count = self.store.peek(key, self.policy.window, now).await;
        self.info(count, now)
    }

    /// State for the current request: what the middleware recorded when it
    /// ran on this request, otherwise a non-consuming read of the counter.
    pub async fn rate_limit_info(&self, parts: &Parts) -> RateLimitInfo {
        match parts.extensions.get::<RateLimitInfo>() {
            Some(info) => info.clone(),
            None => {
                let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
                self.status(&client_key(&parts.headers, peer)).await
            }
        }
    }

    pub async fn sweep(&self) -> usize {
        self.store.sweep(self.policy.window, Instant::now()).await
    }

    fn info(&self, count: Option<WindowCount>, now: Instant) -> RateLimitInfo {
        let (hits, time_left) = match count {
            Some(count) => (count.hits, count.time_left(self.policy.window, now)),
            None => (0, self.policy.window),
        };
        let time_left = chrono::Duration::from_std(time_left).unwrap_or_else(|_| chrono::Duration::zero());
        RateLimitInfo {
            remaining: self.policy.max_requests.saturating_sub(hits),
            reset_time: Utc::now() + time_left,
            limit: self.policy.max_requests,
            window_ms: self.policy.window_ms(),
        }
    }
}

/// Client key: first `X-Forwarded-For` entry, else the socket IP, else `"unknown"`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(X_FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty());

    match (forwarded, peer) {
        (Some(first), _) => first.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Middleware enforcing `limiter` on every route of the router it wraps.
pub async fn enforce(
    State(limiter): State<FixedWindowLimiter>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if limiter.policy.skip_paths.contains(&path) {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let key = client_key(request.headers(), peer);

    match limiter.hit(&key).await {
        Decision::Allowed(info) => {
            debug!(
                "{}: {} allowed, {} remaining",
                limiter.policy.name, key, info.remaining
            );
            request.extensions_mut().insert(info.clone());
            let mut response = next.run(request).await;
            apply_headers(response.headers_mut(), &info);
            response
        }
        Decision::Limited(info) => {
            warn!("{}: {} exceeded {} requests", limiter.policy.name, key, info.limit);
            let mut response = ToolError::RateLimited {
                message: limiter.policy.message.to_string(),
                retry_after: limiter.policy.retry_after_secs(),
            }
            .into_response();
            apply_headers(response.headers_mut(), &info);
            response
        }
    }
}

fn apply_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    let reset_secs = (info.reset_time - Utc::now()).num_seconds().max(0) as u64;
    headers.insert(
        HeaderName::from_static("ratelimit-limit"),
        HeaderValue::from(info.limit),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-remaining"),
        HeaderValue::from(info.remaining),
    );
    headers.insert(
        HeaderName::from_static("ratelimit-reset"),
        HeaderValue::from(reset_secs),
    );
}
