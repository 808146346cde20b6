//! HTTP client for the text-generation API.
//!
//! All network interaction lives here: request construction, the bounded
//! retry loop with doubling backoff, and failure classification. Callers get
//! back plain text or a typed `GatewayError`; nothing above this layer
//! retries.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clock::Sleeper;
use crate::config::Anthropic;
use crate::gateway::model::{ApiErrorBody, MessagesResponse};

pub mod model;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/";
const MAX_ATTEMPTS: u32 = 5;
const INITIAL_DELAY: Duration = Duration::from_secs(1);
const MAX_DELAY: Duration = Duration::from_secs(60);
const PROBE_PROMPT: &str = "Reply with the single word OK and nothing else.";
const PROBE_TOKEN: &str = "OK";

const RETRYABLE_STATUSES: [u16; 8] = [429, 500, 502, 503, 504, 507, 509, 529];

const RETRYABLE_SUBSTRINGS: [&str; 8] = [
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "could not resolve host",
    "name or service not known",
    "temporary failure",
    "network unreachable",
];

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no API credential configured")]
    NotConfigured,
    #[error("network error after {attempts} attempt(s): {message}")]
    Network { message: String, attempts: u32 },
    #[error("HTTP {status} after {attempts} attempt(s): {message}")]
    Http {
        status: u16,
        message: String,
        attempts: u32,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Seam between the pipeline and the real client; tests script responses
/// through this trait.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

#[derive(Clone)]
pub struct AnthropicClient {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    version: String,
    max_tokens: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Per-attempt outcome, before the retry loop decides what to do with it.
enum AttemptFailure {
    Fatal(GatewayError),
    Retryable {
        err: GatewayError,
        retry_after: Option<Duration>,
    },
}

impl AnthropicClient {
    pub fn new(cfg: &Anthropic, sleeper: Arc<dyn Sleeper>) -> Self {
        let base_url = Url::parse(ANTHROPIC_API_BASE).expect("valid default API URL");
        Self::with_base_url(cfg, base_url, sleeper)
    }

    /// Constructor with an overridable base URL so tests can point the
    /// client at a mock server.
    pub fn with_base_url(cfg: &Anthropic, base_url: Url, sleeper: Arc<dyn Sleeper>) -> Self {
        let http = Client::builder()
            .user_agent("geopages/0.1")
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .no_proxy()
            .build()
            .expect("reqwest client");
        let endpoint = base_url
            .join("v1/messages")
            .expect("valid messages endpoint URL");
        Self {
            http,
            endpoint,
            api_key: cfg.resolved_api_key(),
            model: cfg.model.clone(),
            version: cfg.version.clone(),
            max_tokens: cfg.max_tokens,
            sleeper,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send one prompt through the retry loop and return the generated text.
    ///
    /// Up to five attempts total; the wait before each retry starts at 1s and
    /// doubles, capped at 60s. A `retry-after` header on a 429 overrides the
    /// computed wait (still capped) without resetting the doubling sequence.
    pub async fn send(&self, prompt: &str) -> Result<String, GatewayError> {
        let Some(api_key) = self.api_key.clone() else {
            return Err(GatewayError::NotConfigured);
        };
        let body = build_messages_body(&self.model, self.max_tokens, prompt);

        let mut delay = INITIAL_DELAY;
        let mut override_delay: Option<Duration> = None;
        let mut last_failure = GatewayError::Network {
            message: "no attempt made".into(),
            attempts: 0,
        };

        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let wait = override_delay.take().unwrap_or(delay).min(MAX_DELAY);
                info!(attempt, wait_secs = wait.as_secs(), "retrying generation request");
                self.sleeper.sleep(wait).await;
                delay = (delay * 2).min(MAX_DELAY);
            }

            match self.attempt(&api_key, &body, attempt).await {
                Ok(text) => return Ok(text),
                Err(AttemptFailure::Fatal(err)) => {
                    error!(attempt, %err, "generation request failed");
                    return Err(err);
                }
                Err(AttemptFailure::Retryable { err, retry_after }) => {
                    warn!(attempt, %err, "retryable generation failure");
                    override_delay = retry_after;
                    last_failure = err;
                }
            }
        }

        error!(%last_failure, "generation request exhausted all attempts");
        Err(last_failure)
    }

    async fn attempt(
        &self,
        api_key: &str,
        body: &Value,
        attempt: u32,
    ) -> Result<String, AttemptFailure> {
        let response = match self
            .http
            .post(self.endpoint.clone())
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.version)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let message = error_chain(&err);
                let failure = GatewayError::Network {
                    message: message.clone(),
                    attempts: attempt,
                };
                return Err(if is_retryable_message(&message) {
                    AttemptFailure::Retryable {
                        err: failure,
                        retry_after: None,
                    }
                } else {
                    AttemptFailure::Fatal(failure)
                });
            }
        };

        let status = response.status().as_u16();
        if status == 200 {
            let raw = response.text().await.map_err(|err| {
                AttemptFailure::Fatal(GatewayError::Malformed(format!(
                    "failed to read response body: {err}"
                )))
            })?;
            return extract_text(&raw).map_err(AttemptFailure::Fatal);
        }

        let retry_after = if status == 429 {
            parse_retry_after(&response)
        } else {
            None
        };
        let raw = response.text().await.unwrap_or_default();
        let message = api_error_message(&raw);

        if is_retryable_status(status) {
            return Err(AttemptFailure::Retryable {
                err: GatewayError::Http {
                    status,
                    message,
                    attempts: attempt,
                },
                retry_after,
            });
        }

        let message = match status_hint(status) {
            Some(hint) => format!("{message} ({hint})"),
            None => message,
        };
        Err(AttemptFailure::Fatal(GatewayError::Http {
            status,
            message,
            attempts: attempt,
        }))
    }

    /// One live probe through the normal `send` path; true iff the reply
    /// carries the expected acknowledgment token.
    pub async fn validate_credentials(&self) -> Result<bool, GatewayError> {
        let reply = self.send(PROBE_PROMPT).await?;
        Ok(reply.contains(PROBE_TOKEN))
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        self.send(prompt).await
    }
}

/// Wire body of a messages-API request: one user-role message.
pub fn build_messages_body(model: &str, max_tokens: u32, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": max_tokens,
        "messages": [
            { "role": "user", "content": prompt }
        ],
    })
}

fn extract_text(raw: &str) -> Result<String, GatewayError> {
    let parsed: MessagesResponse = serde_json::from_str(raw)
        .map_err(|err| GatewayError::Malformed(format!("invalid response JSON: {err}")))?;
    parsed
        .content
        .first()
        .and_then(|block| block.text.clone())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| GatewayError::Malformed("response has no content[0].text".into()))
}

fn api_error_message(raw: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(raw)
        .ok()
        .and_then(|body| body.error)
        .and_then(|detail| detail.message)
        .unwrap_or_else(|| raw.trim().to_string())
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(|secs| Duration::from_secs(secs).min(MAX_DELAY))
}

/// Full source chain of a transport error, joined for substring matching.
fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

fn is_retryable_message(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RETRYABLE_SUBSTRINGS
        .iter()
        .any(|needle| lowered.contains(needle))
}

fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Diagnostic hints for permanent client errors; they never change the
/// failure kind.
fn status_hint(status: u16) -> Option<&'static str> {
    match status {
        400 => Some("malformed request body"),
        401 => Some("invalid API credential"),
        403 => Some("credential lacks permission for this model"),
        404 => Some("unknown model or endpoint"),
        413 => Some("prompt exceeds the maximum request size"),
        422 => Some("request rejected by input validation"),
        _ => None,
    }
}
