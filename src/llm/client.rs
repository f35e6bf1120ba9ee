use crate::config::LlmConfig;
use crate::llm::response::{chat_content, parse_chat_response, truncate_to_budget};
use crate::llm::{Enrichment, LlmError};
use crate::retry::{Attempt, BackoffPolicy};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};

/// Message sent by `ping`
const PING_PROMPT: &str = "This is a test request.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

/// Result of a reachability check
#[derive(Debug, Clone)]
pub struct PingReport {
    pub endpoint: String,
    pub latency: Duration,
    /// Reply text, when the endpoint returned a readable completion
    pub reply: Option<String>,
}

/// Client for a chat-completion endpoint
pub struct LlmClient {
    http: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    max_input_tokens: usize,
    temperature: f32,
    prompt_template: String,
    system_prompt: String,
    timeout: Duration,
    backoff: BackoffPolicy,
}

impl LlmClient {
    /// Builds a client from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The `[llm]` section
    /// * `user_agent` - Value of the `User-Agent` header
    pub fn new(config: &LlmConfig, user_agent: &str) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            max_tokens: config.max_tokens,
            max_input_tokens: config.max_input_tokens,
            temperature: config.temperature,
            prompt_template: config.prompt_template.clone(),
            system_prompt: config.system_prompt.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            backoff: BackoffPolicy::new(1, Duration::from_secs(2)),
        })
    }

    /// Overrides the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the retry policy
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Asks the endpoint for a summary and tags of `text`
    ///
    /// Input longer than the configured budget is cut from the end. A
    /// connection failure or timeout is retried once; an HTTP error status is
    /// not retried.
    pub async fn summarize(&self, text: &str) -> Result<Enrichment, LlmError> {
        let budgeted = truncate_to_budget(text, self.max_input_tokens);
        if budgeted.len() < text.len() {
            tracing::debug!(
                "Truncated LLM input from {} to {} bytes",
                text.len(),
                budgeted.len()
            );
        }

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("{}\n\n{}", self.prompt_template, budgeted),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!("Sending request to LLM endpoint: {}", self.endpoint);
        let body = self.backoff.run(|_| self.post_once(&request)).await?;
        parse_chat_response(&body)
    }

    /// Minimal round trip reporting reachability and latency
    pub async fn ping(&self) -> Result<PingReport, LlmError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "system",
                content: PING_PROMPT.to_string(),
            }],
            max_tokens: self.max_tokens.min(16),
            temperature: self.temperature,
        };

        let started = Instant::now();
        let body = self.post_once(&request).await.into_result()?;
        let latency = started.elapsed();

        Ok(PingReport {
            endpoint: self.endpoint.clone(),
            latency,
            reply: chat_content(&body).ok(),
        })
    }

    async fn post_once(&self, request: &ChatRequest<'_>) -> Attempt<String, LlmError> {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return self.transport_failure(e),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Attempt::Fatal(LlmError::Status {
                endpoint: self.endpoint.clone(),
                code: status.as_u16(),
                body,
            });
        }

        match response.text().await {
            Ok(body) => Attempt::Ok(body),
            Err(e) => self.transport_failure(e),
        }
    }

    fn transport_failure(&self, err: reqwest::Error) -> Attempt<String, LlmError> {
        let endpoint = self.endpoint.clone();
        if err.is_timeout() {
            Attempt::Retryable(LlmError::Timeout { endpoint })
        } else if err.is_connect() || err.is_body() || err.is_request() {
            Attempt::Retryable(LlmError::Connection {
                endpoint,
                message: err.to_string(),
            })
        } else {
            Attempt::Fatal(LlmError::Connection {
                endpoint,
                message: err.to_string(),
            })
        }
    }
}
