//! Language-model backed agents over an OpenAI-compatible chat API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use protea_core::config::LlmConfig;

use crate::agent::{ConversationResponder, InputClassifier};
use crate::error::AgentError;
use crate::format::remove_control_characters;
use crate::types::{Classification, ConversationTurn};

const CLASSIFIER_PROMPT: &str = "You route messages for a protein database assistant. \
Reply with exactly one word: \"query\" if the message asks for data that is stored about \
proteins (entries, lengths, sequences, organisms, Pfam or SMART domains, amino acid \
composition, hydrophobicity, secondary structure, dates first or last seen), or \
\"conversation\" for anything else.";

const ASSISTANT_PROMPT: &str = "You are a helpful assistant for a protein research dashboard. \
Answer conversationally and concisely. When the user wants stored protein data, suggest a \
question they could ask about entries, lengths, sequences, organisms, domains, composition, \
hydrophobicity or secondary structure.";

/// Largest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// A single chat-completion round trip.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String, AgentError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for `POST {base_url}/chat/completions`.
pub struct OpenAiClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    timeout_ms: u64,
}

impl OpenAiClient {
    /// Build a client from config and an API key.
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, AgentError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    async fn complete(&self, messages: &[ConversationTurn]) -> Result<String, AgentError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AgentError::Timeout(self.timeout_ms)
                } else {
                    AgentError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AgentError::RateLimited);
        }
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(AgentError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::MalformedOutput(format!("Invalid completion body: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(AgentError::MalformedOutput("empty completion".to_string()));
        }

        tracing::debug!(model = %self.model, chars = content.len(), "Completion received");
        Ok(content)
    }
}

/// Classifier that asks the model for a one-word verdict.
pub struct LlmClassifier {
    llm: Arc<dyn ChatCompletion>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm }
    }
}

/// Map a model verdict to a classification.
pub fn parse_classification(reply: &str) -> Result<Classification, AgentError> {
    let cleaned = remove_control_characters(reply);
    let verdict = cleaned
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    match verdict.as_str() {
        "query" => Ok(Classification::Query),
        "conversation" => Ok(Classification::Conversation),
        _ => Err(AgentError::MalformedOutput(format!(
            "unexpected classification '{}'",
            cleaned.trim()
        ))),
    }
}

#[async_trait]
impl InputClassifier for LlmClassifier {
    async fn classify(&self, utterance: &str) -> Result<Classification, AgentError> {
        let messages = [
            ConversationTurn::system(CLASSIFIER_PROMPT),
            ConversationTurn::user(utterance),
        ];
        let reply = self.llm.complete(&messages).await?;
        parse_classification(&reply)
    }
}

/// Conversation responder that forwards the running context to the model.
pub struct LlmResponder {
    llm: Arc<dyn ChatCompletion>,
}

impl LlmResponder {
    pub fn new(llm: Arc<dyn ChatCompletion>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ConversationResponder for LlmResponder {
    async fn respond(&self, context: &[ConversationTurn]) -> Result<String, AgentError> {
        let mut messages = Vec::with_capacity(context.len() + 1);
        messages.push(ConversationTurn::system(ASSISTANT_PROMPT));
        messages.extend_from_slice(context);

        let reply = self.llm.complete(&messages).await?;
        Ok(remove_control_characters(&reply).trim().to_string())
    }
}
