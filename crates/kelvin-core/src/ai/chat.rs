use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::state::ChatMessage;

pub const DEFAULT_ENDPOINT: &str = "https://kcb-sitn.onrender.com/api/chat";
pub const DEFAULT_MODEL: &str = "llama3-8b-8192";

/// Why a send produced no assistant message. The display text is what the
/// user sees in the error banner.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Error connecting to backend.")]
    Connection(#[source] reqwest::Error),
    #[error("No response from assistant.")]
    NoResponse { detail: String },
}

impl TransportError {
    fn no_response(detail: impl Into<String>) -> Self {
        Self::NoResponse {
            detail: detail.into(),
        }
    }
}

/// One request/response round trip carrying the whole conversation.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, conversation: &[ChatMessage]) -> Result<ChatMessage, TransportError>;
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl ChatClient {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self::with_client(Client::new(), endpoint, model)
    }

    pub fn with_client(client: Client, endpoint: &str, model: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            model: model.to_string(),
        }
    }

    fn request<'a>(&'a self, conversation: &'a [ChatMessage]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages: conversation
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        }
    }

    /// The JSON body a send would post. Only role and content leave the client.
    pub fn request_body(&self, conversation: &[ChatMessage]) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self.request(conversation))
    }
}

#[async_trait]
impl ChatTransport for ChatClient {
    async fn send(&self, conversation: &[ChatMessage]) -> Result<ChatMessage, TransportError> {
        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            messages = conversation.len(),
            "sending chat request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&self.request(conversation))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "chat request failed");
                TransportError::Connection(e)
            })?;

        // Any status without usable choices is reported as no response
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            warn!(error = %e, "failed reading chat response");
            TransportError::Connection(e)
        })?;

        let content = parse_completion(&body).map_err(|e| {
            warn!(%status, error = ?e, "unusable chat response");
            e
        })?;
        debug!(%status, chars = content.chars().count(), "chat reply received");
        Ok(ChatMessage::assistant(content))
    }
}

/// Pull `choices[0].message.content` out of a response body.
pub fn parse_completion(body: &str) -> Result<String, TransportError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| TransportError::no_response(format!("invalid JSON: {}", e)))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .filter(|content| !content.is_empty())
        .ok_or_else(|| TransportError::no_response("missing choices[0].message.content"))
}
