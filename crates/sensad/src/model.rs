//! Model boundary - the language model as a black box.
//!
//! The router only sees a [`ModelReply`]: either final text or exactly one
//! capability invocation. Production uses [`crate::ollama::OllamaClient`];
//! tests use [`FakeModelClient`] with scripted replies.

use async_trait::async_trait;
use sensa_common::{CapabilityInvocationRequest, Message};
use serde::Serialize;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Model returned empty response")]
    EmptyResponse,
}

/// What the model decided for this turn
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    PlainReply(String),
    CapabilityCall(CapabilityInvocationRequest),
}

/// Capability description offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON schema of the arguments object
    pub parameters: Value,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Decide the reply for the given history
    async fn complete(&self, history: &[Message], tools: &[ToolSpec])
        -> Result<ModelReply, ModelError>;

    /// Trivial round-trip used by the liveness probe
    async fn ping(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Scripted model for tests
pub struct FakeModelClient {
    replies: Mutex<Vec<Result<ModelReply, ModelError>>>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl FakeModelClient {
    /// Replies are returned in order; the last one repeats
    pub fn new(replies: Vec<Result<ModelReply, ModelError>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn text(text: &str) -> Self {
        Self::new(vec![Ok(ModelReply::PlainReply(text.to_string()))])
    }

    pub fn call(name: &str, arguments: Value) -> Self {
        Self::new(vec![Ok(ModelReply::CapabilityCall(
            CapabilityInvocationRequest::new(name, arguments),
        ))])
    }

    pub fn failing(error: ModelError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// History passed on each call
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn next(&self) -> Result<ModelReply, ModelError> {
        let mut replies = self
            .replies
            .lock()
            .map_err(|_| ModelError::HttpError("fake model poisoned".to_string()))?;
        match replies.len() {
            0 => Err(ModelError::EmptyResponse),
            1 => replies[0].clone(),
            _ => replies.remove(0),
        }
    }
}

#[async_trait]
impl ModelClient for FakeModelClient {
    async fn complete(
        &self,
        history: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(history.to_vec());
        }
        self.next()
    }

    async fn ping(&self, _prompt: &str) -> Result<String, ModelError> {
        match self.next()? {
            ModelReply::PlainReply(text) => Ok(text),
            ModelReply::CapabilityCall(call) => Ok(call.name),
        }
    }
}
