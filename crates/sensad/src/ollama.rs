//! Ollama chat client with tool calling.
//!
//! Sends the whole thread to `/api/chat` together with the capability tool
//! definitions and maps the response onto a [`ModelReply`].

use crate::config::LlmConfig;
use crate::model::{ModelClient, ModelError, ModelReply, ToolSpec};
use async_trait::async_trait;
use sensa_common::{CapabilityInvocationRequest, Message, Role};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub struct OllamaClient {
    http_client: reqwest::Client,
    config: LlmConfig,
}

impl OllamaClient {
    pub fn new(config: LlmConfig) -> Result<Self, ModelError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::HttpError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.endpoint.trim_end_matches('/'))
    }

    /// Build the `/api/chat` request body
    pub fn build_request(&self, history: &[Message], tools: &[ToolSpec]) -> Value {
        let messages: Vec<Value> = history.iter().map(to_wire_message).collect();
        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "keep_alive": self.config.keep_alive,
            "options": {
                "temperature": self.config.temperature,
                "num_ctx": self.config.num_ctx,
            },
        });

        if !tools.is_empty() {
            let tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    async fn post_chat(&self, body: &Value) -> Result<Value, ModelError> {
        let response = self
            .http_client
            .post(self.chat_url())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.config.timeout_secs)
                } else {
                    ModelError::HttpError(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(ModelError::HttpError(format!(
                "HTTP {} from Ollama",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ModelError::InvalidJson(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn complete(
        &self,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply, ModelError> {
        let body = self.build_request(history, tools);
        debug!("[LLM] Sending {} messages to {}", history.len(), self.config.model);
        let response = self.post_chat(&body).await?;
        parse_chat_response(&response)
    }

    async fn ping(&self, prompt: &str) -> Result<String, ModelError> {
        let body = self.build_request(&[Message::user(prompt)], &[]);
        let response = self.post_chat(&body).await?;
        match parse_chat_response(&response)? {
            ModelReply::PlainReply(text) => Ok(text),
            ModelReply::CapabilityCall(call) => Ok(format!("(tool call: {})", call.name)),
        }
    }
}

fn to_wire_message(message: &Message) -> Value {
    let mut wire = json!({
        "role": message.role.as_str(),
        "content": message.content,
    });

    match message.role {
        Role::Assistant => {
            if let Some(name) = &message.capability_name {
                let arguments = message.arguments.clone().unwrap_or_default();
                wire["tool_calls"] = json!([{
                    "function": { "name": name, "arguments": arguments }
                }]);
            }
        }
        Role::Tool => {
            if let Some(name) = &message.capability_name {
                wire["tool_name"] = json!(name);
            }
        }
        Role::System | Role::User => {}
    }
    wire
}

/// Map an Ollama chat response onto a reply. Only the first tool call is used.
pub fn parse_chat_response(response: &Value) -> Result<ModelReply, ModelError> {
    let message = response
        .get("message")
        .ok_or_else(|| ModelError::InvalidJson("missing 'message'".to_string()))?;

    let calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if calls.len() > 1 {
        warn!("[LLM] Model requested {} tool calls, using the first", calls.len());
    }

    if let Some(call) = calls.first() {
        let function = call.get("function").unwrap_or(call);
        let name = function
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim();
        if !name.is_empty() {
            let arguments = match function.get("arguments") {
                // Some models send arguments as a JSON string
                Some(Value::String(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
                Some(other) => other.clone(),
                None => Value::Null,
            };
            return Ok(ModelReply::CapabilityCall(CapabilityInvocationRequest::new(
                name, arguments,
            )));
        }
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(ModelReply::PlainReply(content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_reply() {
        let response = json!({"message": {"role": "assistant", "content": "Hello there"}});
        assert_eq!(
            parse_chat_response(&response).unwrap(),
            ModelReply::PlainReply("Hello there".to_string())
        );
    }

    #[test]
    fn test_parse_tool_call_with_object_and_string_arguments() {
        let response = json!({"message": {"role": "assistant", "content": "", "tool_calls": [
            {"function": {"name": "fetchIoTSensorData", "arguments": {"address": "0xabc"}}}
        ]}});
        match parse_chat_response(&response).unwrap() {
            ModelReply::CapabilityCall(call) => {
                assert_eq!(call.name, "fetchIoTSensorData");
                assert_eq!(call.arguments["address"], "0xabc");
            }
            other => panic!("unexpected reply {:?}", other),
        }

        let response = json!({"message": {"content": "", "tool_calls": [
            {"function": {"name": "fallback", "arguments": "{}"}}
        ]}});
        assert!(matches!(
            parse_chat_response(&response).unwrap(),
            ModelReply::CapabilityCall(ref c) if c.name == "fallback" && c.arguments.is_empty()
        ));
    }

    #[test]
    fn test_empty_tool_name_falls_back_to_text() {
        let response = json!({"message": {"content": "just text", "tool_calls": [
            {"function": {"name": "  ", "arguments": {}}}
        ]}});
        assert_eq!(
            parse_chat_response(&response).unwrap(),
            ModelReply::PlainReply("just text".to_string())
        );
    }

    #[test]
    fn test_empty_response_is_error() {
        let response = json!({"message": {"content": "  "}});
        assert_eq!(parse_chat_response(&response), Err(ModelError::EmptyResponse));
        assert!(matches!(
            parse_chat_response(&json!({})),
            Err(ModelError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_request_replays_capability_calls() {
        let client = OllamaClient::new(LlmConfig::default()).unwrap();
        let request = CapabilityInvocationRequest::new("fetchIoTSensorData", json!({"address": "0x1"}));
        let history = vec![
            Message::user("latest for 0x1"),
            Message::capability_request(&request),
            Message::tool("fetchIoTSensorData", "{\"status\":\"success\",\"message\":\"ok\"}"),
        ];
        let tools = vec![ToolSpec {
            name: "fallback",
            description: "greeting",
            parameters: json!({"type": "object", "properties": {}}),
        }];

        let body = client.build_request(&history, &tools);
        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_ctx"], 25600);
        assert_eq!(
            body["messages"][1]["tool_calls"][0]["function"]["arguments"]["address"],
            "0x1"
        );
        assert_eq!(body["messages"][2]["role"], "tool");
        assert_eq!(body["messages"][2]["tool_name"], "fetchIoTSensorData");
        assert_eq!(body["tools"][0]["function"]["name"], "fallback");
    }
}
