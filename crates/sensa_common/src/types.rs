//! Core data types shared between the daemon and its tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a message in a conversation thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One entry of a conversation thread. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Capability requested (assistant) or answered (tool)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_name: Option<String>,
    /// Arguments of a capability request, kept so the call can be replayed to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Map<String, Value>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Assistant message asking for a capability invocation
    pub fn capability_request(request: &CapabilityInvocationRequest) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            capability_name: Some(request.name.clone()),
            arguments: Some(request.arguments.clone()),
        }
    }

    /// Tool message carrying a serialized CapabilityResult
    pub fn tool(capability_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            capability_name: Some(capability_name.into()),
            arguments: None,
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            capability_name: None,
            arguments: None,
        }
    }
}

/// Structured request from the model to run a named capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityInvocationRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl CapabilityInvocationRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Outcome class of a capability run or a chat reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
    Info,
}

/// Envelope every capability handler returns, even on failure.
///
/// The same shape is the reply body of `POST /api/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub status: ResultStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CapabilityResult {
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status: ResultStatus::Success,
            message: message.into(),
            data,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            message: message.into(),
            data: None,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Info,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == ResultStatus::Error
    }

    /// Serialize for storage in a tool message
    pub fn to_content(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message.clone())
    }

    /// Parse a tool message back, falling back to the raw text as a success
    pub fn from_content(content: &str) -> Self {
        serde_json::from_str(content).unwrap_or_else(|_| Self::success(content, None))
    }
}

/// Reply envelope of the inbound chat API
pub type ChatResponse = CapabilityResult;

/// Inbound chat request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: ChatContext,
}

/// Thread identifying data sent by the front-end
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Anything else the client sends is kept for logging
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One sensor record as served by the resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl SensorReading {
    /// Raw accelerometer object, if the reading carries one
    pub fn accel(&self) -> Option<&Map<String, Value>> {
        self.data.as_ref()?.get("accel")?.as_object()
    }
}

/// Three-axis accelerometer values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelVector {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelVector {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn axes(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_content_roundtrip_and_fallback() {
        let result = CapabilityResult::info("hi there");
        let parsed = CapabilityResult::from_content(&result.to_content());
        assert_eq!(parsed, result);

        let raw = CapabilityResult::from_content("not json at all");
        assert_eq!(raw.status, ResultStatus::Success);
        assert_eq!(raw.message, "not json at all");
    }

    #[test]
    fn test_invocation_request_ignores_non_object_arguments() {
        let req = CapabilityInvocationRequest::new("fallback", json!([1, 2]));
        assert!(req.arguments.is_empty());
    }

    #[test]
    fn test_chat_request_keeps_extra_context() {
        let req: ChatRequest = serde_json::from_value(json!({
            "message": "hello",
            "context": {"thread_id": "t-1", "device": "phone"}
        }))
        .unwrap();
        assert_eq!(req.context.thread_id.as_deref(), Some("t-1"));
        assert_eq!(req.context.extra["device"], "phone");
    }

    #[test]
    fn test_reading_accel_lookup() {
        let reading: SensorReading = serde_json::from_value(json!({
            "timestamp": 1700000000000i64,
            "name": "bridge-1",
            "data": {"accel": {"x": 1, "y": "2", "z": 0.5}, "temp": 20}
        }))
        .unwrap();
        let accel = reading.accel().unwrap();
        assert_eq!(accel["y"], "2");

        let bare = SensorReading::default();
        assert!(bare.accel().is_none());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::tool("fallback", "{}");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["capability_name"], "fallback");
        assert!(json.get("arguments").is_none());
    }
}
