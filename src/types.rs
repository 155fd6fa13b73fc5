//! Conversation and request types shared by the relay and the session adapter.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PlaygroundError, Result};

/// Default sampling temperature when a request omits it.
pub const DEFAULT_TEMPERATURE: f64 = 1.0;

/// Default completion token cap when a request omits it.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Default search location preference.
pub const DEFAULT_LOCATION: &str = "global";

/// Search locations the playground offers.
pub const LOCATIONS: [&str; 7] = [
    "global",
    "mumbai",
    "london",
    "korea",
    "tokyo",
    "newyork",
    "singapore",
];

/// Fields owned by the relay. Pass-through options may not override them.
const RESERVED_FIELDS: [&str; 5] = ["model", "messages", "temperature", "max_tokens", "stream"];

// ============================================================================
// Messages
// ============================================================================

/// The role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ============================================================================
// Generation parameters
// ============================================================================

/// Upstream-specific options carried in `extra_body`.
///
/// The known keys are typed; anything else lands in `other` and is merged
/// back into the same JSON object on serialization, so unknown options
/// survive a round trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraOptions {
    /// Let the model consult web search before answering.
    #[serde(default)]
    pub online_search: bool,

    /// Geographic bias for search results (e.g. "mumbai", "london").
    #[serde(default = "default_location")]
    pub location: String,

    /// Free-text tone / system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,

    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

impl Default for ExtraOptions {
    fn default() -> Self {
        Self {
            online_search: false,
            location: default_location(),
            tone: None,
            other: BTreeMap::new(),
        }
    }
}

impl ExtraOptions {
    /// Attach an option the relay does not know about.
    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.other.insert(key.into(), value);
        self
    }

    /// Merge typed and untyped keys into one JSON object.
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // A struct with only string keys always serializes to an object.
            _ => Map::new(),
        }
    }
}

/// Tunable generation controls, snapshotted per request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParameters {
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
    pub extra: ExtraOptions,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: true,
            extra: ExtraOptions::default(),
        }
    }
}

impl GenerationParameters {
    /// Build the relay request body for a conversation.
    pub fn to_request(&self, messages: Vec<Message>) -> RelayRequest {
        RelayRequest {
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
            extra_body: self.extra.to_map(),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

/// Body accepted by the relay endpoint (`POST /api/chat`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_stream")]
    pub stream: bool,

    #[serde(default)]
    pub extra_body: Map<String, Value>,
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_stream() -> bool {
    true
}

impl RelayRequest {
    /// Parse and validate a raw request body.
    ///
    /// Any body that does not carry a non-empty `messages` array is a
    /// client error. Parameter ranges are left to the upstream.
    pub fn parse(body: &[u8]) -> Result<Self> {
        let request: Self = serde_json::from_slice(body).map_err(|e| {
            tracing::debug!(error = %e, "Rejected relay request body");
            PlaygroundError::ClientInput("Invalid or missing messages".to_string())
        })?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.messages.is_empty() {
            return Err(PlaygroundError::ClientInput(
                "Invalid or missing messages".to_string(),
            ));
        }
        Ok(())
    }

    /// Flatten into the upstream chat-completions body for `model`.
    pub fn into_upstream(self, model: &str) -> UpstreamRequest {
        let mut extra_body = self.extra_body;
        for field in RESERVED_FIELDS {
            if extra_body.remove(field).is_some() {
                tracing::warn!(field, "Dropped reserved field from extra_body");
            }
        }

        UpstreamRequest {
            model: model.to_string(),
            messages: self.messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: self.stream,
            extra_body,
        }
    }
}

/// OpenAI-compatible chat-completions request sent upstream.
///
/// `extra_body` keys are merged into the top-level object, matching the
/// OpenAI SDKs' `extra_body` behavior.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
    #[serde(flatten)]
    pub extra_body: Map<String, Value>,
}

/// One incremental unit of a streamed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    /// A fragment of assistant text, in arrival order.
    Delta(String),
    /// End of the reply. Nothing follows it.
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_value(Role::Assistant).unwrap(), json!("assistant"));
        let role: Role = serde_json::from_value(json!("system")).unwrap();
        assert_eq!(role, Role::System);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn test_relay_request_defaults() {
        let request = RelayRequest::parse(br#"{"messages":[{"role":"user","content":"hello"}]}"#)
            .unwrap();
        assert_eq!(request.messages, vec![Message::user("hello")]);
        assert_eq!(request.temperature, 1.0);
        assert_eq!(request.max_tokens, 1024);
        assert!(request.stream);
        assert!(request.extra_body.is_empty());
    }

    #[test]
    fn test_relay_request_rejects_empty_messages() {
        let err = RelayRequest::parse(br#"{"messages":[]}"#).unwrap_err();
        assert!(matches!(err, PlaygroundError::ClientInput(_)));
    }

    #[test]
    fn test_relay_request_rejects_missing_or_malformed_messages() {
        assert!(matches!(
            RelayRequest::parse(br#"{"temperature":0.5}"#),
            Err(PlaygroundError::ClientInput(_))
        ));
        assert!(matches!(
            RelayRequest::parse(br#"{"messages":"hello"}"#),
            Err(PlaygroundError::ClientInput(_))
        ));
        assert!(matches!(
            RelayRequest::parse(b"not json"),
            Err(PlaygroundError::ClientInput(_))
        ));
    }

    #[test]
    fn test_parameter_ranges_are_not_checked() {
        let request = RelayRequest::parse(
            br#"{"messages":[{"role":"user","content":"hi"}],"temperature":9.5,"max_tokens":999999}"#,
        )
        .unwrap();
        assert_eq!(request.temperature, 9.5);
        assert_eq!(request.max_tokens, 999_999);
    }

    #[test]
    fn test_upstream_request_shape() {
        let request = RelayRequest::parse(br#"{"messages":[{"role":"user","content":"hello"}]}"#)
            .unwrap();
        let upstream = serde_json::to_value(request.into_upstream("sutra-v2")).unwrap();
        assert_eq!(
            upstream,
            json!({
                "model": "sutra-v2",
                "messages": [{"role": "user", "content": "hello"}],
                "temperature": 1.0,
                "max_tokens": 1024,
                "stream": true,
            })
        );
    }

    #[test]
    fn test_upstream_request_omits_stream_when_false() {
        let mut request = RelayRequest::parse(br#"{"messages":[{"role":"user","content":"x"}]}"#)
            .unwrap();
        request.stream = false;
        let upstream = serde_json::to_value(request.into_upstream("m")).unwrap();
        assert!(upstream.get("stream").is_none());
    }

    #[test]
    fn test_extra_body_is_merged_top_level() {
        let request = RelayRequest::parse(
            br#"{
                "messages":[{"role":"user","content":"weather?"}],
                "extra_body":{"online_search":true,"location":"mumbai","custom":{"a":1}}
            }"#,
        )
        .unwrap();
        let upstream = serde_json::to_value(request.into_upstream("sutra-v2")).unwrap();
        assert_eq!(upstream["online_search"], json!(true));
        assert_eq!(upstream["location"], json!("mumbai"));
        assert_eq!(upstream["custom"], json!({"a": 1}));
    }

    #[test]
    fn test_extra_body_cannot_override_reserved_fields() {
        let request = RelayRequest::parse(
            br#"{
                "messages":[{"role":"user","content":"hi"}],
                "extra_body":{"model":"other","max_tokens":1,"tone":"formal"}
            }"#,
        )
        .unwrap();
        let upstream = request.into_upstream("sutra-v2");
        assert_eq!(upstream.model, "sutra-v2");
        assert_eq!(upstream.max_tokens, 1024);
        assert_eq!(upstream.extra_body.len(), 1);
        assert_eq!(upstream.extra_body["tone"], json!("formal"));
    }

    #[test]
    fn test_extra_options_keep_unknown_keys() {
        let options = ExtraOptions {
            online_search: true,
            location: "tokyo".to_string(),
            tone: Some("be brief".to_string()),
            other: BTreeMap::new(),
        }
        .with_option("safe_mode", json!(false));

        let map = options.to_map();
        assert_eq!(map["online_search"], json!(true));
        assert_eq!(map["location"], json!("tokyo"));
        assert_eq!(map["tone"], json!("be brief"));
        assert_eq!(map["safe_mode"], json!(false));

        let parsed: ExtraOptions = serde_json::from_value(Value::Object(map)).unwrap();
        assert_eq!(parsed, options);
    }

    #[test]
    fn test_extra_options_default_omits_tone() {
        let map = ExtraOptions::default().to_map();
        assert_eq!(map["online_search"], json!(false));
        assert_eq!(map["location"], json!("global"));
        assert!(!map.contains_key("tone"));
    }

    #[test]
    fn test_generation_parameters_to_request() {
        let params = GenerationParameters {
            temperature: 0.3,
            max_tokens: 256,
            stream: false,
            extra: ExtraOptions::default(),
        };
        let request = params.to_request(vec![Message::system("s"), Message::user("u")]);
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 256);
        assert!(!request.stream);
        assert_eq!(request.extra_body["location"], json!("global"));
    }
}
