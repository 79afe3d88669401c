//! MCP protocol types based on JSON-RPC 2.0
//!
//! These types follow the MCP specification (2024-11-05):
//! <https://spec.modelcontextprotocol.io/specification/2024-11-05/>
//!
//! Everything a peer may receive deserializes tolerantly: missing optionals
//! default, unknown fields are ignored. Round-trips of known fields are
//! exact.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jsonrpc::RequestId;

/// The MCP protocol version this crate speaks.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP notification methods
pub mod notifications {
    /// Sent by the client after receiving the initialize response
    pub const INITIALIZED: &str = "notifications/initialized";
    /// Progress updates for long-running requests
    pub const PROGRESS: &str = "notifications/progress";
    /// Log message from server to client
    pub const MESSAGE: &str = "notifications/message";
    /// Tool list has changed
    pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    /// Prompt list has changed
    pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    /// Resource list has changed
    pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
}

// =============================================================================
// Initialize
// =============================================================================

/// Implementation name and version, exchanged during the handshake
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Client capabilities declared in the initialize request.
///
/// The sub-objects are opaque to the engine; they are stored and surfaced to
/// the embedder as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    #[serde(default)]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    #[serde(default)]
    pub subscribe: bool,
    #[serde(default)]
    pub list_changed: bool,
}

/// Marker: the server emits `notifications/message`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    pub client_info: Implementation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
    pub server_info: Implementation,
    /// Optional usage hints shown to the language model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

// =============================================================================
// Tools
// =============================================================================

/// JSON Schema describing a tool's expected argument shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for ToolInputSchema {
    fn default() -> Self {
        Self {
            schema_type: object_type(),
            properties: None,
            required: Vec::new(),
        }
    }
}

impl ToolInputSchema {
    /// An object schema with the given properties and required names.
    pub fn object(properties: Value, required: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            schema_type: object_type(),
            properties: Some(properties),
            required: required.into_iter().map(String::from).collect(),
        }
    }
}

/// Tool definition as advertised by `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: ToolInputSchema,
}

impl Tool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: ToolInputSchema::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: ToolInputSchema) -> Self {
        self.input_schema = schema;
        self
    }
}

/// Request metadata carried under `_meta`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<ProgressToken>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RequestMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToolResult {
    pub content: Vec<Content>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<Tool>,
}

// =============================================================================
// Content blocks
// =============================================================================

/// Tagged content block used in tool results and prompt messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    Text {
        text: String,
    },
    Image {
        /// Base64-encoded image bytes
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        uri: String,
        #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blob: Option<String>,
    },
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Content::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Content::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn resource(uri: impl Into<String>, mime_type: Option<String>, text: Option<String>) -> Self {
        Content::Resource {
            uri: uri.into(),
            mime_type,
            text,
            blob: None,
        }
    }
}

// =============================================================================
// Prompts
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl PromptArgument {
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            description: None,
            required,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

impl Prompt {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_argument(mut self, argument: PromptArgument) -> Self {
        self.arguments.push(argument);
        self
    }
}

/// Message role in prompt messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message of a rendered prompt.
///
/// The content is emitted as an array of content blocks. Some servers send a
/// single bare block instead; deserialization accepts either shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    #[serde(deserialize_with = "one_or_many")]
    pub content: Vec<Content>,
}

impl PromptMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Content::text(text)],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: vec![Content::text(text)],
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<Content>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(serde::de::Error::custom))
            .collect(),
        other => Ok(vec![
            serde_json::from_value(other).map_err(serde::de::Error::custom)?,
        ]),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPromptParams {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetPromptResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub messages: Vec<PromptMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPromptsResult {
    #[serde(default)]
    pub prompts: Vec<Prompt>,
}

// =============================================================================
// Resources
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl Resource {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Resource content: text or a base64 blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

impl ResourceContent {
    pub fn text(uri: impl Into<String>, mime_type: Option<String>, text: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type,
            text: Some(text.into()),
            blob: None,
        }
    }

    pub fn blob(uri: impl Into<String>, mime_type: Option<String>, blob: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            mime_type,
            text: None,
            blob: Some(blob.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResourceResult {
    pub contents: Vec<ResourceContent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResourcesResult {
    #[serde(default)]
    pub resources: Vec<Resource>,
}

// =============================================================================
// Notifications
// =============================================================================

/// Progress token - opaque to the engine, echoed back verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    Number(i64),
    String(String),
}

impl ProgressToken {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ProgressToken::Number),
            Value::String(s) => Some(ProgressToken::String(s.clone())),
            _ => None,
        }
    }
}

/// Parameters of `notifications/progress`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: ProgressToken,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Parameters of `$/cancelRequest`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelParams {
    pub id: RequestId,
}

/// Log severity levels following RFC 5424 (syslog)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    #[default]
    Info,
    Debug,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Emergency => "emergency",
            LogLevel::Alert => "alert",
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        };
        f.write_str(s)
    }
}

/// Parameters of `notifications/message`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessageParams {
    pub level: LogLevel,
    pub data: Value,
}

// =============================================================================
// Sampling preferences
// =============================================================================

/// Model selection preferences, forwarded opaquely by hosts.
///
/// Sampling itself is out of scope for the engine; the type exists so peers
/// exchanging it round-trip cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn round_trip<T>(value: &T) -> T
    where
        T: Serialize + serde::de::DeserializeOwned,
    {
        serde_json::from_value(serde_json::to_value(value).unwrap()).unwrap()
    }

    #[test]
    fn test_implementation_round_trip() {
        let imp = Implementation::new("server", "1.2.3");
        assert_eq!(round_trip(&imp), imp);
    }

    #[test]
    fn test_tool_wire_shape() {
        let tool = Tool::new("add")
            .with_description("Add two numbers")
            .with_input_schema(ToolInputSchema::object(
                json!({"a": {"type": "number"}, "b": {"type": "number"}}),
                ["a", "b"],
            ));

        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["name"], "add");
        assert_eq!(json["inputSchema"]["type"], "object");
        assert_eq!(json["inputSchema"]["required"][0], "a");
        assert_eq!(round_trip(&tool), tool);
    }

    #[test]
    fn test_tool_tolerates_unknown_fields() {
        let tool: Tool = serde_json::from_value(json!({
            "name": "x",
            "inputSchema": {"type": "object"},
            "annotations": {"readOnlyHint": true}
        }))
        .unwrap();
        assert_eq!(tool.name, "x");
        assert!(tool.description.is_none());
    }

    #[test]
    fn test_content_tagged_shapes() {
        let text = serde_json::to_value(Content::text("hi")).unwrap();
        assert_eq!(text, json!({"type": "text", "text": "hi"}));

        let image = serde_json::to_value(Content::image("QUJD", "image/png")).unwrap();
        assert_eq!(image["type"], "image");
        assert_eq!(image["mimeType"], "image/png");

        let resource = serde_json::to_value(Content::resource(
            "file://a.txt",
            Some("text/plain".into()),
            Some("body".into()),
        ))
        .unwrap();
        assert_eq!(resource["type"], "resource");
        assert_eq!(resource["uri"], "file://a.txt");
        assert!(resource.get("blob").is_none());
    }

    #[test]
    fn test_content_round_trip() {
        for content in [
            Content::text("t"),
            Content::image("ZGF0YQ==", "image/jpeg"),
            Content::resource("u", None, Some("x".into())),
        ] {
            assert_eq!(round_trip(&content), content);
        }
    }

    #[test]
    fn test_prompt_message_content_array() {
        let msg = PromptMessage {
            role: Role::Assistant,
            content: vec![Content::text("a"), Content::text("b")],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json["content"].is_array());
        assert_eq!(round_trip(&msg), msg);
    }

    #[test]
    fn test_prompt_message_accepts_single_content_object() {
        let msg: PromptMessage = serde_json::from_value(json!({
            "role": "user",
            "content": {"type": "text", "text": "hello"}
        }))
        .unwrap();
        assert_eq!(msg.content, vec![Content::text("hello")]);
    }

    #[test]
    fn test_prompt_round_trip() {
        let prompt = Prompt::new("review")
            .with_description("Review some code")
            .with_argument(PromptArgument::new("language", true).with_description("Language"))
            .with_argument(PromptArgument::new("style", false));
        assert_eq!(round_trip(&prompt), prompt);

        // empty argument list is omitted on the wire
        let bare = Prompt::new("bare");
        let json = serde_json::to_value(&bare).unwrap();
        assert!(json.get("arguments").is_none());
    }

    #[test]
    fn test_resource_wire_shape() {
        let resource = Resource::new("file://logs/app.log", "app.log")
            .with_description("Application log")
            .with_mime_type("text/plain");
        let json = serde_json::to_value(&resource).unwrap();
        assert_eq!(json["mimeType"], "text/plain");
        assert_eq!(round_trip(&resource), resource);
    }

    #[test]
    fn test_resource_content_round_trip() {
        let text = ResourceContent::text("u", Some("text/plain".into()), "hello");
        assert_eq!(round_trip(&text), text);
        let blob = ResourceContent::blob("u", Some("image/png".into()), "QUJD");
        assert_eq!(round_trip(&blob), blob);
        let json = serde_json::to_value(&blob).unwrap();
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_server_capabilities_wire_shape() {
        let caps = ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: true }),
            resources: Some(ResourcesCapability {
                subscribe: true,
                list_changed: false,
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&caps).unwrap();
        assert_eq!(json["tools"]["listChanged"], true);
        assert_eq!(json["resources"]["subscribe"], true);
        assert!(json.get("prompts").is_none());
        assert_eq!(round_trip(&caps), caps);
    }

    #[test]
    fn test_client_capabilities_tolerant() {
        let caps: ClientCapabilities = serde_json::from_value(json!({
            "sampling": {},
            "somethingNew": {"x": 1}
        }))
        .unwrap();
        assert!(caps.sampling.is_some());
        assert!(caps.roots.is_none());
    }

    #[test]
    fn test_initialize_result_round_trip() {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities::default(),
            server_info: Implementation::new("s", "1"),
            instructions: Some("be nice".into()),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["protocolVersion"], "2024-11-05");
        assert_eq!(json["serverInfo"]["name"], "s");
        let back: InitializeResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.instructions.as_deref(), Some("be nice"));
    }

    #[test]
    fn test_progress_params_wire_shape() {
        let params = ProgressParams {
            progress_token: ProgressToken::Number(42),
            progress: 3.0,
            total: Some(10.0),
        };
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["progressToken"], 42);
        assert_eq!(json["progress"], 3.0);
        assert_eq!(round_trip(&params), params);

        let string_token = ProgressParams {
            progress_token: ProgressToken::String("tok".into()),
            progress: 1.0,
            total: None,
        };
        let json = serde_json::to_value(&string_token).unwrap();
        assert_eq!(json["progressToken"], "tok");
        assert!(json.get("total").is_none());
    }

    #[test]
    fn test_log_level_serialization() {
        assert_eq!(serde_json::to_string(&LogLevel::Warning).unwrap(), "\"warning\"");
        assert_eq!(serde_json::to_string(&LogLevel::Debug).unwrap(), "\"debug\"");
        assert!(LogLevel::Error < LogLevel::Info);
    }

    #[test]
    fn test_model_preferences_round_trip() {
        let prefs = ModelPreferences {
            hints: vec!["claude".into()],
            cost_priority: Some(0.2),
            speed_priority: None,
            intelligence_priority: Some(0.9),
        };
        let json = serde_json::to_value(&prefs).unwrap();
        assert_eq!(json["costPriority"], 0.2);
        assert!(json.get("speedPriority").is_none());
        assert_eq!(round_trip(&prefs), prefs);
    }

    #[test]
    fn test_call_tool_params_meta() {
        let params: CallToolParams = serde_json::from_value(json!({
            "name": "add",
            "arguments": {"a": 1},
            "_meta": {"progressToken": "p1"}
        }))
        .unwrap();
        assert_eq!(
            params.meta.unwrap().progress_token,
            Some(ProgressToken::String("p1".into()))
        );
    }

    #[test]
    fn test_cancel_params() {
        let params: CancelParams = serde_json::from_value(json!({"id": 7})).unwrap();
        assert_eq!(params.id, RequestId::Number(7));
        let params: CancelParams = serde_json::from_value(json!({"id": "r-1"})).unwrap();
        assert_eq!(params.id, RequestId::String("r-1".into()));
    }
}
