/// JSON-RPC 2.0 and MCP Wire Types
///
/// Typed envelopes for everything the server reads or writes. Responses carry
/// their result or error as a single tagged [`Outcome`], so a response with
/// both (or neither) cannot be built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version string carried by every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision announced in the initialize push.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Standard JSON-RPC error codes used by this server.
pub mod codes {
    /// Frame is not valid JSON or not a JSON object
    pub const PARSE_ERROR: i32 = -32700;
    /// No handler for the requested method
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Bad params; used for an unknown tool name in `tools/call`
    pub const INVALID_PARAMS: i32 = -32602;
}

/// Request correlation id.
///
/// `Null` is used when the inbound id is `null`, has an unusable type, or could
/// not be read at all (parse failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(serde_json::Number),
    String(String),
    Null,
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// Inbound frame could not be read as a JSON-RPC envelope.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("envelope is not a JSON object")]
    NotAnObject,
}

/// Parsed inbound envelope. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// MCP method name (e.g., "tools/list", "tools/call")
    pub method: String,
    /// Method-specific parameters; `None` when absent or `null`
    pub params: Option<Value>,
    /// `None` when the envelope has no `id` member, i.e. a notification.
    pub id: Option<RequestId>,
}

impl Request {
    /// Parse a text frame.
    ///
    /// Only malformed JSON and non-object frames are parse errors. A missing or
    /// non-string `method` parses as the empty method name, which the
    /// dispatcher then reports as not found.
    pub fn parse(frame: &str) -> Result<Self, ParseError> {
        let value: Value = serde_json::from_str(frame)?;
        let Value::Object(mut envelope) = value else {
            return Err(ParseError::NotAnObject);
        };

        let method = match envelope.remove("method") {
            Some(Value::String(method)) => method,
            _ => String::new(),
        };
        let params = envelope.remove("params").filter(|p| !p.is_null());
        let id = envelope
            .remove("id")
            .map(|raw| serde_json::from_value(raw).unwrap_or(RequestId::Null));

        Ok(Request { method, params, id })
    }

    /// True when the sender expects no reply.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// String member of `params`, if present.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.as_ref()?.get(key)?.as_str()
    }

    /// Object member of `params`, or an empty map.
    pub fn param_object(&self, key: &str) -> Map<String, Value> {
        self.params
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorObject {
    /// JSON-RPC error code, see [`codes`]
    pub code: i32,
    /// Human-readable error message
    pub message: String,
}

impl ErrorObject {
    pub fn parse_error() -> Self {
        Self {
            code: codes::PARSE_ERROR,
            message: "Parse error".to_string(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: codes::METHOD_NOT_FOUND,
            message: format!("Method not found: {}", method),
        }
    }

    pub fn unknown_tool(name: &str) -> Self {
        Self {
            code: codes::INVALID_PARAMS,
            message: format!("Unknown tool: {}", name),
        }
    }
}

/// Exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(ResultPayload),
    Error(ErrorObject),
}

/// Method-specific success payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ResultPayload {
    Tools(ToolsList),
    Resources(ResourcesList),
    ToolCall(ToolCallResult),
    ResourceRead(ResourceReadResult),
}

/// Outbound response envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    /// JSON-RPC version identifier, always "2.0"
    jsonrpc: &'static str,
    /// Id of the request being answered
    pub id: RequestId,
    /// Serialized as a sibling `result` or `error` member
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Response {
    /// Successful reply carrying `payload` as `result`.
    pub fn success(id: RequestId, payload: ResultPayload) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Result(payload),
        }
    }

    /// Failed reply carrying `error`.
    pub fn error(id: RequestId, error: ErrorObject) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            outcome: Outcome::Error(error),
        }
    }
}

/// Server-initiated message without an id.
#[derive(Debug, Clone, Serialize)]
pub struct Notification<P> {
    /// JSON-RPC version identifier, always "2.0"
    jsonrpc: &'static str,
    /// Notification method name
    pub method: &'static str,
    /// Method-specific parameters
    pub params: P,
}

impl<P> Notification<P> {
    pub fn new(method: &'static str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Server identity reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name (e.g., "CoreMind MCP Server")
    pub name: String,
    /// Server version string
    pub version: String,
}

/// Capability group marker; serializes as `{}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CapabilityGroup {}

/// Capability groups announced in the initialize push.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ServerCapabilities {
    pub tools: CapabilityGroup,
    pub resources: CapabilityGroup,
}

/// Params of the `initialize` push sent on every new connection.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: &'static str,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

impl InitializeParams {
    pub fn new(server_info: ServerInfo) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            capabilities: ServerCapabilities::default(),
            server_info,
        }
    }
}

/// Serialized `initialize` notification frame.
pub fn initialize_frame(server_info: &ServerInfo) -> serde_json::Result<String> {
    serde_json::to_string(&Notification::new(
        "initialize",
        InitializeParams::new(server_info.clone()),
    ))
}

/// One property in a tool's input schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySchema {
    /// JSON type name (e.g., "string", "integer")
    #[serde(rename = "type")]
    pub kind: String,
    /// What the argument means to the tool
    pub description: String,
}

/// JSON-Schema-like description of a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputSchema {
    #[serde(rename = "type")]
    kind: &'static str,
    /// Argument name to schema, kept sorted for a stable listing
    pub properties: BTreeMap<String, PropertySchema>,
    /// Names of mandatory arguments; omitted when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl InputSchema {
    /// Object schema with no properties.
    pub fn empty() -> Self {
        Self {
            kind: "object",
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }

    /// Add one argument to the schema.
    ///
    /// # Arguments
    /// * `name` - Argument key in the call's `arguments` object
    /// * `kind` - JSON type name
    /// * `description` - Text shown to the client
    /// * `required` - Whether the argument is listed in `required`
    pub fn property(mut self, name: &str, kind: &str, description: &str, required: bool) -> Self {
        self.properties.insert(
            name.to_string(),
            PropertySchema {
                kind: kind.to_string(),
                description: description.to_string(),
            },
        );
        if required {
            self.required.push(name.to_string());
        }
        self
    }
}

/// MCP tool definition, as listed by `tools/list`.
///
/// Each tool has a unique name, a description and a schema for its
/// arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique tool identifier (e.g., "launch_app")
    pub name: String,
    /// Human-readable description of what the tool does
    pub description: String,
    /// Schema of the tool's `arguments` object
    pub input_schema: InputSchema,
}

/// MCP resource definition, as listed by `resources/list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    /// Unique resource URI (e.g., "coremind://model/status")
    pub uri: String,
    /// Short display name
    pub name: String,
    /// Human-readable description of the resource
    pub description: String,
    /// Media type of the content returned by a read
    pub mime_type: String,
}

/// `tools/list` result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsList {
    pub tools: Vec<ToolDescriptor>,
}

/// `resources/list` result.
#[derive(Debug, Clone, Serialize)]
pub struct ResourcesList {
    pub resources: Vec<ResourceDescriptor>,
}

/// Text item inside a tool call result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    kind: &'static str,
    pub text: String,
}

/// `tools/call` result: always a text content array, success or not.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<TextContent>,
}

impl ToolCallResult {
    /// Result with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text",
                text: text.into(),
            }],
        }
    }
}

/// One content item of a resource read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    /// Omitted when the read named no uri.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub mime_type: &'static str,
    pub text: String,
}

/// `resources/read` result with a single JSON content item.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReadResult {
    pub contents: Vec<ResourceContents>,
}

impl ResourceReadResult {
    /// Result whose single item is `text` typed as `application/json`.
    pub fn json(uri: Option<String>, text: String) -> Self {
        Self {
            contents: vec![ResourceContents {
                uri,
                mime_type: "application/json",
                text,
            }],
        }
    }
}
