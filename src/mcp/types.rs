use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const PROTOCOL_VERSION: &str = "2025-11-25";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
}

impl McpTool {
    pub fn new(name: impl Into<String>, description: Option<&str>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: description.map(str::to_string),
            input_schema: None,
        }
    }

    /// Description with surrounding whitespace removed, `None` when blank.
    pub fn summary(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpTool>,
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<String>,
}

/// One item of a `tools/call` result.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolContent {
    Text(String),
    Image { mime_type: String, data: String },
    Audio { mime_type: String, data: String },
    Resource { uri: Option<String>, text: Option<String> },
    ResourceLink { uri: String, name: Option<String> },
    Other(Value),
}

impl ToolContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn from_value(value: Value) -> Self {
        let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
        let field = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);
        match kind {
            "text" => match field(&value, "text") {
                Some(text) => Self::Text(text),
                None => Self::Other(value),
            },
            "image" | "audio" => {
                let mime_type = field(&value, "mimeType").unwrap_or_default();
                let data = field(&value, "data").unwrap_or_default();
                if kind == "image" {
                    Self::Image { mime_type, data }
                } else {
                    Self::Audio { mime_type, data }
                }
            }
            "resource" => {
                let resource = value.get("resource").cloned().unwrap_or(Value::Null);
                Self::Resource {
                    uri: field(&resource, "uri"),
                    text: field(&resource, "text"),
                }
            }
            "resource_link" => match field(&value, "uri") {
                Some(uri) => Self::ResourceLink {
                    uri,
                    name: field(&value, "name"),
                },
                None => Self::Other(value),
            },
            _ => Self::Other(value),
        }
    }

    /// The textual payload, if this item carries one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Resource { text, .. } => text.as_deref(),
            _ => None,
        }
    }

    /// One-line description used when there is no text to show.
    pub fn describe(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image { mime_type, data } => format!("[image {}, {} bytes base64]", mime_type, data.len()),
            Self::Audio { mime_type, data } => format!("[audio {}, {} bytes base64]", mime_type, data.len()),
            Self::Resource { uri, text } => match (text, uri) {
                (Some(text), _) => text.clone(),
                (None, Some(uri)) => format!("[resource {}]", uri),
                (None, None) => "[resource]".to_string(),
            },
            Self::ResourceLink { uri, name } => match name {
                Some(name) => format!("[link {} {}]", name, uri),
                None => format!("[link {}]", uri),
            },
            Self::Other(value) => value.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for ToolContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_value)
    }
}

#[derive(Debug, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(rename = "structuredContent", default)]
    pub structured_content: Option<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Turns a result flagged with `isError` into an error carrying its text.
    pub fn into_content(self, tool: &str) -> Result<Vec<ToolContent>> {
        if self.is_error {
            let message = self
                .content
                .iter()
                .filter_map(ToolContent::as_text)
                .collect::<Vec<_>>()
                .join("\n");
            if message.is_empty() {
                return Err(anyhow!("tool '{}' reported an error", tool));
            }
            return Err(anyhow!("tool '{}' reported an error: {}", tool, message));
        }
        if self.content.is_empty() {
            if let Some(structured) = self.structured_content {
                return Ok(vec![ToolContent::Text(structured.to_string())]);
            }
        }
        Ok(self.content)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }
    })
}

pub fn tools_list_params(cursor: Option<&str>) -> Value {
    match cursor {
        Some(cursor) => serde_json::json!({ "cursor": cursor }),
        None => serde_json::json!({}),
    }
}

pub fn tools_call_params(name: &str, arguments: Value) -> Value {
    serde_json::json!({ "name": name, "arguments": arguments })
}

/// Finds the response to request `id` in a single message or a batch.
///
/// Returns `None` when the message is unrelated, so the caller keeps reading.
pub fn extract_result_by_id(value: &Value, id: u64) -> Option<Result<Value>> {
    match value {
        Value::Array(items) => items.iter().find_map(|item| extract_result_by_id(item, id)),
        Value::Object(map) => {
            if map.contains_key("method") {
                return None;
            }
            let message_id = map.get("id")?.as_u64()?;
            if message_id != id {
                return None;
            }
            if let Some(error) = map.get("error") {
                return Some(Err(rpc_error(error)));
            }
            let result = map.get("result")?.clone();
            Some(Ok(result))
        }
        _ => None,
    }
}

fn rpc_error(error: &Value) -> anyhow::Error {
    let message = error.get("message").and_then(Value::as_str);
    let code = error.get("code").and_then(Value::as_i64);
    match (code, message) {
        (Some(code), Some(message)) => anyhow!("mcp error {}: {}", code, message),
        (None, Some(message)) => anyhow!("mcp error: {}", message),
        _ => anyhow!("mcp error: {}", error),
    }
}

/// Reply for a request the server sends to us, if `value` is one.
///
/// Servers may ping the client; everything else is answered with
/// "method not found" since this client advertises no capabilities.
pub fn reply_to_server_request(value: &Value) -> Option<Value> {
    let map = value.as_object()?;
    let method = map.get("method")?.as_str()?;
    let id = map.get("id")?.clone();
    if method == "ping" {
        return Some(serde_json::json!({ "jsonrpc": "2.0", "id": id, "result": {} }));
    }
    Some(serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": -32601, "message": format!("method not found: {}", method) }
    }))
}
