use anyhow::{anyhow, Result};
use futures_util::stream::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::mcp::{
    extract_result_by_id, initialize_params, tools_call_params, tools_list_params, CallToolResult,
    JsonRpcNotification, JsonRpcRequest, McpServerConfig, McpSession, McpTool, ToolContent,
    ToolsListResult, PROTOCOL_VERSION,
};

const SESSION_HEADER: &str = "mcp-session-id";

/// Session with a server over Streamable HTTP. Each request is a POST whose
/// answer is either plain JSON or an SSE stream.
pub struct HttpSession {
    server: String,
    client: Client,
    url: String,
    headers: HeaderMap,
    session_id: Option<String>,
    next_id: u64,
}

impl HttpSession {
    pub async fn connect(name: &str, server: &McpServerConfig) -> Result<Self> {
        let url = server
            .url
            .as_ref()
            .ok_or_else(|| anyhow!("mcp server url is required for http"))?;
        let mut session = Self {
            server: name.to_string(),
            client: build_client(server)?,
            url: url.clone(),
            headers: build_headers(server)?,
            session_id: None,
            next_id: 1,
        };

        session.request("initialize", Some(initialize_params())).await?;
        let notification = JsonRpcNotification::new("notifications/initialized", None);
        if let Err(err) = session.notify(&notification).await {
            debug!(server = name, %err, "initialized notification was not accepted");
        }
        debug!(server = name, session_id = ?session.session_id, "http session initialized");
        Ok(session)
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        let request = JsonRpcRequest::new(id, method, params);
        let resp = self.post(&request).await?;
        if let Some(session_id) = extract_session_id(&resp) {
            if self.session_id.as_deref() != Some(session_id.as_str()) {
                self.headers.insert(
                    HeaderName::from_static(SESSION_HEADER),
                    HeaderValue::from_str(&session_id)?,
                );
                self.session_id = Some(session_id);
            }
        }
        if !resp.status().is_success() {
            return Err(anyhow!(
                "mcp server '{}' answered {} to {}",
                self.server,
                resp.status(),
                method
            ));
        }
        parse_response(resp, id).await
    }

    async fn notify(&self, notification: &JsonRpcNotification<'_>) -> Result<()> {
        let resp = self.post(notification).await?;
        if !resp.status().is_success() {
            return Err(anyhow!("mcp notification failed: {}", resp.status()));
        }
        Ok(())
    }

    async fn post<T: Serialize>(&self, body: &T) -> Result<Response> {
        Ok(self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(body)
            .send()
            .await?)
    }
}

#[async_trait::async_trait]
impl McpSession for HttpSession {
    async fn ping(&mut self) -> Result<()> {
        self.request("ping", None).await?;
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = tools_list_params(cursor.as_deref());
            let value = self.request("tools/list", Some(params)).await?;
            let list: ToolsListResult = serde_json::from_value(value)?;
            tools.extend(list.tools);
            cursor = list.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ToolContent>> {
        let value = self
            .request("tools/call", Some(tools_call_params(name, arguments)))
            .await?;
        let result: CallToolResult = serde_json::from_value(value)?;
        result.into_content(name)
    }

    async fn close(&mut self) -> Result<()> {
        if self.session_id.take().is_some() {
            let resp = self
                .client
                .delete(&self.url)
                .headers(self.headers.clone())
                .send()
                .await;
            match resp {
                Ok(resp) => debug!(server = %self.server, status = %resp.status(), "session terminated"),
                Err(err) => debug!(server = %self.server, %err, "session termination failed"),
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        if self.session_id.take().is_none() {
            return;
        }
        // Not closed gracefully: fire the DELETE without waiting for it.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let request = self.client.delete(&self.url).headers(self.headers.clone());
        let server = self.server.clone();
        runtime.spawn(async move {
            if let Err(err) = request.send().await {
                debug!(server = %server, %err, "session termination failed");
            }
        });
    }
}

impl Drop for HttpSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_client(server: &McpServerConfig) -> Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout_sec) = server.timeout_sec {
        builder = builder.timeout(std::time::Duration::from_secs(timeout_sec));
    }
    Ok(builder.build()?)
}

fn build_headers(server: &McpServerConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("mcp-protocol-version"),
        HeaderValue::from_static(PROTOCOL_VERSION),
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/event-stream"),
    );
    if let Some(env_var) = &server.bearer_token_env_var {
        match std::env::var(env_var) {
            Ok(token) => {
                let value = format!("Bearer {}", token);
                headers.insert(reqwest::header::AUTHORIZATION, HeaderValue::from_str(&value)?);
            }
            Err(_) => debug!(env_var = %env_var, "bearer token variable is not set"),
        }
    }
    if let Some(extra) = &server.headers {
        for (key, value) in extra {
            let name = HeaderName::from_bytes(key.as_bytes())?;
            let value = HeaderValue::from_str(value)?;
            headers.insert(name, value);
        }
    }
    Ok(headers)
}

fn extract_session_id(resp: &Response) -> Option<String> {
    resp.headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

async fn parse_response(resp: Response, id: u64) -> Result<Value> {
    let is_sse = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("text/event-stream"))
        .unwrap_or(false);
    if is_sse {
        read_sse_result(resp.bytes_stream(), id).await
    } else {
        let value: Value = resp.json().await?;
        extract_result_by_id(&value, id).ok_or_else(|| anyhow!("missing result for id {}", id))?
    }
}

/// Reads SSE events until one carries the response to request `id`.
async fn read_sse_result<S, B, E>(stream: S, id: u64) -> Result<Value>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut stream = std::pin::pin!(stream);
    // Raw bytes: a chunk may end in the middle of a UTF-8 sequence.
    let mut buffer: Vec<u8> = Vec::new();
    let mut data_lines: Vec<String> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buffer.extend_from_slice(chunk.as_ref());
        while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = buffer.drain(..=pos).collect();
            let Ok(line) = std::str::from_utf8(&raw[..pos]) else {
                debug!(id, "skipping sse line that is not utf-8");
                continue;
            };
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                if data_lines.is_empty() {
                    continue;
                }
                let data = data_lines.join("\n");
                data_lines.clear();
                if data == "[DONE]" {
                    continue;
                }
                if let Ok(value) = serde_json::from_str::<Value>(&data) {
                    if let Some(result) = extract_result_by_id(&value, id) {
                        return result;
                    }
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("data:") {
                data_lines.push(rest.trim_start().to_string());
            }
        }
    }
    Err(anyhow!("missing sse response for id {}", id))
}
