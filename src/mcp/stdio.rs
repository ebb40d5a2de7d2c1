use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::mcp::{
    extract_result_by_id, initialize_params, reply_to_server_request, tools_call_params,
    tools_list_params, CallToolResult, JsonRpcNotification, JsonRpcRequest, McpServerConfig,
    McpSession, McpTool, ToolContent, ToolsListResult,
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Session with a server spawned as a child process, speaking
/// newline-delimited JSON-RPC over its stdin/stdout.
pub struct StdioSession {
    server: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

impl StdioSession {
    pub async fn connect(name: &str, server: &McpServerConfig) -> Result<Self> {
        let command = server
            .command
            .as_ref()
            .ok_or_else(|| anyhow!("mcp server command is required for stdio"))?;
        let args = server.args.as_ref().cloned().unwrap_or_default();
        let mut child = spawn_stdio_server(command, &args, server.env.as_ref())
            .with_context(|| format!("failed to start mcp server '{}' ({})", name, command))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to open stdin for mcp server"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to open stdout for mcp server"))?;

        let mut session = Self {
            server: name.to_string(),
            child: Some(child),
            stdin: Some(stdin),
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
        };
        session.request("initialize", Some(initialize_params())).await?;
        session
            .send_message(&JsonRpcNotification::new("notifications/initialized", None))
            .await?;
        debug!(server = name, "stdio session initialized");
        Ok(session)
    }

    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send_message(&JsonRpcRequest::new(id, method, params)).await?;
        self.read_response(id).await
    }

    async fn send_message<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("mcp server '{}' is closed", self.server))?;
        stdin.write_all(payload.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self, id: u64) -> Result<Value> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(anyhow!("mcp server '{}' closed stdout", self.server));
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value: Value = match serde_json::from_str(trimmed) {
                Ok(value) => value,
                Err(err) => {
                    debug!(server = %self.server, %err, "ignoring non-json line");
                    continue;
                }
            };
            if let Some(reply) = reply_to_server_request(&value) {
                self.send_message(&reply).await?;
                continue;
            }
            if let Some(result) = extract_result_by_id(&value, id) {
                return result;
            }
        }
    }
}

#[async_trait::async_trait]
impl McpSession for StdioSession {
    async fn ping(&mut self) -> Result<()> {
        self.request("ping", None).await?;
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = tools_list_params(cursor.as_deref());
            let result = self.request("tools/list", Some(params)).await?;
            let list: ToolsListResult = serde_json::from_value(result)?;
            tools.extend(list.tools);
            cursor = list.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        Ok(tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ToolContent>> {
        let result = self
            .request("tools/call", Some(tools_call_params(name, arguments)))
            .await?;
        let result: CallToolResult = serde_json::from_value(result)?;
        result.into_content(name)
    }

    async fn close(&mut self) -> Result<()> {
        // Closing stdin is the polite way to ask a stdio server to exit.
        self.stdin.take();
        if let Some(child) = self.child.as_mut() {
            match tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(server = %self.server, %status, "mcp server exited");
                    self.child = None;
                }
                Ok(Err(err)) => warn!(server = %self.server, %err, "failed to wait for mcp server"),
                Err(_) => debug!(server = %self.server, "mcp server still running, killing it"),
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.start_kill() {
                debug!(server = %self.server, %err, "mcp server already gone");
            }
            match child.try_wait() {
                Ok(Some(status)) => debug!(server = %self.server, %status, "mcp server reaped"),
                Ok(None) => debug!(server = %self.server, "mcp server killed, exit pending"),
                Err(err) => debug!(server = %self.server, %err, "failed to reap mcp server"),
            }
        }
    }
}

impl Drop for StdioSession {
    fn drop(&mut self) {
        self.release();
    }
}

fn spawn_stdio_server(
    command: &str,
    args: &[String],
    env: Option<&BTreeMap<String, String>>,
) -> Result<Child> {
    let mut cmd = Command::new(command);
    cmd.args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    if let Some(env) = env {
        cmd.envs(env);
    }
    Ok(cmd.spawn()?)
}
