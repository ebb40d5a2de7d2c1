use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::mcp::{
    Connection, HttpSession, McpConfig, McpConnector, McpServerConfig, McpSession, McpTool,
    StdioSession, ToolContent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

impl TransportKind {
    pub fn for_server(name: &str, server: &McpServerConfig) -> Result<Self> {
        match server.transport.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("stdio") => Ok(Self::Stdio),
            Some("http" | "streamable-http" | "sse") => Ok(Self::Http),
            Some(other) => Err(anyhow!("server '{}': unsupported transport '{}'", name, other)),
            None if server.url.is_some() => Ok(Self::Http),
            None if server.command.is_some() => Ok(Self::Stdio),
            None => Err(anyhow!(
                "server '{}' needs either \"command\" or \"url\"",
                name
            )),
        }
    }
}

/// Client handle built from `mcp.json`. Connecting opens every configured
/// server; with more than one, tools are namespaced as `<server>_<tool>`.
#[derive(Debug, Clone)]
pub struct McpClient {
    servers: Vec<(String, McpServerConfig)>,
}

impl McpClient {
    pub fn new(config: McpConfig) -> Result<Self> {
        if config.is_empty() {
            return Err(ConfigError::NoServers.into());
        }
        Ok(Self {
            servers: config.servers,
        })
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|(name, _)| name.as_str()).collect()
    }
}

#[async_trait::async_trait]
impl McpConnector for McpClient {
    async fn connect(&self) -> Result<Connection> {
        if let [(name, server)] = self.servers.as_slice() {
            let session = open_session(name, server).await?;
            return Ok(Connection::new(name.clone(), session));
        }

        let mut members = Vec::with_capacity(self.servers.len());
        for (name, server) in &self.servers {
            let session = open_session(name, server)
                .await
                .with_context(|| format!("failed to connect to server '{}'", name))?;
            members.push((name.clone(), session));
        }
        let label = self.server_names().join("+");
        Ok(Connection::new(label, Box::new(CompositeSession::new(members))))
    }
}

async fn open_session(name: &str, server: &McpServerConfig) -> Result<Box<dyn McpSession>> {
    let kind = TransportKind::for_server(name, server)?;
    info!(server = name, transport = ?kind, "connecting");
    let session: Box<dyn McpSession> = match kind {
        TransportKind::Stdio => Box::new(StdioSession::connect(name, server).await?),
        TransportKind::Http => Box::new(HttpSession::connect(name, server).await?),
    };
    Ok(session)
}

/// Several servers presented as one, with tool names prefixed by server.
pub struct CompositeSession {
    members: Vec<(String, Box<dyn McpSession>)>,
}

impl CompositeSession {
    pub fn new(members: Vec<(String, Box<dyn McpSession>)>) -> Self {
        Self { members }
    }

    fn route<'a>(&self, name: &'a str) -> Option<(usize, &'a str)> {
        let names: Vec<&str> = self.members.iter().map(|(n, _)| n.as_str()).collect();
        split_prefixed(name, &names)
    }
}

/// Splits `<server>_<tool>` into the index of `server` and `tool`.
/// The longest matching server name wins.
pub fn split_prefixed<'a>(name: &'a str, servers: &[&str]) -> Option<(usize, &'a str)> {
    servers
        .iter()
        .enumerate()
        .filter_map(|(index, server)| {
            let tool = name.strip_prefix(server)?.strip_prefix('_')?;
            (!tool.is_empty()).then_some((index, server.len(), tool))
        })
        .max_by_key(|(_, len, _)| *len)
        .map(|(index, _, tool)| (index, tool))
}

#[async_trait::async_trait]
impl McpSession for CompositeSession {
    async fn ping(&mut self) -> Result<()> {
        for (name, session) in self.members.iter_mut() {
            session
                .ping()
                .await
                .with_context(|| format!("ping to server '{}' failed", name))?;
        }
        Ok(())
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        for (name, session) in self.members.iter_mut() {
            let listed = session
                .list_tools()
                .await
                .with_context(|| format!("listing tools of server '{}' failed", name))?;
            debug!(server = %name, count = listed.len(), "tools listed");
            tools.extend(listed.into_iter().map(|mut tool| {
                tool.name = format!("{}_{}", name, tool.name);
                tool
            }));
        }
        Ok(tools)
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ToolContent>> {
        let (index, tool) = self
            .route(name)
            .ok_or_else(|| anyhow!("no server matches tool '{}'", name))?;
        let (_, session) = &mut self.members[index];
        session.call_tool(tool, arguments).await
    }

    async fn close(&mut self) -> Result<()> {
        let mut first_err = None;
        for (name, session) in self.members.iter_mut() {
            if let Err(err) = session.close().await {
                debug!(server = %name, %err, "close failed");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn release(&mut self) {
        for (_, session) in self.members.iter_mut() {
            session.release();
        }
    }
}
