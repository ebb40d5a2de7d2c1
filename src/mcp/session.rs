//! The seam between the demo flows and whatever speaks MCP.
//!
//! Flows only see [`McpConnector`] and the [`Connection`] it hands out, so
//! tests can swap the real transports for stubs.

use anyhow::Result;
use serde_json::Value;
use tracing::debug;

use crate::mcp::{McpTool, ToolContent};

/// A live, initialized session with one (or a group of) MCP servers.
#[async_trait::async_trait]
pub trait McpSession: Send {
    async fn ping(&mut self) -> Result<()>;

    async fn list_tools(&mut self) -> Result<Vec<McpTool>>;

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ToolContent>>;

    /// Graceful shutdown on the normal path. `release` still runs afterwards.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    /// Frees the underlying resources without awaiting. Must be idempotent.
    fn release(&mut self);
}

/// Opens connections. Implemented by [`crate::mcp::McpClient`].
#[async_trait::async_trait]
pub trait McpConnector: Send + Sync {
    async fn connect(&self) -> Result<Connection>;
}

/// Scoped connection: the session is released when this value goes out of
/// scope, whichever way the enclosing block exits.
pub struct Connection {
    label: String,
    session: Box<dyn McpSession>,
    released: bool,
}

impl Connection {
    pub fn new(label: impl Into<String>, session: Box<dyn McpSession>) -> Self {
        let label = label.into();
        debug!(connection = %label, "connection opened");
        Self {
            label,
            session,
            released: false,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn ping(&mut self) -> Result<()> {
        self.session.ping().await
    }

    pub async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        self.session.list_tools().await
    }

    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ToolContent>> {
        debug!(connection = %self.label, tool = name, "calling tool");
        self.session.call_tool(name, arguments).await
    }

    /// Closes gracefully, then releases.
    pub async fn close(mut self) -> Result<()> {
        let result = self.session.close().await;
        self.release();
        result
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.session.release();
        debug!(connection = %self.label, "connection released");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubSession;

    #[tokio::test]
    async fn drop_releases_once() {
        let stub = StubSession::with_tools(&["a"]);
        let log = stub.log();
        {
            let mut connection = Connection::new("demo", Box::new(stub));
            connection.ping().await.unwrap();
        }
        assert_eq!(log.releases(), 1);
        assert_eq!(log.closes(), 0);
    }

    #[tokio::test]
    async fn close_releases_once() {
        let stub = StubSession::with_tools(&["a"]);
        let log = stub.log();
        let connection = Connection::new("demo", Box::new(stub));
        assert_eq!(connection.label(), "demo");
        connection.close().await.unwrap();
        assert_eq!(log.closes(), 1);
        assert_eq!(log.releases(), 1);
    }

    #[tokio::test]
    async fn early_return_on_error_still_releases() {
        async fn failing_flow(connection: Connection) -> Result<()> {
            let mut connection = connection;
            connection.ping().await?;
            connection.close().await
        }

        let stub = StubSession::with_tools(&[]).failing_ping("server went away");
        let log = stub.log();
        let err = failing_flow(Connection::new("demo", Box::new(stub)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "server went away");
        assert_eq!(log.releases(), 1);
    }
}
