use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;
use tracing::debug;

use crate::demo::format::{render_content, write_banner, write_bulleted_tools};
use crate::demo::{build_connector, load_config};
use crate::mcp::{McpConfig, McpConnector};

/// Tool the simple demo tries by default. Usually fails without auth,
/// which is part of the demonstration.
pub const DEFAULT_DEMO_TOOL: &str = "atlassianUserInfo";

#[derive(Debug, Clone)]
pub struct SimpleOptions {
    pub config_path: PathBuf,
    pub tool: String,
}

/// Connect, ping, list tools, then try one fixed tool call.
pub async fn run_simple<C, F, W>(options: &SimpleOptions, build: F, out: &mut W) -> Result<()>
where
    C: McpConnector,
    F: FnOnce(McpConfig) -> Result<C>,
    W: Write,
{
    write_banner(out, "🚀 Simple MCP Demo")?;

    let Some(config) = load_config(&options.config_path, out)? else {
        return Ok(());
    };
    let Some(connector) = build_connector(config, build, out)? else {
        return Ok(());
    };

    let mut connection = connector.connect().await?;
    writeln!(out, "✅ Connected!")?;

    connection.ping().await?;
    writeln!(out, "🏓 Ping: OK")?;

    writeln!(out, "\n🔧 Available tools:")?;
    let tools = connection.list_tools().await?;
    write_bulleted_tools(out, &tools)?;
    writeln!(out, "\n📊 Total tools: {}", tools.len())?;

    writeln!(out, "\n🎯 Testing tool call...")?;
    match connection.call_tool(&options.tool, json!({})).await {
        Ok(content) => {
            writeln!(out, "✅ Tool call successful!")?;
            writeln!(out, "📄 Result: {}", render_content(&content))?;
        }
        Err(err) => {
            debug!(tool = %options.tool, error = ?err, "demo tool call failed");
            writeln!(out, "⚠️  Tool call failed: {:#}", err)?;
            writeln!(out, "💡 This is expected without proper auth")?;
        }
    }

    connection.close().await
}
