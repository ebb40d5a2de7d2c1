use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::demo::format::{write_banner, write_numbered_tools};
use crate::demo::selector::{run_selector, PromptInput};
use crate::demo::{build_connector, load_config};
use crate::mcp::{McpConfig, McpConnector};

#[derive(Debug, Clone)]
pub struct UniversalOptions {
    pub config_path: PathBuf,
}

/// Show servers, connect, ping, list tools; with `input`, hand over to the
/// interactive selector afterwards.
pub async fn run_universal<C, F, I, W>(
    options: &UniversalOptions,
    build: F,
    input: Option<&mut I>,
    out: &mut W,
) -> Result<()>
where
    C: McpConnector,
    F: FnOnce(McpConfig) -> Result<C>,
    I: PromptInput,
    W: Write,
{
    write_banner(out, "🌐 Universal MCP Client")?;

    let Some(config) = load_config(&options.config_path, out)? else {
        return Ok(());
    };
    writeln!(out, "🔗 Servers: {}", config.server_names().join(", "))?;

    let Some(connector) = build_connector(config, build, out)? else {
        return Ok(());
    };
    let mut connection = connector.connect().await?;
    writeln!(out, "✅ Connected!")?;

    connection.ping().await?;
    writeln!(out, "🏓 Ping: OK")?;

    let tools = connection.list_tools().await?;
    info!(connection = connection.label(), count = tools.len(), "tools discovered");
    writeln!(out, "\n🛠️  Tools found: {}", tools.len())?;
    write_numbered_tools(out, &tools)?;

    if let Some(input) = input {
        if !tools.is_empty() {
            run_selector(&mut connection, &tools, input, out).await?;
        }
    }

    connection.close().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::McpClient;
    use crate::test_support::{output, ScriptedInput, StubConnector, StubSession};
    use std::io::Write as _;

    fn options_for(contents: &str) -> (tempfile::TempDir, UniversalOptions) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcp.json");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(contents.as_bytes())
            .unwrap();
        (dir, UniversalOptions { config_path: path })
    }

    #[tokio::test]
    async fn lists_servers_in_file_order_and_numbered_tools() {
        let (_dir, options) =
            options_for(r#"{"mcpServers": {"weather": {}, "atlassian": {}, "docs": {}}}"#);
        let stub = StubSession::with_tools(&["a", "b"]);
        let log = stub.log();
        let mut out = Vec::new();

        run_universal(
            &options,
            |_| Ok(StubConnector::new(stub)),
            None::<&mut ScriptedInput>,
            &mut out,
        )
        .await
        .unwrap();

        let text = output(&out);
        assert!(text.contains("🔗 Servers: weather, atlassian, docs\n"));
        assert!(text.contains("✅ Connected!\n🏓 Ping: OK\n"));
        assert!(text.contains("🛠️  Tools found: 2\n   1. a\n      the a tool\n   2. b\n"));
        assert!(!text.contains("Interactive Mode"));
        assert_eq!((log.connects(), log.pings(), log.closes(), log.releases()), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn missing_config_never_connects() {
        let dir = tempfile::tempdir().unwrap();
        let options = UniversalOptions {
            config_path: dir.path().join("mcp.json"),
        };
        let mut out = Vec::new();
        let mut built = false;

        run_universal(
            &options,
            |_| {
                built = true;
                Ok(StubConnector::new(StubSession::with_tools(&[])))
            },
            None::<&mut ScriptedInput>,
            &mut out,
        )
        .await
        .unwrap();

        assert!(!built);
        let text = output(&out);
        assert!(text.contains("❌ Create mcp.json with your server config"));
        assert!(!text.contains("Connected"));
    }

    #[tokio::test]
    async fn malformed_or_empty_config_is_reported() {
        let (_dir, options) = options_for("{ nope");
        let mut out = Vec::new();
        run_universal(
            &options,
            |_| Ok(StubConnector::new(StubSession::with_tools(&[]))),
            None::<&mut ScriptedInput>,
            &mut out,
        )
        .await
        .unwrap();
        assert!(output(&out).contains("❌ invalid config in"));

        let (_dir, options) = options_for(r#"{"mcpServers": {}}"#);
        let mut out = Vec::new();
        run_universal(&options, McpClient::new, None::<&mut ScriptedInput>, &mut out)
            .await
            .unwrap();
        let text = output(&out);
        assert!(text.contains("❌ no servers configured"));
        assert!(!text.contains("Connected"));
    }

    #[tokio::test]
    async fn discovery_failure_propagates_and_releases() {
        let (_dir, options) = options_for(r#"{"mcpServers": {"demo": {}}}"#);
        let stub = StubSession::with_tools(&[]).failing_list("tools/list timed out");
        let log = stub.log();
        let mut out = Vec::new();

        let err = run_universal(
            &options,
            |_| Ok(StubConnector::new(stub)),
            None::<&mut ScriptedInput>,
            &mut out,
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "tools/list timed out");
        assert_eq!(log.releases(), 1);
        assert_eq!(log.closes(), 0);
    }

    #[tokio::test]
    async fn interactive_mode_runs_after_listing() {
        let (_dir, options) = options_for(r#"{"mcpServers": {"demo": {}}}"#);
        let stub = StubSession::with_tools(&["a", "b"]);
        let log = stub.log();
        let mut input = ScriptedInput::lines(&["2", "q"]);
        let mut out = Vec::new();

        run_universal(
            &options,
            |_| Ok(StubConnector::new(stub)),
            Some(&mut input),
            &mut out,
        )
        .await
        .unwrap();

        let text = output(&out);
        assert!(text.contains("🎮 Interactive Mode"));
        assert!(text.contains("📄 Result: b ok"));
        assert_eq!(log.called(), vec!["b"]);
        assert_eq!(log.releases(), 1);
    }

    #[tokio::test]
    async fn interactive_mode_is_skipped_without_tools() {
        let (_dir, options) = options_for(r#"{"mcpServers": {"demo": {}}}"#);
        let mut input = ScriptedInput::lines(&["1"]);
        let mut out = Vec::new();

        run_universal(
            &options,
            |_| Ok(StubConnector::new(StubSession::with_tools(&[]))),
            Some(&mut input),
            &mut out,
        )
        .await
        .unwrap();

        let text = output(&out);
        assert!(text.contains("Tools found: 0"));
        assert!(!text.contains("Interactive Mode"));
    }
}
