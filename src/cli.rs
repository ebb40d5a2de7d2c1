use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::demo::{
    run_simple, run_universal, SimpleOptions, TerminalInput, UniversalOptions, DEFAULT_DEMO_TOOL,
};
use crate::mcp::{McpClient, McpStore};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (built ",
    env!("MCP_DEMO_BUILD_TIME"),
    ")"
);

const USAGE: &str = "\
Usage:
  mcp-demo                  # List tools
  mcp-demo --interactive    # Interactive mode
  mcp-demo simple           # List tools, then try one tool call";

#[derive(Parser, Debug)]
#[command(
    name = "mcp-demo",
    version,
    long_version = LONG_VERSION,
    about = "🌐 Universal MCP client: connect to the servers in mcp.json, ping them and list their tools",
    long_about = None,
    after_help = USAGE
)]
pub struct Cli {
    /// Pick tools from a numbered menu and call them with no arguments (listing flow only)
    #[arg(long)]
    pub interactive: bool,

    /// MCP server configuration file
    #[arg(long, global = true, value_name = "PATH", default_value_os_t = McpStore::default_path())]
    pub config: PathBuf,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect, list tools, then try a single tool call
    Simple {
        /// Tool to call with empty arguments
        #[arg(long, default_value = DEFAULT_DEMO_TOOL)]
        tool: String,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let mut out = io::stdout();
        match &self.command {
            Some(Commands::Simple { tool }) => {
                let options = SimpleOptions {
                    config_path: self.config.clone(),
                    tool: tool.clone(),
                };
                run_simple(&options, McpClient::new, &mut out).await
            }
            None => {
                writeln!(out, "🚀 Universal MCP Client")?;
                writeln!(out, "📋 Add any MCP server to {}", self.config.display())?;
                writeln!(out)?;
                let options = UniversalOptions {
                    config_path: self.config.clone(),
                };
                let mut input = self.interactive.then(TerminalInput::spawn);
                run_universal(&options, McpClient::new, input.as_mut(), &mut out).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_listing_mcp_json() {
        let cli = Cli::try_parse_from(["mcp-demo"]).unwrap();
        assert!(!cli.interactive);
        assert!(!cli.verbose);
        assert_eq!(cli.config, PathBuf::from("mcp.json"));
        assert!(cli.command.is_none());
    }

    #[test]
    fn interactive_and_config_flags() {
        let cli = Cli::try_parse_from(["mcp-demo", "--interactive", "--config", "servers.json"]).unwrap();
        assert!(cli.interactive);
        assert_eq!(cli.config, PathBuf::from("servers.json"));
    }

    #[test]
    fn simple_subcommand_has_default_tool() {
        let cli = Cli::try_parse_from(["mcp-demo", "simple", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Simple { tool }) => assert_eq!(tool, DEFAULT_DEMO_TOOL),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn unknown_flags_are_rejected() {
        let err = Cli::try_parse_from(["mcp-demo", "--interactve"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);

        assert!(Cli::try_parse_from(["mcp-demo", "--interactive", "extra"]).is_err());
    }

    #[test]
    fn global_flags_work_on_either_side_of_simple() {
        let before = Cli::try_parse_from(["mcp-demo", "-v", "--config", "a.json", "simple"]).unwrap();
        let after = Cli::try_parse_from(["mcp-demo", "simple", "--config", "a.json", "-v"]).unwrap();
        for cli in [before, after] {
            assert!(cli.verbose);
            assert_eq!(cli.config, PathBuf::from("a.json"));
            assert!(matches!(cli.command, Some(Commands::Simple { .. })));
        }
    }
}
