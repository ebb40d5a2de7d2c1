use std::fmt;
use std::io::{self, Write};

use crate::mcp::{McpTool, ToolContent};

/// Longest tool output shown in the interactive selector, in characters.
pub const RESULT_PREVIEW_CHARS: usize = 500;

pub const RULE: &str = "========================================";

/// A tool result as it will be shown: whole, or cut to a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preview<'a> {
    Full(&'a str),
    Truncated(&'a str),
}

impl<'a> Preview<'a> {
    /// Cuts `text` to its first `limit` characters (not bytes).
    pub fn of(text: &'a str, limit: usize) -> Self {
        match text.char_indices().nth(limit) {
            Some((end, _)) => Self::Truncated(&text[..end]),
            None => Self::Full(text),
        }
    }
}

impl fmt::Display for Preview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(text) => f.write_str(text),
            Self::Truncated(text) => write!(f, "{}...", text),
        }
    }
}

pub fn write_banner<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", RULE)
}

/// Numbered listing: ` 1. name` plus an indented description line.
pub fn write_numbered_tools<W: Write>(out: &mut W, tools: &[McpTool]) -> io::Result<()> {
    for (i, tool) in tools.iter().enumerate() {
        writeln!(out, "  {:2}. {}", i + 1, tool.name)?;
        if let Some(description) = tool.summary() {
            writeln!(out, "      {}", description)?;
        }
    }
    Ok(())
}

/// Bulleted listing: `• name - description`.
pub fn write_bulleted_tools<W: Write>(out: &mut W, tools: &[McpTool]) -> io::Result<()> {
    for tool in tools {
        match tool.summary() {
            Some(description) => writeln!(out, "  • {} - {}", tool.name, description)?,
            None => writeln!(out, "  • {}", tool.name)?,
        }
    }
    Ok(())
}

/// All content items, one per line, without truncation.
pub fn render_content(content: &[ToolContent]) -> String {
    content
        .iter()
        .map(ToolContent::describe)
        .collect::<Vec<_>>()
        .join("\n")
}
