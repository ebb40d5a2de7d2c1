//! Numbered-menu loop: pick a tool by position, call it with no arguments,
//! repeat until the operator quits.

use std::io::{self, BufRead, Write};

use anyhow::Result;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::demo::format::{write_banner, Preview, RESULT_PREVIEW_CHARS};
use crate::error::SelectionError;
use crate::mcp::{Connection, McpTool, ToolContent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Line(String),
    Interrupted,
    Closed,
}

/// Where operator input comes from.
#[async_trait::async_trait]
pub trait PromptInput: Send {
    /// Next line, or why there will be none.
    async fn next_event(&mut self) -> InputEvent;

    /// Resolves when the operator interrupts; never resolves otherwise.
    async fn interrupted(&mut self);
}

/// Reads stdin on a dedicated thread and watches for Ctrl-C.
///
/// One listener task lives as long as the input, so an interrupt that lands
/// between two reads is latched rather than lost. A second Ctrl-C exits.
pub struct TerminalInput {
    lines: mpsc::UnboundedReceiver<String>,
    interrupt: watch::Receiver<bool>,
}

impl TerminalInput {
    /// Must be called from within the tokio runtime.
    pub fn spawn() -> Self {
        let (line_tx, lines) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        let (interrupt_tx, interrupt) = watch::channel(false);
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "cannot listen for Ctrl-C");
                return;
            }
            debug!("interrupt received");
            if interrupt_tx.send(true).is_err() {
                return;
            }
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("second interrupt, exiting");
                std::process::exit(130);
            }
        });

        Self::from_channels(lines, interrupt)
    }

    fn from_channels(
        lines: mpsc::UnboundedReceiver<String>,
        interrupt: watch::Receiver<bool>,
    ) -> Self {
        Self { lines, interrupt }
    }
}

#[async_trait::async_trait]
impl PromptInput for TerminalInput {
    async fn next_event(&mut self) -> InputEvent {
        tokio::select! {
            biased;
            _ = wait_for_interrupt(&mut self.interrupt) => InputEvent::Interrupted,
            line = self.lines.recv() => match line {
                Some(line) => InputEvent::Line(line),
                None => InputEvent::Closed,
            },
        }
    }

    async fn interrupted(&mut self) {
        wait_for_interrupt(&mut self.interrupt).await
    }
}

/// Resolves once an interrupt has been latched; never if the listener is gone.
async fn wait_for_interrupt(interrupt: &mut watch::Receiver<bool>) {
    let listening = interrupt.wait_for(|hit| *hit).await.is_ok();
    if !listening {
        std::future::pending::<()>().await;
    }
}

/// Maps operator input to a 0-based index into a list of `count` tools.
pub fn parse_selection(input: &str, count: usize) -> Result<usize, SelectionError> {
    let input = input.trim();
    let index = match input.parse::<i64>() {
        Ok(index) => index,
        Err(_) if is_integer(input) => {
            let index = if input.starts_with('-') { i64::MIN } else { i64::MAX };
            return Err(SelectionError::OutOfRange { index, count });
        }
        Err(_) => return Err(SelectionError::NotANumber),
    };
    match usize::try_from(index) {
        Ok(n) if (1..=count).contains(&n) => Ok(n - 1),
        _ => Err(SelectionError::OutOfRange { index, count }),
    }
}

fn is_integer(input: &str) -> bool {
    let digits = input.strip_prefix(&['+', '-'][..]).unwrap_or(input);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub async fn run_selector<I, W>(
    connection: &mut Connection,
    tools: &[McpTool],
    input: &mut I,
    out: &mut W,
) -> Result<()>
where
    I: PromptInput,
    W: Write,
{
    writeln!(out)?;
    write_banner(out, "🎮 Interactive Mode")?;

    loop {
        writeln!(out, "\nEnter tool number (1-{}) or 'q' to quit:", tools.len())?;
        write!(out, "> ")?;
        out.flush()?;

        let line = match input.next_event().await {
            InputEvent::Line(line) => line,
            event => {
                debug!(?event, "leaving interactive mode");
                writeln!(out)?;
                break;
            }
        };
        let choice = line.trim();
        if choice.eq_ignore_ascii_case("q") {
            break;
        }

        let tool = match parse_selection(choice, tools.len()) {
            Ok(index) => &tools[index],
            Err(err) => {
                writeln!(out, "❌ {}", err)?;
                continue;
            }
        };

        writeln!(out, "\n🎯 Calling: {}", tool.name)?;
        let outcome = tokio::select! {
            biased;
            outcome = connection.call_tool(&tool.name, json!({})) => outcome,
            _ = input.interrupted() => {
                info!(tool = %tool.name, "interrupted while calling tool");
                writeln!(out)?;
                break;
            }
        };
        match outcome {
            Ok(content) => write_call_result(out, &content)?,
            Err(err) => writeln!(out, "⚠️  Tool failed: {:#}", err)?,
        }
    }

    Ok(())
}

fn write_call_result<W: Write>(out: &mut W, content: &[ToolContent]) -> io::Result<()> {
    let Some(first) = content.first() else {
        return writeln!(out, "⚠️  No result returned");
    };
    writeln!(out, "✅ Success!")?;
    match first.as_text() {
        Some(text) => match Preview::of(text, RESULT_PREVIEW_CHARS) {
            preview @ Preview::Truncated(_) => writeln!(
                out,
                "📄 Result (first {} chars): {}",
                RESULT_PREVIEW_CHARS, preview
            ),
            preview => writeln!(out, "📄 Result: {}", preview),
        },
        None => writeln!(out, "📄 Result: {}", first.describe()),
    }
}
