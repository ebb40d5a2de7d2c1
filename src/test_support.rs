//! Test doubles for the MCP seam and the operator prompt.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::demo::{InputEvent, PromptInput};
use crate::mcp::{Connection, McpConnector, McpSession, McpTool, ToolContent};

#[derive(Debug, Default)]
struct LogInner {
    connects: usize,
    pings: usize,
    calls: Vec<(String, Value)>,
    closes: usize,
    releases: usize,
}

/// Shared record of what a stub session was asked to do.
#[derive(Debug, Clone, Default)]
pub struct StubLog(Arc<Mutex<LogInner>>);

impl StubLog {
    fn with<T>(&self, f: impl FnOnce(&mut LogInner) -> T) -> T {
        let mut guard = self.0.lock().unwrap();
        f(&mut guard)
    }

    pub fn connects(&self) -> usize {
        self.with(|log| log.connects)
    }

    pub fn pings(&self) -> usize {
        self.with(|log| log.pings)
    }

    pub fn called(&self) -> Vec<String> {
        self.with(|log| log.calls.iter().map(|(name, _)| name.clone()).collect())
    }

    pub fn call_arguments(&self) -> Vec<Value> {
        self.with(|log| log.calls.iter().map(|(_, args)| args.clone()).collect())
    }

    pub fn closes(&self) -> usize {
        self.with(|log| log.closes)
    }

    pub fn releases(&self) -> usize {
        self.with(|log| log.releases)
    }
}

#[derive(Debug, Clone)]
pub enum StubOutcome {
    Content(Vec<ToolContent>),
    Fail(String),
    Hang,
}

#[derive(Debug, Clone)]
pub struct StubSession {
    tools: Vec<McpTool>,
    outcomes: HashMap<String, StubOutcome>,
    ping_error: Option<String>,
    list_error: Option<String>,
    log: StubLog,
}

impl StubSession {
    pub fn with_tools(names: &[&str]) -> Self {
        Self {
            tools: names
                .iter()
                .map(|name| McpTool::new(*name, Some(format!("the {} tool", name).as_str())))
                .collect(),
            outcomes: HashMap::new(),
            ping_error: None,
            list_error: None,
            log: StubLog::default(),
        }
    }

    pub fn log(&self) -> StubLog {
        self.log.clone()
    }

    pub fn failing_ping(mut self, message: &str) -> Self {
        self.ping_error = Some(message.to_string());
        self
    }

    pub fn failing_list(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn on_call(mut self, tool: &str, outcome: StubOutcome) -> Self {
        self.outcomes.insert(tool.to_string(), outcome);
        self
    }
}

#[async_trait::async_trait]
impl McpSession for StubSession {
    async fn ping(&mut self) -> Result<()> {
        self.log.with(|log| log.pings += 1);
        match &self.ping_error {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    async fn list_tools(&mut self) -> Result<Vec<McpTool>> {
        match &self.list_error {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(self.tools.clone()),
        }
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Vec<ToolContent>> {
        self.log.with(|log| log.calls.push((name.to_string(), arguments)));
        match self.outcomes.get(name).cloned() {
            Some(StubOutcome::Content(content)) => Ok(content),
            Some(StubOutcome::Fail(message)) => Err(anyhow!("{}", message)),
            Some(StubOutcome::Hang) => std::future::pending().await,
            None => Ok(vec![ToolContent::text(format!("{} ok", name))]),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.log.with(|log| log.closes += 1);
        Ok(())
    }

    fn release(&mut self) {
        self.log.with(|log| log.releases += 1);
    }
}

/// Hands out clones of one stub session.
pub struct StubConnector {
    session: StubSession,
}

impl StubConnector {
    pub fn new(session: StubSession) -> Self {
        Self { session }
    }
}

#[async_trait::async_trait]
impl McpConnector for StubConnector {
    async fn connect(&self) -> Result<Connection> {
        self.session.log.with(|log| log.connects += 1);
        Ok(Connection::new("stub", Box::new(self.session.clone())))
    }
}

/// Operator input replayed from a script.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    events: VecDeque<InputEvent>,
    interrupt_during_call: bool,
}

impl ScriptedInput {
    pub fn lines(lines: &[&str]) -> Self {
        Self {
            events: lines
                .iter()
                .map(|line| InputEvent::Line(line.to_string()))
                .collect(),
            interrupt_during_call: false,
        }
    }

    pub fn then(mut self, event: InputEvent) -> Self {
        self.events.push_back(event);
        self
    }

    pub fn interrupting_calls(mut self) -> Self {
        self.interrupt_during_call = true;
        self
    }
}

#[async_trait::async_trait]
impl PromptInput for ScriptedInput {
    async fn next_event(&mut self) -> InputEvent {
        self.events.pop_front().unwrap_or(InputEvent::Closed)
    }

    async fn interrupted(&mut self) {
        if !self.interrupt_during_call {
            std::future::pending::<()>().await;
        }
    }
}

/// Everything written to an in-memory sink, as text.
pub fn output(buffer: &[u8]) -> String {
    String::from_utf8_lossy(buffer).into_owned()
}
