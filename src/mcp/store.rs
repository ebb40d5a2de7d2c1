use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::ConfigError;

/// Parsed `mcp.json`. Servers keep the order they have in the file.
#[derive(Debug, Clone, Default)]
pub struct McpConfig {
    pub servers: Vec<(String, McpServerConfig)>,
}

impl McpConfig {
    pub fn server_names(&self) -> Vec<&str> {
        self.servers.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct McpServerConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    pub url: Option<String>,
    #[serde(default, alias = "http_headers")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(alias = "bearerTokenEnvVar")]
    pub bearer_token_env_var: Option<String>,
    #[serde(alias = "timeoutSec")]
    pub timeout_sec: Option<u64>,
    pub transport: Option<String>,
}

impl McpServerConfig {
    fn expand_env_vars(&mut self) {
        for value in [&mut self.command, &mut self.url].into_iter().flatten() {
            *value = expand_env_vars_in_string(value);
        }
        if let Some(args) = &mut self.args {
            for arg in args.iter_mut() {
                *arg = expand_env_vars_in_string(arg);
            }
        }
        for map in [&mut self.env, &mut self.headers].into_iter().flatten() {
            for value in map.values_mut() {
                *value = expand_env_vars_in_string(value);
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "mcpServers", default)]
    mcp_servers: Map<String, Value>,
}

pub struct McpStore;

impl McpStore {
    pub fn default_path() -> PathBuf {
        PathBuf::from("mcp.json")
    }

    pub fn load(path: &Path) -> Result<McpConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let malformed = |source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        };
        let raw: RawConfig = serde_json::from_str(&content).map_err(malformed)?;

        let mut servers = Vec::with_capacity(raw.mcp_servers.len());
        for (name, value) in raw.mcp_servers {
            let mut server: McpServerConfig = serde_json::from_value(value).map_err(malformed)?;
            server.expand_env_vars();
            servers.push((name, server));
        }
        debug!(path = %path.display(), servers = servers.len(), "loaded mcp config");
        Ok(McpConfig { servers })
    }
}

fn expand_env_vars_in_string(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            output.push(ch);
            continue;
        }

        match chars.peek() {
            Some('{') => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for next_ch in chars.by_ref() {
                    if next_ch == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next_ch);
                }
                match std::env::var(&name) {
                    Ok(val) if closed && !name.is_empty() => output.push_str(&val),
                    _ => {
                        output.push_str("${");
                        output.push_str(&name);
                        if closed {
                            output.push('}');
                        }
                    }
                }
            }
            Some(next_ch) if is_env_var_char(*next_ch) => {
                let mut name = String::new();
                while let Some(&next_ch) = chars.peek() {
                    if !is_env_var_char(next_ch) {
                        break;
                    }
                    name.push(next_ch);
                    chars.next();
                }
                match std::env::var(&name) {
                    Ok(val) => output.push_str(&val),
                    Err(_) => {
                        output.push('$');
                        output.push_str(&name);
                    }
                }
            }
            _ => output.push('$'),
        }
    }

    output
}

fn is_env_var_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
