//! The two demo flows and the helpers they share.

mod format;
mod selector;
mod simple;
mod universal;

pub use format::*;
pub use selector::*;
pub use simple::*;
pub use universal::*;

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tracing::warn;

use crate::error::ConfigError;
use crate::mcp::{McpConfig, McpStore};

/// Loads the config, reporting problems to the operator.
///
/// `Ok(None)` means the flow should stop without connecting.
fn load_config<W: Write>(path: &Path, out: &mut W) -> Result<Option<McpConfig>> {
    match McpStore::load(path) {
        Ok(config) => Ok(Some(config)),
        Err(err) => {
            report_config_error(out, &err)?;
            Ok(None)
        }
    }
}

fn report_config_error<W: Write>(out: &mut W, err: &ConfigError) -> Result<()> {
    warn!(%err, "configuration problem");
    match err {
        ConfigError::NotFound(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            writeln!(out, "❌ Create {} with your server config", name)?;
        }
        other => writeln!(out, "❌ {}", other)?,
    }
    Ok(())
}

/// Builds the connector, treating configuration problems as reportable.
fn build_connector<C, F, W>(config: McpConfig, build: F, out: &mut W) -> Result<Option<C>>
where
    F: FnOnce(McpConfig) -> Result<C>,
    W: Write,
{
    match build(config) {
        Ok(connector) => Ok(Some(connector)),
        Err(err) => match err.downcast_ref::<ConfigError>() {
            Some(config_err) => {
                report_config_error(out, config_err)?;
                Ok(None)
            }
            None => Err(err),
        },
    }
}
