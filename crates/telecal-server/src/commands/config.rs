//! Configuration commands.

use std::path::Path;

use crate::config::Config;
use crate::error::{ServerError, ServerResult};

/// Dump the effective configuration to stdout with inline secrets masked.
pub fn dump(config: &Config, source: Option<&Path>) -> ServerResult<()> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ServerError::config(format!("failed to serialize config: {}", e)))?;
    let source = source.map_or_else(Config::default_path, Path::to_path_buf);
    println!("# config.toml ({})", source.display());
    println!("{}", toml_str);
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> ServerResult<()> {
    println!("config: {}", Config::default_path().display());
    Ok(())
}
