//! Where dtk keeps its configuration file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use crate::{APP_NAME, AppConfig};

/// File name looked up inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Resolved location of the configuration file.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Path to the configuration file.
    pub config_file: PathBuf,
}

impl AppPaths {
    /// Resolve the config file from `--config` or the XDG config directory.
    ///
    /// `~` and environment variables in the override are expanded. A
    /// directory override points at `config.toml` inside it.
    ///
    /// # Errors
    ///
    /// Returns an error if expansion fails, the override names no file, or no
    /// config directory can be determined.
    pub fn discover(override_path: Option<&Path>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => {
                let path = match path.to_str() {
                    Some(text) => expand_path(text)?,
                    None => path.to_path_buf(),
                };
                if path.is_dir() {
                    path.join(CONFIG_FILE_NAME)
                } else {
                    path
                }
            }
            None => default_config_dir()?.join(CONFIG_FILE_NAME),
        };

        if config_file.file_name().is_none() {
            return Err(anyhow!(
                "invalid config file path: {:?}",
                config_file.display().to_string()
            ));
        }
        Ok(Self { config_file })
    }
}

impl std::fmt::Display for AppPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config: {}", self.config_file.display())
    }
}

/// Expand `~` and environment variables in a path.
///
/// # Errors
///
/// Returns an error if a referenced variable is not set.
pub fn expand_path(text: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(text).with_context(|| format!("expanding path {text:?}"))?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// `$XDG_CONFIG_HOME/dtk`, falling back to the platform config dir and then
/// `~/.config/dtk`.
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn default_config_dir() -> Result<PathBuf> {
    let base = env::var_os("XDG_CONFIG_HOME")
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))?;
    Ok(base.join(APP_NAME))
}

/// Write a default config with empty credentials to `path`, creating parent
/// directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let defaults = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    let body = format!(
        "# {APP_NAME} configuration ({})\n\
         # Fill in app_key, app_secret and agent_id from the DingTalk developer console.\n\n\
         {defaults}",
        path.display()
    );
    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))
}
