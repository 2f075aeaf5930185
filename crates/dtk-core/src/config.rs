//! Configuration types and loading for the application.

use std::path::Path;

use anyhow::Result;
use config::{Config, Environment, File, FileFormat};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dingtalk::client::{DEFAULT_API_BASE_URL, DEFAULT_OAPI_BASE_URL};
use crate::dingtalk::models::Credentials;
use crate::error::DingTalkError;
use crate::paths::{expand_path, write_default_config};
use crate::{AppPaths, env_prefix};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(
    title = "Application Configuration",
    description = "Main configuration for the application"
)]
pub struct AppConfig {
    /// JSON Schema reference for editor support.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    #[schemars(skip)]
    pub schema: Option<String>,

    /// DingTalk application settings.
    #[serde(alias = "dingding")]
    pub dingtalk: DingTalkConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Runtime behavior configuration.
    pub runtime: RuntimeConfig,
}

impl AppConfig {
    /// Load configuration from file and environment, creating defaults if needed.
    ///
    /// A default file is only written for TOML paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read, parsed, or written.
    pub fn load(paths: &AppPaths, dry_run: bool) -> Result<Self> {
        if !paths.config_file.exists()
            && matches!(file_format(&paths.config_file), FileFormat::Toml)
        {
            if dry_run {
                log::info!(
                    "dry-run: would create default config at {}",
                    paths.config_file.display()
                );
            } else {
                write_default_config(&paths.config_file)?;
            }
        }

        Self::load_from_path(&paths.config_file)
    }

    /// Load configuration from a specific path.
    ///
    /// `.yaml` and `.yml` files are read as YAML, anything else as TOML.
    /// Environment variables such as `DTK__DINGTALK__APP_SECRET` override
    /// file values.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed.
    pub fn load_from_path(config_file: &Path) -> Result<Self> {
        let env_prefix = env_prefix();
        let built = Config::builder()
            .set_default("logging.level", "warn")?
            .add_source(
                File::from(config_file)
                    .format(file_format(config_file))
                    .required(false),
            )
            .add_source(Environment::with_prefix(env_prefix.as_str()).separator("__"))
            .build()?;

        let mut config: Self = built.try_deserialize()?;

        if let Some(ref file) = config.logging.file {
            let expanded = expand_path(file)?;
            config.logging.file = Some(expanded.display().to_string());
        }

        Ok(config)
    }

    /// Application credentials.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::Config`] if the app key or secret is empty.
    pub fn credentials(&self) -> std::result::Result<Credentials, DingTalkError> {
        if self.dingtalk.app_key.trim().is_empty() {
            return Err(DingTalkError::Config("dingtalk.app_key is not set".to_string()));
        }
        if self.dingtalk.app_secret.trim().is_empty() {
            return Err(DingTalkError::Config(
                "dingtalk.app_secret is not set".to_string(),
            ));
        }
        Ok(Credentials::new(
            self.dingtalk.app_key.trim(),
            self.dingtalk.app_secret.trim(),
        ))
    }

    /// Agent ID of the sending application.
    ///
    /// # Errors
    ///
    /// Returns [`DingTalkError::Config`] if the agent ID is not a positive number.
    pub fn agent_id(&self) -> std::result::Result<i64, DingTalkError> {
        if self.dingtalk.agent_id <= 0 {
            return Err(DingTalkError::Config(
                "dingtalk.agent_id is not set".to_string(),
            ));
        }
        Ok(self.dingtalk.agent_id)
    }
}

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => FileFormat::Yaml,
        _ => FileFormat::Toml,
    }
}

/// DingTalk application settings.
#[derive(Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "DingTalk application credentials and endpoints")]
pub struct DingTalkConfig {
    /// Application key (AppKey).
    pub app_key: String,

    /// Application secret (AppSecret).
    pub app_secret: String,

    /// Agent ID of the application that sends work notifications.
    pub agent_id: i64,

    /// Base URL for the v1.0 API (token and contact search).
    #[schemars(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Base URL for the legacy API (message send).
    #[schemars(default = "default_oapi_base_url")]
    pub oapi_base_url: String,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_oapi_base_url() -> String {
    DEFAULT_OAPI_BASE_URL.to_string()
}

impl Default for DingTalkConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            agent_id: 0,
            api_base_url: default_api_base_url(),
            oapi_base_url: default_oapi_base_url(),
        }
    }
}

impl std::fmt::Debug for DingTalkConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DingTalkConfig")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .field("api_base_url", &self.api_base_url)
            .field("oapi_base_url", &self.oapi_base_url)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Logging configuration")]
pub struct LoggingConfig {
    /// Log level when no verbosity flags are given (error, warn, info, debug, trace).
    #[schemars(default = "default_log_level")]
    pub level: LogLevel,

    /// Optional path for log file output. Supports ~ and environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Log level enumeration for schema validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only emit error-level messages.
    Error,
    /// Emit warnings and errors (default).
    #[default]
    Warn,
    /// Emit informational messages and above.
    Info,
    /// Emit debug diagnostics and above.
    Debug,
    /// Emit all messages including fine-grained traces.
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warn => write!(f, "warn"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::Error,
            LogLevel::Warn => Self::Warn,
            LogLevel::Info => Self::Info,
            LogLevel::Debug => Self::Debug,
            LogLevel::Trace => Self::Trace,
        }
    }
}

const fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

/// Runtime behavior configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
#[schemars(description = "Runtime behavior configuration")]
pub struct RuntimeConfig {
    /// HTTP request timeout in seconds. Uses the transport default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_point_at_public_hosts() {
        let config = AppConfig::default();
        assert_eq!(config.dingtalk.api_base_url, "https://api.dingtalk.com");
        assert_eq!(config.dingtalk.oapi_base_url, "https://oapi.dingtalk.com");
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.runtime.timeout.is_none());
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[dingtalk]
app_key = "ding-key"
app_secret = "ding-secret"
agent_id = 3000123

[logging]
level = "debug"

[runtime]
timeout = 15
"#,
        )
        .expect("write config");

        let config = AppConfig::load_from_path(&path).expect("load");
        let creds = config.credentials().expect("credentials");
        assert_eq!(creds.app_key, "ding-key");
        assert_eq!(creds.app_secret, "ding-secret");
        assert_eq!(config.agent_id().expect("agent id"), 3_000_123);
        assert_eq!(config.dingtalk.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.runtime.timeout, Some(15));
    }

    #[test]
    fn loads_yaml_file_with_legacy_section_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "dingding:\n  app_key: yaml-key\n  app_secret: yaml-secret\n  agent_id: 42\n",
        )
        .expect("write config");

        let config = AppConfig::load_from_path(&path).expect("load");
        assert_eq!(config.credentials().expect("credentials").app_key, "yaml-key");
        assert_eq!(config.agent_id().expect("agent id"), 42);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load_from_path(&dir.path().join("absent.toml")).expect("load");
        assert!(matches!(config.credentials(), Err(DingTalkError::Config(_))));
        assert!(matches!(config.agent_id(), Err(DingTalkError::Config(_))));
    }

    #[test]
    fn load_writes_default_toml_but_not_yaml() {
        let dir = tempfile::tempdir().expect("tempdir");

        let toml_paths = AppPaths {
            config_file: dir.path().join("dtk").join("config.toml"),
        };
        AppConfig::load(&toml_paths, false).expect("load toml");
        assert!(toml_paths.config_file.exists());

        let yaml_paths = AppPaths {
            config_file: dir.path().join("config.yaml"),
        };
        AppConfig::load(&yaml_paths, false).expect("load yaml");
        assert!(!yaml_paths.config_file.exists());
    }

    #[test]
    fn secret_is_not_debug_printed() {
        let mut config = AppConfig::default();
        config.dingtalk.app_secret = "hunter2".to_string();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
