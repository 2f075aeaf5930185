//! Core library for dtk - DingTalk work notifications from Rust.
//!
//! This crate provides:
//! - Configuration loading and management
//! - XDG-compliant path resolution
//! - Schema and example config generation
//! - DingTalk API client with a cached access token
//! - Typed work notification messages
//! - Common error types

pub mod config;
pub mod dingtalk;
pub mod error;
pub mod paths;
pub mod schema;

pub use config::{AppConfig, DingTalkConfig, LogLevel, LoggingConfig, RuntimeConfig};
pub use dingtalk::{
    Credentials, DingTalkClient, Endpoints, Message, Recipients, SearchQuery, SearchResult,
    SendReceipt, SendRequest, TokenCache,
};
pub use error::{ApiError, DingTalkError, Result};
pub use paths::{AppPaths, default_config_dir};
pub use schema::{generate_example_config, generate_schema, write_generated_files};

/// Application name used for config directories and environment prefix.
pub const APP_NAME: &str = "dtk";

/// Returns the environment variable prefix for this application.
#[must_use]
pub fn env_prefix() -> String {
    APP_NAME
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
