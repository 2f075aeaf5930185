//! JSON schema and example config for `AppConfig`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use schemars::generate::SchemaSettings;
use serde_json::{Value, json};

use crate::config::AppConfig;

/// Generated schema filename.
pub const SCHEMA_FILENAME: &str = "config.schema.json";

/// Generated config filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Draft-07 JSON schema for the config file, with `$id` under `repo_url`.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn generate_schema(project_name: &str, repo_url: &str) -> Result<String> {
    let mut schema = SchemaSettings::draft07()
        .into_generator()
        .into_root_schema_for::<AppConfig>();

    schema.insert(
        "$id".to_string(),
        json!(format!("{repo_url}/schemas/{SCHEMA_FILENAME}")),
    );
    schema.insert("title".to_string(), json!(format!("{project_name} configuration")));
    schema.insert(
        "description".to_string(),
        json!(format!("DingTalk app credentials and CLI settings for {project_name}")),
    );
    // editors send `$schema` back in the file
    if let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) {
        properties.insert(
            "$schema".to_string(),
            json!({
                "type": "string",
                "description": "JSON Schema reference for editor support"
            }),
        );
    }

    serde_json::to_string_pretty(&schema).context("serializing JSON schema")
}

/// Example TOML config holding the defaults.
///
/// # Errors
///
/// Returns an error if TOML serialization fails.
pub fn generate_example_config(project_name: &str) -> Result<String> {
    let defaults = toml::to_string_pretty(&AppConfig::default())
        .context("serializing default config to TOML")?;
    Ok(format!(
        "# Example configuration for {project_name}.\n\
         # Copy to $XDG_CONFIG_HOME/{project_name}/{CONFIG_FILENAME}. \
         Environment variables such as DTK__DINGTALK__APP_SECRET override it.\n\n\
         {defaults}"
    ))
}

/// Write the schema and the example config into `output_dir`.
///
/// # Errors
///
/// Returns an error if generation, directory creation or writing fails.
pub fn write_generated_files(output_dir: &Path, project_name: &str, repo_url: &str) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory: {}", output_dir.display()))?;

    let files = [
        (SCHEMA_FILENAME, generate_schema(project_name, repo_url)?),
        (CONFIG_FILENAME, generate_example_config(project_name)?),
    ];
    for (name, contents) in files {
        let path = output_dir.join(name);
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}
