//! Effective configuration with provenance
//!
//! Merges built-in defaults, an optional TOML file and CLI flags, records
//! where each layer came from, and produces the typed [`IntegrationConfig`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

/// Default config file name, looked up next to the project file
pub const CONFIG_FILE_NAME: &str = ".mmine.toml";

/// Origin of a configuration source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config source with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    /// File path (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for builtin/cli)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Extension naming and build defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub target_name: String,
    pub directory: String,
    pub group: String,
    pub deployment_target: String,
    pub bundle_id_suffix: String,
}

/// Inputs of one integration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Application code injected into the extension source and the main plist
    pub application_code: String,

    /// Path to the project model file
    pub project: PathBuf,

    /// App group identifier shared by the app and the extension
    pub app_group: String,

    /// Name of the application target
    pub main_target: String,

    /// Cordova packaging mode
    #[serde(default)]
    pub cordova: bool,

    pub swift_version: String,

    pub extension: ExtensionConfig,
}

/// Merged configuration with provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    /// When this config was computed
    pub created_at: DateTime<Utc>,

    /// The merged configuration object
    pub config: Value,

    /// Contributing sources in precedence order
    pub sources: Vec<ConfigSource>,
}

/// Keys whose values are redacted when the configuration is displayed
const SECRET_KEYS: &[&str] = &["application_code"];

impl EffectiveConfig {
    /// Build effective config from layers
    pub fn build(
        config_file: Option<&Path>,
        cli_overrides: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        let mut sources = Vec::new();

        // Layer 1: Built-in defaults
        layers.push(BuiltinDefaults::default().to_value());
        sources.push(ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        });

        // Layer 2: Config file
        if let Some(path) = config_file {
            if path.exists() {
                let (value, digest) = Self::load_toml_file(path)?;
                layers.push(value);
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        // Layer 3: CLI overrides
        if let Some(cli) = cli_overrides {
            layers.push(cli);
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        Ok(Self {
            created_at: Utc::now(),
            config: merge_layers(layers),
            sources,
        })
    }

    /// Deserialize and validate the typed integration inputs
    pub fn integration(&self) -> Result<IntegrationConfig, ConfigError> {
        let config: IntegrationConfig = serde_json::from_value(self.config.clone())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        validate(&config)?;
        Ok(config)
    }

    /// Load and parse a TOML file, returning the value and digest
    fn load_toml_file(path: &Path) -> Result<(Value, String), ConfigError> {
        let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        let contents = String::from_utf8(bytes)
            .map_err(|e| ConfigError::ParseError(format!("Invalid UTF-8: {}", e)))?;

        let toml_value: toml::Value = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        Ok((Self::toml_to_json(toml_value), digest))
    }

    /// Convert TOML Value to JSON Value
    fn toml_to_json(toml: toml::Value) -> Value {
        match toml {
            toml::Value::String(s) => Value::String(s),
            toml::Value::Integer(i) => Value::Number(i.into()),
            toml::Value::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::String(dt.to_string()),
            toml::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Self::toml_to_json).collect())
            }
            toml::Value::Table(table) => Value::Object(
                table
                    .into_iter()
                    .map(|(k, v)| (k, Self::toml_to_json(v)))
                    .collect(),
            ),
        }
    }

    /// The merged config with secrets replaced, plus the redacted key paths
    pub fn redacted(&self) -> (Value, Vec<String>) {
        let mut value = self.config.clone();
        let mut redactions = Vec::new();
        Self::redact_recursive(&mut value, String::new(), &mut redactions);
        (value, redactions)
    }

    fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
        if let Value::Object(map) = value {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let current_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };

                let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));
                if is_secret && !val.is_object() && !val.is_array() {
                    *val = Value::String("[REDACTED]".to_string());
                    redactions.push(current_path);
                } else {
                    Self::redact_recursive(val, current_path, redactions);
                }
            }
        }
    }
}

fn validate(config: &IntegrationConfig) -> Result<(), ConfigError> {
    if config.application_code.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "application_code must not be empty".to_string(),
        ));
    }
    if config.main_target.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "main_target must not be empty".to_string(),
        ));
    }
    if !config.app_group.starts_with("group.") || config.app_group.len() <= "group.".len() {
        return Err(ConfigError::ValidationError(format!(
            "app_group '{}' must look like 'group.<identifier>'",
            config.app_group
        )));
    }
    if config.extension.target_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "extension.target_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
