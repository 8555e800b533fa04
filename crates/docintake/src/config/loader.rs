use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::{Config, ParserConfig};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

/// On-disk encoding of a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    /// `.yaml`/`.yml` are YAML, everything else is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }
}

/// Default location: `<platform config dir>/docintake/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("docintake").join("config.yaml"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_config(&content, ConfigFormat::from_path(path))
}

pub fn parse_config(content: &str, format: ConfigFormat) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = match format {
        ConfigFormat::Json => serde_json::from_str(content)?,
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
    };

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let mut category_ids = HashSet::new();
    for policy in &config.categories {
        if policy.category_id.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "Category id must not be empty".to_string(),
            });
        }
        if !category_ids.insert(policy.category_id.as_str()) {
            return Err(ConfigError::Validation {
                message: format!("Duplicate category id: {}", policy.category_id),
            });
        }
        if policy.max_tasks == 0 {
            return Err(ConfigError::Validation {
                message: format!("Category '{}' must allow at least one task", policy.category_id),
            });
        }
        if policy.confidence_threshold > 100 {
            return Err(ConfigError::Validation {
                message: format!(
                    "Category '{}' confidence threshold {} exceeds 100",
                    policy.category_id, policy.confidence_threshold
                ),
            });
        }
        if policy
            .accepted_extensions
            .iter()
            .all(|ext| ext.trim_start_matches('.').is_empty())
        {
            return Err(ConfigError::Validation {
                message: format!(
                    "Category '{}' must accept at least one extension",
                    policy.category_id
                ),
            });
        }
    }

    if let Some(ParserConfig::Pattern { profiles }) = &config.parser {
        for profile in profiles {
            for field in &profile.fields {
                if let Err(e) = regex::Regex::new(&field.pattern) {
                    return Err(ConfigError::InvalidPattern {
                        name: field.name.clone(),
                        reason: e.to_string(),
                    });
                }

                if !field.pattern.contains(&format!("?P<{}>", field.name))
                    && !field.pattern.contains(&format!("?<{}>", field.name))
                {
                    return Err(ConfigError::InvalidPattern {
                        name: field.name.clone(),
                        reason: format!(
                            "Pattern must contain named capture group '?P<{}>' or '?<{}>'",
                            field.name, field.name
                        ),
                    });
                }
            }
        }
    }

    Ok(())
}
