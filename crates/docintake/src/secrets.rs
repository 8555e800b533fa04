//! Bearer token resolution for the HTTP parser.
//!
//! A token may be given inline, read from a file (Docker secrets), or taken
//! from an environment variable. The first non-empty source wins, in that order.

use std::fs;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Failed to read token file '{path}': {source}")]
    FileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// The three places a token may come from. Empty strings count as absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretSources<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> SecretSources<'a> {
    pub fn new(direct: Option<&'a str>, file: Option<&'a str>, env_var: Option<&'a str>) -> Self {
        Self {
            direct: non_empty(direct),
            file: non_empty(file),
            env_var: non_empty(env_var),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.direct.is_none() && self.file.is_none() && self.env_var.is_none()
    }

    /// Resolves the first configured source. `Ok(None)` when nothing is configured.
    pub fn resolve(&self) -> Result<Option<SecretString>, SecretError> {
        if let Some(value) = self.direct {
            return Ok(Some(SecretString::from(value.to_string())));
        }

        if let Some(path) = self.file {
            let expanded = expand_home(path);
            let content = fs::read_to_string(&expanded).map_err(|source| SecretError::FileRead {
                path: expanded.clone(),
                source,
            })?;
            return Ok(Some(SecretString::from(content.trim().to_string())));
        }

        if let Some(name) = self.env_var {
            return match std::env::var(name) {
                Ok(value) => Ok(Some(SecretString::from(value.trim().to_string()))),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: name.to_string(),
                }),
            };
        }

        Ok(None)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// Expands a leading `~` or `~/`. `~user` is left untouched.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
