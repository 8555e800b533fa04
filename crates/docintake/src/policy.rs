//! Per-category admission policy lookup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{CategoryPolicy, Config};
use crate::error::ConfigError;

/// Supplies the policy for a category.
///
/// An unknown category is a configuration error, never a per-file rejection.
pub trait PolicySource: Send + Sync {
    fn get_policy(&self, category_id: &str) -> Result<Arc<CategoryPolicy>, ConfigError>;
}

/// Read-only registry loaded once from configuration.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<CategoryPolicy>>,
}

impl PolicyRegistry {
    pub fn new(policies: Vec<CategoryPolicy>) -> Self {
        let policies = policies
            .into_iter()
            .map(|policy| (policy.category_id.clone(), Arc::new(policy)))
            .collect();
        Self { policies }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.categories.clone())
    }

    /// Registered category ids, sorted.
    pub fn categories(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl PolicySource for PolicyRegistry {
    fn get_policy(&self, category_id: &str) -> Result<Arc<CategoryPolicy>, ConfigError> {
        self.policies
            .get(category_id)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownCategory(category_id.to_string()))
    }
}
