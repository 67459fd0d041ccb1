//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration read when operations are dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Rewrite risky operations into safe phase sequences.
    pub safe_by_default: bool,

    /// Table names are plural (`user` reference → `users` table).
    pub pluralize_table_names: bool,
}

impl SafetyConfig {
    /// Create a configuration with safe-by-default off.
    pub fn new() -> Self {
        Self {
            safe_by_default: false,
            pluralize_table_names: true,
        }
    }

    /// Turn safe-by-default rewriting on or off.
    pub fn with_safe_by_default(mut self, enabled: bool) -> Self {
        self.safe_by_default = enabled;
        self
    }

    /// Set the table naming convention.
    pub fn with_pluralize_table_names(mut self, pluralize: bool) -> Self {
        self.pluralize_table_names = pluralize;
        self
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self::new()
    }
}
