//! Runtime configuration

use serde::{Deserialize, Serialize};

/// Options controlling runtime behaviour
///
/// Options can be built in code or loaded from TOML:
///
/// ```toml
/// checked_mode = false
/// microtask_budget = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    /// Enable implicit type checks (`check`, field stores, return values)
    pub checked_mode: bool,

    /// Maximum microtasks a single `run_until_idle` may execute
    pub microtask_budget: Option<usize>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            checked_mode: true,
            microtask_budget: None,
        }
    }
}

impl RuntimeOptions {
    /// Options with implicit checks disabled
    pub fn production() -> Self {
        Self {
            checked_mode: false,
            ..Self::default()
        }
    }

    /// Set the microtask budget
    pub fn with_microtask_budget(mut self, budget: usize) -> Self {
        self.microtask_budget = Some(budget);
        self
    }

    /// Parse options from a TOML document; missing keys take their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, OptionsError> {
        Ok(toml::from_str(source)?)
    }
}

/// Error loading runtime options
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// The TOML document was malformed or had wrongly typed keys
    #[error("Invalid runtime options: {0}")]
    Parse(#[from] toml::de::Error),
}
