//! Loader limits.

use groupscript_core::BYTECODE_VERSION;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Limits applied when loading a script.
///
/// Missing JSON keys fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluatorConfig {
    /// Deepest action nesting accepted, counting the main action as level 1.
    pub max_depth: usize,
    /// Highest bytecode version accepted. Never above [`BYTECODE_VERSION`].
    pub max_version: u16,
}

impl EvaluatorConfig {
    pub const DEFAULT_MAX_DEPTH: usize = groupscript_core::DEFAULT_MAX_DEPTH;

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EvaluatorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::Invalid {
                message: "max_depth must be at least 1".to_owned(),
            });
        }
        if self.max_version == 0 || self.max_version > BYTECODE_VERSION {
            return Err(ConfigError::Invalid {
                message: format!(
                    "max_version must be between 1 and {}, got {}",
                    BYTECODE_VERSION, self.max_version
                ),
            });
        }
        Ok(())
    }

    /// The version ceiling actually enforced by the decoder.
    pub(crate) fn supported_version(&self) -> u16 {
        self.max_version.min(BYTECODE_VERSION)
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_version: BYTECODE_VERSION,
        }
    }
}
