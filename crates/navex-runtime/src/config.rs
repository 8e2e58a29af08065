//! Evaluator settings

use serde::{Deserialize, Serialize};

/// Default maximum evaluation depth
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Evaluator settings. Every field has a default, so hosts can deserialize a
/// partial document (e.g. `{"max_depth": 64}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Nesting depth at which evaluation fails with a stack overflow error
    pub max_depth: usize,
    /// Variable name that always reads and writes the context root
    pub root_variable: String,
    /// Variable name that always reads the current target
    pub this_variable: String,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            root_variable: "root".to_string(),
            this_variable: "this".to_string(),
        }
    }
}

impl EvaluatorConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_root_variable(mut self, name: impl Into<String>) -> Self {
        self.root_variable = name.into();
        self
    }

    pub fn with_this_variable(mut self, name: impl Into<String>) -> Self {
        self.this_variable = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: EvaluatorConfig = serde_json::from_str(r#"{"max_depth": 64}"#).unwrap();
        assert_eq!(config.max_depth, 64);
        assert_eq!(config.root_variable, "root");
        assert_eq!(config.this_variable, "this");
    }
}
