// Compiler configuration: defaults, environment overrides.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WARNINGS_AS_ERRORS_ENV: &str = "SNIPPET_WARNINGS_AS_ERRORS";
pub const ESCALATE_ENV: &str = "SNIPPET_ESCALATE";
pub const MAX_CALL_DEPTH_ENV: &str = "SNIPPET_MAX_CALL_DEPTH";

pub const DEFAULT_MAX_CALL_DEPTH: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Treat every warning as an error.
    pub warnings_as_errors: bool,
    /// Warning codes treated as errors, e.g. `SN0168`.
    pub escalated_warnings: Vec<String>,
    /// Nested snippet calls allowed before a runtime fault.
    pub max_call_depth: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            warnings_as_errors: false,
            escalated_warnings: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

impl CompilerConfig {
    /// Defaults overridden by `SNIPPET_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `SNIPPET_*` key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(WARNINGS_AS_ERRORS_ENV) {
            config.warnings_as_errors = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: WARNINGS_AS_ERRORS_ENV,
                        value,
                    });
                }
            };
        }

        if let Some(value) = lookup(ESCALATE_ENV) {
            config.escalated_warnings = value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = lookup(MAX_CALL_DEPTH_ENV) {
            config.max_call_depth = value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|depth| *depth > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: MAX_CALL_DEPTH_ENV,
                    value,
                })?;
        }

        Ok(config)
    }

    /// Whether a warning with `code` fails the compilation.
    pub fn escalates(&self, code: &str) -> bool {
        self.warnings_as_errors || self.escalated_warnings.iter().any(|c| c == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(CompilerConfig::from_lookup(lookup(&[])).unwrap(), CompilerConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = CompilerConfig::from_lookup(lookup(&[
            (ESCALATE_ENV, "SN0168, SN0162"),
            (MAX_CALL_DEPTH_ENV, "32"),
        ]))
        .unwrap();
        assert_eq!(config.escalated_warnings, vec!["SN0168", "SN0162"]);
        assert_eq!(config.max_call_depth, 32);
        assert!(config.escalates("SN0168"));
        assert!(!config.escalates("SN0001"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = CompilerConfig::from_lookup(lookup(&[(MAX_CALL_DEPTH_ENV, "0")])).unwrap_err();
        assert_eq!(err.to_string(), "invalid value '0' for SNIPPET_MAX_CALL_DEPTH");
        assert!(CompilerConfig::from_lookup(lookup(&[(WARNINGS_AS_ERRORS_ENV, "maybe")])).is_err());
    }
}
