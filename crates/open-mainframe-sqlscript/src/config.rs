//! Script dialect configuration — directive marker, terminator, quoting and comment rules.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a [`ScriptConfig`].
#[derive(Debug, Error, miette::Diagnostic)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// The TOML content is malformed.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Lexical settings for splitting a script into statements and directives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
    /// Marker that introduces a directive line (`--if`, `--try`, ...).
    #[serde(default = "default_marker")]
    pub directive_marker: String,
    /// Statement terminator.
    #[serde(default = "default_terminator")]
    pub terminator: char,
    /// Whether `/* */` comments nest.
    #[serde(default = "default_true")]
    pub nested_comments: bool,
    /// Whether `"` opens a quoted literal (identifier quoting).
    #[serde(default = "default_true")]
    pub double_quoted_literals: bool,
    /// Whether `if`/`elseif` without an expression is rejected.
    #[serde(default = "default_true")]
    pub require_conditions: bool,
}

impl ScriptConfig {
    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Set the directive marker.
    pub fn with_marker(mut self, marker: &str) -> Self {
        self.directive_marker = marker.to_string();
        self
    }

    /// Set the statement terminator.
    pub fn with_terminator(mut self, terminator: char) -> Self {
        self.terminator = terminator;
        self
    }

    /// Enable or disable nested block comments.
    pub fn with_nested_comments(mut self, nested: bool) -> Self {
        self.nested_comments = nested;
        self
    }

    /// Enable or disable `"` literals.
    pub fn with_double_quoted_literals(mut self, enabled: bool) -> Self {
        self.double_quoted_literals = enabled;
        self
    }

    /// Check that the marker and terminator cannot be confused with each other or with quoting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directive_marker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "directive_marker".into(),
                reason: "must not be empty".into(),
            });
        }
        if self.directive_marker.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue {
                field: "directive_marker".into(),
                reason: "must not contain whitespace".into(),
            });
        }
        if self.terminator.is_whitespace() || matches!(self.terminator, '\'' | '"') {
            return Err(ConfigError::InvalidValue {
                field: "terminator".into(),
                reason: format!("'{}' cannot terminate statements", self.terminator),
            });
        }
        if self.directive_marker.contains(self.terminator) {
            return Err(ConfigError::InvalidValue {
                field: "directive_marker".into(),
                reason: "must not contain the terminator".into(),
            });
        }
        Ok(())
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            directive_marker: default_marker(),
            terminator: default_terminator(),
            nested_comments: true,
            double_quoted_literals: true,
            require_conditions: true,
        }
    }
}

fn default_marker() -> String {
    "--".to_string()
}

fn default_terminator() -> char {
    ';'
}

fn default_true() -> bool {
    true
}
