//! Error types for config resolution and validation.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where a config value, or a problem with one, came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// A TOML file on disk.
    File(PathBuf),
    /// An in-memory TOML document.
    Inline,
    /// A single environment variable, by name.
    Env(String),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::File(path) => write!(f, "file {}", path.display()),
            Origin::Inline => f.write_str("inline config"),
            Origin::Env(name) => write!(f, "env {name}"),
        }
    }
}

/// A single problem found while resolving config.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    /// A required field was absent after all sources were merged.
    #[error("missing required field `{path}`")]
    MissingRequiredField { path: String },
    /// A field was present with the wrong type.
    #[error("type mismatch at `{path}` (from {origin}): expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: String,
        found: String,
        origin: Origin,
    },
    /// A source could not be read or parsed.
    #[error("malformed source ({origin}): {message}")]
    MalformedSource { origin: Origin, message: String },
    /// A file declared a key the schema does not know.
    #[error("unknown field `{path}` (from {origin})")]
    UnknownField { path: String, origin: Origin },
    /// A field had the right type but an unusable value.
    #[error("invalid value at `{path}`: {message}")]
    InvalidValue { path: String, message: String },
}

impl Violation {
    /// Dotted key path the violation refers to, if it is about a single field.
    pub fn path(&self) -> Option<&str> {
        match self {
            Violation::MissingRequiredField { path }
            | Violation::TypeMismatch { path, .. }
            | Violation::UnknownField { path, .. }
            | Violation::InvalidValue { path, .. } => Some(path),
            Violation::MalformedSource { .. } => None,
        }
    }
}

/// Every violation found during one resolution, reported together.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid configuration ({} problem(s)):{}", .violations.len(), render_list(.violations))]
pub struct ConfigError {
    violations: Vec<Violation>,
}

impl ConfigError {
    pub(crate) fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// The violations, in the order they were found.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Consume the error and return its violations.
    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

fn render_list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("\n  - {violation}"))
        .collect()
}
