//! Config sources and reading them into value trees.

use crate::{Origin, Violation};
use log::debug;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One layer of configuration input. Later sources override earlier ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// A TOML file.
    File(FileSource),
    /// Environment variables carrying a prefix.
    Env(EnvSource),
}

/// A TOML file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    path: PathBuf,
    required: bool,
}

impl FileSource {
    /// A file that must exist.
    pub fn required(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: true,
        }
    }

    /// A file that is skipped when absent.
    pub fn optional(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            required: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Environment variables whose names start with `prefix`.
///
/// Reads the process environment unless a fixed variable set was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSource {
    prefix: String,
    vars: Option<BTreeMap<String, String>>,
}

impl EnvSource {
    /// Read from the process environment at resolution time.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            vars: None,
        }
    }

    /// Read from a fixed set of variables instead of the process environment.
    pub fn with_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            vars: Some(
                vars.into_iter()
                    .map(|(key, value)| (key.into(), value.into()))
                    .collect(),
            ),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Variables carrying the prefix, sorted by name. Prefixed variables
    /// whose name or value is not valid unicode are returned separately so
    /// they can be reported.
    pub(super) fn snapshot(&self) -> EnvSnapshot {
        let matches = |name: &str| name.starts_with(&self.prefix);
        let mut snapshot = EnvSnapshot::default();
        match &self.vars {
            Some(vars) => {
                snapshot.vars = vars
                    .iter()
                    .filter(|(name, _)| matches(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
            }
            None => {
                for (name, value) in std::env::vars_os() {
                    match (name.into_string(), value.into_string()) {
                        (Ok(name), Ok(value)) if matches(&name) => {
                            snapshot.vars.insert(name, value);
                        }
                        (Ok(_), Ok(_)) => {}
                        (name, _) => {
                            let name = match name {
                                Ok(name) => name,
                                Err(raw) => raw.to_string_lossy().into_owned(),
                            };
                            if matches(&name) {
                                snapshot.non_unicode.insert(name);
                            }
                        }
                    }
                }
            }
        }
        snapshot
    }
}

/// Prefixed variables read from one env source.
#[derive(Debug, Default)]
pub(super) struct EnvSnapshot {
    pub(super) vars: BTreeMap<String, String>,
    /// Names (lossily decoded) of prefixed variables that are not unicode.
    pub(super) non_unicode: BTreeSet<String>,
}

/// Outcome of reading one file source.
#[derive(Debug)]
pub(super) enum FileRead {
    Loaded(Value),
    /// Optional file not present.
    Absent,
    Failed(Violation),
}

/// Read and parse a file source.
pub(super) fn read_file(source: &FileSource) -> FileRead {
    let origin = Origin::File(source.path.clone());
    debug!(
        "reading config file (path={}, required={})",
        source.path.display(),
        source.required
    );
    let contents = match fs::read_to_string(&source.path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !source.required => {
            debug!("optional config file missing (path={})", source.path.display());
            return FileRead::Absent;
        }
        Err(err) => {
            return FileRead::Failed(Violation::MalformedSource {
                origin,
                message: format!("failed to read: {err}"),
            });
        }
    };
    match parse_toml(&contents, &origin) {
        Ok(value) => FileRead::Loaded(value),
        Err(violation) => FileRead::Failed(violation),
    }
}

/// Parse a TOML document into a value tree, keeping native types.
pub(super) fn parse_toml(contents: &str, origin: &Origin) -> Result<Value, Violation> {
    let table: toml::Table = toml::from_str(contents).map_err(|err| {
        let message = match err.span() {
            Some(span) => format!(
                "{} (line {})",
                err.message().trim_end(),
                line_of(contents, span.start)
            ),
            None => err.message().trim_end().to_string(),
        };
        Violation::MalformedSource {
            origin: origin.clone(),
            message,
        }
    })?;
    serde_json::to_value(table).map_err(|err| Violation::MalformedSource {
        origin: origin.clone(),
        message: format!("unsupported value: {err}"),
    })
}

/// 1-based line number of a byte offset.
fn line_of(contents: &str, offset: usize) -> usize {
    let end = offset.min(contents.len());
    contents.as_bytes()[..end]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count()
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn parse_keeps_native_types() {
        let value = parse_toml(
            "[service]\nserve_escrow_subgraph = true\n[blockchain]\nchain_id = 1337\n",
            &Origin::Inline,
        )
        .expect("parse");
        assert_eq!(
            value,
            json!({
                "service": { "serve_escrow_subgraph": true },
                "blockchain": { "chain_id": 1337 }
            })
        );
    }

    #[test]
    fn parse_error_names_line() {
        let err = parse_toml("[graph_node]\nquery_url = = 1\n", &Origin::Inline).unwrap_err();
        match err {
            Violation::MalformedSource { origin, message } => {
                assert_eq!(origin, Origin::Inline);
                assert!(message.contains("line 2"), "{message}");
            }
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn optional_missing_file_is_absent() {
        let temp = TempDir::new().expect("tmp");
        let source = FileSource::optional(temp.path().join("override.toml"));
        assert!(matches!(read_file(&source), FileRead::Absent));
    }

    #[test]
    fn required_missing_file_fails() {
        let temp = TempDir::new().expect("tmp");
        let path = temp.path().join("config.toml");
        let source = FileSource::required(&path);
        match read_file(&source) {
            FileRead::Failed(Violation::MalformedSource { origin, message }) => {
                assert_eq!(origin, Origin::File(path));
                assert!(message.starts_with("failed to read"));
            }
            other => panic!("unexpected read: {other:?}"),
        }
    }

    #[test]
    fn env_snapshot_filters_and_sorts() {
        let source = EnvSource::with_vars(
            "INDEXER_",
            [
                ("INDEXER_METRICS__PORT", "1"),
                ("HOME", "/root"),
                ("INDEXER_DATABASE__POSTGRES_URL", "postgres://"),
            ],
        );
        let names: Vec<_> = source.snapshot().vars.into_keys().collect();
        assert_eq!(
            names,
            vec![
                "INDEXER_DATABASE__POSTGRES_URL".to_string(),
                "INDEXER_METRICS__PORT".to_string(),
            ]
        );
    }
}
