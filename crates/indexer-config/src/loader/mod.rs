//! Layered configuration resolver.
//!
//! Reads TOML files in order, overlays prefixed environment variables, checks
//! the merged tree against the schema, and produces an immutable
//! `ResolvedConfig`. Every problem found along the way is collected into one
//! `ConfigError`.

mod env;
mod merge;
mod schema;
mod source;


pub use schema::{ConfigSchema, FieldKind, FieldSpec};
pub use source::{ConfigSource, EnvSource, FileSource};

use crate::{ConfigError, IndexerConfig, Origin, Violation};
use env::EnvSkip;
use log::{debug, info, warn};
use merge::Provenance;
use serde_json::Value;
use source::FileRead;
use std::net::SocketAddr;
use std::ops::Deref;
use std::path::{Path, PathBuf};

/// Default prefix for environment overrides.
pub const DEFAULT_ENV_PREFIX: &str = "INDEXER_";
/// Delimiter between path segments in environment variable names.
pub const ENV_PATH_SEPARATOR: &str = "__";

/// Kind of input a layer was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    File,
    Inline,
    Env,
}

/// Metadata about one source considered during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub kind: LayerKind,
    /// File path, for file layers.
    pub path: Option<PathBuf>,
    /// Variable prefix, for env layers.
    pub env_prefix: Option<String>,
    /// Number of leaf values the layer set.
    pub keys_applied: usize,
    /// Reason the layer contributed nothing, if it was skipped.
    pub skipped_reason: Option<String>,
}

/// Ordered list of sources to resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub sources: Vec<ConfigSource>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file that must exist.
    pub fn with_file(self, path: impl AsRef<Path>) -> Self {
        self.with_source(ConfigSource::File(FileSource::required(path)))
    }

    /// Append a file that is skipped when absent.
    pub fn with_optional_file(self, path: impl AsRef<Path>) -> Self {
        self.with_source(ConfigSource::File(FileSource::optional(path)))
    }

    /// Append the process environment filtered by `prefix`.
    pub fn with_env(self, prefix: impl Into<String>) -> Self {
        self.with_source(ConfigSource::Env(EnvSource::new(prefix)))
    }

    /// Append any source.
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }
}

/// Validated config plus where each value came from. Read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    config: IndexerConfig,
    layers: Vec<ConfigLayer>,
    provenance: Provenance,
}

impl ResolvedConfig {
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Every source considered, in application order.
    pub fn layers(&self) -> &[ConfigLayer] {
        &self.layers
    }

    /// Source that set the value at a dotted path. `None` for values that
    /// came from defaults.
    pub fn origin(&self, path: &str) -> Option<&Origin> {
        self.provenance.get(path)
    }

    pub fn into_inner(self) -> IndexerConfig {
        self.config
    }
}

impl Deref for ResolvedConfig {
    type Target = IndexerConfig;

    fn deref(&self) -> &Self::Target {
        &self.config
    }
}

impl IndexerConfig {
    /// Resolve config from required TOML files, applied in order, followed
    /// by environment variables carrying `env_prefix`.
    pub fn load<P: AsRef<Path>>(
        file_sources: &[P],
        env_prefix: &str,
    ) -> Result<ResolvedConfig, ConfigError> {
        let options = file_sources
            .iter()
            .fold(ResolveOptions::new(), |options, path| options.with_file(path))
            .with_env(env_prefix);
        Self::load_with_options(options)
    }

    /// Resolve config from an explicit list of sources.
    pub fn load_with_options(options: ResolveOptions) -> Result<ResolvedConfig, ConfigError> {
        info!("resolving config (sources={})", options.sources.len());
        let schema = ConfigSchema::INDEXER;
        let mut resolution = Resolution::default();
        for source in &options.sources {
            match source {
                ConfigSource::File(file) => resolution.apply_file(file),
                ConfigSource::Env(env_source) => resolution.apply_env(env_source, &schema),
            }
        }
        resolution.finish(&schema)
    }

    /// Resolve a single in-memory TOML document, without env overrides.
    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("resolving config from raw contents (len={})", contents.len());
        let schema = ConfigSchema::INDEXER;
        let mut resolution = Resolution::default();
        resolution.apply_inline(contents);
        resolution.finish(&schema).map(ResolvedConfig::into_inner)
    }

    /// Check invariants that cannot be expressed as field types.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = Vec::new();
        let mut invalid = |path: &str, message: String| {
            violations.push(Violation::InvalidValue {
                path: path.to_string(),
                message,
            });
        };

        if let Err(err) = self.service.host_and_port.parse::<SocketAddr>() {
            invalid(
                "service.host_and_port",
                format!("not a socket address: {err}"),
            );
        }
        if !self.service.url_prefix.starts_with('/') {
            invalid("service.url_prefix", "must start with `/`".to_string());
        }
        for (path, url) in [
            ("graph_node.query_url", &self.graph_node.query_url),
            ("graph_node.status_url", &self.graph_node.status_url),
            (
                "subgraphs.network.query_url",
                &self.subgraphs.network.query_url,
            ),
            (
                "subgraphs.escrow.query_url",
                &self.subgraphs.escrow.query_url,
            ),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                invalid(path, "must be an http:// or https:// URL".to_string());
            }
        }
        for (path, secs) in [
            (
                "subgraphs.network.syncing_interval_secs",
                self.subgraphs.network.syncing_interval_secs,
            ),
            (
                "subgraphs.escrow.syncing_interval_secs",
                self.subgraphs.escrow.syncing_interval_secs,
            ),
        ] {
            if secs == 0 {
                invalid(path, "must be greater than zero".to_string());
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::new(violations))
        }
    }
}

/// Accumulating state of one resolution.
#[derive(Debug)]
struct Resolution {
    merged: Value,
    provenance: Provenance,
    layers: Vec<ConfigLayer>,
    violations: Vec<Violation>,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            merged: Value::Object(serde_json::Map::new()),
            provenance: Provenance::default(),
            layers: Vec::new(),
            violations: Vec::new(),
        }
    }
}

impl Resolution {
    fn apply_file(&mut self, file: &FileSource) {
        let mut layer = ConfigLayer {
            kind: LayerKind::File,
            path: Some(file.path().to_path_buf()),
            env_prefix: None,
            keys_applied: 0,
            skipped_reason: None,
        };
        match source::read_file(file) {
            FileRead::Loaded(value) => {
                layer.keys_applied = merge::count_leaves(&value);
                self.overlay(&value, &Origin::File(file.path().to_path_buf()));
                debug!(
                    "loaded file layer (path={}, keys={})",
                    file.path().display(),
                    layer.keys_applied
                );
            }
            FileRead::Absent => {
                layer.skipped_reason = Some("file not found".to_string());
            }
            FileRead::Failed(violation) => {
                // Keep going so later sources still report their problems.
                debug!("file layer failed (path={})", file.path().display());
                layer.skipped_reason = Some("malformed".to_string());
                self.violations.push(violation);
            }
        }
        self.layers.push(layer);
    }

    fn apply_inline(&mut self, contents: &str) {
        let mut layer = ConfigLayer {
            kind: LayerKind::Inline,
            path: None,
            env_prefix: None,
            keys_applied: 0,
            skipped_reason: None,
        };
        match source::parse_toml(contents, &Origin::Inline) {
            Ok(value) => {
                layer.keys_applied = merge::count_leaves(&value);
                self.overlay(&value, &Origin::Inline);
            }
            Err(violation) => {
                layer.skipped_reason = Some("malformed".to_string());
                self.violations.push(violation);
            }
        }
        self.layers.push(layer);
    }

    fn apply_env(&mut self, env_source: &EnvSource, schema: &ConfigSchema) {
        let mut applied = 0;
        let snapshot = env_source.snapshot();
        for name in snapshot.non_unicode {
            if env::env_path(&name, env_source.prefix()).is_none() {
                continue;
            }
            self.violations.push(Violation::MalformedSource {
                origin: Origin::Env(name),
                message: "variable is not valid unicode".to_string(),
            });
        }
        for (name, raw) in snapshot.vars {
            let spec = match env::env_path(&name, env_source.prefix()) {
                Some(Ok(segments)) => env::env_field(schema, &segments),
                Some(Err(skip)) => Err(skip),
                None => continue,
            };
            let spec = match spec {
                Ok(spec) => spec,
                Err(skip) => {
                    log_env_skip(&name, &skip);
                    continue;
                }
            };
            let segments: Vec<String> = spec.path.split('.').map(str::to_string).collect();
            let value = merge::nest(&segments, env::coerce(&raw, spec.kind));
            self.overlay(&value, &Origin::Env(name.clone()));
            debug!("applied env override (var={name}, path={})", spec.path);
            applied += 1;
        }
        self.layers.push(ConfigLayer {
            kind: LayerKind::Env,
            path: None,
            env_prefix: Some(env_source.prefix().to_string()),
            keys_applied: applied,
            skipped_reason: None,
        });
    }

    fn overlay(&mut self, value: &Value, origin: &Origin) {
        merge::merge_layer(&mut self.merged, value, "", origin, &mut self.provenance);
    }

    fn finish(mut self, schema: &ConfigSchema) -> Result<ResolvedConfig, ConfigError> {
        self.violations
            .extend(schema.validate(&self.merged, &self.provenance));
        if !self.violations.is_empty() {
            warn!(
                "config resolution failed (problems={})",
                self.violations.len()
            );
            return Err(ConfigError::new(self.violations));
        }

        let config: IndexerConfig = serde_json::from_value(self.merged).map_err(|err| {
            ConfigError::new(vec![Violation::InvalidValue {
                path: "root".to_string(),
                message: format!("failed to decode: {err}"),
            }])
        })?;
        config.validate()?;

        info!("config resolved (layers={})", self.layers.len());
        Ok(ResolvedConfig {
            config,
            layers: self.layers,
            provenance: self.provenance,
        })
    }
}

fn log_env_skip(name: &str, skip: &EnvSkip) {
    match skip {
        EnvSkip::EmptyName => {
            warn!("ignoring env var with nothing after prefix (var={name})");
        }
        EnvSkip::EmptySegment => {
            warn!("ignoring env var with empty path segment (var={name})");
        }
        EnvSkip::Table(path) => {
            warn!("ignoring env var naming a table (var={name}, path={path})");
        }
        EnvSkip::Unknown(path) => {
            warn!("ignoring env var for unknown field (var={name}, path={path})");
        }
    }
}
