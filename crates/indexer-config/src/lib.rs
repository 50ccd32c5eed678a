//! Configuration models and layered config resolution for the indexer service.
//!
//! This crate owns the indexer config schema, the file and environment
//! sources it is read from, and the validation pass that turns the merged
//! sources into an immutable, fully-typed [`ResolvedConfig`].

mod error;
mod loader;
mod model;

/// Aggregated error and the individual violations it carries.
pub use error::{ConfigError, Origin, Violation};
/// Sources, options, and the resolved result.
pub use loader::{
    ConfigLayer, ConfigSchema, ConfigSource, DEFAULT_ENV_PREFIX, ENV_PATH_SEPARATOR, EnvSource,
    FieldKind, FieldSpec, FileSource, LayerKind, ResolveOptions, ResolvedConfig,
};
/// Configuration schema models.
pub use model::*;
