//! Declarative schema for the indexer config and the validation pass over the
//! merged value tree.

use super::merge::Provenance;
use crate::Violation;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Value type a schema field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Bool,
    /// Non-negative 64-bit integer.
    Integer,
    /// Finite float; integers are accepted too.
    Float,
}

impl FieldKind {
    /// Name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Bool => "bool",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Integer => value.is_u64(),
            FieldKind::Float => value.is_number(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One leaf of the schema, addressed by its dotted path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub path: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Inclusive upper bound for integer fields.
    pub max: Option<u64>,
}

impl FieldSpec {
    const fn required(path: &'static str, kind: FieldKind) -> Self {
        Self {
            path,
            kind,
            required: true,
            max: None,
        }
    }

    const fn optional(path: &'static str, kind: FieldKind) -> Self {
        Self {
            path,
            kind,
            required: false,
            max: None,
        }
    }

    const fn at_most(mut self, max: u64) -> Self {
        self.max = Some(max);
        self
    }
}

const INDEXER_FIELDS: &[FieldSpec] = &[
    FieldSpec::required("indexer.indexer_address", FieldKind::String),
    FieldSpec::required("indexer.operator_mnemonic", FieldKind::String),
    FieldSpec::required("database.postgres_url", FieldKind::String),
    FieldSpec::required("graph_node.query_url", FieldKind::String),
    FieldSpec::required("graph_node.status_url", FieldKind::String),
    FieldSpec::optional("metrics.port", FieldKind::Integer).at_most(u16::MAX as u64),
    FieldSpec::required("subgraphs.network.query_url", FieldKind::String),
    FieldSpec::optional("subgraphs.network.query_auth_token", FieldKind::String),
    FieldSpec::optional("subgraphs.network.deployment_id", FieldKind::String),
    FieldSpec::optional("subgraphs.network.syncing_interval_secs", FieldKind::Integer),
    FieldSpec::optional(
        "subgraphs.network.recently_closed_allocation_buffer_secs",
        FieldKind::Integer,
    ),
    FieldSpec::required("subgraphs.escrow.query_url", FieldKind::String),
    FieldSpec::optional("subgraphs.escrow.query_auth_token", FieldKind::String),
    FieldSpec::required("subgraphs.escrow.deployment_id", FieldKind::String),
    FieldSpec::optional("subgraphs.escrow.syncing_interval_secs", FieldKind::Integer),
    FieldSpec::required("blockchain.chain_id", FieldKind::Integer),
    FieldSpec::required("blockchain.receipts_verifier_address", FieldKind::String),
    FieldSpec::optional("service.host_and_port", FieldKind::String),
    FieldSpec::optional("service.url_prefix", FieldKind::String),
    FieldSpec::optional("service.serve_network_subgraph", FieldKind::Bool),
    FieldSpec::optional("service.serve_escrow_subgraph", FieldKind::Bool),
    FieldSpec::optional("service.serve_auth_token", FieldKind::String),
    FieldSpec::optional("service.free_query_auth_token", FieldKind::String),
    FieldSpec::optional("tap.max_amount_willing_to_lose_grt", FieldKind::Float),
];

/// The set of typed fields a resolved config must satisfy.
///
/// Tables are implied by path prefixes: `subgraphs.escrow` is a table because
/// `subgraphs.escrow.query_url` is a field.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSchema {
    fields: &'static [FieldSpec],
}

impl ConfigSchema {
    /// Schema of [`crate::IndexerConfig`].
    pub const INDEXER: ConfigSchema = ConfigSchema {
        fields: INDEXER_FIELDS,
    };

    /// All leaf fields, in declaration order.
    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Look up a leaf field by dotted path.
    pub fn field(&self, path: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|spec| spec.path == path)
    }

    /// Whether the dotted path names a table of the schema.
    pub fn is_table(&self, path: &str) -> bool {
        self.fields.iter().any(|spec| {
            spec.path
                .strip_prefix(path)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Check the merged tree: presence and type of every field, bounds, and
    /// keys the schema does not declare. Returns every problem found.
    pub(super) fn validate(&self, tree: &Value, provenance: &Provenance) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut blocked_tables = BTreeSet::new();

        for spec in self.fields {
            match lookup(tree, spec.path) {
                Lookup::Found(value) => {
                    if !spec.kind.accepts(value) {
                        violations.push(Violation::TypeMismatch {
                            path: spec.path.to_string(),
                            expected: spec.kind.name().to_string(),
                            found: describe(value),
                            origin: provenance.origin_of(spec.path),
                        });
                        continue;
                    }
                    if let (Some(max), Some(number)) = (spec.max, value.as_u64()) {
                        if number > max {
                            violations.push(Violation::InvalidValue {
                                path: spec.path.to_string(),
                                message: format!("{number} exceeds maximum of {max}"),
                            });
                        }
                    }
                }
                Lookup::Missing => {
                    if spec.required {
                        violations.push(Violation::MissingRequiredField {
                            path: spec.path.to_string(),
                        });
                    }
                }
                Lookup::Blocked { table, value } => {
                    // Fields below a scalar table are reported once, at the table.
                    if blocked_tables.insert(table.clone()) {
                        violations.push(Violation::TypeMismatch {
                            origin: provenance.origin_of(&table),
                            path: table,
                            expected: "table".to_string(),
                            found: describe(value),
                        });
                    }
                }
            }
        }

        if let Value::Object(map) = tree {
            self.collect_unknown(map, "", provenance, &mut violations);
        }
        violations
    }

    fn collect_unknown(
        &self,
        map: &Map<String, Value>,
        prefix: &str,
        provenance: &Provenance,
        violations: &mut Vec<Violation>,
    ) {
        for (key, value) in map {
            let path = join_path(prefix, key);
            if key.contains('.') {
                // A quoted key like `"graph_node.query_url"` is not the nested field.
                violations.push(Violation::UnknownField {
                    origin: provenance.origin_of(&path),
                    path: join_path(prefix, &format!("{key:?}")),
                });
                continue;
            }
            if self.field(&path).is_some() {
                continue;
            }
            if self.is_table(&path) {
                if let Value::Object(inner) = value {
                    self.collect_unknown(inner, &path, provenance, violations);
                }
                continue;
            }
            violations.push(Violation::UnknownField {
                origin: provenance.origin_of(&path),
                path,
            });
        }
    }
}

impl Default for ConfigSchema {
    fn default() -> Self {
        Self::INDEXER
    }
}

enum Lookup<'a> {
    Found(&'a Value),
    Missing,
    /// An ancestor table of the field holds a non-table value.
    Blocked { table: String, value: &'a Value },
}

fn lookup<'a>(tree: &'a Value, path: &str) -> Lookup<'a> {
    let mut current = tree;
    let mut walked = String::new();
    for segment in path.split('.') {
        let map = match current {
            Value::Object(map) => map,
            other => {
                return Lookup::Blocked {
                    table: walked,
                    value: other,
                };
            }
        };
        match map.get(segment) {
            Some(next) => current = next,
            None => return Lookup::Missing,
        }
        walked = join_path(&walked, segment);
    }
    Lookup::Found(current)
}

/// Short description of a value for mismatch messages.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => format!("bool {flag}"),
        Value::Number(number) => {
            if number.is_f64() {
                format!("float {number}")
            } else {
                format!("integer {number}")
            }
        }
        Value::String(text) => format!("string {text:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "table".to_string(),
    }
}

/// Join nested paths for error messages and lookups.
pub(super) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
