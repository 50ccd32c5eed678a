//! Mapping of prefixed environment variables onto schema paths.

use super::ENV_PATH_SEPARATOR;
use super::schema::{ConfigSchema, FieldKind, FieldSpec};
use serde_json::{Number, Value};

/// Why a prefixed variable was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum EnvSkip {
    /// Nothing follows the prefix.
    EmptyName,
    /// The name contains an empty `__`-delimited segment.
    EmptySegment,
    /// The path names a table rather than a field.
    Table(String),
    /// The path is not part of the schema.
    Unknown(String),
}

/// Split a variable name into lowercase path segments, if it carries the
/// prefix. One `__` or `_` between the prefix and the first section is
/// dropped, so `INDEXER_SUBGRAPHS__ESCROW__QUERY_URL` with prefix `INDEXER_`
/// or `INDEXER`, and `PREFIX__SUBGRAPHS__ESCROW__QUERY_URL` with prefix
/// `PREFIX`, all become `["subgraphs", "escrow", "query_url"]`.
pub(super) fn env_path(name: &str, prefix: &str) -> Option<Result<Vec<String>, EnvSkip>> {
    let rest = name.strip_prefix(prefix)?;
    let suffix = match rest
        .strip_prefix(ENV_PATH_SEPARATOR)
        .or_else(|| rest.strip_prefix('_'))
    {
        Some(suffix) => suffix,
        // `INDEXERX_...` is a different family than prefix `INDEXER`.
        None if !rest.is_empty() && !prefix.ends_with('_') => return None,
        None => rest,
    };
    if suffix.is_empty() {
        return Some(Err(EnvSkip::EmptyName));
    }
    let segments: Vec<String> = suffix
        .split(ENV_PATH_SEPARATOR)
        .map(|segment| segment.to_ascii_lowercase())
        .collect();
    if segments.iter().any(String::is_empty) {
        return Some(Err(EnvSkip::EmptySegment));
    }
    Some(Ok(segments))
}

/// Resolve segments to the schema field they name.
pub(super) fn env_field(
    schema: &ConfigSchema,
    segments: &[String],
) -> Result<&'static FieldSpec, EnvSkip> {
    let path = segments.join(".");
    match schema.field(&path) {
        Some(spec) => Ok(spec),
        None if schema.is_table(&path) => Err(EnvSkip::Table(path)),
        None => Err(EnvSkip::Unknown(path)),
    }
}

/// Convert a raw env string to the kind the schema declares. Strings that do
/// not parse are returned unchanged so validation reports the mismatch.
pub(super) fn coerce(raw: &str, kind: FieldKind) -> Value {
    let coerced = match kind {
        FieldKind::String => None,
        FieldKind::Bool => {
            if raw.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        // Plain base-10 digits only; `str::parse` would also take a `+` sign.
        FieldKind::Integer if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => {
            raw.parse::<u64>().ok().map(Value::from)
        }
        FieldKind::Integer => None,
        FieldKind::Float => raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),
    };
    coerced.unwrap_or_else(|| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn segments(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn splits_and_lowercases_after_prefix() {
        assert_eq!(
            env_path("INDEXER_SUBGRAPHS__ESCROW__QUERY_URL", "INDEXER_"),
            Some(Ok(segments(&["subgraphs", "escrow", "query_url"])))
        );
    }

    #[test]
    fn separator_after_prefix_is_optional() {
        let expected = Some(Ok(segments(&["subgraphs", "escrow", "query_url"])));
        assert_eq!(
            env_path("PREFIX__SUBGRAPHS__ESCROW__QUERY_URL", "PREFIX"),
            expected
        );
        assert_eq!(
            env_path("INDEXER_SUBGRAPHS__ESCROW__QUERY_URL", "INDEXER"),
            expected
        );
        assert_eq!(
            env_path("INDEXER__SUBGRAPHS__ESCROW__QUERY_URL", "INDEXER_"),
            expected
        );
    }

    #[test]
    fn ignores_other_prefixes() {
        assert_eq!(env_path("PATH", "INDEXER_"), None);
        assert_eq!(env_path("INDEXERX_GRAPH_NODE__QUERY_URL", "INDEXER_"), None);
        assert_eq!(env_path("INDEXERX_GRAPH_NODE__QUERY_URL", "INDEXER"), None);
    }

    #[test]
    fn rejects_empty_names_and_segments() {
        assert_eq!(env_path("INDEXER_", "INDEXER_"), Some(Err(EnvSkip::EmptyName)));
        assert_eq!(
            env_path("INDEXER_GRAPH_NODE____QUERY_URL", "INDEXER_"),
            Some(Err(EnvSkip::EmptySegment))
        );
        assert_eq!(
            env_path("INDEXER_GRAPH_NODE__", "INDEXER_"),
            Some(Err(EnvSkip::EmptySegment))
        );
    }

    #[test]
    fn resolves_fields_tables_and_unknowns() {
        let schema = ConfigSchema::INDEXER;
        assert_eq!(
            env_field(&schema, &segments(&["metrics", "port"])).map(|spec| spec.path),
            Ok("metrics.port")
        );
        assert_eq!(
            env_field(&schema, &segments(&["subgraphs", "escrow"])),
            Err(EnvSkip::Table("subgraphs.escrow".to_string()))
        );
        assert_eq!(
            env_field(&schema, &segments(&["service", "port"])),
            Err(EnvSkip::Unknown("service.port".to_string()))
        );
    }

    #[test]
    fn booleans_accept_only_true_and_false() {
        assert_eq!(coerce("true", FieldKind::Bool), json!(true));
        assert_eq!(coerce("FALSE", FieldKind::Bool), json!(false));
        assert_eq!(coerce("yes", FieldKind::Bool), json!("yes"));
        assert_eq!(coerce("1", FieldKind::Bool), json!("1"));
        assert_eq!(coerce("", FieldKind::Bool), json!(""));
    }

    #[test]
    fn numbers_parse_strictly() {
        assert_eq!(coerce("7300", FieldKind::Integer), json!(7300));
        assert_eq!(coerce("-1", FieldKind::Integer), json!("-1"));
        assert_eq!(coerce("7.5", FieldKind::Integer), json!("7.5"));
        assert_eq!(coerce("+5", FieldKind::Integer), json!("+5"));
        assert_eq!(coerce(" 5", FieldKind::Integer), json!(" 5"));
        assert_eq!(coerce("7.5", FieldKind::Float), json!(7.5));
        assert_eq!(coerce("inf", FieldKind::Float), json!("inf"));
    }

    #[test]
    fn strings_are_verbatim() {
        assert_eq!(coerce("true", FieldKind::String), json!("true"));
        assert_eq!(coerce(" http://x ", FieldKind::String), json!(" http://x "));
    }
}
