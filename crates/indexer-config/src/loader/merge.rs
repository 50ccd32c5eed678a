//! Value-tree merge helpers for layered configuration.

use super::schema::join_path;
use crate::Origin;
use serde_json::Value;
use std::collections::BTreeMap;

/// Which source last wrote each node of the merged tree, keyed by dotted path.
#[derive(Debug, Clone, Default, PartialEq)]
pub(super) struct Provenance {
    origins: BTreeMap<String, Origin>,
}

impl Provenance {
    /// Origin of the node at `path`, falling back to its nearest recorded
    /// ancestor. Every node written by [`merge_layer`] is recorded.
    pub(super) fn origin_of(&self, path: &str) -> Origin {
        let mut candidate = path;
        loop {
            if let Some(origin) = self.origins.get(candidate) {
                return origin.clone();
            }
            match candidate.rfind('.') {
                Some(idx) => candidate = &candidate[..idx],
                None => return Origin::Inline,
            }
        }
    }

    /// Origin of a leaf, only if a source set exactly that path.
    pub(super) fn get(&self, path: &str) -> Option<&Origin> {
        self.origins.get(path)
    }

    /// Record `origin` for the node at `prefix` and everything below it.
    pub(super) fn record_tree(&mut self, value: &Value, prefix: &str, origin: &Origin) {
        if !prefix.is_empty() {
            self.origins.insert(prefix.to_string(), origin.clone());
        }
        if let Value::Object(map) = value {
            for (key, child) in map {
                self.record_tree(child, &join_path(prefix, key), origin);
            }
        }
    }

    /// Forget every node strictly below `prefix`.
    fn clear_under(&mut self, prefix: &str) {
        let nested = format!("{prefix}.");
        self.origins.retain(|path, _| !path.starts_with(&nested));
    }
}

/// Overlay `overlay` onto `base`, recursively merging tables; any other value
/// replaces what was there. Provenance is updated for every node written.
pub(super) fn merge_layer(
    base: &mut Value,
    overlay: &Value,
    prefix: &str,
    origin: &Origin,
    provenance: &mut Provenance,
) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let path = join_path(prefix, key);
                match base_map.get_mut(key) {
                    Some(existing) => merge_layer(existing, value, &path, origin, provenance),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                        provenance.record_tree(value, &path, origin);
                    }
                }
            }
            if !prefix.is_empty() {
                provenance.origins.insert(prefix.to_string(), origin.clone());
            }
        }
        (base_slot, overlay_value) => {
            provenance.clear_under(prefix);
            *base_slot = overlay_value.clone();
            provenance.record_tree(overlay_value, prefix, origin);
        }
    }
}

/// Build the nested tree `{a: {b: value}}` for the path `["a", "b"]`.
pub(super) fn nest(path: &[String], value: Value) -> Value {
    path.iter().rev().fold(value, |inner, segment| {
        let mut map = serde_json::Map::new();
        map.insert(segment.clone(), inner);
        Value::Object(map)
    })
}

/// Number of leaves (non-table values) in a tree.
pub(super) fn count_leaves(value: &Value) -> usize {
    match value {
        Value::Object(map) => map.values().map(count_leaves).sum(),
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn file(name: &str) -> Origin {
        Origin::File(PathBuf::from(name))
    }

    #[test]
    fn overlay_replaces_leaves_and_keeps_siblings() {
        let mut base = json!({});
        let mut provenance = Provenance::default();
        merge_layer(
            &mut base,
            &json!({ "graph_node": { "query_url": "a", "status_url": "s" } }),
            "",
            &file("base.toml"),
            &mut provenance,
        );
        merge_layer(
            &mut base,
            &json!({ "graph_node": { "query_url": "b" } }),
            "",
            &file("override.toml"),
            &mut provenance,
        );

        assert_eq!(
            base,
            json!({ "graph_node": { "query_url": "b", "status_url": "s" } })
        );
        assert_eq!(
            provenance.get("graph_node.query_url"),
            Some(&file("override.toml"))
        );
        assert_eq!(
            provenance.get("graph_node.status_url"),
            Some(&file("base.toml"))
        );
    }

    #[test]
    fn scalar_replacing_table_drops_child_origins() {
        let mut base = json!({});
        let mut provenance = Provenance::default();
        merge_layer(
            &mut base,
            &json!({ "tap": { "max_amount_willing_to_lose_grt": 1 } }),
            "",
            &file("a.toml"),
            &mut provenance,
        );
        merge_layer(
            &mut base,
            &json!({ "tap": 3 }),
            "",
            &file("b.toml"),
            &mut provenance,
        );

        assert_eq!(base, json!({ "tap": 3 }));
        assert_eq!(provenance.get("tap.max_amount_willing_to_lose_grt"), None);
        assert_eq!(provenance.origin_of("tap"), file("b.toml"));
    }

    #[test]
    fn nest_builds_path_from_segments() {
        let path = vec!["subgraphs".to_string(), "escrow".to_string()];
        assert_eq!(
            nest(&path, json!("x")),
            json!({ "subgraphs": { "escrow": "x" } })
        );
    }

    #[test]
    fn count_leaves_ignores_tables() {
        assert_eq!(count_leaves(&json!({ "a": { "b": 1, "c": [1, 2] }, "d": {} })), 2);
    }
}
