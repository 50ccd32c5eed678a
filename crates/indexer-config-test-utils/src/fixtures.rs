//! TOML fixtures and file helpers.

use std::fs;
use std::path::Path;

/// A complete config with every required field and no optional ones.
pub const MINIMAL_CONFIG: &str = r#"
[indexer]
indexer_address = "0x1111111111111111111111111111111111111111"
operator_mnemonic = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"

[database]
postgres_url = "postgres://postgres@localhost:5432/indexer"

[graph_node]
query_url = "http://graph-node:8000"
status_url = "http://graph-node:8030/graphql"

[subgraphs.network]
query_url = "http://graph-node:8000/subgraphs/id/network"

[subgraphs.escrow]
query_url = "http://graph-node:8000/subgraphs/id/escrow"
deployment_id = "Qmescrowdeployment"

[blockchain]
chain_id = 1337
receipts_verifier_address = "0x2222222222222222222222222222222222222222"
"#;

/// Write TOML contents to a path, creating parent directories if needed.
pub fn write_toml(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("dir");
    }
    fs::write(path, contents).expect("write");
}
