//! Configuration schema for the indexer service.
//!
//! Required fields carry no serde default: they are guaranteed present by the
//! schema pass before the tree is decoded into these types.

use serde::{Deserialize, Serialize};

/// Root config for the indexer service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerConfig {
    pub indexer: IndexerIdentity,
    pub database: DatabaseConfig,
    pub graph_node: GraphNodeConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub subgraphs: SubgraphsConfig,
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub tap: TapConfig,
}

/// Operator identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexerIdentity {
    pub indexer_address: String,
    pub operator_mnemonic: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub postgres_url: String,
}

/// Endpoints of the graph node serving queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphNodeConfig {
    pub query_url: String,
    pub status_url: String,
}

/// Prometheus metrics server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    7300
}

/// The two subgraphs the service reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubgraphsConfig {
    pub network: NetworkSubgraphConfig,
    pub escrow: EscrowSubgraphConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSubgraphConfig {
    pub query_url: String,
    #[serde(default)]
    pub query_auth_token: Option<String>,
    #[serde(default)]
    pub deployment_id: Option<String>,
    #[serde(default = "default_syncing_interval_secs")]
    pub syncing_interval_secs: u64,
    #[serde(default = "default_recently_closed_allocation_buffer_secs")]
    pub recently_closed_allocation_buffer_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscrowSubgraphConfig {
    pub query_url: String,
    #[serde(default)]
    pub query_auth_token: Option<String>,
    /// Opaque deployment identifier; not interpreted here.
    pub deployment_id: String,
    #[serde(default = "default_syncing_interval_secs")]
    pub syncing_interval_secs: u64,
}

fn default_syncing_interval_secs() -> u64 {
    60
}

fn default_recently_closed_allocation_buffer_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockchainConfig {
    pub chain_id: u64,
    pub receipts_verifier_address: String,
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_host_and_port")]
    pub host_and_port: String,
    #[serde(default = "default_url_prefix")]
    pub url_prefix: String,
    #[serde(default)]
    pub serve_network_subgraph: bool,
    #[serde(default)]
    pub serve_escrow_subgraph: bool,
    #[serde(default)]
    pub serve_auth_token: Option<String>,
    #[serde(default)]
    pub free_query_auth_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host_and_port: default_host_and_port(),
            url_prefix: default_url_prefix(),
            serve_network_subgraph: false,
            serve_escrow_subgraph: false,
            serve_auth_token: None,
            free_query_auth_token: None,
        }
    }
}

fn default_host_and_port() -> String {
    "0.0.0.0:7600".to_string()
}

fn default_url_prefix() -> String {
    "/".to_string()
}

/// Receipt aggregation limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    #[serde(default = "default_max_amount_willing_to_lose_grt")]
    pub max_amount_willing_to_lose_grt: f64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            max_amount_willing_to_lose_grt: default_max_amount_willing_to_lose_grt(),
        }
    }
}

fn default_max_amount_willing_to_lose_grt() -> f64 {
    20.0
}
