//! Test helpers shared across indexer config crates.

pub mod env;
pub mod fixtures;

pub use env::{EnvVarGuard, clear_prefixed, lock_env};
pub use fixtures::{MINIMAL_CONFIG, write_toml};

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
