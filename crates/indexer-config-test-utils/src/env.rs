//! Guards for tests that mutate the process environment.

use once_cell::sync::Lazy;
use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serialize tests that touch process env vars. Hold the guard for the
/// whole test.
pub fn lock_env() -> MutexGuard<'static, ()> {
    ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sets an env var and restores its previous state on drop.
pub struct EnvVarGuard {
    key: OsString,
    original: Option<OsString>,
}

impl EnvVarGuard {
    pub fn set(key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        let key = key.as_ref().to_os_string();
        let original = std::env::var_os(&key);
        // SAFETY: tests serialize env mutations with `lock_env`.
        unsafe { std::env::set_var(&key, value) };
        Self { key, original }
    }

    pub fn remove(key: impl AsRef<OsStr>) -> Self {
        let key = key.as_ref().to_os_string();
        let original = std::env::var_os(&key);
        // SAFETY: tests serialize env mutations with `lock_env`.
        unsafe { std::env::remove_var(&key) };
        Self { key, original }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        match &self.original {
            // SAFETY: tests serialize env mutations with `lock_env`.
            Some(value) => unsafe { std::env::set_var(&self.key, value) },
            // SAFETY: tests serialize env mutations with `lock_env`.
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// Remove every variable whose name starts with `prefix` until the returned
/// guards drop.
pub fn clear_prefixed(prefix: &str) -> Vec<EnvVarGuard> {
    std::env::vars_os()
        .map(|(key, _)| key)
        .filter(|key| key.as_encoded_bytes().starts_with(prefix.as_bytes()))
        .collect::<Vec<_>>()
        .into_iter()
        .map(EnvVarGuard::remove)
        .collect()
}
