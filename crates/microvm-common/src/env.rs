//! Environment store used to publish provider settings
//!
//! The host framework expects some provider settings (the provisioning
//! endpoint) as environment variables. [`EnvStore`] is the seam between the
//! provider and wherever those values live: [`ProcessEnv`] writes the real
//! process environment, [`MemoryEnv`] keeps them in an explicit map that is
//! passed through the lifecycle call chain.

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::{Error, Result};

/// Key/value store for provider environment settings
pub trait EnvStore: Send + Sync {
    /// Publish a value under `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Option<String>;
}

/// Check that a key/value pair can be stored in a process environment
///
/// Keys must be non-empty and free of `=` and NUL; values must be free of NUL.
pub fn validate_entry(key: &str, value: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::environment(key, "key is empty"));
    }
    if key.contains('=') || key.contains('\0') {
        return Err(Error::environment(key, "key contains '=' or NUL"));
    }
    if value.contains('\0') {
        return Err(Error::environment(key, "value contains NUL"));
    }
    Ok(())
}

/// The real process environment
///
/// Writes are process-wide and not synchronized with other threads reading
/// the environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl EnvStore for ProcessEnv {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_entry(key, value)?;
        std::env::set_var(key, value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory environment
#[derive(Debug, Default)]
pub struct MemoryEnv {
    vars: RwLock<BTreeMap<String, String>>,
}

impl MemoryEnv {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an environment pre-populated with the given pairs
    pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: RwLock::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of all stored pairs
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars
            .read()
            .map(|vars| vars.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl EnvStore for MemoryEnv {
    fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_entry(key, value)?;
        let mut vars = self
            .vars
            .write()
            .map_err(|_| Error::environment(key, "environment lock poisoned"))?;
        vars.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.vars.read().ok().and_then(|vars| vars.get(key).cloned())
    }
}
