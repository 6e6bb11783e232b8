//! Typed registry of the operations a lock protects

use crate::error::{CallbackError, LockError};
use crate::types::{LockName, NodeId};
use std::collections::HashMap;
use std::sync::Arc;

/// What a run callback is told about the run it performs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub name: LockName,
    pub node: NodeId,
    /// Override key this run was requested with, if any
    pub callback_override: Option<String>,
}

/// The operation executed while holding the lock
pub type RunCallback = Arc<dyn Fn(&RunContext) -> Result<(), CallbackError> + Send + Sync>;

/// Default callback plus any named overrides.
///
/// Override keys are checked when registered and when an acquire asks for
/// them, so an unknown key is reported to the requester instead of failing
/// later inside the run phase.
#[derive(Clone)]
pub struct CallbackRegistry {
    default: RunCallback,
    overrides: HashMap<String, RunCallback>,
}

impl CallbackRegistry {
    pub fn new<F>(default: F) -> Self
    where
        F: Fn(&RunContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        Self {
            default: Arc::new(default),
            overrides: HashMap::new(),
        }
    }

    /// Register an override under `key`. Keys are unique.
    pub fn register<F>(&mut self, key: impl Into<String>, callback: F) -> Result<(), LockError>
    where
        F: Fn(&RunContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let key = key.into();
        if self.overrides.contains_key(&key) {
            return Err(LockError::DuplicateCallback(key));
        }
        self.overrides.insert(key, Arc::new(callback));
        Ok(())
    }

    /// Builder form of [`CallbackRegistry::register`]
    pub fn with_override<F>(mut self, key: impl Into<String>, callback: F) -> Result<Self, LockError>
    where
        F: Fn(&RunContext) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        self.register(key, callback)?;
        Ok(self)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.overrides.contains_key(key)
    }

    /// Check that `key` (if any) names a registered override.
    pub fn validate(&self, key: Option<&str>) -> Result<(), LockError> {
        self.resolve(key).map(|_| ())
    }

    /// The override registered under `key`, or the default when `key` is `None`.
    pub fn resolve(&self, key: Option<&str>) -> Result<&RunCallback, LockError> {
        match key {
            None => Ok(&self.default),
            Some(key) => self
                .overrides
                .get(key)
                .ok_or_else(|| LockError::CallbackNotFound(key.to_string())),
        }
    }

    /// Registered override keys, sorted
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.overrides.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("overrides", &self.keys())
            .finish()
    }
}
