//! Process environment abstraction
//!
//! Mode resolution reads the process environment exactly once per process;
//! tests need to steer that lookup without mutating global state. The same
//! injectable-double pattern the clock abstraction uses elsewhere in the
//! workspace applies here to the environment.

use std::collections::HashMap;

/// Read access to environment variables.
pub trait Env: Send + Sync {
    /// Value of `key`, or `None` when unset or empty.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }
}

/// Fixed in-memory environment for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    vars: HashMap<String, String>,
}

impl StaticEnv {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|value| !value.is_empty()).cloned()
    }
}
