//! Retry mode profiles and their resolution
//!
//! A retry mode is a named bundle of defaults: how many attempts a request
//! gets, how failures are priced against the shared bucket, and how large
//! that bucket is. The mode is resolved at most once per process from the
//! environment and the shared configuration file; tests use the uncached
//! [`RetryMode::resolve`] with an injected environment.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use tracing::debug;

use crate::config::{
    self, ConfigError, Env, ProcessEnv, ProfileSet, CONFIG_FILE_VAR, PROFILE_VAR,
    RETRY_MODE_PROPERTY, RETRY_MODE_VAR,
};

/// Default size of the shared retry token bucket.
pub const TOKEN_BUCKET_SIZE: u32 = 500;

/// Default token cost of retrying a failure.
pub const DEFAULT_FAILURE_COST: u32 = 5;

/// Token cost of retrying a throttling failure under the legacy mode.
pub const LEGACY_THROTTLING_COST: u32 = 0;

static DEFAULT_MODE: OnceLock<Result<RetryMode, ConfigError>> = OnceLock::new();

/// A named profile of retry defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetryMode {
    /// Pre-existing behavior: four total attempts, throttling failures do
    /// not drain the bucket.
    #[default]
    Legacy,
    /// Current behavior: three total attempts, every retryable failure is
    /// charged equally.
    Standard,
}

impl RetryMode {
    /// Total attempts (first try plus retries) a request gets by default.
    pub fn max_attempts(self) -> u32 {
        match self {
            RetryMode::Legacy => 4,
            RetryMode::Standard => 3,
        }
    }

    /// Default number of retries, derived from [`Self::max_attempts`].
    pub fn default_retries(self) -> u32 {
        self.max_attempts() - 1
    }

    /// The process-wide default mode, resolved once and cached.
    ///
    /// Resolution order: `AWS_RETRY_MODE`, then the `retry_mode` property of
    /// the active profile in the file named by `AWS_CONFIG_FILE`, then
    /// [`RetryMode::Legacy`].
    pub fn resolve_default() -> Result<RetryMode, ConfigError> {
        DEFAULT_MODE.get_or_init(|| Self::resolve(&ProcessEnv)).clone()
    }

    /// Uncached resolution against an arbitrary environment.
    pub fn resolve(env: &dyn Env) -> Result<RetryMode, ConfigError> {
        if let Some(value) = env.var(RETRY_MODE_VAR) {
            return value.parse();
        }

        if let Some(mode) = Self::from_profile_file(env)? {
            return Ok(mode);
        }

        Ok(RetryMode::Legacy)
    }

    fn from_profile_file(env: &dyn Env) -> Result<Option<RetryMode>, ConfigError> {
        let Some(path) = env.var(CONFIG_FILE_VAR) else {
            return Ok(None);
        };
        if !Path::new(&path).exists() {
            debug!(path = %path, "configured profile file does not exist, skipping");
            return Ok(None);
        }

        let profiles = ProfileSet::load(&path)?;
        let profile = env.var(PROFILE_VAR).unwrap_or_else(|| config::DEFAULT_PROFILE.to_string());

        profiles
            .property(&profile, RETRY_MODE_PROPERTY)
            .map(str::parse)
            .transpose()
    }
}

impl FromStr for RetryMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "legacy" => Ok(RetryMode::Legacy),
            "standard" => Ok(RetryMode::Standard),
            _ => Err(ConfigError::UnsupportedRetryMode { value: value.to_string() }),
        }
    }
}

impl fmt::Display for RetryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryMode::Legacy => write!(f, "legacy"),
            RetryMode::Standard => write!(f, "standard"),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry::mode.
    use super::*;
    use crate::config::StaticEnv;

    /// Validates `RetryMode::from_str` behavior for the parsing scenario.
    ///
    /// Assertions:
    /// - Confirms both modes parse case-insensitively.
    /// - Ensures unknown values fail with the offending string.
    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("legacy".parse::<RetryMode>().unwrap(), RetryMode::Legacy);
        assert_eq!("STANDARD".parse::<RetryMode>().unwrap(), RetryMode::Standard);
        assert_eq!("Standard".parse::<RetryMode>().unwrap(), RetryMode::Standard);

        assert_eq!(
            "adaptive".parse::<RetryMode>(),
            Err(ConfigError::UnsupportedRetryMode { value: "adaptive".to_string() })
        );
    }

    /// Validates the default attempt counts per mode.
    #[test]
    fn test_default_attempt_counts() {
        assert_eq!(RetryMode::Legacy.max_attempts(), 4);
        assert_eq!(RetryMode::Legacy.default_retries(), 3);
        assert_eq!(RetryMode::Standard.max_attempts(), 3);
        assert_eq!(RetryMode::Standard.default_retries(), 2);
    }

    /// Validates `RetryMode::resolve` behavior for the environment override
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the environment variable wins.
    /// - Confirms an empty environment falls back to legacy.
    #[test]
    fn test_resolve_from_environment() {
        let env = StaticEnv::new().with(RETRY_MODE_VAR, "standard");
        assert_eq!(RetryMode::resolve(&env).unwrap(), RetryMode::Standard);

        assert_eq!(RetryMode::resolve(&StaticEnv::new()).unwrap(), RetryMode::Legacy);
    }

    /// Validates an invalid environment value fails resolution.
    #[test]
    fn test_resolve_rejects_unknown_value() {
        let env = StaticEnv::new().with(RETRY_MODE_VAR, "exponential");

        assert_eq!(
            RetryMode::resolve(&env),
            Err(ConfigError::UnsupportedRetryMode { value: "exponential".to_string() })
        );
    }
}
