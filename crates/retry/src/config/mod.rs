//! Configuration surface for the retry subsystem
//!
//! Only the pieces the retry machinery itself needs live here: an injectable
//! process-environment abstraction and a minimal shared-config profile
//! reader, enough to resolve the `retry_mode` property. Full configuration
//! loading belongs to the client library that embeds this crate.

pub mod env;
pub mod profiles;

use thiserror::Error;

pub use env::{Env, ProcessEnv, StaticEnv};
pub use profiles::ProfileSet;

/// Environment variable selecting the retry mode.
pub const RETRY_MODE_VAR: &str = "AWS_RETRY_MODE";

/// Environment variable naming the active configuration profile.
pub const PROFILE_VAR: &str = "AWS_PROFILE";

/// Environment variable pointing at the shared configuration file.
pub const CONFIG_FILE_VAR: &str = "AWS_CONFIG_FILE";

/// Profile property selecting the retry mode.
pub const RETRY_MODE_PROPERTY: &str = "retry_mode";

/// Name of the profile used when `AWS_PROFILE` is not set.
pub const DEFAULT_PROFILE: &str = "default";

/// Errors raised while resolving configuration.
///
/// These are fatal at policy construction: an explicitly configured but
/// unsupported value is a deployment mistake, not a runtime condition to
/// retry around.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unsupported retry mode: {value}")]
    UnsupportedRetryMode { value: String },

    #[error("unable to read profile file {path}: {message}")]
    ProfileIo { path: String, message: String },

    #[error("malformed profile file at line {line}: {message}")]
    MalformedProfile { line: usize, message: String },
}
