//! Configuration errors: validation failures and env-loading problems.

use std::fmt;

/// Errors produced when building or validating configuration.
///
/// # Variants
///
/// - **Validation**: Values are inconsistent or out of range (e.g. `n_embed`
///   not divisible by `n_head`). Fix the offending value; the message names
///   the rule that failed.
/// - **EnvVar**: An environment variable could not be read (e.g. invalid
///   Unicode).
/// - **Parse**: A variable was set but does not parse into the expected
///   type (e.g. `MICROLM_SEED=abc`). Unset it to fall back to the default.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration validation failed.
    Validation(String),

    /// Failed to read an environment variable.
    EnvVar {
        /// The full environment variable name.
        key: String,
        /// Underlying cause.
        message: String,
    },

    /// Environment variable was set but could not be parsed.
    Parse {
        /// The full environment variable name.
        key: String,
        /// The raw value that failed to parse.
        value: String,
        /// Human-readable parse reason.
        message: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Validation(m) => write!(f, "config validation: {m}"),
            ConfigError::EnvVar { key, message } => write!(f, "env var {key}: {message}"),
            ConfigError::Parse {
                key,
                value,
                message,
            } => write!(f, "env var {key}={value:?}: {message}"),
        }
    }
}

impl std::error::Error for ConfigError {}
