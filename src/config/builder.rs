//! Build [`Config`] from environment variables.
//!
//! [`env_string`] and [`env_parsed`] read env vars with typed errors; key
//! names are centralized in [`crate::config::constants`]. An unset variable
//! falls back to the default; a set-but-invalid one is an error.

use std::path::PathBuf;

use super::constants::{
    ENV_ARCH, ENV_BETA1, ENV_BETA2, ENV_BLOCK_SIZE, ENV_CHECKPOINT_PATH, ENV_EPSILON,
    ENV_INIT_STD, ENV_INPUT_PATH, ENV_LEARNING_RATE, ENV_LOSS_LOG_EVERY, ENV_NUM_STEPS,
    ENV_N_ACTIVE_EXPERTS, ENV_N_EMBED, ENV_N_EXPERTS, ENV_N_HEAD, ENV_N_KV_HEAD, ENV_N_LATENT,
    ENV_N_LAYER, ENV_PREFIX, ENV_RMSNORM_EPS, ENV_SAMPLE_SIZE, ENV_SEED, ENV_TEMPERATURE,
};
use super::{Config, ConfigError, ModelArch};

/// Returns the full env key for a suffix (e.g. `SEED` → `MICROLM_SEED`).
#[must_use]
pub fn env_key(suffix: &str) -> String {
    format!("{ENV_PREFIX}{suffix}")
}

/// Reads an environment variable as a string.
///
/// # Errors
///
/// Returns [`ConfigError::EnvVar`] if the variable is set but unreadable
/// (e.g. not valid Unicode). An unset variable is `Ok(None)`.
pub fn env_string(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(s) => Ok(Some(s)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::EnvVar {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Reads an environment variable and parses it into `T`.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the value is set but invalid for the
/// target type, and [`ConfigError::EnvVar`] when it cannot be read at all.
pub fn env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(s) = env_string(key)? else {
        return Ok(None);
    };
    match s.parse() {
        Ok(t) => Ok(Some(t)),
        Err(e) => Err(ConfigError::Parse {
            key: key.to_string(),
            value: s,
            message: e.to_string(),
        }),
    }
}

/// Builds [`Config`] from `MICROLM_*` environment variables, falling back to
/// [`Config::default`] for unset values.
///
/// # Errors
///
/// Returns [`ConfigError`] if any *set* variable fails to parse.
pub fn from_env() -> Result<Config, ConfigError> {
    let default = Config::default();

    Ok(Config {
        seed: env_parsed::<u64>(&env_key(ENV_SEED))?.unwrap_or(default.seed),
        input_path: env_string(&env_key(ENV_INPUT_PATH))?
            .map(PathBuf::from)
            .unwrap_or(default.input_path),
        checkpoint_path: env_string(&env_key(ENV_CHECKPOINT_PATH))?
            .map(PathBuf::from)
            .unwrap_or(default.checkpoint_path),
        arch: env_parsed::<ModelArch>(&env_key(ENV_ARCH))?.unwrap_or(default.arch),
        n_embed: env_parsed::<usize>(&env_key(ENV_N_EMBED))?.unwrap_or(default.n_embed),
        n_head: env_parsed::<usize>(&env_key(ENV_N_HEAD))?.unwrap_or(default.n_head),
        n_kv_head: env_parsed::<usize>(&env_key(ENV_N_KV_HEAD))?.unwrap_or(default.n_kv_head),
        n_layer: env_parsed::<usize>(&env_key(ENV_N_LAYER))?.unwrap_or(default.n_layer),
        block_size: env_parsed::<usize>(&env_key(ENV_BLOCK_SIZE))?.unwrap_or(default.block_size),
        n_latent: env_parsed::<usize>(&env_key(ENV_N_LATENT))?.unwrap_or(default.n_latent),
        n_experts: env_parsed::<usize>(&env_key(ENV_N_EXPERTS))?.unwrap_or(default.n_experts),
        n_active_experts: env_parsed::<usize>(&env_key(ENV_N_ACTIVE_EXPERTS))?
            .unwrap_or(default.n_active_experts),
        init_std: env_parsed::<f64>(&env_key(ENV_INIT_STD))?.unwrap_or(default.init_std),
        rmsnorm_eps: env_parsed::<f64>(&env_key(ENV_RMSNORM_EPS))?.unwrap_or(default.rmsnorm_eps),
        learning_rate: env_parsed::<f64>(&env_key(ENV_LEARNING_RATE))?
            .unwrap_or(default.learning_rate),
        beta1: env_parsed::<f64>(&env_key(ENV_BETA1))?.unwrap_or(default.beta1),
        beta2: env_parsed::<f64>(&env_key(ENV_BETA2))?.unwrap_or(default.beta2),
        epsilon: env_parsed::<f64>(&env_key(ENV_EPSILON))?.unwrap_or(default.epsilon),
        num_steps: env_parsed::<usize>(&env_key(ENV_NUM_STEPS))?.unwrap_or(default.num_steps),
        loss_log_every: env_parsed::<usize>(&env_key(ENV_LOSS_LOG_EVERY))?
            .unwrap_or(default.loss_log_every),
        temperature: env_parsed::<f64>(&env_key(ENV_TEMPERATURE))?.unwrap_or(default.temperature),
        sample_size: env_parsed::<usize>(&env_key(ENV_SAMPLE_SIZE))?
            .unwrap_or(default.sample_size),
    })
}
