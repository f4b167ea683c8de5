//! Configuration for model architecture, training, inference, and paths.
//!
//! Load from environment via [`from_env`] and check with [`Config::validate`]
//! before building a model. Defaults and env key names live in `constants`.

mod builder;
mod constants;
mod error;

use std::path::PathBuf;
use std::str::FromStr;

use constants::{
    DEFAULT_BETA1, DEFAULT_BETA2, DEFAULT_BLOCK_SIZE, DEFAULT_CHECKPOINT_PATH, DEFAULT_EPSILON,
    DEFAULT_INIT_STD, DEFAULT_INPUT_PATH, DEFAULT_LEARNING_RATE, DEFAULT_LOSS_LOG_EVERY,
    DEFAULT_NUM_STEPS, DEFAULT_N_ACTIVE_EXPERTS, DEFAULT_N_EMBED, DEFAULT_N_EXPERTS,
    DEFAULT_N_HEAD, DEFAULT_N_KV_HEAD, DEFAULT_N_LATENT, DEFAULT_N_LAYER, DEFAULT_RMSNORM_EPS,
    DEFAULT_SAMPLE_SIZE, DEFAULT_SEED, DEFAULT_TEMPERATURE,
};

pub use builder::{env_key, env_parsed, env_string, from_env};
pub use error::ConfigError;

/// Which attention/feed-forward assembly the model uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelArch {
    /// Learned absolute positions, multi-head attention, squared-ReLU MLP.
    Gpt,
    /// Rotary positions, grouped-query attention, SwiGLU MLP.
    Gqa,
    /// Rotary queries, latent-compressed KV cache, soft mixture-of-experts.
    Mla,
}

impl ModelArch {
    /// Lowercase name as accepted by [`ModelArch::from_str`].
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelArch::Gpt => "gpt",
            ModelArch::Gqa => "gqa",
            ModelArch::Mla => "mla",
        }
    }
}

impl FromStr for ModelArch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpt" => Ok(ModelArch::Gpt),
            "gqa" => Ok(ModelArch::Gqa),
            "mla" => Ok(ModelArch::Mla),
            other => Err(format!(
                "unknown architecture {other:?} (expected gpt, gqa, or mla)"
            )),
        }
    }
}

impl std::fmt::Display for ModelArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Central configuration for the microlm pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Seed for all randomness (init, shuffling, sampling).
    pub seed: u64,
    /// Path to input corpus (one document per line).
    pub input_path: PathBuf,
    /// Path to save the trained checkpoint.
    pub checkpoint_path: PathBuf,

    /// Model variant to build.
    pub arch: ModelArch,
    /// Embedding dimension (must be divisible by `n_head`).
    pub n_embed: usize,
    /// Number of query heads.
    pub n_head: usize,
    /// Number of key/value heads (gqa only; must divide `n_head`).
    pub n_kv_head: usize,
    /// Number of transformer layers.
    pub n_layer: usize,
    /// Maximum context length in tokens.
    pub block_size: usize,
    /// Compressed KV latent dimension (mla only).
    pub n_latent: usize,
    /// Number of feed-forward experts (mla only).
    pub n_experts: usize,
    /// Nominal active experts per token (mla only). Soft routing evaluates
    /// every expert, so this is validated but otherwise unused; it is kept
    /// for parity with sparse-routing configurations.
    pub n_active_experts: usize,

    /// Weight init standard deviation.
    pub init_std: f64,
    /// RMSNorm epsilon.
    pub rmsnorm_eps: f64,

    /// Adam base learning rate (decayed by cosine to 0 over `num_steps`).
    pub learning_rate: f64,
    /// Adam beta1.
    pub beta1: f64,
    /// Adam beta2.
    pub beta2: f64,
    /// Adam epsilon.
    pub epsilon: f64,

    /// Number of training steps.
    pub num_steps: usize,
    /// Log loss every this many steps.
    pub loss_log_every: usize,

    /// Sampling temperature (0 < T <= 1).
    pub temperature: f64,
    /// Number of samples to generate after training.
    pub sample_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            checkpoint_path: PathBuf::from(DEFAULT_CHECKPOINT_PATH),
            arch: ModelArch::Gpt,
            n_embed: DEFAULT_N_EMBED,
            n_head: DEFAULT_N_HEAD,
            n_kv_head: DEFAULT_N_KV_HEAD,
            n_layer: DEFAULT_N_LAYER,
            block_size: DEFAULT_BLOCK_SIZE,
            n_latent: DEFAULT_N_LATENT,
            n_experts: DEFAULT_N_EXPERTS,
            n_active_experts: DEFAULT_N_ACTIVE_EXPERTS,
            init_std: DEFAULT_INIT_STD,
            rmsnorm_eps: DEFAULT_RMSNORM_EPS,
            learning_rate: DEFAULT_LEARNING_RATE,
            beta1: DEFAULT_BETA1,
            beta2: DEFAULT_BETA2,
            epsilon: DEFAULT_EPSILON,
            num_steps: DEFAULT_NUM_STEPS,
            loss_log_every: DEFAULT_LOSS_LOG_EVERY,
            temperature: DEFAULT_TEMPERATURE,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }
}

impl Config {
    /// Validates dimensions and ranges, including per-architecture rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first rule violated.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_head == 0 {
            return Err(ConfigError::Validation(
                "n_head must be greater than 0".to_string(),
            ));
        }
        if self.n_embed == 0 || self.n_embed % self.n_head != 0 {
            return Err(ConfigError::Validation(format!(
                "n_embed ({}) must be a positive multiple of n_head ({})",
                self.n_embed, self.n_head
            )));
        }
        if self.n_layer == 0 {
            return Err(ConfigError::Validation(
                "n_layer must be greater than 0".to_string(),
            ));
        }
        if self.block_size == 0 {
            return Err(ConfigError::Validation(
                "block_size must be greater than 0".to_string(),
            ));
        }
        if !(self.init_std > 0.0 && self.init_std.is_finite()) {
            return Err(ConfigError::Validation(
                "init_std must be positive and finite".to_string(),
            ));
        }
        if self.temperature <= 0.0 || self.temperature > 1.0 {
            return Err(ConfigError::Validation(
                "temperature must be in (0, 1]".to_string(),
            ));
        }
        match self.arch {
            ModelArch::Gpt => {}
            ModelArch::Gqa => {
                if self.n_kv_head == 0 || self.n_head % self.n_kv_head != 0 {
                    return Err(ConfigError::Validation(format!(
                        "n_kv_head ({}) must be a positive divisor of n_head ({})",
                        self.n_kv_head, self.n_head
                    )));
                }
                if self.head_dim() % 2 != 0 {
                    return Err(ConfigError::Validation(format!(
                        "head_dim ({}) must be even for rotary embedding",
                        self.head_dim()
                    )));
                }
            }
            ModelArch::Mla => {
                if self.head_dim() % 2 != 0 {
                    return Err(ConfigError::Validation(format!(
                        "head_dim ({}) must be even for rotary embedding",
                        self.head_dim()
                    )));
                }
                if self.n_latent == 0 {
                    return Err(ConfigError::Validation(
                        "n_latent must be greater than 0".to_string(),
                    ));
                }
                if self.n_experts == 0 {
                    return Err(ConfigError::Validation(
                        "n_experts must be greater than 0".to_string(),
                    ));
                }
                if self.n_active_experts == 0 || self.n_active_experts > self.n_experts {
                    return Err(ConfigError::Validation(format!(
                        "n_active_experts ({}) must be in 1..=n_experts ({})",
                        self.n_active_experts, self.n_experts
                    )));
                }
            }
        }
        Ok(())
    }

    /// Per-head dimension (`n_embed / n_head`).
    #[must_use]
    pub fn head_dim(&self) -> usize {
        self.n_embed / self.n_head
    }
}
