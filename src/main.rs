//! Binary entrypoint: builds the configuration from the environment,
//! validates it, and runs the training and inference pipeline.

use microlm::config;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::from_env()?;
    cfg.validate()?;
    microlm::run(&cfg)
}
