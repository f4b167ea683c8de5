//! # microlm
//!
//! Educational language modeling from scratch: a scalar reverse-mode autodiff
//! engine and three small transformer-style architectures built on top of it,
//! processing one token position at a time.
//!
//! - `gpt`: causal attention with learned absolute positions and a
//!   squared-ReLU feed-forward.
//! - `gqa`: grouped-query rotary attention with a SwiGLU feed-forward.
//! - `mla`: latent-compressed attention with a soft mixture-of-experts
//!   feed-forward.
//!
//! [`run`] wires the full pipeline: load a corpus, build a character
//! tokenizer, train with Adam under cosine decay, checkpoint, then sample.

pub mod autograd;
pub mod config;
pub mod data;
pub mod model;
pub mod nn;
pub mod params;
pub mod sample;
pub mod tokenizer;
pub mod train;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use autograd::Tape;
use config::Config;
use model::Model;
use tokenizer::{CharTokenizer, Tokenizer};
use train::StepReport;

/// Runs the full pipeline: load data, train, checkpoint, then inference.
///
/// Prints progress and samples to stdout.
///
/// # Errors
///
/// Surfaces configuration, data, tokenizer, and checkpoint errors; any of
/// them aborts the run.
pub fn run(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    run_impl(cfg, None)
}

/// Internal implementation: when `max_steps` is `Some(n)`, training stops
/// after n steps and only two samples are drawn (for tests).
#[doc(hidden)]
pub fn run_impl(cfg: &Config, max_steps: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    cfg.validate()?;
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    let mut docs = data::load_documents(&cfg.input_path)?;
    docs.shuffle(&mut rng);
    println!("num docs: {}", docs.len());

    let tokenizer = CharTokenizer::from_documents(&docs);
    println!("vocab size: {}", tokenizer.vocab_size());

    let mut tape = Tape::new();
    let model = Model::new(&mut tape, &mut rng, cfg, tokenizer.vocab_size());
    println!("arch: {} | num params: {}", cfg.arch, model.parameters().len());

    let steps = max_steps.unwrap_or(cfg.num_steps);
    let log_every = cfg.loss_log_every.max(1);
    train::train_loop(
        &mut tape,
        &model,
        cfg,
        &tokenizer,
        &docs,
        steps,
        &mut |r: &StepReport| {
            if (r.step + 1) % log_every == 0 || r.step == 0 {
                println!(
                    "step {:4} / {:4} | loss {:.4} | lr {:.5}",
                    r.step + 1,
                    r.num_steps,
                    r.loss,
                    r.lr
                );
            }
        },
    )?;

    model.save(&tape, &cfg.checkpoint_path)?;
    println!("saved checkpoint to {}", cfg.checkpoint_path.display());

    let samples = if max_steps.is_some() { 2 } else { cfg.sample_size };
    println!("\n--- inference (new, hallucinated samples) ---");
    for idx in 0..samples {
        let text = sample::generate(
            &mut tape,
            &model,
            &tokenizer,
            cfg.block_size,
            cfg.temperature,
            &mut rng,
        )?;
        println!("sample {:2}: {}", idx + 1, text);
    }

    Ok(())
}
