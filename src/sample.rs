//! Inference: autoregressive sampling from a trained model.

use rand::rngs::StdRng;
use rand_distr::weighted::WeightedIndex;
use rand_distr::Distribution;

use crate::autograd::Tape;
use crate::model::Model;
use crate::tokenizer::{Tokenizer, TokenizerError};

/// Generates one sample: starts from BOS with a fresh cache, applies a
/// temperature-scaled softmax over the logit values, draws the next token by
/// weighted choice, and stops at BOS or after `block_size` positions. The
/// tape is reset before returning, so no inference nodes survive.
///
/// # Errors
///
/// Returns [`TokenizerError::InvalidId`] if a sampled id cannot be decoded;
/// with a well-formed model the logits cover exactly the vocabulary, so this
/// indicates a construction bug upstream.
pub fn generate(
    tape: &mut Tape,
    model: &Model,
    tokenizer: &dyn Tokenizer,
    block_size: usize,
    temperature: f64,
    rng: &mut StdRng,
) -> Result<String, TokenizerError> {
    let bos = tokenizer.bos_id();
    let mut cache = model.empty_cache();
    let mut token_id = bos;
    let mut ids = Vec::new();

    for pos_id in 0..block_size {
        let logits = model.forward(tape, token_id, pos_id, &mut cache);
        // plain-number softmax: no gradients flow at inference time
        let scaled: Vec<f64> = logits
            .iter()
            .map(|&l| tape.data(l) / temperature)
            .collect();
        let max = scaled.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let weights: Vec<f64> = scaled.iter().map(|&s| (s - max).exp()).collect();

        token_id = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => bos,
        };
        if token_id == bos {
            break;
        }
        ids.push(token_id);
    }

    tape.reset();
    tokenizer.decode(&ids)
}
