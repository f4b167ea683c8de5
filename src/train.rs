//! Training driver: document encoding, the per-document training step, the
//! Adam optimizer with cosine learning-rate decay, and the outer loop.
//!
//! Progress is delivered to an injected observer callback; this module never
//! prints on its own.

use crate::autograd::{NodeId, Tape};
use crate::config::Config;
use crate::model::Model;
use crate::nn::softmax;
use crate::tokenizer::{Tokenizer, TokenizerError};

/// Snapshot of one finished training step, handed to the observer.
pub struct StepReport {
    /// Zero-based step index.
    pub step: usize,
    /// Total steps in this run.
    pub num_steps: usize,
    /// Mean next-token negative log-likelihood over the document.
    pub loss: f64,
    /// Learning rate used for this step.
    pub lr: f64,
}

/// Adam optimizer over a flat parameter list, with cosine learning-rate
/// decay from the base rate to 0 across a fixed step budget.
pub struct Adam {
    m: Vec<f64>,
    v: Vec<f64>,
    steps_done: usize,
    base_lr: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    schedule_steps: usize,
}

impl Adam {
    /// Optimizer state for `n_params` parameters. The decay schedule spans
    /// `cfg.num_steps` regardless of how many steps are actually run.
    #[must_use]
    pub fn new(cfg: &Config, n_params: usize) -> Self {
        Adam {
            m: vec![0.0; n_params],
            v: vec![0.0; n_params],
            steps_done: 0,
            base_lr: cfg.learning_rate,
            beta1: cfg.beta1,
            beta2: cfg.beta2,
            epsilon: cfg.epsilon,
            schedule_steps: cfg.num_steps.max(1),
        }
    }

    /// Learning rate for the next step: cosine decay, starting at the base
    /// rate and reaching 0 at the end of the schedule.
    #[must_use]
    pub fn lr(&self) -> f64 {
        let progress = (self.steps_done as f64 / self.schedule_steps as f64).min(1.0);
        0.5 * self.base_lr * (1.0 + (std::f64::consts::PI * progress).cos())
    }

    /// One update over every parameter: bias-corrected moment estimates,
    /// then `data -= lr * m_hat / (sqrt(v_hat) + eps)`. Zeroes each
    /// parameter's gradient afterwards. Returns the learning rate used.
    pub fn step(&mut self, tape: &mut Tape, params: &[NodeId]) -> f64 {
        assert_eq!(params.len(), self.m.len(), "optimizer/parameter count mismatch");
        let lr = self.lr();
        let t = self.steps_done as i32 + 1;
        for (i, &p) in params.iter().enumerate() {
            let grad = tape.grad(p);
            self.m[i] = self.beta1 * self.m[i] + (1.0 - self.beta1) * grad;
            self.v[i] = self.beta2 * self.v[i] + (1.0 - self.beta2) * grad * grad;
            let m_hat = self.m[i] / (1.0 - self.beta1.powi(t));
            let v_hat = self.v[i] / (1.0 - self.beta2.powi(t));
            let updated = tape.data(p) - lr * m_hat / (v_hat.sqrt() + self.epsilon);
            tape.set_data(p, updated);
            tape.zero_grad(p);
        }
        self.steps_done += 1;
        lr
    }
}

/// BOS-wraps a document and truncates it so at most `block_size` positions
/// are trained on.
///
/// # Errors
///
/// Returns [`TokenizerError::UnknownSymbol`] if the document contains a
/// character outside the vocabulary.
pub fn encode_document(
    tokenizer: &dyn Tokenizer,
    doc: &str,
    block_size: usize,
) -> Result<Vec<usize>, TokenizerError> {
    let mut tokens = vec![tokenizer.bos_id()];
    tokens.extend(tokenizer.encode(doc)?);
    tokens.push(tokenizer.bos_id());
    tokens.truncate(block_size + 1);
    Ok(tokens)
}

/// One training step on one encoded document: a fresh cache, one forward per
/// position, mean negative log-likelihood of each next token, one backward,
/// one Adam update, then a tape reset. Returns `(loss, lr)`.
///
/// `tokens` must hold at least two ids (one position and its target).
pub fn train_step(
    tape: &mut Tape,
    model: &Model,
    tokens: &[usize],
    adam: &mut Adam,
    params: &[NodeId],
) -> (f64, f64) {
    assert!(tokens.len() >= 2, "a document must yield at least one target");
    let n = tokens.len() - 1;

    let mut cache = model.empty_cache();
    let mut total = tape.leaf(0.0);
    for pos in 0..n {
        let logits = model.forward(tape, tokens[pos], pos, &mut cache);
        let probs = softmax(tape, &logits);
        let lp = tape.log(probs[tokens[pos + 1]]);
        let nll = tape.neg(lp);
        total = tape.add(total, nll);
    }
    let count = tape.leaf(n as f64);
    let loss = tape.div(total, count);

    tape.backward(loss);
    let loss_val = tape.data(loss);
    let lr = adam.step(tape, params);
    tape.reset();
    (loss_val, lr)
}

/// Runs `num_steps` training steps, cycling through `docs` in order, and
/// reports each step to `observer`.
///
/// # Errors
///
/// Returns [`TokenizerError`] if any document fails to encode.
pub fn train_loop(
    tape: &mut Tape,
    model: &Model,
    cfg: &Config,
    tokenizer: &dyn Tokenizer,
    docs: &[String],
    num_steps: usize,
    observer: &mut dyn FnMut(&StepReport),
) -> Result<(), TokenizerError> {
    let params = model.parameters();
    let mut adam = Adam::new(cfg, params.len());
    for step in 0..num_steps {
        let doc = &docs[step % docs.len()];
        let tokens = encode_document(tokenizer, doc, cfg.block_size)?;
        let (loss, lr) = train_step(tape, model, &tokens, &mut adam, &params);
        observer(&StepReport {
            step,
            num_steps,
            loss,
            lr,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelArch;
    use crate::tokenizer::CharTokenizer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn train_config() -> Config {
        Config {
            arch: ModelArch::Gpt,
            n_embed: 8,
            n_head: 2,
            n_layer: 1,
            block_size: 8,
            learning_rate: 0.05,
            num_steps: 40,
            ..Config::default()
        }
    }

    #[test]
    fn cosine_schedule_starts_at_base_and_decays_to_zero() {
        let cfg = Config {
            learning_rate: 0.01,
            num_steps: 10,
            ..Config::default()
        };
        let mut tape = Tape::new();
        let mut adam = Adam::new(&cfg, 0);
        assert!((adam.lr() - 0.01).abs() < 1e-15);
        for _ in 0..5 {
            adam.step(&mut tape, &[]);
        }
        assert!((adam.lr() - 0.005).abs() < 1e-15, "halfway should be half the base");
        for _ in 0..5 {
            adam.step(&mut tape, &[]);
        }
        assert!(adam.lr() < 1e-15);
    }

    #[test]
    fn adam_minimizes_a_quadratic() {
        let cfg = Config {
            learning_rate: 0.1,
            num_steps: 200,
            ..Config::default()
        };
        let mut tape = Tape::new();
        let w = tape.leaf(5.0);
        tape.freeze();

        let mut adam = Adam::new(&cfg, 1);
        for _ in 0..150 {
            let loss = tape.mul(w, w);
            tape.backward(loss);
            adam.step(&mut tape, &[w]);
            tape.reset();
        }
        assert!(tape.data(w).abs() < 0.5, "w stayed at {}", tape.data(w));
    }

    #[test]
    fn encode_document_wraps_with_bos() {
        let docs = vec!["ab".to_string()];
        let tok = CharTokenizer::from_documents(&docs);
        let tokens = encode_document(&tok, "ab", 16).unwrap();
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], tok.bos_id());
        assert_eq!(tokens[3], tok.bos_id());
    }

    #[test]
    fn encode_document_truncates_to_block_size() {
        let docs = vec!["abcdef".to_string()];
        let tok = CharTokenizer::from_documents(&docs);
        let tokens = encode_document(&tok, "abcdef", 3).unwrap();
        // block_size positions means block_size + 1 ids at most
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0], tok.bos_id());
    }

    #[test]
    fn encode_document_propagates_unknown_symbols() {
        let docs = vec!["ab".to_string()];
        let tok = CharTokenizer::from_documents(&docs);
        assert!(matches!(
            encode_document(&tok, "abz", 16),
            Err(TokenizerError::UnknownSymbol('z'))
        ));
    }

    #[test]
    fn repeated_steps_on_one_document_reduce_loss() {
        let cfg = train_config();
        cfg.validate().unwrap();
        let docs = vec!["abab".to_string()];
        let tok = CharTokenizer::from_documents(&docs);

        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(17);
        let model = Model::new(&mut tape, &mut rng, &cfg, tok.vocab_size());
        let params = model.parameters();
        let mut adam = Adam::new(&cfg, params.len());

        let tokens = encode_document(&tok, &docs[0], cfg.block_size).unwrap();
        let (first, _) = train_step(&mut tape, &model, &tokens, &mut adam, &params);
        let mut last = first;
        for _ in 0..29 {
            let (loss, _) = train_step(&mut tape, &model, &tokens, &mut adam, &params);
            last = loss;
        }
        assert!(
            last < first,
            "loss did not improve: first {first}, last {last}"
        );
    }

    #[test]
    fn train_loop_reports_every_step() {
        let cfg = train_config();
        let docs = vec!["ab".to_string(), "ba".to_string()];
        let tok = CharTokenizer::from_documents(&docs);

        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(2);
        let model = Model::new(&mut tape, &mut rng, &cfg, tok.vocab_size());

        let mut reports = Vec::new();
        train_loop(&mut tape, &model, &cfg, &tok, &docs, 5, &mut |r| {
            reports.push((r.step, r.num_steps, r.loss, r.lr));
        })
        .unwrap();
        assert_eq!(reports.len(), 5);
        assert_eq!(reports[0].0, 0);
        assert_eq!(reports[4].1, 5);
        assert!(reports.iter().all(|r| r.2.is_finite()));
    }
}
