//! Model variants: three transformer-style forward-pass assemblies over one
//! differentiable substrate.
//!
//! All variants share the same contract: `forward(tape, token, pos, cache)`
//! builds a fresh subgraph and returns vocabulary-sized logit nodes, with the
//! cache appended to as a side effect. They also share the outer frame:
//! embedding lookup, RMS norm, the layer stack, a final RMS norm, and the
//! vocabulary projection. They differ in attention and feed-forward internals,
//! so they are modeled as a closed sum type rather than a trait object.

mod cache;
mod gpt;
mod gqa;
mod mla;

pub use cache::{Cache, KvCache, LatentCache};
pub use gpt::Gpt;
pub use gqa::Gqa;
pub use mla::Mla;

use std::path::Path;

use rand::rngs::StdRng;

use crate::autograd::{NodeId, Tape};
use crate::config::{Config, ModelArch};
use crate::nn::{linear, softmax};
use crate::params::{CheckpointError, ParamStore};

/// Feed-forward hidden width as a multiple of the embedding dimension.
pub(crate) const MLP_RATIO: usize = 4;

/// One attention head: scaled dot-product scores against every cached key,
/// softmax over all positions so far (causal by construction), weighted sum
/// of cached values.
pub(crate) fn attend_head(
    tape: &mut Tape,
    q: &[NodeId],
    keys: &[Vec<NodeId>],
    values: &[Vec<NodeId>],
) -> Vec<NodeId> {
    let head_dim = q.len();
    let scale = tape.leaf((head_dim as f64).sqrt());

    let mut scores = Vec::with_capacity(keys.len());
    for k in keys {
        assert_eq!(k.len(), head_dim, "attention: key/query width mismatch");
        let mut dot = tape.leaf(0.0);
        for j in 0..head_dim {
            let prod = tape.mul(q[j], k[j]);
            dot = tape.add(dot, prod);
        }
        scores.push(tape.div(dot, scale));
    }

    let weights = softmax(tape, &scores);
    let mut out = Vec::with_capacity(head_dim);
    for j in 0..head_dim {
        let mut acc = tape.leaf(0.0);
        for (v, &w) in values.iter().zip(weights.iter()) {
            let term = tape.mul(w, v[j]);
            acc = tape.add(acc, term);
        }
        out.push(acc);
    }
    out
}

/// SwiGLU feed-forward: `down(silu(gate(x)) * up(x))`.
pub(crate) fn swiglu(
    tape: &mut Tape,
    x: &[NodeId],
    w_gate: &[Vec<NodeId>],
    w_up: &[Vec<NodeId>],
    w_down: &[Vec<NodeId>],
) -> Vec<NodeId> {
    let gate = linear(tape, x, w_gate);
    let up = linear(tape, x, w_up);
    let hidden: Vec<NodeId> = gate
        .iter()
        .zip(up.iter())
        .map(|(&g, &u)| {
            let s = tape.silu(g);
            tape.mul(s, u)
        })
        .collect();
    linear(tape, &hidden, w_down)
}

/// Elementwise residual add.
pub(crate) fn add_residual(tape: &mut Tape, x: &[NodeId], residual: &[NodeId]) -> Vec<NodeId> {
    x.iter()
        .zip(residual.iter())
        .map(|(&a, &b)| tape.add(a, b))
        .collect()
}

/// A language model: one of the three architecture variants.
pub enum Model {
    /// Standard attention with learned absolute positions.
    Gpt(Gpt),
    /// Grouped-query rotary attention.
    Gqa(Gqa),
    /// Latent-compressed attention with mixture-of-experts feed-forward.
    Mla(Mla),
}

impl Model {
    /// Builds the variant selected by `cfg.arch`, registers its parameters,
    /// and freezes the tape so resets preserve them.
    #[must_use]
    pub fn new(tape: &mut Tape, rng: &mut StdRng, cfg: &Config, vocab_size: usize) -> Self {
        let model = match cfg.arch {
            ModelArch::Gpt => Model::Gpt(Gpt::new(tape, rng, cfg, vocab_size)),
            ModelArch::Gqa => Model::Gqa(Gqa::new(tape, rng, cfg, vocab_size)),
            ModelArch::Mla => Model::Mla(Mla::new(tape, rng, cfg, vocab_size)),
        };
        tape.freeze();
        model
    }

    /// Fresh, empty cache of the kind this variant expects. One per sequence.
    #[must_use]
    pub fn empty_cache(&self) -> Cache {
        match self {
            Model::Gpt(m) => Cache::Kv(KvCache::new(m.n_layer())),
            Model::Gqa(m) => Cache::Kv(KvCache::new(m.n_layer())),
            Model::Mla(m) => Cache::Latent(LatentCache::new(m.n_layer())),
        }
    }

    /// One forward pass: appends to the cache and returns vocabulary logits.
    ///
    /// Panics if the cache kind does not match the architecture; that is a
    /// construction bug, not a recoverable state.
    pub fn forward(
        &self,
        tape: &mut Tape,
        token_id: usize,
        pos_id: usize,
        cache: &mut Cache,
    ) -> Vec<NodeId> {
        match (self, cache) {
            (Model::Gpt(m), Cache::Kv(kv)) => m.forward(tape, token_id, pos_id, kv),
            (Model::Gqa(m), Cache::Kv(kv)) => m.forward(tape, token_id, pos_id, kv),
            (Model::Mla(m), Cache::Latent(lc)) => m.forward(tape, token_id, pos_id, lc),
            _ => panic!("cache kind does not match model architecture"),
        }
    }

    /// Flat ordered list of every trainable leaf, stable across calls,
    /// save, and load.
    #[must_use]
    pub fn parameters(&self) -> Vec<NodeId> {
        self.params().flat()
    }

    /// Writes all parameter values to a checkpoint file.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] on write failure.
    pub fn save(&self, tape: &Tape, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        self.params().save(tape, path)
    }

    /// Restores all parameter values from a checkpoint file.
    ///
    /// # Errors
    ///
    /// Returns [`CheckpointError::Io`] on read failure and
    /// [`CheckpointError::LengthMismatch`] if the file does not hold exactly
    /// one value per parameter.
    pub fn load(&self, tape: &mut Tape, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        self.params().load(tape, path)
    }

    fn params(&self) -> &ParamStore {
        match self {
            Model::Gpt(m) => m.params(),
            Model::Gqa(m) => m.params(),
            Model::Mla(m) => m.params(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn tiny_config(arch: ModelArch) -> Config {
        Config {
            arch,
            n_embed: 8,
            n_head: 2,
            n_kv_head: 1,
            n_layer: 2,
            block_size: 4,
            n_latent: 4,
            n_experts: 2,
            n_active_experts: 1,
            ..Config::default()
        }
    }

    fn build(arch: ModelArch, vocab_size: usize, seed: u64) -> (Tape, Model) {
        let cfg = tiny_config(arch);
        cfg.validate().unwrap();
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let model = Model::new(&mut tape, &mut rng, &cfg, vocab_size);
        (tape, model)
    }

    #[test]
    fn logits_length_matches_vocab_for_every_arch() {
        for arch in [ModelArch::Gpt, ModelArch::Gqa, ModelArch::Mla] {
            let (mut tape, model) = build(arch, 5, 42);
            let mut cache = model.empty_cache();
            let logits = model.forward(&mut tape, 0, 0, &mut cache);
            assert_eq!(logits.len(), 5, "wrong logits length for {arch:?}");
        }
    }

    #[test]
    fn cache_grows_one_entry_per_forward_call() {
        for arch in [ModelArch::Gpt, ModelArch::Gqa, ModelArch::Mla] {
            let (mut tape, model) = build(arch, 4, 7);
            let mut cache = model.empty_cache();
            assert!(cache.is_empty());
            for pos in 0..3 {
                model.forward(&mut tape, pos % 4, pos, &mut cache);
                assert_eq!(cache.len(), pos + 1);
            }
        }
    }

    #[test]
    fn fixed_seed_gives_bit_identical_logits() {
        for arch in [ModelArch::Gpt, ModelArch::Gqa, ModelArch::Mla] {
            let (mut tape_a, model_a) = build(arch, 4, 11);
            let (mut tape_b, model_b) = build(arch, 4, 11);
            let mut cache_a = model_a.empty_cache();
            let mut cache_b = model_b.empty_cache();
            let la = model_a.forward(&mut tape_a, 1, 0, &mut cache_a);
            let lb = model_b.forward(&mut tape_b, 1, 0, &mut cache_b);
            for (&a, &b) in la.iter().zip(lb.iter()) {
                assert_eq!(tape_a.data(a).to_bits(), tape_b.data(b).to_bits());
            }
        }
    }

    #[test]
    #[should_panic(expected = "cache kind")]
    fn mismatched_cache_kind_panics() {
        let (mut tape, model) = build(ModelArch::Gpt, 4, 1);
        let mut cache = Cache::Latent(LatentCache::new(2));
        model.forward(&mut tape, 0, 0, &mut cache);
    }

    #[test]
    fn parameter_list_is_stable_across_calls() {
        let (_tape, model) = build(ModelArch::Gqa, 4, 3);
        assert_eq!(model.parameters(), model.parameters());
        assert!(!model.parameters().is_empty());
    }

    #[test]
    fn gqa_caches_kv_head_sized_vectors() {
        let (mut tape, model) = build(ModelArch::Gqa, 4, 5);
        let mut cache = model.empty_cache();
        model.forward(&mut tape, 0, 0, &mut cache);
        let Cache::Kv(kv) = &cache else {
            panic!("gqa uses a kv cache");
        };
        // n_kv_head (1) * head_dim (4), not the full embedding width (8)
        assert_eq!(kv.keys(0)[0].len(), 4);
        assert_eq!(kv.values(0)[0].len(), 4);
    }

    #[test]
    fn mla_caches_only_latents() {
        let (mut tape, model) = build(ModelArch::Mla, 4, 5);
        let mut cache = model.empty_cache();
        model.forward(&mut tape, 0, 0, &mut cache);
        model.forward(&mut tape, 1, 1, &mut cache);
        let Cache::Latent(lc) = &cache else {
            panic!("mla uses a latent cache");
        };
        assert_eq!(lc.latents(0).len(), 2);
        assert_eq!(lc.latents(0)[0].len(), 4);
    }

    /// Builds `-log(softmax(logits)[target])` for one forward pass on a
    /// fresh cache.
    fn forward_loss(tape: &mut Tape, model: &Model, token: usize, target: usize) -> NodeId {
        let mut cache = model.empty_cache();
        let logits = model.forward(tape, token, 0, &mut cache);
        let probs = softmax(tape, &logits);
        let lp = tape.log(probs[target]);
        tape.neg(lp)
    }

    #[test]
    fn backward_touches_exactly_the_used_embedding_rows() {
        let cfg = Config {
            arch: ModelArch::Gpt,
            n_embed: 4,
            n_head: 2,
            n_layer: 1,
            block_size: 2,
            ..Config::default()
        };
        cfg.validate().unwrap();
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(9);
        let model = Model::new(&mut tape, &mut rng, &cfg, 3);

        let loss = forward_loss(&mut tape, &model, 0, 1);
        tape.backward(loss);

        let Model::Gpt(gpt) = &model else {
            panic!("built a gpt model");
        };
        let wte = gpt.params().get("wte");
        let wpe = gpt.params().get("wpe");
        // token 0 / position 0 rows carry gradient; the others stay zero
        assert!(wte[0].iter().any(|&id| tape.grad(id) != 0.0));
        assert!(wte[1].iter().all(|&id| tape.grad(id) == 0.0));
        assert!(wte[2].iter().all(|&id| tape.grad(id) == 0.0));
        assert!(wpe[0].iter().any(|&id| tape.grad(id) != 0.0));
        assert!(wpe[1].iter().all(|&id| tape.grad(id) == 0.0));
    }

    #[test]
    fn moe_router_receives_gradient() {
        let (mut tape, model) = build(ModelArch::Mla, 3, 21);
        let loss = forward_loss(&mut tape, &model, 0, 1);
        tape.backward(loss);
        let Model::Mla(mla) = &model else {
            panic!("built an mla model");
        };
        let router = mla.params().get("l0.moe.router");
        let any_nonzero = router
            .iter()
            .flat_map(|row| row.iter())
            .any(|&id| tape.grad(id) != 0.0);
        assert!(any_nonzero, "router weights never received gradient");
    }

    #[test]
    fn full_forward_gradients_match_finite_differences() {
        const STEP: f64 = 1e-5;
        const TOL: f64 = 1e-4;

        for arch in [ModelArch::Gpt, ModelArch::Gqa, ModelArch::Mla] {
            let cfg = Config {
                arch,
                n_embed: 4,
                n_head: 2,
                n_kv_head: 1,
                n_layer: 1,
                block_size: 2,
                n_latent: 2,
                n_experts: 2,
                n_active_experts: 1,
                ..Config::default()
            };
            cfg.validate().unwrap();
            let mut tape = Tape::new();
            let mut rng = StdRng::seed_from_u64(13);
            let model = Model::new(&mut tape, &mut rng, &cfg, 3);
            let params = model.parameters();

            let loss = forward_loss(&mut tape, &model, 0, 1);
            tape.backward(loss);
            let grads: Vec<f64> = params.iter().map(|&p| tape.grad(p)).collect();
            for &p in &params {
                tape.zero_grad(p);
            }
            tape.reset();

            // spot-check a spread of parameters rather than all of them
            for (i, &p) in params.iter().enumerate().step_by(7) {
                let orig = tape.data(p);

                tape.set_data(p, orig + STEP);
                let loss_plus = forward_loss(&mut tape, &model, 0, 1);
                let plus = tape.data(loss_plus);
                tape.reset();

                tape.set_data(p, orig - STEP);
                let loss_minus = forward_loss(&mut tape, &model, 0, 1);
                let minus = tape.data(loss_minus);
                tape.reset();

                tape.set_data(p, orig);
                let fd = (plus - minus) / (2.0 * STEP);
                assert!(
                    (grads[i] - fd).abs() <= TOL * (1.0 + fd.abs()),
                    "{arch:?} param {i}: analytic {} vs finite-difference {fd}",
                    grads[i]
                );
            }
        }
    }
}
