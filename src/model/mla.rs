//! Latent attention with a soft mixture-of-experts feed-forward.
//!
//! Instead of caching keys and values, each position caches one compressed
//! latent vector; keys and values are reconstructed from every cached latent
//! through a shared up-projection on every read. Smaller cache, more
//! recomputation.

use rand::rngs::StdRng;

use super::{add_residual, attend_head, swiglu, LatentCache, MLP_RATIO};
use crate::autograd::{NodeId, Tape};
use crate::config::Config;
use crate::nn::{linear, rmsnorm, rope, softmax};
use crate::params::ParamStore;

/// Variant with a latent-only cache and soft expert routing.
pub struct Mla {
    n_embed: usize,
    n_head: usize,
    n_layer: usize,
    head_dim: usize,
    n_experts: usize,
    rmsnorm_eps: f64,
    params: ParamStore,
}

impl Mla {
    /// Registers all weight matrices in a stable order. `w_dkv` compresses
    /// the input to the latent width; `w_ukv` expands a latent back to a
    /// combined key-and-value vector of twice the embedding width.
    #[must_use]
    pub fn new(tape: &mut Tape, rng: &mut StdRng, cfg: &Config, vocab_size: usize) -> Self {
        let e = cfg.n_embed;
        let mut params = ParamStore::new(cfg.init_std);
        params.matrix(tape, rng, "wte", vocab_size, e);
        for li in 0..cfg.n_layer {
            params.matrix(tape, rng, &format!("l{li}.attn.wq"), e, e);
            params.matrix(tape, rng, &format!("l{li}.attn.w_dkv"), cfg.n_latent, e);
            params.matrix(tape, rng, &format!("l{li}.attn.w_ukv"), 2 * e, cfg.n_latent);
            params.matrix(tape, rng, &format!("l{li}.attn.wo"), e, e);
            params.matrix(tape, rng, &format!("l{li}.moe.router"), cfg.n_experts, e);
            for ex in 0..cfg.n_experts {
                params.matrix(tape, rng, &format!("l{li}.moe.e{ex}.w_gate"), MLP_RATIO * e, e);
                params.matrix(tape, rng, &format!("l{li}.moe.e{ex}.w_up"), MLP_RATIO * e, e);
                params.matrix(tape, rng, &format!("l{li}.moe.e{ex}.w_down"), e, MLP_RATIO * e);
            }
        }
        params.matrix(tape, rng, "lm_head", vocab_size, e);

        Mla {
            n_embed: e,
            n_head: cfg.n_head,
            n_layer: cfg.n_layer,
            head_dim: cfg.head_dim(),
            n_experts: cfg.n_experts,
            rmsnorm_eps: cfg.rmsnorm_eps,
            params,
        }
    }

    /// One forward pass: appends this position's latent to the cache,
    /// reconstructs keys and values for every cached position, and returns
    /// vocabulary logits.
    pub fn forward(
        &self,
        tape: &mut Tape,
        token_id: usize,
        pos_id: usize,
        cache: &mut LatentCache,
    ) -> Vec<NodeId> {
        let wte = self.params.get("wte");
        let mut x = wte[token_id].clone();
        x = rmsnorm(tape, &x, self.rmsnorm_eps);

        for li in 0..self.n_layer {
            let residual = x.clone();
            let xn = rmsnorm(tape, &x, self.rmsnorm_eps);

            let q_raw = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wq")));
            let mut q = Vec::with_capacity(self.n_embed);
            for h in 0..self.n_head {
                let hs = h * self.head_dim;
                q.extend(rope(tape, &q_raw[hs..hs + self.head_dim], pos_id));
            }

            let latent = linear(tape, &xn, self.params.get(&format!("l{li}.attn.w_dkv")));
            cache.push(li, latent);

            // Rebuild key/value pairs from every cached latent. Keys are
            // rotated at a fixed reference position rather than the position
            // they were cached at, so relative position reaches the scores
            // only through the query rotation. Nonstandard for rotary
            // embeddings, but changing it changes what a trained checkpoint
            // means, so it stays.
            let w_ukv = self.params.get(&format!("l{li}.attn.w_ukv"));
            let mut keys = Vec::with_capacity(cache.latents(li).len());
            let mut values = Vec::with_capacity(cache.latents(li).len());
            for lat in cache.latents(li) {
                let kv = linear(tape, lat, w_ukv);
                let mut k = Vec::with_capacity(self.n_embed);
                for h in 0..self.n_head {
                    let hs = h * self.head_dim;
                    k.extend(rope(tape, &kv[hs..hs + self.head_dim], 0));
                }
                keys.push(k);
                values.push(kv[self.n_embed..].to_vec());
            }

            let mut attn = Vec::with_capacity(self.n_embed);
            for h in 0..self.n_head {
                let hs = h * self.head_dim;
                let q_h = &q[hs..hs + self.head_dim];
                let k_h: Vec<Vec<NodeId>> = keys
                    .iter()
                    .map(|ki| ki[hs..hs + self.head_dim].to_vec())
                    .collect();
                let v_h: Vec<Vec<NodeId>> = values
                    .iter()
                    .map(|vi| vi[hs..hs + self.head_dim].to_vec())
                    .collect();
                attn.extend(attend_head(tape, q_h, &k_h, &v_h));
            }
            let projected = linear(tape, &attn, self.params.get(&format!("l{li}.attn.wo")));
            x = add_residual(tape, &projected, &residual);

            // Soft mixture of experts: every expert runs, the router softmax
            // weights their outputs. No hard top-k gating.
            let residual = x.clone();
            let xn = rmsnorm(tape, &x, self.rmsnorm_eps);
            let router_logits = linear(tape, &xn, self.params.get(&format!("l{li}.moe.router")));
            let weights = softmax(tape, &router_logits);

            let mut mixed: Vec<NodeId> = (0..self.n_embed).map(|_| tape.leaf(0.0)).collect();
            for ex in 0..self.n_experts {
                let expert_out = swiglu(
                    tape,
                    &xn,
                    self.params.get(&format!("l{li}.moe.e{ex}.w_gate")),
                    self.params.get(&format!("l{li}.moe.e{ex}.w_up")),
                    self.params.get(&format!("l{li}.moe.e{ex}.w_down")),
                );
                for (m, &o) in mixed.iter_mut().zip(expert_out.iter()) {
                    let weighted = tape.mul(weights[ex], o);
                    *m = tape.add(*m, weighted);
                }
            }
            x = add_residual(tape, &mixed, &residual);
        }

        let x = rmsnorm(tape, &x, self.rmsnorm_eps);
        linear(tape, &x, self.params.get("lm_head"))
    }

    pub(crate) fn n_layer(&self) -> usize {
        self.n_layer
    }

    pub(crate) fn params(&self) -> &ParamStore {
        &self.params
    }
}
