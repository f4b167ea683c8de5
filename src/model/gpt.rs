//! Standard causal attention with learned absolute position embeddings and a
//! squared-ReLU feed-forward.

use rand::rngs::StdRng;

use super::{add_residual, attend_head, KvCache, MLP_RATIO};
use crate::autograd::{NodeId, Tape};
use crate::config::Config;
use crate::nn::{linear, rmsnorm};
use crate::params::ParamStore;

/// Variant with one full key/value head set per query head.
pub struct Gpt {
    n_embed: usize,
    n_head: usize,
    n_layer: usize,
    head_dim: usize,
    rmsnorm_eps: f64,
    params: ParamStore,
}

impl Gpt {
    /// Registers all weight matrices in a stable order.
    #[must_use]
    pub fn new(tape: &mut Tape, rng: &mut StdRng, cfg: &Config, vocab_size: usize) -> Self {
        let e = cfg.n_embed;
        let mut params = ParamStore::new(cfg.init_std);
        params.matrix(tape, rng, "wte", vocab_size, e);
        params.matrix(tape, rng, "wpe", cfg.block_size, e);
        for li in 0..cfg.n_layer {
            params.matrix(tape, rng, &format!("l{li}.attn.wq"), e, e);
            params.matrix(tape, rng, &format!("l{li}.attn.wk"), e, e);
            params.matrix(tape, rng, &format!("l{li}.attn.wv"), e, e);
            params.matrix(tape, rng, &format!("l{li}.attn.wo"), e, e);
            params.matrix(tape, rng, &format!("l{li}.mlp.w_up"), MLP_RATIO * e, e);
            params.matrix(tape, rng, &format!("l{li}.mlp.w_down"), e, MLP_RATIO * e);
        }
        params.matrix(tape, rng, "lm_head", vocab_size, e);

        Gpt {
            n_embed: e,
            n_head: cfg.n_head,
            n_layer: cfg.n_layer,
            head_dim: cfg.head_dim(),
            rmsnorm_eps: cfg.rmsnorm_eps,
            params,
        }
    }

    /// One forward pass: appends this position's keys and values to the
    /// cache and returns vocabulary logits. `pos_id` must stay below the
    /// block size the position table was built for.
    pub fn forward(
        &self,
        tape: &mut Tape,
        token_id: usize,
        pos_id: usize,
        cache: &mut KvCache,
    ) -> Vec<NodeId> {
        let wte = self.params.get("wte");
        let wpe = self.params.get("wpe");
        let mut x: Vec<NodeId> = (0..self.n_embed)
            .map(|j| tape.add(wte[token_id][j], wpe[pos_id][j]))
            .collect();
        x = rmsnorm(tape, &x, self.rmsnorm_eps);

        for li in 0..self.n_layer {
            let residual = x.clone();
            let xn = rmsnorm(tape, &x, self.rmsnorm_eps);

            let q = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wq")));
            let k = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wk")));
            let v = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wv")));
            cache.push(li, k, v);

            let mut attn = Vec::with_capacity(self.n_embed);
            for h in 0..self.n_head {
                let hs = h * self.head_dim;
                let q_h = &q[hs..hs + self.head_dim];
                let k_h: Vec<Vec<NodeId>> = cache
                    .keys(li)
                    .iter()
                    .map(|ki| ki[hs..hs + self.head_dim].to_vec())
                    .collect();
                let v_h: Vec<Vec<NodeId>> = cache
                    .values(li)
                    .iter()
                    .map(|vi| vi[hs..hs + self.head_dim].to_vec())
                    .collect();
                attn.extend(attend_head(tape, q_h, &k_h, &v_h));
            }
            let projected = linear(tape, &attn, self.params.get(&format!("l{li}.attn.wo")));
            x = add_residual(tape, &projected, &residual);

            let residual = x.clone();
            let xn = rmsnorm(tape, &x, self.rmsnorm_eps);
            let up = linear(tape, &xn, self.params.get(&format!("l{li}.mlp.w_up")));
            // squared ReLU
            let hidden: Vec<NodeId> = up
                .iter()
                .map(|&u| {
                    let r = tape.relu(u);
                    tape.mul(r, r)
                })
                .collect();
            let down = linear(tape, &hidden, self.params.get(&format!("l{li}.mlp.w_down")));
            x = add_residual(tape, &down, &residual);
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
