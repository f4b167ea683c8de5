//! Grouped-query attention with rotary position embeddings and a SwiGLU
//! feed-forward. Position is carried entirely by RoPE; there is no learned
//! position table.

use rand::rngs::StdRng;

use super::{add_residual, attend_head, swiglu, KvCache, MLP_RATIO};
use crate::autograd::{NodeId, Tape};
use crate::config::Config;
use crate::nn::{linear, rmsnorm, rope};
use crate::params::ParamStore;

/// Variant where groups of query heads share one key/value head.
pub struct Gqa {
    n_embed: usize,
    n_head: usize,
    n_kv_head: usize,
    n_layer: usize,
    head_dim: usize,
    rmsnorm_eps: f64,
    params: ParamStore,
}

impl Gqa {
    /// Registers all weight matrices in a stable order. Key and value
    /// projections are `n_kv_head * head_dim` wide, narrower than the
    /// query projection.
    #[must_use]
    pub fn new(tape: &mut Tape, rng: &mut StdRng, cfg: &Config, vocab_size: usize) -> Self {
        let e = cfg.n_embed;
        let kv_dim = cfg.n_kv_head * cfg.head_dim();
        let mut params = ParamStore::new(cfg.init_std);
        params.matrix(tape, rng, "wte", vocab_size, e);
        for li in 0..cfg.n_layer {
            params.matrix(tape, rng, &format!("l{li}.attn.wq"), e, e);
            params.matrix(tape, rng, &format!("l{li}.attn.wk"), kv_dim, e);
            params.matrix(tape, rng, &format!("l{li}.attn.wv"), kv_dim, e);
            params.matrix(tape, rng, &format!("l{li}.attn.wo"), e, e);
            params.matrix(tape, rng, &format!("l{li}.ffn.w_gate"), MLP_RATIO * e, e);
            params.matrix(tape, rng, &format!("l{li}.ffn.w_up"), MLP_RATIO * e, e);
            params.matrix(tape, rng, &format!("l{li}.ffn.w_down"), e, MLP_RATIO * e);
        }
        params.matrix(tape, rng, "lm_head", vocab_size, e);

        Gqa {
            n_embed: e,
            n_head: cfg.n_head,
            n_kv_head: cfg.n_kv_head,
            n_layer: cfg.n_layer,
            head_dim: cfg.head_dim(),
            rmsnorm_eps: cfg.rmsnorm_eps,
            params,
        }
    }

    /// One forward pass: rotates query and key head slices at the current
    /// position, appends the rotated keys and raw values to the cache, and
    /// returns vocabulary logits.
    pub fn forward(
        &self,
        tape: &mut Tape,
        token_id: usize,
        pos_id: usize,
        cache: &mut KvCache,
    ) -> Vec<NodeId> {
        let wte = self.params.get("wte");
        let mut x = wte[token_id].clone();
        x = rmsnorm(tape, &x, self.rmsnorm_eps);

        let group = self.n_head / self.n_kv_head;
        for li in 0..self.n_layer {
            let residual = x.clone();
            let xn = rmsnorm(tape, &x, self.rmsnorm_eps);

            let q_raw = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wq")));
            let k_raw = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wk")));
            let v = linear(tape, &xn, self.params.get(&format!("l{li}.attn.wv")));

            let mut q = Vec::with_capacity(self.n_embed);
            for h in 0..self.n_head {
                let hs = h * self.head_dim;
                q.extend(rope(tape, &q_raw[hs..hs + self.head_dim], pos_id));
            }
            let mut k = Vec::with_capacity(k_raw.len());
            for h in 0..self.n_kv_head {
                let hs = h * self.head_dim;
                k.extend(rope(tape, &k_raw[hs..hs + self.head_dim], pos_id));
            }
            cache.push(li, k, v);

            let mut attn = Vec::with_capacity(self.n_embed);
            for h in 0..self.n_head {
                let hs = h * self.head_dim;
                let kvs = (h / group) * self.head_dim;
                let q_h = &q[hs..hs + self.head_dim];
                let k_h: Vec<Vec<NodeId>> = cache
                    .keys(li)
                    .iter()
                    .map(|ki| ki[kvs..kvs + self.head_dim].to_vec())
                    .collect();
                let v_h: Vec<Vec<NodeId>> = cache
                    .values(li)
                    .iter()
                    .map(|vi| vi[kvs..kvs + self.head_dim].to_vec())
                    .collect();
                attn.extend(attend_head(tape, q_h, &k_h, &v_h));
            }
            let projected = linear(tape, &attn, self.params.get(&format!("l{li}.attn.wo")));
            x = add_residual(tape, &projected, &residual);

            let residual = x.clone();
            let xn = rmsnorm(tape, &x, self.rmsnorm_eps);
            let ffn = swiglu(
                tape,
                &xn,
                self.params.get(&format!("l{li}.ffn.w_gate")),
                self.params.get(&format!("l{li}.ffn.w_up")),
                self.params.get(&format!("l{li}.ffn.w_down")),
            );
            x = add_residual(tape, &ffn, &residual);
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
