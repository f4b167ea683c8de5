//! Differentiable numeric primitives: linear projection, RMS normalization,
//! softmax, and rotary position embedding. All of them are pure graph
//! builders over [`Tape`]; none owns parameters or state.

use crate::autograd::{NodeId, Tape};

/// Base for the rotary embedding frequency ladder.
const ROPE_BASE: f64 = 10000.0;

/// Matrix-vector multiply: one dot product per row of `w`, no bias.
///
/// Each output element is a running add chain seeded at 0. Panics if a
/// weight row length differs from the input length (construction bug).
pub fn linear(tape: &mut Tape, x: &[NodeId], w: &[Vec<NodeId>]) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(w.len());
    for row in w {
        assert_eq!(
            row.len(),
            x.len(),
            "linear: weight row has {} columns but input has {} elements",
            row.len(),
            x.len()
        );
        let mut sum = tape.leaf(0.0);
        for (&wi, &xi) in row.iter().zip(x.iter()) {
            let prod = tape.mul(wi, xi);
            sum = tape.add(sum, prod);
        }
        out.push(sum);
    }
    out
}

/// Root-mean-square normalization: rescales `x` so its RMS is 1.
///
/// scale = (mean(x^2) + eps)^(-0.5); the epsilon keeps the -0.5 power away
/// from zero. Unweighted: no learned gain or bias.
pub fn rmsnorm(tape: &mut Tape, x: &[NodeId], eps: f64) -> Vec<NodeId> {
    let mut ms = tape.leaf(0.0);
    for &xi in x {
        let sq = tape.mul(xi, xi);
        ms = tape.add(ms, sq);
    }
    let n = tape.leaf(x.len() as f64);
    ms = tape.div(ms, n);

    let eps = tape.leaf(eps);
    let shifted = tape.add(ms, eps);
    let scale = tape.pow(shifted, -0.5);
    x.iter().map(|&xi| tape.mul(xi, scale)).collect()
}

/// Logits to probabilities in (0,1] summing to 1.
///
/// The maximum raw value is subtracted as a plain-number constant before
/// exponentiating, for numerical stability; being a leaf, it contributes
/// no gradient.
pub fn softmax(tape: &mut Tape, logits: &[NodeId]) -> Vec<NodeId> {
    let max_val = logits
        .iter()
        .map(|&l| tape.data(l))
        .fold(f64::NEG_INFINITY, f64::max);
    let max_leaf = tape.leaf(max_val);

    let exps: Vec<NodeId> = logits
        .iter()
        .map(|&l| {
            let shifted = tape.sub(l, max_leaf);
            tape.exp(shifted)
        })
        .collect();
    let mut total = tape.leaf(0.0);
    for &e in &exps {
        total = tape.add(total, e);
    }
    exps.iter().map(|&e| tape.div(e, total)).collect()
}

/// Rotary position embedding: rotates consecutive pairs of `x` by
/// position-dependent angles theta_i * pos with theta_i = base^(-2i/d).
///
/// Rotation is norm-preserving per pair, and the identity at position 0.
/// Panics if the vector length is odd.
pub fn rope(tape: &mut Tape, x: &[NodeId], pos: usize) -> Vec<NodeId> {
    let d = x.len();
    assert!(d % 2 == 0, "rope: vector length {d} must be even");

    let mut out = Vec::with_capacity(d);
    for i in 0..d / 2 {
        let theta = ROPE_BASE.powf(-2.0 * i as f64 / d as f64);
        let angle = theta * pos as f64;
        let cos = tape.leaf(angle.cos());
        let sin = tape.leaf(angle.sin());

        let (x0, x1) = (x[2 * i], x[2 * i + 1]);
        let x0c = tape.mul(x0, cos);
        let x1s = tape.mul(x1, sin);
        let x0s = tape.mul(x0, sin);
        let x1c = tape.mul(x1, cos);
        out.push(tape.sub(x0c, x1s));
        out.push(tape.add(x0s, x1c));
    }
    out
}
