//! Scalar autograd: a tape of single-value nodes with backpropagation.
//!
//! The computation graph lives in a [`Tape`]: an arena of nodes addressed by
//! [`NodeId`] rather than by reference, so fan-out (one node feeding many
//! consumers) needs no shared ownership. Every operator records the exact
//! local partial derivative with respect to each operand at creation time;
//! [`Tape::backward`] replays the tape in reverse and applies the chain rule.


/// Handle to one scalar node on the tape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One scalar node: forward value, gradient accumulator, and graph edges.
struct Node {
    /// Forward pass value.
    data: f64,
    /// Gradient of the loss with respect to this node; filled by backward.
    grad: f64,
    /// Operand nodes this node was built from (empty for leaves).
    parents: Vec<NodeId>,
    /// Local partial derivatives, one per parent: `local_grads[i]` =
    /// d(this)/d(parents[i]) evaluated at creation time.
    local_grads: Vec<f64>,
}

/// Arena holding the whole computation graph.
///
/// Nodes are only ever constructed from nodes that already exist, so a
/// node's index is always greater than the indices of all its ancestors.
/// Creation order is therefore a valid topological order of the DAG, which
/// is what [`Tape::backward`] relies on.
///
/// Parameter leaves are created first; [`Tape::freeze`] marks the boundary
/// and [`Tape::reset`] drops everything built after it, so intermediate
/// nodes live exactly one forward+backward pass while leaves persist.
pub struct Tape {
    nodes: Vec<Node>,
    frozen: usize,
}

impl Tape {
    /// Creates an empty tape.
    #[must_use]
    pub fn new() -> Self {
        Tape {
            nodes: Vec::new(),
            frozen: 0,
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tape holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, data: f64, parents: Vec<NodeId>, local_grads: Vec<f64>) -> NodeId {
        debug_assert_eq!(parents.len(), local_grads.len());
        debug_assert!(
            parents.iter().all(|p| p.0 < self.nodes.len()),
            "a node may only be built from already-existing nodes"
        );
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            grad: 0.0,
            parents,
            local_grads,
        });
        id
    }

    /// Creates a leaf node (no parents) with the given value and zero gradient.
    ///
    /// Both trainable parameters and raw-number constants are leaves; the
    /// difference is only whether an optimizer ever writes to them.
    pub fn leaf(&mut self, data: f64) -> NodeId {
        self.push(data, Vec::new(), Vec::new())
    }

    /// Addition: `a + b`. Local grads are 1 and 1.
    pub fn add(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let data = self.data(a) + self.data(b);
        self.push(data, vec![a, b], vec![1.0, 1.0])
    }

    /// Multiplication: `a * b`. Local grads are `b.data` and `a.data`.
    pub fn mul(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let (ad, bd) = (self.data(a), self.data(b));
        self.push(ad * bd, vec![a, b], vec![bd, ad])
    }

    /// Power: `a^exp`. Local grad is `exp * a^(exp-1)`.
    ///
    /// Negative or fractional `exp` requires `a.data > 0`; callers guard
    /// this (e.g. rmsnorm adds an epsilon before the -0.5 power).
    pub fn pow(&mut self, a: NodeId, exp: f64) -> NodeId {
        let ad = self.data(a);
        let local = exp * ad.powf(exp - 1.0);
        self.push(ad.powf(exp), vec![a], vec![local])
    }

    /// Natural log. Local grad is `1/a`. Requires strictly positive input.
    pub fn log(&mut self, a: NodeId) -> NodeId {
        let ad = self.data(a);
        self.push(ad.ln(), vec![a], vec![1.0 / ad])
    }

    /// Exponential. Local grad is `exp(a)`.
    pub fn exp(&mut self, a: NodeId) -> NodeId {
        let data = self.data(a).exp();
        self.push(data, vec![a], vec![data])
    }

    /// ReLU: `max(0, a)`. Local grad is 1 if `a.data > 0`, else 0.
    pub fn relu(&mut self, a: NodeId) -> NodeId {
        let ad = self.data(a);
        let local = if ad > 0.0 { 1.0 } else { 0.0 };
        self.push(ad.max(0.0), vec![a], vec![local])
    }

    /// SiLU (swish): `a * sigmoid(a)`.
    /// Local grad is `sigmoid(a) * (1 + a * (1 - sigmoid(a)))`.
    pub fn silu(&mut self, a: NodeId) -> NodeId {
        let ad = self.data(a);
        let s = sigmoid(ad);
        let local = s * (1.0 + ad * (1.0 - s));
        self.push(ad * s, vec![a], vec![local])
    }

    /// Negation: `-a` (via `a * -1`).
    pub fn neg(&mut self, a: NodeId) -> NodeId {
        let neg_one = self.leaf(-1.0);
        self.mul(a, neg_one)
    }

    /// Subtraction: `a - b`.
    pub fn sub(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let nb = self.neg(b);
        self.add(a, nb)
    }

    /// Division: `a / b` (via `a * b^(-1)`). `b` must be nonzero.
    pub fn div(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let inv = self.pow(b, -1.0);
        self.mul(a, inv)
    }

    /// Forward pass value of a node.
    #[must_use]
    pub fn data(&self, id: NodeId) -> f64 {
        self.nodes[id.0].data
    }

    /// Gradient of the last backward's output with respect to this node.
    #[must_use]
    pub fn grad(&self, id: NodeId) -> f64 {
        self.nodes[id.0].grad
    }

    /// Overwrites a node's value. Used by the optimizer on parameter leaves;
    /// never called on interior nodes.
    pub fn set_data(&mut self, id: NodeId, data: f64) {
        self.nodes[id.0].data = data;
    }

    /// Resets one node's gradient to 0 (e.g. after an optimizer step).
    pub fn zero_grad(&mut self, id: NodeId) {
        self.nodes[id.0].grad = 0.0;
    }

    /// Runs backprop from `loss`: after the call, every ancestor's `grad`
    /// holds d(loss)/d(node), accumulated across all paths.
    ///
    /// Walks indices from `loss` down to 0. Since parents always precede
    /// children on the tape, a node's gradient is complete before it is
    /// distributed, exactly as with a reversed DFS post-order. Gradients are
    /// never cleared here; the caller zeroes leaves between passes.
    pub fn backward(&mut self, loss: NodeId) {
        self.nodes[loss.0].grad = 1.0;
        for i in (0..=loss.0).rev() {
            let g = self.nodes[i].grad;
            if g == 0.0 {
                continue;
            }
            for j in 0..self.nodes[i].parents.len() {
                let parent = self.nodes[i].parents[j];
                let local = self.nodes[i].local_grads[j];
                self.nodes[parent.0].grad += local * g;
            }
        }
    }

    /// Marks everything created so far (parameter leaves) as persistent.
    pub fn freeze(&mut self) {
        self.frozen = self.nodes.len();
    }

    /// Drops all nodes created after [`Tape::freeze`], discarding the
    /// subgraph of the last forward/backward pass.
    pub fn reset(&mut self) {
        self.nodes.truncate(self.frozen);
    }
}

impl Default for Tape {
    fn default() -> Self {
        Tape::new()
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
