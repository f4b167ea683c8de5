//! Per-sequence attention caches.
//!
//! A cache is owned by the caller of the forward pass and starts empty for
//! every new document or sample. It is append-only: one entry per layer per
//! forward call, never truncated or reordered. Sharing one cache across two
//! sequences is a caller bug.

use crate::autograd::NodeId;

/// Key/value cache: per layer, the full key and value vectors of every
/// position seen so far.
pub struct KvCache {
    keys: Vec<Vec<Vec<NodeId>>>,
    values: Vec<Vec<Vec<NodeId>>>,
}

impl KvCache {
    /// Empty cache for `n_layer` layers.
    #[must_use]
    pub fn new(n_layer: usize) -> Self {
        KvCache {
            keys: vec![Vec::new(); n_layer],
            values: vec![Vec::new(); n_layer],
        }
    }

    /// Appends one position's key and value vectors to a layer.
    pub fn push(&mut self, layer: usize, k: Vec<NodeId>, v: Vec<NodeId>) {
        self.keys[layer].push(k);
        self.values[layer].push(v);
    }

    /// Cached key vectors of a layer, oldest first.
    #[must_use]
    pub fn keys(&self, layer: usize) -> &[Vec<NodeId>] {
        &self.keys[layer]
    }

    /// Cached value vectors of a layer, oldest first.
    #[must_use]
    pub fn values(&self, layer: usize) -> &[Vec<NodeId>] {
        &self.values[layer]
    }

    /// Number of positions cached so far (equal across layers after a
    /// complete forward call).
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.first().map_or(0, Vec::len)
    }

    /// Returns `true` before the first forward call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Latent cache: per layer, one compressed latent vector per position. Keys
/// and values are reconstructed from the latents at every read.
pub struct LatentCache {
    latents: Vec<Vec<Vec<NodeId>>>,
}

impl LatentCache {
    /// Empty cache for `n_layer` layers.
    #[must_use]
    pub fn new(n_layer: usize) -> Self {
        LatentCache {
            latents: vec![Vec::new(); n_layer],
        }
    }

    /// Appends one position's latent vector to a layer.
    pub fn push(&mut self, layer: usize, latent: Vec<NodeId>) {
        self.latents[layer].push(latent);
    }

    /// Cached latent vectors of a layer, oldest first.
    #[must_use]
    pub fn latents(&self, layer: usize) -> &[Vec<NodeId>] {
        &self.latents[layer]
    }

    /// Number of positions cached so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.latents.first().map_or(0, Vec::len)
    }

    /// Returns `true` before the first forward call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Either cache kind, matching the model architecture it was created for.
pub enum Cache {
    /// Full key/value vectors per position (standard and grouped-query
    /// attention).
    Kv(KvCache),
    /// Compressed latents per position (latent attention).
    Latent(LatentCache),
}

impl Cache {
    /// Number of positions cached so far.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Cache::Kv(c) => c.len(),
            Cache::Latent(c) => c.len(),
        }
    }

    /// Returns `true` before the first forward call.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autograd::Tape;

    #[test]
    fn kv_cache_length_tracks_pushes() {
        let mut tape = Tape::new();
        let mut cache = KvCache::new(2);
        assert!(cache.is_empty());
        for i in 0..3 {
            let k = vec![tape.leaf(i as f64)];
            let v = vec![tape.leaf(-(i as f64))];
            cache.push(0, k.clone(), v.clone());
            cache.push(1, k, v);
            assert_eq!(cache.len(), i + 1);
        }
        assert_eq!(cache.keys(1).len(), 3);
        assert_eq!(cache.values(0).len(), 3);
    }

    #[test]
    fn latent_cache_length_tracks_pushes() {
        let mut tape = Tape::new();
        let mut cache = LatentCache::new(1);
        cache.push(0, vec![tape.leaf(1.0), tape.leaf(2.0)]);
        cache.push(0, vec![tape.leaf(3.0), tape.leaf(4.0)]);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.latents(0)[1].len(), 2);
    }

    #[test]
    fn cache_enum_reports_inner_length() {
        let mut tape = Tape::new();
        let mut inner = LatentCache::new(1);
        inner.push(0, vec![tape.leaf(0.5)]);
        let cache = Cache::Latent(inner);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }
}
