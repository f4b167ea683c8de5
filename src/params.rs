//! Parameter store: named 2-D matrices of trainable leaf nodes, plus binary
//! checkpoint save/load.
//!
//! Matrices are registered in a fixed order at model construction and never
//! reshaped; [`ParamStore::flat`] yields the leaves in that same order, which
//! is the order the optimizer iterates and the checkpoint file uses.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::autograd::{NodeId, Tape};

/// Ordered collection of named weight matrices (rows of leaf nodes).
pub struct ParamStore {
    names: Vec<String>,
    matrices: Vec<Vec<Vec<NodeId>>>,
    index: HashMap<String, usize>,
    normal: Normal<f64>,
}

impl ParamStore {
    /// Creates an empty store whose matrices are initialized from
    /// Normal(0, `init_std`). `init_std` must be positive and finite
    /// (enforced by config validation).
    #[must_use]
    pub fn new(init_std: f64) -> Self {
        ParamStore {
            names: Vec::new(),
            matrices: Vec::new(),
            index: HashMap::new(),
            normal: Normal::new(0.0, init_std).expect("init_std must be positive and finite"),
        }
    }

    /// Registers a new `n_out x n_in` matrix of freshly initialized leaves.
    /// Panics on a duplicate name (construction bug).
    pub fn matrix(
        &mut self,
        tape: &mut Tape,
        rng: &mut StdRng,
        name: &str,
        n_out: usize,
        n_in: usize,
    ) {
        assert!(
            !self.index.contains_key(name),
            "parameter matrix {name:?} registered twice"
        );
        let rows: Vec<Vec<NodeId>> = (0..n_out)
            .map(|_| {
                (0..n_in)
                    .map(|_| tape.leaf(self.normal.sample(rng)))
                    .collect()
            })
            .collect();
        self.index.insert(name.to_string(), self.matrices.len());
        self.names.push(name.to_string());
        self.matrices.push(rows);
    }

    /// Returns the matrix registered under `name`. Panics if absent.
    #[must_use]
    pub fn get(&self, name: &str) -> &[Vec<NodeId>] {
        match self.index.get(name) {
            Some(&i) => &self.matrices[i],
            None => panic!("unknown parameter matrix {name:?}"),
        }
    }

    /// All leaves as one flat list: registration order, row-major within
    /// each matrix. Stable across runs, save, and load.
    #[must_use]
    pub fn flat(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for matrix in &self.matrices {
            for row in matrix {
                out.extend_from_slice(row);
            }
        }
        out
    }

    /// Number of scalar parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrices
            .iter()
            .map(|m| m.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    /// Returns `true` if no matrices are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Writes every parameter's value as consecutive little-endian `f64`s,
    /// in flat order.
    pub fn save(&self, tape: &Tape, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let flat = self.flat();
        let mut bytes = Vec::with_capacity(flat.len() * 8);
        for id in flat {
            bytes.extend_from_slice(&tape.data(id).to_le_bytes());
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Loads a checkpoint written by [`ParamStore::save`] into the existing
    /// leaves, in flat order. Fails with a length mismatch if the file does
    /// not hold exactly one `f64` per parameter.
    pub fn load(&self, tape: &mut Tape, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let bytes = fs::read(path)?;
        let flat = self.flat();
        if bytes.len() != flat.len() * 8 {
            return Err(CheckpointError::LengthMismatch {
                expected: flat.len() * 8,
                found: bytes.len(),
            });
        }
        for (id, chunk) in flat.into_iter().zip(bytes.chunks_exact(8)) {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(chunk);
            tape.set_data(id, f64::from_le_bytes(buf));
        }
        Ok(())
    }
}

/// Errors produced when persisting or restoring parameters.
///
/// # Variants
///
/// - **Io**: The checkpoint file could not be read or written.
/// - **LengthMismatch**: The file size does not match the model's parameter
///   count; loading neither truncates nor pads, it fails.
#[derive(Debug)]
pub enum CheckpointError {
    /// I/O failure while reading or writing the checkpoint file.
    Io(std::io::Error),

    /// Checkpoint size (bytes) differs from the parameter list size.
    LengthMismatch {
        /// Expected file size in bytes (8 per parameter).
        expected: usize,
        /// Actual file size in bytes.
        found: usize,
    },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(e) => write!(f, "checkpoint io: {e}"),
            CheckpointError::LengthMismatch { expected, found } => write!(
                f,
                "checkpoint length mismatch: expected {expected} bytes, found {found}"
            ),
        }
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CheckpointError::Io(e) => Some(e),
            CheckpointError::LengthMismatch { .. } => None,
        }
    }
}

impl From<std::io::Error> for CheckpointError {
    fn from(e: std::io::Error) -> Self {
        CheckpointError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn store_with(tape: &mut Tape, rng: &mut StdRng) -> ParamStore {
        let mut ps = ParamStore::new(0.08);
        ps.matrix(tape, rng, "a", 2, 3);
        ps.matrix(tape, rng, "b", 1, 4);
        ps
    }

    #[test]
    fn flat_order_is_registration_then_row_major() {
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(1);
        let ps = store_with(&mut tape, &mut rng);
        let flat = ps.flat();
        assert_eq!(flat.len(), 10);
        assert_eq!(ps.len(), 10);
        assert_eq!(flat[0], ps.get("a")[0][0]);
        assert_eq!(flat[3], ps.get("a")[1][0]);
        assert_eq!(flat[6], ps.get("b")[0][0]);
    }

    #[test]
    fn identical_seeds_give_identical_init() {
        let mut tape_a = Tape::new();
        let mut tape_b = Tape::new();
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);
        let a = store_with(&mut tape_a, &mut rng_a);
        let b = store_with(&mut tape_b, &mut rng_b);
        for (&ia, &ib) in a.flat().iter().zip(b.flat().iter()) {
            assert_eq!(tape_a.data(ia).to_bits(), tape_b.data(ib).to_bits());
        }
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn duplicate_name_panics() {
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(1);
        let mut ps = ParamStore::new(0.08);
        ps.matrix(&mut tape, &mut rng, "a", 1, 1);
        ps.matrix(&mut tape, &mut rng, "a", 1, 1);
    }

    #[test]
    fn save_load_round_trip_is_bit_identical() {
        let path = std::env::temp_dir().join("microlm_params_round_trip.ckpt");

        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(3);
        let ps = store_with(&mut tape, &mut rng);
        ps.save(&tape, &path).unwrap();
        let saved: Vec<u64> = ps.flat().iter().map(|&id| tape.data(id).to_bits()).collect();

        // fresh store of the same shape, different init
        let mut tape2 = Tape::new();
        let mut rng2 = StdRng::seed_from_u64(99);
        let ps2 = store_with(&mut tape2, &mut rng2);
        ps2.load(&mut tape2, &path).unwrap();
        let _ = fs::remove_file(&path);

        let loaded: Vec<u64> = ps2
            .flat()
            .iter()
            .map(|&id| tape2.data(id).to_bits())
            .collect();
        assert_eq!(saved, loaded);
    }

    #[test]
    fn load_rejects_wrong_length() {
        let path = std::env::temp_dir().join("microlm_params_bad_len.ckpt");
        fs::write(&path, [0u8; 24]).unwrap();

        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(3);
        let ps = store_with(&mut tape, &mut rng);
        let result = ps.load(&mut tape, &path);
        let _ = fs::remove_file(&path);
        assert!(matches!(
            result,
            Err(CheckpointError::LengthMismatch {
                expected: 80,
                found: 24
            })
        ));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let mut tape = Tape::new();
        let mut rng = StdRng::seed_from_u64(3);
        let ps = store_with(&mut tape, &mut rng);
        let result = ps.load(&mut tape, "/nonexistent/microlm_never_exists.ckpt");
        assert!(matches!(result, Err(CheckpointError::Io(_))));
    }
}
