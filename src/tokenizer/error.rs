//! Errors produced when encoding or decoding with a tokenizer.

use std::fmt;

/// Errors produced by the tokenizer module.
///
/// # Variants
///
/// - **UnknownSymbol**: A character outside the vocabulary was encountered
///   during encode. Build the tokenizer from a corpus that contains it.
/// - **InvalidId**: A token id out of `[0, vocab_size)` was passed to
///   decode; ids must come from this tokenizer's encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerError {
    /// A character not in the vocabulary was encountered during encode.
    UnknownSymbol(char),

    /// A token id is out of range during decode.
    InvalidId(usize),
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerError::UnknownSymbol(c) => write!(f, "tokenizer: unknown symbol {c:?}"),
            TokenizerError::InvalidId(id) => write!(f, "tokenizer: invalid id {id}"),
        }
    }
}

impl std::error::Error for TokenizerError {}
