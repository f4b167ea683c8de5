//! Tokenization: encode text to token ids and decode back.
//!
//! The [`Tokenizer`] trait is what the model pipeline consumes; the
//! character-level implementation lives in [`char_level`].

mod char_level;
mod error;

pub use char_level::CharTokenizer;
pub use error::TokenizerError;

/// Trait for tokenizers: encode text to ids and decode ids to text.
pub trait Tokenizer {
    /// Encodes a string into a sequence of token ids.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::UnknownSymbol`] for symbols outside the
    /// vocabulary.
    fn encode(&self, s: &str) -> Result<Vec<usize>, TokenizerError>;

    /// Decodes a sequence of token ids into a string.
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::InvalidId`] if an id is out of range.
    fn decode(&self, ids: &[usize]) -> Result<String, TokenizerError>;

    /// Vocabulary size (number of distinct tokens, including BOS).
    fn vocab_size(&self) -> usize;

    /// Token id used for beginning/end-of-sequence.
    fn bos_id(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn vocab_is_bos_plus_unique_chars() {
        let t = CharTokenizer::from_documents(&docs(&["abc", "cba"]));
        assert_eq!(t.vocab_size(), 4, "BOS + a, b, c");
        assert_eq!(t.bos_id(), 0);
    }

    #[test]
    fn vocab_order_is_independent_of_document_order() {
        let a = CharTokenizer::from_documents(&docs(&["emma", "zoe"]));
        let b = CharTokenizer::from_documents(&docs(&["zoe", "emma"]));
        assert_eq!(a.encode("emma").unwrap(), b.encode("emma").unwrap());
    }

    #[test]
    fn encode_decode_round_trip() {
        let t = CharTokenizer::from_documents(&docs(&["hello"]));
        let ids = t.encode("hello").unwrap();
        assert_eq!(ids.len(), 5);
        assert_eq!(t.decode(&ids).unwrap(), "hello");
    }

    #[test]
    fn unknown_char_is_an_error() {
        let t = CharTokenizer::from_documents(&docs(&["ab"]));
        assert!(matches!(
            t.encode("abc"),
            Err(TokenizerError::UnknownSymbol('c'))
        ));
    }

    #[test]
    fn decode_out_of_range_id_is_an_error() {
        let t = CharTokenizer::from_documents(&docs(&["a"]));
        assert!(matches!(t.decode(&[100]), Err(TokenizerError::InvalidId(100))));
    }

    #[test]
    fn bos_decodes_to_its_marker() {
        let t = CharTokenizer::from_documents(&docs(&["x"]));
        assert!(t.bos_id() < t.vocab_size());
        assert_eq!(t.decode(&[t.bos_id()]).unwrap(), "<BOS>");
    }
}
