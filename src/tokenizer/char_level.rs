//! Character-level tokenizer: one token per character plus a BOS marker.

use std::collections::{BTreeSet, HashMap};

use super::{Tokenizer, TokenizerError};

/// Symbol used when decoding the BOS id.
const BOS_SYMBOL: &str = "<BOS>";

/// Character-level tokenizer.
///
/// The vocabulary is the BOS marker (id 0) followed by the sorted unique
/// characters of the corpus, so the char-to-id mapping is deterministic
/// regardless of document order or shuffling.
#[derive(Clone, Debug)]
pub struct CharTokenizer {
    chars: Vec<char>,
    ids: HashMap<char, usize>,
}

impl CharTokenizer {
    /// Builds the vocabulary from every character of every document.
    #[must_use]
    pub fn from_documents(docs: &[String]) -> Self {
        let unique: BTreeSet<char> = docs.iter().flat_map(|d| d.chars()).collect();
        let chars: Vec<char> = unique.into_iter().collect();
        // ids are offset by one: id 0 is BOS
        let ids = chars.iter().enumerate().map(|(i, &c)| (c, i + 1)).collect();
        CharTokenizer { chars, ids }
    }
}

impl Tokenizer for CharTokenizer {
    fn encode(&self, s: &str) -> Result<Vec<usize>, TokenizerError> {
        s.chars()
            .map(|ch| {
                self.ids
                    .get(&ch)
                    .copied()
                    .ok_or(TokenizerError::UnknownSymbol(ch))
            })
            .collect()
    }

    fn decode(&self, ids: &[usize]) -> Result<String, TokenizerError> {
        let mut s = String::new();
        for &id in ids {
            if id == 0 {
                s.push_str(BOS_SYMBOL);
            } else {
                let ch = self
                    .chars
                    .get(id - 1)
                    .ok_or(TokenizerError::InvalidId(id))?;
                s.push(*ch);
            }
        }
        Ok(s)
    }

    fn vocab_size(&self) -> usize {
        self.chars.len() + 1
    }

    fn bos_id(&self) -> usize {
        0
    }
}
