//! Model types and helpers for working with trained merge tables.

use std::io::{self, Write};
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tokenizers::models::bpe::BPE;
use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::Tokenizer;

use crate::config::TrainerConfig;
use crate::error::{BpeError, Result};
use crate::serialization::{self, tables};
use crate::vocab::Vocabulary;

/// Token identifier used throughout the crate.
pub type TokenId = u32;
/// Merge pair encoded as `(left, right)` token identifiers.
pub type Pair = (TokenId, TokenId);

/// One learned merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRule {
    /// Operands, left then right.
    pub pair: Pair,
    /// Token whose string is the concatenation of the operands.
    pub result: TokenId,
    /// Occurrences of the result string in the original, untokenized corpus.
    pub frequency: u64,
}

/// Trained merge table together with the vocabulary it refers to.
#[must_use]
#[derive(Debug, Clone)]
pub struct BpeModel {
    vocab: Vocabulary,
    merges: Vec<MergeRule>,
    token_frequencies: Vec<(TokenId, u64)>,
    config: TrainerConfig,
}

impl BpeModel {
    /// Constructs a model from its parts.
    ///
    /// `token_frequencies` lists the tokens with a nonzero corpus frequency.
    pub fn new(
        vocab: Vocabulary,
        merges: Vec<MergeRule>,
        token_frequencies: Vec<(TokenId, u64)>,
        config: TrainerConfig,
    ) -> Self {
        Self {
            vocab,
            merges,
            token_frequencies,
            config,
        }
    }

    /// Full vocabulary, base characters and merged tokens alike.
    #[must_use]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Merges in the order they were learned.
    #[must_use]
    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    /// `(token, corpus frequency)` for every token seen in the corpus, in id order.
    #[must_use]
    pub fn token_frequencies(&self) -> &[(TokenId, u64)] {
        &self.token_frequencies
    }

    /// Returns the [`TrainerConfig`] used to produce the model.
    #[must_use]
    pub fn trainer_config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Number of interned tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Merge operands as strings, in merge order.
    #[must_use]
    pub fn merge_strings(&self) -> Vec<(String, String)> {
        self.merges
            .iter()
            .map(|rule| {
                (
                    self.vocab.resolve(rule.pair.0).to_owned(),
                    self.vocab.resolve(rule.pair.1).to_owned(),
                )
            })
            .collect()
    }

    /// Writes the `Token\tFrequency` table.
    pub fn write_token_table<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        tables::write_token_table(self, writer)
    }

    /// Writes the chronological merge table.
    pub fn write_merge_table<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        tables::write_merge_table(self, writer)
    }

    /// Writes the token table to `path`.
    pub fn save_token_table<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tables::save_with(path.as_ref(), |w| self.write_token_table(w))
    }

    /// Writes the merge table to `path`.
    pub fn save_merge_table<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        tables::save_with(path.as_ref(), |w| self.write_merge_table(w))
    }

    /// Builds a Hugging Face [`Tokenizer`] holding the trained vocabulary and merges.
    pub fn build_tokenizer(&self) -> Result<Tokenizer> {
        let vocab: AHashMap<String, TokenId> = self
            .vocab
            .iter()
            .map(|(id, token)| (token.to_owned(), id))
            .collect();
        let bpe = BPE::builder()
            .vocab_and_merges(vocab, self.merge_strings())
            .build()
            .map_err(|err| BpeError::Tokenizers(err.to_string()))?;
        let mut tokenizer = Tokenizer::new(bpe);
        tokenizer.with_pre_tokenizer(Some(PreTokenizerWrapper::WhitespaceSplit(WhitespaceSplit)));
        Ok(tokenizer)
    }

    /// Serialises the tokenizer to disk in Hugging Face JSON format.
    pub fn save_huggingface<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        serialization::save_huggingface_tokenizer(self, path, false)
    }

    /// Serialises the tokenizer to a JSON string in Hugging Face format.
    pub fn to_huggingface_json(&self, pretty: bool) -> Result<String> {
        serialization::tokenizer_json(self, pretty)
    }

    /// Writes the compact `vocab`/`merges`/`freq` JSON summary.
    pub fn save_vocab_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        serialization::save_vocab_json(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn sample_model() -> BpeModel {
        let mut vocab = Vocabulary::new();
        let l = vocab.intern("l");
        let o = vocab.intern("o");
        let w = vocab.intern("w");
        let lo = vocab.intern("lo");
        let low = vocab.intern("low");
        let merges = vec![
            MergeRule {
                pair: (l, o),
                result: lo,
                frequency: 2,
            },
            MergeRule {
                pair: (lo, w),
                result: low,
                frequency: 2,
            },
        ];
        let freqs = vec![(l, 2), (o, 2), (w, 2), (lo, 2), (low, 2)];
        BpeModel::new(vocab, merges, freqs, TrainerConfig::default())
    }

    #[test]
    fn merge_strings_follow_merge_order() {
        let model = sample_model();
        assert_eq!(
            model.merge_strings(),
            vec![("l".into(), "o".into()), ("lo".into(), "w".into())]
        );
        assert_eq!(model.vocab_size(), 5);
    }

    #[test]
    fn huggingface_json_is_well_formed() {
        let model = sample_model();
        let json = model
            .to_huggingface_json(true)
            .expect("serialization should work");
        let value: Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(value["model"]["type"], "BPE");
        assert_eq!(value["model"]["vocab"]["low"], 4);
    }

    #[test]
    fn tokenizer_applies_learned_merges() {
        let model = sample_model();
        let tokenizer = model.build_tokenizer().expect("tokenizer");
        let encoding = tokenizer.encode("low", false).expect("encode");
        assert_eq!(encoding.get_tokens(), &["low".to_string()]);
    }
}
