//! Hugging Face compatible serialisation helpers built on top of `tokenizers`.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tokenizers::Tokenizer;

use crate::error::{BpeError, Result};
use crate::model::BpeModel;

/// Builds a Hugging Face tokenizer from the trained model.
pub fn as_tokenizer(model: &BpeModel) -> Result<Tokenizer> {
    model.build_tokenizer()
}

/// Serialises the trained tokenizer to a JSON string compatible with Hugging Face.
pub fn tokenizer_json(model: &BpeModel, pretty: bool) -> Result<String> {
    let tokenizer = as_tokenizer(model)?;
    Ok(tokenizer.to_string(pretty)?)
}

/// Persists the trained tokenizer as `tokenizer.json` compatible with Hugging Face tooling.
pub fn save_huggingface_tokenizer<P: AsRef<Path>>(
    model: &BpeModel,
    path: P,
    pretty: bool,
) -> Result<()> {
    let json = tokenizer_json(model, pretty)?;
    fs::write(path.as_ref(), json)
        .map_err(|err| BpeError::io(err, Some(path.as_ref().to_path_buf())))
}

/// Loads a tokenizer.json file via the Hugging Face `tokenizers` crate.
pub fn load_tokenizer<P: AsRef<Path>>(path: P) -> Result<Tokenizer> {
    Tokenizer::from_file(path).map_err(BpeError::from)
}

#[derive(Serialize)]
struct VocabSummary<'a> {
    vocab: serde_json::Map<String, Value>,
    merges: Vec<String>,
    freq: Vec<(&'a str, u64)>,
}

/// Compact JSON summary: `vocab` (token -> id), `merges` as `"left right"` strings in
/// merge order and `freq` as `[token, corpus frequency]` rows in id order.
pub fn vocab_json(model: &BpeModel) -> Result<String> {
    let vocab = model
        .vocab()
        .iter()
        .map(|(id, token)| (token.to_owned(), Value::from(id)))
        .collect();
    let merges = model
        .merge_strings()
        .into_iter()
        .map(|(left, right)| format!("{left} {right}"))
        .collect();
    let freq = model
        .token_frequencies()
        .iter()
        .map(|&(id, n)| (model.vocab().resolve(id), n))
        .collect();
    let summary = VocabSummary {
        vocab,
        merges,
        freq,
    };
    Ok(serde_json::to_string_pretty(&summary)?)
}

/// Writes [`vocab_json`] to `path`.
pub fn save_vocab_json<P: AsRef<Path>>(model: &BpeModel, path: P) -> Result<()> {
    let json = vocab_json(model)?;
    fs::write(path.as_ref(), json).map_err(|err| BpeError::output_create(err, path.as_ref()))
}
