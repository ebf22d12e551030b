//! Helpers for persisting trained models: plain-text tables and Hugging Face JSON.

pub mod huggingface;
pub mod tables;

pub use huggingface::{
    as_tokenizer, load_tokenizer, save_huggingface_tokenizer, save_vocab_json, tokenizer_json,
    vocab_json,
};
pub use tables::{default_output_paths, TableOutputs};
