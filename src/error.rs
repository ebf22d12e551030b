//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = BpeError> = std::result::Result<T, E>;

/// Fatal failures raised while configuring, loading, or persisting a training run.
///
/// Problems with individual input lines are not fatal; see [`RecordError`].
#[derive(Debug, Error)]
pub enum BpeError {
    /// Training or ingest configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The corpus file could not be opened or read.
    #[error("failed to open input {path:?}: {source}")]
    InputOpen {
        /// Path of the input that could not be opened.
        path: PathBuf,
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
    },
    /// An output artifact could not be created.
    #[error("failed to create output {path:?}: {source}")]
    OutputCreate {
        /// Path of the output that could not be created.
        path: PathBuf,
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
    },
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Error bubbled up from the `tokenizers` crate.
    #[error("huggingface tokenizers error: {0}")]
    Tokenizers(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<tokenizers::Error> for BpeError {
    fn from(err: tokenizers::Error) -> Self {
        Self::Tokenizers(err.to_string())
    }
}

impl From<serde_json::Error> for BpeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl BpeError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Wraps a failure to open or read the corpus input.
    pub fn input_open(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::InputOpen {
            path: path.into(),
            source,
        }
    }

    /// Wraps a failure to create an output artifact.
    pub fn output_create(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::OutputCreate {
            path: path.into(),
            source,
        }
    }
}

/// Recoverable problem with a single corpus line. The loader logs it and skips the line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Non-empty line without a word field.
    #[error("line {line}: no word field")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
    },
    /// A term or document frequency column that is not an unsigned integer.
    #[error("line {line}: invalid count `{value}`")]
    InvalidCount {
        /// 1-based line number.
        line: usize,
        /// Offending column text, lossily decoded.
        value: String,
    },
    /// The word is not valid UTF-8.
    #[error("line {line}: word is not valid UTF-8 ({reason})")]
    UnicodeDecode {
        /// 1-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
}
