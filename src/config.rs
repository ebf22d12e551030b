//! Configuration builders controlling training, corpus ingestion, and tf/df counting.

use std::fmt;

use crate::error::{BpeError, Result};
use serde::{Deserialize, Serialize};

/// Corpus representation driving the merge loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// Per-word token vectors with an inverted pair -> words index.
    #[default]
    Words,
    /// One doubly linked token stream over the whole corpus.
    LinkedStream,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Words => f.write_str("words"),
            Self::LinkedStream => f.write_str("linked-stream"),
        }
    }
}

/// Column used as the per-word weight when loading a corpus.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    /// Second column (term frequency).
    #[default]
    TermFrequency,
    /// Third column (document frequency).
    DocumentFrequency,
    /// Every word counts once regardless of its columns.
    Uniform,
}

/// Configuration for BPE merge training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainerConfig {
    /// Minimum weighted pair frequency required for a merge. Never below 2.
    pub min_frequency: u64,
    /// Hard cap on the number of merges; `None` runs to convergence.
    pub max_merges: Option<usize>,
    /// Corpus representation used by the merge loop.
    pub representation: Representation,
    /// Enables per-iteration logging through the `log` facade.
    pub show_progress: bool,
}

impl TrainerConfig {
    /// Returns a builder initialised with [`TrainerConfig::default`].
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if self.min_frequency < 2 {
            return Err(BpeError::InvalidConfig(format!(
                "min_frequency ({}) must be at least 2",
                self.min_frequency
            )));
        }
        if self.max_merges == Some(0) {
            return Err(BpeError::InvalidConfig(
                "max_merges must be greater than zero when set".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            min_frequency: 2,
            max_merges: None,
            representation: Representation::Words,
            show_progress: true,
        }
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    /// Creates a builder with [`TrainerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum weighted merge frequency.
    #[must_use]
    pub fn min_frequency(mut self, value: u64) -> Self {
        self.cfg.min_frequency = value;
        self
    }

    /// Sets a hard merge limit.
    #[must_use]
    pub fn max_merges(mut self, value: Option<usize>) -> Self {
        self.cfg.max_merges = value;
        self
    }

    /// Selects the corpus representation.
    #[must_use]
    pub fn representation(mut self, value: Representation) -> Self {
        self.cfg.representation = value;
        self
    }

    /// Enables or disables per-iteration logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`TrainerConfig`].
    pub fn build(self) -> Result<TrainerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how `word [tf [df]]` records are turned into weighted words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct IngestConfig {
    /// Column used as the word weight.
    pub weight: WeightSource,
    /// Lowercases every word before tokenization.
    pub lowercase: bool,
}

impl IngestConfig {
    /// Returns a builder initialised with [`IngestConfig::default`].
    #[must_use]
    pub fn builder() -> IngestBuilder {
        IngestBuilder::default()
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug, Default, Clone)]
pub struct IngestBuilder {
    cfg: IngestConfig,
}

impl IngestBuilder {
    /// Creates a new builder with [`IngestConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the weight column.
    #[must_use]
    pub fn weight(mut self, source: WeightSource) -> Self {
        self.cfg.weight = source;
        self
    }

    /// Enables or disables lowercasing.
    #[must_use]
    pub fn lowercase(mut self, enabled: bool) -> Self {
        self.cfg.lowercase = enabled;
        self
    }

    /// Finalises the builder, returning the [`IngestConfig`].
    pub fn build(self) -> IngestConfig {
        self.cfg
    }
}

/// Configuration for term/document frequency extraction over raw text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TfDfConfig {
    /// Number of line chunks processed in parallel; `None` uses the Rayon pool size.
    pub chunks: Option<usize>,
    /// Lowercases words before counting.
    pub lowercase: bool,
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
}

impl Default for TfDfConfig {
    fn default() -> Self {
        Self {
            chunks: None,
            lowercase: true,
            recursive: true,
            follow_symlinks: false,
        }
    }
}

impl TfDfConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.chunks == Some(0) {
            return Err(BpeError::InvalidConfig(
                "chunk count must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
