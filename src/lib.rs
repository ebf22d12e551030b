//! Word-level byte pair encoding (BPE) merge training.
//!
//! The crate trains a merge table over a corpus of `word [tf [df]]` records. Pair
//! selection is driven by weighted frequencies kept incrementally in a pair index,
//! while every learned token is annotated with its exact occurrence count in the
//! original, unsegmented corpus, answered by a suffix automaton.
//!
//! ```no_run
//! use wordbpe::{IngestConfig, Trainer, TrainerConfig};
//!
//! # fn main() -> wordbpe::Result<()> {
//! let trainer_cfg = TrainerConfig::builder()
//!     .min_frequency(2)
//!     .show_progress(false)
//!     .build()?;
//! let trainer = Trainer::new(trainer_cfg);
//! let artifacts = trainer.train_from_path("fi.tfdf.tsv", &IngestConfig::default())?;
//! artifacts.model.save_token_table("fi_tokens.txt")?;
//! artifacts.model.save_merge_table("fi_merges.txt")?;
//! # Ok(())
//! # }
//! ```
//!
//! The `wordbpe` CLI is enabled by default through the `cli` feature. Library users
//! can drop its dependencies with `default-features = false`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod automaton;
pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod linked;
pub mod metrics;
pub mod model;
pub mod pair_index;
pub mod serialization;
pub mod tfdf;
pub mod trainer;
pub mod vocab;

pub use automaton::SuffixAutomaton;
pub use config::{
    IngestConfig, Representation, TfDfConfig, TrainerBuilder, TrainerConfig, WeightSource,
};
pub use corpus::{CorpusRecord, LoadReport, WordCorpus};
pub use engine::{EngineState, MergeBackend, MergeEngine, MergeStep, WordBackend};
pub use error::{BpeError, RecordError, Result};
pub use linked::LinkedStream;
pub use metrics::{IterationMetrics, StopReason, TrainingMetrics};
pub use model::{BpeModel, MergeRule, Pair, TokenId};
pub use pair_index::PairIndex;
pub use trainer::{Trainer, TrainerArtifacts};
pub use vocab::Vocabulary;
