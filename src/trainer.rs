//! Core training loop producing the token and merge tables.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use log::info;

use crate::automaton::SuffixAutomaton;
use crate::config::{IngestConfig, Representation, TrainerBuilder, TrainerConfig};
use crate::corpus::{load_records, CorpusRecord, LoadReport, WordCorpus};
use crate::engine::{MergeBackend, MergeEngine, WordBackend};
use crate::error::{BpeError, Result};
use crate::linked::LinkedStream;
use crate::metrics::{sample_rss_kb, IterationMetrics, StopReason, TrainingMetrics};
use crate::model::{BpeModel, MergeRule, TokenId};
use crate::vocab::Vocabulary;

pub mod word;

/// High-level façade configuring and executing BPE training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained BPE model.
    pub model: BpeModel,
    /// Detailed metrics captured during training.
    pub metrics: TrainingMetrics,
    /// What the loader accepted and rejected; default when training from records.
    pub load_report: LoadReport,
}

impl Trainer {
    /// Creates a new trainer for the supplied configuration.
    #[must_use]
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Loads `word [tf [df]]` records from `path` and trains on them.
    pub fn train_from_path<P: AsRef<Path>>(
        &self,
        path: P,
        ingest: &IngestConfig,
    ) -> Result<TrainerArtifacts> {
        let (records, report) = load_records(path.as_ref(), ingest)?;
        info!(
            "loaded {} records from {} ({} rejected, {} blank)",
            report.records,
            path.as_ref().display(),
            report.rejected.len(),
            report.blank
        );
        let mut artifacts = self.train_from_records(&records, ingest)?;
        artifacts.load_report = report;
        Ok(artifacts)
    }

    /// Trains on in-memory records, weighting each word by `ingest.weight`.
    ///
    /// `ingest.lowercase` is applied by the loader only; records are used as given.
    pub fn train_from_records(
        &self,
        records: &[CorpusRecord],
        ingest: &IngestConfig,
    ) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;
        let training_start = Instant::now();

        let mut vocab = Vocabulary::new();
        let corpus = WordCorpus::from_records(records, ingest.weight, &mut vocab);
        if corpus.is_empty() {
            return Err(BpeError::InvalidConfig(
                "training requires at least one word with a nonzero weight".into(),
            ));
        }
        // One entry per record, so repeated lines count again in corpus frequencies.
        let oracle = SuffixAutomaton::from_words(records.iter().map(|r| r.word.as_str()));
        info!(
            "corpus: {} words, {} characters, {} base tokens; oracle has {} states",
            corpus.len(),
            corpus.total_chars(),
            vocab.len(),
            oracle.state_count()
        );

        let (vocab, merges, metrics) = match self.cfg.representation {
            Representation::Words => {
                let backend = WordBackend::new(corpus);
                self.run_engine(backend, vocab, &oracle, training_start)
            }
            Representation::LinkedStream => {
                let backend = LinkedStream::from_corpus(&corpus);
                drop(corpus);
                self.run_engine(backend, vocab, &oracle, training_start)
            }
        };

        let token_frequencies: Vec<(TokenId, u64)> = vocab
            .iter()
            .filter_map(|(id, token)| {
                let frequency = oracle.count_substring(token);
                (frequency > 0).then_some((id, frequency))
            })
            .collect();

        let model = BpeModel::new(vocab, merges, token_frequencies, self.cfg.clone());
        Ok(TrainerArtifacts {
            model,
            metrics,
            load_report: LoadReport::default(),
        })
    }

    fn run_engine<B: MergeBackend>(
        &self,
        backend: B,
        vocab: Vocabulary,
        oracle: &SuffixAutomaton,
        training_start: Instant,
    ) -> (Vocabulary, Vec<MergeRule>, TrainingMetrics) {
        let budget = self.cfg.max_merges;
        let mut metrics = TrainingMetrics::new(budget.unwrap_or(1024).min(16_384));
        metrics.setup_duration = training_start.elapsed();
        let mut engine = MergeEngine::new(backend, vocab, oracle, self.cfg.min_frequency);

        loop {
            if budget.is_some_and(|max| engine.merges().len() >= max) {
                metrics.stop_reason = StopReason::MaxMergesReached;
                break;
            }
            let iteration_start = Instant::now();
            let Some(step) = engine.step() else {
                metrics.stop_reason = StopReason::Converged;
                break;
            };
            let iteration = engine.merges().len();
            let distinct_pairs = engine.distinct_pairs();

            if self.cfg.show_progress {
                info!(
                    "iter {:>6} weighted {:>8} corpus {:>8} merges {:>8} distinct_pairs {:>8} token {:?}",
                    iteration,
                    step.weighted_frequency,
                    step.rule.frequency,
                    step.merges_applied,
                    distinct_pairs,
                    engine.vocab().resolve(step.rule.result)
                );
            }

            metrics.iterations.push(IterationMetrics {
                iteration,
                weighted_frequency: step.weighted_frequency,
                oracle_frequency: step.rule.frequency,
                merges_applied: step.merges_applied,
                distinct_pairs,
                elapsed_iteration: iteration_start.elapsed(),
                elapsed_total: training_start.elapsed(),
                rss_kb: sample_rss_kb(),
            });
        }

        let (_, vocab, merges) = engine.into_parts();
        metrics.total_duration = training_start.elapsed();
        if self.cfg.show_progress {
            info!(
                "completed {} merges in {:.2?}; vocab size {}",
                merges.len(),
                metrics.total_duration,
                vocab.len()
            );
        }
        (vocab, merges, metrics)
    }
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BPE model with vocab size {}", self.model.vocab_size())?;
        writeln!(f, "Merges learned: {}", self.model.merges().len())?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightSource;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::tempdir;

    fn trainer(representation: Representation) -> Trainer {
        let cfg = TrainerConfig::builder()
            .representation(representation)
            .show_progress(false)
            .build()
            .unwrap();
        Trainer::new(cfg)
    }

    fn sample() -> Vec<CorpusRecord> {
        vec![
            CorpusRecord::with_counts("low", 5, 5),
            CorpusRecord::with_counts("lower", 2, 2),
            CorpusRecord::with_counts("newest", 6, 6),
            CorpusRecord::with_counts("widest", 3, 3),
        ]
    }

    fn merge_table(artifacts: &TrainerArtifacts) -> String {
        let mut out = Vec::new();
        artifacts.model.write_merge_table(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn first_merge_uses_oracle_frequency() {
        let artifacts = trainer(Representation::Words)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        let model = &artifacts.model;
        let first = model.merges()[0];
        assert_eq!(model.vocab().resolve(first.pair.0), "e");
        assert_eq!(model.vocab().resolve(first.pair.1), "s");
        assert_eq!(first.frequency, 2);
        assert_eq!(artifacts.metrics.iterations[0].weighted_frequency, 9);
        assert_eq!(artifacts.metrics.stop_reason, StopReason::Converged);
        assert!(merge_table(&artifacts)
            .lines()
            .nth(1)
            .is_some_and(|line| line == "(e, s) -> es, frequency: 2"));
    }

    #[test]
    fn token_table_lists_nonzero_tokens_in_id_order() {
        let artifacts = trainer(Representation::Words)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        let freqs = artifacts.model.token_frequencies();
        assert!(freqs.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(freqs.iter().all(|&(_, n)| n > 0));
        let e = artifacts.model.vocab().id_of("e").unwrap();
        assert!(freqs.contains(&(e, 4)));
    }

    #[test]
    fn rare_pairs_produce_no_merges() {
        let records = vec![
            CorpusRecord::with_counts("ab", 1, 1),
            CorpusRecord::with_counts("cd", 1, 1),
            CorpusRecord::with_counts("ef", 1, 1),
        ];
        let artifacts = trainer(Representation::Words)
            .train_from_records(&records, &IngestConfig::default())
            .unwrap();
        assert!(artifacts.model.merges().is_empty());
        assert_eq!(artifacts.model.token_frequencies().len(), 6);
    }

    #[test]
    fn merge_budget_stops_early() {
        let cfg = TrainerConfig::builder()
            .max_merges(Some(2))
            .show_progress(false)
            .build()
            .unwrap();
        let artifacts = Trainer::new(cfg)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        assert_eq!(artifacts.model.merges().len(), 2);
        assert_eq!(artifacts.metrics.stop_reason, StopReason::MaxMergesReached);
    }

    #[test]
    fn empty_corpus_is_rejected() {
        let err = trainer(Representation::Words)
            .train_from_records(&[], &IngestConfig::default())
            .expect_err("nothing to train on");
        assert!(matches!(err, BpeError::InvalidConfig(_)));
    }

    #[test]
    fn repeated_records_count_again_in_corpus_frequencies() {
        let records = vec![
            CorpusRecord::with_counts("abc", 1, 1),
            CorpusRecord::with_counts("abc", 1, 1),
            CorpusRecord::with_counts("xab", 0, 0),
        ];
        let artifacts = trainer(Representation::Words)
            .train_from_records(&records, &IngestConfig::default())
            .unwrap();
        let model = &artifacts.model;
        let first = model.merges()[0];
        assert_eq!(model.vocab().resolve(first.result), "ab");
        assert_eq!(artifacts.metrics.iterations[0].weighted_frequency, 2);
        assert_eq!(first.frequency, 3);
        let x = model.vocab().id_of("x").unwrap();
        assert!(model.token_frequencies().contains(&(x, 1)));
    }

    #[test]
    fn zero_weight_corpus_is_rejected() {
        let records = vec![CorpusRecord::with_counts("aa", 0, 0)];
        let err = trainer(Representation::LinkedStream)
            .train_from_records(&records, &IngestConfig::default())
            .expect_err("no weighted words");
        assert!(matches!(err, BpeError::InvalidConfig(_)));
    }

    #[test]
    fn huge_weights_do_not_overflow() {
        let records = vec![
            CorpusRecord::with_counts("abab", u64::MAX / 2 + 1, 1),
            CorpusRecord::with_counts("ab", u64::MAX, 1),
        ];
        let words = trainer(Representation::Words)
            .train_from_records(&records, &IngestConfig::default())
            .unwrap();
        let linked = trainer(Representation::LinkedStream)
            .train_from_records(&records, &IngestConfig::default())
            .unwrap();
        assert_eq!(words.metrics.iterations[0].weighted_frequency, u64::MAX);
        assert_eq!(words.model.merges(), linked.model.merges());
        assert_eq!(words.model.merges()[0].frequency, 3);
    }

    #[test]
    fn runs_are_deterministic() {
        let first = trainer(Representation::Words)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        let second = trainer(Representation::Words)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        assert_eq!(merge_table(&first), merge_table(&second));
    }

    #[test]
    fn representations_agree() {
        let words = trainer(Representation::Words)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        let linked = trainer(Representation::LinkedStream)
            .train_from_records(&sample(), &IngestConfig::default())
            .unwrap();
        assert_eq!(words.model.merges(), linked.model.merges());
        assert_eq!(
            words.model.token_frequencies(),
            linked.model.token_frequencies()
        );
    }

    #[test]
    fn weight_source_changes_selection() {
        let records = vec![
            CorpusRecord::with_counts("ab", 10, 1),
            CorpusRecord::with_counts("cd", 1, 10),
        ];
        let by_df = IngestConfig::builder()
            .weight(WeightSource::DocumentFrequency)
            .build();
        let artifacts = trainer(Representation::Words)
            .train_from_records(&records, &by_df)
            .unwrap();
        let first = artifacts.model.merges()[0];
        assert_eq!(artifacts.model.vocab().resolve(first.result), "cd");
    }

    #[test]
    fn train_from_path_reports_rejected_lines() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("corpus.tsv");
        fs::write(&path, "low 5 5\nlower 2 2\nbroken x\n\nnewest 6 6\nwidest 3 3\n").unwrap();
        let artifacts = trainer(Representation::Words)
            .train_from_path(&path, &IngestConfig::default())
            .unwrap();
        assert_eq!(artifacts.load_report.records, 4);
        assert_eq!(artifacts.load_report.rejected.len(), 1);
        assert_eq!(artifacts.model.merges()[0].frequency, 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn training_converges_within_character_budget(
            words in prop::collection::vec(("[abc]{1,6}", 1u64..5), 1..20)
        ) {
            let records: Vec<CorpusRecord> = words
                .iter()
                .map(|(w, tf)| CorpusRecord::with_counts(w.clone(), *tf, 1))
                .collect();
            let chars: usize = words.iter().map(|(w, _)| w.len()).sum();
            let artifacts = trainer(Representation::Words)
                .train_from_records(&records, &IngestConfig::default())
                .unwrap();
            prop_assert!(artifacts.model.merges().len() <= chars);
            prop_assert_eq!(artifacts.metrics.stop_reason, StopReason::Converged);
        }
    }
}
