//! The sequential merge loop, generic over how the corpus is represented.

use log::trace;

use crate::automaton::SuffixAutomaton;
use crate::corpus::{WordCorpus, WordId};
use crate::linked::LinkedStream;
use crate::model::{MergeRule, Pair, TokenId};
use crate::pair_index::PairIndex;
use crate::vocab::Vocabulary;

/// Corpus representation the engine can select pairs from and merge into.
pub trait MergeBackend {
    /// Highest-weighted pair, ties to the smallest `(left, right)`.
    fn best_pair(&self) -> Option<(Pair, u64)>;

    /// Replaces every occurrence of `pair` with `new_token`; returns how many were replaced.
    fn merge(&mut self, pair: Pair, new_token: TokenId) -> usize;

    /// Number of distinct live pairs.
    fn distinct_pairs(&self) -> usize;
}

/// Per-word token vectors plus the inverted pair index.
#[derive(Debug, Clone)]
pub struct WordBackend {
    corpus: WordCorpus,
    index: PairIndex,
}

impl WordBackend {
    /// Indexes `corpus`.
    #[must_use]
    pub fn new(corpus: WordCorpus) -> Self {
        let index = PairIndex::build(&corpus);
        Self { corpus, index }
    }

    /// Current state of the words.
    #[must_use]
    pub fn corpus(&self) -> &WordCorpus {
        &self.corpus
    }

    /// Current state of the index.
    #[must_use]
    pub fn index(&self) -> &PairIndex {
        &self.index
    }

    /// Returns the words, dropping the index.
    #[must_use]
    pub fn into_corpus(self) -> WordCorpus {
        self.corpus
    }
}

impl MergeBackend for WordBackend {
    fn best_pair(&self) -> Option<(Pair, u64)> {
        self.index.best_pair()
    }

    fn merge(&mut self, pair: Pair, new_token: TokenId) -> usize {
        // The bucket is mutated during the update, so take a snapshot first.
        let mut affected: Vec<WordId> = match self.index.words_with(pair) {
            Some(words) => words.iter().copied().collect(),
            None => return 0,
        };
        affected.sort_unstable();
        self.index
            .update_after_merge(&mut self.corpus, pair, new_token, &affected)
    }

    fn distinct_pairs(&self) -> usize {
        self.index.len()
    }
}

impl MergeBackend for LinkedStream {
    fn best_pair(&self) -> Option<(Pair, u64)> {
        LinkedStream::best_pair(self)
    }

    fn merge(&mut self, pair: Pair, new_token: TokenId) -> usize {
        self.merge_pair(pair, new_token)
    }

    fn distinct_pairs(&self) -> usize {
        LinkedStream::distinct_pairs(self)
    }
}

/// Lifecycle of a [`MergeEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// More merges may follow.
    Running,
    /// No pair reaches the minimum frequency; further steps do nothing.
    Converged,
}

/// Result of one successful iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeStep {
    /// Rule appended to the merge table.
    pub rule: MergeRule,
    /// Weighted frequency that won selection.
    pub weighted_frequency: u64,
    /// Occurrences replaced in the backend.
    pub merges_applied: usize,
}

/// Drives selection, minting, oracle lookup and merging until convergence.
#[derive(Debug)]
pub struct MergeEngine<'o, B> {
    backend: B,
    vocab: Vocabulary,
    oracle: &'o SuffixAutomaton,
    min_frequency: u64,
    state: EngineState,
    merges: Vec<MergeRule>,
}

impl<'o, B: MergeBackend> MergeEngine<'o, B> {
    /// Creates a running engine. `vocab` must already hold every base token of `backend`.
    pub fn new(
        backend: B,
        vocab: Vocabulary,
        oracle: &'o SuffixAutomaton,
        min_frequency: u64,
    ) -> Self {
        Self {
            backend,
            vocab,
            oracle,
            min_frequency,
            state: EngineState::Running,
            merges: Vec::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Rules learned so far, oldest first.
    #[must_use]
    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    /// Vocabulary including every minted token.
    #[must_use]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Underlying corpus representation.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Performs one merge, or moves to [`EngineState::Converged`] and returns `None`.
    pub fn step(&mut self) -> Option<MergeStep> {
        if self.state == EngineState::Converged {
            return None;
        }
        let best = self
            .backend
            .best_pair()
            .filter(|&(_, frequency)| frequency >= self.min_frequency);
        let Some((pair, weighted_frequency)) = best else {
            self.state = EngineState::Converged;
            return None;
        };

        let merged = format!(
            "{}{}",
            self.vocab.resolve(pair.0),
            self.vocab.resolve(pair.1)
        );
        let frequency = self.oracle.count_substring(&merged);
        let result = self.vocab.intern(&merged);
        let merges_applied = self.backend.merge(pair, result);
        trace!("merged {pair:?} into {merged:?} ({merges_applied} occurrences)");

        let rule = MergeRule {
            pair,
            result,
            frequency,
        };
        self.merges.push(rule);
        Some(MergeStep {
            rule,
            weighted_frequency,
            merges_applied,
        })
    }

    /// Steps until convergence or until `limit` merges have been learned in total.
    pub fn run(&mut self, limit: Option<usize>) -> usize {
        let start = self.merges.len();
        while limit.map_or(true, |max| self.merges.len() < max) {
            if self.step().is_none() {
                break;
            }
        }
        self.merges.len() - start
    }

    /// Number of distinct live pairs in the backend.
    #[must_use]
    pub fn distinct_pairs(&self) -> usize {
        self.backend.distinct_pairs()
    }

    /// Consumes the engine, returning backend, vocabulary and merge rules.
    pub fn into_parts(self) -> (B, Vocabulary, Vec<MergeRule>) {
        (self.backend, self.vocab, self.merges)
    }
}
