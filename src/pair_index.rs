//! Inverted index from adjacent token pairs to the words containing them.

use std::collections::hash_map::Entry;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::corpus::{WordCorpus, WordId};
use crate::error::{BpeError, Result};
use crate::model::{Pair, TokenId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PairEntry {
    words: FxHashSet<WordId>,
    frequency: u64,
}

/// Pair -> word-set index kept in lockstep with a [`WordCorpus`].
///
/// A pair is a key iff some word currently holds it adjacent. Each entry also
/// carries the weighted frequency Σ(occurrences × weight) over its words, updated
/// per affected word so selection never rescans the corpus.
#[derive(Debug, Clone, Default)]
pub struct PairIndex {
    entries: FxHashMap<Pair, PairEntry>,
}

/// Occurrence count of every adjacent pair, overlapping positions included.
pub(crate) fn pair_occurrences(tokens: &[TokenId]) -> FxHashMap<Pair, u64> {
    let mut counts = FxHashMap::default();
    for window in tokens.windows(2) {
        *counts.entry((window[0], window[1])).or_insert(0) += 1;
    }
    counts
}

impl PairIndex {
    /// Indexes every pair of every word.
    #[must_use]
    pub fn build(corpus: &WordCorpus) -> Self {
        let mut index = Self::default();
        for (id, word) in corpus.words().iter().enumerate() {
            for (pair, count) in pair_occurrences(word.tokens()) {
                let entry = index.entries.entry(pair).or_default();
                entry.words.insert(id);
                entry.frequency = entry
                    .frequency
                    .saturating_add(count.saturating_mul(word.weight()));
            }
        }
        index
    }

    /// Number of distinct live pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no word has two or more tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Words currently containing `pair`.
    #[must_use]
    pub fn words_with(&self, pair: Pair) -> Option<&FxHashSet<WordId>> {
        self.entries.get(&pair).map(|entry| &entry.words)
    }

    /// Weighted frequency of `pair`, zero when absent.
    #[must_use]
    pub fn frequency(&self, pair: Pair) -> u64 {
        self.entries.get(&pair).map_or(0, |entry| entry.frequency)
    }

    /// Pair with the highest weighted frequency.
    ///
    /// Ties go to the lexicographically smallest `(left, right)` id pair, which keeps
    /// selection independent of hash iteration order.
    #[must_use]
    pub fn best_pair(&self) -> Option<(Pair, u64)> {
        select_best(self.entries.iter().map(|(&pair, entry)| (pair, entry.frequency)))
    }

    /// Merges `pair` into `new_token` inside every word of `affected` and patches the
    /// index for each word's pair-set difference. Returns the number of occurrences
    /// replaced.
    ///
    /// The merged pair's own entry is dropped afterwards; it can only come back
    /// through a later merge that forms it again.
    pub fn update_after_merge(
        &mut self,
        corpus: &mut WordCorpus,
        pair: Pair,
        new_token: TokenId,
        affected: &[WordId],
    ) -> usize {
        let mut merges = 0usize;
        for &id in affected {
            let word = corpus.word_mut(id);
            let weight = word.weight();
            let before = pair_occurrences(word.tokens());
            let outcome = word.merge_pair(pair, new_token);
            if outcome.merges == 0 {
                continue;
            }
            merges += outcome.merges;
            let after = pair_occurrences(word.tokens());

            for (p, count) in before {
                self.subtract(p, count.saturating_mul(weight));
            }
            for (p, count) in after {
                let entry = self.entries.entry(p).or_default();
                entry.frequency = entry.frequency.saturating_add(count.saturating_mul(weight));
            }
            for p in outcome.vanished {
                self.detach(p, id);
            }
            for p in outcome.formed {
                self.entries.entry(p).or_default().words.insert(id);
            }
        }
        self.remove_pair(pair);
        merges
    }

    /// Drops `pair` from the index outright.
    pub fn remove_pair(&mut self, pair: Pair) {
        self.entries.remove(&pair);
    }

    fn subtract(&mut self, pair: Pair, amount: u64) {
        if let Some(entry) = self.entries.get_mut(&pair) {
            entry.frequency = entry.frequency.saturating_sub(amount);
        }
    }

    fn detach(&mut self, pair: Pair, id: WordId) {
        if let Entry::Occupied(mut occupied) = self.entries.entry(pair) {
            occupied.get_mut().words.remove(&id);
            if occupied.get().words.is_empty() {
                occupied.remove();
            }
        }
    }

    /// Rebuilds the index from scratch and reports the first disagreement.
    pub fn verify(&self, corpus: &WordCorpus) -> Result<()> {
        let expected = Self::build(corpus);
        for (pair, entry) in &self.entries {
            match expected.entries.get(pair) {
                None => {
                    return Err(BpeError::Internal(format!(
                        "stale pair {pair:?} indexed for words {:?}",
                        entry.words
                    )))
                }
                Some(fresh) if fresh != entry => {
                    return Err(BpeError::Internal(format!(
                        "pair {pair:?} indexed as {entry:?}, corpus holds {fresh:?}"
                    )))
                }
                Some(_) => {}
            }
        }
        if let Some(pair) = expected
            .entries
            .keys()
            .find(|pair| !self.entries.contains_key(pair))
        {
            return Err(BpeError::Internal(format!(
                "pair {pair:?} present in corpus but missing from index"
            )));
        }
        Ok(())
    }
}

/// Highest frequency wins; equal frequencies fall back to the smallest pair.
pub(crate) fn select_best<I>(candidates: I) -> Option<(Pair, u64)>
where
    I: IntoIterator<Item = (Pair, u64)>,
{
    candidates.into_iter().fold(None, |best, (pair, frequency)| match best {
        Some((best_pair, best_frequency))
            if best_frequency > frequency || (best_frequency == frequency && best_pair < pair) =>
        {
            best
        }
        _ => Some((pair, frequency)),
    })
}
