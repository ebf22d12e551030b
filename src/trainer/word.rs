//! Mutable token sequence of a single corpus word.

use rustc_hash::FxHashSet;

use crate::model::{Pair, TokenId};

/// Outcome of merging a specific pair within a [`Word`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Number of pair occurrences replaced inside the word.
    pub merges: usize,
    /// Pairs present before the merge and absent after it.
    pub vanished: Vec<Pair>,
    /// Pairs absent before the merge and present after it.
    pub formed: Vec<Pair>,
}

/// A distinct corpus word with its weight and current tokenization.
#[derive(Debug, Clone)]
pub struct Word {
    original: String,
    weight: u64,
    tokens: Vec<TokenId>,
    pairs: FxHashSet<Pair>,
}

/// Distinct adjacent pairs of a token sequence.
#[must_use]
pub fn compute_pairs(tokens: &[TokenId]) -> FxHashSet<Pair> {
    tokens.windows(2).map(|w| (w[0], w[1])).collect()
}

impl Word {
    /// Builds a word from its original spelling and initial token ids.
    #[must_use]
    pub fn new(original: String, weight: u64, tokens: Vec<TokenId>) -> Self {
        let pairs = compute_pairs(&tokens);
        Self {
            original,
            weight,
            tokens,
            pairs,
        }
    }

    /// Spelling of the word as loaded, before any merge.
    #[must_use]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Weight applied to every pair occurrence in this word.
    #[must_use]
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// Current tokenization.
    #[must_use]
    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    /// Distinct adjacent pairs of the current tokenization.
    #[must_use]
    pub fn pairs(&self) -> &FxHashSet<Pair> {
        &self.pairs
    }

    /// Number of adjacent positions equal to `pair`, overlapping positions included.
    #[must_use]
    pub fn count_pair_occurrences(&self, pair: Pair) -> u64 {
        self.tokens
            .windows(2)
            .filter(|w| (w[0], w[1]) == pair)
            .count() as u64
    }

    /// Replaces every non-overlapping occurrence of `pair` with `replacement`,
    /// scanning left to right, then refreshes the pair set.
    ///
    /// Once an occurrence is consumed the scan resumes after its right token, so
    /// `[a, a, a]` merged on `(a, a)` becomes `[x, a]`.
    pub fn merge_pair(&mut self, pair: Pair, replacement: TokenId) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        if self.tokens.len() < 2 {
            return outcome;
        }

        let len = self.tokens.len();
        let mut read = 0usize;
        let mut write = 0usize;
        while read < len {
            if read + 1 < len && self.tokens[read] == pair.0 && self.tokens[read + 1] == pair.1 {
                self.tokens[write] = replacement;
                read += 2;
                outcome.merges += 1;
            } else {
                self.tokens[write] = self.tokens[read];
                read += 1;
            }
            write += 1;
        }
        self.tokens.truncate(write);

        if outcome.merges == 0 {
            return outcome;
        }

        let after = compute_pairs(&self.tokens);
        outcome.vanished = self.pairs.difference(&after).copied().collect();
        outcome.formed = after.difference(&self.pairs).copied().collect();
        self.pairs = after;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_replaces_leading_pair() {
        let mut word = Word::new("abc".into(), 1, vec![0, 1, 2]);
        let outcome = word.merge_pair((0, 1), 9);
        assert_eq!(word.tokens(), &[9, 2]);
        assert_eq!(outcome.merges, 1);
        assert!(outcome.vanished.contains(&(0, 1)));
        assert!(outcome.vanished.contains(&(1, 2)));
        assert_eq!(outcome.formed, vec![(9, 2)]);
    }

    #[test]
    fn merge_is_left_biased_and_non_overlapping() {
        let mut word = Word::new("aaa".into(), 1, vec![0, 0, 0]);
        word.merge_pair((0, 0), 7);
        assert_eq!(word.tokens(), &[7, 0]);

        let mut word = Word::new("aaaa".into(), 1, vec![0, 0, 0, 0]);
        word.merge_pair((0, 0), 7);
        assert_eq!(word.tokens(), &[7, 7]);
        assert_eq!(word.pairs().len(), 1);
        assert!(word.pairs().contains(&(7, 7)));
    }

    #[test]
    fn count_includes_overlapping_positions() {
        let word = Word::new("aaa".into(), 3, vec![0, 0, 0]);
        assert_eq!(word.count_pair_occurrences((0, 0)), 2);
        assert_eq!(word.count_pair_occurrences((0, 1)), 0);
    }

    #[test]
    fn merge_without_match_leaves_word_untouched() {
        let mut word = Word::new("ab".into(), 1, vec![0, 1]);
        let outcome = word.merge_pair((1, 0), 5);
        assert_eq!(outcome, MergeOutcome::default());
        assert_eq!(word.tokens(), &[0, 1]);
    }

    #[test]
    fn pairs_track_tokens_after_merge() {
        let mut word = Word::new("abab".into(), 1, vec![0, 1, 0, 1]);
        word.merge_pair((0, 1), 4);
        assert_eq!(word.pairs(), &compute_pairs(word.tokens()));
    }
}
