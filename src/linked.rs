//! Whole-corpus token stream kept as an arena-backed doubly linked list.
//!
//! Every word is laid out once, followed by a separator node. Merging a pair splices the
//! right node out of the list and tombstones it, so node ids stay stable and each pair's
//! occurrence list can be kept in stream order without ever being rewritten. Occurrences
//! go stale as neighbours merge; they are validated lazily when their pair is merged.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::corpus::{WordCorpus, WordId};
use crate::error::{BpeError, Result};
use crate::model::{Pair, TokenId};
use crate::pair_index::{pair_occurrences, select_best};

/// Token value of the node closing every word.
pub const SEPARATOR: TokenId = TokenId::MAX;

type NodeId = usize;

#[derive(Debug, Clone)]
struct Node {
    token: TokenId,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    word: WordId,
    removed: bool,
}

#[derive(Debug, Clone, Default)]
struct PairSlot {
    frequency: u64,
    occurrences: Vec<NodeId>,
}

/// Linked-list corpus representation with per-pair occurrence lists.
#[derive(Debug, Clone)]
pub struct LinkedStream {
    nodes: Vec<Node>,
    weights: Vec<u64>,
    pairs: FxHashMap<Pair, PairSlot>,
}

impl LinkedStream {
    /// Lays out every word of `corpus` in order, each closed by a [`SEPARATOR`] node.
    #[must_use]
    pub fn from_corpus(corpus: &WordCorpus) -> Self {
        let capacity = corpus.total_chars() + corpus.len();
        let mut nodes: Vec<Node> = Vec::with_capacity(capacity);
        let mut weights = Vec::with_capacity(corpus.len());
        let mut pairs: FxHashMap<Pair, PairSlot> = FxHashMap::default();

        for (word_id, word) in corpus.words().iter().enumerate() {
            weights.push(word.weight());
            for &token in word.tokens().iter().chain(std::iter::once(&SEPARATOR)) {
                let id = nodes.len();
                let prev = id.checked_sub(1);
                if let Some(p) = prev {
                    nodes[p].next = Some(id);
                    let left = nodes[p].token;
                    if left != SEPARATOR && token != SEPARATOR {
                        let slot = pairs.entry((left, token)).or_default();
                        slot.frequency = slot.frequency.saturating_add(word.weight());
                        slot.occurrences.push(p);
                    }
                }
                nodes.push(Node {
                    token,
                    prev,
                    next: None,
                    word: word_id,
                    removed: false,
                });
            }
        }

        Self {
            nodes,
            weights,
            pairs,
        }
    }

    /// Pair with the highest weighted frequency, ties to the smallest pair.
    #[must_use]
    pub fn best_pair(&self) -> Option<(Pair, u64)> {
        select_best(self.pairs.iter().map(|(&pair, slot)| (pair, slot.frequency)))
    }

    /// Weighted frequency of `pair`, zero when absent.
    #[must_use]
    pub fn frequency(&self, pair: Pair) -> u64 {
        self.pairs.get(&pair).map_or(0, |slot| slot.frequency)
    }

    /// Number of distinct pairs with a positive frequency.
    #[must_use]
    pub fn distinct_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// Replaces every live occurrence of `pair` with `new_token`, left to right, and
    /// returns how many were replaced.
    pub fn merge_pair(&mut self, pair: Pair, new_token: TokenId) -> usize {
        let Some(slot) = self.pairs.remove(&pair) else {
            return 0;
        };
        let mut occurrences = slot.occurrences;
        // Node ids grow along the stream, so sorting restores left-to-right order.
        occurrences.sort_unstable();
        occurrences.dedup();

        let mut merges = 0usize;
        for left in occurrences {
            let Some(right) = self.live_pair_at(left, pair) else {
                continue;
            };
            let weight = self.weights[self.nodes[left].word];
            let prev = self.nodes[left].prev.filter(|&p| self.nodes[p].token != SEPARATOR);
            let next = self.nodes[right]
                .next
                .filter(|&n| self.nodes[n].token != SEPARATOR);

            if let Some(p) = prev {
                let before = self.nodes[p].token;
                self.decrement((before, pair.0), weight);
                self.increment((before, new_token), weight, p);
            }
            if let Some(n) = next {
                let after = self.nodes[n].token;
                self.decrement((pair.1, after), weight);
                self.increment((new_token, after), weight, left);
            }

            self.nodes[left].token = new_token;
            self.nodes[left].next = self.nodes[right].next;
            if let Some(n) = self.nodes[right].next {
                self.nodes[n].prev = Some(left);
            }
            let tomb = &mut self.nodes[right];
            tomb.removed = true;
            tomb.prev = None;
            tomb.next = None;
            merges += 1;
        }
        merges
    }

    fn live_pair_at(&self, left: NodeId, pair: Pair) -> Option<NodeId> {
        let node = &self.nodes[left];
        if node.removed || node.token != pair.0 {
            return None;
        }
        let right = node.next?;
        (self.nodes[right].token == pair.1).then_some(right)
    }

    fn increment(&mut self, pair: Pair, weight: u64, at: NodeId) {
        let slot = self.pairs.entry(pair).or_default();
        slot.frequency = slot.frequency.saturating_add(weight);
        slot.occurrences.push(at);
    }

    fn decrement(&mut self, pair: Pair, weight: u64) {
        if let Entry::Occupied(mut occupied) = self.pairs.entry(pair) {
            let slot = occupied.get_mut();
            slot.frequency = slot.frequency.saturating_sub(weight);
            if slot.frequency == 0 {
                occupied.remove();
            }
        }
    }

    /// Current token sequence of every word, in corpus order.
    #[must_use]
    pub fn tokens_by_word(&self) -> Vec<Vec<TokenId>> {
        let mut words = vec![Vec::new(); self.weights.len()];
        let mut cursor = (!self.nodes.is_empty()).then_some(0);
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            if node.token != SEPARATOR {
                words[node.word].push(node.token);
            }
            cursor = node.next;
        }
        words
    }

    /// Recounts every pair from the live stream and compares with the tracked totals.
    pub fn verify(&self) -> Result<()> {
        let mut expected: FxHashMap<Pair, u64> = FxHashMap::default();
        for (word, tokens) in self.tokens_by_word().iter().enumerate() {
            for (pair, count) in pair_occurrences(tokens) {
                let total = expected.entry(pair).or_insert(0);
                *total = total.saturating_add(count.saturating_mul(self.weights[word]));
            }
        }
        for (pair, slot) in &self.pairs {
            let fresh = expected.get(pair).copied().unwrap_or(0);
            if fresh != slot.frequency {
                return Err(BpeError::Internal(format!(
                    "pair {pair:?} tracked at {}, stream holds {fresh}",
                    slot.frequency
                )));
            }
        }
        if let Some(pair) = expected.keys().find(|pair| !self.pairs.contains_key(pair)) {
            return Err(BpeError::Internal(format!(
                "pair {pair:?} present in stream but untracked"
            )));
        }
        Ok(())
    }
}
