//! Suffix automaton over the original corpus, used as an exact substring counter.
//!
//! The automaton is built online, one symbol at a time, over every original word
//! followed by a separator symbol that no `char` can produce. After construction each
//! state knows how many end positions of the corpus fall into its equivalence class,
//! so counting the occurrences of a string costs one transition per character.

use log::debug;
use rustc_hash::FxHashMap;

/// Word separator. Lies above `char::MAX`, so it never collides with corpus text.
const SEPARATOR: u32 = u32::MAX;

type StateId = usize;

#[derive(Debug, Clone, Default)]
struct State {
    len: usize,
    link: Option<StateId>,
    next: FxHashMap<u32, StateId>,
    occurrences: u64,
}

/// Read-only substring frequency oracle over a fixed corpus.
#[derive(Debug, Clone)]
pub struct SuffixAutomaton {
    states: Vec<State>,
    last: StateId,
}

impl SuffixAutomaton {
    /// Builds the automaton for a single text without separators.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut automaton = Self::with_capacity(text.len());
        for ch in text.chars() {
            automaton.extend(u32::from(ch));
        }
        automaton.propagate_occurrences();
        automaton
    }

    /// Builds the automaton over `words`, each terminated by a separator, so no
    /// match can span two words.
    #[must_use]
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut automaton = Self::with_capacity(0);
        for word in words {
            for ch in word.as_ref().chars() {
                automaton.extend(u32::from(ch));
            }
            automaton.extend(SEPARATOR);
        }
        automaton.propagate_occurrences();
        debug!(
            "suffix automaton built with {} states over {} symbols",
            automaton.states.len(),
            automaton.states[automaton.last].len
        );
        automaton
    }

    fn with_capacity(symbols: usize) -> Self {
        let mut states = Vec::with_capacity(2 * symbols + 1);
        states.push(State::default());
        Self { states, last: 0 }
    }

    fn extend(&mut self, symbol: u32) {
        let cur = self.states.len();
        self.states.push(State {
            len: self.states[self.last].len + 1,
            link: None,
            next: FxHashMap::default(),
            occurrences: 1,
        });

        let mut p = Some(self.last);
        while let Some(pid) = p {
            if self.states[pid].next.contains_key(&symbol) {
                break;
            }
            self.states[pid].next.insert(symbol, cur);
            p = self.states[pid].link;
        }

        let Some(pid) = p else {
            self.states[cur].link = Some(0);
            self.last = cur;
            return;
        };

        let q = self.states[pid].next[&symbol];
        if self.states[pid].len + 1 == self.states[q].len {
            self.states[cur].link = Some(q);
        } else {
            let clone = self.states.len();
            let cloned = State {
                len: self.states[pid].len + 1,
                link: self.states[q].link,
                next: self.states[q].next.clone(),
                occurrences: 0,
            };
            self.states.push(cloned);

            let mut p = Some(pid);
            while let Some(id) = p {
                match self.states[id].next.get_mut(&symbol) {
                    Some(target) if *target == q => *target = clone,
                    _ => break,
                }
                p = self.states[id].link;
            }
            self.states[q].link = Some(clone);
            self.states[cur].link = Some(clone);
        }
        self.last = cur;
    }

    /// Pushes end-position counts from every state to its suffix-link parent, longest
    /// states first.
    fn propagate_occurrences(&mut self) {
        let max_len = self.states[self.last].len;
        let mut by_len = vec![0usize; max_len + 2];
        for state in &self.states {
            by_len[state.len + 1] += 1;
        }
        for i in 1..by_len.len() {
            by_len[i] += by_len[i - 1];
        }
        let mut order = vec![0usize; self.states.len()];
        for (id, state) in self.states.iter().enumerate() {
            order[by_len[state.len]] = id;
            by_len[state.len] += 1;
        }
        for &id in order.iter().rev() {
            if let Some(link) = self.states[id].link {
                let occurrences = self.states[id].occurrences;
                self.states[link].occurrences += occurrences;
            }
        }
    }

    /// Number of (possibly overlapping) occurrences of `pattern` in the corpus.
    ///
    /// The empty pattern counts as zero.
    #[must_use]
    pub fn count_substring(&self, pattern: &str) -> u64 {
        if pattern.is_empty() {
            return 0;
        }
        let mut state = 0;
        for ch in pattern.chars() {
            match self.states[state].next.get(&u32::from(ch)) {
                Some(&next) => state = next,
                None => return 0,
            }
        }
        self.states[state].occurrences
    }

    /// Number of automaton states, at most `2n` for `n` symbols.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}
