//! Append-only interner mapping token strings to dense ids.

use std::convert::TryFrom;

use rustc_hash::FxHashMap;

use crate::model::TokenId;

/// Bidirectional token string <-> id table.
///
/// Ids are assigned sequentially on first sight and never reused, so
/// `resolve(intern(s)) == s` holds for the lifetime of the table.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    str_to_id: FxHashMap<String, TokenId>,
    id_to_str: Vec<String>,
}

impl Vocabulary {
    /// Creates an empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `token`, allocating the next one if unseen.
    pub fn intern(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.str_to_id.get(token) {
            return id;
        }
        let id = TokenId::try_from(self.id_to_str.len())
            .expect("token vocabulary exceeded TokenId capacity (u32)");
        self.str_to_id.insert(token.to_owned(), id);
        self.id_to_str.push(token.to_owned());
        id
    }

    /// Returns the string for `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` was never handed out by [`Vocabulary::intern`].
    #[must_use]
    pub fn resolve(&self, id: TokenId) -> &str {
        &self.id_to_str[id as usize]
    }

    /// Fallible variant of [`Vocabulary::resolve`].
    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<&str> {
        self.id_to_str.get(id as usize).map(String::as_str)
    }

    /// Looks up an existing token without interning it.
    #[must_use]
    pub fn id_of(&self, token: &str) -> Option<TokenId> {
        self.str_to_id.get(token).copied()
    }

    /// Number of interned tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    /// Returns true when nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    /// Iterates `(id, token)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &str)> + '_ {
        self.id_to_str
            .iter()
            .enumerate()
            .map(|(idx, token)| (idx as TokenId, token.as_str()))
    }
}
