//! Token string to integer ID mapping.
//!
//! TokenDictionary maps token strings to unique integer IDs so the alignment
//! engine compares integers instead of strings.

use std::collections::HashMap;

pub type TokenId = u32;

/// ID given to document tokens absent from the dictionary. It never matches.
pub const UNKNOWN_TOKEN: TokenId = TokenId::MAX;

/// Token dictionary mapping token strings to unique integer IDs.
///
/// IDs are assigned densely in first-seen order, so building a dictionary from
/// the same texts in the same order always yields the same IDs.
#[derive(Debug, Clone, Default)]
pub struct TokenDictionary {
    tokens_to_ids: HashMap<String, TokenId>,
    next_id: TokenId,
}

impl TokenDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or assign a token ID for a token string.
    pub fn get_or_assign(&mut self, token: &str) -> TokenId {
        if let Some(&id) = self.tokens_to_ids.get(token) {
            return id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.tokens_to_ids.insert(token.to_string(), id);
        id
    }

    /// Get the token ID for a token string if it exists.
    pub fn get(&self, token: &str) -> Option<TokenId> {
        self.tokens_to_ids.get(token).copied()
    }

    /// Assign IDs to every token of a reference text.
    pub fn intern_all(&mut self, tokens: &[String]) -> Vec<TokenId> {
        tokens.iter().map(|token| self.get_or_assign(token)).collect()
    }

    /// Look up every token of a document; unknown tokens map to [`UNKNOWN_TOKEN`].
    pub fn lookup_all(&self, tokens: &[String]) -> Vec<TokenId> {
        tokens
            .iter()
            .map(|token| self.get(token).unwrap_or(UNKNOWN_TOKEN))
            .collect()
    }

    /// Get the number of registered tokens.
    pub fn len(&self) -> usize {
        self.tokens_to_ids.len()
    }

    /// Check if the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens_to_ids.is_empty()
    }
}
