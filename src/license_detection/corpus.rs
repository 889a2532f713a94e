//! The reference license corpus.
//!
//! A corpus is built once per run, before any document is processed, and is
//! shared read-only between workers behind an `Arc`.

use log::info;
use std::collections::HashMap;

use crate::error::ConfigError;
use crate::license_detection::align::PreparedTokens;
use crate::license_detection::dictionary::{TokenDictionary, TokenId};
use crate::license_detection::models::{Document, LicenseId};
use crate::license_detection::tokenize::{NormalizeOptions, NormalizedText, normalize};
use crate::utils::hash::Fingerprint;

/// A reference license as loaded, before tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub id: LicenseId,
    pub short_name: String,
    pub text: String,
    /// Lower wins ties between equally similar references. Unset sorts last.
    pub precedence: Option<u32>,
}

/// A tokenized reference license.
#[derive(Debug, Clone)]
pub struct ReferenceLicense {
    pub id: LicenseId,
    pub short_name: String,
    pub text: String,
    /// Position in the precedence order; the lower, the stronger.
    pub rank: usize,
    normalized: NormalizedText,
    prepared: PreparedTokens,
}

impl ReferenceLicense {
    pub fn normalized(&self) -> &NormalizedText {
        &self.normalized
    }

    pub fn prepared(&self) -> &PreparedTokens {
        &self.prepared
    }
}

#[derive(Debug, Clone)]
pub struct Corpus {
    references: Vec<ReferenceLicense>,
    by_id: HashMap<LicenseId, usize>,
    dictionary: TokenDictionary,
    options: NormalizeOptions,
    fingerprint: String,
}

impl Corpus {
    /// Tokenizes and interns every entry.
    ///
    /// References are ordered by `(precedence, id)`; that order defines
    /// [`ReferenceLicense::rank`].
    pub fn build(
        mut entries: Vec<ReferenceEntry>,
        options: NormalizeOptions,
    ) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::EmptyCorpus);
        }

        entries.sort_by_key(|entry| (entry.precedence.unwrap_or(u32::MAX), entry.id));

        let mut by_id = HashMap::with_capacity(entries.len());
        for (rank, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.id, rank).is_some() {
                return Err(ConfigError::DuplicateReference(entry.id));
            }
        }

        let mut dictionary = TokenDictionary::new();
        let mut fingerprint = Fingerprint::new();
        fingerprint.field(format!("{:?}", options).as_bytes());

        let references: Vec<ReferenceLicense> = entries
            .into_iter()
            .enumerate()
            .map(|(rank, entry)| {
                fingerprint
                    .field(&entry.id.0.to_le_bytes())
                    .field(entry.short_name.as_bytes())
                    .field(entry.text.as_bytes());

                let normalized = normalize(entry.text.as_bytes(), &options);
                let ids = dictionary.intern_all(normalized.tokens());
                ReferenceLicense {
                    id: entry.id,
                    short_name: entry.short_name,
                    text: entry.text,
                    rank,
                    normalized,
                    prepared: PreparedTokens::new(ids),
                }
            })
            .collect();

        info!(
            "Built reference corpus: {} licenses, {} distinct tokens",
            references.len(),
            dictionary.len()
        );

        Ok(Self {
            references,
            by_id,
            dictionary,
            options,
            fingerprint: fingerprint.finish(),
        })
    }

    pub fn get(&self, id: LicenseId) -> Option<&ReferenceLicense> {
        self.by_id.get(&id).map(|&index| &self.references[index])
    }

    /// References in precedence order.
    pub fn references(&self) -> &[ReferenceLicense] {
        &self.references
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    /// SHA256 over the normalization options and every reference.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Token ids of a document in this corpus's vocabulary.
    pub fn document_tokens(&self, document: &Document) -> Vec<TokenId> {
        self.dictionary.lookup_all(document.normalized().tokens())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::dictionary::UNKNOWN_TOKEN;
    use crate::license_detection::models::FileId;

    fn entry(id: u64, short_name: &str, text: &str, precedence: Option<u32>) -> ReferenceEntry {
        ReferenceEntry {
            id: LicenseId(id),
            short_name: short_name.to_string(),
            text: text.to_string(),
            precedence,
        }
    }

    #[test]
    fn test_build_rejects_empty() {
        assert!(matches!(
            Corpus::build(Vec::new(), NormalizeOptions::default()),
            Err(ConfigError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_build_rejects_duplicate_ids() {
        let entries = vec![entry(1, "A", "a", None), entry(1, "B", "b", None)];
        assert!(matches!(
            Corpus::build(entries, NormalizeOptions::default()),
            Err(ConfigError::DuplicateReference(LicenseId(1)))
        ));
    }

    #[test]
    fn test_build_orders_by_precedence_then_id() {
        let entries = vec![
            entry(3, "C", "c text", None),
            entry(2, "B", "b text", Some(5)),
            entry(1, "A", "a text", None),
            entry(4, "D", "d text", Some(1)),
        ];
        let corpus = Corpus::build(entries, NormalizeOptions::default()).unwrap();

        let order: Vec<u64> = corpus.references().iter().map(|r| r.id.0).collect();
        assert_eq!(order, vec![4, 2, 1, 3]);
        assert_eq!(corpus.get(LicenseId(1)).unwrap().rank, 2);
        assert!(corpus.get(LicenseId(9)).is_none());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let first = Corpus::build(vec![entry(1, "A", "one", None)], NormalizeOptions::default())
            .unwrap();
        let same = Corpus::build(vec![entry(1, "A", "one", None)], NormalizeOptions::default())
            .unwrap();
        let changed = Corpus::build(vec![entry(1, "A", "two", None)], NormalizeOptions::default())
            .unwrap();

        assert_eq!(first.fingerprint(), same.fingerprint());
        assert_ne!(first.fingerprint(), changed.fingerprint());
    }

    #[test]
    fn test_document_tokens_use_shared_vocabulary() {
        let corpus = Corpus::build(
            vec![entry(1, "A", "free software", None)],
            NormalizeOptions::default(),
        )
        .unwrap();
        let document = Document::new(
            FileId(1),
            b"Free hardware".to_vec(),
            &NormalizeOptions::default(),
        );

        let ids = corpus.document_tokens(&document);
        assert_eq!(ids, vec![0, UNKNOWN_TOKEN]);
    }
}
