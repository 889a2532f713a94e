//! Bulk reclassification.
//!
//! An operator submits a text snippet together with a license decision. Every
//! document of the chosen subtree that contains the snippet, up to the match
//! threshold, receives the decision as a clearing event plus a `BULK`
//! highlight over the matching text.

use log::{debug, trace, warn};

use crate::config::MatchConfig;
use crate::license_detection::align::{AlignOptions, PreparedTokens, align, containment_bound};
use crate::license_detection::dictionary::TokenDictionary;
use crate::license_detection::highlight::{HighlightTarget, project_envelope};
use crate::license_detection::models::{
    BulkRequest, ClearingEvent, Document, FileId, Highlight, HighlightKind, Polarity, Similarity,
};
use crate::license_detection::token_sets::build_mset;
use crate::license_detection::tokenize::{NormalizeOptions, NormalizedText, normalize};

/// The result of a document clearing a bulk snippet.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome {
    pub file: FileId,
    pub event: ClearingEvent,
    pub highlight: Highlight,
    pub similarity: Similarity,
    pub low_confidence: bool,
}

/// A bulk snippet prepared once and matched against many documents.
#[derive(Debug, Clone)]
pub struct BulkMatcher {
    request: BulkRequest,
    dictionary: TokenDictionary,
    snippet: NormalizedText,
    prepared: PreparedTokens,
    threshold: f64,
    align_options: AlignOptions,
    normalize_options: NormalizeOptions,
}

impl BulkMatcher {
    pub fn new(request: BulkRequest, config: &MatchConfig) -> Self {
        let snippet = normalize(request.snippet.as_bytes(), &config.normalize);
        let mut dictionary = TokenDictionary::new();
        let prepared = PreparedTokens::new(dictionary.intern_all(snippet.tokens()));

        if snippet.is_empty() {
            warn!("Bulk {} snippet has no tokens and will not match", request.bulk);
        }

        Self {
            request,
            dictionary,
            snippet,
            prepared,
            threshold: config.threshold,
            align_options: config.align_options(),
            normalize_options: config.normalize,
        }
    }

    pub fn request(&self) -> &BulkRequest {
        &self.request
    }

    /// Options documents must be normalized with before [`Self::check`].
    pub fn normalize_options(&self) -> &NormalizeOptions {
        &self.normalize_options
    }

    /// Number of tokens of the normalized snippet.
    pub fn snippet_len(&self) -> usize {
        self.snippet.len()
    }

    /// Aligns `document` against the snippet. `None` when below threshold.
    pub fn check(&self, document: &Document) -> Option<BulkOutcome> {
        let doc_ids = self.dictionary.lookup_all(document.normalized().tokens());

        let bound = containment_bound(&build_mset(&doc_ids), &self.prepared);
        if !bound.meets(self.threshold) {
            trace!(
                "File {} cannot reach bulk {} threshold (bound {:.3})",
                document.id,
                self.request.bulk,
                bound.value()
            );
            return None;
        }

        let alignment = align(&doc_ids, &self.prepared, &self.align_options);
        if !alignment.similarity.meets(self.threshold) {
            debug!(
                "File {} below bulk {} threshold: {:.3}",
                document.id,
                self.request.bulk,
                alignment.similarity.value()
            );
            return None;
        }

        let highlight = project_envelope(
            &alignment.regions,
            document.normalized().offsets(),
            self.snippet.offsets(),
            HighlightTarget {
                file: document.id,
                license: self.request.license,
                kind: HighlightKind::Bulk,
            },
        )?;

        Some(BulkOutcome {
            file: document.id,
            event: ClearingEvent {
                file: document.id,
                license: self.request.license,
                polarity: Polarity::from_removing(self.request.removing),
                actor: self.request.actor,
                group: self.request.group,
                bulk: self.request.bulk,
            },
            highlight,
            similarity: alignment.similarity,
            low_confidence: alignment.low_confidence,
        })
    }
}

/// Matches `request` against every document, in document order.
pub fn bulk_scan(
    request: &BulkRequest,
    documents: &[Document],
    config: &MatchConfig,
) -> Vec<BulkOutcome> {
    let matcher = BulkMatcher::new(request.clone(), config);
    documents
        .iter()
        .filter_map(|document| matcher.check(document))
        .collect()
}
