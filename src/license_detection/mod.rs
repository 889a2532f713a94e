//! License Detection Engine
//!
//! This module matches documents against a corpus of reference license texts
//! and against operator-supplied bulk snippets. Both go through the same
//! tokenizer and alignment engine; matches are projected back to byte spans
//! of the original text.

pub mod align;
pub mod bulk;
pub mod corpus;
pub mod decision;
pub mod dictionary;
pub mod highlight;
pub mod loader;
pub mod models;
pub mod token_sets;
pub mod tokenize;

use log::{debug, trace};
use std::sync::Arc;

use crate::config::MatchConfig;
use crate::license_detection::align::{AlignOptions, align, containment_bound};
use crate::license_detection::corpus::Corpus;
use crate::license_detection::decision::select_best;
use crate::license_detection::highlight::{HighlightTarget, project};
use crate::license_detection::models::{
    AGENT_NAME, AlignmentResult, Document, Highlight, HighlightKind, LicenseMatch, ReferenceKey,
};
use crate::license_detection::token_sets::build_mset;

pub use bulk::{BulkMatcher, BulkOutcome, bulk_scan};
pub use corpus::{ReferenceEntry, ReferenceLicense};
pub use loader::load_corpus_from_directory;

/// The winning license of a document and its highlights.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMatch {
    pub license_match: LicenseMatch,
    /// Sorted by start offset, non-overlapping.
    pub highlights: Vec<Highlight>,
}

/// Matches single documents against a shared reference corpus.
#[derive(Debug, Clone)]
pub struct LicenseMatcher {
    corpus: Arc<Corpus>,
    threshold: f64,
    align_options: AlignOptions,
}

impl LicenseMatcher {
    pub fn new(corpus: Arc<Corpus>, config: &MatchConfig) -> Self {
        Self {
            corpus,
            threshold: config.threshold,
            align_options: config.align_options(),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn align_options(&self) -> &AlignOptions {
        &self.align_options
    }

    /// Aligns `document` against every reference that can still reach the
    /// threshold.
    ///
    /// References whose token multiset bound is already below the threshold
    /// are left out of the result.
    pub fn align_all(&self, document: &Document) -> Vec<AlignmentResult> {
        let doc_ids = self.corpus.document_tokens(document);
        if doc_ids.is_empty() {
            return Vec::new();
        }
        let doc_mset = build_mset(&doc_ids);

        self.corpus
            .references()
            .iter()
            .filter(|reference| {
                let bound = containment_bound(&doc_mset, reference.prepared());
                let keep = bound.meets(self.threshold);
                if !keep {
                    trace!(
                        "Skipping {} for file {}: bound {:.3}",
                        reference.short_name,
                        document.id,
                        bound.value()
                    );
                }
                keep
            })
            .map(|reference| {
                let alignment = align(&doc_ids, reference.prepared(), &self.align_options);
                AlignmentResult {
                    document: document.id,
                    reference: ReferenceKey::Corpus(reference.id),
                    similarity: alignment.similarity,
                    regions: alignment.regions,
                    low_confidence: alignment.low_confidence,
                }
            })
            .collect()
    }

    /// Runs alignment, decision and highlight projection for one document.
    pub fn detect(&self, document: &Document) -> Option<DocumentMatch> {
        let results = self.align_all(document);
        let best = select_best(&results, self.threshold, |key| match key {
            ReferenceKey::Corpus(id) => self.corpus.get(*id).map_or(usize::MAX, |r| r.rank),
            ReferenceKey::Snippet(_) => usize::MAX,
        })?;

        let ReferenceKey::Corpus(license) = best.reference else {
            return None;
        };
        let reference = self.corpus.get(license)?;

        debug!(
            "File {} matches {} with similarity {:.3}{}",
            document.id,
            reference.short_name,
            best.similarity.value(),
            if best.low_confidence { " (low confidence)" } else { "" }
        );

        let highlights = project(
            &best.regions,
            document.normalized().offsets(),
            reference.normalized().offsets(),
            HighlightTarget {
                file: document.id,
                license,
                kind: HighlightKind::Match,
            },
        );

        Some(DocumentMatch {
            license_match: LicenseMatch {
                file: document.id,
                license,
                short_name: reference.short_name.clone(),
                agent: AGENT_NAME.to_string(),
                score: best.similarity.value(),
                low_confidence: best.low_confidence,
                alignment: best.clone(),
            },
            highlights,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license_detection::models::{FileId, LicenseId};

    const MIT: &str = "Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files, to deal in the Software without restriction.";
    const BSD: &str = "Redistribution and use in source and binary forms, with or without modification, are permitted provided that the following conditions are met.";

    fn matcher(entries: Vec<ReferenceEntry>, config: &MatchConfig) -> LicenseMatcher {
        let corpus = Corpus::build(entries, config.normalize).unwrap();
        LicenseMatcher::new(Arc::new(corpus), config)
    }

    fn entry(id: u64, short_name: &str, text: &str, precedence: Option<u32>) -> ReferenceEntry {
        ReferenceEntry {
            id: LicenseId(id),
            short_name: short_name.to_string(),
            text: text.to_string(),
            precedence,
        }
    }

    fn document(text: &str) -> Document {
        Document::new(FileId(1), text.as_bytes().to_vec(), &MatchConfig::default().normalize)
    }

    #[test]
    fn test_detect_picks_matching_reference() {
        let config = MatchConfig::default();
        let matcher = matcher(vec![entry(1, "MIT", MIT, None), entry(2, "BSD", BSD, None)], &config);
        let text = format!("// Copyright 2024 Someone\n//\n// {}\n", MIT);

        let found = matcher.detect(&document(&text)).unwrap();
        assert_eq!(found.license_match.license, LicenseId(1));
        assert_eq!(found.license_match.short_name, "MIT");
        assert_eq!(found.license_match.agent, "monk");
        assert_eq!(found.license_match.score, 1.0);
        assert_eq!(found.highlights.len(), 1);

        let highlight = &found.highlights[0];
        let start = text.find("Permission").unwrap();
        assert_eq!((highlight.start, highlight.end), (start, start + MIT.len() - 1));
        assert_eq!(highlight.ref_start, Some(0));
        assert_eq!(highlight.ref_end, Some(MIT.len() - 1));
    }

    #[test]
    fn test_detect_no_match() {
        let config = MatchConfig::default();
        let matcher = matcher(vec![entry(1, "MIT", MIT, None)], &config);
        assert!(matcher.detect(&document("fn main() {}")).is_none());
        assert!(matcher.detect(&document("")).is_none());
    }

    #[test]
    fn test_align_all_prefilters_hopeless_references() {
        let config = MatchConfig::default();
        let matcher = matcher(vec![entry(1, "MIT", MIT, None), entry(2, "BSD", BSD, None)], &config);
        let results = matcher.align_all(&document(MIT));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].reference, ReferenceKey::Corpus(LicenseId(1)));
    }

    #[test]
    fn test_detect_tie_prefers_precedence() {
        let config = MatchConfig::default();
        let matcher = matcher(
            vec![entry(1, "MIT", MIT, Some(20)), entry(2, "MIT-alias", MIT, Some(10))],
            &config,
        );
        let found = matcher.detect(&document(MIT)).unwrap();
        assert_eq!(found.license_match.license, LicenseId(2));
    }

    #[test]
    fn test_detect_tie_without_precedence_prefers_lower_id() {
        let config = MatchConfig::default();
        let matcher = matcher(vec![entry(8, "B", MIT, None), entry(5, "A", MIT, None)], &config);
        let found = matcher.detect(&document(MIT)).unwrap();
        assert_eq!(found.license_match.license, LicenseId(5));
    }

    #[test]
    fn test_threshold_monotonicity() {
        let text = MIT.replace("without restriction", "");
        let low = MatchConfig {
            threshold: 0.8,
            ..MatchConfig::default()
        };
        let high = MatchConfig {
            threshold: 0.95,
            ..MatchConfig::default()
        };

        let at_low = matcher(vec![entry(1, "MIT", MIT, None)], &low).detect(&document(&text));
        let at_high = matcher(vec![entry(1, "MIT", MIT, None)], &high).detect(&document(&text));
        assert!(at_low.is_some());
        assert!(at_high.is_none());
    }
}
