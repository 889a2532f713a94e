//! Projection of aligned token regions onto byte spans.
//!
//! Token ranges are half-open indices into a token stream. A projected span
//! starts at the first byte of its first token and ends after the last byte
//! of its last token, so leading indentation and trailing punctuation are not
//! highlighted.

use log::debug;
use std::ops::Range;

use crate::license_detection::models::{AlignedRegion, FileId, Highlight, HighlightKind, LicenseId};
use crate::license_detection::tokenize::OffsetMap;

/// Who a projected highlight belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTarget {
    pub file: FileId,
    pub license: LicenseId,
    pub kind: HighlightKind,
}

/// A token region in both sequences, possibly spanning several aligned regions.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MergedRegion {
    doc: Range<usize>,
    reference: Range<usize>,
}

impl MergedRegion {
    fn absorb(&mut self, region: &AlignedRegion) {
        self.doc.end = self.doc.end.max(region.doc.end);
        self.reference.start = self.reference.start.min(region.reference.start);
        self.reference.end = self.reference.end.max(region.reference.end);
    }
}

impl From<&AlignedRegion> for MergedRegion {
    fn from(region: &AlignedRegion) -> Self {
        Self {
            doc: region.doc.clone(),
            reference: region.reference.clone(),
        }
    }
}

/// One highlight per group of regions that overlap or touch in the document.
///
/// The result is sorted by document offset and its spans do not overlap.
pub fn project(
    regions: &[AlignedRegion],
    doc_offsets: &OffsetMap,
    ref_offsets: &OffsetMap,
    target: HighlightTarget,
) -> Vec<Highlight> {
    let mut sorted: Vec<&AlignedRegion> = regions.iter().filter(|r| !r.is_empty()).collect();
    sorted.sort_by_key(|region| (region.doc.start, region.doc.end));

    let mut merged: Vec<MergedRegion> = Vec::new();
    for region in sorted {
        match merged.last_mut() {
            Some(last) if region.doc.start <= last.doc.end => last.absorb(region),
            _ => merged.push(region.into()),
        }
    }

    merged
        .iter()
        .filter_map(|region| to_highlight(region, doc_offsets, ref_offsets, target))
        .collect()
}

/// A single highlight spanning from the first to the last aligned token.
pub fn project_envelope(
    regions: &[AlignedRegion],
    doc_offsets: &OffsetMap,
    ref_offsets: &OffsetMap,
    target: HighlightTarget,
) -> Option<Highlight> {
    let mut regions = regions.iter().filter(|r| !r.is_empty());
    let mut envelope = MergedRegion::from(regions.next()?);
    for region in regions {
        envelope.doc.start = envelope.doc.start.min(region.doc.start);
        envelope.absorb(region);
    }
    to_highlight(&envelope, doc_offsets, ref_offsets, target)
}

fn to_highlight(
    region: &MergedRegion,
    doc_offsets: &OffsetMap,
    ref_offsets: &OffsetMap,
    target: HighlightTarget,
) -> Option<Highlight> {
    let Some(doc_span) = doc_offsets.byte_span(region.doc.clone()) else {
        debug!(
            "Dropping region {:?} outside of the {} document tokens",
            region.doc,
            doc_offsets.len()
        );
        return None;
    };
    let ref_span = ref_offsets.byte_span(region.reference.clone());

    Some(Highlight {
        file: target.file,
        start: doc_span.start,
        end: doc_span.end,
        ref_start: ref_span.as_ref().map(|span| span.start),
        ref_end: ref_span.map(|span| span.end),
        license: target.license,
        kind: target.kind,
    })
}
