//! Choosing the winning reference among a document's alignments.

use std::cmp::Ordering;

use crate::license_detection::models::{AlignmentResult, ReferenceKey};

/// Returns the best alignment meeting `threshold`, if any.
///
/// The highest similarity wins. Equal similarities are decided by `rank`
/// (lower first), then by the reference key, so the result never depends on
/// the order of `results`.
pub fn select_best<'a, F>(
    results: &'a [AlignmentResult],
    threshold: f64,
    rank: F,
) -> Option<&'a AlignmentResult>
where
    F: Fn(&ReferenceKey) -> usize,
{
    results
        .iter()
        .filter(|result| result.similarity.meets(threshold))
        .min_by(|a, b| compare(a, b, &rank))
}

fn compare<F>(a: &AlignmentResult, b: &AlignmentResult, rank: &F) -> Ordering
where
    F: Fn(&ReferenceKey) -> usize,
{
    b.similarity
        .cmp(&a.similarity)
        .then_with(|| rank(&a.reference).cmp(&rank(&b.reference)))
        .then_with(|| a.reference.cmp(&b.reference))
}
