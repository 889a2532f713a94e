//! Token multiset utilities.
//!
//! Multisets give a cheap upper bound on how many tokens an alignment can
//! possibly cover, which lets a scan skip references that cannot clear the
//! match threshold.

use std::collections::HashMap;

use crate::license_detection::dictionary::{TokenId, UNKNOWN_TOKEN};

pub type TokenMultiset = HashMap<TokenId, usize>;

/// Build a multiset (bag) of token IDs. Unknown tokens are left out.
pub fn build_mset(token_ids: &[TokenId]) -> TokenMultiset {
    let mut mset = HashMap::new();
    for &tid in token_ids {
        if tid != UNKNOWN_TOKEN {
            *mset.entry(tid).or_insert(0) += 1;
        }
    }
    mset
}

/// Size of the multiset intersection: for every token, the smaller of its two
/// occurrence counts, summed.
pub fn multiset_intersection_len(left: &TokenMultiset, right: &TokenMultiset) -> usize {
    let (small, large) = if left.len() <= right.len() {
        (left, right)
    } else {
        (right, left)
    };

    small
        .iter()
        .filter_map(|(tid, &count)| large.get(tid).map(|&other| count.min(other)))
        .sum()
}
