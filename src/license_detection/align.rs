//! Approximate sequence alignment between a document and a reference.
//!
//! Alignment runs in three steps:
//!
//! 1. **Block search**: every maximal run of identical tokens is collected,
//!    seeded from anchor tokens of the reference. Tokens too frequent in a
//!    long reference are not anchors but are covered when a run extends over
//!    them.
//! 2. **Chain selection**: of all chains of runs that are monotone in both
//!    sequences, the one maximising `matched / (reference_len + gap)` wins,
//!    where `gap` counts the document tokens inside the chain that are not
//!    matched. Repeated phrases therefore cannot pull a run out of order, and
//!    stray matches far away from the licensed region are dropped. Ties
//!    resolve to the chain ending earliest in the document.
//! 3. **Bounded cost**: posting visits are counted against a work budget. When
//!    the budget runs out the engine switches to a greedy linear scan and flags
//!    the result as low confidence.

use log::debug;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use crate::license_detection::dictionary::TokenId;
use crate::license_detection::models::{AlignedRegion, Similarity};
use crate::license_detection::token_sets::{TokenMultiset, build_mset, multiset_intersection_len};

/// References shorter than this never have popular tokens.
const POPULAR_MIN_LEN: usize = 200;

/// How far ahead in the reference the greedy fallback looks for the next token.
const GREEDY_LOOKAHEAD: usize = 64;

/// Upper bound on chain selection rounds; the score usually settles in three.
const MAX_CHAIN_ROUNDS: usize = 32;

pub const DEFAULT_MAX_WORK: u64 = 50_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignOptions {
    /// Maximum number of posting visits before falling back to the greedy scan.
    pub max_work: u64,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            max_work: DEFAULT_MAX_WORK,
        }
    }
}

/// A reference token sequence prepared for repeated alignment.
///
/// Built once per reference (or bulk snippet) and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct PreparedTokens {
    ids: Vec<TokenId>,
    postings: HashMap<TokenId, Vec<usize>>,
    popular: HashSet<TokenId>,
    mset: TokenMultiset,
}

impl PreparedTokens {
    pub fn new(ids: Vec<TokenId>) -> Self {
        let mut postings: HashMap<TokenId, Vec<usize>> = HashMap::new();
        for (pos, &tid) in ids.iter().enumerate() {
            postings.entry(tid).or_default().push(pos);
        }

        // Tokens making up more than 1% of a long reference are poor anchors.
        let mut popular = HashSet::new();
        if ids.len() >= POPULAR_MIN_LEN {
            let limit = ids.len() / 100 + 1;
            popular.extend(
                postings
                    .iter()
                    .filter(|(_, positions)| positions.len() > limit)
                    .map(|(&tid, _)| tid),
            );
        }

        let mset = build_mset(&ids);

        Self {
            ids,
            postings,
            popular,
            mset,
        }
    }

    pub fn ids(&self) -> &[TokenId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn mset(&self) -> &TokenMultiset {
        &self.mset
    }

    fn is_popular(&self, tid: TokenId) -> bool {
        self.popular.contains(&tid)
    }

    fn anchor_postings(&self, tid: TokenId) -> Option<&[usize]> {
        if self.is_popular(tid) {
            return None;
        }
        self.postings.get(&tid).map(Vec::as_slice)
    }
}

/// Result of [`align`]: the chosen regions and their score.
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub regions: Vec<AlignedRegion>,
    pub similarity: Similarity,
    pub low_confidence: bool,
}

/// Upper bound of the similarity any alignment of `doc_mset` against
/// `reference` can reach.
///
/// Used to skip references that cannot clear the threshold.
pub fn containment_bound(doc_mset: &TokenMultiset, reference: &PreparedTokens) -> Similarity {
    Similarity::new(
        multiset_intersection_len(doc_mset, &reference.mset),
        reference.len(),
    )
}

/// Aligns a document token sequence against a prepared reference.
pub fn align(doc: &[TokenId], reference: &PreparedTokens, options: &AlignOptions) -> Alignment {
    if doc.is_empty() || reference.is_empty() {
        return Alignment {
            regions: Vec::new(),
            similarity: Similarity::ZERO,
            low_confidence: false,
        };
    }

    let mut budget = WorkBudget::new(options.max_work);
    match candidate_blocks(doc, reference, &mut budget) {
        Some(blocks) => select_chain(&blocks, reference.len(), false),
        None => {
            debug!(
                "Alignment budget of {} exceeded ({} x {} tokens), using greedy scan",
                options.max_work,
                doc.len(),
                reference.len()
            );
            select_chain(&greedy_blocks(doc, reference), reference.len(), true)
        }
    }
}

/// A run of identical tokens: `len` tokens from `doc` in the document and
/// from `reference` in the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Block {
    doc: usize,
    reference: usize,
    len: usize,
}

impl Block {
    fn doc_end(&self) -> usize {
        self.doc + self.len
    }

    fn reference_end(&self) -> usize {
        self.reference + self.len
    }
}

struct WorkBudget {
    remaining: u64,
}

impl WorkBudget {
    fn new(limit: u64) -> Self {
        Self { remaining: limit }
    }

    fn spend(&mut self, amount: u64) -> Option<()> {
        self.remaining = self.remaining.checked_sub(amount)?;
        Some(())
    }
}

/// Finds every maximal run of identical tokens seeded by an anchor token,
/// sorted by document then reference position. Returns `None` when the budget
/// runs out.
///
/// Runs are extended over popular tokens in both directions, so a run is
/// reported once, from the first anchor it contains.
fn candidate_blocks(
    doc: &[TokenId],
    reference: &PreparedTokens,
    budget: &mut WorkBudget,
) -> Option<Vec<Block>> {
    let ids = reference.ids();
    let mut blocks = Vec::new();

    for (i, &tid) in doc.iter().enumerate() {
        budget.spend(1)?;
        let Some(positions) = reference.anchor_postings(tid) else {
            continue;
        };

        'postings: for &j in positions {
            budget.spend(1)?;

            let mut back = 0;
            while back < i && back < j && doc[i - back - 1] == ids[j - back - 1] {
                budget.spend(1)?;
                if !reference.is_popular(doc[i - back - 1]) {
                    // seen from an earlier anchor of the same run
                    continue 'postings;
                }
                back += 1;
            }

            let mut block = Block {
                doc: i - back,
                reference: j - back,
                len: back + 1,
            };
            while block.doc_end() < doc.len()
                && block.reference_end() < ids.len()
                && doc[block.doc_end()] == ids[block.reference_end()]
            {
                budget.spend(1)?;
                block.len += 1;
            }
            blocks.push(block);
        }
    }

    blocks.sort_by_key(|block| (block.doc, block.reference));
    Some(blocks)
}

/// Scaled chain value `q * matched - p * gap` for a gap penalty of `p / q`.
type ChainValue = i128;

/// Prefix maximum over reference end positions (a Fenwick tree).
///
/// Entries carry the block index; on equal values the lower index wins.
struct PrefixMax {
    tree: Vec<Option<(ChainValue, Reverse<usize>)>>,
}

impl PrefixMax {
    fn new(len: usize) -> Self {
        Self {
            tree: vec![None; len + 1],
        }
    }

    /// Records `value` at the 1-based position `pos`.
    fn update(&mut self, mut pos: usize, value: (ChainValue, Reverse<usize>)) {
        while pos < self.tree.len() {
            if self.tree[pos].is_none_or(|current| value > current) {
                self.tree[pos] = Some(value);
            }
            pos += pos & pos.wrapping_neg();
        }
    }

    /// Maximum over positions `1..=pos`.
    fn query(&self, mut pos: usize) -> Option<(ChainValue, Reverse<usize>)> {
        let mut best = None;
        while pos > 0 {
            if let Some(value) = self.tree[pos]
                && best.is_none_or(|current| value > current)
            {
                best = Some(value);
            }
            pos -= pos & pos.wrapping_neg();
        }
        best
    }
}

/// Chain of non-overlapping blocks, monotone in both sequences, maximising
/// `matched - penalty * gap` where `gap` counts document tokens between the
/// chained blocks.
///
/// `blocks` must be sorted by document position. Among equal values the chain
/// ending earliest wins.
fn best_chain(blocks: &[Block], reference_len: usize, penalty: Similarity) -> Vec<Block> {
    let p = penalty.matched as ChainValue;
    let q = penalty.denominator as ChainValue;

    let mut by_doc_end: Vec<usize> = (0..blocks.len()).collect();
    by_doc_end.sort_by_key(|&k| (blocks[k].doc_end(), k));

    let mut finished = PrefixMax::new(reference_len);
    let mut inserted = 0;
    let mut values: Vec<ChainValue> = Vec::with_capacity(blocks.len());
    let mut previous: Vec<Option<usize>> = Vec::with_capacity(blocks.len());
    let mut best: Option<(ChainValue, usize)> = None;

    for (k, block) in blocks.iter().enumerate() {
        // every block ending before this one starts can precede it
        while let Some(&done) = by_doc_end.get(inserted)
            && blocks[done].doc_end() <= block.doc
        {
            let carried = values[done] + p * blocks[done].doc_end() as ChainValue;
            finished.update(blocks[done].reference_end(), (carried, Reverse(done)));
            inserted += 1;
        }

        let mut value = q * block.len as ChainValue;
        let mut link = None;
        if let Some((carried, Reverse(before))) = finished.query(block.reference) {
            let gain = carried - p * block.doc as ChainValue;
            if gain > 0 {
                value += gain;
                link = Some(before);
            }
        }
        values.push(value);
        previous.push(link);

        if best.is_none_or(|(current, _)| value > current) {
            best = Some((value, k));
        }
    }

    let mut chain = Vec::new();
    let mut cursor = best.map(|(_, k)| k);
    while let Some(k) = cursor {
        chain.push(blocks[k]);
        cursor = previous[k];
    }
    chain.reverse();
    chain
}

fn chain_similarity(chain: &[Block], reference_len: usize) -> Similarity {
    let matched: usize = chain.iter().map(|block| block.len).sum();
    let gap: usize = chain
        .windows(2)
        .map(|pair| pair[1].doc - pair[0].doc_end())
        .sum();
    Similarity::new(matched, reference_len + gap)
}

/// Greedy monotone scan used when the block search is too expensive.
///
/// Each document token is paired with its next occurrence in the reference
/// if that occurrence is close to the reference cursor.
fn greedy_blocks(doc: &[TokenId], reference: &PreparedTokens) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut cursor = 0;

    for (i, tid) in doc.iter().enumerate() {
        if cursor >= reference.len() {
            break;
        }
        let Some(positions) = reference.postings.get(tid) else {
            continue;
        };
        let next = positions.partition_point(|&j| j < cursor);
        let Some(&j) = positions.get(next) else {
            continue;
        };
        if j - cursor > GREEDY_LOOKAHEAD {
            continue;
        }

        match blocks.last_mut() {
            Some(last) if last.doc_end() == i && last.reference_end() == j => last.len += 1,
            _ => blocks.push(Block {
                doc: i,
                reference: j,
                len: 1,
            }),
        }
        cursor = j + 1;
    }

    blocks
}

/// Picks the chain of blocks with the best similarity.
///
/// The similarity is a ratio, so the chain is found by repeatedly maximising
/// `matched - score * gap` with the best score so far until it stops improving.
fn select_chain(blocks: &[Block], reference_len: usize, low_confidence: bool) -> Alignment {
    let mut best = Alignment {
        regions: Vec::new(),
        similarity: Similarity::ZERO,
        low_confidence,
    };

    let mut penalty = Similarity::ZERO;
    for _ in 0..MAX_CHAIN_ROUNDS {
        let chain = best_chain(blocks, reference_len, penalty);
        let similarity = chain_similarity(&chain, reference_len);
        if chain.is_empty() || (!best.regions.is_empty() && similarity <= best.similarity) {
            break;
        }

        best.regions = chain
            .iter()
            .map(|block| AlignedRegion {
                doc: block.doc..block.doc_end(),
                reference: block.reference..block.reference_end(),
            })
            .collect();
        best.similarity = similarity;
        penalty = similarity;
    }

    best
}
