//! Core data structures for license matching.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use crate::license_detection::tokenize::{NormalizeOptions, NormalizedText, normalize};
use crate::utils::hash::calculate_sha1;

/// Name recorded on every license match produced by the corpus scan.
pub const AGENT_NAME: &str = "monk";

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of an item of the upload tree (file or directory).
    FileId
);
id_type!(
    /// Identifier of a reference license.
    LicenseId
);
id_type!(
    /// Identifier of an operator-submitted bulk reclassification.
    BulkId
);
id_type!(
    /// Identifier assigned by storage to an appended clearing event.
    EventId
);
id_type!(UserId);
id_type!(GroupId);

/// A file's extracted text, normalized once on construction.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: FileId,
    text: Vec<u8>,
    normalized: NormalizedText,
    content_sha1: String,
}

impl Document {
    pub fn new(id: FileId, text: Vec<u8>, options: &NormalizeOptions) -> Self {
        let normalized = normalize(&text, options);
        let content_sha1 = calculate_sha1(&text);
        Self {
            id,
            text,
            normalized,
            content_sha1,
        }
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn normalized(&self) -> &NormalizedText {
        &self.normalized
    }

    pub fn content_sha1(&self) -> &str {
        &self.content_sha1
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// What a document was aligned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKey {
    Corpus(LicenseId),
    Snippet(BulkId),
}

/// A pair of equally long token ranges, one in the document and one in the
/// reference, whose tokens are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlignedRegion {
    pub doc: Range<usize>,
    pub reference: Range<usize>,
}

impl AlignedRegion {
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }
}

/// Similarity score kept as an exact ratio `matched / denominator`.
///
/// Ordering compares the ratios exactly, so two scores are tied only when they
/// are mathematically equal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Similarity {
    pub matched: usize,
    pub denominator: usize,
}

impl Similarity {
    pub const ZERO: Similarity = Similarity {
        matched: 0,
        denominator: 1,
    };

    pub fn new(matched: usize, denominator: usize) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        Self {
            matched: matched.min(denominator),
            denominator,
        }
    }

    pub fn value(&self) -> f64 {
        self.matched as f64 / self.denominator as f64
    }

    /// True if this score clears `threshold`.
    pub fn meets(&self, threshold: f64) -> bool {
        self.matched > 0 && self.value() >= threshold
    }
}

impl PartialEq for Similarity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Similarity {}

impl PartialOrd for Similarity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Similarity {
    fn cmp(&self, other: &Self) -> Ordering {
        let left = self.matched as u128 * other.denominator as u128;
        let right = other.matched as u128 * self.denominator as u128;
        left.cmp(&right)
    }
}

/// Outcome of aligning one document against one reference. Transient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub document: FileId,
    pub reference: ReferenceKey,
    pub similarity: Similarity,
    /// Aligned regions ordered by document position.
    pub regions: Vec<AlignedRegion>,
    /// Set when the alignment fell back to the bounded greedy comparison.
    pub low_confidence: bool,
}

/// The single winning reference for a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseMatch {
    pub file: FileId,
    pub license: LicenseId,
    pub short_name: String,
    pub agent: String,
    pub score: f64,
    pub low_confidence: bool,
    pub alignment: AlignmentResult,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
pub enum HighlightKind {
    /// Produced by a corpus scan.
    #[serde(rename = "MATCH")]
    #[strum(serialize = "MATCH")]
    Match,
    /// Produced by a bulk reclassification.
    #[serde(rename = "BULK")]
    #[strum(serialize = "BULK")]
    Bulk,
}

/// A matched byte span of a document, optionally mapped onto the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Highlight {
    pub file: FileId,
    pub start: usize,
    pub end: usize,
    pub ref_start: Option<usize>,
    pub ref_end: Option<usize>,
    pub license: LicenseId,
    pub kind: HighlightKind,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Polarity {
    /// The license conclusion is added to the file.
    Add,
    /// The license conclusion is removed from the file.
    Remove,
}

impl Polarity {
    pub fn from_removing(removing: bool) -> Self {
        if removing { Self::Remove } else { Self::Add }
    }
}

/// A license conclusion added to or removed from one file by a bulk run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClearingEvent {
    pub file: FileId,
    pub license: LicenseId,
    pub polarity: Polarity,
    pub actor: UserId,
    pub group: GroupId,
    pub bulk: BulkId,
}

/// Operator input of a bulk reclassification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub bulk: BulkId,
    pub snippet: String,
    pub license: LicenseId,
    pub removing: bool,
    pub actor: UserId,
    pub group: GroupId,
    /// Root item of the subtree the bulk applies to.
    pub subtree: FileId,
}
