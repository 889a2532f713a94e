//! Text normalization and tokenization.
//!
//! Tokenization converts document or reference bytes into a sequence of
//! comparable tokens. Every token remembers the byte range it was read from so
//! that aligned token regions can be projected back onto the original text.

use content_inspector::inspect;
use log::debug;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use unicode_normalization::UnicodeNormalization;

/// Splits on whitespace and punctuation: keep only characters and numbers and + when in the middle or end of a word.
///
/// - `[^_\W]+` - one or more characters that are NOT underscore and NOT non-word
/// - `\+?` - optional plus sign (important for license names like "GPL2+")
/// - `[^_\W]*` - zero or more alphanumeric characters
///
/// The pattern runs over raw bytes in Unicode mode, so invalid UTF-8 never
/// matches and simply acts as a separator.
static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^_\W]+\+?[^_\W]*").expect("Invalid regex pattern"));

/// Same as [`WORD_PATTERN`] but also yields every punctuation character as a
/// token of its own.
static WORD_OR_PUNCT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^_\W]+\+?[^_\W]*|[^\w\s]|_").expect("Invalid regex pattern")
});

/// How letter case is treated when comparing tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasePolicy {
    /// Tokens are lowercased.
    #[default]
    Insensitive,
    /// Tokens keep their case.
    Sensitive,
}

/// How punctuation is treated when comparing tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PunctuationPolicy {
    /// Punctuation only separates words.
    #[default]
    Ignore,
    /// Each punctuation character is a token, folded to its ASCII form.
    Keep,
}

/// Normalization settings. Fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NormalizeOptions {
    pub case: CasePolicy,
    pub punctuation: PunctuationPolicy,
}

/// Mapping from token index to the byte range of the token in its source.
///
/// Ranges are strictly increasing and never overlap. Bytes between two tokens
/// belong to the preceding token, bytes before the first token to the first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffsetMap {
    ranges: Vec<Range<usize>>,
    source_len: usize,
}

impl OffsetMap {
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Length in bytes of the text the map was built from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Byte range of a single token.
    pub fn token_range(&self, index: usize) -> Option<Range<usize>> {
        self.ranges.get(index).cloned()
    }

    /// Byte span covering the tokens in `tokens`, from the start of the first
    /// token to the end of the last one.
    ///
    /// Returns `None` for an empty or out-of-bounds token range.
    pub fn byte_span(&self, tokens: Range<usize>) -> Option<Range<usize>> {
        if tokens.start >= tokens.end || tokens.end > self.ranges.len() {
            return None;
        }
        Some(self.ranges[tokens.start].start..self.ranges[tokens.end - 1].end)
    }

    /// Index of the token a byte is attributed to.
    pub fn token_at_byte(&self, byte: usize) -> Option<usize> {
        if byte >= self.source_len || self.ranges.is_empty() {
            return None;
        }
        let following = self.ranges.partition_point(|range| range.start <= byte);
        Some(following.saturating_sub(1))
    }
}

/// A token stream together with its offset map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    tokens: Vec<String>,
    offsets: OffsetMap,
}

impl NormalizedText {
    /// An empty stream for a source of `source_len` bytes.
    pub fn empty(source_len: usize) -> Self {
        Self {
            tokens: Vec::new(),
            offsets: OffsetMap {
                ranges: Vec::new(),
                source_len,
            },
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn offsets(&self) -> &OffsetMap {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Normalizes text into a token stream with byte offsets.
///
/// Content that looks binary yields an empty stream. Two texts that differ
/// only in whitespace or line wrapping produce the same tokens.
///
/// # Examples
/// ```
/// # use licensemonk::license_detection::tokenize::{normalize, NormalizeOptions};
/// let text = normalize(b"Hello,  World!", &NormalizeOptions::default());
/// assert_eq!(text.tokens(), ["hello", "world"]);
/// assert_eq!(text.offsets().byte_span(0..2), Some(0..13));
/// ```
pub fn normalize(text: &[u8], options: &NormalizeOptions) -> NormalizedText {
    if text.is_empty() {
        return NormalizedText::empty(0);
    }

    if inspect(text).is_binary() {
        debug!("Skipping tokenization of {} bytes of binary content", text.len());
        return NormalizedText::empty(text.len());
    }

    let pattern = match options.punctuation {
        PunctuationPolicy::Ignore => &*WORD_PATTERN,
        PunctuationPolicy::Keep => &*WORD_OR_PUNCT_PATTERN,
    };

    let mut tokens = Vec::new();
    let mut ranges = Vec::new();

    for found in pattern.find_iter(text) {
        let Ok(raw) = std::str::from_utf8(found.as_bytes()) else {
            continue;
        };
        let token = normalize_token(raw, options);
        if token.is_empty() {
            continue;
        }
        tokens.push(token);
        ranges.push(found.range());
    }

    NormalizedText {
        tokens,
        offsets: OffsetMap {
            ranges,
            source_len: text.len(),
        },
    }
}

fn normalize_token(raw: &str, options: &NormalizeOptions) -> String {
    let is_word = raw.chars().next().is_some_and(char::is_alphanumeric);

    let composed: String = if is_word {
        raw.nfkc().collect()
    } else {
        raw.chars()
            .map(|c| deunicode::deunicode_char(c).unwrap_or("").to_string())
            .collect()
    };

    match options.case {
        CasePolicy::Insensitive => composed.to_lowercase(),
        CasePolicy::Sensitive => composed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        normalize(text.as_bytes(), &NormalizeOptions::default())
            .tokens()
            .to_vec()
    }

    #[test]
    fn test_normalize_empty() {
        let result = normalize(b"", &NormalizeOptions::default());
        assert!(result.is_empty());
        assert_eq!(result.offsets().source_len(), 0);
    }

    #[test]
    fn test_normalize_simple() {
        assert_eq!(tokens("Hello World"), vec!["hello", "world"]);
    }

    #[test]
    fn test_normalize_with_punctuation() {
        assert_eq!(
            tokens("Hello, World! This is a test."),
            vec!["hello", "world", "this", "is", "a", "test"]
        );
    }

    #[test]
    fn test_whitespace_and_wrapping_do_not_change_tokens() {
        let flowing = "The GNU General Public License is a free, copyleft license";
        let wrapped = "The GNU General\n * Public   License is a\r\n\tfree,\n * copyleft license";
        assert_eq!(tokens(flowing), tokens(wrapped));
    }

    #[test]
    fn test_normalize_with_plus() {
        assert_eq!(tokens("GPL2+ and GPL3"), vec!["gpl2+", "and", "gpl3"]);
    }

    #[test]
    fn test_normalize_with_underscores() {
        assert_eq!(tokens("hello_world"), vec!["hello", "world"]);
    }

    #[test]
    fn test_normalize_unicode_characters() {
        assert_eq!(tokens("hello 世界 мир"), vec!["hello", "世界", "мир"]);
    }

    #[test]
    fn test_normalize_compatibility_forms() {
        assert_eq!(tokens("ﬁle"), vec!["file"]);
    }

    #[test]
    fn test_offsets_point_at_original_bytes() {
        let text = "  Copyright (C) 2007 Free Software";
        let result = normalize(text.as_bytes(), &NormalizeOptions::default());
        let offsets = result.offsets();

        assert_eq!(offsets.len(), 5);
        for (index, token) in result.tokens().iter().enumerate() {
            let range = offsets.token_range(index).unwrap();
            assert_eq!(text[range].to_lowercase(), *token);
        }
        assert_eq!(offsets.byte_span(0..5), Some(2..text.len()));
    }

    #[test]
    fn test_offsets_are_monotonic() {
        let text = "one two\n\nthree, four; five";
        let result = normalize(text.as_bytes(), &NormalizeOptions::default());
        let offsets = result.offsets();
        for index in 1..offsets.len() {
            let previous = offsets.token_range(index - 1).unwrap();
            let current = offsets.token_range(index).unwrap();
            assert!(previous.end <= current.start);
        }
    }

    #[test]
    fn test_token_at_byte_attributes_gaps() {
        let text = "  ab  cd ";
        let result = normalize(text.as_bytes(), &NormalizeOptions::default());
        let offsets = result.offsets();

        assert_eq!(offsets.token_at_byte(0), Some(0));
        assert_eq!(offsets.token_at_byte(2), Some(0));
        assert_eq!(offsets.token_at_byte(5), Some(0));
        assert_eq!(offsets.token_at_byte(6), Some(1));
        assert_eq!(offsets.token_at_byte(8), Some(1));
        assert_eq!(offsets.token_at_byte(9), None);
    }

    #[test]
    fn test_byte_span_rejects_empty_and_out_of_bounds() {
        let result = normalize(b"a b c", &NormalizeOptions::default());
        let offsets = result.offsets();
        assert_eq!(offsets.byte_span(1..1), None);
        assert_eq!(offsets.byte_span(2..4), None);
        assert_eq!(offsets.byte_span(1..3), Some(2..5));
    }

    #[test]
    fn test_invalid_utf8_is_a_separator() {
        let mut bytes = b"free".to_vec();
        bytes.push(0xff);
        bytes.extend_from_slice(b"software");
        let result = normalize(&bytes, &NormalizeOptions::default());

        assert_eq!(result.tokens(), ["free", "software"]);
        assert_eq!(result.offsets().token_range(1), Some(5..13));
    }

    #[test]
    fn test_binary_content_yields_empty_stream() {
        let bytes = [0u8, 159, 146, 150, 0, 0, 1, 2, 3, b'a', b'b'];
        let result = normalize(&bytes, &NormalizeOptions::default());
        assert!(result.is_empty());
        assert_eq!(result.offsets().source_len(), bytes.len());
    }

    #[test]
    fn test_case_sensitive_policy() {
        let options = NormalizeOptions {
            case: CasePolicy::Sensitive,
            ..NormalizeOptions::default()
        };
        let result = normalize(b"GNU General", &options);
        assert_eq!(result.tokens(), ["GNU", "General"]);
    }

    #[test]
    fn test_keep_punctuation_policy() {
        let options = NormalizeOptions {
            punctuation: PunctuationPolicy::Keep,
            ..NormalizeOptions::default()
        };
        let result = normalize("free, “copyleft”".as_bytes(), &options);
        assert_eq!(result.tokens(), ["free", ",", "\"", "copyleft", "\""]);
    }

    #[test]
    fn test_only_punctuation() {
        assert!(tokens(".,;:!?-_=+[]{}()").is_empty());
    }

    #[test]
    fn test_very_long_text() {
        let words: Vec<String> = (0..1000).map(|i| format!("word{}", i)).collect();
        let result = tokens(&words.join(" "));
        assert_eq!(result.len(), 1000);
        assert_eq!(result[999], "word999");
    }
}
