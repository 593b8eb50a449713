//! Boundary extraction: deciding where the accumulated text can be cut
//! into a speakable segment
//!
//! Rules, in priority order:
//! 1. A sentence-ending boundary always cuts, at any length. Short complete
//!    replies ("Yes.") must not wait for more words to accumulate.
//! 2. Once the buffer holds enough words, a clause-ending boundary may cut,
//!    guarded so the cut segment is substantial and the remainder is not a
//!    tiny orphan fragment.
//! 3. A buffer that reaches the hard maximum with no punctuation at all is
//!    force-cut at the soft maximum, on a word boundary.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::SegmentationConfig;
use crate::speech::buffer::AccumulationBuffer;

/// Sentence-ending punctuation, optionally followed by closing quotes or
/// brackets, then whitespace or end of buffer
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[.!?]["')\]]*(\s|$)"#).expect("valid regex"));

/// Clause-ending punctuation followed by whitespace
static CLAUSE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;:]\s").expect("valid regex"));

/// Cuts segments from the front of the accumulation buffer
#[derive(Debug)]
pub struct BoundaryExtractor {
    config: SegmentationConfig,
}

impl BoundaryExtractor {
    /// Create an extractor with the given thresholds
    #[must_use]
    pub const fn new(config: SegmentationConfig) -> Self {
        Self { config }
    }

    /// Attempt to cut one segment from the front of the buffer.
    ///
    /// Returns `None` when no cut is currently justified; callers apply
    /// this in a drain loop after every append.
    pub fn try_extract(&self, buffer: &mut AccumulationBuffer) -> Option<String> {
        if buffer.is_blank() {
            return None;
        }

        // Sentence boundaries are always preferred, regardless of length
        if let Some(m) = SENTENCE_END.find(buffer.as_str()) {
            return Some(buffer.consume(m.end()));
        }

        let words = buffer.word_count();
        if words < self.config.min_segment_words {
            return None;
        }

        if let Some(cut) = self.find_clause_cut(buffer.as_str()) {
            return Some(buffer.consume(cut));
        }

        // Hard fallback: unpunctuated input must not buffer unboundedly
        if words >= self.config.hard_max_words {
            let cut = word_end_offset(buffer.as_str(), self.config.soft_max_words)?;
            tracing::debug!(words, cut_words = self.config.soft_max_words, "forced cut");
            return Some(buffer.consume(cut));
        }

        None
    }

    /// Find the first clause boundary that passes both guards:
    /// the cut segment carries enough words, and the remainder is either
    /// empty or long enough not to be an orphan.
    fn find_clause_cut(&self, text: &str) -> Option<usize> {
        for m in CLAUSE_END.find_iter(text) {
            let cut = m.end();
            let segment_words = text[..cut].split_whitespace().count();
            if segment_words < self.config.min_words_before_clause_break {
                continue;
            }
            let remainder_words = text[cut..].split_whitespace().count();
            if remainder_words > 0 && remainder_words < self.config.min_orphan_words {
                continue;
            }
            return Some(cut);
        }
        None
    }
}

/// Byte offset just past the `n`-th whitespace-delimited word
fn word_end_offset(text: &str, n: usize) -> Option<usize> {
    let mut seen = 0;
    let mut in_word = false;
    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                in_word = false;
                seen += 1;
                if seen == n {
                    return Some(i);
                }
            }
        } else {
            in_word = true;
        }
    }
    if in_word {
        seen += 1;
        if seen == n {
            return Some(text.len());
        }
    }
    None
}
