//! Clause merging: smoothing out choppy short segments
//!
//! A clause cut can legitimately produce a very short segment ("Yes,").
//! Speaking it in isolation sounds clipped, so short segments are held and
//! prefixed onto whatever comes next, chaining while the running total
//! stays small.

use crate::config::SegmentationConfig;

/// Holds at most one short segment awaiting a merge partner
#[derive(Debug)]
pub struct ClauseMerger {
    config: SegmentationConfig,
    pending: Option<String>,
}

impl ClauseMerger {
    /// Create a merger with the given thresholds
    #[must_use]
    pub const fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    /// Offer a segment; returns zero or more utterances ready for the queue.
    ///
    /// Zero results means the segment (possibly merged with earlier held
    /// text) is being held for a future partner.
    pub fn offer(&mut self, segment: String) -> Vec<String> {
        let mut ready = Vec::new();
        let segment_words = word_count(&segment);

        match self.pending.take() {
            None => {
                if segment_words <= self.config.short_clause_words {
                    tracing::trace!(words = segment_words, "holding short segment");
                    self.pending = Some(segment);
                } else {
                    ready.push(segment);
                }
            }
            Some(held) => {
                let combined_words = word_count(&held) + segment_words;
                if segment_words <= self.config.short_clause_words
                    && combined_words < self.config.min_words_before_clause_break
                {
                    // Both short; keep chaining
                    self.pending = Some(join(&held, &segment));
                } else if combined_words < self.config.soft_max_words {
                    ready.push(join(&held, &segment));
                } else {
                    // Too long to merge; release the held text, then treat
                    // the new segment on its own merits
                    ready.push(held);
                    if segment_words <= self.config.short_clause_words {
                        self.pending = Some(segment);
                    } else {
                        ready.push(segment);
                    }
                }
            }
        }

        ready
    }

    /// Take the held segment, if any (stream completion)
    pub fn take_pending(&mut self) -> Option<String> {
        self.pending.take()
    }

    /// Drop any held state
    pub fn clear(&mut self) {
        self.pending = None;
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn join(a: &str, b: &str) -> String {
    format!("{a} {b}")
}
