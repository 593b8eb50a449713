//! Streaming segmenter: turns an incrementally-arriving text stream into
//! finalized, speakable utterances
//!
//! Chunks flow through the code-fence filter into the accumulation buffer;
//! after every append the boundary extractor is drained and each cut runs
//! through the clause merger. All state is scoped to one response turn and
//! torn down by [`StreamSegmenter::reset`].

use crate::config::SegmentationConfig;
use crate::speech::boundary::BoundaryExtractor;
use crate::speech::buffer::AccumulationBuffer;
use crate::speech::fence::{CodeFenceFilter, FenceEvent};
use crate::speech::merge::ClauseMerger;

/// Incremental text-to-utterance segmenter
#[derive(Debug)]
pub struct StreamSegmenter {
    fence: CodeFenceFilter,
    buffer: AccumulationBuffer,
    extractor: BoundaryExtractor,
    merger: ClauseMerger,
    transcript: String,
}

impl StreamSegmenter {
    /// Create a segmenter with the given thresholds
    #[must_use]
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            fence: CodeFenceFilter::new(),
            buffer: AccumulationBuffer::new(),
            extractor: BoundaryExtractor::new(config.clone()),
            merger: ClauseMerger::new(config),
            transcript: String::new(),
        }
    }

    /// Feed one incoming chunk; returns utterances that became final.
    ///
    /// Entering a code fence drains everything accumulated so far — text
    /// spoken before a code block must not wait for (or merge with) text
    /// that follows it.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.transcript.push_str(chunk);

        let mut ready = Vec::new();
        for event in self.fence.push(chunk) {
            match event {
                FenceEvent::Text(text) => {
                    self.buffer.push_str(&text);
                    self.drain_cuttable(&mut ready);
                }
                FenceEvent::Enter => self.drain_all(&mut ready),
                FenceEvent::Exit => {}
            }
        }

        if !ready.is_empty() {
            tracing::debug!(count = ready.len(), "segments finalized");
        }
        ready
    }

    /// The stream is complete; release everything still held.
    ///
    /// Any pending short clause and any buffer remainder are forwarded,
    /// merged into one utterance when both are present. Nothing held is
    /// ever silently dropped.
    pub fn flush(&mut self) -> Vec<String> {
        let mut ready = Vec::new();

        if let Some(FenceEvent::Text(text)) = self.fence.finish() {
            self.buffer.push_str(&text);
        }
        self.drain_cuttable(&mut ready);

        let remainder = (!self.buffer.is_blank()).then(|| self.buffer.take_all());
        let tail = match (self.merger.take_pending(), remainder) {
            (Some(pending), Some(rest)) => Some(format!("{pending} {rest}")),
            (Some(pending), None) => Some(pending),
            (None, Some(rest)) => Some(rest),
            (None, None) => None,
        };
        ready.extend(tail);

        self.buffer.clear();
        ready
    }

    /// Tear down all turn state (cancellation or new turn)
    pub fn reset(&mut self) {
        self.fence.reset();
        self.buffer.clear();
        self.merger.clear();
        self.transcript.clear();
    }

    /// Full raw transcript of everything pushed this turn, code included
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Drain every currently justified cut through the merger
    fn drain_cuttable(&mut self, ready: &mut Vec<String>) {
        while let Some(segment) = self.extractor.try_extract(&mut self.buffer) {
            ready.extend(self.merger.offer(segment));
        }
    }

    /// Drain cuts, then force out the remainder and any held clause
    fn drain_all(&mut self, ready: &mut Vec<String>) {
        self.drain_cuttable(ready);

        let remainder = (!self.buffer.is_blank()).then(|| self.buffer.take_all());
        match (self.merger.take_pending(), remainder) {
            (Some(pending), Some(rest)) => ready.push(format!("{pending} {rest}")),
            (Some(pending), None) => ready.push(pending),
            (None, Some(rest)) => ready.push(rest),
            (None, None) => {}
        }
        self.buffer.clear();
    }
}
